use std::sync::Arc;
use std::time::Instant;

use storefront_core::config::{AgentConfig, AppConfig};
use storefront_core::{FailureKind, Transcript};
use tracing::{info, Instrument};

use crate::classifier::classify;
use crate::error::RuntimeError;
use crate::llm::{LlmClient, OpenAiChatClient};
use crate::runtime::{AgentRuntime, RuntimeSession, RuntimeStep, ToolLoopRuntime};
use crate::telemetry::Telemetry;
use crate::tools::{McpConnector, ToolConnector};

/// Agent identity, fixed at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentSettings {
    pub name: String,
    pub instructions: String,
    pub fallback_message: String,
}

impl From<&AgentConfig> for AgentSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            name: config.name.clone(),
            instructions: config.instructions.clone(),
            fallback_message: config.fallback_message.clone(),
        }
    }
}

/// Runs one agent invocation per request against a fresh runtime session.
///
/// Holds only read-only handles, so clones are cheap and concurrent invocations share
/// nothing mutable.
#[derive(Clone)]
pub struct Orchestrator {
    settings: Arc<AgentSettings>,
    llm: Arc<dyn LlmClient>,
    tool_connector: Arc<dyn ToolConnector>,
    runtime: Arc<dyn AgentRuntime>,
    telemetry: Telemetry,
}

impl Orchestrator {
    pub fn new(
        settings: AgentSettings,
        llm: Arc<dyn LlmClient>,
        tool_connector: Arc<dyn ToolConnector>,
        runtime: Arc<dyn AgentRuntime>,
        telemetry: Telemetry,
    ) -> Self {
        Self { settings: Arc::new(settings), llm, tool_connector, runtime, telemetry }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, RuntimeError> {
        let runtime = ToolLoopRuntime::new(config.agent.max_tool_rounds);
        Self::from_config_with_runtime(config, Arc::new(runtime))
    }

    /// Real backends from `config`, with a caller-supplied runtime.
    pub fn from_config_with_runtime(
        config: &AppConfig,
        runtime: Arc<dyn AgentRuntime>,
    ) -> Result<Self, RuntimeError> {
        Ok(Self::new(
            AgentSettings::from(&config.agent),
            Arc::new(OpenAiChatClient::from_config(config)?),
            Arc::new(McpConnector::from_config(config)?),
            runtime,
            Telemetry::from_config(&config.telemetry),
        ))
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    pub fn tool_connector_name(&self) -> &str {
        self.tool_connector.name()
    }

    /// Opens and drops a tool session; returns how many tools the connector advertised.
    pub async fn probe_tools(&self) -> Result<usize, RuntimeError> {
        let session = self.tool_connector.connect().await?;
        Ok(session.tools().len())
    }

    /// Runs the transcript and returns the answer, or the fallback message when the last
    /// step produced no text. Errors are returned unclassified.
    pub async fn invoke(&self, transcript: &Transcript) -> Result<String, RuntimeError> {
        let session = RuntimeSession {
            agent_name: self.settings.name.clone(),
            instructions: self.settings.instructions.clone(),
            llm: Arc::clone(&self.llm),
            tool_connector: Arc::clone(&self.tool_connector),
            telemetry: self.telemetry.clone(),
        };
        let span = self.telemetry.invocation_span(&self.settings.name, self.llm.model());
        let started = Instant::now();

        let result = self.runtime.run(session, transcript.as_str()).instrument(span).await;

        match result {
            Ok(steps) => {
                self.telemetry.record_invocation(
                    &self.settings.name,
                    "ok",
                    steps.len(),
                    started.elapsed(),
                );
                let answer = match final_output(&steps) {
                    Some(output) => output.to_string(),
                    None => {
                        info!(
                            event_name = "agent.invoke.fallback",
                            agent_name = %self.settings.name,
                            steps = steps.len(),
                            "runtime produced no final output"
                        );
                        self.settings.fallback_message.clone()
                    }
                };
                Ok(answer)
            }
            Err(error) => {
                let elapsed = started.elapsed();
                self.telemetry.record_invocation(&self.settings.name, "error", 0, elapsed);
                Err(error)
            }
        }
    }

    /// `invoke` with the error reduced to its `FailureKind`.
    pub async fn run(&self, transcript: &Transcript) -> Result<String, FailureKind> {
        self.invoke(transcript).await.map_err(|error| classify(&error))
    }
}

/// Output of the last step only. Earlier steps are never consulted, and an empty string
/// counts as present.
pub fn final_output(steps: &[RuntimeStep]) -> Option<&str> {
    steps.last().and_then(|step| step.llm_output.as_deref())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use storefront_core::config::AppConfig;
    use storefront_core::{normalize, ConversationInput, FailureKind, Transcript, Turn};

    use super::{final_output, AgentSettings, Orchestrator};
    use crate::error::RuntimeError;
    use crate::llm::Completion;
    use crate::runtime::tests::{FakeCatalogue, ScriptedLlm};
    use crate::runtime::{AgentRuntime, RuntimeSession, RuntimeStep, ToolLoopRuntime};
    use crate::telemetry::Telemetry;

    /// Returns canned steps and records what it was asked to run.
    struct StubRuntime {
        outcome: Mutex<Option<Result<Vec<RuntimeStep>, RuntimeError>>>,
        seen: Mutex<Vec<(String, String, String)>>,
    }

    impl StubRuntime {
        fn new(outcome: Result<Vec<RuntimeStep>, RuntimeError>) -> Self {
            Self { outcome: Mutex::new(Some(outcome)), seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl AgentRuntime for StubRuntime {
        async fn run(
            &self,
            session: RuntimeSession,
            input: &str,
        ) -> Result<Vec<RuntimeStep>, RuntimeError> {
            self.seen.lock().expect("lock").push((
                session.agent_name,
                session.tool_connector.name().to_string(),
                input.to_string(),
            ));
            self.outcome.lock().expect("lock").take().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn step(output: Option<&str>) -> RuntimeStep {
        RuntimeStep { llm_output: output.map(str::to_string), tool_calls: Vec::new() }
    }

    fn settings() -> AgentSettings {
        AgentSettings::from(&AppConfig::default().agent)
    }

    fn orchestrator(runtime: Arc<dyn AgentRuntime>) -> Orchestrator {
        Orchestrator::new(
            settings(),
            Arc::new(ScriptedLlm::new(Vec::new())),
            Arc::new(FakeCatalogue { reachable: true }),
            runtime,
            Telemetry::disabled(),
        )
    }

    fn transcript(prompt: &str) -> Transcript {
        normalize(&ConversationInput::prompt(prompt).expect("prompt"))
    }

    #[test]
    fn final_output_reads_only_the_last_step() {
        assert_eq!(final_output(&[]), None);
        assert_eq!(final_output(&[step(Some("first")), step(None)]), None);
        assert_eq!(final_output(&[step(None), step(Some("last"))]), Some("last"));
        assert_eq!(final_output(&[step(Some(""))]), Some(""));
    }

    #[test]
    fn settings_default_to_the_store_agent_identity() {
        let settings = settings();

        assert_eq!(settings.name, "gorilla-store-agent");
        assert_eq!(
            settings.fallback_message,
            "適切な回答が「ゴリラエージェント」から得られませんでした。"
        );
    }

    #[tokio::test]
    async fn returns_last_step_output() {
        let runtime = Arc::new(StubRuntime::new(Ok(vec![
            step(Some("thinking")),
            step(Some("We sell rice crackers.")),
        ])));
        let orchestrator = orchestrator(runtime.clone());

        let answer = orchestrator.run(&transcript("What snacks do you sell?")).await;

        assert_eq!(answer.as_deref(), Ok("We sell rice crackers."));
        let seen = runtime.seen.lock().expect("lock");
        assert_eq!(
            seen[0],
            (
                "gorilla-store-agent".to_string(),
                "catalogue".to_string(),
                "What snacks do you sell?".to_string()
            )
        );
    }

    #[tokio::test]
    async fn falls_back_when_there_are_no_steps() {
        let orchestrator = orchestrator(Arc::new(StubRuntime::new(Ok(Vec::new()))));

        let answer = orchestrator.run(&transcript("hello")).await;

        assert_eq!(answer, Ok(settings().fallback_message));
    }

    #[tokio::test]
    async fn falls_back_when_last_step_has_no_output() {
        let orchestrator = orchestrator(Arc::new(StubRuntime::new(Ok(vec![
            step(Some("earlier text is ignored")),
            step(None),
        ]))));

        let answer = orchestrator.run(&transcript("hello")).await;

        assert_eq!(answer, Ok(settings().fallback_message));
    }

    #[tokio::test]
    async fn history_transcript_reaches_the_runtime_verbatim() {
        let runtime = Arc::new(StubRuntime::new(Ok(vec![step(Some("ok"))])));
        let orchestrator = orchestrator(runtime.clone());
        let input = ConversationInput::history(vec![Turn::user("Hi"), Turn::assistant("Hello")])
            .expect("history");

        orchestrator.run(&normalize(&input)).await.expect("answer");

        assert_eq!(runtime.seen.lock().expect("lock")[0].2, "User: Hi\nAssistant: Hello");
    }

    #[tokio::test]
    async fn unreachable_connector_is_classified_as_connectivity_failure() {
        let orchestrator = orchestrator(Arc::new(StubRuntime::new(Err(
            RuntimeError::tool_connection("catalogue", "connection refused"),
        ))));

        let result = orchestrator.run(&transcript("hello")).await;

        assert_eq!(result, Err(FailureKind::ToolConnectivityFailure));
    }

    #[tokio::test]
    async fn backend_failure_is_classified_as_unexpected() {
        let orchestrator = orchestrator(Arc::new(StubRuntime::new(Err(
            RuntimeError::LlmStatus { status: 401, body: "invalid key".to_string() },
        ))));

        let result = orchestrator.run(&transcript("hello")).await;

        assert_eq!(result, Err(FailureKind::UnexpectedFailure));
    }

    #[tokio::test]
    async fn each_invocation_runs_independently() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(Completion { content: Some("first".to_string()), tool_calls: Vec::new() }),
            Ok(Completion { content: Some("second".to_string()), tool_calls: Vec::new() }),
        ]));
        let orchestrator = Orchestrator::new(
            settings(),
            llm.clone(),
            Arc::new(FakeCatalogue { reachable: true }),
            Arc::new(ToolLoopRuntime::default()),
            Telemetry::disabled(),
        );

        let first = orchestrator.run(&transcript("one")).await;
        let second = orchestrator.run(&transcript("two")).await;

        assert_eq!(first.as_deref(), Ok("first"));
        assert_eq!(second.as_deref(), Ok("second"));
        let seen = llm.seen.lock().expect("lock");
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].len(), 2, "second invocation must not carry the first one's messages");
    }

    #[tokio::test]
    async fn probe_reports_advertised_tool_count() {
        let orchestrator = orchestrator(Arc::new(StubRuntime::new(Ok(Vec::new()))));

        assert_eq!(orchestrator.probe_tools().await.expect("probe"), 1);
    }
}

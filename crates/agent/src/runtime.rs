use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::RuntimeError;
use crate::llm::{ChatMessage, LlmClient, ToolCall};
use crate::telemetry::Telemetry;
use crate::tools::ToolConnector;

/// One model turn recorded by the runtime.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuntimeStep {
    pub llm_output: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Per-request binding of the agent identity to its backends. Never reused.
#[derive(Clone)]
pub struct RuntimeSession {
    pub agent_name: String,
    pub instructions: String,
    pub llm: Arc<dyn LlmClient>,
    pub tool_connector: Arc<dyn ToolConnector>,
    pub telemetry: Telemetry,
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Runs `input` to completion and returns every step in order.
    async fn run(
        &self,
        session: RuntimeSession,
        input: &str,
    ) -> Result<Vec<RuntimeStep>, RuntimeError>;
}

/// Model/tool loop: ask the model, execute requested tools, feed results back, repeat
/// until the model answers without tool calls or the round limit is reached.
#[derive(Clone, Debug)]
pub struct ToolLoopRuntime {
    max_tool_rounds: u32,
}

impl ToolLoopRuntime {
    pub fn new(max_tool_rounds: u32) -> Self {
        Self { max_tool_rounds }
    }
}

impl Default for ToolLoopRuntime {
    fn default() -> Self {
        Self::new(8)
    }
}

#[async_trait]
impl AgentRuntime for ToolLoopRuntime {
    async fn run(
        &self,
        session: RuntimeSession,
        input: &str,
    ) -> Result<Vec<RuntimeStep>, RuntimeError> {
        let tools = session.tool_connector.connect().await?;
        let definitions = tools.tools().to_vec();

        let mut messages = vec![
            ChatMessage::System(session.instructions.clone()),
            ChatMessage::User(input.to_string()),
        ];
        let mut steps = Vec::new();
        let mut tool_rounds = 0;

        loop {
            let completion = session.llm.complete(&messages, &definitions).await?;
            steps.push(RuntimeStep {
                llm_output: completion.content.clone(),
                tool_calls: completion.tool_calls.clone(),
            });

            if completion.tool_calls.is_empty() {
                break;
            }
            if tool_rounds >= self.max_tool_rounds {
                warn!(
                    event_name = "agent.runtime.tool_rounds_exhausted",
                    agent_name = %session.agent_name,
                    max_tool_rounds = self.max_tool_rounds,
                    "model kept requesting tools after the round limit"
                );
                break;
            }
            tool_rounds += 1;

            messages.push(ChatMessage::Assistant {
                content: completion.content,
                tool_calls: completion.tool_calls.clone(),
            });

            for call in completion.tool_calls {
                let started = Instant::now();
                let output = tools.call(&call.name, call.arguments).await?;
                session.telemetry.record_tool_call(
                    session.tool_connector.name(),
                    &call.name,
                    output.is_error,
                    started.elapsed(),
                );
                debug!(
                    event_name = "agent.runtime.tool_result",
                    tool = %call.name,
                    is_error = output.is_error,
                    "tool result appended to conversation"
                );
                messages.push(ChatMessage::Tool { call_id: call.id, content: output.text });
            }
        }

        Ok(steps)
    }
}

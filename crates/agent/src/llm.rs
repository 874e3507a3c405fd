use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use storefront_core::config::AppConfig;

use crate::error::RuntimeError;
use crate::tools::ToolDefinition;

/// A tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant { content: Option<String>, tool_calls: Vec<ToolCall> },
    Tool { call_id: String, content: String },
}

/// One model turn: optional text plus any tool calls it asked for.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<Completion, RuntimeError>;
}

/// Chat-completions client for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiChatClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl OpenAiChatClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, RuntimeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| RuntimeError::ClientInit(error.to_string()))?;

        Ok(Self { client, base_url: base_url.into(), model: model.into(), api_key })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, RuntimeError> {
        Self::new(
            config.llm_base_url(),
            config.llm.model.clone(),
            config.llm.api_key.clone(),
            Duration::from_secs(config.llm.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<Completion, RuntimeError> {
        let body = request_body(&self.model, messages, tools);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| RuntimeError::LlmTransport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::LlmStatus {
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }

        let payload: ChatCompletionResponse = response.json().await.map_err(|error| {
            RuntimeError::MalformedResponse(format!("chat completion decode failed: {error}"))
        })?;

        parse_completion(payload)
    }
}

fn request_body(model: &str, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages.iter().map(message_json).collect::<Vec<_>>(),
    });

    if !tools.is_empty() {
        body["tools"] = tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description.clone().unwrap_or_default(),
                        "parameters": tool.input_schema,
                    }
                })
            })
            .collect();
    }

    body
}

fn message_json(message: &ChatMessage) -> Value {
    match message {
        ChatMessage::System(content) => json!({ "role": "system", "content": content }),
        ChatMessage::User(content) => json!({ "role": "user", "content": content }),
        ChatMessage::Assistant { content, tool_calls } => {
            let mut value = json!({ "role": "assistant", "content": content });
            if !tool_calls.is_empty() {
                value["tool_calls"] = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
            }
            value
        }
        ChatMessage::Tool { call_id, content } => {
            json!({ "role": "tool", "tool_call_id": call_id, "content": content })
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseToolCall {
    id: String,
    function: ChatResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ChatResponseFunction {
    name: String,
    arguments: String,
}

fn parse_completion(payload: ChatCompletionResponse) -> Result<Completion, RuntimeError> {
    let choice = payload.choices.into_iter().next().ok_or_else(|| {
        RuntimeError::MalformedResponse("chat completion contained no choices".to_string())
    })?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            let arguments = if call.function.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&call.function.arguments).map_err(|error| {
                    RuntimeError::MalformedResponse(format!(
                        "tool call `{}` carried invalid arguments: {error}",
                        call.function.name
                    ))
                })?
            };
            Ok(ToolCall { id: call.id, name: call.function.name, arguments })
        })
        .collect::<Result<Vec<_>, RuntimeError>>()?;

    Ok(Completion { content: choice.message.content, tool_calls })
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated = value.chars().take(max_chars).collect::<String>();
    truncated.push('…');
    truncated
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::Client;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ClientInfo, ClientJsonRpcMessage, RawContent,
};
use rmcp::service::{RunningService, ServiceError};
use rmcp::transport::streamable_http_client::{
    SseError, StreamableHttpClient, StreamableHttpClientTransportConfig, StreamableHttpError,
    StreamableHttpPostResponse,
};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{ClientHandler, RoleClient};
use serde_json::Value;
use sse_stream::Sse;
use storefront_core::config::AppConfig;
use thiserror::Error;
use tracing::debug;

use crate::error::RuntimeError;

#[derive(Clone, Debug, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

/// A remote service that exposes tools to the agent runtime.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    fn name(&self) -> &str;

    /// Opens a session and discovers the available tools. Any failure here means the
    /// service could not be reached and must surface as `RuntimeError::ToolConnection`.
    async fn connect(&self) -> Result<Box<dyn ToolSession>, RuntimeError>;
}

#[async_trait]
pub trait ToolSession: Send + Sync {
    fn tools(&self) -> &[ToolDefinition];

    async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutput, RuntimeError>;
}

/// MCP client over the streamable HTTP transport.
#[derive(Clone)]
pub struct McpConnector {
    name: String,
    url: String,
    client: Client,
    timeout: Duration,
}

#[derive(Debug, Error)]
enum HandshakeFailure {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("initialize failed: {0}")]
    Initialize(String),
    #[error("tools/list failed: {0}")]
    ListTools(#[source] ServiceError),
}

impl McpConnector {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RuntimeError> {
        // Sessions hold a long-lived GET stream; requests are bounded individually.
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|error| RuntimeError::ClientInit(error.to_string()))?;

        Ok(Self { name: name.into(), url: url.into(), client, timeout })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, RuntimeError> {
        Self::new(
            config.catalogue.name.clone(),
            config.catalogue_url(),
            Duration::from_secs(config.catalogue.timeout_secs),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn handshake(&self) -> Result<McpSession, HandshakeFailure> {
        let transport = StreamableHttpClientTransport::with_client(
            CatalogueHttpClient { inner: self.client.clone() },
            StreamableHttpClientTransportConfig::with_uri(self.url.clone()),
        );

        let service = tokio::time::timeout(
            self.timeout,
            rmcp::serve_client(CatalogueClientHandler::new(), transport),
        )
        .await
        .map_err(|_| HandshakeFailure::Timeout(self.timeout))?
        .map_err(|error| HandshakeFailure::Initialize(error.to_string()))?;

        let tools = tokio::time::timeout(self.timeout, service.peer().list_all_tools())
            .await
            .map_err(|_| HandshakeFailure::Timeout(self.timeout))?
            .map_err(HandshakeFailure::ListTools)?
            .into_iter()
            .map(|tool| ToolDefinition {
                name: tool.name.to_string(),
                description: tool.description.map(|description| description.to_string()),
                input_schema: Value::Object((*tool.input_schema).clone()),
            })
            .collect();

        Ok(McpSession { connector: self.name.clone(), service, tools, timeout: self.timeout })
    }
}

#[async_trait]
impl ToolConnector for McpConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<Box<dyn ToolSession>, RuntimeError> {
        let session = self
            .handshake()
            .await
            .map_err(|failure| RuntimeError::tool_connection(&self.name, failure))?;

        debug!(
            event_name = "agent.tools.connected",
            connector = %self.name,
            tool_count = session.tools.len(),
            "tool connector session established"
        );
        Ok(Box::new(session))
    }
}

#[derive(Clone)]
struct CatalogueClientHandler {
    info: ClientInfo,
}

impl CatalogueClientHandler {
    fn new() -> Self {
        let mut info = ClientInfo::default();
        info.client_info.name = "storefront-agent".to_string();
        info.client_info.version = env!("CARGO_PKG_VERSION").to_string();
        Self { info }
    }
}

impl ClientHandler for CatalogueClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }
}

/// reqwest transport that drops SSE events without a payload, such as the
/// `id: 0` priming event some servers send ahead of the JSON-RPC reply.
#[derive(Clone)]
struct CatalogueHttpClient {
    inner: Client,
}

impl StreamableHttpClient for CatalogueHttpClient {
    type Error = reqwest::Error;

    async fn get_stream(
        &self,
        uri: Arc<str>,
        session_id: Arc<str>,
        last_event_id: Option<String>,
        auth_token: Option<String>,
    ) -> Result<BoxStream<'static, Result<Sse, SseError>>, StreamableHttpError<Self::Error>> {
        self.inner
            .get_stream(uri, session_id, last_event_id, auth_token)
            .await
            .map(skip_empty_events)
    }

    async fn delete_session(
        &self,
        uri: Arc<str>,
        session: Arc<str>,
        auth_token: Option<String>,
    ) -> Result<(), StreamableHttpError<Self::Error>> {
        self.inner.delete_session(uri, session, auth_token).await
    }

    async fn post_message(
        &self,
        uri: Arc<str>,
        message: ClientJsonRpcMessage,
        session_id: Option<Arc<str>>,
        auth_token: Option<String>,
    ) -> Result<StreamableHttpPostResponse, StreamableHttpError<Self::Error>> {
        match self.inner.post_message(uri, message, session_id, auth_token).await? {
            StreamableHttpPostResponse::Sse(events, session_id) => {
                Ok(StreamableHttpPostResponse::Sse(skip_empty_events(events), session_id))
            }
            response => Ok(response),
        }
    }
}

fn skip_empty_events(
    events: BoxStream<'static, Result<Sse, SseError>>,
) -> BoxStream<'static, Result<Sse, SseError>> {
    events
        .filter(|event| {
            let empty = matches!(
                event,
                Ok(sse) if sse.data.as_deref().map_or(true, |data| data.trim().is_empty())
            );
            future::ready(!empty)
        })
        .boxed()
}

struct McpSession {
    connector: String,
    service: RunningService<RoleClient, CatalogueClientHandler>,
    tools: Vec<ToolDefinition>,
    timeout: Duration,
}

#[async_trait]
impl ToolSession for McpSession {
    fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutput, RuntimeError> {
        let call_failed =
            |reason: String| RuntimeError::ToolCall { tool: name.to_string(), reason };

        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => return Err(call_failed(format!("arguments must be an object, got {other}"))),
        };

        let request = CallToolRequestParam { name: name.to_string().into(), arguments };
        let result = tokio::time::timeout(self.timeout, self.service.peer().call_tool(request))
            .await
            .map_err(|_| call_failed(format!("timed out after {:?}", self.timeout)))?
            .map_err(|error| {
                // A JSON-RPC error reply means the catalogue answered; anything else
                // means the session transport is gone.
                if matches!(error, ServiceError::McpError(_)) {
                    call_failed(error.to_string())
                } else {
                    RuntimeError::tool_connection(&self.connector, error)
                }
            })?;

        Ok(tool_output(result))
    }
}

fn tool_output(result: CallToolResult) -> ToolOutput {
    let mut text = result
        .content
        .into_iter()
        .filter_map(|block| match block.raw {
            RawContent::Text(block) => Some(block.text),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        if let Some(structured) = result.structured_content {
            text = structured.to_string();
        }
    }

    ToolOutput { text, is_error: result.is_error.unwrap_or(false) }
}

use std::any::Any;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use storefront_agent::Orchestrator;
use storefront_core::{normalize, ConversationInput, InputError, InterfaceError, Turn};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::health::{self, HealthState};

#[derive(Clone)]
pub struct AgentState {
    orchestrator: Orchestrator,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentRequest {
    #[serde(default, deserialize_with = "present")]
    pub prompt: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub messages: Option<Vec<Turn>>,
}

/// Optional fields may be omitted, but an explicit `null` is a type error.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

type Rejection = (StatusCode, Json<MessageBody>);

impl AgentRequest {
    /// `messages` wins whenever it is present, even alongside `prompt`.
    pub fn into_input(self) -> Result<ConversationInput, InputError> {
        match (self.messages, self.prompt) {
            (Some(turns), _) => ConversationInput::history(turns),
            (None, Some(prompt)) => ConversationInput::prompt(prompt),
            (None, None) => Err(InputError::MissingInput),
        }
    }
}

/// Full HTTP surface: `/`, `/agent` and `/health`, with request tracing and panic capture.
pub fn app_router(orchestrator: Orchestrator, health: HealthState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/agent", post(invoke_agent))
        .with_state(AgentState { orchestrator })
        .merge(health::router(health))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

pub async fn index() -> Json<MessageBody> {
    Json(MessageBody { message: "Hello world".to_string() })
}

pub async fn invoke_agent(
    State(state): State<AgentState>,
    payload: Result<Json<AgentRequest>, JsonRejection>,
) -> Result<Json<AgentResponse>, Rejection> {
    let correlation_id = Uuid::new_v4().to_string();
    let span = info_span!("agent.request", correlation_id = %correlation_id);

    handle_agent_request(state, payload, correlation_id).instrument(span).await
}

async fn handle_agent_request(
    state: AgentState,
    payload: Result<Json<AgentRequest>, JsonRejection>,
    correlation_id: String,
) -> Result<Json<AgentResponse>, Rejection> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(
            event_name = "http.agent.rejected",
            correlation_id = %correlation_id,
            reason = %rejection.body_text(),
            "request body could not be parsed"
        );
        let error = InterfaceError::bad_request(rejection.body_text());
        reject(error.with_correlation_id(&correlation_id))
    })?;

    let input = request.into_input().map_err(|validation| {
        warn!(
            event_name = "http.agent.rejected",
            correlation_id = %correlation_id,
            reason = %validation,
            "request failed validation"
        );
        reject(InterfaceError::from(validation).with_correlation_id(&correlation_id))
    })?;

    let transcript = normalize(&input);
    info!(
        event_name = "http.agent.invoking",
        correlation_id = %correlation_id,
        turns = input.turn_count(),
        transcript_chars = transcript.as_str().chars().count(),
        "invoking agent"
    );

    match state.orchestrator.run(&transcript).await {
        Ok(response) => {
            info!(
                event_name = "http.agent.responded",
                correlation_id = %correlation_id,
                "agent answered"
            );
            Ok(Json(AgentResponse { response }))
        }
        Err(kind) => Err(reject(kind.into_interface(&correlation_id))),
    }
}

fn reject(error: InterfaceError) -> Rejection {
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(MessageBody { message: error.user_message().to_string() }))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    error!(event_name = "http.panic", detail = %detail, "request handler panicked");

    reject(InterfaceError::Internal { correlation_id: "panic".to_string() }).into_response()
}

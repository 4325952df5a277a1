use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use quote_flow::{
    ConversationRunner, QuoteFlowError, QuoteResult, Session, SlotState, TurnStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Instrument, error, info};
use uuid::Uuid;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub runner: ConversationRunner,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub session_id: String,
    pub user_text: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub session_id: String,
    pub message: String,
    pub state: SlotState,
    pub status: TurnStatus,
    pub quote: Option<QuoteResult>,
}

/// `None` allows any origin
pub fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect();
            layer.allow_origin(origins)
        }
        None => layer.allow_origin(Any),
    }
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/advice/start", post(start_conversation))
        .route("/advice/reply", post(reply))
        .route("/advice/session/{id}", get(get_session))
        .layer(from_fn(correlation_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn start_conversation(State(state): State<AppState>) -> ApiResult<StartResponse> {
    match state.runner.start().await {
        Ok(started) => Ok(Json(StartResponse {
            session_id: started.session_id,
            message: started.message,
        })),
        Err(e) => {
            error!(error = %e, "Failed to start conversation");
            Err(internal_error("Failed to start conversation", &e.to_string()))
        }
    }
}

async fn reply(
    State(state): State<AppState>,
    Json(request): Json<ReplyRequest>,
) -> ApiResult<ReplyResponse> {
    info!(
        session_id = %request.session_id,
        content_length = %request.user_text.len(),
        "Processing reply"
    );

    if request.session_id.trim().is_empty() {
        return Err(bad_request_error("session_id must not be empty"));
    }

    match state
        .runner
        .reply(&request.session_id, &request.user_text)
        .await
    {
        Ok(reply) => Ok(Json(ReplyResponse {
            session_id: reply.session_id,
            message: reply.outcome.message,
            state: reply.outcome.state,
            status: reply.outcome.status,
            quote: reply.outcome.quote,
        })),
        Err(e) => {
            error!(session_id = %request.session_id, error = %e, "Failed to process reply");
            Err(internal_error("Failed to process reply", &e.to_string()))
        }
    }
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Session> {
    match state.runner.session(&session_id).await {
        Ok(session) => Ok(Json(session)),
        Err(QuoteFlowError::SessionNotFound(_)) => {
            info!(session_id = %session_id, "Session not found");
            Err(not_found_error("Session not found", &session_id))
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to get session");
            Err(internal_error("Failed to get session", &e.to_string()))
        }
    }
}

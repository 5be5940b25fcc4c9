use axum::{
    Router,
    extract::{Path, Query, Request, State, rejection::QueryRejection},
    http::{HeaderValue, StatusCode},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post},
};
use dental_assist::controllers::{
    ChatOutcome, ClinicFilter, ReimbursementConfirmation, RequestFilter,
};
use dental_assist::lex::SessionInfo;
use dental_assist::validation::FileDescriptor;
use dental_assist::{
    AssistError, BotConfig, BotRuntime, ChatController, ChatExchange, Clinic, ClinicsController,
    LexChatbot, LocalStorage, ReimbursementForm, StatusController, UploadController,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

pub const CORRELATION_HEADER: &str = "x-correlation-id";

fn not_found_error(message: &str) -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message })))
}

fn query_error(rejection: QueryRejection) -> ApiError {
    warn!(error = %rejection.body_text(), "Rejected query string");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid query", "details": rejection.body_text() })),
    )
}

fn assist_error(err: AssistError) -> ApiError {
    match err {
        AssistError::Validation(fields) => {
            warn!(fields = fields.len(), "Validation failed");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "Validation failed", "fields": fields })),
            )
        }
        AssistError::MessageRejected(message) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
        }
        AssistError::Bot(info) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": info.user_message,
                "should_retry": info.should_retry,
                "code": info.code
            })),
        ),
        AssistError::NotFound(what) => not_found_error(&format!("Not found: {what}")),
        AssistError::Storage(e) => {
            error!(error = %e, "Storage failure reached a handler");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Storage failure", "details": e.to_string() })),
            )
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<LexChatbot>,
    pub chat: Arc<ChatController>,
    pub upload: Arc<UploadController>,
    pub status: Arc<StatusController>,
    pub clinics: Arc<ClinicsController>,
}

impl AppState {
    /// Connect the bot client to `runtime` and wire every controller to the
    /// same store.
    pub async fn new(bot: BotConfig, storage: LocalStorage, runtime: Arc<dyn BotRuntime>) -> Self {
        let bot = Arc::new(LexChatbot::connect(bot, storage.clone(), runtime).await);
        Self {
            chat: Arc::new(ChatController::new(bot.clone(), storage.clone())),
            upload: Arc::new(UploadController::new(bot.clone(), storage.clone())),
            status: Arc::new(StatusController::new(storage)),
            clinics: Arc::new(ClinicsController::new()),
            bot,
        }
    }
}

/// Tag every request with a correlation id, echoed back in the response.
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let header = HeaderValue::from_str(&correlation_id).ok();
    if let Some(value) = &header {
        request.headers_mut().insert(CORRELATION_HEADER, value.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;
    if let Some(value) = header {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(send_chat_message))
        .route("/chat/history", get(chat_history).delete(clear_chat_history))
        .route("/chat/reset", post(reset_chat))
        .route("/session", get(session_info))
        .route("/reimbursements", post(submit_reimbursement))
        .route(
            "/reimbursements/draft",
            get(load_draft).put(save_draft).delete(clear_draft),
        )
        .route("/uploads/validate", post(validate_upload))
        .route("/requests", get(list_requests))
        .route("/clinics", get(search_clinics))
        .route("/clinics/{id}", get(get_clinic))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(correlation_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "bot_initialized": state.bot.is_initialized().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

async fn send_chat_message(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatOutcome> {
    info!(length = request.message.chars().count(), "Chat message received");
    state
        .chat
        .send(&request.message)
        .await
        .map(Json)
        .map_err(assist_error)
}

async fn chat_history(State(state): State<AppState>) -> Json<Vec<ChatExchange>> {
    Json(state.chat.history().await)
}

async fn clear_chat_history(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "cleared": state.chat.clear_history().await }))
}

async fn reset_chat(State(state): State<AppState>) -> Json<Value> {
    state.chat.reset().await;
    Json(json!({
        "status": "reset",
        "user_id": state.bot.user_id().await
    }))
}

async fn session_info(State(state): State<AppState>) -> Json<SessionInfo> {
    Json(state.bot.session_info().await)
}

#[derive(Debug, Deserialize)]
pub struct ReimbursementRequest {
    pub form: ReimbursementForm,
    pub file: FileDescriptor,
}

async fn submit_reimbursement(
    State(state): State<AppState>,
    Json(request): Json<ReimbursementRequest>,
) -> Result<(StatusCode, Json<ReimbursementConfirmation>), ApiError> {
    let confirmation = state
        .upload
        .submit(&request.form, &request.file)
        .await
        .map_err(assist_error)?;
    info!(request_id = %confirmation.id, "Reimbursement accepted");
    Ok((StatusCode::CREATED, Json(confirmation)))
}

async fn load_draft(State(state): State<AppState>) -> Json<ReimbursementForm> {
    Json(state.upload.load_draft().await)
}

async fn save_draft(
    State(state): State<AppState>,
    Json(form): Json<ReimbursementForm>,
) -> ApiResult<Value> {
    state.upload.validate_form(&form).await.map_err(assist_error)?;
    Ok(Json(json!({ "saved": true })))
}

async fn clear_draft(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "cleared": state.upload.clear_draft().await }))
}

async fn validate_upload(
    State(state): State<AppState>,
    Json(file): Json<FileDescriptor>,
) -> Json<Value> {
    let validation = state.upload.validate_file(&file);
    let messages: Vec<String> = validation.errors.iter().map(ToString::to_string).collect();
    Json(json!({
        "valid": validation.valid,
        "errors": validation.errors,
        "messages": messages
    }))
}

async fn list_requests(
    State(state): State<AppState>,
    query: Result<Query<RequestFilter>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(filter) = query.map_err(query_error)?;
    let requests = state.status.list(&filter).await;
    let summary = state.status.summary().await;
    Ok(Json(json!({
        "requests": requests,
        "summary": summary
    })))
}

async fn search_clinics(
    State(state): State<AppState>,
    query: Result<Query<ClinicFilter>, QueryRejection>,
) -> ApiResult<Vec<Clinic>> {
    let Query(filter) = query.map_err(query_error)?;
    Ok(Json(state.clinics.search(&filter)))
}

async fn get_clinic(State(state): State<AppState>, Path(id): Path<u32>) -> ApiResult<Clinic> {
    state.clinics.get(id).map(Json).map_err(assist_error)
}

//! HTTP request handlers

use super::accounts::{AccountError, UserRecord, COMPOSE_CREDIT_COST, SUMMARIZE_CREDIT_COST};
use super::types::{
    AuthResponse, AuthStatusResponse, ChatBody, ChatResponse, ConversationListResponse,
    CreateConversationRequest, CreateConversationResponse, CreditsResponse, ErrorResponse,
    HealthResponse, InfoResponse, LoginInfoResponse, LoginQuery, LogoutResponse,
    MessageListResponse, ProfileResponse, SmartComposeRequest, SmartComposeResponse,
    SummarizeRequest, SummarizeResponse, UpgradeRequest, UpgradeResponse,
};
use super::AppState;
use crate::session::GoogleProfile;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/info", get(info))
        // Authentication
        .route("/api/auth/login", get(login_info))
        .route("/api/auth/google", post(google_auth))
        .route("/api/auth/status", get(auth_status))
        .route("/api/auth/logout", delete(logout))
        // Assistant
        .route("/api/ai/chat", post(chat))
        .route("/api/ai/smart-compose", post(smart_compose))
        .route("/api/ai/summarize", post(summarize))
        // User data
        .route("/api/user/profile", get(profile))
        .route("/api/user/credits", get(credits))
        .route("/api/user/upgrade", post(upgrade))
        .route(
            "/api/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route("/api/conversations/:id/messages", get(list_messages))
        .fallback(not_found)
        .with_state(state)
}

// ============================================================
// Service info
// ============================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        ai_service: "available",
        timestamp: Utc::now(),
    })
}

async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Jarvis AI Assistant",
        version: env!("CARGO_PKG_VERSION"),
        description: "Google Workspace AI Assistant with Jarvis personality",
        endpoints: json!({
            "auth": "/api/auth/*",
            "user": "/api/user/*",
            "ai": "/api/ai/*",
            "health": "/api/health"
        }),
    })
}

async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}

// ============================================================
// Authentication
// ============================================================

async fn login_info(Query(query): Query<LoginQuery>) -> Json<LoginInfoResponse> {
    let redirect_url = match &query.state {
        Some(state) => format!("{AUTHORIZE_URL}?state={state}"),
        None => AUTHORIZE_URL.to_string(),
    };
    Json(LoginInfoResponse {
        message: "Google OAuth login".to_string(),
        redirect_url,
        state: query.state,
    })
}

async fn google_auth(
    State(state): State<AppState>,
    body: Result<Json<GoogleProfile>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(profile) = body?;
    let outcome = state.accounts.login(&profile).await?;
    Ok(Json(AuthResponse {
        message: "Authentication successful".to_string(),
        session_id: outcome.user.id.clone(),
        user: outcome.user.to_json(),
        token: outcome.token,
        is_new_user: outcome.is_new_user,
        expires_in: outcome.expires_in,
    }))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, AppError> {
    let Some(token) = bearer_token(&headers) else {
        return Err(AppError::unauthorized());
    };
    let user_id = state.accounts.logout(token).await?;
    Ok(Json(LogoutResponse {
        message: "Logout successful".to_string(),
        user_id,
    }))
}

async fn auth_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return Json(AuthStatusResponse {
            authenticated: false,
            user: None,
            message: Some("No valid token provided".to_string()),
        })
        .into_response();
    };

    match state.accounts.authenticate(token).await {
        Ok(user) => Json(AuthStatusResponse {
            authenticated: true,
            user: Some(user.to_json()),
            message: None,
        })
        .into_response(),
        Err(e) => (
            StatusCode::UNAUTHORIZED,
            Json(AuthStatusResponse {
                authenticated: false,
                user: None,
                message: Some(e.to_string()),
            }),
        )
            .into_response(),
    }
}

// ============================================================
// Assistant
// ============================================================

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let user = current_user(&state, &headers).await?;
    let Json(body) = body?;
    let outcome = state
        .accounts
        .chat(&user.id, &body.message, body.conversation_id.as_deref())
        .await?;

    Ok(Json(ChatResponse {
        response: outcome.response,
        conversation_id: outcome.conversation_id,
        credits_used: outcome.credits_used,
        remaining_credits: outcome.remaining_credits,
        message_id: outcome.message_id,
    }))
}

async fn smart_compose(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SmartComposeRequest>, JsonRejection>,
) -> Result<Json<SmartComposeResponse>, AppError> {
    let user = current_user(&state, &headers).await?;
    let Json(body) = body?;
    let (composed_text, remaining_credits) = state
        .accounts
        .smart_compose(&user.id, &body.prompt, &body.kind)
        .await?;

    Ok(Json(SmartComposeResponse {
        composed_text,
        credits_used: COMPOSE_CREDIT_COST,
        remaining_credits,
        kind: body.kind,
    }))
}

async fn summarize(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<SummarizeResponse>, AppError> {
    let user = current_user(&state, &headers).await?;
    let Json(body) = body?;
    let (summary, remaining_credits) = state.accounts.summarize(&user.id, &body.text).await?;

    Ok(Json(SummarizeResponse {
        original_length: body.text.chars().count(),
        summary_length: summary.chars().count(),
        summary,
        credits_used: SUMMARIZE_CREDIT_COST,
        remaining_credits,
    }))
}

// ============================================================
// User data
// ============================================================

async fn profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = current_user(&state, &headers).await?;
    Ok(Json(ProfileResponse {
        user: user.to_json(),
    }))
}

async fn credits(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CreditsResponse>, AppError> {
    let user = current_user(&state, &headers).await?;
    let usage = state.accounts.usage(&user.id, Utc::now()).await;
    Ok(Json(CreditsResponse {
        credits: user.credits,
        usage_today: usage.today,
        usage_this_month: usage.this_month,
    }))
}

async fn upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<UpgradeRequest>, JsonRejection>,
) -> Result<Json<UpgradeResponse>, AppError> {
    let user = current_user(&state, &headers).await?;
    let Json(body) = body?;
    let credits = state.accounts.upgrade(&user.id, &body.package).await?;
    Ok(Json(UpgradeResponse {
        message: format!("Credits upgraded to {}", body.package),
        credits,
    }))
}

async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConversationListResponse>, AppError> {
    let user = current_user(&state, &headers).await?;
    let conversations = state.accounts.conversations(&user.id).await;
    Ok(Json(ConversationListResponse {
        total: conversations.len(),
        conversations,
    }))
}

async fn create_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateConversationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateConversationResponse>), AppError> {
    let user = current_user(&state, &headers).await?;
    let Json(body) = body?;
    let (conversation, message) = state
        .accounts
        .create_conversation(
            &user.id,
            body.title.as_deref(),
            body.initial_message.as_deref(),
        )
        .await;
    let response = CreateConversationResponse {
        conversation,
        message,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MessageListResponse>, AppError> {
    let user = current_user(&state, &headers).await?;
    let messages = state.accounts.messages(&user.id, &id).await?;
    Ok(Json(MessageListResponse {
        total: messages.len(),
        messages,
    }))
}

// ============================================================
// Helpers
// ============================================================

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<UserRecord, AppError> {
    let Some(token) = bearer_token(headers) else {
        return Err(AppError::unauthorized());
    };
    Ok(state.accounts.authenticate(token).await?)
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unauthorized(String),
    PaymentRequired(String),
    NotFound(String),
    /// Body could not be extracted; carries the extractor's status
    InvalidBody(StatusCode, String),
}

impl AppError {
    fn unauthorized() -> Self {
        AppError::Unauthorized("Unauthorized".to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidBody(rejection.status(), rejection.body_text())
    }
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        let message = e.to_string();
        match e {
            AccountError::Unauthorized | AccountError::TokenExpired => {
                AppError::Unauthorized(message)
            }
            AccountError::MissingFields
            | AccountError::EmptyMessage
            | AccountError::TextTooShort
            | AccountError::InvalidPackage => AppError::BadRequest(message),
            AccountError::InsufficientCredits => AppError::PaymentRequired(message),
            AccountError::ConversationNotFound => AppError::NotFound(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidBody(status, msg) => (status, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

//! HTTP request handlers
//!
//! VR session API: PIN issuance, redemption, QR rendering and administration.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use image::ImageFormat;
use qrcode::QrCode;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use vrgate_session::SessionError;

use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
        // VR session API
        .route("/api/v1/vr/sessions", post(create_session_handler))
        .route(
            "/api/v1/vr/sessions/:pin",
            get(validate_session_handler).delete(revoke_session_handler),
        )
        .route("/api/v1/vr/sessions/:pin/qr", get(session_qr_handler))
        .route("/api/v1/vr/sweep", post(sweep_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Envelope
// ============================================================================

/// JSON envelope shared by every API response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Error response with a status code and message
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn invalid_destination() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "Missing or invalid \"destination\" field",
        )
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidPayload => Self::invalid_destination(),
            SessionError::InvalidTtl => Self::new(StatusCode::BAD_REQUEST, "Invalid session TTL"),
            SessionError::InvalidFormat { width } => Self::new(
                StatusCode::BAD_REQUEST,
                format!("Invalid PIN format. Must be {} digits.", width),
            ),
            SessionError::NotFound => Self::new(StatusCode::NOT_FOUND, "PIN not found or expired"),
            SessionError::Expired => Self::new(StatusCode::GONE, "PIN has expired"),
            SessionError::AlreadyUsed => {
                Self::new(StatusCode::CONFLICT, "PIN has already been used")
            }
            SessionError::IssuanceExhausted { .. } => {
                warn!("Rejecting session creation: {}", err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "No PIN available, try again later",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

// ============================================================================
// Session Handlers
// ============================================================================

/// Session creation response payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    /// The PIN to display
    pub pin: String,
    /// Normalized destination bound to the PIN
    pub destination: String,
    /// Expiry as Unix epoch milliseconds
    pub expires_at: i64,
}

/// Create a session for a destination
///
/// The destination is trimmed and lowercased before it is bound to the PIN.
async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedSession>>), ApiError> {
    let Json(body) = body.map_err(|_| ApiError::invalid_destination())?;

    let destination = body
        .get("destination")
        .and_then(|v| v.as_str())
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .ok_or_else(ApiError::invalid_destination)?;

    let issued = state.session_manager.issue_default(&destination).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(CreatedSession {
            pin: issued.code,
            destination,
            expires_at: issued.expires_at.timestamp_millis(),
        })),
    ))
}

/// Session redemption response payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedSession {
    /// Destination bound to the PIN
    pub destination: String,
    /// Tells the viewer to enter VR immediately
    #[serde(rename = "autoVR")]
    pub auto_vr: bool,
}

/// Redeem a PIN and return its destination
async fn validate_session_handler(
    State(state): State<Arc<AppState>>,
    Path(pin): Path<String>,
) -> Result<Json<ApiResponse<ValidatedSession>>, ApiError> {
    let destination = state.session_manager.redeem(&pin).await?;

    Ok(Json(ApiResponse::ok(ValidatedSession {
        destination,
        auto_vr: true,
    })))
}

/// Revoke a PIN
async fn revoke_session_handler(
    State(state): State<Arc<AppState>>,
    Path(pin): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.session_manager.revoke(&pin).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Query parameters for QR code generation
#[derive(Debug, Deserialize)]
pub struct QrQuery {
    /// QR code size in pixels (default 200)
    #[serde(default = "default_qr_size")]
    size: u32,
}

fn default_qr_size() -> u32 {
    200
}

/// Render a QR code for a live PIN
///
/// The QR code contains: `<viewer_url>?pin=<pin>&autoVR=true`. Looking up the
/// PIN here does not consume it.
async fn session_qr_handler(
    State(state): State<Arc<AppState>>,
    Path(pin): Path<String>,
    Query(query): Query<QrQuery>,
) -> Result<Response, ApiError> {
    let token = state.session_manager.peek(&pin).await.map_err(|e| match e {
        SessionError::InvalidFormat { .. } => ApiError::from(e),
        _ => ApiError::from(SessionError::NotFound),
    })?;

    let link = state.viewer_link(&token.code);
    let code = QrCode::new(link.as_bytes())
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let image = code.render::<image::Luma<u8>>().build();

    let size = query.size.clamp(64, 1024);
    let resized =
        image::imageops::resize(&image, size, size, image::imageops::FilterType::Nearest);

    // Encode as PNG
    let mut buffer = Cursor::new(Vec::new());
    resized
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/png")],
        buffer.into_inner(),
    )
        .into_response())
}

// ============================================================================
// Administration
// ============================================================================

/// Sweep result
#[derive(Debug, Serialize)]
pub struct SweepResult {
    /// Expired sessions removed by this sweep
    pub removed: usize,
}

/// Remove expired sessions now
async fn sweep_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SweepResult>> {
    let removed = state.session_manager.sweep().await;
    Json(ApiResponse::ok(SweepResult { removed }))
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    /// Sessions that have not yet expired
    pub live_sessions: usize,
    /// Stored sessions, including expired ones not yet swept
    pub stored_sessions: usize,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION").to_string(),
        live_sessions: state.session_manager.live_session_count().await,
        stored_sessions: state.session_manager.session_count().await,
    })
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the dashboard.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    // ── Request Errors ──────────────────────────────────────────────────
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("Device {0} is locked")]
    DeviceLocked(String),

    // ── Login Errors ────────────────────────────────────────────────────
    /// The cloud accepted the request but refused the credentials.
    /// Carries the remote message verbatim.
    #[error("{0}")]
    LoginRejected(String),

    /// The login request itself failed (network, HTTP status, bad body).
    #[error("Login failed: {0}")]
    LoginFailed(String),

    // ── Cloud Errors ────────────────────────────────────────────────────
    #[error("Cloud API error: {0}")]
    Remote(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for DashboardError {
    fn from(e: std::io::Error) -> Self {
        DashboardError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(e: serde_json::Error) -> Self {
        DashboardError::Storage(e.to_string())
    }
}

impl DashboardError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            DashboardError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            DashboardError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            DashboardError::DeviceLocked(_) => (StatusCode::LOCKED, "device_locked"),
            DashboardError::LoginRejected(_) => (StatusCode::UNAUTHORIZED, "login_rejected"),
            DashboardError::LoginFailed(_) => (StatusCode::UNAUTHORIZED, "login_failed"),
            DashboardError::Remote(_) => (StatusCode::BAD_GATEWAY, "remote_error"),
            DashboardError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            DashboardError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!("{code}: {self}");
        }

        let body = json!({
            "success": false,
            "code": code,
            "message": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}

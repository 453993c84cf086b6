//! Route handlers for the dashboard.
//!
//! All handlers receive `SharedState` via Axum state extraction and take the
//! store lock for the whole request. Endpoints that touch devices check
//! `is_authenticated()` before calling any store mutator.

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::DashboardError;
use crate::store::{Device, DeviceState, SessionStore};
use crate::SharedState;

pub fn dashboard_router(state: SharedState) -> Router {
    Router::new()
        // ── Pages ────────────────────────────────────────────────────────
        .route("/", get(index))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
        // ── Devices ──────────────────────────────────────────────────────
        .route("/devices", get(devices))
        .route("/refresh", get(refresh_devices))
        .route("/control", post(control_device))
        .route("/set_lock", post(set_lock_state))
        // ── Health ───────────────────────────────────────────────────────
        .route("/status", get(status))
        .with_state(state)
}

fn require_auth(store: &SessionStore) -> Result<(), DashboardError> {
    if store.is_authenticated() {
        Ok(())
    } else {
        Err(DashboardError::Unauthorized)
    }
}

// =============================================================================
// Health
// =============================================================================

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "tuya-dashboard",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// Pages
// =============================================================================

/// GET / — Devices with lock state, or a redirect to the login page.
async fn index(State(state): State<SharedState>) -> Response {
    let store = state.store.lock().await;
    if !store.is_authenticated() {
        return Redirect::to("/login").into_response();
    }
    Json(store.devices_with_locks()).into_response()
}

async fn login_page(State(state): State<SharedState>) -> impl IntoResponse {
    let store = state.store.lock().await;
    Json(json!({ "authenticated": store.is_authenticated() }))
}

#[derive(Deserialize)]
struct LoginForm {
    username: Option<String>,
    password: Option<String>,
}

/// POST /login — Authenticate, then pull the device list.
async fn login(
    State(state): State<SharedState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<Value>, DashboardError> {
    let (Some(username), Some(password)) = (
        form.username.filter(|u| !u.is_empty()),
        form.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(DashboardError::BadRequest("Missing credentials".into()));
    };

    let mut store = state.store.lock().await;
    store.authenticate(&username, &password).await?;
    store.discover_devices().await;

    Ok(Json(json!({ "success": true, "redirect": "/" })))
}

async fn logout(State(state): State<SharedState>) -> Redirect {
    state.store.lock().await.logout();
    Redirect::to("/login")
}

// =============================================================================
// Devices
// =============================================================================

/// GET /devices — Cached devices with lock state.
async fn devices(State(state): State<SharedState>) -> Result<Json<Vec<Device>>, DashboardError> {
    let store = state.store.lock().await;
    require_auth(&store)?;
    Ok(Json(store.devices_with_locks()))
}

/// GET /refresh — Re-run discovery and return the result.
async fn refresh_devices(
    State(state): State<SharedState>,
) -> Result<Json<Value>, DashboardError> {
    let mut store = state.store.lock().await;
    require_auth(&store)?;
    store.discover_devices().await;
    Ok(Json(json!({
        "success": true,
        "devices": store.devices_with_locks(),
    })))
}

#[derive(Deserialize)]
struct ControlBody {
    device_id: Option<String>,
    state: Option<Value>,
}

/// POST /control — Switch a device on or off. Locked devices are refused.
async fn control_device(
    State(state): State<SharedState>,
    Json(body): Json<ControlBody>,
) -> Result<Json<Value>, DashboardError> {
    let mut store = state.store.lock().await;
    require_auth(&store)?;

    let device_id = body
        .device_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| DashboardError::BadRequest("Missing parameters".into()))?;
    let desired = body
        .state
        .as_ref()
        .and_then(DeviceState::from_json)
        .ok_or_else(|| DashboardError::BadRequest("Missing parameters".into()))?;

    if store.get_device_lock_state(&device_id) {
        return Err(DashboardError::DeviceLocked(device_id));
    }

    store.control_device(&device_id, desired).await;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
struct LockBody {
    device_id: Option<String>,
    locked: Option<bool>,
}

/// POST /set_lock — Set the local lock flag for a device.
async fn set_lock_state(
    State(state): State<SharedState>,
    Json(body): Json<LockBody>,
) -> Result<Json<Value>, DashboardError> {
    let mut store = state.store.lock().await;
    require_auth(&store)?;

    let (Some(device_id), Some(locked)) = (body.device_id.filter(|id| !id.is_empty()), body.locked)
    else {
        return Err(DashboardError::BadRequest("Missing parameters".into()));
    };

    store.set_device_lock_state(&device_id, locked)?;
    Ok(Json(json!({ "success": true })))
}

//! Session and device state for the single dashboard user.
//!
//! Three records live side by side in the data directory:
//! - `credentials.json`: the current [`Session`]
//! - `devices.json`: the last successful discovery result
//! - `lock_states.json`: the local lock overlay, keyed by device id
//!
//! Each record is loaded and written on its own. Nothing ties them together
//! transactionally, so locks may refer to devices that no longer exist.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, error, info, warn};

use super::device::{Device, DeviceState};
use super::records::JsonRecord;
use crate::cloud::{CloudApi, Credentials, TokenSet};
use crate::config::LoginDefaults;
use crate::error::DashboardError;

pub const SESSION_FILE: &str = "credentials.json";
pub const DEVICES_FILE: &str = "devices.json";
pub const LOCKS_FILE: &str = "lock_states.json";

/// Lock flag per device id. Ids absent from the map are unlocked.
pub type LockStates = BTreeMap<String, bool>;

/// Access/refresh token bundle plus its computed expiry (unix seconds).
///
/// A record missing any field fails to deserialize and is treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub expires_at: i64,
}

impl Session {
    pub fn from_tokens(tokens: TokenSet, now: i64) -> Self {
        Self {
            expires_at: now.saturating_add(i64::try_from(tokens.expires_in).unwrap_or(i64::MAX)),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
        }
    }

    /// Valid strictly before `expires_at`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        !self.access_token.is_empty() && now < self.expires_at
    }

    /// Stale strictly after `expires_at`.
    ///
    /// Note the asymmetry with [`Session::is_valid_at`]: at exactly
    /// `expires_at` the session is neither valid nor stale, so the pre-flight
    /// refresh is skipped for that one second.
    pub fn is_stale_at(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Owns the session, the cached device list and the lock overlay, and
/// mirrors every change to disk.
///
/// Not synchronized: callers that serve concurrent requests must hold it
/// behind a lock.
pub struct SessionStore {
    api: Box<dyn CloudApi>,
    login: LoginDefaults,

    session_record: JsonRecord<Session>,
    device_record: JsonRecord<Vec<Device>>,
    lock_record: JsonRecord<LockStates>,

    session: Option<Session>,
    devices: Vec<Device>,
    locks: LockStates,
}

impl SessionStore {
    /// Load whatever state is on disk. Each record falls back to its empty
    /// default independently.
    pub fn open(data_dir: &Path, api: Box<dyn CloudApi>, login: LoginDefaults) -> Self {
        let session_record = JsonRecord::new(data_dir.join(SESSION_FILE));
        let device_record = JsonRecord::new(data_dir.join(DEVICES_FILE));
        let lock_record = JsonRecord::new(data_dir.join(LOCKS_FILE));

        let session = session_record.load();
        let devices: Vec<Device> = device_record.load().unwrap_or_default();
        let locks: LockStates = lock_record.load().unwrap_or_default();

        info!(
            "Loaded state from {}: session={}, devices={}, locks={}",
            data_dir.display(),
            session.is_some(),
            devices.len(),
            locks.len()
        );

        Self {
            api,
            login,
            session_record,
            device_record,
            lock_record,
            session,
            devices,
            locks,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    // ── Authentication ──────────────────────────────────────────────

    /// Log in with the configured country code, biz type and origin.
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<(), DashboardError> {
        let result = self
            .api
            .login(Credentials {
                username,
                password,
                country_code: &self.login.country_code,
                biz_type: &self.login.biz_type,
                from: &self.login.from,
            })
            .await;
        self.finish_login(result)
    }

    /// Log in with explicit region parameters.
    pub async fn authenticate_with(
        &mut self,
        credentials: Credentials<'_>,
    ) -> Result<(), DashboardError> {
        let result = self.api.login(credentials).await;
        self.finish_login(result)
    }

    fn finish_login(
        &mut self,
        result: Result<TokenSet, DashboardError>,
    ) -> Result<(), DashboardError> {
        let tokens = result.inspect_err(|e| warn!("Login failed: {e}"))?;
        let session = Session::from_tokens(tokens, now());
        info!("Logged in, session valid until {}", format_expiry(session.expires_at));
        self.install_session(session);
        Ok(())
    }

    fn install_session(&mut self, session: Session) {
        if let Err(e) = self.session_record.save(&session) {
            error!("Failed to persist session: {e}");
        }
        self.session = Some(session);
    }

    /// Forget the session and cached devices. Lock states survive.
    pub fn logout(&mut self) {
        self.session = None;
        self.devices.clear();

        if let Err(e) = self.session_record.clear() {
            warn!("Failed to remove {}: {e}", self.session_record.path().display());
        }
        if let Err(e) = self.device_record.clear() {
            warn!("Failed to remove {}: {e}", self.device_record.path().display());
        }

        info!("Logged out");
    }

    pub fn is_authenticated(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.is_valid_at(now()))
    }

    /// Trade the refresh token for a new session. Failures keep the old
    /// session and are only logged.
    pub async fn refresh_session(&mut self) {
        let Some(refresh_token) = self
            .session
            .as_ref()
            .map(|session| session.refresh_token.as_str())
            .filter(|token| !token.is_empty())
        else {
            return;
        };

        let result = self.api.refresh(refresh_token).await;
        match result {
            Ok(tokens) => {
                let session = Session::from_tokens(tokens, now());
                info!("Session refreshed, valid until {}", format_expiry(session.expires_at));
                self.install_session(session);
            }
            Err(e) => warn!("Session refresh failed: {e}"),
        }
    }

    async fn ensure_fresh_token(&mut self) {
        self.ensure_fresh_token_at(now()).await;
    }

    async fn ensure_fresh_token_at(&mut self, now: i64) {
        if self
            .session
            .as_ref()
            .is_some_and(|session| session.is_stale_at(now))
        {
            debug!("Access token expired, refreshing before request");
            self.refresh_session().await;
        }
    }

    fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.access_token.as_str())
    }

    // ── Devices ─────────────────────────────────────────────────────

    /// Replace the cached device list with a fresh discovery result.
    ///
    /// A successful response always replaces the cache, even when it lists
    /// no devices. Any failure leaves the cache as it was.
    pub async fn discover_devices(&mut self) {
        if !self.is_authenticated() {
            debug!("Skipping discovery: not authenticated");
            return;
        }
        self.ensure_fresh_token().await;

        let Some(access_token) = self.access_token() else {
            return;
        };

        let result = self.api.discover(access_token).await;
        match result {
            Ok(devices) => {
                info!("Discovered {} devices", devices.len());
                self.devices = devices;
                if let Err(e) = self.device_record.save(&self.devices) {
                    error!("Failed to persist devices: {e}");
                }
            }
            Err(e) => warn!("Device discovery failed: {e}"),
        }
    }

    /// Send an on/off command. Best effort: the outcome is never reported
    /// and the device may not have changed state.
    pub async fn control_device(&mut self, device_id: &str, state: DeviceState) {
        if !self.is_authenticated() {
            debug!("Skipping control of {device_id}: not authenticated");
            return;
        }
        self.ensure_fresh_token().await;

        let Some(access_token) = self.access_token() else {
            return;
        };

        let result = self.api.control(access_token, device_id, state).await;
        match result {
            Ok(()) => debug!("Sent {state:?} to {device_id}"),
            Err(e) => warn!("Control of {device_id} failed: {e}"),
        }
    }

    pub fn list_devices(&self) -> &[Device] {
        &self.devices
    }

    /// Cached devices, each with a `locked` field merged in.
    pub fn devices_with_locks(&self) -> Vec<Device> {
        self.devices
            .iter()
            .map(|device| {
                let locked = device
                    .id()
                    .is_some_and(|id| self.get_device_lock_state(id));
                device.with_lock(locked)
            })
            .collect()
    }

    // ── Lock overlay ────────────────────────────────────────────────

    pub fn get_device_lock_state(&self, device_id: &str) -> bool {
        self.locks.get(device_id).copied().unwrap_or(false)
    }

    /// Set and persist a lock flag. The id is not checked against the
    /// device list.
    pub fn set_device_lock_state(
        &mut self,
        device_id: &str,
        locked: bool,
    ) -> Result<(), DashboardError> {
        self.locks.insert(device_id.to_string(), locked);
        self.lock_record.save(&self.locks)?;
        info!("Device {device_id} {}", if locked { "locked" } else { "unlocked" });
        Ok(())
    }

    pub fn lock_states(&self) -> &LockStates {
        &self.locks
    }
}

fn format_expiry(expires_at: i64) -> String {
    Utc.timestamp_opt(expires_at, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| expires_at.to_string())
}

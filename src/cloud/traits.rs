use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DashboardError;
use crate::store::{Device, DeviceState};

/// Tokens returned by the cloud after login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Everything the login endpoint needs.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub country_code: &'a str,
    pub biz_type: &'a str,
    pub from: &'a str,
}

/// Remote home-automation API used by the session store.
///
/// Implementations only speak the wire protocol. Deciding which failures
/// are surfaced and which are swallowed is the store's job.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Exchange a username and password for tokens.
    ///
    /// Returns `LoginRejected` when the cloud refuses the credentials and
    /// `LoginFailed` when the request itself could not be completed.
    async fn login(&self, credentials: Credentials<'_>) -> Result<TokenSet, DashboardError>;

    /// Trade a refresh token for a fresh token set.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, DashboardError>;

    /// Enumerate the devices registered to the account.
    async fn discover(&self, access_token: &str) -> Result<Vec<Device>, DashboardError>;

    /// Ask a device to switch on or off. Only transport failures are reported.
    async fn control(
        &self,
        access_token: &str,
        device_id: &str,
        state: DeviceState,
    ) -> Result<(), DashboardError>;
}

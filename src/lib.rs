pub mod api;
pub mod cloud;
pub mod config;
pub mod error;
pub mod store;

pub use config::Config;
pub use error::DashboardError;

use std::sync::Arc;
use tokio::sync::Mutex;

use cloud::TuyaClient;
use store::SessionStore;

/// Shared application state passed to all API handlers.
///
/// The store sits behind a mutex so only one request reads or writes the
/// on-disk records at a time.
pub struct AppState {
    pub config: Config,
    pub store: Mutex<SessionStore>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, DashboardError> {
        let api = TuyaClient::new(&config.tuya_base_url, config.http_timeout)?;
        let store = SessionStore::open(&config.data_dir, Box::new(api), config.login.clone());
        Ok(Self {
            config,
            store: Mutex::new(store),
        })
    }
}

pub type SharedState = Arc<AppState>;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://px1.tuyaus.com/homeassistant";

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,

    // ── Storage ─────────────────────────────────────────────────────────
    /// Directory holding the credentials, devices and lock state records.
    pub data_dir: PathBuf,

    // ── Tuya Cloud ──────────────────────────────────────────────────────
    pub tuya_base_url: String,
    pub login: LoginDefaults,
    pub http_timeout: Duration,
}

/// Account region parameters sent with every login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginDefaults {
    pub country_code: String,
    pub biz_type: String,
    pub from: String,
}

impl Default for LoginDefaults {
    fn default() -> Self {
        Self {
            country_code: "95".into(),
            biz_type: "tuya".into(),
            from: "tuya".into(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = LoginDefaults::default();

        let data_dir = match std::env::var("DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::home_dir()
                .map(|home| home.join("tuya"))
                .context("Could not determine home directory; set DATA_DIR")?,
        };

        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".into())
                .parse()
                .context("Invalid PORT")?,

            data_dir,

            tuya_base_url: std::env::var("TUYA_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            login: LoginDefaults {
                country_code: std::env::var("TUYA_COUNTRY_CODE")
                    .unwrap_or(defaults.country_code),
                biz_type: std::env::var("TUYA_BIZ_TYPE").unwrap_or(defaults.biz_type),
                from: std::env::var("TUYA_FROM").unwrap_or(defaults.from),
            },
            http_timeout: Duration::from_secs(
                std::env::var("HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".into())
                    .parse()
                    .context("Invalid HTTP_TIMEOUT_SECS")?,
            ),
        })
    }

    /// Address the HTTP server binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

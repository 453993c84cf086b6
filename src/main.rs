use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use tuya_dashboard::{api, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tuya_dashboard=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("tuya-dashboard v{}", env!("CARGO_PKG_VERSION"));
    info!("State directory: {}", config.data_dir.display());
    info!("Tuya API: {}", config.tuya_base_url);

    let addr = config.listen_addr();
    let state: SharedState = Arc::new(AppState::new(config)?);

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

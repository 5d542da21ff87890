use std::net::SocketAddr;
use std::time::Duration;

use survey_backend::{
    config::{get_config, init_config},
    database::pool::{create_pool, run_migrations},
    routes, AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("survey_backend=info,tower_http=info")),
        )
        .init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    run_migrations(&pool).await?;

    let app_state = AppState::new(pool, config);

    {
        let state = app_state.clone();
        let interval = Duration::from_secs(config.sweep_interval_seconds.max(1));
        tokio::spawn(async move {
            loop {
                let now = chrono::Utc::now();
                if let Err(e) = state.distribution_service.close_expired(now).await {
                    tracing::error!(error = ?e, "expired distribution sweep failed");
                }
                match state.analytics_service.purge_expired(now).await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "expired analytics cache rows purged"),
                    Err(e) => tracing::error!(error = ?e, "analytics cache purge failed"),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    let app = routes::router(app_state, config);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

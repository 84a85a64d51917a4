use std::sync::Arc;

use petwatch::app::web::{router, AppState, SessionStore};
use petwatch::config::Settings;
use petwatch::utils::logger;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init_web_logger();

    let settings = Settings::from_env();
    let port: u16 = std::env::var("PETWATCH_PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(8080);

    let state = AppState::new(settings);
    let store = state.store.clone();
    let app = router(state);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("🐾 petwatch web viewer listening on port {port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown(store))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown(store: Arc<SessionStore>) {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, tearing down sessions");
    store.clear().await;
}

use anyhow::Context;
use tally_server::{telemetry, AppState, Authenticator, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    telemetry::init("tally-server", config.log_format)?;

    let db = tally_storage::create_db(&config.database)
        .await
        .with_context(|| format!("opening database {}", config.database.display()))?;

    let auth = Authenticator::new(config.jwt_secret(), config.jwt_audience.as_deref());
    let app = tally_server::app(AppState::new(db, auth), config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(addr = %config.bind, database = %config.database.display(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

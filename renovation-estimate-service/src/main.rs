use renovation_estimate_service::{ServiceConfig, create_app, telemetry::init_tracing};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the process environment still applies.
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServiceConfig::from_env().inspect_err(|e| {
        error!(error = %e, "Invalid configuration");
    })?;

    let app = create_app(&config)?;
    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    let addr = listener.local_addr()?;

    info!("Renovation Estimate Service starting on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Estimate endpoint: POST http://{}/estimates", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

use radiology_report_service::{ServiceConfig, create_app, telemetry::init_tracing};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let app = create_app(&config)?;
    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    let addr = listener.local_addr()?;

    info!("Radiology Report Service starting on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Prediction endpoint: POST http://{}/get-prediction", addr);
    info!("Batch fusion endpoint: POST http://{}/fuse", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

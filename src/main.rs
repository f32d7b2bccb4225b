use std::env;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_renamer::{create_router, AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pdf_renamer=debug,tower_http=debug,axum::rejection=trace".into());
    let json_logs = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }

    // Load configuration
    let config = Config::from_env()?;
    config.ensure_directories()?;

    tracing::info!("Starting PDF Renamer Service");
    tracing::info!("Max file size: {}MB", config.max_file_size_mb);
    tracing::info!("OCR language: {}, concurrency: {}", config.ocr_language, config.ocr_concurrency);
    tracing::info!(
        "Uploads: {}, renamed: {}, temp: {}",
        config.upload_dir.display(),
        config.renamed_dir.display(),
        config.temp_dir.display()
    );

    // Port from environment for PaaS deployments
    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(config.server_port);
    let addr = format!("{}:{}", config.server_host, port);

    let state = AppState::new(config)?;
    let (rasterizer, ocr) = state.tool_status().await?;
    if !rasterizer || !ocr {
        tracing::warn!(
            rasterizer_available = rasterizer,
            ocr_available = ocr,
            "External tools missing, every file will fail until they are installed"
        );
    }

    let app = create_router(state);

    tracing::info!("Server listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

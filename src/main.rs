//! Iris Serve - classifier HTTP server
//!
//! Loads the model artifact once, then serves `/predict`, `/health`,
//! `/metrics` and `/metrics/summary`. A model that fails to load aborts
//! startup.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iris_serve::config::{Config, LogFormat};
use iris_serve::{create_router, inference, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    init_tracing(config.log_format);

    tracing::info!("Iris Serve starting...");
    tracing::info!(environment = %config.environment, model_path = %config.model_path, "Configuration loaded");

    if config.expose_error_details && config.is_production() {
        tracing::warn!("EXPOSE_ERROR_DETAILS is enabled in production; inference errors are returned verbatim");
    }

    // Load model - no partial-service mode
    let model = match inference::load_model(&config.model_path) {
        Ok(model) => model,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load model, aborting startup");
            return ExitCode::FAILURE;
        }
    };

    match serve(config, Arc::new(model)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Server error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "iris_serve=info,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config, model: inference::SharedClassifier) -> anyhow::Result<()> {
    let addr = config.bind_addr();

    let state = AppState::new(model, config).context("Failed to initialize metrics registry")?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

//! Search Client Main Entry Point
//!
//! Connects to the configured cluster and runs the walkthrough, logging every step.

use dotenv::dotenv;
use search_client::{ClientAppError, ClientSettings, Dependencies};
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing() -> Result<(), ClientAppError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("search_client=info,search_client_repository=info"));

    let json_output = env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .map_err(|e| ClientAppError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "search-client",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .try_init()
            .map_err(|e| ClientAppError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "search-client",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), ClientAppError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing()?;

    info!("Starting search client walkthrough");

    let settings = ClientSettings::from_env()?;

    let deps = match Dependencies::new(settings).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let report = deps.walkthrough.run().await;
    for step in &report.steps {
        info!(
            step = step.name,
            passed = step.passed,
            detail = %step.detail,
            "Walkthrough step"
        );
    }

    if report.passed() {
        info!(steps = report.steps.len(), "Walkthrough completed successfully");
        Ok(())
    } else {
        let err = ClientAppError::WalkthroughFailed {
            failed: report.failed_count(),
            total: report.steps.len(),
        };
        error!(error = %err, "Walkthrough failed");
        Err(err)
    }
}

// src/main.rs
mod api;
mod catalog;
mod config;
mod model;
mod optimizer;

use std::sync::Arc;

use config::AppConfig;
use optimizer::PackOptimizer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Before the subscriber so RUST_LOG from .env applies.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = dotenv {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            tracing::warn!("could not load .env: {err}");
        }
    }

    let app_config = AppConfig::from_env();

    // The catalog is frozen here; a bad catalog must stop the process.
    let catalog = catalog::load(app_config.catalog.source()).inspect_err(|err| {
        tracing::error!("invalid pack catalog: {err}");
    })?;
    let optimizer = PackOptimizer::new(catalog, app_config.optimizer.solver_config())
        .inspect_err(|err| tracing::error!("solver setup failed: {err}"))?;

    tracing::info!(
        mode = %optimizer.default_mode(),
        mode_override = optimizer.allows_mode_override(),
        "pack service starting"
    );
    api::start_api_server(app_config.api, Arc::new(optimizer)).await?;
    Ok(())
}

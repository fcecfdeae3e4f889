//! StoryReel worker binary.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_pipeline::{require_env, PipelineContext};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("reel=info".parse().unwrap()))
        .init();

    info!("Starting storyreel-worker");

    // Fail fast with every missing variable named at once
    if let Err(e) = require_env() {
        error!("{}", e);
        std::process::exit(1);
    }

    let ctx = match PipelineContext::from_env() {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Failed to build pipeline context: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = ctx.ensure_buckets().await {
        error!("Failed to provision buckets: {}", e);
        std::process::exit(1);
    }

    info!("Pipeline ready; waiting for work");

    // The HTTP surface drives the engines in-process; this binary holds
    // the runtime alive until shutdown.
    tokio::signal::ctrl_c().await.ok();
    info!("Worker shutdown complete");
}

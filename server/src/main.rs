//! Chorus Server
//!
//! An HTTP server that queues speech and sound commands on a native speech
//! engine and exposes its voice settings.
//!
//! Usage:
//!   CHORUS_ENGINE=/path/to/engine.dll cargo run --release -p chorus-server
//!
//! The server listens on http://127.0.0.1:7902 by default. Without
//! CHORUS_ENGINE it runs against a simulated engine.

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, warn};

use chorus_server::native::NativeEngine;
use chorus_server::{router, Gateway, ServerConfig, SimulatedEngine};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chorus_server=info".parse()?)
                .add_directive("hyper=warn".parse()?),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let gateway = Gateway::from_boxed(build_engine(&config)?);
    if config.enable_on_start {
        gateway.enable().await?;
    }

    let listener = TcpListener::bind(&config.addr).await?;
    info!("Chorus server listening on http://{}", config.addr);

    axum::serve(listener, router(gateway.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    gateway.shutdown().await;
    info!("Chorus server stopped");
    Ok(())
}

#[cfg(feature = "dynamic-engine")]
fn build_engine(config: &ServerConfig) -> Result<Box<dyn NativeEngine>> {
    use chorus_server::native::DynamicEngine;

    match &config.engine_path {
        Some(path) => {
            info!("Loading native engine from {}", path.display());
            let engine = DynamicEngine::load(path, config.engine_log.as_deref(), config.engine_log_level)?;
            Ok(Box::new(engine))
        }
        None => Ok(simulated()),
    }
}

#[cfg(not(feature = "dynamic-engine"))]
fn build_engine(config: &ServerConfig) -> Result<Box<dyn NativeEngine>> {
    if let Some(path) = &config.engine_path {
        anyhow::bail!(
            "cannot load {}: built without the dynamic-engine feature",
            path.display()
        );
    }
    Ok(simulated())
}

fn simulated() -> Box<dyn NativeEngine> {
    warn!("No native engine configured (CHORUS_ENGINE), using the simulated engine");
    Box::new(SimulatedEngine::with_sample_voices())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

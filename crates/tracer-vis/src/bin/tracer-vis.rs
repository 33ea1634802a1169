//! AGV Journey Tracer visualization server
//!
//! Load a location log and serve playback to the browser renderer.
//!
//! Usage: `tracer-vis [logs.json] [payloads.json] [port]`

use tracer_vis::{VisConfig, VisServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tracer_vis=info,tracer_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = VisConfig::from_env()?.with_args(&args)?;

    tracing::info!(
        logs = ?config.logs,
        payloads = ?config.payloads,
        speed = config.speed.multiplier(),
        "starting AGV journey tracer"
    );

    let driver = config.build_driver().await?;
    let server = match &config.assets {
        Some(dir) => VisServer::new(driver).with_assets(dir),
        None => VisServer::new(driver),
    };
    server.serve(config.addr).await?;

    Ok(())
}

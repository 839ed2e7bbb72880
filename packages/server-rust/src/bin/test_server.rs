//! Demo relay server: user CRUD routes and the `numbers:add` procedure.

use clap::Parser;
use relay_server::{demo, logging, NetworkModule, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    logging::init_tracing(config.log_format)?;

    let dispatcher = demo::dispatcher(config.dispatch())?;
    let mut module = NetworkModule::new(config.network(), dispatcher);
    let port = module.start().await?;
    info!(port, "test server ready");

    module
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await
}

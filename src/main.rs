use anyhow::Context;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

use dcf_screener::config::AppConfig;
use dcf_screener::routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let config = AppConfig::from_env().context("failed to load configuration")?;
    info!("Using PORT: {}", config.port);
    info!("Datasets: {:?}", config.pipeline.sources);

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Will bind to: {}", addr);

    // Set up CORS
    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST"]);

    let api = routes::routes(Arc::new(config.pipeline), config.static_dir).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Server is running on http://localhost:{}", config.port);
    warp::serve(api).run(addr).await;
    Ok(())
}

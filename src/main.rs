//! Pest Desk - call lifecycle webhook service
//!
//! Receives Retell voice-agent webhooks and turns each call into a
//! customer, a ticket and a call record, then emails a summary when
//! the company asks for one.

mod models;
mod server;

use server::config::ServerConfig;

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("pestdesk=info".parse()?))
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;
    tracing::info!("Starting Pest Desk server on port {}", config.port);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(server::run_server(config))
}

//! FTP Demo Server - Entry Point
//!
//! Usage: `ftp-demo-server [ip:port]`. Everything else comes from
//! `config.toml` and `FTP_DEMO_*` environment variables.

use log::{error, info};

use ftp_demo_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides the default filter
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Launching FTP server...");

    let mut config = ServerConfig::load().inspect_err(|e| error!("Invalid configuration: {}", e))?;
    if let Some(listen) = std::env::args().nth(1) {
        config
            .apply_listen_override(&listen)
            .inspect_err(|e| error!("Invalid listen address {:?}: {}", listen, e))?;
    }

    let server = Server::bind(config)
        .await
        .inspect_err(|e| error!("Server startup failed: {}", e))?;
    server.run().await;

    Ok(())
}

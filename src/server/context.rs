//! Shared, read-only state handed to every connection task

use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::storage::PathSandbox;
use crate::transfer::DataChannelBroker;

/// Everything a command handler needs besides its own session
#[derive(Debug, Clone)]
pub struct ServerContext {
    pub config: Arc<ServerConfig>,
    pub sandbox: PathSandbox,
    pub broker: DataChannelBroker,
    /// Address passive listeners bind to
    pub bind_ip: IpAddr,
    /// Address written into PASV replies
    pub passive_ip: Ipv4Addr,
}

impl ServerContext {
    /// Builds the context, canonicalizing the sandbox root
    pub fn new(config: ServerConfig) -> io::Result<Self> {
        let sandbox = PathSandbox::new(config.root_dir_path()?)?;
        let bind_ip = config.listen_ip.parse::<IpAddr>().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid listen_ip {:?}: {}", config.listen_ip, e),
            )
        })?;

        Ok(Self {
            broker: DataChannelBroker::new(config.data_timeout()),
            passive_ip: config.advertised_passive_ip(),
            bind_ip,
            sandbox,
            config: Arc::new(config),
        })
    }
}

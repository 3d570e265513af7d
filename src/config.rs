//! Configuration management for the demo FTP server
//!
//! Values come from built-in defaults, an optional `config.toml` next to the
//! working directory, and `FTP_DEMO_*` environment overrides, in that order.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Upper bound for `max_command_length`
pub const MAX_COMMAND_LENGTH_LIMIT: usize = 64 * 1024;

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address the control listener binds to
    pub listen_ip: String,

    /// Port for the control connection
    pub listen_port: u16,

    /// Whether `anonymous` may log in with any password
    pub anonymous: bool,

    /// Sandbox root; the process working directory when unset
    pub root_dir: Option<PathBuf>,

    /// Static user -> password table
    #[serde(default)]
    pub users: HashMap<String, String>,

    /// IPv4 address advertised in PASV replies; `listen_ip` when unset
    pub passive_address: Option<String>,

    /// Maximum concurrent control connections
    pub max_clients: usize,

    /// Bound on data connect/accept in seconds, 0 disables it
    pub data_timeout_secs: u64,

    /// Longest accepted command line in bytes
    pub max_command_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_ip: "127.0.0.1".to_string(),
            listen_port: 2121,
            anonymous: true,
            root_dir: None,
            users: HashMap::new(),
            passive_address: None,
            max_clients: 10,
            data_timeout_secs: 30,
            max_command_length: 512,
        }
    }
}

impl ServerConfig {
    /// Load configuration from defaults, `config.*` and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = ServerConfig::default();

        let settings = Config::builder()
            .set_default("listen_ip", defaults.listen_ip)?
            .set_default("listen_port", defaults.listen_port as i64)?
            .set_default("anonymous", defaults.anonymous)?
            .set_default("max_clients", defaults.max_clients as i64)?
            .set_default("data_timeout_secs", defaults.data_timeout_secs as i64)?
            .set_default("max_command_length", defaults.max_command_length as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("FTP_DEMO")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply an `ip:port` override as given on the command line
    pub fn apply_listen_override(&mut self, listen: &str) -> Result<(), config::ConfigError> {
        let (ip, port) = listen.rsplit_once(':').ok_or_else(|| {
            config::ConfigError::Message(format!("listen address must be ip:port, got {listen}"))
        })?;
        let port = port
            .parse::<u16>()
            .map_err(|e| config::ConfigError::Message(format!("invalid listen port {port}: {e}")))?;

        self.listen_ip = ip.to_string();
        self.listen_port = port;
        self.validate()
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.listen_ip.parse::<IpAddr>().is_err() {
            return Err(config::ConfigError::Message(format!(
                "listen_ip is not an IP address: {:?}",
                self.listen_ip
            )));
        }

        if let Some(addr) = &self.passive_address {
            if addr.parse::<Ipv4Addr>().is_err() {
                return Err(config::ConfigError::Message(format!(
                    "passive_address must be an IPv4 address: {addr:?}"
                )));
            }
        }

        if self.max_clients == 0 || self.max_clients > Semaphore::MAX_PERMITS {
            return Err(config::ConfigError::Message(format!(
                "max_clients must be between 1 and {}",
                Semaphore::MAX_PERMITS
            )));
        }

        if self.max_command_length == 0 || self.max_command_length > MAX_COMMAND_LENGTH_LIMIT {
            return Err(config::ConfigError::Message(format!(
                "max_command_length must be between 1 and {}",
                MAX_COMMAND_LENGTH_LIMIT
            )));
        }

        Ok(())
    }

    /// Control socket address as `ip:port`
    pub fn control_socket(&self) -> String {
        format!("{}:{}", self.listen_ip, self.listen_port)
    }

    /// Sandbox root before canonicalization
    pub fn root_dir_path(&self) -> std::io::Result<PathBuf> {
        match &self.root_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir(),
        }
    }

    /// Address written into PASV replies
    ///
    /// Falls back to the unspecified address when neither `passive_address`
    /// nor `listen_ip` is IPv4.
    pub fn advertised_passive_ip(&self) -> Ipv4Addr {
        self.passive_address
            .as_deref()
            .unwrap_or(&self.listen_ip)
            .parse()
            .unwrap_or(Ipv4Addr::UNSPECIFIED)
    }

    /// Data connect/accept timeout, `None` when disabled
    pub fn data_timeout(&self) -> Option<Duration> {
        match self.data_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

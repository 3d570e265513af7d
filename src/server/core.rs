use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Semaphore};

use crate::client::{SessionStore, handle_client};
use crate::config::ServerConfig;
use crate::protocol::format_response;
use crate::protocol::responses::SERVICE_UNAVAILABLE;
use crate::server::ServerContext;

pub struct Server {
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    sessions: Arc<Mutex<SessionStore>>,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Binds the control listener and prepares the sandbox
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let ctx = ServerContext::new(config)?;
        let socket = ctx.config.control_socket();

        let listener = TcpListener::bind(&socket).await.inspect_err(|e| {
            error!("Failed to bind to {}: {}", socket, e);
        })?;
        info!("Server bound to {}", listener.local_addr()?);
        info!("Server root directory: {}", ctx.sandbox.root().display());

        Ok(Self {
            listener,
            connection_limit: Arc::new(Semaphore::new(ctx.config.max_clients)),
            sessions: Arc::new(Mutex::new(SessionStore::new())),
            ctx: Arc::new(ctx),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Registry of open sessions
    pub fn sessions(&self) -> Arc<Mutex<SessionStore>> {
        Arc::clone(&self.sessions)
    }

    /// Accepts control connections until the task is dropped
    pub async fn run(self) {
        info!(
            "Starting FTP server on {} (max {} clients)",
            self.ctx.config.control_socket(),
            self.ctx.config.max_clients
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let Ok(permit) = Arc::clone(&self.connection_limit).try_acquire_owned() else {
                        warn!("Rejecting {}: connection limit reached", addr);
                        tokio::spawn(reject_client(stream, addr));
                        continue;
                    };

                    let ctx = Arc::clone(&self.ctx);
                    let sessions = Arc::clone(&self.sessions);

                    // Spawn a task for each client so accept loop doesn't block
                    tokio::spawn(async move {
                        handle_client(stream, addr, ctx, sessions).await;
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

async fn reject_client(mut stream: TcpStream, addr: SocketAddr) {
    let reply = format_response(SERVICE_UNAVAILABLE, "Too many connections. Try again later.");
    if let Err(e) = stream.write_all(reply.as_bytes()).await {
        warn!("Failed to send 421 to {}: {}", addr, e);
    }
    if let Err(e) = stream.shutdown().await {
        debug!("Failed to shut down rejected connection {}: {}", addr, e);
    }
}

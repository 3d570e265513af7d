use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::client::{Session, SessionStore};
use crate::error::handlers::{error_to_ftp_code, handle_error};
use crate::error::{FtpServerError, ProtocolError};
use crate::protocol::responses::greeting;
use crate::protocol::{CommandStatus, format_response, handle_command, parse_command};
use crate::server::ServerContext;

/// Per-connection driver: turns connect/line/close events into replies.
///
/// The session is created on the first non-empty command and lives until
/// `on_close`. Its record in the shared `SessionStore` is refreshed after
/// every command.
pub struct ControlConnection<W> {
    peer: SocketAddr,
    writer: W,
    session: Option<Session>,
    ctx: Arc<ServerContext>,
    sessions: Arc<Mutex<SessionStore>>,
}

impl<W> ControlConnection<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(
        peer: SocketAddr,
        writer: W,
        ctx: Arc<ServerContext>,
        sessions: Arc<Mutex<SessionStore>>,
    ) -> Self {
        Self {
            peer,
            writer,
            session: None,
            ctx,
            sessions,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Sends the greeting
    pub async fn on_connect(&mut self) -> io::Result<()> {
        info!("Client {} connected", self.peer);
        self.write_reply(&greeting()).await
    }

    /// Handles one command line.
    ///
    /// Returns `Ok(false)` once the connection should be closed.
    pub async fn on_data(&mut self, line: &str) -> io::Result<bool> {
        let Some(command) = parse_command(line) else {
            return Ok(true);
        };
        debug!("Received from {}: {:?}", self.peer, command);

        let peer = self.peer;
        let created = self.session.is_none();
        let session = self.session.get_or_insert_with(|| Session::new(peer));
        if created {
            self.sessions.lock().await.update(session);
        }

        let result = handle_command(session, &command, &self.ctx, &mut self.writer).await?;
        self.sessions.lock().await.update(session);

        if let Some(msg) = &result.message {
            debug!("Sending response to client {}: {}", peer, msg.trim_end());
            self.write_reply(msg).await?;
        }

        Ok(result.status != CommandStatus::CloseConnection)
    }

    /// Replies to a line of `len` bytes, longer than the configured limit
    pub async fn on_oversized(&mut self, len: usize) -> io::Result<()> {
        let err = FtpServerError::from(ProtocolError::CommandTooLong(len));
        handle_error(&self.peer.to_string(), &err);
        self.write_reply(&format_response(error_to_ftp_code(&err), "Command too long."))
            .await
    }

    /// Drops the session, its passive listener and its store record
    pub async fn on_close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close_channel();
        }
        self.sessions.lock().await.remove(&self.peer);
        info!("Client {} disconnected", self.peer);
    }

    async fn write_reply(&mut self, msg: &str) -> io::Result<()> {
        self.writer.write_all(msg.as_bytes()).await?;
        self.writer.flush().await
    }
}

/// Outcome of reading one line from the control connection
#[derive(Debug, PartialEq)]
enum LineRead {
    Line(String),
    /// Length of the rejected line, line ending included
    TooLong(usize),
    Closed,
}

/// Reads one line of at most `max_len` bytes, excluding the line ending.
///
/// The remainder of an over-long line is read and discarded without being
/// buffered.
async fn read_command_line<R>(reader: &mut R, max_len: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let limit = max_len.saturating_add(2);
    let mut buf = Vec::new();
    let n = (&mut *reader).take(limit as u64).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(LineRead::Closed);
    }

    if !buf.ends_with(b"\n") && n == limit {
        let mut total = n;
        let mut scratch = Vec::new();
        loop {
            scratch.clear();
            let n = (&mut *reader).take(4096).read_until(b'\n', &mut scratch).await?;
            total = total.saturating_add(n);
            if n == 0 || scratch.ends_with(b"\n") {
                break;
            }
        }
        return Ok(LineRead::TooLong(total));
    }

    let content = buf.strip_suffix(b"\n").unwrap_or(&buf);
    let content = content.strip_suffix(b"\r").unwrap_or(content);
    if content.len() > max_len {
        return Ok(LineRead::TooLong(n));
    }

    Ok(LineRead::Line(String::from_utf8_lossy(content).into_owned()))
}

/// Resolves once the peer has closed its side of the control connection.
///
/// Pending input means the peer is still talking; the next command is left
/// in the buffer and this never resolves. `fill_buf` keeps what it read, so
/// dropping this future loses nothing.
async fn control_closed<R>(reader: &mut R)
where
    R: AsyncBufRead + Unpin,
{
    match reader.fill_buf().await {
        Ok(buf) if !buf.is_empty() => std::future::pending().await,
        _ => {}
    }
}

/// Handles an FTP client control connection until it closes.
///
/// Commands are handled one at a time; a transfer finishes before the next
/// line is read. Closing the control connection while a command runs
/// abandons the command, including a data connection still being set up.
pub async fn handle_client(
    cmd_stream: TcpStream,
    client_addr: SocketAddr,
    ctx: Arc<ServerContext>,
    sessions: Arc<Mutex<SessionStore>>,
) {
    let max_len = ctx.config.max_command_length;
    let (read_half, write_half) = cmd_stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut connection = ControlConnection::new(client_addr, write_half, ctx, sessions);

    if let Err(e) = connection.on_connect().await {
        error!("Failed to greet {}: {}", client_addr, e);
        connection.on_close().await;
        return;
    }

    loop {
        let outcome = match read_command_line(&mut reader, max_len).await {
            Ok(LineRead::Closed) => {
                info!("Connection closed by client {}", client_addr);
                break;
            }
            Ok(LineRead::TooLong(len)) => connection.on_oversized(len).await.map(|()| true),
            Ok(LineRead::Line(line)) => {
                tokio::select! {
                    outcome = connection.on_data(&line) => outcome,
                    () = control_closed(&mut reader) => {
                        warn!("Client {} closed the connection during a command", client_addr);
                        break;
                    }
                }
            }
            Err(e) => {
                error!("Failed to read from {}: {}", client_addr, e);
                break;
            }
        };

        match outcome {
            Ok(true) => continue,
            Ok(false) => break,
            Err(e) => {
                error!("Failed to write to {}: {}", client_addr, e);
                break;
            }
        }
    }

    connection.on_close().await;
}

//! Command handlers module for the FTP server.
//!
//! This module defines handler functions for FTP commands: authentication,
//! navigation, data channel setup and the transfers that run over it. Each
//! handler works on the session owned by the calling connection task.
//!
//! Preconditions are checked in a fixed order: login, then a negotiated data
//! channel, then path resolution. A failed check produces a reply and leaves
//! the session untouched.

use log::{debug, info};
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::auth::{validate_password, validate_user};
use crate::client::Session;
use crate::error::handlers::{error_to_ftp_code, handle_error};
use crate::error::{AuthError, FtpServerError, ProtocolError, TransferError};
use crate::protocol::responses::*;
use crate::protocol::{Command, CommandResult, CommandStatus};
use crate::server::ServerContext;
use crate::transfer::{
    TransferType, create_for_upload, handle_file_download, handle_file_upload, list_directory,
    open_for_download, send_listing, setup_active_mode, setup_passive_mode,
};

/// Dispatches a parsed FTP command to its handler.
///
/// Preliminary replies (150) are written to `control` directly; the final
/// reply is returned in the `CommandResult`. The only error returned is a
/// failed write on the control connection.
pub async fn handle_command<W>(
    session: &mut Session,
    command: &Command,
    ctx: &ServerContext,
    control: &mut W,
) -> io::Result<CommandResult>
where
    W: AsyncWrite + Unpin,
{
    if !command.allowed_before_login() && !session.is_authenticated() {
        return Ok(reject(
            session,
            AuthError::NotLoggedIn,
            "Please login with USER and PASS.",
        ));
    }

    if command.needs_data_channel() && !session.channel().is_set() {
        return Ok(reject(
            session,
            TransferError::NoDataChannel,
            "Use PORT or PASV first.",
        ));
    }

    let result = match command {
        Command::USER(username) => handle_cmd_user(session, username),
        Command::PASS(password) => handle_cmd_pass(session, password, ctx),
        Command::PORT(arg) => handle_cmd_port(session, arg),
        Command::PASV => handle_cmd_pasv(session, ctx).await,
        Command::PWD => handle_cmd_pwd(session),
        Command::CWD(path) => handle_cmd_cwd(session, path, ctx).await,
        Command::CDUP => handle_cmd_cwd(session, "../", ctx).await,
        Command::TYPE(mode) => handle_cmd_type(session, mode),
        Command::LIST => handle_cmd_list(session, ctx, control).await?,
        Command::RETR(filename) => handle_cmd_retr(session, filename, ctx, control).await?,
        Command::STOR(filename) => handle_cmd_stor(session, filename, ctx, control).await?,
        Command::DELE(filename) => handle_cmd_dele(session, filename, ctx).await,
        Command::NOOP => CommandResult::success(format_response(OK, "NOOP ok.")),
        Command::QUIT => handle_cmd_quit(session),
        Command::UNKNOWN(verb) => handle_cmd_unknown(session, verb),
    };

    Ok(result)
}

/// Logs `err` for the session and builds the failure reply for it
fn reject(session: &Session, err: impl Into<FtpServerError>, text: &str) -> CommandResult {
    let err = err.into();
    handle_error(&session.peer().to_string(), &err);
    CommandResult::failure(err.to_string(), format_response(error_to_ftp_code(&err), text))
}

/// Writes a preliminary reply on the control connection
async fn send_reply<W>(control: &mut W, code: u16, text: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    control.write_all(format_response(code, text).as_bytes()).await?;
    control.flush().await
}

/// Handles the QUIT command: signals the connection driver to close.
fn handle_cmd_quit(session: &Session) -> CommandResult {
    info!("Client {} requested to quit", session.peer());
    CommandResult {
        status: CommandStatus::CloseConnection,
        message: Some(format_response(GOODBYE, "Goodbye.")),
    }
}

/// Handles the USER command: records the name for the following PASS.
fn handle_cmd_user(session: &mut Session, username: &str) -> CommandResult {
    match validate_user(session, username) {
        Ok(()) => CommandResult::success(format_response(
            PASSWORD_REQUIRED,
            "Please specify the password.",
        )),
        Err(e) => reject(session, e, "Already logged in."),
    }
}

/// Handles the PASS command: completes the login started by USER.
fn handle_cmd_pass(session: &mut Session, password: &str, ctx: &ServerContext) -> CommandResult {
    match validate_password(session, password, &ctx.config) {
        Ok(()) => {
            info!(
                "Client {} logged in as {}",
                session.peer(),
                session.user().unwrap_or_default()
            );
            CommandResult::success(format_response(LOGIN_SUCCESS, "Login successful."))
        }
        Err(e) => {
            let text = match e {
                AuthError::AlreadyLoggedIn => "Already logged in.",
                AuthError::UserRequired => "Login with USER first.",
                _ => "Login incorrect.",
            };
            reject(session, e, text)
        }
    }
}

/// Handles the PORT command: switches the session to active mode.
fn handle_cmd_port(session: &mut Session, arg: &str) -> CommandResult {
    match setup_active_mode(session.channel_mut(), arg) {
        Ok(address) => {
            info!("Client {} set active address {}", session.peer(), address);
            CommandResult::success(format_response(
                OK,
                "PORT command successful. Consider using PASV.",
            ))
        }
        Err(e) => reject(session, e, "Illegal port command."),
    }
}

/// Handles the PASV command: binds a fresh one-shot passive listener.
async fn handle_cmd_pasv(session: &mut Session, ctx: &ServerContext) -> CommandResult {
    match setup_passive_mode(session.channel_mut(), ctx.bind_ip, ctx.passive_ip).await {
        Ok(tuple) => CommandResult::success(format_response(
            PASSIVE_MODE,
            &format!("Entering Passive Mode ({}).", tuple),
        )),
        Err(e) => reject(session, e, "Cannot open passive connection."),
    }
}

fn handle_cmd_pwd(session: &Session) -> CommandResult {
    CommandResult::success(format_response(
        PATH_CREATED,
        &format!("\"{}\" is the current directory.", session.cwd()),
    ))
}

/// Handles CWD and CDUP: moves the working directory inside the sandbox.
async fn handle_cmd_cwd(session: &mut Session, path: &str, ctx: &ServerContext) -> CommandResult {
    match ctx.sandbox.change_directory(session.cwd(), path).await {
        Ok(new_cwd) => {
            info!("Client {} changed directory to {}", session.peer(), new_cwd);
            session.set_cwd(new_cwd);
            CommandResult::success(format_response(
                FILE_ACTION_OK,
                "Directory successfully changed.",
            ))
        }
        Err(e) => reject(session, e, "Failed to change directory."),
    }
}

fn handle_cmd_type(session: &mut Session, mode: &str) -> CommandResult {
    match TransferType::from_arg(mode) {
        Some(transfer_type) => {
            session.set_transfer_type(transfer_type);
            CommandResult::success(format_response(
                OK,
                &format!("Switching to {} mode.", transfer_type.name()),
            ))
        }
        None => reject(
            session,
            ProtocolError::UnrecognisedType(mode.to_string()),
            "Unrecognised TYPE command.",
        ),
    }
}

/// Handles the LIST command: sends the working directory listing over the
/// data channel.
async fn handle_cmd_list<W>(
    session: &mut Session,
    ctx: &ServerContext,
    control: &mut W,
) -> io::Result<CommandResult>
where
    W: AsyncWrite + Unpin,
{
    let peer = *session.peer();
    let mut data_stream = match ctx.broker.obtain(session.channel_mut(), &peer).await {
        Ok(stream) => stream,
        Err(e) => return Ok(reject(session, e, "Failed to establish connection.")),
    };

    let dir = ctx.sandbox.real_cwd(session.cwd());
    let listing = match list_directory(&dir).await {
        Ok(listing) => listing,
        Err(e) => return Ok(reject(session, e, "Failed to list directory.")),
    };

    send_reply(control, OPENING_DATA, "Here comes the directory listing.").await?;
    if let Err(e) = send_listing(&mut data_stream, &listing).await {
        return Ok(reject(
            session,
            TransferError::TransferFailed(e),
            "Connection closed; transfer aborted.",
        ));
    }

    debug!("Sent listing of {} to {}", session.cwd(), peer);
    Ok(CommandResult::success(format_response(
        TRANSFER_COMPLETE,
        "Directory send OK.",
    )))
}

/// Handles the RETR command: streams a file to the client.
async fn handle_cmd_retr<W>(
    session: &mut Session,
    filename: &str,
    ctx: &ServerContext,
    control: &mut W,
) -> io::Result<CommandResult>
where
    W: AsyncWrite + Unpin,
{
    let path = match ctx.sandbox.resolve_file(session.cwd(), filename).await {
        Ok(path) => path,
        Err(e) => return Ok(reject(session, e, "File not found.")),
    };

    let peer = *session.peer();
    let mut data_stream = match ctx.broker.obtain(session.channel_mut(), &peer).await {
        Ok(stream) => stream,
        Err(e) => return Ok(reject(session, e, "Failed to establish connection.")),
    };

    let mut file = match open_for_download(&path).await {
        Ok(file) => file,
        Err(e) => return Ok(reject(session, e, "Failed to open file.")),
    };

    send_reply(
        control,
        OPENING_DATA,
        &format!(
            "Opening {} mode data connection for {}.",
            session.transfer_type(),
            filename
        ),
    )
    .await?;

    match handle_file_download(&mut file, &mut data_stream).await {
        Ok(bytes) => {
            info!(
                "Client {} downloaded {} ({} bytes)",
                peer,
                path.display(),
                bytes
            );
            Ok(CommandResult::success(format_response(
                TRANSFER_COMPLETE,
                "Transfer complete.",
            )))
        }
        Err(e) => Ok(reject(
            session,
            TransferError::TransferFailed(e),
            "Connection closed; transfer aborted.",
        )),
    }
}

/// Handles the STOR command: receives a new file from the client.
///
/// Existing files are never overwritten. A transfer that fails part way
/// leaves the bytes received so far on disk.
async fn handle_cmd_stor<W>(
    session: &mut Session,
    filename: &str,
    ctx: &ServerContext,
    control: &mut W,
) -> io::Result<CommandResult>
where
    W: AsyncWrite + Unpin,
{
    let path = match ctx.sandbox.resolve_new_file(session.cwd(), filename).await {
        Ok(path) => path,
        Err(e) => return Ok(reject(session, e, "Permission denied.")),
    };

    let peer = *session.peer();
    let mut data_stream = match ctx.broker.obtain(session.channel_mut(), &peer).await {
        Ok(stream) => stream,
        Err(e) => return Ok(reject(session, e, "Failed to establish connection.")),
    };

    let mut file = match create_for_upload(&path).await {
        Ok(file) => file,
        Err(e) => return Ok(reject(session, e, "Failed to open file.")),
    };

    send_reply(control, OPENING_DATA, "Ok to send data.").await?;

    match handle_file_upload(&mut data_stream, &mut file).await {
        Ok(bytes) => {
            info!(
                "Client {} uploaded {} ({} bytes)",
                peer,
                path.display(),
                bytes
            );
            Ok(CommandResult::success(format_response(
                TRANSFER_COMPLETE,
                "Transfer complete.",
            )))
        }
        Err(e) => Ok(reject(
            session,
            TransferError::TransferFailed(e),
            "Connection closed; transfer aborted.",
        )),
    }
}

/// Handles the DELE command: removes a regular file below the root.
///
/// Requires a negotiated data channel even though no data is sent; the
/// channel itself is left as it was.
async fn handle_cmd_dele(session: &mut Session, filename: &str, ctx: &ServerContext) -> CommandResult {
    let path = match ctx.sandbox.resolve_file(session.cwd(), filename).await {
        Ok(path) => path,
        Err(e) => return reject(session, e, "Permission denied."),
    };

    if let Err(e) = tokio::fs::remove_file(&path).await {
        return reject(session, e, "Permission denied.");
    }

    info!("Client {} deleted file {}", session.peer(), path.display());
    CommandResult::success(format_response(
        FILE_ACTION_OK,
        "Delete operation successful.",
    ))
}

fn handle_cmd_unknown(session: &Session, verb: &str) -> CommandResult {
    reject(
        session,
        ProtocolError::UnknownCommand(verb.to_string()),
        &format!("Unknown command: {}.", verb),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::protocol::parse_command;
    use tempfile::{TempDir, tempdir};

    fn context() -> (TempDir, ServerContext) {
        let root = tempdir().unwrap();
        std::fs::write(root.path().join("hello.txt"), b"hello").unwrap();
        std::fs::create_dir(root.path().join("sub")).unwrap();

        let config = ServerConfig {
            root_dir: Some(root.path().to_path_buf()),
            data_timeout_secs: 2,
            ..ServerConfig::default()
        };
        let ctx = ServerContext::new(config).unwrap();
        (root, ctx)
    }

    async fn run(session: &mut Session, ctx: &ServerContext, line: &str) -> String {
        let command = parse_command(line).unwrap();
        let mut control = Vec::new();
        let result = handle_command(session, &command, ctx, &mut control)
            .await
            .unwrap();
        let mut out = String::from_utf8(control).unwrap();
        out.push_str(result.message.as_deref().unwrap_or_default());
        out
    }

    async fn logged_in(ctx: &ServerContext) -> Session {
        let mut session = Session::new("127.0.0.1:45000".parse().unwrap());
        run(&mut session, ctx, "USER anonymous").await;
        assert_eq!(
            run(&mut session, ctx, "PASS guest").await,
            "230 Login successful.\r\n"
        );
        session
    }

    #[tokio::test]
    async fn commands_before_login_are_gated_without_side_effects() {
        let (_root, ctx) = context();
        let mut session = Session::new("127.0.0.1:45001".parse().unwrap());

        for line in ["PWD", "CWD sub", "PORT 127,0,0,1,4,1", "PASV", "TYPE A", "LIST", "DELE hello.txt"] {
            assert_eq!(
                run(&mut session, &ctx, line).await,
                "530 Please login with USER and PASS.\r\n",
                "{line}"
            );
        }
        assert_eq!(session.cwd(), "/");
        assert_eq!(session.transfer_type(), TransferType::Binary);
        assert!(!session.channel().is_set());
        assert!(ctx.sandbox.root().join("hello.txt").exists());
    }

    #[tokio::test]
    async fn login_sequence() {
        let (_root, ctx) = context();
        let mut session = Session::new("127.0.0.1:45002".parse().unwrap());

        assert_eq!(
            run(&mut session, &ctx, "PASS x").await,
            "503 Login with USER first.\r\n"
        );
        assert_eq!(
            run(&mut session, &ctx, "USER nobody").await,
            "331 Please specify the password.\r\n"
        );
        assert_eq!(
            run(&mut session, &ctx, "PASS x").await,
            "530 Login incorrect.\r\n"
        );
        assert_eq!(session.user(), None);
        assert_eq!(
            run(&mut session, &ctx, "PASS x").await,
            "503 Login with USER first.\r\n"
        );

        run(&mut session, &ctx, "USER anonymous").await;
        assert_eq!(
            run(&mut session, &ctx, "PASS x").await,
            "230 Login successful.\r\n"
        );
        assert_eq!(
            run(&mut session, &ctx, "USER other").await,
            "530 Already logged in.\r\n"
        );
        assert_eq!(
            run(&mut session, &ctx, "PASS x").await,
            "530 Already logged in.\r\n"
        );
    }

    #[tokio::test]
    async fn navigation_stays_inside_the_root() {
        let (_root, ctx) = context();
        let mut session = logged_in(&ctx).await;

        assert_eq!(
            run(&mut session, &ctx, "PWD").await,
            "257 \"/\" is the current directory.\r\n"
        );
        assert_eq!(
            run(&mut session, &ctx, "CDUP").await,
            "550 Failed to change directory.\r\n"
        );
        assert_eq!(
            run(&mut session, &ctx, "CWD ../../../etc").await,
            "550 Failed to change directory.\r\n"
        );
        assert_eq!(
            run(&mut session, &ctx, "CWD").await,
            "550 Failed to change directory.\r\n"
        );
        assert_eq!(session.cwd(), "/");

        assert_eq!(
            run(&mut session, &ctx, "CWD sub").await,
            "250 Directory successfully changed.\r\n"
        );
        assert_eq!(
            run(&mut session, &ctx, "PWD").await,
            "257 \"/sub\" is the current directory.\r\n"
        );
        assert_eq!(
            run(&mut session, &ctx, "CDUP").await,
            "250 Directory successfully changed.\r\n"
        );
        assert_eq!(session.cwd(), "/");
    }

    #[tokio::test]
    async fn type_switches_representation() {
        let (_root, ctx) = context();
        let mut session = logged_in(&ctx).await;

        assert_eq!(
            run(&mut session, &ctx, "TYPE a").await,
            "200 Switching to ASCII mode.\r\n"
        );
        assert_eq!(session.transfer_type(), TransferType::Ascii);
        assert_eq!(
            run(&mut session, &ctx, "TYPE I").await,
            "200 Switching to binary mode.\r\n"
        );
        assert_eq!(
            run(&mut session, &ctx, "TYPE E").await,
            "500 Unrecognised TYPE command.\r\n"
        );
        assert_eq!(session.transfer_type(), TransferType::Binary);
    }

    #[tokio::test]
    async fn data_commands_need_a_channel() {
        let (_root, ctx) = context();
        let mut session = logged_in(&ctx).await;

        for line in ["LIST", "RETR hello.txt", "STOR new.txt", "DELE hello.txt"] {
            assert_eq!(
                run(&mut session, &ctx, line).await,
                "425 Use PORT or PASV first.\r\n",
                "{line}"
            );
        }
        assert!(ctx.sandbox.root().join("hello.txt").exists());
        assert!(!ctx.sandbox.root().join("new.txt").exists());
    }

    #[tokio::test]
    async fn port_validation_and_pasv_replacement() {
        let (_root, ctx) = context();
        let mut session = logged_in(&ctx).await;

        assert_eq!(
            run(&mut session, &ctx, "PORT 1,2,3").await,
            "500 Illegal port command.\r\n"
        );
        assert!(!session.channel().is_set());

        let reply = run(&mut session, &ctx, "PASV").await;
        assert!(reply.starts_with("227 Entering Passive Mode (127,0,0,1,"), "{reply}");
        let first = session.channel().passive_addr().unwrap();

        run(&mut session, &ctx, "PASV").await;
        let second = session.channel().passive_addr().unwrap();
        if first != second {
            assert!(tokio::net::TcpStream::connect(first).await.is_err());
        }

        assert_eq!(
            run(&mut session, &ctx, "PORT 127,0,0,1,4,1").await,
            "200 PORT command successful. Consider using PASV.\r\n"
        );
        assert!(session.channel().passive_addr().is_none());
        assert!(tokio::net::TcpStream::connect(second).await.is_err());
    }

    #[tokio::test]
    async fn dele_keeps_the_channel_and_stays_in_the_root() {
        let (_root, ctx) = context();
        let mut session = logged_in(&ctx).await;
        run(&mut session, &ctx, "PORT 127,0,0,1,4,1").await;

        assert_eq!(
            run(&mut session, &ctx, "DELE ../hello.txt").await,
            "550 Permission denied.\r\n"
        );
        assert_eq!(
            run(&mut session, &ctx, "DELE sub").await,
            "550 Permission denied.\r\n"
        );
        assert_eq!(
            run(&mut session, &ctx, "DELE hello.txt").await,
            "250 Delete operation successful.\r\n"
        );
        assert!(!ctx.sandbox.root().join("hello.txt").exists());
        assert!(session.channel().is_set());
    }

    #[tokio::test]
    async fn retr_missing_file_is_rejected_before_the_channel_is_used() {
        let (_root, ctx) = context();
        let mut session = logged_in(&ctx).await;
        run(&mut session, &ctx, "PASV").await;

        assert_eq!(
            run(&mut session, &ctx, "RETR missing.txt").await,
            "550 File not found.\r\n"
        );
        assert!(session.channel().passive_addr().is_some());
    }

    #[tokio::test]
    async fn stor_rejects_traversal_and_existing_files() {
        let (_root, ctx) = context();
        let mut session = logged_in(&ctx).await;
        run(&mut session, &ctx, "PASV").await;

        assert_eq!(
            run(&mut session, &ctx, "STOR ../evil.txt").await,
            "550 Permission denied.\r\n"
        );
        assert_eq!(
            run(&mut session, &ctx, "STOR hello.txt").await,
            "550 Permission denied.\r\n"
        );
        assert_eq!(
            std::fs::read(ctx.sandbox.root().join("hello.txt")).unwrap(),
            b"hello"
        );
    }

    #[tokio::test]
    async fn unknown_noop_and_quit() {
        let (_root, ctx) = context();
        let mut session = Session::new("127.0.0.1:45003".parse().unwrap());

        assert_eq!(
            run(&mut session, &ctx, "XMKD dir").await,
            "500 Unknown command: XMKD.\r\n"
        );
        assert_eq!(run(&mut session, &ctx, "NOOP").await, "200 NOOP ok.\r\n");

        let command = parse_command("QUIT").unwrap();
        let mut control = Vec::new();
        let result = handle_command(&mut session, &command, &ctx, &mut control)
            .await
            .unwrap();
        assert_eq!(result.status, CommandStatus::CloseConnection);
        assert_eq!(result.message.as_deref(), Some("221 Goodbye.\r\n"));
    }
}

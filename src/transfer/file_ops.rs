//! Module `file_ops`
//!
//! Moves bytes between the filesystem and a data connection: directory
//! listings, downloads and uploads. All file access goes through `tokio::fs`
//! so a slow disk never stalls other connections.

use log::{error, info};
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

use crate::error::StorageError;

/// Chunk size for file reads and data socket reads
pub const BUFFER_SIZE: usize = 1024;

/// Produces the directory listing text sent for LIST.
///
/// Runs `ls -l` on `dir`, drops its leading `total` line and joins the rest
/// with `\n`.
pub async fn list_directory(dir: &Path) -> Result<String, StorageError> {
    let output = Command::new("ls")
        .arg("-l")
        .arg(dir)
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("ls failed for {}: {}", dir.display(), stderr.trim());
        return Err(StorageError::IoError(io::Error::other(format!(
            "ls exited with {}",
            output.status
        ))));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(strip_summary_line(&stdout))
}

fn strip_summary_line(listing: &str) -> String {
    listing.lines().skip(1).collect::<Vec<_>>().join("\n")
}

/// Writes a listing to the data connection and closes it
pub async fn send_listing<W>(data_stream: &mut W, listing: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    data_stream.write_all(listing.as_bytes()).await?;
    data_stream.shutdown().await
}

/// Opens a file for RETR
pub async fn open_for_download(path: &Path) -> Result<File, StorageError> {
    File::open(path).await.map_err(|e| {
        error!("Failed to open file {}: {}", path.display(), e);
        StorageError::from(e)
    })
}

/// Creates the STOR target, failing if anything already exists at `path`.
///
/// `create_new` maps to an exclusive create, so two uploads racing for the
/// same name cannot both succeed.
pub async fn create_for_upload(path: &Path) -> Result<File, StorageError> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => {
                StorageError::FileAlreadyExists(path.display().to_string())
            }
            _ => {
                error!("Failed to create file {}: {}", path.display(), e);
                StorageError::from(e)
            }
        })
}

/// Streams `file` to the data connection in `BUFFER_SIZE` chunks, then
/// closes the connection. Returns the number of bytes sent.
pub async fn handle_file_download<R, W>(file: &mut R, data_stream: &mut W) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut total_bytes_sent = 0u64;

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        data_stream.write_all(&buffer[..n]).await?;
        total_bytes_sent += n as u64;
    }

    data_stream.shutdown().await?;
    info!("File download completed ({total_bytes_sent} bytes)");
    Ok(total_bytes_sent)
}

/// Appends everything received on the data connection to `file` until the
/// peer closes it, then flushes the file.
///
/// On error the bytes already written stay on disk.
pub async fn handle_file_upload<R, W>(data_stream: &mut R, file: &mut W) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut total_bytes_received = 0u64;

    loop {
        let n = data_stream.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n]).await?;
        total_bytes_received += n as u64;
    }

    file.flush().await?;
    info!("File upload completed ({total_bytes_received} bytes)");
    Ok(total_bytes_received)
}

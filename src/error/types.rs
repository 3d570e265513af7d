//! Error types
//!
//! Defines domain-specific error types for each part of the FTP server.

use std::fmt;
use std::io;
use std::time::Duration;

/// Malformed commands or arguments
#[derive(Debug)]
pub enum ProtocolError {
    UnknownCommand(String),
    IllegalPort(String),
    UnrecognisedType(String),
    CommandTooLong(usize),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnknownCommand(v) => write!(f, "Unknown command: {}", v),
            ProtocolError::IllegalPort(a) => write!(f, "Illegal PORT argument: {}", a),
            ProtocolError::UnrecognisedType(t) => write!(f, "Unrecognised TYPE: {}", t),
            ProtocolError::CommandTooLong(n) => write!(f, "Command line too long: {} bytes", n),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Authentication errors
#[derive(Debug, PartialEq)]
pub enum AuthError {
    NotLoggedIn,
    AlreadyLoggedIn,
    UserRequired,
    LoginIncorrect(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotLoggedIn => write!(f, "User not logged in"),
            AuthError::AlreadyLoggedIn => write!(f, "User already logged in"),
            AuthError::UserRequired => write!(f, "PASS issued before USER"),
            AuthError::LoginIncorrect(u) => write!(f, "Login incorrect for user: {}", u),
        }
    }
}

impl std::error::Error for AuthError {}

/// Data channel errors
#[derive(Debug)]
pub enum TransferError {
    NoDataChannel,
    InvalidAddress(String),
    ConnectFailed(String, io::Error),
    AcceptFailed(io::Error),
    Timeout(Duration),
    PassiveBindFailed(io::Error),
    TransferFailed(io::Error),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::NoDataChannel => write!(f, "No PORT or PASV issued"),
            TransferError::InvalidAddress(a) => write!(f, "Not a connectable address: {}", a),
            TransferError::ConnectFailed(a, e) => write!(f, "Failed to connect to {}: {}", a, e),
            TransferError::AcceptFailed(e) => write!(f, "Failed to accept data connection: {}", e),
            TransferError::Timeout(d) => {
                write!(f, "Data connection not established within {:?}", d)
            }
            TransferError::PassiveBindFailed(e) => {
                write!(f, "Failed to bind passive listener: {}", e)
            }
            TransferError::TransferFailed(e) => write!(f, "Transfer failed: {}", e),
        }
    }
}

impl std::error::Error for TransferError {}

/// Filesystem and sandbox errors
#[derive(Debug)]
pub enum StorageError {
    InvalidPath(String),
    OutsideRoot(String),
    PathTraversal(String),
    NotFound(String),
    NotADirectory(String),
    NotAFile(String),
    FileAlreadyExists(String),
    IoError(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::InvalidPath(p) => write!(f, "Invalid path: {}", p),
            StorageError::OutsideRoot(p) => write!(f, "Path escapes the sandbox root: {}", p),
            StorageError::PathTraversal(p) => write!(f, "Path traversal attempt: {}", p),
            StorageError::NotFound(p) => write!(f, "No such file or directory: {}", p),
            StorageError::NotADirectory(p) => write!(f, "Not a directory: {}", p),
            StorageError::NotAFile(p) => write!(f, "Not a regular file: {}", p),
            StorageError::FileAlreadyExists(p) => write!(f, "File already exists: {}", p),
            StorageError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        StorageError::IoError(error)
    }
}

/// General FTP server error that encompasses all error types
#[derive(Debug)]
pub enum FtpServerError {
    Protocol(ProtocolError),
    Auth(AuthError),
    Transfer(TransferError),
    Storage(StorageError),
    IoError(io::Error),
}

impl fmt::Display for FtpServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpServerError::Protocol(e) => write!(f, "Protocol error: {}", e),
            FtpServerError::Auth(e) => write!(f, "Authentication error: {}", e),
            FtpServerError::Transfer(e) => write!(f, "Transfer error: {}", e),
            FtpServerError::Storage(e) => write!(f, "Storage error: {}", e),
            FtpServerError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for FtpServerError {}

impl From<ProtocolError> for FtpServerError {
    fn from(error: ProtocolError) -> Self {
        FtpServerError::Protocol(error)
    }
}

impl From<AuthError> for FtpServerError {
    fn from(error: AuthError) -> Self {
        FtpServerError::Auth(error)
    }
}

impl From<TransferError> for FtpServerError {
    fn from(error: TransferError) -> Self {
        FtpServerError::Transfer(error)
    }
}

impl From<StorageError> for FtpServerError {
    fn from(error: StorageError) -> Self {
        FtpServerError::Storage(error)
    }
}

impl From<io::Error> for FtpServerError {
    fn from(error: io::Error) -> Self {
        FtpServerError::IoError(error)
    }
}

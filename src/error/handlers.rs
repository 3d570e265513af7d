//! Error handlers
//!
//! Maps domain errors onto FTP reply codes.

use crate::error::types::{AuthError, FtpServerError, TransferError};
use crate::protocol::responses::{
    AUTH_FAILED, BAD_SEQUENCE, CANT_OPEN_DATA, FILE_NOT_FOUND, SYNTAX_ERROR, TRANSFER_ABORTED,
};
use log::warn;

/// Log an FTP server error against the peer it happened for
pub fn handle_error(peer: &str, err: &FtpServerError) {
    warn!("Client {}: {}", peer, err);
}

/// Convert error to FTP response code
pub fn error_to_ftp_code(err: &FtpServerError) -> u16 {
    match err {
        FtpServerError::Protocol(_) => SYNTAX_ERROR,
        FtpServerError::Auth(AuthError::UserRequired) => BAD_SEQUENCE,
        FtpServerError::Auth(_) => AUTH_FAILED,
        FtpServerError::Transfer(TransferError::TransferFailed(_)) => TRANSFER_ABORTED,
        FtpServerError::Transfer(_) => CANT_OPEN_DATA,
        FtpServerError::Storage(_) => FILE_NOT_FOUND,
        FtpServerError::IoError(_) => FILE_NOT_FOUND,
    }
}

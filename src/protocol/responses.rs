//! FTP Response handling
//!
//! Defines FTP response codes and formatting.

/// Standard FTP response codes
pub const OPENING_DATA: u16 = 150;
pub const OK: u16 = 200;
pub const READY: u16 = 220;
pub const GOODBYE: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const PASSIVE_MODE: u16 = 227;
pub const LOGIN_SUCCESS: u16 = 230;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATH_CREATED: u16 = 257;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const SERVICE_UNAVAILABLE: u16 = 421;
pub const CANT_OPEN_DATA: u16 = 425;
pub const TRANSFER_ABORTED: u16 = 426;
pub const SYNTAX_ERROR: u16 = 500;
pub const BAD_SEQUENCE: u16 = 503;
pub const AUTH_FAILED: u16 = 530;
pub const FILE_NOT_FOUND: u16 = 550;

/// Format an FTP response message
pub fn format_response(code: u16, message: &str) -> String {
    format!("{} {}\r\n", code, message)
}

/// Greeting sent when a control connection opens
pub fn greeting() -> String {
    format_response(READY, &format!("(FTP Demo v{})", env!("CARGO_PKG_VERSION")))
}

//! Module `state`
//!
//! Defines the `Session` struct holding everything a control connection
//! accumulates: login state, working directory, transfer type and the
//! negotiated data channel.

use std::net::SocketAddr;

use crate::transfer::{DataChannel, TransferType};

/// State of one control connection.
///
/// Owned by the connection task and handed to command handlers by `&mut`;
/// dropping it closes any passive listener it still holds.
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    user: Option<String>,
    authenticated: bool,
    cwd: String,
    transfer_type: TransferType,
    channel: DataChannel,
}

impl Session {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            user: None,
            authenticated: false,
            cwd: "/".to_string(),
            transfer_type: TransferType::default(),
            channel: DataChannel::None,
        }
    }

    // --------------------
    // Getter methods
    // --------------------

    /// Identity of the control connection
    pub fn peer(&self) -> &SocketAddr {
        &self.peer
    }

    /// Name given with USER, if any
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Working directory relative to the sandbox root, always starting with `/`
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn transfer_type(&self) -> TransferType {
        self.transfer_type
    }

    pub fn channel(&self) -> &DataChannel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut DataChannel {
        &mut self.channel
    }

    // --------------------
    // Setter methods
    // --------------------

    pub fn set_user(&mut self, user: Option<String>) {
        self.user = user;
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    /// Sets the working directory; callers pass a sandbox-derived path
    pub fn set_cwd(&mut self, cwd: String) {
        self.cwd = cwd;
    }

    pub fn set_transfer_type(&mut self, transfer_type: TransferType) {
        self.transfer_type = transfer_type;
    }

    /// Closes any passive listener held by the session
    pub fn close_channel(&mut self) {
        self.channel.close();
    }
}

//! Session registry
//!
//! Book-keeping of the sessions currently open, keyed by the control
//! connection's peer address. The live `Session` itself stays with its
//! connection task; the store keeps a snapshot that is refreshed after every
//! command and removed when the connection closes.

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::client::Session;

/// Snapshot of a session as seen by the rest of the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub user: Option<String>,
    pub authenticated: bool,
    pub cwd: String,
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        Self {
            user: session.user().map(str::to_string),
            authenticated: session.is_authenticated(),
            cwd: session.cwd().to_string(),
        }
    }
}

/// Registry for tracking open sessions
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<SocketAddr, SessionRecord>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes the record for `session`
    pub fn update(&mut self, session: &Session) {
        self.sessions
            .insert(*session.peer(), SessionRecord::from(session));
    }

    pub fn remove(&mut self, addr: &SocketAddr) -> Option<SessionRecord> {
        self.sessions.remove(addr)
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&SessionRecord> {
        self.sessions.get(addr)
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.sessions.contains_key(addr)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

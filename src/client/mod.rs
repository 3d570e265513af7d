//! Client management system
//!
//! Handles control connections, session state and the registry of open
//! sessions.

pub mod handler;
pub mod registry;
pub mod state;

pub use handler::{ControlConnection, handle_client};
pub use registry::{SessionRecord, SessionStore};
pub use state::Session;

//! FTP transfer modes
//!
//! Representation types selected with TYPE, and the data channel mode
//! selected with PORT or PASV.

use std::fmt;
use std::net::SocketAddr;

use crate::transfer::operations::{PassiveListener, PortAddress};

/// Representation type for file transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferType {
    #[default]
    Binary,
    Ascii,
}

impl TransferType {
    /// Parses a TYPE argument, accepting only `I` and `A`
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg.to_ascii_uppercase().as_str() {
            "I" => Some(TransferType::Binary),
            "A" => Some(TransferType::Ascii),
            _ => None,
        }
    }

    /// Name used in the TYPE reply
    pub fn name(&self) -> &'static str {
        match self {
            TransferType::Binary => "binary",
            TransferType::Ascii => "ASCII",
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferType::Binary => write!(f, "BINARY"),
            TransferType::Ascii => write!(f, "ASCII"),
        }
    }
}

/// Data channel mode negotiated for a session.
///
/// Holding the passive listener here means dropping the mode closes it.
#[derive(Debug, Default)]
pub enum DataChannel {
    #[default]
    None,
    Active(PortAddress),
    Passive(PassiveListener),
}

impl DataChannel {
    /// True once PORT or PASV has been issued and not yet consumed
    pub fn is_set(&self) -> bool {
        !matches!(self, DataChannel::None)
    }

    /// Local address of the passive listener, if any
    pub fn passive_addr(&self) -> Option<SocketAddr> {
        match self {
            DataChannel::Passive(listener) => Some(listener.local_addr()),
            _ => None,
        }
    }

    /// Drops any listener and resets to `None`
    pub fn close(&mut self) {
        *self = DataChannel::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_arguments() {
        assert_eq!(TransferType::from_arg("I"), Some(TransferType::Binary));
        assert_eq!(TransferType::from_arg("a"), Some(TransferType::Ascii));
        assert_eq!(TransferType::from_arg("E"), None);
        assert_eq!(TransferType::from_arg("L 8"), None);
        assert_eq!(TransferType::from_arg(""), None);
    }

    #[test]
    fn default_is_binary() {
        assert_eq!(TransferType::default(), TransferType::Binary);
        assert_eq!(TransferType::Binary.to_string(), "BINARY");
        assert_eq!(TransferType::Ascii.name(), "ASCII");
    }
}

//! Transfer module for FTP server
//!
//! Handles data channel negotiation and the byte streams carried over it.

pub mod data_channel;
pub mod file_ops;
pub mod modes;
pub mod operations;

// Re-export key types and functions
pub use data_channel::DataChannelBroker;
pub use file_ops::{
    create_for_upload, handle_file_download, handle_file_upload, list_directory,
    open_for_download, send_listing,
};
pub use modes::{DataChannel, TransferType};
pub use operations::{PassiveListener, PortAddress, setup_active_mode, setup_passive_mode};

//! Authentication system
//!
//! Handles the USER/PASS exchange against the configured credentials.

pub mod validator;

pub use validator::{password_matches, validate_password, validate_user};

//! File system storage management
//!
//! Resolves client paths inside the sandbox root.

pub mod sandbox;

pub use sandbox::PathSandbox;

//! Error handling module for the gateway access oracle.

mod error;

// Re-export the main error types and utilities
pub use error::{GatewayError, Result};

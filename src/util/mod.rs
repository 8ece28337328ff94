//! Utility modules for devbox
//!
//! - Structured logging setup and configuration

pub mod logging;

pub use logging::{init_logging, LoggingConfig};

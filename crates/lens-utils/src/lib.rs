//! # Lens Utilities
//!
//! Shared helpers for the Lens workspace.
//!
//! The inspection engine only emits `tracing` events. This crate owns the
//! subscriber side: formats, filters and where the output goes.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    init_logging, init_logging_for_host, init_logging_with_level, LogFormat, LogLevel, LoggingError, LoggingGuard,
};
pub use tracing::{debug, error, info, trace, warn};

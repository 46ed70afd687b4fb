//! Tracing and logging setup shared by the binary and tests.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::{LogFormat, LoggingConfig};

/// Initialize process-wide logging from `config`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &LoggingConfig) {
    tracing::init(config);
}

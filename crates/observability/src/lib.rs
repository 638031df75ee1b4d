//! Process-wide logging setup shared by the timeclock binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::{ObservabilityConfig, init};

/// Initialize logging from `RUST_LOG` / `TIMECLOCK_LOG_JSON`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init_from_env() {
    init(&ObservabilityConfig::from_env());
}

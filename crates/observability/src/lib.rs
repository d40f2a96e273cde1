//! Process-wide logging setup shared by the binaries.

pub mod tracing;

pub use self::tracing::LogFormat;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    self::tracing::init(LogFormat::from_env());
}

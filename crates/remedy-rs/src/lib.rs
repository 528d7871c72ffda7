//! Public surface of the prescription-complaint assistant.
//!
//! This crate re-exports the building blocks and provides a small
//! initialization helper shared by the `remedy` binary and embedders.

/// Re-export for convenience.
pub use remedy_rs_config as config;
pub use remedy_rs_core as core;
/// Re-export for convenience.
pub use remedy_rs_protocol as protocol;
pub use remedy_rs_providers as providers;
/// Re-export for convenience.
pub use remedy_rs_server as server;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup so log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}

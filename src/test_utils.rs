//! Test utilities and global setup.
//!
//! Provides centralized test logging configuration.

/// Test logging utilities
#[cfg(feature = "test-logging")]
pub mod logging {
    use std::sync::Once;
    use tracing_subscriber::{EnvFilter, fmt};

    static INIT: Once = Once::new();

    /// Initialize test logging globally — safe to call multiple times.
    ///
    /// Respects `RUST_LOG` with a sensible default, uses the test writer
    /// so output interleaves with the harness, and tolerates repeated
    /// initialization across test binaries.
    ///
    /// Enable with `cargo test --features test-logging`; auto-install it
    /// for a module via:
    ///
    /// ```rust,ignore
    /// #[cfg(feature = "test-logging")]
    /// #[ctor::ctor]
    /// fn init_test_logging() {
    ///     crate::test_utils::logging::init();
    /// }
    /// ```
    pub fn init() {
        INIT.call_once(|| {
            let env_filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("debug,tokio=info"));

            fmt()
                .with_env_filter(env_filter)
                .with_test_writer()
                .with_target(true)
                .with_thread_ids(true)
                .compact()
                .try_init()
                .ok();
        });
    }
}

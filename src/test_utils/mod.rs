//! Test utilities for forgegraph
//!
//! Helpers shared by the unit tests and the integration suite (enabled there
//! through the `test-utils` feature):
//!
//! - [`init_test_logging`] installs a test-friendly tracing subscriber once
//! - [`RuntimeFixture`] fabricates a runtime archive with a step manifest and
//!   publishes it into a Maven-layout directory
//! - [`write_jar`] and [`write_obfuscated_jar`] fabricate jars with manifests
//! - [`StaticResolver`] answers detached resolutions from a fixed table
//! - [`RecordingMappingChannel`] records which mapping tasks were requested
//!
//! # Example
//!
//! ```rust,no_run
//! use forgegraph::test_utils::{RuntimeFixture, init_test_logging};
//! use serde_json::json;
//!
//! init_test_logging(None);
//! let temp = tempfile::TempDir::new().unwrap();
//! let fixture = RuntimeFixture::new(temp.path())
//!     .with_steps("joined", json!([{ "type": "downloadClient" }]))
//!     .write();
//! let _resolver = fixture.resolver();
//! ```

pub mod fixtures;

pub use fixtures::{
    RecordingMappingChannel, RuntimeFixture, StaticResolver, write_jar, write_obfuscated_jar,
};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `None` the `RUST_LOG` environment
/// variable decides; without it tests stay silent.
///
/// ```bash
/// RUST_LOG=forgegraph=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

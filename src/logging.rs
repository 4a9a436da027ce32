//! Tracing subscriber setup.
//!
//! Log output goes to stderr so command output on stdout stays parseable
//! (`docqa ask --json` pipes cleanly into `jq`).

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "DOCQA_LOG";

/// Initialize the global subscriber. Respects `DOCQA_LOG`, defaulting to
/// `info`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

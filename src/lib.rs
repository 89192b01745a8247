pub mod config;
pub mod llm; // Text-generation service boundary
pub mod models;
pub mod pipeline;
pub mod storage; // Persistence collaborator

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, filtered by `RUST_LOG` or the default filter.
/// Logs go to stderr so stdout stays clean for JSON output. Calling it twice
/// is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

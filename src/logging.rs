//! Structured logging setup.
//!
//! Log filtering is read from the `GIGA_LOG` environment variable, using the
//! `tracing-subscriber` directive syntax:
//!
//! - `GIGA_LOG=debug` - mapping mutations and split selection
//! - `GIGA_LOG=gigaplus::partitioning::resolver=trace` - every lookup
//! - `GIGA_LOG=warn,gigaplus::cache=debug` - combined filters

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "GIGA_LOG";

/// Install the global subscriber at `info` unless `GIGA_LOG` says otherwise.
pub fn init() {
    init_with_default("info");
}

/// Install the global subscriber with `default_level` as the fallback filter.
///
/// Only the first call in a process takes effect.
pub fn init_with_default(default_level: &str) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init();
        init();
        init_with_default("debug");
        tracing::debug!(radix = 3, "logging initialized");
    }
}

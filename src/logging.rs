//! Log output for the binary.
//!
//! Diagnostics go to stderr through `tracing-subscriber` so stdout stays
//! clean for command results.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "ragngine=debug"
    } else {
        "ragngine=info"
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `verbose`.
///
/// Calling it twice is harmless; the second call leaves the first
/// subscriber in place.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(false), "ragngine=info");
        assert_eq!(default_filter(true), "ragngine=debug");
    }

    #[test]
    fn test_default_filters_parse() {
        for verbose in [false, true] {
            assert!(EnvFilter::try_new(default_filter(verbose)).is_ok());
        }
    }
}

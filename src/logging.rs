//! Logging initialization.
//!
//! Events go to stderr so they never mix with command output.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Environment variable that turns on debug output, like `--debug`.
pub const DEBUG_ENV: &str = "SHELL_FRAGMENTS_DEBUG";

static INIT_ONCE: Once = Once::new();

/// Install the global subscriber. Later calls are no-ops.
///
/// `RUST_LOG` takes precedence; otherwise this crate logs at `debug` when
/// `debug` is set and at `warn` when it is not.
pub fn init(debug: bool) {
    INIT_ONCE.call_once(|| {
        let fallback = if debug {
            "shell_fragments=debug"
        } else {
            "shell_fragments=warn"
        };
        // Fails only if another subscriber was installed first, e.g. by an embedder.
        let _ = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
            )
            .try_init();
    });
}

/// Whether [`DEBUG_ENV`] holds a truthy value.
pub fn debug_from_env() -> bool {
    std::env::var(DEBUG_ENV).is_ok_and(|value| is_truthy(&value))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_idempotent() {
        init(false);
        init(true);
        init(false);
    }

    #[test]
    fn test_truthy_values() {
        for value in ["1", "true", "TRUE", "Yes", " on "] {
            assert!(is_truthy(value), "{value}");
        }
        for value in ["", "0", "false", "off", "debug"] {
            assert!(!is_truthy(value), "{value}");
        }
    }
}

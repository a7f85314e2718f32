//! Tracing subscriber setup.
//!
//! The driver only emits `tracing` events; applications that do not install a
//! subscriber of their own can call [`init_tracing`].

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogOptions {
    /// Filter used when `RUST_LOG` is not set (default: "info")
    pub level: String,
    /// Emit JSON lines instead of plain text
    pub json: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Install the global tracing subscriber.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing(options: &LogOptions) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&options.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if options.json {
        subscriber.with(fmt::layer().json()).try_init().is_ok()
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .try_init()
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = LogOptions::default();
        assert_eq!(options.level, "info");
        assert!(!options.json);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: LogOptions = serde_json::from_str(r#"{"json": true}"#).unwrap();
        assert!(options.json);
        assert_eq!(options.level, "info");
    }

    #[test]
    fn test_second_init_is_harmless() {
        let options = LogOptions {
            level: "debug".to_string(),
            json: false,
        };
        init_tracing(&options);
        assert!(!init_tracing(&options));
    }
}

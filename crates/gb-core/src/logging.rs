//! Logging setup and engine log translation

use crate::config::DebugConfig;
use tracing_subscriber::EnvFilter;

/// Severity scale understood by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HostLogLevel {
    Debug,
    Info,
    Message,
    Warning,
    Critical,
}

/// Severity scale used by the engine's logger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineLogLevel {
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Stub,
    GameError,
}

impl From<EngineLogLevel> for HostLogLevel {
    fn from(level: EngineLogLevel) -> Self {
        match level {
            EngineLogLevel::Fatal | EngineLogLevel::Error => HostLogLevel::Critical,
            EngineLogLevel::Warn => HostLogLevel::Warning,
            EngineLogLevel::Info => HostLogLevel::Info,
            EngineLogLevel::Debug | EngineLogLevel::Stub | EngineLogLevel::GameError => {
                HostLogLevel::Debug
            }
        }
    }
}

/// Format an engine record the way the host expects it
pub fn format_engine_message(category: &str, message: &str) -> String {
    format!("{}: {}", category, message)
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Installing twice is
/// not an error, so tests and embedding hosts may both call this.
pub fn init(config: &DebugConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_directive()));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_level_translation() {
        assert_eq!(HostLogLevel::from(EngineLogLevel::Fatal), HostLogLevel::Critical);
        assert_eq!(HostLogLevel::from(EngineLogLevel::Error), HostLogLevel::Critical);
        assert_eq!(HostLogLevel::from(EngineLogLevel::Warn), HostLogLevel::Warning);
        assert_eq!(HostLogLevel::from(EngineLogLevel::Info), HostLogLevel::Info);
        assert_eq!(HostLogLevel::from(EngineLogLevel::Stub), HostLogLevel::Debug);
        assert_eq!(HostLogLevel::from(EngineLogLevel::GameError), HostLogLevel::Debug);
    }

    #[test]
    fn test_format_engine_message() {
        assert_eq!(format_engine_message("GB Audio", "overflow"), "GB Audio: overflow");
    }

    #[test]
    fn test_init_twice() {
        let config = DebugConfig {
            log_level: LogLevel::Debug,
        };
        init(&config);
        init(&config);
    }
}

//! Logging configuration for `ppm`.
//!
//! Diagnostics always go to stderr; stdout carries records only. Sources,
//! lowest precedence first: `RUST_LOG` directives, `PPM_LOG`,
//! `PPM_LOG_FORMAT`, then the `-v`/`-q` and `--log-format` flags. A plain
//! level from `PPM_LOG` or a flag replaces any `RUST_LOG` directives.

use serde::{Deserialize, Serialize};

/// Environment variable selecting the log level.
pub const ENV_LOG_LEVEL: &str = "PPM_LOG";
/// Environment variable selecting the log format.
pub const ENV_LOG_FORMAT: &str = "PPM_LOG_FORMAT";
/// Per-target directives, used only when no level is given otherwise.
pub const ENV_RUST_LOG: &str = "RUST_LOG";

/// How events are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact lines for someone watching a run.
    #[default]
    Human,
    /// One JSON object per event with `run_id`, `stage` and `event` fields.
    Jsonl,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "pretty" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format '{s}' (expected human or jsonl)")),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum severity of emitted events.
///
/// At `info` a batch run reports config loading, run start and finish, and
/// the written output. At `warn` only skipped cases and cancellation remain.
/// `debug` adds one event per finished case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    /// Level implied by the `-q` and `-v` flags; `None` leaves the
    /// environment in charge.
    pub fn from_verbosity(quiet: bool, verbose: u8) -> Option<Self> {
        match (quiet, verbose) {
            (true, _) => Some(LogLevel::Error),
            (false, 0) => None,
            (false, 1) => Some(LogLevel::Debug),
            (false, _) => Some(LogLevel::Trace),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "quiet" => Ok(LogLevel::Off),
            _ => Err(format!("unknown log level '{s}'")),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for tracing_subscriber::filter::LevelFilter {
    fn from(level: LogLevel) -> Self {
        use tracing_subscriber::filter::LevelFilter;
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// `RUST_LOG` directives; set only when they decide the filter.
    pub directives: Option<String>,
}

impl LogConfig {
    /// Resolve from the process environment and CLI overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::resolve(|name| std::env::var(name).ok(), cli_level, cli_format)
    }

    /// Resolve with `env` standing in for the process environment.
    /// Unparseable values are ignored.
    pub fn resolve<F>(env: F, cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_level = env(ENV_LOG_LEVEL).and_then(|v| v.parse::<LogLevel>().ok());
        let env_format = env(ENV_LOG_FORMAT).and_then(|v| v.parse::<LogFormat>().ok());

        let (level, directives) = match cli_level.or(env_level) {
            Some(level) => (level, None),
            None => (
                LogLevel::default(),
                env(ENV_RUST_LOG).filter(|d| !d.trim().is_empty()),
            ),
        };

        LogConfig {
            format: cli_format.or(env_format).unwrap_or_default(),
            level,
            directives,
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self.directives = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert!(err.contains("human or jsonl"));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("quiet".parse::<LogLevel>().unwrap(), LogLevel::Off);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(LogLevel::from_verbosity(false, 0), None);
        assert_eq!(LogLevel::from_verbosity(false, 1), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_verbosity(false, 3), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_verbosity(true, 2), Some(LogLevel::Error));
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(LogConfig::resolve(env(&[]), None, None), LogConfig::default());
    }

    #[test]
    fn test_rust_log_used_only_without_a_level() {
        let vars = [("RUST_LOG", "ppm_core=debug")];
        let config = LogConfig::resolve(env(&vars), None, None);
        assert_eq!(config.directives.as_deref(), Some("ppm_core=debug"));

        let vars = [("RUST_LOG", "ppm_core=debug"), ("PPM_LOG", "warn")];
        let config = LogConfig::resolve(env(&vars), None, None);
        assert_eq!(config.level, LogLevel::Warn);
        assert!(config.directives.is_none());

        let config = LogConfig::resolve(env(&vars), Some(LogLevel::Error), None);
        assert_eq!(config.level, LogLevel::Error);
        assert!(config.directives.is_none());
    }

    #[test]
    fn test_cli_format_beats_environment() {
        let vars = [("PPM_LOG_FORMAT", "jsonl"), ("PPM_LOG", "nonsense")];
        let config = LogConfig::resolve(env(&vars), None, None);
        assert_eq!(config.format, LogFormat::Jsonl);
        assert_eq!(config.level, LogLevel::Info);

        let config = LogConfig::resolve(env(&vars), None, Some(LogFormat::Human));
        assert_eq!(config.format, LogFormat::Human);
    }
}

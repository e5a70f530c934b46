//! Tracing subscriber setup for pilot-send
//!
//! Output goes to stderr; stdout is reserved for tick reports.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
    Pretty,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{}' (use text, json or pretty)", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    /// Turns on debug output for the postpilot crates only
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: "info".to_string(),
            verbose: false,
        }
    }
}

impl LoggingConfig {
    /// Reads `POSTPILOT_LOG_FORMAT` and `POSTPILOT_LOG_LEVEL`; an unparseable format is ignored
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            format: std::env::var("POSTPILOT_LOG_FORMAT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.format),
            level: std::env::var("POSTPILOT_LOG_LEVEL").unwrap_or(defaults.level),
            verbose: defaults.verbose,
        }
    }

    /// Filter directive applied when `RUST_LOG` is unset
    pub fn default_directive(&self) -> String {
        if self.verbose {
            "libpostpilot=debug,pilot_send=debug,info".to_string()
        } else {
            self.level.clone()
        }
    }

    /// Panics if a global subscriber is already installed.
    pub fn init(&self) {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(self.default_directive()));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);

        match self.format {
            // post_id, platform and comment_id land as top-level keys
            LogFormat::Json => builder.json().flatten_event(true).with_current_span(true).init(),
            LogFormat::Pretty => builder.pretty().with_file(true).with_line_number(true).init(),
            LogFormat::Text => builder.with_target(false).init(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);

        let err = "yaml".parse::<LogFormat>().unwrap_err();
        assert!(err.contains("unknown log format 'yaml'"));
    }

    #[test]
    fn test_log_format_display_matches_parse() {
        for format in [LogFormat::Text, LogFormat::Json, LogFormat::Pretty] {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
    }

    #[test]
    fn test_verbose_overrides_level() {
        let quiet = LoggingConfig {
            level: "warn".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(quiet.default_directive(), "warn");

        let verbose = LoggingConfig {
            verbose: true,
            ..quiet
        };
        assert!(verbose.default_directive().contains("libpostpilot=debug"));
    }

    #[test]
    #[serial_test::serial]
    fn test_config_from_env() {
        std::env::set_var("POSTPILOT_LOG_FORMAT", "json");
        std::env::set_var("POSTPILOT_LOG_LEVEL", "debug");
        let config = LoggingConfig::from_env();
        std::env::set_var("POSTPILOT_LOG_FORMAT", "xml");
        let bad_format = LoggingConfig::from_env();
        std::env::remove_var("POSTPILOT_LOG_FORMAT");
        std::env::remove_var("POSTPILOT_LOG_LEVEL");

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "debug");
        assert_eq!(bad_format.format, LogFormat::Text);
        assert_eq!(LoggingConfig::from_env(), LoggingConfig::default());
    }
}

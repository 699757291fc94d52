//! Carelink Logging
//!
//! Structured logging for the membership checkout crates, controlled by the
//! `CARELINK_*` environment variables.
//!
//! # Usage
//!
//! ```rust
//! use carelink_log::{debug, info, warn};
//!
//! info!("wizard opened");
//! let attempt = 2;
//! warn!(target: "carelink::orchestrator", "intent creation retry {}", attempt);
//! debug!("client secret {}", carelink_log::redact("pi_3N_secret_abcdef"));
//! ```
//!
//! # Environment Variables
//!
//! - `CARELINK_DEBUG=1` - Enable debug logging
//! - `CARELINK_LOG_LEVEL=debug|info|warn|error` - Set log level
//! - `CARELINK_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `CARELINK_LOG_COLOR=1|0` - Enable/disable colors
//! - `CARELINK_LOG_TIMESTAMPS=1|0` - Prefix lines with a timestamp

use once_cell::sync::Lazy;
use std::env;
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

// ============================================================================
// Levels and formats
// ============================================================================

/// Log level, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

const LEVELS: [Level; 6] = [
    Level::Trace,
    Level::Debug,
    Level::Info,
    Level::Warn,
    Level::Error,
    Level::Off,
];

impl Level {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warning" => Some(Level::Warn),
            "none" => Some(Level::Off),
            name => LEVELS
                .into_iter()
                .find(|level| level.as_str().eq_ignore_ascii_case(name)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }

    fn filter(self) -> log::LevelFilter {
        match self {
            Level::Trace => log::LevelFilter::Trace,
            Level::Debug => log::LevelFilter::Debug,
            Level::Info => log::LevelFilter::Info,
            Level::Warn => log::LevelFilter::Warn,
            Level::Error => log::LevelFilter::Error,
            Level::Off => log::LevelFilter::Off,
        }
    }

    #[cfg(feature = "color")]
    fn paint(self) -> colored::ColoredString {
        use colored::Colorize;
        let name = self.as_str();
        match self {
            Level::Trace => name.magenta(),
            Level::Debug => name.blue(),
            Level::Info => name.green(),
            Level::Warn => name.yellow(),
            Level::Error => name.red().bold(),
            Level::Off => name.normal(),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Level::Trace,
            log::Level::Debug => Level::Debug,
            log::Level::Info => Level::Info,
            log::Level::Warn => Level::Warn,
            log::Level::Error => Level::Error,
        }
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human readable, optionally colored
    Pretty,
    /// One short line per record
    Compact,
    /// One JSON object per line
    Json,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub debug: bool,
    pub level: Level,
    pub format: Format,
    pub color: bool,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false,
            timestamps: true,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl LogConfig {
    /// Read configuration from `CARELINK_*` variables and publish the level.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let debug = env_flag("CARELINK_DEBUG").unwrap_or(defaults.debug);
        let fallback_level = if debug { Level::Debug } else { defaults.level };

        let config = Self {
            debug,
            level: env::var("CARELINK_LOG_LEVEL")
                .ok()
                .and_then(|s| Level::parse(&s))
                .unwrap_or(fallback_level),
            format: env::var("CARELINK_LOG_FORMAT")
                .ok()
                .and_then(|s| Format::parse(&s))
                .unwrap_or(defaults.format),
            color: env_flag("CARELINK_LOG_COLOR")
                .unwrap_or_else(|| env::var_os("NO_COLOR").is_none() && env::var_os("TERM").is_some()),
            timestamps: env_flag("CARELINK_LOG_TIMESTAMPS").unwrap_or(defaults.timestamps),
        };

        DEBUG_ENABLED.store(config.debug, Ordering::SeqCst);
        LOG_LEVEL.store(config.level as u8, Ordering::SeqCst);
        config
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Read the environment now instead of on the first log call.
pub fn init() {
    Lazy::force(&CONFIG);
}

pub fn config() -> &'static LogConfig {
    &CONFIG
}

#[inline]
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

/// Whether a record at `level` would be written. `CARELINK_DEBUG` forces debug
/// records on regardless of the level.
#[inline]
pub fn enabled(level: Level) -> bool {
    is_level_enabled(level) || (level == Level::Debug && is_debug_enabled())
}

pub fn current_level() -> Level {
    let raw = LOG_LEVEL.load(Ordering::Relaxed);
    LEVELS
        .into_iter()
        .find(|level| *level as u8 == raw)
        .unwrap_or(Level::Off)
}

pub fn set_level(level: Level) {
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
    log::set_max_level(level.filter());
}

pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    if enabled && current_level() > Level::Debug {
        set_level(Level::Debug);
    }
}

/// Mask a secret for logging, keeping a short recognizable prefix.
///
/// Payment intent client secrets keep their `pi_..._secret_` head so log lines
/// can still be correlated with the gateway dashboard.
pub fn redact(secret: &str) -> String {
    if let Some(idx) = secret.find("_secret_") {
        return format!("{}_secret_***", &secret[..idx]);
    }
    if secret.chars().count() <= 4 {
        return "***".to_string();
    }
    let head: String = secret.chars().take(4).collect();
    format!("{}***", head)
}

// ============================================================================
// Output
// ============================================================================

#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str) {
    if !enabled(level) {
        return;
    }

    let config = config();
    let line = match config.format {
        Format::Json => json_line(level, target, message),
        Format::Pretty | Format::Compact => text_line(level, target, message, config),
    };
    let _ = writeln!(std::io::stderr().lock(), "{}", line);
}

fn text_line(level: Level, target: &str, message: &str, config: &LogConfig) -> String {
    let compact = config.format == Format::Compact;
    let mut line = String::with_capacity(message.len() + target.len() + 32);

    if config.timestamps {
        let pattern = if compact { "%H:%M:%S" } else { "%Y-%m-%d %H:%M:%S%.3f" };
        line.push_str(&chrono::Local::now().format(pattern).to_string());
        line.push(' ');
    }

    if compact {
        line.push_str(&level.as_str()[..1]);
    } else {
        line.push_str(&level_label(level, config.color));
    }
    line.push(' ');

    if !target.is_empty() {
        if compact {
            line.push_str(&format!("{}: ", target));
        } else {
            line.push_str(&format!("[{}] ", target));
        }
    }
    line.push_str(message);
    line
}

#[cfg(feature = "color")]
fn level_label(level: Level, color: bool) -> String {
    if color {
        format!("{:5}", level.paint())
    } else {
        format!("{:5}", level.as_str())
    }
}

#[cfg(not(feature = "color"))]
fn level_label(level: Level, _color: bool) -> String {
    format!("{:5}", level.as_str())
}

#[cfg(feature = "json")]
fn json_line(level: Level, target: &str, message: &str) -> String {
    serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "level": level.as_str(),
        "target": target,
        "message": message,
    })
    .to_string()
}

#[cfg(not(feature = "json"))]
fn json_line(level: Level, target: &str, message: &str) -> String {
    format!(
        r#"{{"timestamp":"{}","level":"{}","target":"{}","message":"{}"}}"#,
        chrono::Utc::now().to_rfc3339(),
        level.as_str(),
        target.escape_default(),
        message.escape_default()
    )
}

// ============================================================================
// `log` crate bridge
// ============================================================================

struct Bridge;

impl log::Log for Bridge {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        enabled(metadata.level().into())
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            log(
                record.level().into(),
                record.target(),
                &record.args().to_string(),
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static BRIDGE: Bridge = Bridge;

/// Route records emitted through the `log` facade (HTTP client, TLS) into
/// this sink. Returns `false` if another logger was already installed.
pub fn install_log_bridge() -> bool {
    init();
    if log::set_logger(&BRIDGE).is_err() {
        return false;
    }
    log::set_max_level(current_level().filter());
    true
}

// ============================================================================
// Macros
// ============================================================================

#[doc(hidden)]
#[macro_export]
macro_rules! __emit {
    ($level:expr, target: $target:expr, $($arg:tt)+) => {
        if $crate::enabled($level) {
            $crate::log($level, $target, &format!($($arg)+));
        }
    };
    ($level:expr, $($arg:tt)+) => {
        $crate::__emit!($level, target: module_path!(), $($arg)+)
    };
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Trace, $($arg)+) };
}

/// Only emitted when `CARELINK_DEBUG=1` or `CARELINK_LOG_LEVEL=debug`.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Debug, $($arg)+) };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Info, $($arg)+) };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Warn, $($arg)+) };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Error, $($arg)+) };
}

// ============================================================================
// Tracing Integration
// ============================================================================

#[cfg(feature = "tracing")]
pub mod tracing_compat {
    //! Subscriber honoring `CARELINK_LOG_LEVEL` for hosts that use `tracing`.

    use super::*;

    /// Build a subscriber at the configured level; `RUST_LOG` wins if set.
    pub fn subscriber() -> impl tracing::Subscriber {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{EnvFilter, fmt};

        let config = config();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(config.color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Off);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(Level::parse("debug"), Some(Level::Debug));
        assert_eq!(Level::parse(" WARNING "), Some(Level::Warn));
        assert_eq!(Level::parse("none"), Some(Level::Off));
        assert_eq!(Level::parse("loud"), None);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(Format::parse("json"), Some(Format::Json));
        assert_eq!(Format::parse("Compact"), Some(Format::Compact));
        assert_eq!(Format::parse("xml"), None);
    }

    #[test]
    fn test_redact_client_secret() {
        assert_eq!(redact("pi_3Nx_secret_abcdef"), "pi_3Nx_secret_***");
    }

    #[test]
    fn test_redact_token() {
        assert_eq!(redact("eyJhbGciOiJIUzI1NiJ9"), "eyJh***");
        assert_eq!(redact("abc"), "***");
    }

    #[test]
    fn test_text_line_layouts() {
        let pretty = LogConfig {
            format: Format::Pretty,
            timestamps: false,
            ..LogConfig::default()
        };
        assert_eq!(
            text_line(Level::Warn, "carelink::wizard", "closed", &pretty),
            "WARN  [carelink::wizard] closed"
        );

        let compact = LogConfig {
            format: Format::Compact,
            ..pretty
        };
        assert_eq!(
            text_line(Level::Info, "carelink::backend", "ok", &compact),
            "I carelink::backend: ok"
        );
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_line_escapes_message() {
        let line = json_line(Level::Error, "t", "said \"no\"");
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["level"], "ERROR");
        assert_eq!(value["message"], "said \"no\"");
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(Level::from(log::Level::Warn), Level::Warn);
        assert_eq!(Level::from(log::Level::Trace), Level::Trace);
    }

    #[test]
    fn test_macros_compile() {
        trace!("trace message");
        debug!("debug message");
        info!(target: "carelink::wizard", "step {}", "membership");
        warn!("warn message");
        error!(target: "test", "with target");
    }
}

//! Logging initialization shared by the service binaries
//!
//! Console output uses a bracketed level format, an optional daily rolling
//! file mirrors it, and the level filter can be swapped at runtime.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

fn level_color(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "\x1b[35m",
        Level::DEBUG => "\x1b[34m",
        Level::INFO => "\x1b[32m",
        Level::WARN => "\x1b[33m",
        Level::ERROR => "\x1b[31m",
    }
}

/// Event formatter that outputs: `timestamp [LEVEL] message key=value`
///
/// Example output: `2025-12-02T00:50:44.809000Z [INFO] pump 3 IDLE -> FILLING`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            write!(writer, "{}{}\x1b[0m ", level_color(&level), format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Output format of the console layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable `[LEVEL]` lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, also used as the crate target that gets `debug` by default
    pub service_name: String,
    /// Baseline level when `RUST_LOG` is not set
    pub console_level: Level,
    /// Directory for the daily rolling file; `None` disables file output
    pub log_dir: Option<PathBuf>,
    /// Console format
    pub format: LogFormat,
    /// Emit ANSI colors on the console
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            console_level: Level::INFO,
            log_dir: None,
            format: LogFormat::Text,
            ansi: true,
        }
    }
}

type EnvFilterReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

// File writer guard must outlive the subscriber or buffered lines are lost
static FILE_GUARD: OnceLock<Mutex<Option<WorkerGuard>>> = OnceLock::new();
static LOG_FILTER_HANDLE: OnceLock<EnvFilterReloadHandle> = OnceLock::new();
static CURRENT_LOG_LEVEL: OnceLock<Mutex<String>> = OnceLock::new();

/// Build the filter directive: `RUST_LOG` wins, otherwise `<level>,<service>=debug`
pub fn filter_directive(config: &LogConfig) -> String {
    match std::env::var("RUST_LOG") {
        Ok(env) if !env.trim().is_empty() => env,
        _ => format!(
            "{},{}=debug",
            config.console_level.as_str().to_lowercase(),
            config.service_name
        ),
    }
}

/// Initialize the global subscriber
pub fn init_with_config(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let directive = filter_directive(&config);
    let env_filter = EnvFilter::try_new(&directive)?;

    let (reload_filter, reload_handle) = reload::Layer::new(env_filter);
    let _ = LOG_FILTER_HANDLE.set(reload_handle);
    let _ = CURRENT_LOG_LEVEL.set(Mutex::new(directive));

    let console_layer = match config.format {
        LogFormat::Text => fmt::layer()
            .with_ansi(config.ansi)
            .event_format(BracketedLevelFormat)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false)
            .boxed(),
    };

    let file_layer = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", config.service_name));
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            let slot = FILE_GUARD.get_or_init(|| Mutex::new(None));
            match slot.lock() {
                Ok(mut slot) => *slot = Some(guard),
                Err(poisoned) => *poisoned.into_inner() = Some(guard),
            }

            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .boxed(),
            )
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(reload_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        "Logging: {} (file: {})",
        config.service_name,
        config
            .log_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "disabled".to_string())
    );
    Ok(())
}

/// Check a filter string before it replaces the active one
///
/// Every comma-separated directive must be a bare level (`debug`) or end in
/// `=level` (`pumpsrv=trace`). `EnvFilter` on its own reads a bare word as a
/// target enabled at `trace` and everything else disabled.
pub fn validate_directive(level: &str) -> Result<(), String> {
    let directives: Vec<&str> = level
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .collect();
    if directives.is_empty() {
        return Err("Empty log level".to_string());
    }

    for directive in directives {
        let level_part = directive
            .rsplit_once('=')
            .map_or(directive, |(_, level)| level);
        if level_part.trim().parse::<LevelFilter>().is_err() {
            return Err(format!(
                "Invalid log level '{}': '{}' is not a level or target=level",
                level, directive
            ));
        }
    }
    Ok(())
}

/// Dynamically set the log filter, e.g. `"debug"` or `"info,pumpsrv=trace"`
pub fn set_log_level(level: &str) -> Result<(), String> {
    validate_directive(level)?;

    let handle = LOG_FILTER_HANDLE
        .get()
        .ok_or("Logging not initialized with reload support")?;

    let new_filter =
        EnvFilter::try_new(level).map_err(|e| format!("Invalid log level '{}': {}", level, e))?;

    handle
        .reload(new_filter)
        .map_err(|e| format!("Failed to reload log filter: {}", e))?;

    if let Some(current) = CURRENT_LOG_LEVEL.get() {
        if let Ok(mut guard) = current.lock() {
            *guard = level.to_string();
        }
    }

    tracing::info!("Log level changed to: {}", level);
    Ok(())
}

/// Current filter directive, `"unknown"` before initialization
pub fn get_log_level() -> String {
    CURRENT_LOG_LEVEL
        .get()
        .and_then(|m| m.lock().ok())
        .map(|guard| guard.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_format_level_brackets() {
        assert_eq!(format_level(&Level::INFO), "[INFO]");
        assert_eq!(format_level(&Level::WARN), "[WARN]");
        assert_eq!(format_level(&Level::ERROR), "[ERROR]");
    }

    #[test]
    fn test_filter_directive_includes_service_target() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LogConfig {
            service_name: "pumpsrv".to_string(),
            console_level: Level::WARN,
            ..Default::default()
        };
        assert_eq!(filter_directive(&config), "warn,pumpsrv=debug");
    }

    #[test]
    fn test_validate_directive() {
        assert!(validate_directive("debug").is_ok());
        assert!(validate_directive("WARN").is_ok());
        assert!(validate_directive("info,pumpsrv=trace").is_ok());
        assert!(validate_directive("pumpsrv::scheduler=off").is_ok());

        assert!(validate_directive("chatty").is_err());
        assert!(validate_directive("info,chatty").is_err());
        assert!(validate_directive("pumpsrv=loud").is_err());
        assert!(validate_directive(" , ").is_err());
    }

    #[test]
    fn test_set_log_level_requires_init() {
        if LOG_FILTER_HANDLE.get().is_none() {
            assert!(set_log_level("debug").is_err());
            assert_eq!(get_log_level(), "unknown");
        }
    }
}

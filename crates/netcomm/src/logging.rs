//! stderr logging for the CLI.
//!
//! Receive loops, watchdogs and accept loops run on named threads
//! (`netcomm-conn-<id>`, `netcomm-watchdog-<id>`, `netcomm-listener-<port>`),
//! so every layout prints the thread name and log lines can be traced back to
//! one connection. Timestamps are time since start, which is what matters
//! when reading stall timeouts and demo intervals.

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::time::uptime;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One line per event with all fields.
    Text,
    /// Short single-line layout for interactive use.
    Compact,
    /// Newline-delimited JSON with event fields flattened.
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    /// Connection lifecycle, stalls and accepted clients.
    Info,
    /// Socket open/close and loop start/stop.
    Debug,
    /// Every read and every frame.
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Module targets only help once per-frame events are enabled.
    fn shows_target(self) -> bool {
        matches!(self, LogLevel::Trace)
    }
}

/// Logs go to stderr so stdout carries only message output.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_timer(uptime())
        .with_ansi(false)
        .with_thread_names(true)
        .with_target(level.shows_target());

    // A subscriber that is already installed stays in place.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .try_init(),
    };
}

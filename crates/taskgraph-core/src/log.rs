//! Leveled debug-print facility for engine-internal diagnostics.
//!
//! This is **not** the profiling log format of `taskgraph-runtime`'s
//! sinks — that format is a stable, parseable `J`/`W`/`R`/`C` stream
//! meant for offline analysis. This module is maintainer-facing noise:
//! worker lifecycle, backpressure waits, cycle-detection failures.
//!
//! Compiled out entirely unless the `debug-logging` feature is enabled,
//! so release builds of downstream crates pay nothing for it.
//!
//! # Environment variables
//!
//! - `TASKGRAPH_LOG_LEVEL` — `0`=off, `1`=error, `2`=warn, `3`=info, `4`=debug, `5`=trace.
//! - `TASKGRAPH_FLUSH_EPRINT=1` — flush stderr after every line (useful when debugging a crash).

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Severity of a debug-print line.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);
static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

fn ensure_init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }
    let level: u8 = crate::env::env_get("TASKGRAPH_LOG_LEVEL", LogLevel::Warn as u8);
    LOG_LEVEL.store(level, Ordering::Relaxed);
    FLUSH_ENABLED.store(
        crate::env::env_get_bool("TASKGRAPH_FLUSH_EPRINT", false),
        Ordering::Relaxed,
    );
}

/// Set the log level at runtime, overriding the environment default.
pub fn set_log_level(level: LogLevel) {
    ensure_init();
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Current log level.
pub fn log_level() -> LogLevel {
    ensure_init();
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

#[doc(hidden)]
pub fn should_log(level: LogLevel) -> bool {
    ensure_init();
    (level as u8) <= LOG_LEVEL.load(Ordering::Relaxed)
}

#[doc(hidden)]
pub fn emit(level: LogLevel, args: std::fmt::Arguments<'_>) {
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "{} {}", level.prefix(), args);
    if FLUSH_ENABLED.load(Ordering::Relaxed) {
        let _ = stderr.flush();
    }
}

/// Emit a line at the given [`LogLevel`] if `debug-logging` is enabled
/// and the current level permits it. Prefer the `tg*!` convenience
/// macros below over calling this directly.
#[macro_export]
macro_rules! tglog {
    ($level:expr, $($arg:tt)*) => {
        #[cfg(feature = "debug-logging")]
        {
            if $crate::log::should_log($level) {
                $crate::log::emit($level, format_args!($($arg)*));
            }
        }
        #[cfg(not(feature = "debug-logging"))]
        {
            let _ = $level;
            if false {
                // Keep format args type-checked even when compiled out.
                let _ = format_args!($($arg)*);
            }
        }
    };
}

#[macro_export]
macro_rules! tgerror {
    ($($arg:tt)*) => { $crate::tglog!($crate::log::LogLevel::Error, $($arg)*) };
}

#[macro_export]
macro_rules! tgwarn {
    ($($arg:tt)*) => { $crate::tglog!($crate::log::LogLevel::Warn, $($arg)*) };
}

#[macro_export]
macro_rules! tginfo {
    ($($arg:tt)*) => { $crate::tglog!($crate::log::LogLevel::Info, $($arg)*) };
}

#[macro_export]
macro_rules! tgdebug {
    ($($arg:tt)*) => { $crate::tglog!($crate::log::LogLevel::Debug, $($arg)*) };
}

#[macro_export]
macro_rules! tgtrace {
    ($($arg:tt)*) => { $crate::tglog!($crate::log::LogLevel::Trace, $($arg)*) };
}

//! Pluggable logging seam.
//!
//! The cache never logs straight to a global facade on behalf of its host.
//! Components that need to report, most importantly the manager when it
//! swallows a disk-tier failure, take an `Arc<dyn Logger>` and the host
//! decides where those messages go: [`TracingLogger`] forwards to the
//! `tracing` ecosystem, [`NoOpLogger`] drops everything, and tests can plug
//! in a capturing implementation.
//!
//! The `log_*!` macros keep call sites free of `format_args!` noise:
//!
//! ```
//! use stratacache::{log_warn, Logger, NoOpLogger};
//!
//! let logger = NoOpLogger;
//! log_warn!(logger, "disk write for {} failed", "some-key");
//! ```

use std::fmt::Arguments;

/// Message severity, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Destination for cache log output.
///
/// Implementations must be thread-safe; a single logger instance is shared by
/// the manager and any tiers it owns.
pub trait Logger: Send + Sync {
    /// Records one message at `level`.
    fn log(&self, level: LogLevel, args: Arguments<'_>);

    fn trace(&self, args: Arguments<'_>) {
        self.log(LogLevel::Trace, args);
    }

    fn debug(&self, args: Arguments<'_>) {
        self.log(LogLevel::Debug, args);
    }

    fn info(&self, args: Arguments<'_>) {
        self.log(LogLevel::Info, args);
    }

    fn warn(&self, args: Arguments<'_>) {
        self.log(LogLevel::Warn, args);
    }

    fn error(&self, args: Arguments<'_>) {
        self.log(LogLevel::Error, args);
    }
}

/// Logger that discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    #[inline]
    fn log(&self, _level: LogLevel, _args: Arguments<'_>) {}
}

/// Forwards cache messages to the `tracing` facade at matching levels.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        match level {
            LogLevel::Trace => tracing::trace!("{}", args),
            LogLevel::Debug => tracing::debug!("{}", args),
            LogLevel::Info => tracing::info!("{}", args),
            LogLevel::Warn => tracing::warn!("{}", args),
            LogLevel::Error => tracing::error!("{}", args),
        }
    }
}

/// Logs through a [`Logger`] at trace level.
#[macro_export]
macro_rules! log_trace {
    ($logger:expr, $($arg:tt)*) => {
        $logger.trace(format_args!($($arg)*))
    };
}

/// Logs through a [`Logger`] at debug level.
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(format_args!($($arg)*))
    };
}

/// Logs through a [`Logger`] at info level.
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(format_args!($($arg)*))
    };
}

/// Logs through a [`Logger`] at warn level.
#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(format_args!($($arg)*))
    };
}

/// Logs through a [`Logger`] at error level.
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CaptureLogger {
        messages: Mutex<Vec<(LogLevel, String)>>,
    }

    impl Logger for CaptureLogger {
        fn log(&self, level: LogLevel, args: Arguments<'_>) {
            self.messages.lock().push((level, args.to_string()));
        }
    }

    #[test]
    fn default_methods_pick_their_level() {
        let logger = CaptureLogger::default();
        logger.trace(format_args!("t"));
        logger.debug(format_args!("d"));
        logger.info(format_args!("i"));
        logger.warn(format_args!("w"));
        logger.error(format_args!("e"));

        let messages = logger.messages.lock();
        let levels: Vec<LogLevel> = messages.iter().map(|(level, _)| *level).collect();
        assert_eq!(
            levels,
            vec![
                LogLevel::Trace,
                LogLevel::Debug,
                LogLevel::Info,
                LogLevel::Warn,
                LogLevel::Error,
            ]
        );
    }

    #[test]
    fn macros_format_arguments() {
        let logger = CaptureLogger::default();
        log_info!(logger, "cache {} ready after {}ms", "thumbs", 12);

        let messages = logger.messages.lock();
        assert_eq!(
            messages.as_slice(),
            &[(LogLevel::Info, "cache thumbs ready after 12ms".to_string())]
        );
    }

    #[test]
    fn macros_work_through_shared_pointers() {
        use std::sync::Arc;

        let logger: Arc<CaptureLogger> = Arc::new(CaptureLogger::default());
        log_warn!(logger, "degraded");

        assert_eq!(logger.messages.lock().len(), 1);
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn noop_logger_accepts_everything() {
        let logger = NoOpLogger;
        log_error!(logger, "dropped on the floor: {}", 42);
    }
}

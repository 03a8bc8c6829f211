//! Verbosity modes and severity selectors.

use std::fmt;

use tracing::level_filters::LevelFilter;

use crate::event::{Event, EventLogger};

/// Verbosity requested by the ORM side, mirroring the usual
/// silent / error / warn / info ladder.
///
/// This is a thin wrapper over an integer so that values outside the known
/// range can still be represented; the mapping functions treat them
/// like [`LogMode::INFO`] (or like [`LogMode::SILENT`] when they are lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogMode(pub i32);

impl LogMode {
    pub const SILENT: LogMode = LogMode(1);
    pub const ERROR: LogMode = LogMode(2);
    pub const WARN: LogMode = LogMode(3);
    pub const INFO: LogMode = LogMode(4);
}

impl From<i32> for LogMode {
    fn from(value: i32) -> Self {
        LogMode(value)
    }
}

impl fmt::Display for LogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            LogMode::SILENT => f.write_str("silent"),
            LogMode::ERROR => f.write_str("error"),
            LogMode::WARN => f.write_str("warn"),
            LogMode::INFO => f.write_str("info"),
            LogMode(other) => write!(f, "mode({other})"),
        }
    }
}

/// Maps [`LogMode::INFO`] (and anything unrecognised) to `DEBUG`, so sql
/// dumping becomes visible in info mode.
pub fn default_level_map(mode: LogMode) -> LevelFilter {
    if mode <= LogMode::SILENT {
        LevelFilter::OFF
    } else if mode == LogMode::ERROR {
        LevelFilter::ERROR
    } else if mode == LogMode::WARN {
        LevelFilter::WARN
    } else {
        LevelFilter::DEBUG
    }
}

/// Like [`default_level_map`], but info mode opens the handle all the way
/// down to `TRACE`, so messages routed to trace (time tracking, ignored
/// errors) show up as well.
pub fn with_time_tracking(mode: LogMode) -> LevelFilter {
    if mode <= LogMode::SILENT {
        LevelFilter::OFF
    } else if mode == LogMode::ERROR {
        LevelFilter::ERROR
    } else if mode == LogMode::WARN {
        LevelFilter::WARN
    } else {
        LevelFilter::TRACE
    }
}

/// The message is dropped whatever the handle's threshold is.
pub fn ignore(logger: &EventLogger) -> Event {
    logger.trace().discard()
}

pub fn use_error(logger: &EventLogger) -> Event {
    logger.error()
}

pub fn use_warn(logger: &EventLogger) -> Event {
    logger.warn()
}

pub fn use_info(logger: &EventLogger) -> Event {
    logger.info()
}

pub fn use_debug(logger: &EventLogger) -> Event {
    logger.debug()
}

pub fn use_trace(logger: &EventLogger) -> Event {
    logger.trace()
}

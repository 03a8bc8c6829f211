//! Configuration for query logging behavior.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::unsync::Lazy;
use tracing::level_filters::LevelFilter;

use crate::event::{Event, EventLogger};
use crate::helper::ignore_common_err;
use crate::level::{default_level_map, use_debug, use_error, use_warn, LogMode};
use crate::logger::QueryContext;

/// Row count meaning "unknown or not applicable"; suppresses the
/// affected-rows field.
pub const ROWS_UNKNOWN: i64 = -1;

pub const DEFAULT_SQL_KEY: &str = "sql";
pub const DEFAULT_DURATION_KEY: &str = "duration";
pub const DEFAULT_AFFECTED_ROWS_KEY: &str = "affected_rows";

/// Picks the level of a message.
pub type LevelSelector = Arc<dyn Fn(&EventLogger) -> Event + Send + Sync>;

/// Picks the level of an error message from the error itself.
pub type ErrorLevelSelector =
    Arc<dyn Fn(&(dyn Error + 'static), &EventLogger) -> Event + Send + Sync>;

/// Adds extra fields to a message that is about to be emitted.
pub type Customizer = Arc<dyn Fn(&QueryContext<'_>, &mut Event) + Send + Sync>;

/// Lazily produced `(sql, rows_affected)` of a finished query.
pub type QuerySupplier<'a> = Lazy<(String, i64), Box<dyn FnOnce() -> (String, i64) + 'a>>;

/// Configuration options for query logging.
///
/// The defaults are enough for most applications:
///
/// - errors are logged at ERROR
/// - sql dumps are logged at DEBUG, so they only show up in info mode
/// - slow query messages are logged at WARN, but the threshold is unset
/// - field keys are `sql`, `duration` and `affected_rows`
///
/// # Example
///
/// ```rust
/// use sea_orm_query_logger::{helper, LoggerConfig};
/// use std::time::Duration;
///
/// let config = LoggerConfig::default()
///     .with_slow_threshold(Duration::from_millis(200))
///     .with_error_level(helper::debug_common_err)
///     .with_sql_key("query");
/// ```
#[derive(Clone)]
pub struct LoggerConfig {
    /// Slow query threshold. `None` or zero disables slow query messages.
    pub slow_threshold: Option<Duration>,
    /// Level of slow query messages. Default: WARN.
    pub slow_level: Option<LevelSelector>,
    /// Key of the elapsed time field. Default: `"duration"`.
    pub duration_key: Option<String>,

    /// Level of error messages. Default: ERROR, with the error attached.
    ///
    /// Use it to lower non-critical errors such as record-not-found, see
    /// [`crate::helper::ignore_common_err`] and [`crate::helper::debug_common_err`].
    pub error_level: Option<ErrorLevelSelector>,

    /// Keep parameter values out of logged sql.
    /// Default: `false`
    pub parameterized_queries: bool,

    /// Level of sql dump messages. Default: DEBUG.
    pub dump_level: Option<LevelSelector>,
    /// Add elapsed time to sql dump messages.
    /// Default: `false`
    pub dump_with_duration: bool,
    /// Key of the sql field. Default: `"sql"`.
    pub sql_key: Option<String>,
    /// Key of the affected rows field. Default: `"affected_rows"`.
    pub affected_rows_key: Option<String>,

    /// Extra fields for visible messages: context values, call sites and such.
    pub customize: Option<Customizer>,

    /// How ORM log modes translate to handle thresholds.
    /// Default: [`default_level_map`]
    pub level_map: fn(LogMode) -> LevelFilter,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            slow_threshold: None,
            slow_level: None,
            duration_key: None,
            error_level: None,
            parameterized_queries: false,
            dump_level: None,
            dump_with_duration: false,
            sql_key: None,
            affected_rows_key: None,
            customize: None,
            level_map: default_level_map,
        }
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("slow_threshold", &self.slow_threshold)
            .field("slow_level", &self.slow_level.is_some())
            .field("duration_key", &self.duration_key())
            .field("error_level", &self.error_level.is_some())
            .field("parameterized_queries", &self.parameterized_queries)
            .field("dump_level", &self.dump_level.is_some())
            .field("dump_with_duration", &self.dump_with_duration)
            .field("sql_key", &self.sql_key())
            .field("affected_rows_key", &self.affected_rows_key())
            .field("customize", &self.customize.is_some())
            .finish()
    }
}

fn key<'a>(value: &'a Option<String>, default: &'static str) -> &'a str {
    match value.as_deref() {
        Some(value) if !value.is_empty() => value,
        _ => default,
    }
}

impl LoggerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    pub fn with_slow_level(
        mut self,
        level: impl Fn(&EventLogger) -> Event + Send + Sync + 'static,
    ) -> Self {
        self.slow_level = Some(Arc::new(level));
        self
    }

    pub fn with_duration_key(mut self, key: impl Into<String>) -> Self {
        self.duration_key = Some(key.into());
        self
    }

    pub fn with_error_level(
        mut self,
        level: impl Fn(&(dyn Error + 'static), &EventLogger) -> Event + Send + Sync + 'static,
    ) -> Self {
        self.error_level = Some(Arc::new(level));
        self
    }

    /// Keep parameter values out of logged sql.
    ///
    /// Parameters often carry user input, so this is worth turning on
    /// anywhere logs leave the machine.
    pub fn with_parameterized_queries(mut self, enabled: bool) -> Self {
        self.parameterized_queries = enabled;
        self
    }

    pub fn with_dump_level(
        mut self,
        level: impl Fn(&EventLogger) -> Event + Send + Sync + 'static,
    ) -> Self {
        self.dump_level = Some(Arc::new(level));
        self
    }

    pub fn with_dump_duration(mut self, enabled: bool) -> Self {
        self.dump_with_duration = enabled;
        self
    }

    pub fn with_sql_key(mut self, key: impl Into<String>) -> Self {
        self.sql_key = Some(key.into());
        self
    }

    pub fn with_affected_rows_key(mut self, key: impl Into<String>) -> Self {
        self.affected_rows_key = Some(key.into());
        self
    }

    /// Set the function adding extra fields. It only runs for messages that
    /// pass the level filter.
    pub fn with_customize(
        mut self,
        customize: impl Fn(&QueryContext<'_>, &mut Event) + Send + Sync + 'static,
    ) -> Self {
        self.customize = Some(Arc::new(customize));
        self
    }

    pub fn with_level_map(mut self, level_map: fn(LogMode) -> LevelFilter) -> Self {
        self.level_map = level_map;
        self
    }

    /// Development-friendly configuration: timed sql dumps and a short slow
    /// query threshold.
    ///
    /// **Warning**: parameter values end up in the logs.
    pub fn development() -> Self {
        Self {
            slow_threshold: Some(Duration::from_millis(100)),
            dump_with_duration: true,
            ..Self::default()
        }
    }

    /// Production-safe configuration: no parameter values, not-found and
    /// duplicate-key errors pushed down to TRACE, one second slow threshold.
    pub fn production() -> Self {
        Self {
            slow_threshold: Some(Duration::from_secs(1)),
            parameterized_queries: true,
            error_level: Some(Arc::new(ignore_common_err)),
            ..Self::default()
        }
    }

    pub fn sql_key(&self) -> &str {
        key(&self.sql_key, DEFAULT_SQL_KEY)
    }

    pub fn duration_key(&self) -> &str {
        key(&self.duration_key, DEFAULT_DURATION_KEY)
    }

    pub fn affected_rows_key(&self) -> &str {
        key(&self.affected_rows_key, DEFAULT_AFFECTED_ROWS_KEY)
    }

    /// The slow threshold, if slow query messages are on.
    pub fn effective_slow_threshold(&self) -> Option<Duration> {
        self.slow_threshold.filter(|threshold| !threshold.is_zero())
    }

    pub(crate) fn error_level(&self, err: &(dyn Error + 'static), logger: &EventLogger) -> Event {
        match &self.error_level {
            Some(select) => select(err, logger),
            None => {
                let mut event = use_error(logger);
                event.err(err);
                event
            }
        }
    }

    pub(crate) fn slow_level(&self, logger: &EventLogger) -> Event {
        match &self.slow_level {
            Some(select) => select(logger),
            None => use_warn(logger),
        }
    }

    pub(crate) fn dump_level(&self, logger: &EventLogger) -> Event {
        match &self.dump_level {
            Some(select) => select(logger),
            None => use_debug(logger),
        }
    }

    /// Run the customize function, if any. Meant to be deferred through
    /// [`Event::with`].
    pub(crate) fn customize(&self, ctx: &QueryContext<'_>, event: &mut Event) {
        if let Some(customize) = &self.customize {
            customize(ctx, event);
        }
    }

    fn rows(&self, event: &mut Event, rows: i64) {
        if rows != ROWS_UNKNOWN {
            event.i64(self.affected_rows_key(), rows);
        }
    }

    pub(crate) fn log_err(
        &self,
        err: &(dyn Error + 'static),
        query: &QuerySupplier<'_>,
        event: &mut Event,
    ) {
        let (sql, rows) = Lazy::force(query);
        event.err(err).str(self.sql_key(), sql);
        self.rows(event, *rows);
    }

    pub(crate) fn log_slow(&self, elapsed: Duration, query: &QuerySupplier<'_>, event: &mut Event) {
        let (sql, rows) = Lazy::force(query);
        event.dur(self.duration_key(), elapsed).str(self.sql_key(), sql);
        self.rows(event, *rows);
    }

    pub(crate) fn log_dump(&self, elapsed: Duration, query: &QuerySupplier<'_>, event: &mut Event) {
        if self.dump_with_duration {
            event.dur(self.duration_key(), elapsed);
        }
        let (sql, rows) = Lazy::force(query);
        event.str(self.sql_key(), sql);
        self.rows(event, *rows);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::event::FieldValue;
    use crate::level::use_info;
    use crate::sink::MemorySink;

    fn supplier<'a>(calls: &'a Cell<u32>, rows: i64) -> QuerySupplier<'a> {
        let init: Box<dyn FnOnce() -> (String, i64) + 'a> = Box::new(move || {
            calls.set(calls.get() + 1);
            ("SELECT * FROM users".to_string(), rows)
        });
        Lazy::new(init)
    }

    #[test]
    fn test_default_keys() {
        let config = LoggerConfig::default();
        assert_eq!(config.sql_key(), "sql");
        assert_eq!(config.duration_key(), "duration");
        assert_eq!(config.affected_rows_key(), "affected_rows");
    }

    #[test]
    fn test_empty_keys_fall_back() {
        let config = LoggerConfig::default()
            .with_sql_key("")
            .with_duration_key("took")
            .with_affected_rows_key("");
        assert_eq!(config.sql_key(), "sql");
        assert_eq!(config.duration_key(), "took");
        assert_eq!(config.affected_rows_key(), "affected_rows");
    }

    #[test]
    fn test_default_levels() {
        let logger = EventLogger::new(MemorySink::new());
        let config = LoggerConfig::default();
        let err = std::io::Error::other("boom");

        let event = config.error_level(&err, &logger);
        assert_eq!(event.level(), tracing::Level::ERROR);
        assert_eq!(event.field("error"), Some(&FieldValue::Error("boom".to_string())));
        assert_eq!(config.slow_level(&logger).level(), tracing::Level::WARN);
        assert_eq!(config.dump_level(&logger).level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_overridden_levels() {
        let logger = EventLogger::new(MemorySink::new());
        let config = LoggerConfig::default()
            .with_slow_level(crate::level::use_error)
            .with_dump_level(use_info)
            .with_error_level(|_, l: &EventLogger| l.warn());
        let err = std::io::Error::other("boom");

        let event = config.error_level(&err, &logger);
        assert_eq!(event.level(), tracing::Level::WARN);
        assert!(event.field("error").is_none());
        assert_eq!(config.slow_level(&logger).level(), tracing::Level::ERROR);
        assert_eq!(config.dump_level(&logger).level(), tracing::Level::INFO);
    }

    #[test]
    fn test_zero_threshold_disables_slow_log() {
        assert_eq!(LoggerConfig::default().effective_slow_threshold(), None);
        let config = LoggerConfig::default().with_slow_threshold(Duration::ZERO);
        assert_eq!(config.effective_slow_threshold(), None);
        let config = LoggerConfig::default().with_slow_threshold(Duration::from_secs(3));
        assert_eq!(config.effective_slow_threshold(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_formatters_skip_unknown_rows() {
        let logger = EventLogger::new(MemorySink::new());
        let config = LoggerConfig::default().with_dump_duration(true);
        let calls = Cell::new(0);
        let err = std::io::Error::other("boom");
        let elapsed = Duration::from_millis(12);

        let query = supplier(&calls, ROWS_UNKNOWN);
        let event = logger.error().with(|ev| config.log_err(&err, &query, ev));
        assert!(event.field("affected_rows").is_none());
        assert!(event.field("sql").is_some());

        let event = logger.warn().with(|ev| config.log_slow(elapsed, &query, ev));
        assert!(event.field("affected_rows").is_none());
        assert_eq!(event.field("duration"), Some(&FieldValue::Duration(elapsed)));

        let event = logger.debug().with(|ev| config.log_dump(elapsed, &query, ev));
        assert!(event.field("affected_rows").is_none());
        assert_eq!(event.field("duration"), Some(&FieldValue::Duration(elapsed)));

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_formatters_record_rows() {
        let logger = EventLogger::new(MemorySink::new());
        let config = LoggerConfig::default();
        let calls = Cell::new(0);
        let query = supplier(&calls, 0);

        let event = logger
            .debug()
            .with(|ev| config.log_dump(Duration::from_millis(1), &query, ev));
        assert_eq!(event.field("affected_rows"), Some(&FieldValue::I64(0)));
        assert!(event.field("duration").is_none());
        assert_eq!(
            event.field("sql"),
            Some(&FieldValue::Str("SELECT * FROM users".to_string()))
        );
    }

    #[test]
    fn test_disabled_event_never_runs_supplier() {
        let logger = EventLogger::new(MemorySink::new()).level(LevelFilter::WARN);
        let config = LoggerConfig::default();
        let calls = Cell::new(0);
        let query = supplier(&calls, 1);

        let event = logger
            .debug()
            .with(|ev| config.log_dump(Duration::from_millis(1), &query, ev));
        assert!(!event.enabled());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_presets() {
        let config = LoggerConfig::development();
        assert!(config.dump_with_duration);
        assert!(!config.parameterized_queries);

        let config = LoggerConfig::production();
        assert!(config.parameterized_queries);
        assert!(config.error_level.is_some());
        assert_eq!(config.effective_slow_threshold(), Some(Duration::from_secs(1)));
    }
}

//! The query logger contract and its event-logging implementation.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use once_cell::unsync::Lazy;
use sea_orm::{DbBackend, Values};
use tracing::Span;

use crate::config::{LoggerConfig, QuerySupplier};
use crate::event::EventLogger;
use crate::level::LogMode;
use crate::parser::ParsedSql;

/// Message of query errors.
pub const ERROR_MESSAGE: &str = "a sql error occurred";
/// Message of slow queries.
pub const SLOW_MESSAGE: &str = "sql query time exceeds threshold";
/// Message of sql dumps.
pub const DUMP_MESSAGE: &str = "dump sql";

/// Ambient information about the query being logged, handed to customize
/// functions.
#[derive(Debug, Clone)]
pub struct QueryContext<'a> {
    span: Span,
    backend: Option<DbBackend>,
    database_name: Option<&'a str>,
    statement: Option<&'a str>,
}

impl QueryContext<'static> {
    /// Context bound to the current tracing span and nothing else.
    pub fn current() -> Self {
        Self {
            span: Span::current(),
            backend: None,
            database_name: None,
            statement: None,
        }
    }
}

impl<'a> QueryContext<'a> {
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_backend(mut self, backend: DbBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_database_name(mut self, name: &'a str) -> Self {
        self.database_name = Some(name);
        self
    }

    pub fn with_statement(mut self, sql: &'a str) -> Self {
        self.statement = Some(sql);
        self
    }

    /// The span that was current when the query ran.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn backend(&self) -> Option<DbBackend> {
        self.backend
    }

    pub fn database_name(&self) -> Option<&'a str> {
        self.database_name
    }

    /// Sql text as sent to the database, placeholders included.
    pub fn statement(&self) -> Option<&'a str> {
        self.statement
    }

    /// Operation and table of the statement, if there is one.
    pub fn parsed(&self) -> Option<ParsedSql> {
        self.statement.map(ParsedSql::parse)
    }
}

/// What an ORM needs from a logger.
///
/// `trace` is called once for every finished query; the other message
/// methods are for the ORM's own notices.
pub trait QueryLogger: Send + Sync {
    /// A logger for another verbosity. `self` is left as it is.
    fn log_mode(&self, mode: LogMode) -> Arc<dyn QueryLogger>;

    fn info(&self, ctx: &QueryContext<'_>, args: fmt::Arguments<'_>);

    fn warn(&self, ctx: &QueryContext<'_>, args: fmt::Arguments<'_>);

    fn error(&self, ctx: &QueryContext<'_>, args: fmt::Arguments<'_>);

    /// Report a finished query. `query` yields the sql text and affected
    /// rows (`-1` when unknown) and is called at most once.
    fn trace(
        &self,
        ctx: &QueryContext<'_>,
        begin: Instant,
        query: Box<dyn FnOnce() -> (String, i64) + '_>,
        err: Option<&(dyn Error + 'static)>,
    );

    /// Decide whether parameter values may show up in logged sql.
    fn params_filter<'s>(
        &self,
        _ctx: &QueryContext<'_>,
        sql: &'s str,
        params: Option<Values>,
    ) -> (&'s str, Option<Values>) {
        (sql, params)
    }
}

/// [`QueryLogger`] writing through an [`EventLogger`].
///
/// The default value logs nothing: its handle has no sink. Switching mode
/// returns a new logger with a new handle threshold and the same config.
///
/// # Example
///
/// ```rust
/// use sea_orm_query_logger::{EventLogger, Logger, LoggerConfig, LogMode};
/// use std::time::Duration;
///
/// let logger = Logger::new(
///     EventLogger::tracing(),
///     LoggerConfig::default().with_slow_threshold(Duration::from_millis(250)),
/// );
/// let verbose = logger.mode(LogMode::INFO);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Logger {
    pub logger: EventLogger,
    pub config: LoggerConfig,
}

impl Logger {
    pub fn new(logger: EventLogger, config: LoggerConfig) -> Self {
        Self { logger, config }
    }

    /// A logger forwarding to `tracing` with the default configuration.
    pub fn tracing() -> Self {
        Self::new(EventLogger::tracing(), LoggerConfig::default())
    }

    /// Same logger at another verbosity.
    pub fn mode(&self, mode: LogMode) -> Self {
        Self {
            logger: self.logger.level((self.config.level_map)(mode)),
            config: self.config.clone(),
        }
    }
}

impl QueryLogger for Logger {
    fn log_mode(&self, mode: LogMode) -> Arc<dyn QueryLogger> {
        Arc::new(self.mode(mode))
    }

    fn info(&self, ctx: &QueryContext<'_>, args: fmt::Arguments<'_>) {
        self.logger
            .info()
            .with(|ev| self.config.customize(ctx, ev))
            .msg(args);
    }

    fn warn(&self, ctx: &QueryContext<'_>, args: fmt::Arguments<'_>) {
        self.logger
            .warn()
            .with(|ev| self.config.customize(ctx, ev))
            .msg(args);
    }

    fn error(&self, ctx: &QueryContext<'_>, args: fmt::Arguments<'_>) {
        self.logger
            .error()
            .with(|ev| self.config.customize(ctx, ev))
            .msg(args);
    }

    fn trace(
        &self,
        ctx: &QueryContext<'_>,
        begin: Instant,
        query: Box<dyn FnOnce() -> (String, i64) + '_>,
        err: Option<&(dyn Error + 'static)>,
    ) {
        let elapsed = begin.elapsed();
        let query: QuerySupplier<'_> = Lazy::new(query);
        let config = &self.config;

        if let Some(err) = err {
            let event = config
                .error_level(err, &self.logger)
                .with(|ev| config.customize(ctx, ev))
                .with(|ev| config.log_err(err, &query, ev));
            let enabled = event.enabled();
            event.msg(ERROR_MESSAGE);

            if enabled {
                return;
            }
        }

        if config
            .effective_slow_threshold()
            .is_some_and(|threshold| elapsed >= threshold)
        {
            config
                .slow_level(&self.logger)
                .with(|ev| config.customize(ctx, ev))
                .with(|ev| config.log_slow(elapsed, &query, ev))
                .msg(SLOW_MESSAGE);
            return;
        }

        config
            .dump_level(&self.logger)
            .with(|ev| config.customize(ctx, ev))
            .with(|ev| config.log_dump(elapsed, &query, ev))
            .msg(DUMP_MESSAGE);
    }

    fn params_filter<'s>(
        &self,
        _ctx: &QueryContext<'_>,
        sql: &'s str,
        params: Option<Values>,
    ) -> (&'s str, Option<Values>) {
        if self.config.parameterized_queries {
            return (sql, None);
        }
        (sql, params)
    }
}

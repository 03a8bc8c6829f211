//! # sea-orm-query-logger
//!
//! Leveled, structured query logging for SeaORM.
//!
//! Every statement run through a [`LoggedConnection`] is reported once, as
//! exactly one of:
//!
//! - an error message, when the statement failed
//! - a slow query message, when it took longer than the configured threshold
//! - a sql dump, otherwise
//!
//! Which level each message uses, which fields it carries and whether it is
//! shown at all is decided by a [`LoggerConfig`]. Nothing about a message is
//! computed unless its level is enabled, so a quiet logger costs close to
//! nothing.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sea_orm::Database;
//! use sea_orm_query_logger::LoggedConnection;
//!
//! let db = Database::connect("postgres://localhost/mydb").await?;
//! let logged = LoggedConnection::from(db);
//!
//! // Errors and slow queries are logged through `tracing`
//! let users = Users::find().all(&logged).await?;
//!
//! // `debug()` switches to info mode, which also dumps every statement
//! let user = Users::find_by_id(1).one(&logged.debug()).await?;
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use sea_orm_query_logger::{helper, EventLogger, Logger, LoggerConfig, LogMode};
//!
//! let config = LoggerConfig::default()
//!     .with_slow_threshold(Duration::from_millis(200)) // off by default
//!     .with_error_level(helper::ignore_common_err)    // hide not-found / duplicate key
//!     .with_parameterized_queries(true)               // keep values out of logs
//!     .with_customize(helper::log_source(["src/repo/"]));
//!
//! let logger = Logger::new(EventLogger::tracing(), config).mode(LogMode::WARN);
//! let logged = LoggedConnection::new(db, logger);
//! ```
//!
//! ## Log Modes
//!
//! | Mode | Handle threshold | Visible by default |
//! |------|------------------|--------------------|
//! | `SILENT` | off | nothing |
//! | `ERROR` | ERROR | errors |
//! | `WARN` | WARN | errors, slow queries |
//! | `INFO` | DEBUG ([`level::default_level_map`]) or TRACE ([`level::with_time_tracking`]) | everything above, sql dumps |
//!
//! ## Fields
//!
//! | Field | Description |
//! |-------|-------------|
//! | `message` | `a sql error occurred`, `sql query time exceeds threshold` or `dump sql` |
//! | `error` | Error message (error messages only) |
//! | `sql` | Statement, parameters inlined unless parameterized queries are on |
//! | `duration` | Elapsed time (slow queries, and dumps when enabled) |
//! | `affected_rows` | Rows affected or returned, when known |
//!
//! The `sql`, `duration` and `affected_rows` keys can be renamed.

mod callsite;
mod config;
mod connection;
mod event;
pub mod helper;
pub mod level;
mod logger;
mod parser;
mod sink;

pub use config::{
    Customizer, ErrorLevelSelector, LevelSelector, LoggerConfig,
    DEFAULT_AFFECTED_ROWS_KEY, DEFAULT_DURATION_KEY, DEFAULT_SQL_KEY, ROWS_UNKNOWN,
};
pub use connection::{LoggedConnection, QueryLoggingExt};
pub use event::{Event, EventLogger, FieldValue, Record, DEFAULT_TARGET, ERROR_KEY};
pub use level::LogMode;
pub use logger::{Logger, QueryContext, QueryLogger, DUMP_MESSAGE, ERROR_MESSAGE, SLOW_MESSAGE};
pub use parser::{extract_table, parse_operation, ParsedSql, SqlOperation};
pub use sink::{CapturedEvent, EventSink, MemorySink, TracingSink};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        EventLogger, LogMode, LoggedConnection, Logger, LoggerConfig, QueryLogger,
        QueryLoggingExt,
    };
}

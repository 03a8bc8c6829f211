//! Logged database connection wrapper.

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr,
    ExecResult, IsolationLevel, QueryResult, Statement, StreamTrait, TransactionError,
    TransactionTrait,
};

use crate::config::ROWS_UNKNOWN;
use crate::level::LogMode;
use crate::logger::{Logger, QueryContext, QueryLogger};

/// A logged wrapper around SeaORM's `DatabaseConnection`.
///
/// This wrapper implements `ConnectionTrait`, `StreamTrait`, and `TransactionTrait`,
/// making it a drop-in replacement for `DatabaseConnection`. Every statement it
/// runs is reported to its [`QueryLogger`] once it finishes.
///
/// Statements executed inside a transaction go through SeaORM's
/// `DatabaseTransaction` and are not reported.
///
/// # Example
///
/// ```rust,ignore
/// use sea_orm::Database;
/// use sea_orm_query_logger::{LoggedConnection, Logger, LoggerConfig, EventLogger};
///
/// let db = Database::connect("postgres://localhost/mydb").await?;
/// let logged = LoggedConnection::new(
///     db,
///     Logger::new(EventLogger::tracing(), LoggerConfig::development()),
/// );
///
/// // Errors and slow queries are logged; `debug()` adds sql dumps
/// let users = Users::find().all(&logged.debug()).await?;
/// ```
#[derive(Clone)]
pub struct LoggedConnection {
    inner: Arc<DatabaseConnection>,
    logger: Arc<dyn QueryLogger>,
    database_name: Option<Arc<str>>,
}

impl fmt::Debug for LoggedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggedConnection")
            .field("backend", &self.inner().get_database_backend())
            .field("database_name", &self.database_name)
            .finish_non_exhaustive()
    }
}

impl LoggedConnection {
    /// Create a new logged connection.
    pub fn new(connection: DatabaseConnection, logger: impl QueryLogger + 'static) -> Self {
        Self::with_shared_logger(connection, Arc::new(logger))
    }

    /// Create a new logged connection from an already shared logger.
    pub fn with_shared_logger(connection: DatabaseConnection, logger: Arc<dyn QueryLogger>) -> Self {
        Self {
            inner: Arc::new(connection),
            logger,
            database_name: None,
        }
    }

    /// Log through `tracing` with the default configuration.
    ///
    /// The handle starts with every level open, so the `tracing` subscriber's
    /// filter decides what shows up.
    pub fn wrap(connection: DatabaseConnection) -> Self {
        Self::new(connection, Logger::tracing())
    }

    /// Name the database in the context handed to customize functions.
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(Arc::from(name.into()));
        self
    }

    /// Get a reference to the underlying `DatabaseConnection`.
    pub fn inner(&self) -> &DatabaseConnection {
        &self.inner
    }

    /// Consume the wrapper and return the inner `DatabaseConnection`.
    ///
    /// Wrappers made with [`log_mode`](Self::log_mode), [`with_logger`](Self::with_logger)
    /// or `clone` share the connection; while any of them is alive the
    /// wrapper is handed back as the error.
    pub fn into_inner(self) -> Result<DatabaseConnection, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(connection) => Ok(connection),
            Err(inner) => Err(Self {
                inner,
                logger: self.logger,
                database_name: self.database_name,
            }),
        }
    }

    /// A connection sharing the same pool, reporting to another logger.
    pub fn with_logger(&self, logger: impl QueryLogger + 'static) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            logger: Arc::new(logger),
            database_name: self.database_name.clone(),
        }
    }

    /// A connection sharing the same pool, logging at another verbosity.
    pub fn log_mode(&self, mode: LogMode) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            logger: self.logger.log_mode(mode),
            database_name: self.database_name.clone(),
        }
    }

    /// Shortcut for `log_mode(LogMode::INFO)`, which shows sql dumps.
    pub fn debug(&self) -> Self {
        self.log_mode(LogMode::INFO)
    }

    fn context(&self) -> QueryContext<'_> {
        let ctx = QueryContext::current().with_backend(self.inner().get_database_backend());
        match &self.database_name {
            Some(name) => ctx.with_database_name(name),
            None => ctx,
        }
    }

    /// Report a finished statement.
    fn trace(&self, stmt: &Statement, begin: Instant, rows: i64, err: Option<&DbErr>) {
        let ctx = self.context().with_statement(&stmt.sql);
        let logger = &*self.logger;

        logger.trace(
            &ctx,
            begin,
            Box::new(|| (render(logger, &ctx, stmt), rows)),
            err.map(|e| e as &(dyn Error + 'static)),
        );
    }
}

/// Sql text for the log line, parameters inlined unless the logger keeps
/// them out.
fn render(logger: &dyn QueryLogger, ctx: &QueryContext<'_>, stmt: &Statement) -> String {
    match logger.params_filter(ctx, &stmt.sql, stmt.values.clone()) {
        (sql, Some(values)) => {
            Statement::from_sql_and_values(stmt.db_backend, sql, values.0).to_string()
        }
        (sql, None) => sql.to_owned(),
    }
}

fn rows_of<T>(result: &Result<T, DbErr>, count: impl FnOnce(&T) -> u64) -> i64 {
    match result {
        Ok(value) => i64::try_from(count(value)).unwrap_or(i64::MAX),
        Err(_) => ROWS_UNKNOWN,
    }
}

impl From<DatabaseConnection> for LoggedConnection {
    fn from(connection: DatabaseConnection) -> Self {
        Self::wrap(connection)
    }
}

impl AsRef<DatabaseConnection> for LoggedConnection {
    fn as_ref(&self) -> &DatabaseConnection {
        self.inner()
    }
}

#[async_trait]
impl ConnectionTrait for LoggedConnection {
    fn get_database_backend(&self) -> DbBackend {
        self.inner().get_database_backend()
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        let begin = Instant::now();
        let result = self.inner().execute(stmt.clone()).await;

        let rows = rows_of(&result, ExecResult::rows_affected);
        self.trace(&stmt, begin, rows, result.as_ref().err());

        result
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        let stmt = Statement::from_string(self.get_database_backend(), sql);
        let begin = Instant::now();
        let result = self.inner().execute_unprepared(sql).await;

        let rows = rows_of(&result, ExecResult::rows_affected);
        self.trace(&stmt, begin, rows, result.as_ref().err());

        result
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        let begin = Instant::now();
        let result = self.inner().query_one(stmt.clone()).await;

        let rows = rows_of(&result, |row| u64::from(row.is_some()));
        self.trace(&stmt, begin, rows, result.as_ref().err());

        result
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        let begin = Instant::now();
        let result = self.inner().query_all(stmt.clone()).await;

        let rows = rows_of(&result, |rows| rows.len() as u64);
        self.trace(&stmt, begin, rows, result.as_ref().err());

        result
    }

    fn support_returning(&self) -> bool {
        self.inner().support_returning()
    }

    fn is_mock_connection(&self) -> bool {
        self.inner().is_mock_connection()
    }
}

#[async_trait]
impl StreamTrait for LoggedConnection {
    type Stream<'a> = <DatabaseConnection as StreamTrait>::Stream<'a>;

    fn stream<'a>(
        &'a self,
        stmt: Statement,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Stream<'a>, DbErr>> + 'a + Send>> {
        Box::pin(async move {
            let begin = Instant::now();
            let result = self.inner().stream(stmt.clone()).await;

            // Rows are consumed later, so the count is never known here
            self.trace(&stmt, begin, ROWS_UNKNOWN, result.as_ref().err());

            result
        })
    }
}

#[async_trait]
impl TransactionTrait for LoggedConnection {
    async fn begin(&self) -> Result<DatabaseTransaction, DbErr> {
        let result = self.inner().begin().await;

        if let Err(e) = &result {
            self.logger
                .error(&self.context(), format_args!("failed to begin transaction: {e}"));
        }

        result
    }

    async fn begin_with_config(
        &self,
        isolation_level: Option<IsolationLevel>,
        access_mode: Option<AccessMode>,
    ) -> Result<DatabaseTransaction, DbErr> {
        let result = self
            .inner()
            .begin_with_config(isolation_level, access_mode)
            .await;

        if let Err(e) = &result {
            self.logger.error(
                &self.context(),
                format_args!(
                    "failed to begin transaction (isolation: {isolation_level:?}, access: {access_mode:?}): {e}"
                ),
            );
        }

        result
    }

    async fn transaction<F, T, E>(&self, callback: F) -> Result<T, TransactionError<E>>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::fmt::Display + std::fmt::Debug + Send,
    {
        let result = self.inner().transaction(callback).await;

        if let Err(e) = &result {
            self.report_transaction_error(e);
        }

        result
    }

    async fn transaction_with_config<F, T, E>(
        &self,
        callback: F,
        isolation_level: Option<IsolationLevel>,
        access_mode: Option<AccessMode>,
    ) -> Result<T, TransactionError<E>>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::fmt::Display + std::fmt::Debug + Send,
    {
        let result = self
            .inner()
            .transaction_with_config(callback, isolation_level, access_mode)
            .await;

        if let Err(e) = &result {
            self.report_transaction_error(e);
        }

        result
    }
}

impl LoggedConnection {
    fn report_transaction_error<E: fmt::Display>(&self, err: &TransactionError<E>) {
        let ctx = self.context();
        match err {
            TransactionError::Connection(e) => self
                .logger
                .error(&ctx, format_args!("transaction failed: {e}")),
            TransactionError::Transaction(e) => self
                .logger
                .warn(&ctx, format_args!("transaction rolled back: {e}")),
        }
    }
}

/// Extension trait for easy wrapping of database connections.
pub trait QueryLoggingExt {
    /// Wrap this connection, logging through `logger`.
    fn with_query_logger(self, logger: impl QueryLogger + 'static) -> LoggedConnection;

    /// Wrap this connection, logging through `tracing` with the defaults.
    fn with_default_query_logger(self) -> LoggedConnection;
}

impl QueryLoggingExt for DatabaseConnection {
    fn with_query_logger(self, logger: impl QueryLogger + 'static) -> LoggedConnection {
        LoggedConnection::new(self, logger)
    }

    fn with_default_query_logger(self) -> LoggedConnection {
        LoggedConnection::wrap(self)
    }
}

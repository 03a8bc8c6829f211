//! Basic example showing how to use sea-orm-query-logger.
//!
//! Run with: cargo run --example basic

use std::time::Duration;

use sea_orm::{ConnectionTrait, Database, DbBackend, Statement};
use sea_orm_query_logger::{helper, prelude::*};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sea_orm_query_logger=trace".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = Database::connect("sqlite::memory:").await?;

    let config = LoggerConfig::default()
        .with_slow_threshold(Duration::from_millis(200))
        .with_customize(helper::log_operation());
    let logged = db.with_query_logger(Logger::new(EventLogger::tracing(), config).mode(LogMode::WARN));

    // Nothing is printed: sql dumps are DEBUG, the logger is in warn mode
    logged
        .execute_unprepared("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE)")
        .await?;

    // `debug()` switches to info mode, so this statement is dumped
    logged
        .debug()
        .execute(Statement::from_sql_and_values(
            DbBackend::Sqlite,
            "INSERT INTO users (name) VALUES (?)",
            ["John Doe".into()],
        ))
        .await?;

    // Duplicate key: logged at ERROR by default
    if let Err(e) = logged
        .execute_unprepared("INSERT INTO users (name) VALUES ('John Doe')")
        .await
    {
        tracing::info!("Insert rejected as expected: {e}");
    }

    // Same error pushed down to DEBUG; in warn mode it is hidden entirely
    let quiet = logged.with_logger(
        Logger::new(
            EventLogger::tracing(),
            LoggerConfig::default().with_error_level(helper::debug_common_err),
        )
        .mode(LogMode::WARN),
    );
    match quiet
        .execute_unprepared("INSERT INTO users (name) VALUES ('John Doe')")
        .await
    {
        Ok(_) => tracing::info!("Duplicate insert unexpectedly succeeded"),
        Err(e) => tracing::info!("Insert rejected without an error log: {e}"),
    }

    Ok(())
}

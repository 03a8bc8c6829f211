//! Ready-made error level selectors and customize functions.

use std::error::Error;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use sea_orm::{DbErr, SqlErr};

use crate::config::Customizer;
use crate::event::{Event, EventLogger};
use crate::level::{use_debug, use_error, use_trace};
use crate::logger::QueryContext;

pub const SOURCE_FILE_KEY: &str = "source_file";
pub const SOURCE_LINE_KEY: &str = "source_line";
pub const OPERATION_KEY: &str = "db.operation";
pub const TABLE_KEY: &str = "db.sql.table";

/// Build an error level selector: errors matching `predicate` are logged
/// with `level`, everything else at ERROR.
pub fn log_error_at<L, P>(
    level: L,
    predicate: P,
) -> impl Fn(&(dyn Error + 'static), &EventLogger) -> Event + Send + Sync + Clone + 'static
where
    L: Fn(&EventLogger) -> Event + Send + Sync + Clone + 'static,
    P: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + Clone + 'static,
{
    move |err: &(dyn Error + 'static), logger: &EventLogger| {
        if predicate(err) {
            level(logger)
        } else {
            use_error(logger)
        }
    }
}

/// Whether `err`, or any error in its source chain, is a record-not-found
/// or duplicate-key error from SeaORM.
pub fn common_error(err: &(dyn Error + 'static)) -> bool {
    std::iter::successors(Some(err), |&err| err.source()).any(|err| {
        err.downcast_ref::<DbErr>().is_some_and(|db_err| {
            matches!(db_err, DbErr::RecordNotFound(_))
                || matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
        })
    })
}

/// Log record-not-found and duplicate-key errors at TRACE, which usually
/// hides them and lets the query show up as a slow query or sql dump instead.
pub fn ignore_common_err(err: &(dyn Error + 'static), logger: &EventLogger) -> Event {
    log_error_at(use_trace, common_error)(err, logger)
}

/// Log record-not-found and duplicate-key errors at DEBUG.
pub fn debug_common_err(err: &(dyn Error + 'static), logger: &EventLogger) -> Event {
    log_error_at(use_debug, common_error)(err, logger)
}

static OWN_SOURCES: Lazy<PathBuf> =
    Lazy::new(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("src"));

fn is_own_frame(path: &Path) -> bool {
    if path.is_absolute() {
        return path.starts_with(&*OWN_SOURCES);
    }
    std::env::current_dir().is_ok_and(|cwd| cwd.join(path).starts_with(&*OWN_SOURCES))
}

/// First caller frame, outside this crate, whose file contains one of
/// `keywords`.
///
/// Frames are resolved one at a time and the walk stops at the first match.
fn find_caller(keywords: &[String]) -> Option<(String, u32)> {
    let mut caller = None;

    backtrace::trace(|frame| {
        backtrace::resolve_frame(frame, |symbol| {
            if caller.is_some() {
                return;
            }
            let (Some(path), Some(line)) = (symbol.filename(), symbol.lineno()) else {
                return;
            };
            if is_own_frame(path) {
                return;
            }
            let file = path.to_string_lossy();
            if keywords.iter().any(|kw| file.contains(kw.as_str())) {
                caller = Some((file.into_owned(), line));
            }
        });
        caller.is_none()
    });

    caller
}

/// Customize function attaching the caller's file and line.
///
/// It walks the call stack and stops at the first file whose path contains
/// any of `keywords`, writing `source_file` and `source_line`. Nothing is
/// attached when no frame matches or the binary has no debug info.
///
/// ```rust
/// use sea_orm_query_logger::{helper, LoggerConfig};
///
/// let config = LoggerConfig::default().with_customize(helper::log_source(["src/repo/"]));
/// ```
pub fn log_source<I, S>(keywords: I) -> impl Fn(&QueryContext<'_>, &mut Event) + Send + Sync + 'static
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let keywords: Vec<String> = keywords.into_iter().map(Into::into).collect();
    move |_ctx: &QueryContext<'_>, event: &mut Event| {
        if let Some((file, line)) = find_caller(&keywords) {
            event
                .str(SOURCE_FILE_KEY, &file)
                .i64(SOURCE_LINE_KEY, i64::from(line));
        }
    }
}

/// Customize function attaching `db.operation` and, when it can be told,
/// `db.sql.table` of the statement being logged.
pub fn log_operation() -> impl Fn(&QueryContext<'_>, &mut Event) + Send + Sync + 'static {
    |ctx: &QueryContext<'_>, event: &mut Event| {
        let Some(parsed) = ctx.parsed() else {
            return;
        };
        event.str(OPERATION_KEY, parsed.operation.as_str());
        if let Some(table) = &parsed.table {
            event.str(TABLE_KEY, table);
        }
    }
}

/// Run several customize functions in order.
pub fn chain(customizers: impl IntoIterator<Item = Customizer>) -> Customizer {
    let customizers: Vec<Customizer> = customizers.into_iter().collect();
    std::sync::Arc::new(move |ctx: &QueryContext<'_>, event: &mut Event| {
        for customize in &customizers {
            customize(ctx, event);
        }
    })
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::Arc;

    use tracing::Level;

    use super::*;
    use crate::event::FieldValue;
    use crate::sink::MemorySink;

    #[derive(Debug)]
    struct RepoError(DbErr);

    impl fmt::Display for RepoError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "repository failure")
        }
    }

    impl Error for RepoError {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    fn logger() -> EventLogger {
        EventLogger::new(MemorySink::new())
    }

    #[test]
    fn test_common_error() {
        assert!(common_error(&DbErr::RecordNotFound("users".into())));
        assert!(common_error(&RepoError(DbErr::RecordNotFound("users".into()))));
        assert!(!common_error(&DbErr::Custom("boom".into())));
        assert!(!common_error(&RepoError(DbErr::Custom("boom".into()))));
        assert!(!common_error(&std::io::Error::other("io")));
    }

    #[test]
    fn test_log_error_at() {
        let select = log_error_at(crate::level::use_info, |err: &(dyn Error + 'static)| {
            err.to_string().contains("timeout")
        });
        let logger = logger();

        let timeout = std::io::Error::other("timeout");
        assert_eq!(select(&timeout, &logger).level(), Level::INFO);
        let other = std::io::Error::other("refused");
        assert_eq!(select(&other, &logger).level(), Level::ERROR);
    }

    #[test]
    fn test_common_err_selectors() {
        let logger = logger();
        let not_found = DbErr::RecordNotFound("users".into());
        let generic = DbErr::Custom("boom".into());

        assert_eq!(ignore_common_err(&not_found, &logger).level(), Level::TRACE);
        assert_eq!(ignore_common_err(&generic, &logger).level(), Level::ERROR);
        assert_eq!(debug_common_err(&not_found, &logger).level(), Level::DEBUG);
        assert_eq!(debug_common_err(&generic, &logger).level(), Level::ERROR);
    }

    #[test]
    fn test_log_source_without_match() {
        let customize = log_source(["no-such-file-anywhere.rs"]);
        let mut event = logger().debug();
        customize(&QueryContext::current(), &mut event);
        assert!(event.field(SOURCE_FILE_KEY).is_none());
        assert!(event.field(SOURCE_LINE_KEY).is_none());
    }

    #[test]
    fn test_log_source_skips_own_frames() {
        let customize = log_source(["helper.rs"]);
        let mut event = logger().debug();
        customize(&QueryContext::current(), &mut event);
        assert!(event.field(SOURCE_FILE_KEY).is_none());
    }

    #[test]
    fn test_log_operation() {
        let customize = log_operation();
        let mut event = logger().debug();
        customize(
            &QueryContext::current().with_statement("UPDATE users SET name = $1"),
            &mut event,
        );
        assert_eq!(
            event.field(OPERATION_KEY),
            Some(&FieldValue::Str("UPDATE".to_string()))
        );
        assert_eq!(
            event.field(TABLE_KEY),
            Some(&FieldValue::Str("users".to_string()))
        );

        let mut event = logger().debug();
        customize(&QueryContext::current(), &mut event);
        assert!(event.fields().is_empty());
    }

    #[test]
    fn test_chain() {
        let first: Customizer = Arc::new(|_: &QueryContext<'_>, ev: &mut Event| {
            ev.str("a", "1");
        });
        let second: Customizer = Arc::new(|_: &QueryContext<'_>, ev: &mut Event| {
            ev.str("a", "2").str("b", "3");
        });
        let customize = chain([first, second]);

        let mut event = logger().debug();
        customize(&QueryContext::current(), &mut event);
        assert_eq!(event.field("a"), Some(&FieldValue::Str("2".to_string())));
        assert_eq!(event.field("b"), Some(&FieldValue::Str("3".to_string())));
    }
}

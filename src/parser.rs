//! SQL parsing utilities for extracting operation type and table names.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// SQL operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlOperation {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Truncate,
    Begin,
    Commit,
    Rollback,
    Other,
}

impl SqlOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlOperation::Select => "SELECT",
            SqlOperation::Insert => "INSERT",
            SqlOperation::Update => "UPDATE",
            SqlOperation::Delete => "DELETE",
            SqlOperation::Create => "CREATE",
            SqlOperation::Drop => "DROP",
            SqlOperation::Alter => "ALTER",
            SqlOperation::Truncate => "TRUNCATE",
            SqlOperation::Begin => "BEGIN",
            SqlOperation::Commit => "COMMIT",
            SqlOperation::Rollback => "ROLLBACK",
            SqlOperation::Other => "QUERY",
        }
    }

    /// Whether the statement names a table we can pick out.
    fn touches_table(&self) -> bool {
        !matches!(
            self,
            SqlOperation::Begin | SqlOperation::Commit | SqlOperation::Rollback | SqlOperation::Other
        )
    }
}

impl fmt::Display for SqlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const LEADING_KEYWORDS: &[(&str, SqlOperation)] = &[
    ("SELECT", SqlOperation::Select),
    ("WITH", SqlOperation::Select),
    ("INSERT", SqlOperation::Insert),
    ("REPLACE", SqlOperation::Insert),
    ("UPDATE", SqlOperation::Update),
    ("DELETE", SqlOperation::Delete),
    ("CREATE", SqlOperation::Create),
    ("DROP", SqlOperation::Drop),
    ("ALTER", SqlOperation::Alter),
    ("TRUNCATE", SqlOperation::Truncate),
    ("BEGIN", SqlOperation::Begin),
    ("START", SqlOperation::Begin),
    ("COMMIT", SqlOperation::Commit),
    ("ROLLBACK", SqlOperation::Rollback),
];

// The leftmost table-introducing keyword wins, which is the primary table
// for every operation we care about.
static TABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:FROM|INTO|UPDATE|TRUNCATE(?:\s+TABLE)?|TABLE(?:\s+IF(?:\s+NOT)?\s+EXISTS)?)\s+[`"\[]?(\w+)[`"\]]?"#,
    )
    .unwrap()
});

/// Parse the SQL operation type from a query string.
pub fn parse_operation(sql: &str) -> SqlOperation {
    let keyword = sql
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();

    LEADING_KEYWORDS
        .iter()
        .find(|(kw, _)| keyword.eq_ignore_ascii_case(kw))
        .map_or(SqlOperation::Other, |(_, op)| *op)
}

/// Extract the primary table name from a SQL query, lowercased.
pub fn extract_table(sql: &str) -> Option<String> {
    if !parse_operation(sql).touches_table() {
        return None;
    }
    TABLE_REGEX
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Operation and table of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSql {
    pub operation: SqlOperation,
    pub table: Option<String>,
}

impl ParsedSql {
    pub fn parse(sql: &str) -> Self {
        Self {
            operation: parse_operation(sql),
            table: extract_table(sql),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operation() {
        assert_eq!(parse_operation("SELECT * FROM users"), SqlOperation::Select);
        assert_eq!(parse_operation("  select id from orders"), SqlOperation::Select);
        assert_eq!(
            parse_operation("WITH cte AS (SELECT 1) SELECT * FROM cte"),
            SqlOperation::Select
        );
        assert_eq!(
            parse_operation("INSERT INTO users (name) VALUES ('test')"),
            SqlOperation::Insert
        );
        assert_eq!(parse_operation("update users set a = 1"), SqlOperation::Update);
        assert_eq!(parse_operation("DELETE FROM users"), SqlOperation::Delete);
        assert_eq!(parse_operation("PRAGMA foreign_keys"), SqlOperation::Other);
        assert_eq!(parse_operation(""), SqlOperation::Other);
    }

    #[test]
    fn test_transaction_operations() {
        assert_eq!(parse_operation("BEGIN"), SqlOperation::Begin);
        assert_eq!(parse_operation("START TRANSACTION"), SqlOperation::Begin);
        assert_eq!(parse_operation("COMMIT"), SqlOperation::Commit);
        assert_eq!(parse_operation("ROLLBACK"), SqlOperation::Rollback);
        assert_eq!(extract_table("BEGIN"), None);
    }

    #[test]
    fn test_extract_table() {
        assert_eq!(
            extract_table(r#"SELECT * FROM "Users" WHERE id = 1"#),
            Some("users".to_string())
        );
        assert_eq!(
            extract_table("select u.* from users u join orders o on u.id = o.user_id"),
            Some("users".to_string())
        );
        assert_eq!(
            extract_table("INSERT INTO `grades` (student_id, score) VALUES (?, ?)"),
            Some("grades".to_string())
        );
        assert_eq!(
            extract_table("UPDATE students SET name = $1 WHERE id = $2"),
            Some("students".to_string())
        );
        assert_eq!(
            extract_table("DELETE FROM assignments WHERE id = $1"),
            Some("assignments".to_string())
        );
    }

    #[test]
    fn test_extract_table_ddl() {
        assert_eq!(
            extract_table("CREATE TABLE IF NOT EXISTS users (id INTEGER)"),
            Some("users".to_string())
        );
        assert_eq!(
            extract_table("DROP TABLE IF EXISTS old_users"),
            Some("old_users".to_string())
        );
        assert_eq!(
            extract_table("ALTER TABLE users ADD COLUMN age INTEGER"),
            Some("users".to_string())
        );
        assert_eq!(
            extract_table("TRUNCATE TABLE sessions"),
            Some("sessions".to_string())
        );
    }

    #[test]
    fn test_parsed_sql() {
        let parsed = ParsedSql::parse("SELECT * FROM users WHERE id = 1");
        assert_eq!(parsed.operation, SqlOperation::Select);
        assert_eq!(parsed.table.as_deref(), Some("users"));
        assert_eq!(parsed.operation.to_string(), "SELECT");
    }
}

use crate::schema::{DefinitionError, ValidationError};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database file not found: {0}")]
    NotFound(String),
    #[error("Invalid SQLite file: {0}")]
    InvalidFile(String),
    #[error("Collection '{0}' already exists")]
    CollectionExists(String),
    #[error("Collection '{collection}' references unknown collection '{target}'")]
    UnknownRelationTarget { collection: String, target: String },
    #[error("Collection '{collection}' is still referenced by '{referenced_by}'")]
    CollectionInUse {
        collection: String,
        referenced_by: String,
    },
    #[error("Email '{0}' is already in use")]
    DuplicateEmail(String),
    #[error("Invalid collection definition: {0}")]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// User-friendly SQL error formatting
pub fn format_sql_error(error: &rusqlite::Error) -> String {
    match error {
        rusqlite::Error::SqliteFailure(err, msg) => {
            let message = msg.as_deref().unwrap_or("SQLite error");
            match err.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    "Database is locked\n\nAnother process is using the database. Try again in a moment."
                        .to_string()
                }
                ErrorCode::ConstraintViolation if message.contains("FOREIGN KEY") => {
                    format!("Constraint violation: {message}\n\nHint: the referenced record does not exist")
                }
                ErrorCode::ConstraintViolation => format!("Constraint violation: {message}"),
                ErrorCode::ReadOnly => {
                    "Database is read-only\n\nCheck file permissions on the database path.".to_string()
                }
                _ if message.contains("no such table") => {
                    format!("{message}\n\nHint: run `dbdiagrams migrate up` first")
                }
                _ => format!("SQL error (code {}): {message}", err.extended_code),
            }
        }
        rusqlite::Error::QueryReturnedNoRows => "Query returned no rows".to_string(),
        _ => format!("SQL error: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn missing_table_hints_at_migrations() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("DELETE FROM diagrams", []).unwrap_err();
        let text = format_sql_error(&err);
        assert!(text.contains("no such table"), "{text}");
        assert!(text.contains("migrate up"), "{text}");
    }

    #[test]
    fn foreign_key_failures_get_a_hint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE p (id TEXT PRIMARY KEY);
             CREATE TABLE c (p TEXT NOT NULL REFERENCES p(id));",
        )
        .unwrap();
        let err = conn
            .execute("INSERT INTO c (p) VALUES ('missing')", [])
            .unwrap_err();
        assert!(format_sql_error(&err).contains("referenced record does not exist"));
    }
}

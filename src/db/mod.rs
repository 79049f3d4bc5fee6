mod error;
pub mod query;
mod schema;
pub mod users;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;

pub use error::{format_sql_error, StoreError};
pub use schema::{
    delete_collection, ensure_system_tables, find_collection, list_collections, save_collection,
    table_exists,
};

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database file, creating it when `create` is set
    pub fn open<P: AsRef<Path>>(path: P, create: bool) -> Result<Self, StoreError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        if !create && !path.as_ref().exists() {
            return Err(StoreError::NotFound(path_str));
        }

        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE;
        if create {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }

        let conn = Connection::open_with_flags(path.as_ref(), flags)?;
        Self::configure(conn).map_err(|e| match e {
            // rusqlite only notices a non-database file on first use
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::NotADatabase =>
            {
                StoreError::InvalidFile(path_str.clone())
            }
            other => other,
        })
    }

    /// Private in-memory database
    #[cfg(test)]
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self, StoreError> {
        // Owner cascades depend on this
        conn.execute_batch("PRAGMA foreign_keys = ON")?;

        conn.busy_timeout(Duration::from_secs(5))?;

        ensure_system_tables(&conn)?;
        tracing::debug!("database configured");
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

/// Fixed-width RFC 3339 so that text order is time order
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Current time truncated to what the store keeps
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    let text = format_timestamp(&now);
    DateTime::parse_from_rfc3339(&text)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or(now)
}

use crate::db::{self, StoreError};
use crate::migrations::Migration;
use crate::schema::{diagrams_collection, DIAGRAMS};
use rusqlite::Connection;

pub(super) const MIGRATION: Migration = Migration {
    id: 1766188042,
    name: "create_diagrams",
    apply,
    rollback,
};

/// Create the diagrams collection. Fails if it already exists.
pub fn apply(conn: &Connection) -> Result<(), StoreError> {
    db::save_collection(conn, &diagrams_collection())
}

/// Delete the diagrams collection and every diagram in it.
/// A collection that was never created is not an error.
pub fn rollback(conn: &Connection) -> Result<(), StoreError> {
    match db::find_collection(conn, DIAGRAMS)? {
        Some(def) => db::delete_collection(conn, &def),
        None => {
            tracing::info!(collection = DIAGRAMS, "collection not found, nothing to delete");
            Ok(())
        }
    }
}

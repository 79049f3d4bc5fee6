use crate::db::{self, StoreError};
use crate::migrations::Migration;
use crate::schema::{users_collection, USERS};
use rusqlite::Connection;

pub(super) const MIGRATION: Migration = Migration {
    id: 1766188000,
    name: "init_users",
    apply,
    rollback,
};

pub fn apply(conn: &Connection) -> Result<(), StoreError> {
    db::save_collection(conn, &users_collection())
}

pub fn rollback(conn: &Connection) -> Result<(), StoreError> {
    match db::find_collection(conn, USERS)? {
        Some(def) => db::delete_collection(conn, &def),
        None => Ok(()),
    }
}

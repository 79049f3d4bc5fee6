//! Ordered, reversible schema migrations.
//!
//! Each migration runs inside its own transaction and is recorded in the
//! `_migrations` table once it commits.

mod create_diagrams;
mod init_users;

use crate::db::{format_timestamp, now, parse_timestamp, StoreError};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::HashMap;
use thiserror::Error;

pub type MigrationFn = fn(&Connection) -> Result<(), StoreError>;

/// One reversible schema change
#[derive(Clone, Copy)]
pub struct Migration {
    /// Sort key; a creation timestamp in seconds
    pub id: u64,
    pub name: &'static str,
    pub apply: MigrationFn,
    pub rollback: MigrationFn,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Every migration this crate ships, oldest first
pub const MIGRATIONS: &[Migration] = &[init_users::MIGRATION, create_diagrams::MIGRATION];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to apply migration {id}_{name}: {source}")]
    Apply {
        id: u64,
        name: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("Failed to roll back migration {id}_{name}: {source}")]
    Rollback {
        id: u64,
        name: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("Applied migration {0} is unknown to this build")]
    Unknown(u64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for MigrationError {
    fn from(e: rusqlite::Error) -> Self {
        MigrationError::Store(StoreError::Sqlite(e))
    }
}

/// A migration and when it was applied, if ever
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub id: u64,
    pub name: &'static str,
    pub applied: Option<DateTime<Utc>>,
}

/// Runs a fixed list of migrations against one connection
pub struct Migrator<'m> {
    migrations: &'m [Migration],
}

impl Default for Migrator<'static> {
    fn default() -> Self {
        Self::new(MIGRATIONS)
    }
}

impl<'m> Migrator<'m> {
    pub fn new(migrations: &'m [Migration]) -> Self {
        Self { migrations }
    }

    /// Applied migration ids mapped to their timestamps
    fn applied(&self, conn: &Connection) -> Result<HashMap<u64, DateTime<Utc>>, MigrationError> {
        let mut stmt = conn.prepare("SELECT id, applied FROM _migrations")?;
        let applied = stmt
            .query_map([], |row| {
                let id: u64 = row.get(0)?;
                let applied: String = row.get(1)?;
                Ok((id, parse_timestamp(1, &applied)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(applied)
    }

    pub fn status(&self, conn: &Connection) -> Result<Vec<MigrationStatus>, MigrationError> {
        let applied = self.applied(conn)?;
        Ok(self
            .migrations
            .iter()
            .map(|m| MigrationStatus {
                id: m.id,
                name: m.name,
                applied: applied.get(&m.id).copied(),
            })
            .collect())
    }

    /// Apply every pending migration in order, stopping at the first failure.
    /// Returns the migrations applied by this call.
    pub fn up(&self, conn: &mut Connection) -> Result<Vec<Migration>, MigrationError> {
        let applied = self.applied(conn)?;
        let mut pending: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| !applied.contains_key(&m.id))
            .collect();
        pending.sort_by_key(|m| m.id);

        let mut done = Vec::with_capacity(pending.len());
        for migration in pending {
            tracing::info!(id = migration.id, name = migration.name, "applying migration");
            let tx = conn.transaction()?;
            (migration.apply)(&tx).map_err(|source| MigrationError::Apply {
                id: migration.id,
                name: migration.name,
                source,
            })?;
            tx.execute(
                "INSERT INTO _migrations (id, name, applied) VALUES (?, ?, ?)",
                (migration.id, migration.name, format_timestamp(&now())),
            )?;
            tx.commit()?;
            done.push(*migration);
        }

        if done.is_empty() {
            tracing::info!("no pending migrations");
        }
        Ok(done)
    }

    /// Roll back the last `steps` applied migrations, newest first.
    /// Returns the migrations rolled back by this call.
    pub fn down(&self, conn: &mut Connection, steps: usize) -> Result<Vec<Migration>, MigrationError> {
        let mut applied: Vec<u64> = self.applied(conn)?.into_keys().collect();
        applied.sort_unstable_by(|a, b| b.cmp(a));

        let mut done = Vec::new();
        for id in applied.into_iter().take(steps) {
            let migration = self
                .migrations
                .iter()
                .find(|m| m.id == id)
                .ok_or(MigrationError::Unknown(id))?;

            tracing::info!(id = migration.id, name = migration.name, "rolling back migration");
            let tx = conn.transaction()?;
            (migration.rollback)(&tx).map_err(|source| MigrationError::Rollback {
                id: migration.id,
                name: migration.name,
                source,
            })?;
            tx.execute("DELETE FROM _migrations WHERE id = ?", [migration.id])?;
            tx.commit()?;
            done.push(*migration);
        }
        Ok(done)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, Database};

    fn ids(migrations: &[Migration]) -> Vec<u64> {
        migrations.iter().map(|m| m.id).collect()
    }

    #[test]
    fn shipped_migrations_are_sorted_and_unique() {
        let mut sorted = ids(MIGRATIONS);
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, ids(MIGRATIONS));
    }

    #[test]
    fn up_applies_pending_once() {
        let mut db = Database::in_memory().unwrap();
        let migrator = Migrator::default();

        let first = migrator.up(db.connection_mut()).unwrap();
        assert_eq!(ids(&first), [1766188000, 1766188042]);
        assert!(migrator.up(db.connection_mut()).unwrap().is_empty());

        let status = migrator.status(db.connection()).unwrap();
        assert!(status.iter().all(|s| s.applied.is_some()));
        assert!(db::table_exists(db.connection(), "diagrams").unwrap());
    }

    #[test]
    fn down_reverses_in_reverse_order() {
        let mut db = Database::in_memory().unwrap();
        let migrator = Migrator::default();
        migrator.up(db.connection_mut()).unwrap();

        let undone = migrator.down(db.connection_mut(), 1).unwrap();
        assert_eq!(ids(&undone), [1766188042]);
        assert!(!db::table_exists(db.connection(), "diagrams").unwrap());
        assert!(db::table_exists(db.connection(), "users").unwrap());

        let undone = migrator.down(db.connection_mut(), 5).unwrap();
        assert_eq!(ids(&undone), [1766188000]);
        assert!(db::list_collections(db.connection()).unwrap().is_empty());
        assert!(migrator
            .status(db.connection())
            .unwrap()
            .iter()
            .all(|s| s.applied.is_none()));
    }

    fn broken(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch("CREATE TABLE half_done (id TEXT); SELECT * FROM missing_table;")?;
        Ok(())
    }

    fn noop(_: &Connection) -> Result<(), StoreError> {
        Ok(())
    }

    #[test]
    fn failed_migration_is_rolled_back_and_stops_the_run() {
        let list = [
            Migration {
                id: 1,
                name: "broken",
                apply: broken,
                rollback: noop,
            },
            Migration {
                id: 2,
                name: "after",
                apply: noop,
                rollback: noop,
            },
        ];
        let mut db = Database::in_memory().unwrap();
        let migrator = Migrator::new(&list);

        let err = migrator.up(db.connection_mut()).unwrap_err();
        assert!(matches!(err, MigrationError::Apply { id: 1, .. }));
        assert!(!db::table_exists(db.connection(), "half_done").unwrap());
        assert!(migrator
            .status(db.connection())
            .unwrap()
            .iter()
            .all(|s| s.applied.is_none()));
    }

    #[test]
    fn unknown_applied_migration_blocks_rollback() {
        let mut db = Database::in_memory().unwrap();
        db.connection()
            .execute(
                "INSERT INTO _migrations (id, name, applied) VALUES (9999999999, 'future', ?)",
                [format_timestamp(&now())],
            )
            .unwrap();
        let err = Migrator::default().down(db.connection_mut(), 1).unwrap_err();
        assert!(matches!(err, MigrationError::Unknown(9999999999)));
    }

    #[test]
    fn ids_order_numerically_not_lexically() {
        let list = [
            Migration {
                id: 10,
                name: "second",
                apply: noop,
                rollback: noop,
            },
            Migration {
                id: 9,
                name: "first",
                apply: noop,
                rollback: noop,
            },
        ];
        let mut db = Database::in_memory().unwrap();
        let migrator = Migrator::new(&list);

        assert_eq!(ids(&migrator.up(db.connection_mut()).unwrap()), [9, 10]);
        assert_eq!(ids(&migrator.down(db.connection_mut(), 1).unwrap()), [10]);
        assert_eq!(ids(&migrator.down(db.connection_mut(), 1).unwrap()), [9]);
    }
}

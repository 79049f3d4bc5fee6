use crate::db::{format_timestamp, now, parse_timestamp, StoreError};
use crate::schema::{quote_ident, CollectionDef};
use crate::types::CollectionInfo;
use rusqlite::{Connection, OptionalExtension};

const SYSTEM_TABLES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS _collections (
    name       TEXT PRIMARY KEY NOT NULL,
    definition TEXT NOT NULL,
    created    TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS _migrations (
    id      INTEGER PRIMARY KEY NOT NULL,
    name    TEXT NOT NULL,
    applied TEXT NOT NULL
);
"#;

/// Create the collection registry and migration log if missing
pub fn ensure_system_tables(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SYSTEM_TABLES_SQL)?;
    Ok(())
}

pub fn table_exists(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Look up a registered collection by name
pub fn find_collection(conn: &Connection, name: &str) -> Result<Option<CollectionDef>, StoreError> {
    let definition: Option<String> = conn
        .query_row(
            "SELECT definition FROM _collections WHERE name = ?",
            [name],
            |row| row.get(0),
        )
        .optional()?;

    definition
        .map(|text| serde_json::from_str(&text).map_err(StoreError::from))
        .transpose()
}

/// Every registered collection with its record count
pub fn list_collections(conn: &Connection) -> Result<Vec<CollectionInfo>, StoreError> {
    let mut stmt = conn.prepare("SELECT name, created FROM _collections ORDER BY name")?;

    let mut collections = stmt
        .query_map([], |row| {
            let created: String = row.get(1)?;
            Ok(CollectionInfo {
                name: row.get(0)?,
                created: parse_timestamp(1, &created)?,
                record_count: None,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for collection in &mut collections {
        if let Ok(count) = get_record_count(conn, &collection.name) {
            collection.record_count = Some(count);
        }
    }

    Ok(collections)
}

fn get_record_count(conn: &Connection, name: &str) -> Result<u64, StoreError> {
    let query = format!("SELECT COUNT(*) FROM {}", quote_ident(name));
    let count: i64 = conn.query_row(&query, [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Register a collection and create its table.
///
/// Fails when the name is taken, the definition is malformed, or a
/// relation points at a collection that is not registered.
pub fn save_collection(conn: &Connection, def: &CollectionDef) -> Result<(), StoreError> {
    def.check()?;

    if find_collection(conn, &def.name)?.is_some() || table_exists(conn, &def.name)? {
        return Err(StoreError::CollectionExists(def.name.clone()));
    }

    for target in def.relation_targets() {
        if target != def.name && find_collection(conn, target)?.is_none() {
            return Err(StoreError::UnknownRelationTarget {
                collection: def.name.clone(),
                target: target.to_string(),
            });
        }
    }

    let ddl = def.create_table_sql();
    tracing::debug!(collection = %def.name, sql = %ddl, "creating collection table");
    conn.execute_batch(&ddl)?;

    conn.execute(
        "INSERT INTO _collections (name, definition, created) VALUES (?, ?, ?)",
        (
            &def.name,
            serde_json::to_string(def)?,
            format_timestamp(&now()),
        ),
    )?;

    tracing::info!(collection = %def.name, fields = def.fields.len(), "collection saved");
    Ok(())
}

/// Drop a collection's table and forget it. Records are lost.
pub fn delete_collection(conn: &Connection, def: &CollectionDef) -> Result<(), StoreError> {
    let others = {
        let mut stmt =
            conn.prepare("SELECT name, definition FROM _collections WHERE name <> ?")?;
        let rows = stmt
            .query_map([&def.name], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    for (name, definition) in others {
        let other: CollectionDef = serde_json::from_str(&definition)?;
        if other.relation_targets().any(|t| t == def.name) {
            return Err(StoreError::CollectionInUse {
                collection: def.name.clone(),
                referenced_by: name,
            });
        }
    }

    conn.execute_batch(&def.drop_table_sql())?;
    conn.execute("DELETE FROM _collections WHERE name = ?", [&def.name])?;

    tracing::info!(collection = %def.name, "collection deleted");
    Ok(())
}

use crate::db::{format_timestamp, parse_timestamp, StoreError};
use crate::policy::ListFilter;
use crate::schema::quote_ident;
use crate::types::{Diagram, DiagramId, UserId};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value as JsonValue;

const DIAGRAM_COLUMNS: &str =
    "id, name, description, dbml, canvasState, owner, created, updated";

fn row_to_diagram(row: &Row<'_>) -> rusqlite::Result<Diagram> {
    let created: String = row.get(6)?;
    let updated: String = row.get(7)?;
    Ok(Diagram {
        id: DiagramId::from(row.get::<_, String>(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        dbml: row.get(3)?,
        canvas_state: row.get::<_, Option<JsonValue>>(4)?,
        owner: UserId::from(row.get::<_, String>(5)?),
        created: parse_timestamp(6, &created)?,
        updated: parse_timestamp(7, &updated)?,
    })
}

/// WHERE clause and its bound values for a list filter
fn filter_clause(filter: &ListFilter) -> (String, Vec<SqlValue>) {
    match filter {
        ListFilter::All => (String::new(), Vec::new()),
        ListFilter::FieldEquals { field, value } => (
            format!(" WHERE {} = ?", quote_ident(field)),
            vec![SqlValue::Text(value.clone())],
        ),
        ListFilter::Nothing => (" WHERE 0".to_string(), Vec::new()),
    }
}

pub fn insert_diagram(conn: &Connection, diagram: &Diagram) -> Result<(), StoreError> {
    let query = format!("INSERT INTO diagrams ({DIAGRAM_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)");
    conn.execute(
        &query,
        (
            diagram.id.as_str(),
            &diagram.name,
            &diagram.description,
            &diagram.dbml,
            &diagram.canvas_state,
            diagram.owner.as_str(),
            format_timestamp(&diagram.created),
            format_timestamp(&diagram.updated),
        ),
    )?;
    Ok(())
}

pub fn get_diagram(conn: &Connection, id: &DiagramId) -> Result<Option<Diagram>, StoreError> {
    let query = format!("SELECT {DIAGRAM_COLUMNS} FROM diagrams WHERE id = ?");
    Ok(conn
        .query_row(&query, [id.as_str()], row_to_diagram)
        .optional()?)
}

/// Most recently updated first
pub fn list_diagrams(
    conn: &Connection,
    filter: &ListFilter,
    limit: usize,
    offset: usize,
) -> Result<Vec<Diagram>, StoreError> {
    let (clause, mut values) = filter_clause(filter);
    let query = format!(
        "SELECT {DIAGRAM_COLUMNS} FROM diagrams{clause} ORDER BY updated DESC, rowid DESC LIMIT ? OFFSET ?"
    );
    values.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    values.push(SqlValue::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));

    let mut stmt = conn.prepare(&query)?;
    let diagrams = stmt
        .query_map(params_from_iter(values), row_to_diagram)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(diagrams)
}

pub fn count_diagrams(conn: &Connection, filter: &ListFilter) -> Result<usize, StoreError> {
    let (clause, values) = filter_clause(filter);
    let query = format!("SELECT COUNT(*) FROM diagrams{clause}");
    let count: i64 = conn.query_row(&query, params_from_iter(values), |row| row.get(0))?;
    Ok(count as usize)
}

/// Overwrite every mutable column of an existing diagram
pub fn update_diagram(conn: &Connection, diagram: &Diagram) -> Result<bool, StoreError> {
    let updated = conn.execute(
        "UPDATE diagrams SET name = ?, description = ?, dbml = ?, canvasState = ?, updated = ? WHERE id = ?",
        (
            &diagram.name,
            &diagram.description,
            &diagram.dbml,
            &diagram.canvas_state,
            format_timestamp(&diagram.updated),
            diagram.id.as_str(),
        ),
    )?;
    Ok(updated > 0)
}

pub fn delete_diagram(conn: &Connection, id: &DiagramId) -> Result<bool, StoreError> {
    let deleted = conn.execute("DELETE FROM diagrams WHERE id = ?", [id.as_str()])?;
    Ok(deleted > 0)
}

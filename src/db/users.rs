use crate::db::{format_timestamp, now, parse_timestamp, StoreError};
use crate::schema::{users_collection, RecordFields};
use crate::types::{User, UserId};
use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::Value as JsonValue;

const USER_COLUMNS: &str = "id, email, name, created, updated";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let created: String = row.get(3)?;
    let updated: String = row.get(4)?;
    Ok(User {
        id: UserId::from(row.get::<_, String>(0)?),
        email: row.get(1)?,
        name: row.get(2)?,
        created: parse_timestamp(3, &created)?,
        updated: parse_timestamp(4, &updated)?,
    })
}

/// Insert a user after validating it against the users collection
pub fn create_user(conn: &Connection, email: &str, name: &str) -> Result<User, StoreError> {
    let mut fields = RecordFields::new();
    fields.insert("email".into(), JsonValue::String(email.to_string()));
    fields.insert("name".into(), JsonValue::String(name.to_string()));
    users_collection().validate(&fields)?;

    let taken: Option<String> = conn
        .query_row("SELECT id FROM users WHERE email = ?", [email], |row| row.get(0))
        .optional()?;
    if taken.is_some() {
        return Err(StoreError::DuplicateEmail(email.to_string()));
    }

    let ts = now();
    let user = User {
        id: UserId::generate(),
        email: email.to_string(),
        name: name.to_string(),
        created: ts,
        updated: ts,
    };
    conn.execute(
        "INSERT INTO users (id, email, name, created, updated) VALUES (?, ?, ?, ?, ?)",
        (
            user.id.as_str(),
            &user.email,
            &user.name,
            format_timestamp(&user.created),
            format_timestamp(&user.updated),
        ),
    )?;

    tracing::info!(user = %user.id, "user created");
    Ok(user)
}

pub fn find_user(conn: &Connection, id: &UserId) -> Result<Option<User>, StoreError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    Ok(conn
        .query_row(&query, [id.as_str()], row_to_user)
        .optional()?)
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>, StoreError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created, id");
    let mut stmt = conn.prepare(&query)?;
    let users = stmt
        .query_map([], row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Delete a user; their diagrams go with them through the owner cascade.
/// Returns `false` when no such user exists.
pub fn delete_user(conn: &Connection, id: &UserId) -> Result<bool, StoreError> {
    let deleted = conn.execute("DELETE FROM users WHERE id = ?", [id.as_str()])?;
    if deleted > 0 {
        tracing::info!(user = %id, "user deleted");
    }
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::testing::migrated;

    #[test]
    fn created_user_can_be_found() {
        let db = migrated();
        let conn = db.connection();
        let user = create_user(conn, "ada@example.com", "Ada").unwrap();

        assert_eq!(find_user(conn, &user.id).unwrap(), Some(user.clone()));
        assert_eq!(list_users(conn).unwrap(), vec![user]);
    }

    #[test]
    fn email_must_be_valid_and_unique() {
        let db = migrated();
        let conn = db.connection();
        assert!(matches!(
            create_user(conn, "not-an-email", ""),
            Err(StoreError::Validation(_))
        ));
        create_user(conn, "ada@example.com", "").unwrap();
        assert!(matches!(
            create_user(conn, "ada@example.com", "Other"),
            Err(StoreError::DuplicateEmail(_))
        ));
    }

    #[test]
    fn deleting_unknown_user_reports_false() {
        let db = migrated();
        assert!(!delete_user(db.connection(), &UserId::from("nobody")).unwrap());
    }
}

use crate::policy::{AccessRules, Rule};
use crate::schema::{CollectionDef, FieldDef, USERS};

pub const DIAGRAMS: &str = "diagrams";

pub const NAME_MAX_CHARS: usize = 255;
pub const DESCRIPTION_MAX_CHARS: usize = 1_000;
pub const DBML_MAX_CHARS: usize = 1_000_000;
pub const CANVAS_STATE_MAX_BYTES: usize = 1_000_000;

/// The diagrams collection: DBML source plus saved canvas, owned by one user.
///
/// Only the owner may list, view, update or delete a diagram; any
/// authenticated user may create one.
pub fn diagrams_collection() -> CollectionDef {
    CollectionDef {
        name: DIAGRAMS.to_string(),
        fields: vec![
            FieldDef::text("name", true, NAME_MAX_CHARS),
            FieldDef::text("description", false, DESCRIPTION_MAX_CHARS),
            FieldDef::text("dbml", true, DBML_MAX_CHARS),
            FieldDef::json("canvasState", CANVAS_STATE_MAX_BYTES),
            FieldDef::relation("owner", USERS, true, true),
        ],
        rules: AccessRules {
            list: Rule::owner_is("owner"),
            view: Rule::owner_is("owner"),
            create: Rule::Authenticated,
            update: Rule::owner_is("owner"),
            delete: Rule::owner_is("owner"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordFields;
    use serde_json::json;

    fn record(name: &str, dbml: String) -> RecordFields {
        let mut record = RecordFields::new();
        record.insert("name".into(), json!(name));
        record.insert("dbml".into(), json!(dbml));
        record.insert("owner".into(), json!("u1"));
        record
    }

    #[test]
    fn construction_is_deterministic() {
        assert_eq!(diagrams_collection(), diagrams_collection());
        let def = diagrams_collection();
        let names: Vec<&str> = def.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["name", "description", "dbml", "canvasState", "owner"]);
    }

    #[test]
    fn dbml_limit_boundary() {
        let def = diagrams_collection();
        assert!(def.validate(&record("d", "x".repeat(DBML_MAX_CHARS))).is_ok());
        let err = def
            .validate(&record("d", "x".repeat(DBML_MAX_CHARS + 1)))
            .unwrap_err();
        assert_eq!(err.fields().collect::<Vec<_>>(), ["dbml"]);
    }

    #[test]
    fn name_limit_boundary() {
        let def = diagrams_collection();
        let ok = "n".repeat(NAME_MAX_CHARS);
        assert!(def.validate(&record(&ok, "Table t {}".into())).is_ok());
        let long = "n".repeat(NAME_MAX_CHARS + 1);
        assert!(def.validate(&record(&long, "Table t {}".into())).is_err());
    }

    #[test]
    fn empty_name_or_dbml_is_rejected() {
        let def = diagrams_collection();
        assert!(def.validate(&record("", "Table t {}".into())).is_err());
        assert!(def.validate(&record("d", String::new())).is_err());
    }

    #[test]
    fn oversized_canvas_state_is_rejected() {
        let def = diagrams_collection();
        let mut rec = record("d", "Table t {}".into());
        rec.insert(
            "canvasState".into(),
            json!({ "blob": "x".repeat(CANVAS_STATE_MAX_BYTES) }),
        );
        let err = def.validate(&rec).unwrap_err();
        assert_eq!(err.fields().collect::<Vec<_>>(), ["canvasState"]);
    }
}

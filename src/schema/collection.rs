use crate::policy::{AccessRules, Operation, Rule};
use crate::schema::field::{quote_ident, FieldDef, FieldError, FieldKind};
use crate::schema::RecordFields;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Columns every record table carries besides its declared fields
pub const SYSTEM_FIELDS: [&str; 3] = ["id", "created", "updated"];

/// Declarative definition of a collection: ordered fields plus access rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub rules: AccessRules,
}

/// A collection definition that cannot be materialised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("collection name must not be empty")]
    EmptyName,
    #[error("invalid identifier '{0}'")]
    InvalidName(String),
    #[error("duplicate field '{0}'")]
    DuplicateField(String),
    #[error("field name '{0}' is reserved")]
    ReservedField(String),
    #[error("field '{0}' has a zero size limit")]
    ZeroLimit(String),
    #[error("relation field '{field}' must select exactly one record (got {max_select})")]
    UnsupportedMaxSelect { field: String, max_select: usize },
    #[error("{operation} rule refers to unknown field '{field}'")]
    UnknownRuleField { operation: Operation, field: String },
}

/// Every field that failed validation, in field order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", join_errors(.0))]
pub struct ValidationError(pub Vec<FieldError>);

impl ValidationError {
    #[cfg(test)]
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.field.as_str())
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl CollectionDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the collections this one references
    pub fn relation_targets(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(|f| match &f.kind {
            FieldKind::Relation { collection, .. } => Some(collection.as_str()),
            _ => None,
        })
    }

    /// Reject malformed definitions before anything is written
    pub fn check(&self) -> Result<(), DefinitionError> {
        if self.name.is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        if !is_identifier(&self.name) {
            return Err(DefinitionError::InvalidName(self.name.clone()));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !is_identifier(&field.name) {
                return Err(DefinitionError::InvalidName(field.name.clone()));
            }
            if SYSTEM_FIELDS.contains(&field.name.as_str()) {
                return Err(DefinitionError::ReservedField(field.name.clone()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(DefinitionError::DuplicateField(field.name.clone()));
            }
            match &field.kind {
                FieldKind::Text { max_chars: 0, .. } | FieldKind::Json { max_bytes: 0 } => {
                    return Err(DefinitionError::ZeroLimit(field.name.clone()));
                }
                FieldKind::Relation {
                    collection,
                    max_select,
                    ..
                } => {
                    if !is_identifier(collection) {
                        return Err(DefinitionError::InvalidName(collection.clone()));
                    }
                    if *max_select != 1 {
                        return Err(DefinitionError::UnsupportedMaxSelect {
                            field: field.name.clone(),
                            max_select: *max_select,
                        });
                    }
                }
                _ => {}
            }
        }

        for operation in [
            Operation::List,
            Operation::View,
            Operation::Create,
            Operation::Update,
            Operation::Delete,
        ] {
            if let Rule::OwnerIs { field } = self.rules.rule(operation) {
                if field != "id" && self.field(field).is_none() {
                    return Err(DefinitionError::UnknownRuleField {
                        operation,
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validate a record's field values, collecting every violation
    pub fn validate(&self, record: &RecordFields) -> Result<(), ValidationError> {
        let errors: Vec<FieldError> = self
            .fields
            .iter()
            .filter_map(|f| f.check_value(record.get(&f.name)).err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError(errors))
        }
    }

    /// DDL creating the backing table and its indexes
    pub fn create_table_sql(&self) -> String {
        let mut columns = vec!["\"id\" TEXT PRIMARY KEY NOT NULL".to_string()];
        columns.extend(self.fields.iter().map(FieldDef::column_sql));
        columns.push("\"created\" TEXT NOT NULL".to_string());
        columns.push("\"updated\" TEXT NOT NULL".to_string());

        let table = quote_ident(&self.name);
        let mut sql = format!("CREATE TABLE {table} (\n    {}\n);\n", columns.join(",\n    "));

        for field in &self.fields {
            let unique = match field.kind {
                FieldKind::Email { .. } => "UNIQUE ",
                FieldKind::Relation { .. } => "",
                _ => continue,
            };
            let index = quote_ident(&format!("idx_{}_{}", self.name, field.name));
            sql.push_str(&format!(
                "CREATE {unique}INDEX {index} ON {table} ({});\n",
                quote_ident(&field.name)
            ));
        }
        sql.push_str(&format!(
            "CREATE INDEX {} ON {table} (\"updated\");\n",
            quote_ident(&format!("idx_{}_updated", self.name))
        ));
        sql
    }

    pub fn drop_table_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {};", quote_ident(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::diagrams_collection;
    use crate::schema::field::Violation;

    #[test]
    fn builtin_definitions_are_well_formed() {
        assert_eq!(diagrams_collection().check(), Ok(()));
        assert_eq!(crate::schema::users_collection().check(), Ok(()));
    }

    #[test]
    fn rejects_duplicate_and_reserved_fields() {
        let mut def = diagrams_collection();
        def.fields.push(FieldDef::text("name", false, 10));
        assert_eq!(
            def.check(),
            Err(DefinitionError::DuplicateField("name".into()))
        );

        let mut def = diagrams_collection();
        def.fields.push(FieldDef::text("created", false, 10));
        assert_eq!(
            def.check(),
            Err(DefinitionError::ReservedField("created".into()))
        );
    }

    #[test]
    fn rejects_zero_limits_and_multi_relations() {
        let mut def = diagrams_collection();
        def.fields.push(FieldDef::json("extra", 0));
        assert_eq!(def.check(), Err(DefinitionError::ZeroLimit("extra".into())));

        let mut def = diagrams_collection();
        if let FieldKind::Relation { max_select, .. } = &mut def.fields[4].kind {
            *max_select = 3;
        }
        assert!(matches!(
            def.check(),
            Err(DefinitionError::UnsupportedMaxSelect { max_select: 3, .. })
        ));
    }

    #[test]
    fn rejects_rules_on_unknown_fields() {
        let mut def = diagrams_collection();
        def.rules.update = crate::policy::Rule::owner_is("author");
        assert_eq!(
            def.check(),
            Err(DefinitionError::UnknownRuleField {
                operation: Operation::Update,
                field: "author".into(),
            })
        );
    }

    #[test]
    fn rejects_bad_identifiers() {
        let mut def = diagrams_collection();
        def.name = String::new();
        assert_eq!(def.check(), Err(DefinitionError::EmptyName));
        def.name = "_hidden".into();
        assert!(matches!(def.check(), Err(DefinitionError::InvalidName(_))));
        def.name = "drop table".into();
        assert!(matches!(def.check(), Err(DefinitionError::InvalidName(_))));
    }

    #[test]
    fn validate_reports_every_failing_field() {
        let def = diagrams_collection();
        let err = def.validate(&RecordFields::new()).unwrap_err();
        let fields: Vec<&str> = err.fields().collect();
        assert_eq!(fields, ["name", "dbml", "owner"]);
        assert!(err.0.iter().all(|e| e.violation == Violation::Required));
        assert!(err.to_string().starts_with("validation failed: name: cannot be blank"));
    }

    #[test]
    fn ddl_has_cascading_owner_and_indexes() {
        let sql = diagrams_collection().create_table_sql();
        assert!(sql.starts_with("CREATE TABLE \"diagrams\" ("));
        assert!(sql.contains("\"canvasState\" TEXT DEFAULT NULL"));
        assert!(sql.contains("REFERENCES \"users\"(\"id\") ON DELETE CASCADE"));
        assert!(sql.contains("CREATE INDEX \"idx_diagrams_owner\" ON \"diagrams\" (\"owner\");"));
        assert!(sql.contains("CREATE INDEX \"idx_diagrams_updated\""));
    }

    #[test]
    fn definition_round_trips_through_json() {
        let def = diagrams_collection();
        let text = serde_json::to_string(&def).unwrap();
        let back: CollectionDef = serde_json::from_str(&text).unwrap();
        assert_eq!(back, def);
    }
}

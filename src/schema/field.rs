use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error;

/// Type and constraints of one collection field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FieldKind {
    /// Plain text, length counted in characters
    Text { required: bool, max_chars: usize },
    /// Unique, required-by-choice email address
    Email { required: bool },
    /// Arbitrary JSON document bounded by its serialized size
    Json { max_bytes: usize },
    /// Reference to a record of another collection
    Relation {
        collection: String,
        required: bool,
        max_select: usize,
        cascade_delete: bool,
    },
}

/// A named field of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

pub const EMAIL_MAX_CHARS: usize = 255;

impl FieldDef {
    pub fn text(name: &str, required: bool, max_chars: usize) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Text {
                required,
                max_chars,
            },
        }
    }

    pub fn email(name: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Email { required },
        }
    }

    pub fn json(name: &str, max_bytes: usize) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Json { max_bytes },
        }
    }

    pub fn relation(name: &str, collection: &str, required: bool, cascade_delete: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Relation {
                collection: collection.to_string(),
                required,
                max_select: 1,
                cascade_delete,
            },
        }
    }

    /// Check one value against this field's constraints.
    /// A missing value is treated like JSON `null`.
    pub fn check_value(&self, value: Option<&JsonValue>) -> Result<(), FieldError> {
        let value = value.unwrap_or(&JsonValue::Null);
        let fail = |violation| {
            Err(FieldError {
                field: self.name.clone(),
                violation,
            })
        };

        match &self.kind {
            FieldKind::Text {
                required,
                max_chars,
            } => {
                let text = match value {
                    JsonValue::Null => "",
                    JsonValue::String(s) => s.as_str(),
                    _ => return fail(Violation::WrongType { expected: "text" }),
                };
                if text.is_empty() {
                    return if *required {
                        fail(Violation::Required)
                    } else {
                        Ok(())
                    };
                }
                let chars = text.chars().count();
                if chars > *max_chars {
                    return fail(Violation::TooLong {
                        max: *max_chars,
                        actual: chars,
                    });
                }
                Ok(())
            }
            FieldKind::Email { required } => {
                let email = match value {
                    JsonValue::Null => "",
                    JsonValue::String(s) => s.as_str(),
                    _ => return fail(Violation::WrongType { expected: "email" }),
                };
                if email.is_empty() {
                    return if *required {
                        fail(Violation::Required)
                    } else {
                        Ok(())
                    };
                }
                let chars = email.chars().count();
                if chars > EMAIL_MAX_CHARS {
                    return fail(Violation::TooLong {
                        max: EMAIL_MAX_CHARS,
                        actual: chars,
                    });
                }
                if !looks_like_email(email) {
                    return fail(Violation::InvalidEmail);
                }
                Ok(())
            }
            FieldKind::Json { max_bytes } => {
                if value.is_null() {
                    return Ok(());
                }
                // serializing a Value cannot fail: keys are always strings
                let size = serde_json::to_vec(value).map(|v| v.len()).unwrap_or(usize::MAX);
                if size > *max_bytes {
                    return fail(Violation::TooLarge {
                        max_bytes: *max_bytes,
                        actual: size,
                    });
                }
                Ok(())
            }
            FieldKind::Relation {
                required,
                max_select,
                ..
            } => {
                let ids: Vec<&str> = match value {
                    JsonValue::Null => Vec::new(),
                    JsonValue::String(s) if s.is_empty() => Vec::new(),
                    JsonValue::String(s) => vec![s.as_str()],
                    JsonValue::Array(items) => {
                        let mut ids = Vec::with_capacity(items.len());
                        for item in items {
                            match item.as_str() {
                                Some(id) if !id.is_empty() => ids.push(id),
                                _ => return fail(Violation::WrongType { expected: "record id" }),
                            }
                        }
                        ids
                    }
                    _ => return fail(Violation::WrongType { expected: "record id" }),
                };
                if ids.is_empty() {
                    return if *required {
                        fail(Violation::Required)
                    } else {
                        Ok(())
                    };
                }
                if ids.len() > *max_select {
                    return fail(Violation::TooManyRelations {
                        max: *max_select,
                        actual: ids.len(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Column definition used in `CREATE TABLE`
    pub(crate) fn column_sql(&self) -> String {
        let column = quote_ident(&self.name);
        match &self.kind {
            FieldKind::Text { .. } => format!("{column} TEXT NOT NULL DEFAULT ''"),
            FieldKind::Email { .. } => format!("{column} TEXT NOT NULL DEFAULT ''"),
            FieldKind::Json { .. } => format!("{column} TEXT DEFAULT NULL"),
            FieldKind::Relation {
                collection,
                required,
                cascade_delete,
                ..
            } => {
                let on_delete = if *cascade_delete {
                    "CASCADE"
                } else if *required {
                    "RESTRICT"
                } else {
                    "SET NULL"
                };
                let nullability = if *required { "NOT NULL" } else { "DEFAULT NULL" };
                format!(
                    "{column} TEXT {nullability} REFERENCES {}(\"id\") ON DELETE {on_delete}",
                    quote_ident(collection)
                )
            }
        }
    }
}

fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        None => false,
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Why a value was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Required,
    TooLong { max: usize, actual: usize },
    TooLarge { max_bytes: usize, actual: usize },
    WrongType { expected: &'static str },
    InvalidEmail,
    TooManyRelations { max: usize, actual: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Required => write!(f, "cannot be blank"),
            Violation::TooLong { max, actual } => {
                write!(f, "must be at most {max} characters (got {actual})")
            }
            Violation::TooLarge { max_bytes, actual } => {
                write!(f, "must be at most {max_bytes} bytes (got {actual})")
            }
            Violation::WrongType { expected } => write!(f, "must be a {expected}"),
            Violation::InvalidEmail => write!(f, "must be a valid email address"),
            Violation::TooManyRelations { max, actual } => {
                write!(f, "accepts at most {max} record(s) (got {actual})")
            }
        }
    }
}

/// A single field that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {violation}")]
pub struct FieldError {
    pub field: String,
    pub violation: Violation,
}

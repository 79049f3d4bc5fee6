//! Collection definitions held as data.
//!
//! A [`CollectionDef`] is an ordered list of [`FieldDef`]s plus the
//! [`AccessRules`](crate::policy::AccessRules) guarding it. The same value
//! drives table DDL, record validation, and what the registry stores.

mod collection;
mod diagrams;
mod field;
mod users;

pub use collection::{CollectionDef, DefinitionError, ValidationError, SYSTEM_FIELDS};
pub use diagrams::{
    diagrams_collection, CANVAS_STATE_MAX_BYTES, DBML_MAX_CHARS, DESCRIPTION_MAX_CHARS, DIAGRAMS,
    NAME_MAX_CHARS,
};
pub(crate) use field::quote_ident;
pub use field::{FieldDef, FieldError, FieldKind, Violation};
pub use users::{users_collection, USERS};

/// Field values of one record, keyed by field name
pub type RecordFields = serde_json::Map<String, serde_json::Value>;

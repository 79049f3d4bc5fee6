use crate::policy::{AccessRules, Rule};
use crate::schema::{CollectionDef, FieldDef};

pub const USERS: &str = "users";

/// Auth collection every owner relation points at
pub fn users_collection() -> CollectionDef {
    CollectionDef {
        name: USERS.to_string(),
        fields: vec![
            FieldDef::email("email", true),
            FieldDef::text("name", false, 255),
        ],
        rules: AccessRules {
            list: Rule::owner_is("id"),
            view: Rule::owner_is("id"),
            create: Rule::Public,
            update: Rule::owner_is("id"),
            delete: Rule::owner_is("id"),
        },
    }
}

use crate::schema::RecordFields;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request kinds a collection carries a rule for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    View,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::List => "list",
            Operation::View => "view",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A single access rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "kind")]
pub enum Rule {
    /// Anyone, including anonymous requests
    Public,
    /// Any request carrying a non-empty identity
    Authenticated,
    /// The requester's identity equals the record's `field` value
    OwnerIs { field: String },
    /// Superuser only. No requester passes it; superusers work on the store
    /// directly and never go through rules.
    Locked,
}

impl Rule {
    pub fn owner_is(field: &str) -> Self {
        Rule::OwnerIs {
            field: field.to_string(),
        }
    }

    /// The record filter a list request under this rule reduces to
    pub fn list_filter(&self, requester: &Requester) -> ListFilter {
        match (self, requester.identity()) {
            (Rule::Locked, _) => ListFilter::Nothing,
            (Rule::Public, _) => ListFilter::All,
            (Rule::Authenticated, Some(_)) => ListFilter::All,
            (Rule::OwnerIs { field }, Some(id)) => ListFilter::FieldEquals {
                field: field.clone(),
                value: id.to_string(),
            },
            (_, None) => ListFilter::Nothing,
        }
    }
}

/// Which records a list request may return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter {
    All,
    FieldEquals { field: String, value: String },
    Nothing,
}

/// Per-operation rules of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRules {
    pub list: Rule,
    pub view: Rule,
    pub create: Rule,
    pub update: Rule,
    pub delete: Rule,
}

impl AccessRules {
    pub fn rule(&self, operation: Operation) -> &Rule {
        match operation {
            Operation::List => &self.list,
            Operation::View => &self.view,
            Operation::Create => &self.create,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
        }
    }

    /// Decide whether `requester` may perform `operation` on `record`.
    ///
    /// For `Create` the record is the submitted one; for `List` the rule is
    /// evaluated per record and denied records are filtered out by callers.
    pub fn authorize(
        &self,
        operation: Operation,
        requester: &Requester,
        record: &RecordFields,
    ) -> Decision {
        let decision = authorize(requester, self.rule(operation), record);
        tracing::debug!(%operation, ?requester, ?decision, "access rule evaluated");
        decision
    }
}

/// Identity a request is made with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requester {
    Anonymous,
    User(UserId),
}

impl Requester {
    /// An empty id is the same as no identity at all
    pub fn user(id: impl Into<UserId>) -> Self {
        let id = id.into();
        if id.is_empty() {
            Requester::Anonymous
        } else {
            Requester::User(id)
        }
    }

    pub fn identity(&self) -> Option<&UserId> {
        match self {
            Requester::Anonymous => None,
            Requester::User(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// Evaluate one rule
pub fn authorize(requester: &Requester, rule: &Rule, record: &RecordFields) -> Decision {
    let allowed = match rule {
        Rule::Public => true,
        Rule::Authenticated => requester.identity().is_some(),
        Rule::OwnerIs { field } => match (requester.identity(), record.get(field)) {
            (Some(id), Some(value)) => value.as_str() == Some(id.as_str()),
            _ => false,
        },
        Rule::Locked => false,
    };
    if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

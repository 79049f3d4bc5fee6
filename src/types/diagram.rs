use crate::schema::RecordFields;
use crate::types::{DiagramId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A stored DBML diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagram {
    pub id: DiagramId,
    pub name: String,
    pub description: String,
    pub dbml: String,
    /// Viewport and node positions saved by the editor
    pub canvas_state: Option<JsonValue>,
    pub owner: UserId,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Diagram {
    /// Field values as the collection schema sees them
    pub fn fields(&self) -> RecordFields {
        let mut fields = RecordFields::new();
        fields.insert("name".into(), JsonValue::String(self.name.clone()));
        fields.insert(
            "description".into(),
            JsonValue::String(self.description.clone()),
        );
        fields.insert("dbml".into(), JsonValue::String(self.dbml.clone()));
        fields.insert(
            "canvasState".into(),
            self.canvas_state.clone().unwrap_or(JsonValue::Null),
        );
        fields.insert("owner".into(), JsonValue::String(self.owner.to_string()));
        fields
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, patch: DiagramPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(dbml) = patch.dbml {
            self.dbml = dbml;
        }
        if let Some(canvas_state) = patch.canvas_state {
            self.canvas_state = canvas_state.filter(|v| !v.is_null());
        }
    }
}

/// Input of a create request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDiagram {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub dbml: String,
    #[serde(default)]
    pub canvas_state: Option<JsonValue>,
    /// Defaults to the requester when omitted
    #[serde(default)]
    pub owner: Option<UserId>,
}

/// Input of an update request; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub dbml: Option<String>,
    /// `Some(None)` clears the saved canvas
    pub canvas_state: Option<Option<JsonValue>>,
}

impl DiagramPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.dbml.is_none()
            && self.canvas_state.is_none()
    }
}

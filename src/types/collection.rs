use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered collection as reported by `migrate status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub created: DateTime<Utc>,
    pub record_count: Option<u64>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A user's request for one compute resource. Immutable once created: the API
/// writes it once and nothing in this crate ever updates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub uid: Uuid,
    pub owner_name: String,
    pub label_uid: Uuid,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

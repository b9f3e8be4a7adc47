use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub port: u16,
}

/// Created when a driver returns success; deleted at final deallocation
/// (§4.8.2 step 5, even on `ERROR`, to free the IP for reuse).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationResource {
    pub uid: Uuid,
    pub application_uid: Uuid,
    pub label_uid: Uuid,
    pub node_uid: Uuid,
    pub definition_index: i32,
    pub identifier: String,
    #[serde(default)]
    pub hw_addr: String,
    #[serde(default)]
    pub ip_addr: String,
    #[serde(default)]
    pub authentication: Authentication,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    pub timeout: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::state::Status;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// User-submitted work to run against a resource at a specific lifecycle
/// phase (§4.8.3). A task with `result == {}` is considered not yet executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationTask {
    pub uid: Uuid,
    pub application_uid: Uuid,
    pub when: Status,
    pub task: String,
    #[serde(default = "empty_object")]
    pub options: Value,
    #[serde(default = "empty_object")]
    pub result: Value,
}

impl ApplicationTask {
    pub fn is_executed(&self) -> bool {
        !matches!(&self.result, Value::Object(m) if m.is_empty())
    }
}

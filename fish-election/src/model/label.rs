use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    #[serde(rename = "type")]
    pub disk_type: String,
    pub size: u64,
}

/// Resource ask for a single `LabelDefinition`. `NodeFilter` entries are glob
/// patterns matched against this node's self-reported identifiers (§4.4).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu: u32,
    pub ram: u32,
    #[serde(default)]
    pub disks: HashMap<String, Disk>,
    #[serde(default)]
    pub node_filter: Vec<String>,
    /// Duration string (e.g. "2h", "30m", "45s"). Empty means "use the
    /// node's configured default lifetime".
    #[serde(default)]
    pub lifetime: String,
    #[serde(default)]
    pub multitenancy: bool,
    #[serde(default)]
    pub cpu_overbook: bool,
    #[serde(default)]
    pub ram_overbook: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDefinition {
    pub driver: String,
    pub resources: Resources,
    #[serde(default = "empty_object")]
    pub options: Value,
}

/// Immutable template referenced by Applications. A `Definition` is chosen by
/// index at vote time; that index is carried by every downstream record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub uid: Uuid,
    pub name: String,
    pub version: u32,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    pub definitions: Vec<LabelDefinition>,
}

impl Label {
    pub fn definition(&self, index: i32) -> Option<&LabelDefinition> {
        if index < 0 {
            return None;
        }
        self.definitions.get(index as usize)
    }
}

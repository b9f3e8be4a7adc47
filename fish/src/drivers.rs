//! A single bundled driver for out-of-the-box operation. Concrete provider
//! drivers (VM, container, cloud) are out of scope (spec §1); `NullDriver`
//! is this deliverable's stand-in — it always "allocates" a synthetic
//! resource and never offers tasks — so the engine has something to load by
//! default and the lifecycle can be exercised end-to-end without a real
//! backend, the same role the teacher's `p2p::mock` network plays for
//! exercising `multisig` without a live libp2p swarm.

use async_trait::async_trait;
use serde_json::Value;

use fish_election::capacity::ResourceUsage;
use fish_election::driver::{Driver, DriverError, DriverResource, DriverTask};
use fish_election::model::{ApplicationResource, ApplicationTask, LabelDefinition};

pub struct NullDriver {
    name: String,
}

impl NullDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Driver for NullDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_remote(&self) -> bool {
        // Treated as remote so it never perturbs local node-capacity
        // accounting; it isn't backed by any real local resource.
        true
    }

    fn available_capacity(&self, _usage: &ResourceUsage, _def: &LabelDefinition) -> i64 {
        i64::MAX
    }

    async fn allocate(
        &self,
        _def: &LabelDefinition,
        _metadata: &Value,
    ) -> Result<DriverResource, DriverError> {
        Ok(DriverResource {
            identifier: format!("null-{}", uuid::Uuid::new_v4()),
            hw_addr: String::new(),
            ip_addr: String::new(),
            authentication: Default::default(),
        })
    }

    async fn deallocate(&self, _resource: &ApplicationResource) -> Result<(), DriverError> {
        Ok(())
    }

    fn get_task(&self, _name: &str, _options: &Value) -> Option<Box<dyn DriverTask>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allocate_yields_a_unique_identifier() {
        let driver = NullDriver::new("null");
        let def = LabelDefinition {
            driver: "null".to_string(),
            resources: Default::default(),
            options: Value::Object(Default::default()),
        };
        let a = driver.allocate(&def, &Value::Object(Default::default())).await.unwrap();
        let b = driver.allocate(&def, &Value::Object(Default::default())).await.unwrap();
        assert_ne!(a.identifier, b.identifier);
    }
}

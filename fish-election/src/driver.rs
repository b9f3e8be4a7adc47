use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::capacity::ResourceUsage;
use crate::model::{ApplicationResource, ApplicationTask, LabelDefinition};

/// Errors from `Allocate`/`Deallocate`/`Execute` are opaque to the engine
/// (§4.5); it classifies them only as success/failure, so a single `anyhow`
/// alias is enough here rather than a typed enum.
pub type DriverError = anyhow::Error;

/// What a successful `Driver::allocate` hands back (§3 ApplicationResource,
/// minus the fields the engine itself fills in).
#[derive(Debug, Clone, Default)]
pub struct DriverResource {
    pub identifier: String,
    pub hw_addr: String,
    pub ip_addr: String,
    pub authentication: crate::model::Authentication,
}

/// Abstract interface to a resource provider (§4.5), directly analogous to
/// the teacher's `CeremonyTrait`/`CryptoScheme` split: the engine is generic
/// over a pluggable backend the same way multisig is generic over a
/// pluggable crypto scheme. `#[cfg_attr(test, automock)]` mirrors the
/// teacher's own `EthersRpcApi`/`SolRpcApi` treatment of RPC-client traits:
/// `mockall` generates a `MockDriver` for tests that need to assert *how*
/// the engine calls a driver, not just script its return values the way
/// [`crate::testing::TestDriver`] does.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    /// Remote drivers (e.g. a cloud API) are not tracked in local node
    /// capacity accounting (§4.8.1 step 6).
    fn is_remote(&self) -> bool;

    /// Free slots this node can still offer for `def`, given `usage`. The
    /// engine only cares whether this is `>= 1`.
    fn available_capacity(&self, usage: &ResourceUsage, def: &LabelDefinition) -> i64;

    async fn allocate(
        &self,
        def: &LabelDefinition,
        metadata: &Value,
    ) -> Result<DriverResource, DriverError>;

    async fn deallocate(&self, resource: &ApplicationResource) -> Result<(), DriverError>;

    /// `None` means the driver does not know this task name.
    fn get_task(&self, name: &str, options: &Value) -> Option<Box<dyn DriverTask>>;
}

/// An auxiliary operation attached to an Application (§4.8.3). `set_info` is
/// synchronous bookkeeping; `execute` does the actual work and may suspend.
#[async_trait]
pub trait DriverTask: Send {
    fn set_info(
        &mut self,
        task: &ApplicationTask,
        def: &LabelDefinition,
        resource: &ApplicationResource,
    );

    async fn execute(&mut self) -> Result<Value, DriverError>;
}

/// Drivers are loaded by name at start-up (§6.3); a driver instance name is
/// either a bare name (`aws`) or `name/instance` (`aws/prod`) so that
/// multiple configured instances of one driver type can carry independent
/// configuration while sharing implementation code.
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, instance_name: impl Into<String>, driver: Arc<dyn Driver>) {
        self.drivers.insert(instance_name.into(), driver);
    }

    pub fn get(&self, instance_name: &str) -> Option<&Arc<dyn Driver>> {
        self.drivers.get(instance_name)
    }

    pub fn is_loaded(&self, instance_name: &str) -> bool {
        self.drivers.contains_key(instance_name)
    }
}

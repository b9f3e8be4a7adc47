//! Reference/test implementations of every port this crate defines:
//! [`InMemoryStateStore`] (C6), [`TestDriver`] (C5), and a deterministic
//! [`FixedRand`]. Exposed under `#[cfg(test)]` for this crate's own unit
//! tests and under the `test-util` feature for downstream crates'
//! integration tests — grounded on the teacher's `db::mock::KeyDBMock` and
//! `multisig::client::helpers` test doubles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::clock::Rand;
use crate::cluster::ClusterTransport;
use crate::driver::{Driver, DriverError, DriverResource, DriverTask};
use crate::model::{
    Application, ApplicationResource, ApplicationState, ApplicationTask, Label,
    NewApplicationState, Status,
};
use crate::store::{derive_uid, StateStore, StoreError};

/// Deterministic RNG for reproducible scenario tests: returns a
/// caller-seeded sequence instead of real randomness.
pub struct FixedRand(AtomicU32);

impl FixedRand {
    pub fn new(seed: u32) -> Self {
        Self(AtomicU32::new(seed))
    }
}

impl Rand for FixedRand {
    fn next_u32(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A `ClusterTransport` that drops every vote: useful for single-node
/// scenario tests (S1-S5) where there is no peer to gossip to.
#[derive(Default)]
pub struct NullCluster;

#[async_trait]
impl ClusterTransport for NullCluster {
    async fn send_vote(&self, _vote: &crate::model::Vote) {}
}

#[derive(Default)]
struct Collections {
    applications: HashMap<Uuid, Application>,
    labels: HashMap<Uuid, Label>,
    states: HashMap<Uuid, ApplicationState>,
    resources: HashMap<Uuid, ApplicationResource>,
    tasks: HashMap<Uuid, ApplicationTask>,
    active_nodes: Vec<Uuid>,
}

/// In-memory `StateStore` (C6 reference implementation), matching the KV
/// collections listed in §6.1. Guarded by `parking_lot::RwLock` since every
/// operation here is a plain map read/write, never held across an `.await`.
pub struct InMemoryStateStore {
    node_uid: Uuid,
    node_name: String,
    data: RwLock<Collections>,
}

impl InMemoryStateStore {
    pub fn new(node_uid: Uuid, node_name: impl Into<String>) -> Self {
        Self {
            node_uid,
            node_name: node_name.into(),
            data: RwLock::new(Collections::default()),
        }
    }

    pub fn put_application(&self, application: Application) {
        self.data.write().applications.insert(application.uid, application);
    }

    pub fn put_label(&self, label: Label) {
        self.data.write().labels.insert(label.uid, label);
    }

    pub fn register_active_node(&self, node_uid: Uuid) {
        let mut data = self.data.write();
        if !data.active_nodes.contains(&node_uid) {
            data.active_nodes.push(node_uid);
        }
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    fn node_uid(&self) -> Uuid {
        self.node_uid
    }

    fn node_name(&self) -> String {
        self.node_name.clone()
    }

    async fn application_get(&self, uid: Uuid) -> Result<Option<Application>, StoreError> {
        Ok(self.data.read().applications.get(&uid).cloned())
    }

    async fn label_get(&self, uid: Uuid) -> Result<Option<Label>, StoreError> {
        Ok(self.data.read().labels.get(&uid).cloned())
    }

    async fn application_state_create(
        &self,
        draft: NewApplicationState,
    ) -> Result<ApplicationState, StoreError> {
        let state = ApplicationState {
            uid: derive_uid(self.node_uid),
            application_uid: draft.application_uid,
            status: draft.status,
            description: draft.description,
            created_at: chrono::Utc::now(),
        };
        self.data.write().states.insert(state.uid, state.clone());
        Ok(state)
    }

    async fn application_state_import(&self, state: ApplicationState) -> Result<(), StoreError> {
        self.data.write().states.insert(state.uid, state);
        Ok(())
    }

    async fn application_state_get_by_application(
        &self,
        application_uid: Uuid,
    ) -> Result<Option<ApplicationState>, StoreError> {
        Ok(self
            .data
            .read()
            .states
            .values()
            .filter(|s| s.application_uid == application_uid)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn application_state_new_count(
        &self,
        application_uid: Uuid,
    ) -> Result<usize, StoreError> {
        Ok(self
            .data
            .read()
            .states
            .values()
            .filter(|s| s.application_uid == application_uid && s.status == Status::New)
            .count())
    }

    async fn application_resource_create(
        &self,
        resource: ApplicationResource,
    ) -> Result<(), StoreError> {
        self.data
            .write()
            .resources
            .insert(resource.application_uid, resource);
        Ok(())
    }

    async fn application_resource_get_by_application(
        &self,
        application_uid: Uuid,
    ) -> Result<Option<ApplicationResource>, StoreError> {
        Ok(self.data.read().resources.get(&application_uid).cloned())
    }

    async fn application_resource_get_by_ip(
        &self,
        ip_addr: &str,
    ) -> Result<Option<ApplicationResource>, StoreError> {
        Ok(self
            .data
            .read()
            .resources
            .values()
            .find(|r| r.ip_addr == ip_addr)
            .cloned())
    }

    async fn application_resource_save(
        &self,
        resource: ApplicationResource,
    ) -> Result<(), StoreError> {
        self.data
            .write()
            .resources
            .insert(resource.application_uid, resource);
        Ok(())
    }

    async fn application_resource_delete(
        &self,
        application_uid: Uuid,
    ) -> Result<(), StoreError> {
        self.data.write().resources.remove(&application_uid);
        Ok(())
    }

    async fn application_task_list_by_application_and_when(
        &self,
        application_uid: Uuid,
        when: Status,
    ) -> Result<Vec<ApplicationTask>, StoreError> {
        Ok(self
            .data
            .read()
            .tasks
            .values()
            .filter(|t| t.application_uid == application_uid && t.when == when)
            .cloned()
            .collect())
    }

    async fn application_task_save(&self, task: ApplicationTask) -> Result<(), StoreError> {
        self.data.write().tasks.insert(task.uid, task);
        Ok(())
    }

    async fn node_active_list(&self) -> Result<Vec<Uuid>, StoreError> {
        Ok(self.data.read().active_nodes.clone())
    }
}

type AllocateFn = dyn Fn(&crate::model::LabelDefinition, &Value) -> Result<DriverResource, String> + Send + Sync;
type DeallocateFn = dyn Fn(&ApplicationResource) -> Result<(), String> + Send + Sync;

/// A scriptable `Driver` for scenario tests (§8 S1-S5): callers install
/// closures for `allocate`/`deallocate` outcomes instead of talking to a
/// real provider, the way the teacher's `multisig` tests supply a
/// deterministic `CryptoScheme`.
pub struct TestDriver {
    name: String,
    remote: bool,
    capacity: AtomicU32,
    allocate_fn: Box<AllocateFn>,
    deallocate_fn: Box<DeallocateFn>,
}

impl TestDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: false,
            capacity: AtomicU32::new(1),
            allocate_fn: Box::new(|_, _| {
                Ok(DriverResource {
                    identifier: "test-resource".to_string(),
                    ..Default::default()
                })
            }),
            deallocate_fn: Box::new(|_| Ok(())),
        }
    }

    pub fn remote(mut self, remote: bool) -> Self {
        self.remote = remote;
        self
    }

    pub fn with_capacity(self, capacity: u32) -> Self {
        self.capacity.store(capacity, Ordering::Relaxed);
        self
    }

    pub fn with_allocate<F>(mut self, f: F) -> Self
    where
        F: Fn(&crate::model::LabelDefinition, &Value) -> Result<DriverResource, String>
            + Send
            + Sync
            + 'static,
    {
        self.allocate_fn = Box::new(f);
        self
    }

    pub fn with_deallocate<F>(mut self, f: F) -> Self
    where
        F: Fn(&ApplicationResource) -> Result<(), String> + Send + Sync + 'static,
    {
        self.deallocate_fn = Box::new(f);
        self
    }
}

#[async_trait]
impl Driver for TestDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_remote(&self) -> bool {
        self.remote
    }

    fn available_capacity(
        &self,
        _usage: &crate::capacity::ResourceUsage,
        _def: &crate::model::LabelDefinition,
    ) -> i64 {
        self.capacity.load(Ordering::Relaxed) as i64
    }

    async fn allocate(
        &self,
        def: &crate::model::LabelDefinition,
        metadata: &Value,
    ) -> Result<DriverResource, DriverError> {
        (self.allocate_fn)(def, metadata).map_err(|e| anyhow::anyhow!(e))
    }

    async fn deallocate(&self, resource: &ApplicationResource) -> Result<(), DriverError> {
        (self.deallocate_fn)(resource).map_err(|e| anyhow::anyhow!(e))
    }

    fn get_task(&self, _name: &str, _options: &Value) -> Option<Box<dyn DriverTask>> {
        None
    }
}

/// A `Fn`-backed task, for tests that need `GetTask`/`Execute` coverage
/// without a real driver.
pub struct TestTask<F>(pub F)
where
    F: FnMut() -> Result<Value, String> + Send;

#[async_trait]
impl<F> DriverTask for TestTask<F>
where
    F: FnMut() -> Result<Value, String> + Send,
{
    fn set_info(
        &mut self,
        _task: &ApplicationTask,
        _def: &crate::model::LabelDefinition,
        _resource: &ApplicationResource,
    ) {
    }

    async fn execute(&mut self) -> Result<Value, DriverError> {
        (self.0)().map_err(|e| anyhow::anyhow!(e))
    }
}

pub fn driver_registry(drivers: Vec<(&str, Arc<dyn Driver>)>) -> crate::driver::DriverRegistry {
    let mut registry = crate::driver::DriverRegistry::new();
    for (name, driver) in drivers {
        registry.register(name, driver);
    }
    registry
}

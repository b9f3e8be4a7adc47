use std::sync::atomic::{AtomicBool, Ordering};

use globset::Glob;
use parking_lot::RwLock;

use crate::driver::{Driver, DriverRegistry};
use crate::model::{LabelDefinition, Resources};

/// Summed CPU/RAM usage on this node. Disk is reserved for future use (§4.4),
/// same as the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    pub cpu: u64,
    pub ram: u64,
}

impl ResourceUsage {
    fn add(&mut self, r: &Resources) {
        self.cpu += r.cpu as u64;
        self.ram += r.ram as u64;
    }

    fn subtract(&mut self, r: &Resources) {
        self.cpu = self.cpu.saturating_sub(r.cpu as u64);
        self.ram = self.ram.saturating_sub(r.ram as u64);
    }
}

/// Tracks node usage, the maintenance flag, and self-reported node
/// identifiers under one lock (§4.4, §5 shared-resources table: `nodeUsage`
/// guarded by `nodeUsageMutex`, maintenance flag atomic).
pub struct NodeCapacity {
    usage: RwLock<ResourceUsage>,
    maintenance: AtomicBool,
    identifiers: Vec<String>,
}

impl NodeCapacity {
    pub fn new(identifiers: Vec<String>) -> Self {
        Self {
            usage: RwLock::new(ResourceUsage::default()),
            maintenance: AtomicBool::new(false),
            identifiers,
        }
    }

    pub fn add(&self, r: &Resources) {
        self.usage.write().add(r);
    }

    pub fn subtract(&self, r: &Resources) {
        self.usage.write().subtract(r);
    }

    pub fn usage(&self) -> ResourceUsage {
        *self.usage.read()
    }

    pub fn is_maintenance(&self) -> bool {
        self.maintenance.load(Ordering::Acquire)
    }

    pub fn set_maintenance(&self, maintenance: bool) {
        self.maintenance.store(maintenance, Ordering::Release);
    }

    fn node_filter_matches(&self, patterns: &[String]) -> bool {
        if patterns.is_empty() {
            return true;
        }
        patterns.iter().all(|pattern| match Glob::new(pattern) {
            Ok(glob) => {
                let matcher = glob.compile_matcher();
                self.identifiers.iter().any(|id| matcher.is_match(id))
            }
            Err(_) => false,
        })
    }

    /// A definition is eligible on this node iff (§4.4 a-d): maintenance is
    /// off, its driver is loaded, every `NodeFilter` glob matches at least
    /// one node identifier, and the driver reports available capacity >= 1.
    /// The driver call happens without holding `usage`'s write lock — only a
    /// snapshot read — so drivers that block never stall other workers
    /// (§5: "MUST NOT hold the global Node Capacity lock across driver
    /// calls").
    pub fn definition_eligible(&self, def: &LabelDefinition, driver: &dyn Driver) -> bool {
        if self.is_maintenance() {
            return false;
        }
        if !self.node_filter_matches(&def.resources.node_filter) {
            return false;
        }
        driver.available_capacity(&self.usage(), def) >= 1
    }

    /// Smallest eligible index in `defs`, or -1 (§4.4).
    pub fn is_node_available_for_definitions(
        &self,
        defs: &[LabelDefinition],
        drivers: &DriverRegistry,
    ) -> i32 {
        for (index, def) in defs.iter().enumerate() {
            let Some(driver) = drivers.get(&def.driver) else {
                continue;
            };
            if self.definition_eligible(def, driver.as_ref()) {
                return index as i32;
            }
        }
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverError, DriverResource, DriverTask};
    use crate::model::{ApplicationResource, ApplicationTask};
    use async_trait::async_trait;
    use serde_json::Value;

    struct AlwaysOn;

    #[async_trait]
    impl Driver for AlwaysOn {
        fn name(&self) -> &str {
            "always-on"
        }
        fn is_remote(&self) -> bool {
            false
        }
        fn available_capacity(&self, _usage: &ResourceUsage, _def: &LabelDefinition) -> i64 {
            10
        }
        async fn allocate(
            &self,
            _def: &LabelDefinition,
            _metadata: &Value,
        ) -> Result<DriverResource, DriverError> {
            unimplemented!()
        }
        async fn deallocate(&self, _resource: &ApplicationResource) -> Result<(), DriverError> {
            unimplemented!()
        }
        fn get_task(&self, _name: &str, _options: &Value) -> Option<Box<dyn DriverTask>> {
            None
        }
    }

    fn def(driver: &str, filter: Vec<String>) -> LabelDefinition {
        LabelDefinition {
            driver: driver.to_string(),
            resources: Resources {
                node_filter: filter,
                ..Default::default()
            },
            options: Value::Object(Default::default()),
        }
    }

    #[test]
    fn node_filter_glob_matches() {
        let cap = NodeCapacity::new(vec!["worker-east-1".to_string()]);
        assert!(cap.node_filter_matches(&["worker-east-*".to_string()]));
        assert!(!cap.node_filter_matches(&["worker-west-*".to_string()]));
        assert!(cap.node_filter_matches(&[]));
    }

    #[test]
    fn maintenance_blocks_eligibility() {
        let cap = NodeCapacity::new(vec!["any".to_string()]);
        let driver = AlwaysOn;
        let d = def("always-on", vec![]);
        assert!(cap.definition_eligible(&d, &driver));
        cap.set_maintenance(true);
        assert!(!cap.definition_eligible(&d, &driver));
    }

    #[test]
    fn picks_smallest_eligible_index() {
        let cap = NodeCapacity::new(vec!["any".to_string()]);
        let mut registry = DriverRegistry::new();
        registry.register("always-on", std::sync::Arc::new(AlwaysOn));
        let defs = vec![
            def("missing-driver", vec![]),
            def("always-on", vec!["no-match-*".to_string()]),
            def("always-on", vec![]),
        ];
        assert_eq!(cap.is_node_available_for_definitions(&defs, &registry), 2);
    }

    /// §5: "the engine MUST NOT hold the global Node Capacity lock across
    /// driver calls". Uses `MockDriver` to assert `available_capacity` was
    /// actually invoked, while `definition_eligible` itself only ever takes
    /// a read-lock snapshot (`self.usage()`) before calling it — a
    /// deadlock (same-thread double write-lock) would hang this test rather
    /// than fail an assertion, so this also guards against a future change
    /// accidentally calling the driver while holding `usage`'s write lock.
    #[test]
    fn driver_is_called_without_holding_the_usage_lock() {
        let cap = NodeCapacity::new(vec![]);
        cap.add(&Resources {
            cpu: 1,
            ram: 1,
            ..Default::default()
        });

        let mut driver = crate::driver::MockDriver::new();
        driver
            .expect_available_capacity()
            .times(1)
            .returning(|_, _| 5);
        let d = def("mock", vec![]);

        assert!(cap.definition_eligible(&d, &driver));
        // Still able to take a fresh write lock afterwards: proves the read
        // lock taken for the driver call above was released, not held.
        cap.add(&Resources::default());
    }
}

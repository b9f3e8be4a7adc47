//! Aquarium-Fish node process: wires `fish_election::Engine` to this
//! deliverable's in-memory State Store, in-process cluster transport, and
//! bundled `NullDriver`, mirroring the teacher's `engine` crate assembling
//! `multisig` + `p2p` behind blockchain-specific glue in its own
//! `main.rs`/`settings.rs`.

pub mod drivers;
pub mod errors;
pub mod logging;
pub mod settings;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use fish_cluster::LocalCluster;
use fish_election::clock::{SystemClock, SystemRand};
use fish_election::driver::DriverRegistry;
use fish_election::testing::InMemoryStateStore;
use fish_election::{parse_lifetime, Engine, EngineConfig};

use drivers::NullDriver;
use errors::FishError;
use settings::{DriverSettings, Settings};

/// Everything a running node needs the caller to hold onto: the engine
/// itself, its shutdown switch, and the cluster importer task (owned
/// outside the engine's own worker `JoinSet` since the transport's
/// lifecycle is an external-collaborator concern, spec §1).
pub struct Node {
    pub engine: Arc<Engine>,
    pub shutdown: watch::Sender<bool>,
    pub cluster_importer: JoinHandle<()>,
}

/// Builds the driver registry named in `configured` (§6.3: "the engine
/// loads exactly the names listed in config, or all registered drivers if
/// none are listed"). The only driver type this binary ships is
/// [`NullDriver`]; a real deployment would register additional instance
/// names against real provider implementations here.
pub fn build_driver_registry(configured: &[DriverSettings]) -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    if configured.is_empty() {
        registry.register("null", Arc::new(NullDriver::new("null")));
        return registry;
    }
    for driver in configured {
        let base = driver.name.split('/').next().unwrap_or(&driver.name);
        match base {
            "null" => registry.register(driver.name.clone(), Arc::new(NullDriver::new(driver.name.clone()))),
            other => tracing::warn!(driver = other, "unknown driver name, skipping"),
        }
    }
    registry
}

/// Assembles an `Engine` from `settings` and spawns its cluster importer.
/// The node mints a fresh identity and registers itself as the sole active
/// node on every start — acceptable for this deliverable's in-memory store,
/// which has nothing to recover across restarts (spec §9: node identity/
/// liveness tracking proper is an external collaborator's job).
pub fn build(settings: &Settings) -> Result<Node, FishError> {
    let node_uid = Uuid::new_v4();
    let store = Arc::new(InMemoryStateStore::new(node_uid, settings.node.name.clone()));
    store.register_active_node(node_uid);

    let cluster = Arc::new(LocalCluster::new());
    let importer_rx = cluster.subscribe();

    let drivers = build_driver_registry(&settings.drivers);

    let default_resource_lifetime = parse_lifetime(&settings.election.default_resource_lifetime)?;

    let config = EngineConfig {
        elected_rounds_to_wait: settings.election.elected_rounds_to_wait,
        allocation_retry: settings.election.allocation_retry,
        default_resource_lifetime,
    };

    let (engine, shutdown) = Engine::new(
        Arc::new(SystemClock),
        Arc::new(SystemRand),
        store,
        cluster,
        drivers,
        settings.node.identifiers.clone(),
        config,
    );

    let cluster_importer = tokio::spawn(fish_cluster::run_importer(engine.clone(), importer_rx));

    Ok(Node {
        engine,
        shutdown,
        cluster_importer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_drivers_default_to_null() {
        let registry = build_driver_registry(&[]);
        assert!(registry.is_loaded("null"));
    }

    #[test]
    fn configured_driver_instance_names_are_respected() {
        let registry = build_driver_registry(&[DriverSettings {
            name: "null/primary".to_string(),
            cfg: serde_json::json!({}),
        }]);
        assert!(registry.is_loaded("null/primary"));
        assert!(!registry.is_loaded("null"));
    }
}

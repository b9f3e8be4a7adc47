use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::clock::{Clock, Rand};
use crate::cluster::ClusterTransport;
use crate::capacity::NodeCapacity;
use crate::dispatcher::{self, DispatchSignal};
use crate::driver::DriverRegistry;
use crate::model::{ApplicationState, ApplicationTask, NewApplicationState, Status, Vote};
use crate::store::{StateStore, StoreError};
use crate::timeout::TimeoutScheduler;
use crate::votes::VoteStore;

/// `ElectionRoundTime` (§4.7): fixed, not configurable.
pub const ELECTION_ROUND_TIME: Duration = Duration::from_secs(30);
/// Deallocation retry budget (§4.8.2 step 4): fixed, not configurable.
pub const DEALLOCATION_RETRY_ATTEMPTS: u32 = 20;
pub const DEALLOCATION_RETRY_GAP: Duration = Duration::from_secs(10);
/// Election poll tick (§4.7.e).
pub const ELECTION_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration options recognized by the core (§6.5), minus
/// `NodeIdentifiers`/`Drivers` which parametrize [`NodeCapacity`]/
/// [`DriverRegistry`] construction directly rather than living on this
/// struct.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub elected_rounds_to_wait: u32,
    pub allocation_retry: u32,
    pub default_resource_lifetime: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            elected_rounds_to_wait: 10,
            allocation_retry: 3,
            default_resource_lifetime: None,
        }
    }
}

/// Collections the cluster transport can deliver via [`Engine::import`]
/// (§6.2). `Application`/`Label`/`ApplicationResource` import is an
/// out-of-scope external-collaborator concern (§1: the KV store and its
/// replication are external); only the records this engine's own state
/// machine reacts to are ingested here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    ApplicationState,
    ApplicationTask,
    Vote,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("malformed import payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns one instance of each of C1-C9 and the worker bookkeeping needed to
/// run them (§4.10). This is the object every Election/Execution Worker task
/// is spawned with an `Arc` to, mirroring the teacher's habit of passing a
/// single shared context (`&slog::Logger`, scope handles) into every spawned
/// ceremony rather than relying on globals (§9 Design Notes: "no process-wide
/// singletons are required").
pub struct Engine {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) rand: Arc<dyn Rand>,
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) cluster: Arc<dyn ClusterTransport>,
    pub(crate) votes: VoteStore,
    pub(crate) capacity: NodeCapacity,
    pub(crate) drivers: DriverRegistry,
    pub(crate) timeouts: Arc<TimeoutScheduler>,
    pub(crate) config: EngineConfig,
    pub(crate) applications: DashMap<Uuid, Arc<AsyncMutex<()>>>,
    pub(crate) election_running: DashMap<Uuid, ()>,
    dispatch_tx: mpsc::UnboundedSender<DispatchSignal>,
    workers: SyncMutex<JoinSet<()>>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Arc<dyn Clock>,
        rand: Arc<dyn Rand>,
        store: Arc<dyn StateStore>,
        cluster: Arc<dyn ClusterTransport>,
        drivers: DriverRegistry,
        node_identifiers: Vec<String>,
        config: EngineConfig,
    ) -> (Arc<Self>, watch::Sender<bool>) {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            clock,
            rand,
            store,
            cluster,
            votes: VoteStore::new(),
            capacity: NodeCapacity::new(node_identifiers),
            drivers,
            timeouts: Arc::new(TimeoutScheduler::new()),
            config,
            applications: DashMap::new(),
            election_running: DashMap::new(),
            dispatch_tx,
            workers: SyncMutex::new(JoinSet::new()),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        engine.spawn_worker(dispatcher::run(
            engine.clone(),
            dispatch_rx,
            shutdown_rx.clone(),
        ));
        engine.spawn_worker(engine.timeouts.clone().run(engine.clone(), shutdown_rx));
        (engine, shutdown_tx)
    }

    pub(crate) fn spawn_worker<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.workers.lock().spawn(future);
    }

    /// Blocks until every spawned worker (Dispatcher, Timeout Scheduler,
    /// Election/Execution Workers) has returned. Election and Execution
    /// Workers are not forcibly cancelled (§5 "Cancellation") — their
    /// state-machine logic converges on its own once the applications they
    /// track reach a terminal status.
    pub async fn join_workers(&self) {
        let mut set = std::mem::replace(&mut *self.workers.lock(), JoinSet::new());
        while set.join_next().await.is_some() {}
    }

    /// Locally appends a fresh `ApplicationState` and notifies the
    /// Dispatcher. This is the engine's half of the "local RPC" input
    /// described in §2 ("from local RPC or cluster import").
    pub async fn submit_state(
        &self,
        application_uid: Uuid,
        status: Status,
        description: impl Into<String>,
    ) -> Result<ApplicationState, StoreError> {
        let state = self
            .store
            .application_state_create(NewApplicationState {
                application_uid,
                status,
                description: description.into(),
            })
            .await?;
        let _ = self
            .dispatch_tx
            .send(DispatchSignal::StateCreated(state.clone()));
        Ok(state)
    }

    /// Locally inserts an `ApplicationTask` and notifies the Dispatcher
    /// (§4.9 "Also observes ApplicationTask inserts").
    pub async fn submit_task(&self, task: ApplicationTask) -> Result<(), StoreError> {
        self.store.application_task_save(task.clone()).await?;
        let _ = self.dispatch_tx.send(DispatchSignal::TaskInserted(task));
        Ok(())
    }

    /// Cluster-import entry point (§6.2, §4.10 `Engine::import`). Ingests a
    /// serialized record with `SkipHooks = true` semantics — for
    /// `ApplicationState` that means preserving `uid`/`created_at`
    /// bit-exact rather than assigning fresh ones — then still notifies the
    /// Dispatcher, since imported states are just as actionable as local
    /// ones (§2: "from local RPC or cluster import").
    pub async fn import(&self, kind: ImportKind, payload: &[u8]) -> Result<(), ImportError> {
        match kind {
            ImportKind::ApplicationState => {
                let state: ApplicationState = serde_json::from_slice(payload)?;
                self.store.application_state_import(state.clone()).await?;
                let _ = self.dispatch_tx.send(DispatchSignal::StateCreated(state));
            }
            ImportKind::ApplicationTask => {
                let task: ApplicationTask = serde_json::from_slice(payload)?;
                self.store.application_task_save(task.clone()).await?;
                let _ = self.dispatch_tx.send(DispatchSignal::TaskInserted(task));
            }
            ImportKind::Vote => {
                let vote: Vote = serde_json::from_slice(payload)?;
                self.votes.storage_add([vote]);
            }
        }
        Ok(())
    }

    /// Snapshot of the votes this node has observed for (application, round)
    /// so far (§4.2 `ListByAppRound`). Exposed for external collaborators
    /// (e.g. a cluster transport's own tests) that want to confirm a vote
    /// actually landed without reaching into crate-private state.
    pub fn votes_for(&self, application_uid: Uuid, round: u32) -> Vec<Vote> {
        self.votes.list_by_app_round(application_uid, round)
    }

    /// Gets-or-creates the per-Application mutex entry (§4.8, §9: "the
    /// mutex map entry doubles as the identity of that task").
    pub(crate) fn application_mutex(&self, application_uid: Uuid) -> Arc<AsyncMutex<()>> {
        self.applications
            .entry(application_uid)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub(crate) fn remove_application_mutex(&self, application_uid: Uuid) {
        self.applications.remove(&application_uid);
    }

    /// Best-effort non-blocking acquire: `None` if another Execution Worker
    /// already holds it (idempotent re-delivery, §5).
    pub(crate) fn try_lock_application(
        &self,
        application_uid: Uuid,
    ) -> Option<OwnedMutexGuard<()>> {
        self.application_mutex(application_uid).try_lock_owned().ok()
    }

    /// Blocking acquire: waits out whichever worker currently holds the
    /// per-Application mutex (§4.8.2 step 2 is a blocking acquire, unlike
    /// Start's best-effort `try_lock_application`). Used by Stop so a
    /// `DEALLOCATE`/`RECALLED` that arrives mid-allocation is not dropped —
    /// it waits for the in-flight allocate to release the guard and then
    /// still tears the resource down, rather than bailing out because the
    /// lock momentarily wasn't free (§9: the `RECALLED`-before-`ALLOCATED`
    /// race).
    pub(crate) async fn lock_application(&self, application_uid: Uuid) -> OwnedMutexGuard<()> {
        self.application_mutex(application_uid).lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverRegistry;
    use crate::testing::{FixedRand, InMemoryStateStore, NullCluster};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_engine() -> Arc<Engine> {
        let node_uid = Uuid::new_v4();
        let (engine, _shutdown) = Engine::new(
            Arc::new(crate::clock::SystemClock),
            Arc::new(FixedRand::new(1)),
            Arc::new(InMemoryStateStore::new(node_uid, "node-1")),
            Arc::new(NullCluster),
            DriverRegistry::new(),
            vec![],
            EngineConfig::default(),
        );
        engine
    }

    /// P4 / I2: at most one caller at a time holds the per-Application
    /// mutex. Enforced by construction (`try_lock_owned`); this asserts the
    /// construction actually behaves that way rather than relying on timing.
    #[tokio::test]
    async fn try_lock_application_is_exclusive() {
        let engine = test_engine();
        let application_uid = Uuid::new_v4();

        let guard = engine.try_lock_application(application_uid);
        assert!(guard.is_some(), "first acquire should succeed");
        assert!(
            engine.try_lock_application(application_uid).is_none(),
            "second acquire must fail while the first guard is held"
        );

        drop(guard);
        assert!(
            engine.try_lock_application(application_uid).is_some(),
            "acquire should succeed again once released"
        );
    }

    /// Same property under real contention: of many tasks racing to acquire
    /// the same Application's lock, exactly one succeeds at a time, so a
    /// shared counter never observes two simultaneous holders.
    #[tokio::test]
    async fn concurrent_start_attempts_never_overlap() {
        let engine = test_engine();
        let application_uid = Uuid::new_v4();
        let concurrent_holders = Arc::new(AtomicU32::new(0));
        let max_observed = Arc::new(AtomicU32::new(0));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let engine = engine.clone();
            let concurrent_holders = concurrent_holders.clone();
            let max_observed = max_observed.clone();
            tasks.spawn(async move {
                loop {
                    if let Some(_guard) = engine.try_lock_application(application_uid) {
                        let now = concurrent_holders.fetch_add(1, Ordering::SeqCst) + 1;
                        max_observed.fetch_max(now, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        concurrent_holders.fetch_sub(1, Ordering::SeqCst);
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            });
        }
        while tasks.join_next().await.is_some() {}

        assert_eq!(max_observed.load(Ordering::SeqCst), 1);
    }
}

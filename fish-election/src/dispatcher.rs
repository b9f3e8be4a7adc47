use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::engine::Engine;
use crate::model::{ApplicationState, ApplicationTask, Status};
use crate::{election, execution};

/// What the Dispatcher reacts to: every `ApplicationStateCreate` call (local
/// or imported) and every `ApplicationTask` insert (§4.9).
#[derive(Debug, Clone)]
pub enum DispatchSignal {
    StateCreated(ApplicationState),
    TaskInserted(ApplicationTask),
}

/// Reacts to ApplicationState changes and ApplicationTask inserts by
/// starting Election/Execution workers as needed (C9). Grounded on the
/// teacher's `P2PConductor::start`: a `tokio::select!` loop over an incoming
/// stream plus a shutdown receiver, translating external stimuli into calls
/// on the engine rather than driving logic itself.
pub async fn run(
    engine: Arc<Engine>,
    mut signals: mpsc::UnboundedReceiver<DispatchSignal>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            signal = signals.recv() => {
                match signal {
                    Some(signal) => handle(&engine, signal).await,
                    None => return,
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::debug!("dispatcher shutting down");
                    return;
                }
            }
        }
    }
}

async fn handle(engine: &Arc<Engine>, signal: DispatchSignal) {
    match signal {
        DispatchSignal::StateCreated(state) => handle_state(engine, state).await,
        DispatchSignal::TaskInserted(task) => handle_task(engine, task).await,
    }
}

async fn handle_state(engine: &Arc<Engine>, state: ApplicationState) {
    match state.status {
        Status::New | Status::Elected => {
            engine.ensure_election_worker(state.application_uid);
            if state.status == Status::Elected {
                let worker_engine = engine.clone();
                engine.spawn_worker(async move {
                    execution::start(worker_engine, state.application_uid).await;
                });
            }
        }
        Status::Deallocate | Status::Recalled => {
            let worker_engine = engine.clone();
            engine.spawn_worker(async move {
                execution::stop(worker_engine, state.application_uid).await;
            });
        }
        Status::Allocated | Status::Deallocated | Status::Error => {
            // No further lifecycle action triggered directly by these
            // states; Allocated resources wait on their Timeout Scheduler
            // entry, and Deallocated/Error are terminal (§7).
        }
    }
}

async fn handle_task(engine: &Arc<Engine>, task: ApplicationTask) {
    let Ok(Some(state)) = engine
        .store
        .application_state_get_by_application(task.application_uid)
        .await
    else {
        return;
    };
    if state.status != task.when {
        return;
    }
    let Ok(Some(resource)) = engine
        .store
        .application_resource_get_by_application(task.application_uid)
        .await
    else {
        return;
    };
    execution::run_single_task(engine, &resource, task).await;
}

impl Engine {
    /// Spawns an Election Worker for `application_uid` unless one is already
    /// running (I1).
    pub(crate) fn ensure_election_worker(self: &Arc<Self>, application_uid: uuid::Uuid) {
        if self.election_running.insert(application_uid, ()).is_some() {
            return;
        }
        let engine = self.clone();
        self.spawn_worker(async move {
            election::run(engine.clone(), application_uid).await;
            engine.election_running.remove(&application_uid);
        });
    }
}

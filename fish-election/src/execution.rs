use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::driver::Driver;
use crate::engine::{Engine, DEALLOCATION_RETRY_ATTEMPTS, DEALLOCATION_RETRY_GAP};
use crate::model::{
    Application, ApplicationResource, ApplicationTask, Label, LabelDefinition, Status,
};

/// Shallow merge: start from Application metadata, let Label metadata
/// overwrite on key collisions (§4.8.1 background path). Both sides must be
/// JSON objects; anything else is the "corrupt metadata" error case (§7).
fn merge_metadata(application: &Value, label: &Value) -> Result<Value, &'static str> {
    let (Value::Object(app_map), Value::Object(label_map)) = (application, label) else {
        return Err("metadata is not a JSON object");
    };
    let mut merged = app_map.clone();
    for (key, value) in label_map {
        merged.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(merged))
}

async fn load_definition_and_driver<'a>(
    engine: &Engine,
    label: &'a Label,
    definition_index: i32,
) -> Option<(&'a LabelDefinition, Arc<dyn Driver>)> {
    let def = label.definition(definition_index)?;
    let driver = engine.drivers.get(&def.driver)?.clone();
    Some((def, driver))
}

/// Transitions the Application to `ERROR` and logs; used by every "any
/// lookup failure" branch in §4.8.1/§4.8.2.
async fn fail(engine: &Engine, application_uid: Uuid, description: impl Into<String>) {
    let description = description.into();
    tracing::warn!(%application_uid, %description, "transitioning to ERROR");
    if let Err(error) = engine
        .submit_state(application_uid, Status::Error, description)
        .await
    {
        tracing::warn!(%application_uid, %error, "failed to record ERROR state");
    }
}

/// Execution Worker Start (§4.8.1): triggered on `ELECTED` if this node has
/// a Won vote for the Application.
pub async fn start(engine: Arc<Engine>, application_uid: Uuid) {
    let Some(vote) = engine.votes.won_take_remove(application_uid) else {
        return;
    };

    let Some(guard) = engine.try_lock_application(application_uid) else {
        // Already running: idempotent re-delivery of the same ELECTED
        // state (§5 ordering guarantees).
        return;
    };

    let application = match engine.store.application_get(application_uid).await {
        Ok(Some(application)) => application,
        _ => return,
    };
    let latest = match engine
        .store
        .application_state_get_by_application(application_uid)
        .await
    {
        Ok(Some(state)) if state.status.is_active() => state,
        _ => return,
    };
    let label = match engine.store.label_get(application.label_uid).await {
        Ok(Some(label)) => label,
        _ => {
            fail(&engine, application_uid, "label vanished before allocation").await;
            return;
        }
    };

    let Some((def, driver)) = load_definition_and_driver(&engine, &label, vote.available).await
    else {
        fail(
            &engine,
            application_uid,
            format!(
                "no definition/driver at index {} for label {}",
                vote.available, label.uid
            ),
        )
        .await;
        return;
    };
    let def = def.clone();

    // Re-check eligibility under Node Capacity; handles multiple winners
    // colliding on one node (§4.8.1 step 5).
    if !engine.capacity.definition_eligible(&def, driver.as_ref()) {
        retry_or_error(&engine, application_uid, "node no longer eligible for this definition").await;
        return;
    }

    if !driver.is_remote() {
        engine.capacity.add(&def.resources);
    }

    // Background allocation path runs under the same mutex for its whole
    // duration (§4.8.1 step 7); the owned guard travels with the spawned
    // task.
    let engine_for_task = engine.clone();
    engine.spawn_worker(async move {
        allocate(engine_for_task, application, label, def, driver, vote.available, latest, guard).await;
    });
}

async fn retry_or_error(engine: &Engine, application_uid: Uuid, reason: &str) {
    match engine.store.application_state_new_count(application_uid).await {
        Ok(new_count) if new_count as u32 <= engine.config.allocation_retry => {
            let _ = engine
                .submit_state(
                    application_uid,
                    Status::New,
                    format!("{reason}, retrying ({new_count}/{})", engine.config.allocation_retry),
                )
                .await;
        }
        _ => fail(engine, application_uid, reason).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn allocate(
    engine: Arc<Engine>,
    application: Application,
    label: Label,
    def: LabelDefinition,
    driver: Arc<dyn Driver>,
    definition_index: i32,
    _latest: crate::model::ApplicationState,
    _guard: OwnedMutexGuard<()>,
) {
    let application_uid = application.uid;

    let merged_metadata = match merge_metadata(&application.metadata, &label.metadata) {
        Ok(metadata) => metadata,
        Err(reason) => {
            if !driver.is_remote() {
                engine.capacity.subtract(&def.resources);
            }
            engine.remove_application_mutex(application_uid);
            fail(
                &engine,
                application_uid,
                format!("corrupt metadata: {reason} ({})", crate::here!()),
            )
            .await;
            return;
        }
    };

    match driver.allocate(&def, &merged_metadata).await {
        Ok(allocated) => {
            let now = engine.clock.now();
            let lifetime = match crate::duration::parse_lifetime(&def.resources.lifetime) {
                Ok(Some(d)) => Some(d),
                Ok(None) => engine.config.default_resource_lifetime,
                Err(_) => engine.config.default_resource_lifetime,
            };
            let timeout = lifetime
                .filter(|d| !d.is_zero())
                .map(|d| now + chrono::Duration::seconds(d.as_secs() as i64));

            let resource = ApplicationResource {
                uid: engine.store.new_uid(),
                application_uid,
                label_uid: label.uid,
                node_uid: engine.store.node_uid(),
                definition_index,
                identifier: allocated.identifier,
                hw_addr: allocated.hw_addr,
                ip_addr: allocated.ip_addr,
                authentication: allocated.authentication,
                metadata: merged_metadata,
                timeout,
                created_at: now,
                updated_at: now,
            };

            if let Some(deadline) = timeout {
                engine.timeouts.set(application_uid, deadline);
            }

            if let Err(error) = engine.store.application_resource_create(resource).await {
                tracing::warn!(%application_uid, %error, "failed to persist resource");
            }
            if let Err(error) = engine
                .submit_state(application_uid, Status::Allocated, "Driver allocated the resource")
                .await
            {
                tracing::warn!(%application_uid, %error, "failed to record ALLOCATED state");
            } else {
                run_tasks_for(&engine, application_uid, Status::Allocated).await;
            }
        }
        Err(error) => {
            if !driver.is_remote() {
                engine.capacity.subtract(&def.resources);
            }
            engine.remove_application_mutex(application_uid);
            retry_or_error(&engine, application_uid, &format!("allocation failed: {error}")).await;
            return;
        }
    }
}

/// Execution Worker Stop (§4.8.2): triggered on `DEALLOCATE` or `RECALLED`.
pub async fn stop(engine: Arc<Engine>, application_uid: Uuid) {
    if !engine.applications.contains_key(&application_uid) {
        // This node never ran the Application (lost the election, or it was
        // never allocated here) — nothing to tear down.
        return;
    }
    // Blocking acquire (§4.8.2 step 2): if Start's background allocation is
    // still in flight and holding this Application's guard, wait for it to
    // finish rather than dropping this deallocation signal. The dispatcher
    // delivers each state change at most once, with no redelivery, so
    // bailing out here would silently lose the DEALLOCATE/RECALLED forever.
    let _guard = engine.lock_application(application_uid).await;

    let latest = match engine
        .store
        .application_state_get_by_application(application_uid)
        .await
    {
        Ok(Some(state)) => state,
        _ => {
            fail(&engine, application_uid, "state vanished before deallocation").await;
            return;
        }
    };
    let resource = match engine
        .store
        .application_resource_get_by_application(application_uid)
        .await
    {
        Ok(Some(resource)) => resource,
        _ => {
            fail(&engine, application_uid, "resource vanished before deallocation").await;
            return;
        }
    };
    let application = match engine.store.application_get(application_uid).await {
        Ok(Some(application)) => application,
        _ => {
            fail(&engine, application_uid, "application vanished before deallocation").await;
            return;
        }
    };
    let label = match engine.store.label_get(application.label_uid).await {
        Ok(Some(label)) => label,
        _ => {
            fail(&engine, application_uid, "label vanished before deallocation").await;
            return;
        }
    };
    let Some((def, driver)) =
        load_definition_and_driver(&engine, &label, resource.definition_index).await
    else {
        fail(&engine, application_uid, "definition/driver vanished before deallocation").await;
        return;
    };
    let def = def.clone();

    run_tasks_for(&engine, application_uid, latest.status).await;

    let final_state = deallocate_with_retry(driver.as_ref(), &resource).await;

    if let Err(error) = engine
        .store
        .application_resource_delete(application_uid)
        .await
    {
        tracing::warn!(%application_uid, %error, "failed to delete resource row");
    }
    engine.timeouts.remove(application_uid);
    if !driver.is_remote() {
        engine.capacity.subtract(&def.resources);
    }
    engine.remove_application_mutex(application_uid);

    let (status, description) = final_state;
    if let Err(error) = engine.submit_state(application_uid, status, description).await {
        tracing::warn!(%application_uid, %error, "failed to record final deallocation state");
    }
}

async fn deallocate_with_retry(
    driver: &dyn Driver,
    resource: &ApplicationResource,
) -> (Status, String) {
    let mut last_error = None;
    for attempt in 1..=DEALLOCATION_RETRY_ATTEMPTS {
        match driver.deallocate(resource).await {
            Ok(()) => return (Status::Deallocated, "Driver deallocated the resource".to_string()),
            Err(error) => {
                tracing::warn!(application_uid = %resource.application_uid, attempt, %error, "deallocate attempt failed");
                last_error = Some(error.to_string());
                if attempt < DEALLOCATION_RETRY_ATTEMPTS {
                    tokio::time::sleep(DEALLOCATION_RETRY_GAP).await;
                }
            }
        }
    }
    (
        Status::Error,
        format!(
            "deallocation failed after {DEALLOCATION_RETRY_ATTEMPTS} attempts: {}",
            last_error.unwrap_or_default()
        ),
    )
}

/// Task Execution (§4.8.3), reused by both the allocation/deallocation path
/// (for every ApplicationState change) and the Dispatcher's direct
/// single-task path (§4.9, for a task inserted after the matching state was
/// already reached).
async fn run_tasks_for(engine: &Engine, application_uid: Uuid, when: Status) {
    let tasks = match engine
        .store
        .application_task_list_by_application_and_when(application_uid, when)
        .await
    {
        Ok(tasks) => tasks,
        Err(error) => {
            tracing::warn!(%application_uid, %error, "failed to list tasks");
            return;
        }
    };
    let Ok(Some(resource)) = engine
        .store
        .application_resource_get_by_application(application_uid)
        .await
    else {
        return;
    };
    for task in tasks {
        if task.is_executed() {
            continue;
        }
        run_one_task(engine, &resource, task).await;
    }
}

/// Runs a single task against an already-loaded resource. Used directly by
/// the Dispatcher when a task is inserted after its matching state has
/// already been reached (§4.9).
pub(crate) async fn run_single_task(engine: &Engine, resource: &ApplicationResource, task: ApplicationTask) {
    if task.is_executed() {
        return;
    }
    run_one_task(engine, resource, task).await;
}

async fn run_one_task(engine: &Engine, resource: &ApplicationResource, mut task: ApplicationTask) {
    let Ok(Some(application)) = engine.store.application_get(resource.application_uid).await else {
        return;
    };
    let Ok(Some(label)) = engine.store.label_get(application.label_uid).await else {
        return;
    };
    let Some(def) = label.definition(resource.definition_index) else {
        return;
    };
    let Some(driver) = engine.drivers.get(&def.driver) else {
        return;
    };

    task.result = match driver.get_task(&task.task, &task.options) {
        None => serde_json::json!({"error": "task not available in driver"}),
        Some(mut driver_task) => {
            driver_task.set_info(&task, def, resource);
            match driver_task.execute().await {
                Ok(result) => result,
                Err(error) => serde_json::json!({"error": error.to_string()}),
            }
        }
    };

    // This is a result write, not an external insert, so it must not be
    // routed through `Engine::submit_task` — that would re-trigger the
    // Dispatcher for the same task forever.
    if let Err(error) = engine.store.application_task_save(task).await {
        tracing::warn!(application_uid = %resource.application_uid, %error, "failed to save task result");
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use uuid::Uuid;

use crate::engine::Engine;
use crate::model::Status;

const IDLE_SLEEP: Duration = Duration::from_secs(60 * 60);

/// Per-application deadline -> deallocate signal (C3). A single task sleeps
/// until the earliest deadline or until a change notification arrives; that
/// notification is a [`Notify`], which coalesces repeated wakeups into one
/// permit the same way the spec's "1-slot signal channel" does.
pub struct TimeoutScheduler {
    deadlines: Mutex<HashMap<Uuid, DateTime<Utc>>>,
    notify: Notify,
}

impl TimeoutScheduler {
    pub fn new() -> Self {
        Self {
            deadlines: Mutex::new(HashMap::new()),
            notify: Notify::new(),
        }
    }

    fn earliest(map: &HashMap<Uuid, DateTime<Utc>>) -> Option<DateTime<Utc>> {
        map.values().min().copied()
    }

    /// Updates the map and notifies iff the new deadline is earlier than any
    /// existing one.
    pub fn set(&self, application_uid: Uuid, deadline: DateTime<Utc>) {
        let mut map = self.deadlines.lock();
        let before = Self::earliest(&map);
        map.insert(application_uid, deadline);
        let after = Self::earliest(&map);
        drop(map);
        if after != before {
            self.notify.notify_one();
        }
    }

    /// Notifies too, if the removed deadline was the earliest.
    pub fn remove(&self, application_uid: Uuid) {
        let mut map = self.deadlines.lock();
        let before = Self::earliest(&map);
        let removed = map.remove(&application_uid);
        let after = Self::earliest(&map);
        drop(map);
        if removed.is_some() && after != before {
            self.notify.notify_one();
        }
    }

    pub async fn run(self: Arc<Self>, engine: Arc<Engine>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let sleep_for = {
                let map = self.deadlines.lock();
                match Self::earliest(&map) {
                    Some(deadline) => (deadline - engine.clock.now())
                        .to_std()
                        .unwrap_or(Duration::ZERO),
                    None => IDLE_SLEEP,
                }
            };
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {
                    self.fire_expired(&engine).await;
                }
                _ = self.notify.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("timeout scheduler shutting down");
                        return;
                    }
                }
            }
        }
    }

    async fn fire_expired(&self, engine: &Arc<Engine>) {
        let now = engine.clock.now();
        let expired: Vec<Uuid> = {
            let map = self.deadlines.lock();
            map.iter()
                .filter(|(_, deadline)| **deadline <= now)
                .map(|(uid, _)| *uid)
                .collect()
        };
        for application_uid in expired {
            self.deadlines.lock().remove(&application_uid);
            match engine
                .store
                .application_state_get_by_application(application_uid)
                .await
            {
                Ok(Some(state)) if state.status.is_active() => {
                    tracing::info!(%application_uid, "lifetime expired, requesting deallocation");
                    if let Err(error) = engine
                        .submit_state(application_uid, Status::Deallocate, "lifetime expired")
                        .await
                    {
                        tracing::warn!(%application_uid, %error, "failed to record deallocate on expiry");
                    }
                }
                Ok(_) => {
                    // Not found, or already inactive: nothing to do (re-checked
                    // under the state store, per §4.3).
                }
                Err(error) => {
                    tracing::warn!(%application_uid, %error, "store error while checking expiry");
                }
            }
        }
    }
}

impl Default for TimeoutScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn earliest_of(sched: &TimeoutScheduler) -> Option<DateTime<Utc>> {
        TimeoutScheduler::earliest(&sched.deadlines.lock())
    }

    #[test]
    fn set_tracks_earliest_deadline() {
        let sched = TimeoutScheduler::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let now = Utc::now();
        sched.set(a, now + chrono::Duration::seconds(10));
        assert_eq!(earliest_of(&sched), Some(now + chrono::Duration::seconds(10)));
        sched.set(b, now + chrono::Duration::seconds(20));
        assert_eq!(earliest_of(&sched), Some(now + chrono::Duration::seconds(10)));
    }

    #[test]
    fn remove_falls_back_to_remaining_deadline() {
        let sched = TimeoutScheduler::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let now = Utc::now();
        sched.set(a, now + chrono::Duration::seconds(10));
        sched.set(b, now + chrono::Duration::seconds(20));
        sched.remove(a);
        assert_eq!(earliest_of(&sched), Some(now + chrono::Duration::seconds(20)));
    }
}

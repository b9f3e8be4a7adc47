use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::model::Vote;

/// Three maps guarded by separate locks (§4.2, §5 shared-resources table).
/// Every critical section here is a plain map operation, never held across
/// an `.await` — grounded on `paritytech-substrate-archive`'s use of
/// `parking_lot` for exactly this kind of short-lived in-memory state.
#[derive(Default)]
pub struct VoteStore {
    active: RwLock<HashMap<Uuid, Vote>>,
    storage: RwLock<HashMap<Uuid, Vote>>,
    won: RwLock<HashMap<Uuid, Vote>>,
}

impl VoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates non-nil UIDs (guaranteed by the type system here), silently
    /// drops duplicates by UID, otherwise inserts. Idempotent.
    pub fn storage_add<I: IntoIterator<Item = Vote>>(&self, votes: I) {
        let mut storage = self.storage.write();
        for vote in votes {
            storage.entry(vote.uid).or_insert(vote);
        }
    }

    pub fn list_by_app_round(&self, application_uid: Uuid, round: u32) -> Vec<Vote> {
        self.storage
            .read()
            .values()
            .filter(|v| v.application_uid == application_uid && v.round == round)
            .cloned()
            .collect()
    }

    pub fn active_get(&self, application_uid: Uuid) -> Option<Vote> {
        self.active.read().get(&application_uid).cloned()
    }

    pub fn active_set(&self, vote: Vote) {
        self.active.write().insert(vote.application_uid, vote);
    }

    pub fn active_remove(&self, application_uid: Uuid) -> Option<Vote> {
        self.active.write().remove(&application_uid)
    }

    pub fn won_add(&self, vote: Vote) {
        self.won.write().insert(vote.application_uid, vote);
    }

    /// Atomic pop: at most one caller ever observes `Some` for a given
    /// winning vote (I5).
    pub fn won_take_remove(&self, application_uid: Uuid) -> Option<Vote> {
        self.won.write().remove(&application_uid)
    }

    /// Purge any storage vote whose (AppUID, Round) is not present in
    /// `activeVotes`. Called when an election round concludes, bounding the
    /// otherwise-unbounded growth of `storage` (§9 Design Notes).
    pub fn storage_cleanup(&self) {
        let keep: std::collections::HashSet<(Uuid, u32)> = self
            .active
            .read()
            .values()
            .map(|v| (v.application_uid, v.round))
            .collect();
        self.storage
            .write()
            .retain(|_, v| keep.contains(&(v.application_uid, v.round)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn vote(uid: Uuid, app: Uuid, round: u32, available: i32, rand: u32) -> Vote {
        Vote {
            uid,
            node_uid: Uuid::new_v4(),
            application_uid: app,
            round,
            available,
            rule_result: 0,
            rand,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn storage_add_is_idempotent() {
        let store = VoteStore::new();
        let app = Uuid::new_v4();
        let v = vote(Uuid::new_v4(), app, 0, 0, 7);
        store.storage_add([v.clone()]);
        store.storage_add([v.clone()]);
        assert_eq!(store.list_by_app_round(app, 0).len(), 1);
    }

    #[test]
    fn won_take_remove_pops_once() {
        let store = VoteStore::new();
        let app = Uuid::new_v4();
        store.won_add(vote(Uuid::new_v4(), app, 0, 0, 1));
        assert!(store.won_take_remove(app).is_some());
        assert!(store.won_take_remove(app).is_none());
    }

    #[test]
    fn storage_cleanup_prunes_stale_rounds() {
        let store = VoteStore::new();
        let app = Uuid::new_v4();
        let old = vote(Uuid::new_v4(), app, 0, 0, 1);
        let fresh = vote(Uuid::new_v4(), app, 1, 0, 2);
        store.storage_add([old, fresh.clone()]);
        store.active_set(fresh);
        store.storage_cleanup();
        assert_eq!(store.list_by_app_round(app, 0).len(), 0);
        assert_eq!(store.list_by_app_round(app, 1).len(), 1);
    }
}

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{
    Application, ApplicationResource, ApplicationState, ApplicationTask, Label,
    NewApplicationState, Status,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Typed CRUD over the KV collections the engine needs (§4.6, §6.1):
/// `application`, `application_state`, `application_task`,
/// `application_resource`, `label`, `node`. Read-your-writes,
/// single-writer-per-key; no cross-key transactions are required because
/// every derived query here tolerates stale reads.
///
/// Grounded on the teacher's `KeyDB` trait (`update_key`/`load_keys`) with
/// its `PersistentKeyDB`/`KeyDBMock` split — this crate ships the `KeyDBMock`
/// side ([`crate::testing::InMemoryStateStore`]); a real KV-backed
/// implementation is out of scope (spec §1) but would implement this trait.
#[async_trait]
pub trait StateStore: Send + Sync {
    fn node_uid(&self) -> Uuid;
    fn node_name(&self) -> String;

    /// A fresh v4 UUID with its leading six bytes overwritten by
    /// `node_uid`'s bytes, so the creating node is recoverable from any ID
    /// (§3).
    fn new_uid(&self) -> Uuid {
        derive_uid(self.node_uid())
    }

    async fn application_get(&self, uid: Uuid) -> Result<Option<Application>, StoreError>;
    async fn label_get(&self, uid: Uuid) -> Result<Option<Label>, StoreError>;

    /// Appends; assigns `uid` and `created_at`.
    async fn application_state_create(
        &self,
        draft: NewApplicationState,
    ) -> Result<ApplicationState, StoreError>;

    /// Ingest path for cluster-imported states (§6.2): preserves `uid` and
    /// `created_at` bit-exact instead of assigning fresh ones.
    async fn application_state_import(&self, state: ApplicationState) -> Result<(), StoreError>;

    /// Latest row by `created_at` for this Application.
    async fn application_state_get_by_application(
        &self,
        application_uid: Uuid,
    ) -> Result<Option<ApplicationState>, StoreError>;

    /// Count of `NEW` states, for retry accounting (§4.7, §4.8.1 step 5).
    async fn application_state_new_count(
        &self,
        application_uid: Uuid,
    ) -> Result<usize, StoreError>;

    async fn application_resource_create(
        &self,
        resource: ApplicationResource,
    ) -> Result<(), StoreError>;
    async fn application_resource_get_by_application(
        &self,
        application_uid: Uuid,
    ) -> Result<Option<ApplicationResource>, StoreError>;
    async fn application_resource_get_by_ip(
        &self,
        ip_addr: &str,
    ) -> Result<Option<ApplicationResource>, StoreError>;
    async fn application_resource_save(
        &self,
        resource: ApplicationResource,
    ) -> Result<(), StoreError>;
    async fn application_resource_delete(&self, application_uid: Uuid)
        -> Result<(), StoreError>;

    async fn application_task_list_by_application_and_when(
        &self,
        application_uid: Uuid,
        when: Status,
    ) -> Result<Vec<ApplicationTask>, StoreError>;
    async fn application_task_save(&self, task: ApplicationTask) -> Result<(), StoreError>;

    /// Nodes that have pinged within `2 x NodePingDelay`; node liveness
    /// tracking itself is an external collaborator's job (§9), this call
    /// just reads the result.
    async fn node_active_list(&self) -> Result<Vec<Uuid>, StoreError>;
}

pub fn derive_uid(node_uid: Uuid) -> Uuid {
    let mut bytes = *Uuid::new_v4().as_bytes();
    bytes[..6].copy_from_slice(&node_uid.as_bytes()[..6]);
    Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_uid_carries_node_prefix() {
        let node = Uuid::new_v4();
        let derived = derive_uid(node);
        assert_eq!(&derived.as_bytes()[..6], &node.as_bytes()[..6]);
    }
}

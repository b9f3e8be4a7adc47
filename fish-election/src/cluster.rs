use async_trait::async_trait;

use crate::model::Vote;

/// Outbound half of the cluster transport contract (§6.2). `send_vote` is
/// fire-and-forget; it MAY fail, and the core does not retry it (a lost vote
/// is indistinguishable from a slow one and is recovered by the next round).
///
/// The inbound half — `ImportState(kind, payload)` — is not a trait method
/// here because it is not something the core *calls*; it is an entry point
/// the transport calls *into* the core (see `Engine::import_*` in
/// `engine.rs`), the same way the teacher's `P2PConductor` receives messages
/// from its inbound stream and forwards them into `multisig` rather than
/// `multisig` polling the network itself.
#[async_trait]
pub trait ClusterTransport: Send + Sync {
    async fn send_vote(&self, vote: &Vote);
}

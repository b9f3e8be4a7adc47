//! Cluster transport port (§6.2) and an in-process implementation.
//!
//! `fish_election::cluster::ClusterTransport` is the port the engine calls
//! *out* through (`send_vote`); the inbound half — `ImportState(kind,
//! payload)` — is not a trait here because it is something a transport
//! calls *into* the engine (`fish_election::Engine::import`), mirroring how
//! the teacher's `p2p::conductor::P2PConductor` forwards inbound network
//! messages into `multisig` rather than `multisig` polling the network
//! itself.
//!
//! A real gossip/RPC transport between OS processes is out of scope (spec
//! §1); this crate ships [`LocalCluster`], an in-process broadcast bus that
//! lets several [`fish_election::Engine`]s in one test binary exchange votes
//! exactly like real peers would (used by the two-node election scenario,
//! S6).

use std::sync::Arc;

use async_trait::async_trait;
use fish_election::cluster::ClusterTransport;
use fish_election::model::Vote;
use tokio::sync::broadcast;
use tracing::warn;

/// What peers exchange over the wire (§6.2, §6.4): today just votes, since
/// Application/Label/ApplicationResource replication is an external
/// collaborator's concern (spec §1) this engine does not itself drive.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ClusterMessage {
    Vote(Vote),
}

const CHANNEL_CAPACITY: usize = 1024;

/// In-process fan-out bus. Every node built against the same `LocalCluster`
/// (or a clone of its sender) sees every other node's votes, including its
/// own — harmless, since [`fish_election::votes::VoteStore::storage_add`]
/// dedupes by Vote UID.
pub struct LocalCluster {
    tx: broadcast::Sender<ClusterMessage>,
}

impl LocalCluster {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// A fresh subscription; feed it to [`run_importer`] to wire a peer
    /// engine to this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<ClusterMessage> {
        self.tx.subscribe()
    }
}

impl Default for LocalCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterTransport for LocalCluster {
    async fn send_vote(&self, vote: &Vote) {
        // Fire-and-forget (§6.2): no receivers (or a full channel after a
        // long-lagged one) is not an error the engine needs to hear about.
        let _ = self.tx.send(ClusterMessage::Vote(vote.clone()));
    }
}

/// Drives one subscription into an engine's import path for as long as the
/// bus is open, the way a real transport's inbound stream would deliver
/// `ImportState` calls (§6.2). Intended to be spawned (`tokio::spawn`)
/// alongside the engine it feeds by the composition root; the cluster
/// transport's own task lifecycle is an external-collaborator concern (spec
/// §1), so it is not tracked by the engine's internal worker `JoinSet`.
pub async fn run_importer(
    engine: Arc<fish_election::Engine>,
    mut rx: broadcast::Receiver<ClusterMessage>,
) {
    loop {
        match rx.recv().await {
            Ok(ClusterMessage::Vote(vote)) => {
                let payload = match serde_json::to_vec(&vote) {
                    Ok(payload) => payload,
                    Err(error) => {
                        warn!(%error, "failed to encode vote for import");
                        continue;
                    }
                };
                if let Err(error) = engine
                    .import(fish_election::ImportKind::Vote, &payload)
                    .await
                {
                    warn!(%error, "failed to import vote");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // A slow importer drops the oldest messages rather than
                // blocking the bus; a lost vote is recovered by the next
                // election round the same way a dropped `send_vote` is
                // (spec §6.2 "MAY fail").
                warn!(skipped, "cluster importer lagged, votes dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fish_election::testing::{driver_registry, FixedRand, InMemoryStateStore, TestDriver};
    use fish_election::{Engine, EngineConfig};
    use std::time::Duration;
    use uuid::Uuid;

    struct SystemClock;
    impl fish_election::clock::Clock for SystemClock {
        fn now(&self) -> chrono::DateTime<chrono::Utc> {
            chrono::Utc::now()
        }
    }

    #[tokio::test]
    async fn votes_propagate_between_two_local_peers() {
        let bus = Arc::new(LocalCluster::new());
        let rx_a = bus.subscribe();

        let store = Arc::new(InMemoryStateStore::new(Uuid::new_v4(), "peer-a"));
        let drivers = driver_registry(vec![("test", Arc::new(TestDriver::new("test")))]);
        let (engine, _shutdown) = Engine::new(
            Arc::new(SystemClock),
            Arc::new(FixedRand::new(1)),
            store,
            bus.clone(),
            drivers,
            vec![],
            EngineConfig::default(),
        );
        tokio::spawn(run_importer(engine.clone(), rx_a));

        let vote = Vote {
            uid: Uuid::new_v4(),
            node_uid: Uuid::new_v4(),
            application_uid: Uuid::new_v4(),
            round: 0,
            available: 0,
            rule_result: 0,
            rand: 7,
            created_at: chrono::Utc::now(),
        };
        // Publish directly on the bus (simulating a remote peer) rather than
        // through `bus.send_vote`, which this engine itself owns.
        bus.tx.send(ClusterMessage::Vote(vote.clone())).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stored = engine.votes_for(vote.application_uid, 0);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].uid, vote.uid);
    }
}

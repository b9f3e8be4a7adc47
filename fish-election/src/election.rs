use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::engine::{Engine, ELECTION_POLL_INTERVAL, ELECTION_ROUND_TIME};
use crate::model::{Application, Label, Status, Vote};
use crate::selection::select_winner;

fn round_index(application: &Application, now: DateTime<Utc>) -> u32 {
    let elapsed = (now - application.created_at).num_seconds() + 1;
    (elapsed.max(0) as u64 / ELECTION_ROUND_TIME.as_secs()) as u32
}

fn round_ends_at(application: &Application, round: u32) -> DateTime<Utc> {
    application.created_at
        + chrono::Duration::seconds((round as i64 + 1) * ELECTION_ROUND_TIME.as_secs() as i64)
}

fn until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}

/// One long-running task per NEW/ELECTED Application (C7, I1). Runs until
/// the Application's latest state is neither `NEW` nor `ELECTED` (including
/// `ALLOCATED`, at which point its job — getting the Application elected —
/// is done) or the Application/Label vanish.
pub async fn run(engine: Arc<Engine>, application_uid: Uuid) {
    let application = match engine.store.application_get(application_uid).await {
        Ok(Some(application)) => application,
        Ok(None) => {
            tracing::warn!(%application_uid, "application missing, dropping election");
            return;
        }
        Err(error) => {
            tracing::warn!(%application_uid, %error, "store error loading application");
            return;
        }
    };
    let label = match engine.store.label_get(application.label_uid).await {
        Ok(Some(label)) => label,
        Ok(None) => {
            tracing::warn!(%application_uid, "label missing, dropping election");
            return;
        }
        Err(error) => {
            tracing::warn!(%application_uid, %error, "store error loading label");
            return;
        }
    };

    loop {
        let now = engine.clock.now();
        let round = round_index(&application, now);
        let ends_at = round_ends_at(&application, round);

        let latest = match engine
            .store
            .application_state_get_by_application(application_uid)
            .await
        {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::warn!(%application_uid, "state missing, dropping election");
                return;
            }
            Err(error) => {
                tracing::warn!(%application_uid, %error, "store error loading state");
                return;
            }
        };

        match latest.status {
            Status::Elected => {
                let waited_rounds = ((now - latest.created_at).num_seconds()
                    / ELECTION_ROUND_TIME.as_secs() as i64)
                    .max(0) as u32;
                let rounds_to_wait = engine
                    .config
                    .elected_rounds_to_wait
                    .saturating_sub(waited_rounds);
                if rounds_to_wait > 0 {
                    wait_out_election(&engine, application_uid, &latest, ends_at).await;
                    continue;
                }
                // Wait counter reached zero with state still ELECTED: the
                // executor is presumed dead. Run a fresh round without
                // touching the Application's status (it remains ELECTED;
                // nobody reverts it to NEW, per §4.7.c).
                tracing::info!(%application_uid, "elected executor presumed dead, re-electing");
                vote_round(&engine, &application, &label, round, ends_at).await;
            }
            Status::New => {
                vote_round(&engine, &application, &label, round, ends_at).await;
            }
            _ => {
                tracing::debug!(%application_uid, status = %latest.status, "leaving election-relevant states");
                return;
            }
        }
    }
}

/// Polls every 5s while a state remains `ELECTED` and the waiting window has
/// not elapsed, watching for a fresh `ELECTED` row (a new winner resets the
/// wait) so the outer loop can resynchronize against it.
async fn wait_out_election(
    engine: &Arc<Engine>,
    application_uid: Uuid,
    seen: &crate::model::ApplicationState,
    ends_at: DateTime<Utc>,
) {
    loop {
        let now = engine.clock.now();
        if now >= ends_at {
            return;
        }
        tokio::time::sleep(until(ends_at, now).min(ELECTION_POLL_INTERVAL)).await;
        match engine
            .store
            .application_state_get_by_application(application_uid)
            .await
        {
            Ok(Some(state)) if state.uid == seen.uid && state.status == Status::Elected => {
                continue;
            }
            _ => return,
        }
    }
}

/// Runs one full voting round (§4.7.d-h): emit a vote, poll for consensus,
/// resolve the winner, then sleep out the remainder of the round so every
/// node stays aligned to the same 30-second windows.
async fn vote_round(engine: &Arc<Engine>, application: &Application, label: &Label, round: u32, ends_at: DateTime<Utc>) {
    let available = engine
        .capacity
        .is_node_available_for_definitions(&label.definitions, &engine.drivers);
    let vote = Vote {
        uid: engine.store.new_uid(),
        node_uid: engine.store.node_uid(),
        application_uid: application.uid,
        round,
        available,
        rule_result: 0,
        rand: engine.rand.next_u32(),
        created_at: engine.clock.now(),
    };
    engine.votes.storage_add([vote.clone()]);
    engine.votes.active_set(vote.clone());
    engine.cluster.send_vote(&vote).await;

    let mut winner = None;
    loop {
        let now = engine.clock.now();
        if now >= ends_at {
            break;
        }
        let nodes = engine.store.node_active_list().await.unwrap_or_default();
        let votes = engine.votes.list_by_app_round(application.uid, round);
        if votes.len() >= nodes.len().max(1) {
            winner = select_winner(&votes);
            if winner.is_some() {
                break;
            }
        }
        tokio::time::sleep(until(ends_at, now).min(ELECTION_POLL_INTERVAL)).await;
    }

    match &winner {
        Some(winner) if winner.node_uid == engine.store.node_uid() => {
            engine.votes.won_add(winner.clone());
            if let Err(error) = engine
                .submit_state(
                    application.uid,
                    Status::Elected,
                    format!("Elected node: {}", engine.store.node_name()),
                )
                .await
            {
                tracing::warn!(application_uid = %application.uid, %error, "failed to record election win");
            }
        }
        Some(winner) => {
            tracing::debug!(application_uid = %application.uid, winner = %winner.node_uid, "lost round, waiting on peer");
        }
        None => {
            tracing::debug!(application_uid = %application.uid, round, "round inconclusive or lost, retrying");
        }
    }
    engine.votes.storage_cleanup();

    let now = engine.clock.now();
    if ends_at > now {
        tokio::time::sleep(until(ends_at, now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(available: i32, rule_result: i32, rand: u32) -> Vote {
        Vote {
            uid: Uuid::new_v4(),
            node_uid: Uuid::new_v4(),
            application_uid: Uuid::new_v4(),
            round: 0,
            available,
            rule_result,
            rand,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_negative_available() {
        let votes = vec![vote(-1, 0, 1), vote(-1, 0, 2)];
        assert!(select_winner(&votes).is_none());
    }

    #[test]
    fn lowest_tuple_wins() {
        let votes = vec![vote(0, 0, 9), vote(0, 0, 1), vote(1, 0, 0)];
        let winner = select_winner(&votes).unwrap();
        assert_eq!(winner.rand, 1);
    }

    #[test]
    fn exact_tie_is_inconclusive() {
        let votes = vec![vote(0, 0, 5), vote(0, 0, 5)];
        assert!(select_winner(&votes).is_none());
    }

    #[test]
    fn winner_selection_is_permutation_invariant() {
        let votes = vec![vote(2, 0, 3), vote(0, 1, 9), vote(0, 0, 4), vote(-1, 0, 0)];
        let mut shuffled = votes.clone();
        shuffled.reverse();
        assert_eq!(select_winner(&votes), select_winner(&shuffled));
    }
}

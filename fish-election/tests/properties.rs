//! Property tests for vote selection and the Vote Store (P1, P2), driven
//! with `proptest` the way `seanchatmangpt-knhk`'s workflow-engine crate
//! drives its own state-machine invariants.

use chrono::Utc;
use fish_election::model::Vote;
use fish_election::votes::VoteStore;
use proptest::prelude::*;
use uuid::Uuid;

fn vote(application_uid: Uuid, available: i32, rule_result: i32, rand: u32) -> Vote {
    Vote {
        uid: Uuid::new_v4(),
        node_uid: Uuid::new_v4(),
        application_uid,
        round: 0,
        available,
        rule_result,
        rand,
        created_at: Utc::now(),
    }
}

fn select_winner(votes: &[Vote]) -> Option<(i32, i32, u32)> {
    let mut eligible: Vec<&Vote> = votes.iter().filter(|v| v.available >= 0).collect();
    if eligible.is_empty() {
        return None;
    }
    eligible.sort_by_key(|v| v.rank_key());
    if eligible.len() >= 2 && eligible[0].rank_key() == eligible[1].rank_key() {
        return None;
    }
    Some(eligible[0].rank_key())
}

fn arb_vote_tuple() -> impl Strategy<Value = (i32, i32, u32)> {
    (-2i32..4, 0i32..3, 0u32..6)
}

proptest! {
    /// P1: best-vote selection is invariant under permutation of the input
    /// vote list.
    #[test]
    fn selection_is_permutation_invariant(tuples in proptest::collection::vec(arb_vote_tuple(), 1..10)) {
        let application_uid = Uuid::new_v4();
        let votes: Vec<Vote> = tuples
            .into_iter()
            .map(|(available, rule_result, rand)| vote(application_uid, available, rule_result, rand))
            .collect();
        let mut shuffled = votes.clone();
        shuffled.reverse();
        prop_assert_eq!(select_winner(&votes), select_winner(&shuffled));
    }

    /// P2: StorageAdd is idempotent.
    #[test]
    fn storage_add_idempotent(available in any::<i32>(), rand in any::<u32>()) {
        let store = VoteStore::new();
        let application_uid = Uuid::new_v4();
        let v = vote(application_uid, available, 0, rand);
        store.storage_add([v.clone(), v.clone(), v]);
        prop_assert_eq!(store.list_by_app_round(application_uid, 0).len(), 1);
    }
}

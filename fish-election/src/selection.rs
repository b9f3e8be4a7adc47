use crate::model::Vote;

/// Deterministic tie-break (§4.7.f): reject `available < 0`, then order the
/// rest by `(available, rule_result, rand)` ascending. A tie on the leading
/// two entries makes the round inconclusive (`None`).
pub fn select_winner(votes: &[Vote]) -> Option<Vote> {
    let mut eligible: Vec<&Vote> = votes.iter().filter(|v| v.available >= 0).collect();
    if eligible.is_empty() {
        return None;
    }
    eligible.sort_by_key(|v| v.rank_key());
    if eligible.len() >= 2 && eligible[0].rank_key() == eligible[1].rank_key() {
        return None;
    }
    Some(eligible[0].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

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
        assert!(select_winner(&[vote(-1, 0, 1), vote(-1, 0, 2)]).is_none());
    }

    #[test]
    fn lowest_tuple_wins() {
        let votes = [vote(0, 0, 9), vote(0, 0, 1), vote(1, 0, 0)];
        assert_eq!(select_winner(&votes).unwrap().rand, 1);
    }

    #[test]
    fn exact_tie_is_inconclusive() {
        assert!(select_winner(&[vote(0, 0, 5), vote(0, 0, 5)]).is_none());
    }
}

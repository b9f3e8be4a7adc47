use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row per (Node, Application, Round). `available < 0` means "cannot
/// serve this Application"; otherwise it is the chosen `LabelDefinition`
/// index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub uid: Uuid,
    pub node_uid: Uuid,
    pub application_uid: Uuid,
    pub round: u32,
    pub available: i32,
    /// Reserved for future policy scoring (§9 Open Question); no writer in
    /// this crate sets it to anything but zero.
    pub rule_result: i32,
    pub rand: u32,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    /// Sort/tie-break key used by best-vote selection (§4.7.f): ascending
    /// `(available, rule_result, rand)`.
    pub fn rank_key(&self) -> (i32, i32, u32) {
        (self.available, self.rule_result, self.rand)
    }
}

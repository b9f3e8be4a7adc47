use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `ApplicationState.Status` wire strings are exact (§6.4): `NEW`, `ELECTED`,
/// `ALLOCATED`, `DEALLOCATE`, `DEALLOCATED`, `RECALLED`, `ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    New,
    Elected,
    Allocated,
    Deallocate,
    Deallocated,
    Recalled,
    Error,
}

impl Status {
    /// Active iff not in {ERROR, DEALLOCATE, DEALLOCATED, RECALLED} (§3 I-note).
    pub fn is_active(self) -> bool {
        !matches!(
            self,
            Status::Error | Status::Deallocate | Status::Deallocated | Status::Recalled
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::New => "NEW",
            Status::Elected => "ELECTED",
            Status::Allocated => "ALLOCATED",
            Status::Deallocate => "DEALLOCATE",
            Status::Deallocated => "DEALLOCATED",
            Status::Recalled => "RECALLED",
            Status::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Append-only event log entry. The latest row per `application_uid` (by
/// `created_at`) is the application's current status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationState {
    pub uid: Uuid,
    pub application_uid: Uuid,
    pub status: Status,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Fields a caller supplies when appending a fresh state locally; `uid` and
/// `created_at` are filled in by the State Store (§4.6 `ApplicationStateCreate`).
#[derive(Debug, Clone)]
pub struct NewApplicationState {
    pub application_uid: Uuid,
    pub status: Status,
    pub description: String,
}

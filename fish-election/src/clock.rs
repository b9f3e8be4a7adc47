use chrono::{DateTime, Utc};

/// Injected wall clock (C1), grounded on the teacher's habit of threading
/// collaborators like `&slog::Logger` through constructors instead of reading
/// global state. Production code uses [`SystemClock`]; tests inject a fake so
/// 30-second election rounds don't require real sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Per-vote 32-bit randomness (C1). Does not need cryptographic strength but
/// must differ across nodes with overwhelming probability.
pub trait Rand: Send + Sync {
    fn next_u32(&self) -> u32;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRand;

impl Rand for SystemRand {
    fn next_u32(&self) -> u32 {
        rand::random()
    }
}

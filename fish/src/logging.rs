//! Structured logging setup (§6.6). The teacher's oldest modules built on
//! `slog`; its newer ceremony machinery standardized on `tracing`, which is
//! what this rework uses throughout (see `SPEC_FULL.md` §6.6). Every
//! Election/Execution Worker span carries `component` and `application_uid`
//! fields, mirroring the teacher's `COMPONENT_KEY`/`CEREMONY_ID_KEY` logging
//! keys from `engine/src/logging.rs`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging key constants, named the way the teacher names theirs
/// (`COMPONENT_KEY`) so span/field names stay consistent across workers.
pub const COMPONENT_KEY: &str = "component";
pub const APPLICATION_UID_KEY: &str = "application_uid";

/// Initializes the global `tracing` subscriber. `json` selects
/// machine-readable output (for production log shipping); otherwise a
/// compact human-readable format is used (for local runs/dev).
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

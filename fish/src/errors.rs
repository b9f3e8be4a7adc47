//! Top-level error type for the node process, grounded on the teacher's
//! `engine/src/errors.rs` habit of wrapping every component-boundary error
//! in one binary-level enum rather than propagating each library's own
//! error type through `main`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FishError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid duration setting: {0}")]
    Duration(#[from] fish_election::DurationParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

//! Error taxonomy and process exit codes.
//!
//! Most functions propagate `anyhow::Result`; the variants here exist so the
//! CLI layer can tell a bad configuration apart from an ordinary failure when
//! choosing an exit code.

use thiserror::Error;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_BAD_USAGE: i32 = 2;
pub const EXIT_BAD_CONFIG: i32 = 3;

#[derive(Debug, Error)]
pub enum TransitError {
    /// Missing or invalid user configuration (API key, location slug).
    #[error("{0}")]
    Config(String),

    /// An upstream agency API answered with a non-success status.
    #[error("upstream request failed with status {0}")]
    UpstreamStatus(reqwest::StatusCode),

    /// The migrations ledger does not line up with the known changeset list.
    #[error("corrupt migrations ledger: expected '{expected}' at position {position}, found '{found}'")]
    CorruptMigrations {
        position: usize,
        expected: String,
        found: String,
    },
}

/// Maps an error chain to a process exit code: 3 for configuration problems,
/// 1 for everything else. (Usage errors exit 2 via clap before this runs.)
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<TransitError>() {
        Some(TransitError::Config(_)) => EXIT_BAD_CONFIG,
        _ => EXIT_FAILURE,
    }
}

//! Error taxonomy for the serving loop.
//!
//! Selection and navigation outcomes are explicit variants callers
//! pattern-match on, not catch-all failures: running out of normal work
//! and running out of history are expected states of a long annotation
//! session.

use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by `ask` and `save_annotation`
#[derive(Debug, Error)]
pub enum ServeError {
    /// No unannotated normal item remains in the current pass.
    ///
    /// Terminal for the normal track of this run; control probes can
    /// still fire, but the manager stops offering forward work.
    #[error("no unannotated item remains in the normal set")]
    Exhausted,

    /// A backward navigation request went past the start of the session.
    #[error("history depth {requested} exceeds the {recorded} entries recorded")]
    EndedHistory { requested: usize, recorded: usize },

    /// A blob record is missing geometry or its parent page path.
    ///
    /// Fatal for that single item only; the manager logs and skips it.
    #[error("malformed blob record {path}: {reason}")]
    MalformedRecord { path: PathBuf, reason: String },

    /// Persistence or rendering I/O failure; the item is not marked served.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ServeError::EndedHistory {
            requested: 7,
            recorded: 3,
        };
        assert_eq!(
            err.to_string(),
            "history depth 7 exceeds the 3 entries recorded"
        );

        let err = ServeError::Exhausted;
        assert!(err.to_string().contains("no unannotated item"));
    }
}

//! Append-only ledger of served items.
//!
//! Every successful forward serve is recorded here so the annotator can
//! navigate backward without re-running selection. Entries are indexed
//! from the end (1 = most recent) and never deleted; the ledger lives
//! and dies with the process.

use std::path::{Path, PathBuf};

use super::error::ServeError;

/// One served item: which record, and whether it was a control probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub record_path: PathBuf,
    pub is_control: bool,
}

/// Ordered record of everything served this session
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a served item. O(1), no deduplication.
    pub fn record(&mut self, record_path: &Path, is_control: bool) {
        self.entries.push(HistoryEntry {
            record_path: record_path.to_path_buf(),
            is_control,
        });
    }

    /// Get the k-th most recent entry (1 = most recent).
    ///
    /// Fails with `EndedHistory` when `k` is zero or exceeds the number
    /// of entries recorded so far.
    pub fn get(&self, k: usize) -> Result<&HistoryEntry, ServeError> {
        if k == 0 || k > self.entries.len() {
            return Err(ServeError::EndedHistory {
                requested: k,
                recorded: self.entries.len(),
            });
        }
        Ok(&self.entries[self.entries.len() - k])
    }

    /// Number of entries recorded
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether anything has been served yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_get_from_end() {
        let mut history = History::new();
        history.record(Path::new("a.json"), false);
        history.record(Path::new("b.json"), true);
        history.record(Path::new("c.json"), false);

        assert_eq!(history.len(), 3);
        assert_eq!(history.get(1).unwrap().record_path, PathBuf::from("c.json"));
        assert_eq!(history.get(2).unwrap().record_path, PathBuf::from("b.json"));
        assert!(history.get(2).unwrap().is_control);
        assert_eq!(history.get(3).unwrap().record_path, PathBuf::from("a.json"));
    }

    #[test]
    fn test_depth_past_start_fails() {
        let mut history = History::new();
        history.record(Path::new("a.json"), false);

        let err = history.get(2).unwrap_err();
        assert!(matches!(
            err,
            ServeError::EndedHistory {
                requested: 2,
                recorded: 1
            }
        ));
    }

    #[test]
    fn test_zero_depth_is_out_of_range() {
        let history = History::new();
        assert!(matches!(
            history.get(0),
            Err(ServeError::EndedHistory { .. })
        ));
    }
}

//! File-backed persistence.
//!
//! This module contains:
//! - annotations: Field reads/writes against per-blob JSON records
//! - split: The persisted control/normal corpus partition
//! - rating_table: Shared annotator rating sequences with file locking

pub mod annotations;
pub mod rating_table;
pub mod split;

// Re-export commonly used types
pub use annotations::discover_records;
pub use rating_table::RatingTable;
pub use split::CorpusSplit;

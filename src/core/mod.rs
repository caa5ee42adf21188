//! Core serving logic.
//!
//! This module contains:
//! - WorkSelector: Next-item selection with control-probe interleaving
//! - History: Append-only ledger of served items for backward navigation
//! - rating: Self/inter-annotator consistency scoring
//! - AnnotationManager: The composed stateful object the serving layer
//!   talks to

pub mod error;
pub mod history;
pub mod manager;
pub mod rating;
pub mod selector;

// Re-export commonly used types
pub use error::ServeError;
pub use history::{History, HistoryEntry};
pub use manager::{AnnotationManager, ManagerOptions};
pub use selector::{Selected, WorkSelector};

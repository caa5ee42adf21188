//! Domain types for the blobmark serving loop.
//!
//! This module contains the core data structures:
//! - BlobRecord: One candidate symbol region plus its annotation fields
//! - Served: An item handed to the presentation layer
//! - RatingEvent: A freshly computed annotator trust score

pub mod blob;
pub mod served;

// Re-export commonly used types
pub use blob::BlobRecord;
pub use served::{RatingEvent, Served};

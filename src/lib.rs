//! blobmark - annotation-serving loop for music-score blob datasets
//!
//! Serves small cropped regions ("blobs") from scanned score pages to a
//! human annotator, one at a time, and records their labels. Hidden
//! control items are interleaved at random intervals and re-shown over
//! time, which lets the tool compute a live trust score per annotator
//! without any ground-truth labels.
//!
//! # Architecture
//!
//! - `domain`: Data structures (BlobRecord, Served, RatingEvent)
//! - `core`: Serving logic (WorkSelector, History, rating engine,
//!   AnnotationManager)
//! - `store`: File-backed persistence (blob records, corpus split,
//!   annotator rating table)
//! - `render`: Highlighted crop / page artifacts for the presentation layer
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Label blobs interactively
//! blobmark annotate
//!
//! # Show annotation progress across the corpus
//! blobmark stats
//!
//! # Inspect the persisted control/normal split
//! blobmark split
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod render;
pub mod store;

// Re-export main types at crate root for convenience
pub use crate::core::{AnnotationManager, History, ManagerOptions, ServeError, WorkSelector};
pub use crate::domain::{BlobRecord, RatingEvent, Served};
pub use crate::render::{BlobRenderer, RenderContext};
pub use crate::store::{CorpusSplit, RatingTable};

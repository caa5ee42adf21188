//! Shared annotator rating table.
//!
//! Maps each annotator to one rating sequence per control item:
//! `annotators[name][control_index]` is the ordered list of labels that
//! annotator gave `control[control_index]` across repeated exposures.
//! Grows only by appension. The file is shared across annotator
//! processes, so every read-modify-write happens under an advisory
//! exclusive lock on a sidecar lock file.
//!
//! Invariant: the outer Vec is indexed by control-item position, which is
//! only meaningful because the persisted corpus split is immutable. If
//! control items ever become dynamic, this table must be re-keyed by
//! item identity.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Per-annotator control-item rating sequences
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RatingTable {
    #[serde(flatten)]
    pub annotators: BTreeMap<String, Vec<Vec<f64>>>,
}

impl RatingTable {
    /// Make sure an annotator has a slot per control item.
    ///
    /// New annotators start with `control_length` empty sequences; known
    /// annotators whose table predates a longer control set are padded.
    pub fn ensure_annotator(&mut self, annotator: &str, control_length: usize) {
        let series = self
            .annotators
            .entry(annotator.to_string())
            .or_insert_with(|| vec![Vec::new(); control_length]);
        if series.len() < control_length {
            series.resize(control_length, Vec::new());
        }
    }

    /// Append one rating to an annotator's sequence for a control item
    pub fn append(&mut self, annotator: &str, control_index: usize, value: f64) -> Result<()> {
        let series = self
            .annotators
            .get_mut(annotator)
            .with_context(|| format!("Unknown annotator: {annotator}"))?;
        let ratings = series
            .get_mut(control_index)
            .with_context(|| format!("Control index {control_index} out of range"))?;
        ratings.push(value);
        Ok(())
    }

    /// Load a table, empty if no file exists yet
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read rating table: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse rating table: {}", path.display()))
    }

    /// Save the table to disk
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write rating table: {}", path.display()))?;

        Ok(())
    }

    /// Locked read-modify-write against the shared table file.
    ///
    /// Holds an exclusive advisory lock on `<path>.lock` for the whole
    /// load-mutate-save cycle and returns the updated table.
    pub async fn update<F>(path: &Path, mutate: F) -> Result<Self>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let lock_path = path.with_extension("json.lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
        lock_file
            .lock_exclusive()
            .with_context(|| format!("Failed to lock rating table: {}", lock_path.display()))?;

        let result = async {
            let mut table = Self::load(path).await?;
            mutate(&mut table)?;
            table.save(path).await?;
            Ok(table)
        }
        .await;

        // Released on drop as well; unlock explicitly to surface errors
        let _ = lock_file.unlock();
        result
    }
}

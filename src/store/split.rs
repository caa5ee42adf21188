//! Persisted control/normal corpus partition.
//!
//! The corpus is shuffled once with a seeded generator and split into a
//! fixed control prefix and the normal remainder. The split is written
//! to disk on first run and loaded verbatim afterwards, so control-item
//! positions stay stable across restarts (the rating table is keyed by
//! those positions).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

/// The immutable-after-init corpus partition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusSplit {
    /// Control probes, served round-robin; fixed membership and order
    pub control: Vec<PathBuf>,

    /// Shuffled remainder; the actual data-collection targets
    pub normal: Vec<PathBuf>,
}

impl CorpusSplit {
    /// Partition a corpus: shuffle, then cut off the control prefix.
    ///
    /// `control_length` is clamped to the corpus size.
    pub fn partition(mut items: Vec<PathBuf>, control_length: usize, rng: &mut StdRng) -> Self {
        items.shuffle(rng);
        let cut = control_length.min(items.len());
        let normal = items.split_off(cut);
        Self {
            control: items,
            normal,
        }
    }

    /// Load a persisted split, if one exists
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read corpus split: {}", path.display()))?;

        let split = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse corpus split: {}", path.display()))?;
        Ok(Some(split))
    }

    /// Save the split to disk
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write corpus split: {}", path.display()))?;

        Ok(())
    }

    /// Load the persisted split, or partition the corpus and persist it.
    pub async fn load_or_create(
        path: &Path,
        items: Vec<PathBuf>,
        control_length: usize,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if let Some(split) = Self::load(path).await? {
            info!(
                control = split.control.len(),
                normal = split.normal.len(),
                "Loaded persisted corpus split"
            );
            return Ok(split);
        }

        let split = Self::partition(items, control_length, rng);
        split.save(path).await?;
        info!(
            control = split.control.len(),
            normal = split.normal.len(),
            "Partitioned corpus and persisted split"
        );
        Ok(split)
    }

    /// Total corpus size
    pub fn len(&self) -> usize {
        self.control.len() + self.normal.len()
    }

    /// Whether the corpus is empty
    pub fn is_empty(&self) -> bool {
        self.control.is_empty() && self.normal.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn corpus(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("blob{i}.json"))).collect()
    }

    #[test]
    fn test_partition_is_lossless_and_disjoint() {
        let items = corpus(50);
        let mut rng = StdRng::seed_from_u64(1992);
        let split = CorpusSplit::partition(items.clone(), 10, &mut rng);

        assert_eq!(split.control.len(), 10);
        assert_eq!(split.normal.len(), 40);

        let control: BTreeSet<_> = split.control.iter().collect();
        let normal: BTreeSet<_> = split.normal.iter().collect();
        assert!(control.is_disjoint(&normal));

        let all: BTreeSet<_> = items.iter().collect();
        let rejoined: BTreeSet<_> = control.union(&normal).copied().collect();
        assert_eq!(all, rejoined);
    }

    #[test]
    fn test_partition_is_seed_deterministic() {
        let mut rng_a = StdRng::seed_from_u64(1992);
        let mut rng_b = StdRng::seed_from_u64(1992);
        let a = CorpusSplit::partition(corpus(30), 5, &mut rng_a);
        let b = CorpusSplit::partition(corpus(30), 5, &mut rng_b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_control_length_clamped_to_corpus() {
        let mut rng = StdRng::seed_from_u64(1);
        let split = CorpusSplit::partition(corpus(3), 10, &mut rng);
        assert_eq!(split.control.len(), 3);
        assert!(split.normal.is_empty());
    }

    #[tokio::test]
    async fn test_reload_yields_identical_membership() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("split.json");
        let mut rng = StdRng::seed_from_u64(1992);

        let created = CorpusSplit::load_or_create(&path, corpus(20), 4, &mut rng)
            .await
            .unwrap();

        // A second load_or_create must not re-shuffle, whatever the rng state
        let mut other_rng = StdRng::seed_from_u64(7);
        let reloaded = CorpusSplit::load_or_create(&path, corpus(20), 4, &mut other_rng)
            .await
            .unwrap();

        assert_eq!(created, reloaded);
    }

    #[tokio::test]
    async fn test_load_absent_split() {
        let temp = TempDir::new().unwrap();
        let loaded = CorpusSplit::load(&temp.path().join("split.json"))
            .await
            .unwrap();
        assert!(loaded.is_none());
    }
}

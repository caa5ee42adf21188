//! Next-item selection.
//!
//! Each call is one Bernoulli draw: with probability 1/control_freq the
//! selector serves the next control probe round-robin; otherwise it scans
//! the shuffled normal ordering from a low-water cursor for the first
//! record with no label yet. The cursor occasionally resets to 0 so items
//! annotated out of order by concurrent sessions (which would otherwise
//! stay skipped until the corpus ends) are eventually revisited.
//!
//! The control draw and the reset draw are independent per-call trials;
//! nothing persists between calls besides the two cursors.

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info};

use crate::store::{annotations, CorpusSplit};

use super::error::ServeError;

/// Per-call probability of resetting the normal cursor to 0
pub const RESET_PROBABILITY: f64 = 0.001;

/// One selection decision
#[derive(Debug, Clone)]
pub struct Selected {
    /// The record to serve
    pub record_path: PathBuf,

    /// Whether it came from the control set
    pub is_control: bool,
}

/// Chooses which item to serve next
#[derive(Debug)]
pub struct WorkSelector {
    /// Record field whose absence marks an item as pending
    annotation_field: String,

    /// Per-call probability of serving a control probe
    control_probability: f64,

    /// Per-call probability of the skip-recovery cursor reset
    reset_probability: f64,

    /// Low-water mark into the normal ordering; items below it are
    /// assumed annotated (possibly stale, hence the periodic reset)
    normal_cursor: usize,

    /// Most recently served control index, None before the first probe
    last_control: Option<usize>,
}

impl WorkSelector {
    /// Create a selector with the standard reset probability
    pub fn new(annotation_field: impl Into<String>, control_probability: f64) -> Self {
        Self::with_reset_probability(annotation_field, control_probability, RESET_PROBABILITY)
    }

    /// Create a selector with an explicit reset probability (tests force 0)
    pub fn with_reset_probability(
        annotation_field: impl Into<String>,
        control_probability: f64,
        reset_probability: f64,
    ) -> Self {
        Self {
            annotation_field: annotation_field.into(),
            control_probability,
            reset_probability,
            normal_cursor: 0,
            last_control: None,
        }
    }

    /// Index of the most recently served control item
    pub fn last_control_index(&self) -> Option<usize> {
        self.last_control
    }

    /// Reset the low-water mark, forcing a full re-scan on the next call
    pub fn reset_normal_cursor(&mut self) {
        self.normal_cursor = 0;
    }

    /// Pick the next item to serve.
    ///
    /// `Exhausted` is terminal for the normal track: every normal item
    /// carries a label (modulo external store mutation). Control probes
    /// can still fire on later calls.
    pub async fn select_next(
        &mut self,
        split: &CorpusSplit,
        rng: &mut StdRng,
    ) -> Result<Selected, ServeError> {
        // The decision to serve a probe is random; which probe is not.
        let control_draw = rng.gen::<f64>() < self.control_probability;
        if control_draw && !split.control.is_empty() {
            let next = match self.last_control {
                Some(current) => (current + 1) % split.control.len(),
                None => 0,
            };
            self.last_control = Some(next);
            debug!(control_index = next, "serving control probe");
            return Ok(Selected {
                record_path: split.control[next].clone(),
                is_control: true,
            });
        }

        if rng.gen::<f64>() < self.reset_probability {
            debug!("resetting normal cursor to recover skipped items");
            self.normal_cursor = 0;
        }

        let start = self.normal_cursor.min(split.normal.len());
        for (offset, path) in split.normal[start..].iter().enumerate() {
            if annotations::read_field(path, &self.annotation_field)
                .await?
                .is_none()
            {
                self.normal_cursor = start + offset + 1;
                info!(
                    cursor = self.normal_cursor,
                    total = split.normal.len(),
                    "advanced normal cursor"
                );
                return Ok(Selected {
                    record_path: path.clone(),
                    is_control: false,
                });
            }
        }

        Err(ServeError::Exhausted)
    }
}

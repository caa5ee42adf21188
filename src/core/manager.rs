//! The composed annotation manager.
//!
//! Owns the selector, the history ledger, the renderer, and the paths of
//! the shared stores, and exposes the three operations the serving layer
//! needs: `ask` for the next (or a historical) item, `save_annotation`
//! for a submitted label, and the one-shot rating event.
//!
//! Not safe for concurrent mutation: one serving layer owns the manager
//! and serializes `ask`/`save_annotation` pairs. The persisted stores are
//! still shared across processes; the rating table is file-locked and
//! skipped normal items are eventually recovered by the selector's
//! periodic cursor reset.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::config::ResolvedConfig;
use crate::domain::{BlobRecord, RatingEvent, Served};
use crate::render::BlobRenderer;
use crate::store::{annotations, CorpusSplit, RatingTable};

use super::error::ServeError;
use super::history::History;
use super::rating;
use super::selector::WorkSelector;

/// Construction-time settings for an `AnnotationManager`
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Record field labels are written to
    pub annotation_field: String,

    /// Identity of the person labeling
    pub annotator: String,

    /// Number of corpus items reserved as control probes
    pub control_length: usize,

    /// Denominator of the per-serve control probability
    pub control_freq: u32,

    /// Pixel margin around the cropped render
    pub enlarge: u32,

    /// Seed for the corpus shuffle and the serving draws
    pub seed: u64,

    /// Persisted control/normal split
    pub split_path: PathBuf,

    /// Shared annotator rating table
    pub table_path: PathBuf,

    /// Directory render artifacts are written to
    pub static_dir: PathBuf,
}

impl ManagerOptions {
    /// Derive options from the resolved configuration
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let annotation = &config.annotation;
        Self {
            annotation_field: annotation.field.clone(),
            annotator: annotation.annotator.clone(),
            control_length: annotation.control_length,
            control_freq: annotation.control_freq,
            enlarge: annotation.enlarge,
            seed: annotation.seed,
            split_path: config.home.join("split.json"),
            table_path: config.home.join("ratings.json"),
            static_dir: config.home.join("static"),
        }
    }
}

/// The stateful object the serving layer talks to
pub struct AnnotationManager {
    annotation_field: String,
    annotator: String,

    /// Actual control set size (clamped by the corpus)
    control_length: usize,
    enlarge: u32,

    split: CorpusSplit,
    selector: WorkSelector,
    history: History,
    renderer: BlobRenderer,
    table_path: PathBuf,
    rng: StdRng,

    /// Every score computed for this annotator this process
    ratings: Vec<String>,

    /// Single-slot event, consumed by `take_rating_event`
    rating_event: Option<RatingEvent>,
}

impl AnnotationManager {
    /// Open a manager over a corpus of blob record paths.
    ///
    /// Loads the persisted split (or partitions the corpus and persists
    /// it), registers the annotator in the shared rating table, and
    /// scores any control ratings they already accumulated in earlier
    /// sessions.
    pub async fn open(options: ManagerOptions, corpus: Vec<PathBuf>) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(options.seed);
        let split = CorpusSplit::load_or_create(
            &options.split_path,
            corpus,
            options.control_length,
            &mut rng,
        )
        .await?;
        let control_length = split.control.len();

        let annotator = options.annotator.clone();
        let table = RatingTable::update(&options.table_path, |table| {
            table.ensure_annotator(&annotator, control_length);
            Ok(())
        })
        .await?;

        let control_probability = 1.0 / f64::from(options.control_freq.max(1));
        let mut manager = Self {
            selector: WorkSelector::new(&options.annotation_field, control_probability),
            renderer: BlobRenderer::new(&options.static_dir)?,
            annotation_field: options.annotation_field,
            annotator: options.annotator,
            control_length,
            enlarge: options.enlarge,
            split,
            history: History::new(),
            table_path: options.table_path,
            rng,
            ratings: Vec::new(),
            rating_event: None,
        };

        if let Some(score) = rating::compute(&table, &manager.annotator) {
            manager.push_rating(score);
        }

        Ok(manager)
    }

    /// Serve the next item, or re-serve a historical one.
    ///
    /// `None` runs selection, records the result in history, and renders
    /// it; `Some(k)` re-renders the k-th most recently served item
    /// (1 = most recent) without touching selection state or history.
    pub async fn ask(&mut self, index: Option<usize>) -> Result<Served, ServeError> {
        match index {
            None => self.serve_next().await,
            Some(k) => self.replay(k).await,
        }
    }

    async fn serve_next(&mut self) -> Result<Served, ServeError> {
        loop {
            let selected = self.selector.select_next(&self.split, &mut self.rng).await?;

            let record = match BlobRecord::load(&selected.record_path).await {
                Ok(record) => record,
                Err(ServeError::MalformedRecord { path, reason }) => {
                    warn!(record = %path.display(), %reason, "skipping malformed blob record");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let render = match self.renderer.render(&record, self.enlarge) {
                Ok(context) => context,
                Err(ServeError::MalformedRecord { path, reason }) => {
                    warn!(record = %path.display(), %reason, "skipping unrenderable blob record");
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.history.record(&selected.record_path, selected.is_control);
            return Ok(Served {
                record_path: selected.record_path,
                is_control: selected.is_control,
                render,
            });
        }
    }

    async fn replay(&mut self, k: usize) -> Result<Served, ServeError> {
        let entry = self.history.get(k)?;
        let (record_path, is_control) = (entry.record_path.clone(), entry.is_control);

        let record = BlobRecord::load(&record_path).await?;
        let render = self.renderer.render(&record, self.enlarge)?;

        Ok(Served {
            record_path,
            is_control,
            render,
        })
    }

    /// Record a submitted label and release the serve's artifacts.
    ///
    /// Control items append to the shared rating table and re-score the
    /// annotator; normal items write the label into the blob record. Any
    /// failure leaves the item unserved from the store's point of view.
    pub async fn save_annotation(
        &mut self,
        record_path: &Path,
        is_control: bool,
        value: f64,
        unique_id: &str,
    ) -> Result<()> {
        if is_control {
            let control_index = self
                .selector
                .last_control_index()
                .context("control annotation before any control serve")?;
            let annotator = self.annotator.clone();
            let control_length = self.control_length;

            let table = RatingTable::update(&self.table_path, move |table| {
                table.ensure_annotator(&annotator, control_length);
                table.append(&annotator, control_index, value)
            })
            .await?;

            if let Some(score) = rating::compute(&table, &self.annotator) {
                self.push_rating(score);
            }
        } else {
            annotations::write_field(record_path, &self.annotation_field, value, &self.annotator)
                .await?;
        }

        self.renderer.cleanup(unique_id)?;
        Ok(())
    }

    /// Release the render artifacts of an abandoned serve.
    ///
    /// `save_annotation` cleans up on its own; this is for items the
    /// annotator navigated away from without submitting.
    pub fn cleanup(&self, unique_id: &str) -> Result<()> {
        self.renderer.cleanup(unique_id)
    }

    fn push_rating(&mut self, score: i64) {
        let formatted = format!("{score}%");
        info!(rating = %formatted, annotator = %self.annotator, "new annotator rating");
        self.ratings.push(formatted.clone());
        self.rating_event = Some(RatingEvent::new(formatted));
    }

    /// Consume the pending rating event, if any.
    ///
    /// Edge-triggered: each computed score is observable here exactly
    /// once; a caller that never polls simply misses it.
    pub fn take_rating_event(&mut self) -> Option<RatingEvent> {
        self.rating_event.take()
    }

    /// Most recently computed score for this annotator, if any
    pub fn last_rating(&self) -> Option<&str> {
        self.ratings.last().map(String::as_str)
    }

    /// Every score computed this process, oldest first
    pub fn ratings(&self) -> &[String] {
        &self.ratings
    }

    /// Number of items served this session
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// The corpus partition this manager serves from
    pub fn split(&self) -> &CorpusSplit {
        &self.split
    }

    /// Identity labels are attributed to
    pub fn annotator(&self) -> &str {
        &self.annotator
    }

    /// Force a full re-scan of the normal ordering on the next serve
    pub fn reset_normal_cursor(&mut self) {
        self.selector.reset_normal_cursor();
    }
}

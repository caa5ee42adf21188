//! Render artifacts for the presentation layer.
//!
//! Serving a blob writes two JPEGs into the static directory, named by a
//! fresh UUID: the enlarged crop with the blob outlined, and the full
//! page with the blob outlined so the annotator can see its context.
//! Artifacts have an explicit scoped lifetime: the serving layer calls
//! `cleanup` once they are no longer displayed.
//!
//! Blob geometry follows the scan convention (`x` = rows, `y` = columns);
//! this module is where it meets the image crate's column-major pixel
//! addressing.

use std::path::{Path, PathBuf};

use anyhow::Context;
use image::{Rgb, RgbImage};
use tracing::debug;
use uuid::Uuid;

use crate::core::ServeError;
use crate::domain::BlobRecord;

/// Outline color for the highlighted region
const OUTLINE: Rgb<u8> = Rgb([255, 0, 0]);

/// Handles to the artifacts produced for one serve
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Identifier the artifacts are named by; pass to `cleanup`
    pub unique_id: String,

    /// Enlarged crop with the blob outlined
    pub blob_image: PathBuf,

    /// Full page with the blob outlined
    pub page_image: PathBuf,

    /// Page path components (author / opera directory names)
    pub page_parts: Vec<String>,
}

/// Writes and removes per-serve image artifacts
#[derive(Debug, Clone)]
pub struct BlobRenderer {
    static_dir: PathBuf,
}

impl BlobRenderer {
    /// Create a renderer writing into `static_dir` (created if missing)
    pub fn new(static_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let static_dir = static_dir.into();
        std::fs::create_dir_all(&static_dir)
            .with_context(|| format!("Failed to create static dir: {}", static_dir.display()))?;
        Ok(Self { static_dir })
    }

    /// Artifact paths for a given identifier
    pub fn artifact_paths(&self, unique_id: &str) -> (PathBuf, PathBuf) {
        let blob = self.static_dir.join(format!("{unique_id}_blob.jpg"));
        let page = self.static_dir.join(format!("{unique_id}_page.jpg"));
        (blob, page)
    }

    /// Produce both artifacts for a record.
    ///
    /// A page image that cannot be read, or a region that falls entirely
    /// outside it, is reported as `MalformedRecord` so the serving loop
    /// can skip the record and continue.
    pub fn render(&self, record: &BlobRecord, enlarge: u32) -> Result<RenderContext, ServeError> {
        let page_path = record.page_path();
        let page = image::open(&page_path)
            .map_err(|e| ServeError::MalformedRecord {
                path: page_path.clone(),
                reason: format!("unreadable page image: {e}"),
            })?
            .to_rgb8();
        let (width, height) = page.dimensions();

        // Enlarged crop bounds, clamped to the page (rows r, columns c)
        let r0 = record.x0.saturating_sub(enlarge).min(height);
        let r1 = record.x1.saturating_add(enlarge).min(height);
        let c0 = record.y0.saturating_sub(enlarge).min(width);
        let c1 = record.y1.saturating_add(enlarge).min(width);
        if r1 <= r0 || c1 <= c0 {
            return Err(ServeError::MalformedRecord {
                path: page_path,
                reason: format!(
                    "region ({},{})..({},{}) lies outside the {}x{} page",
                    record.x0, record.y0, record.x1, record.y1, height, width
                ),
            });
        }

        let mut crop = image::imageops::crop_imm(&page, c0, r0, c1 - c0, r1 - r0).to_image();
        draw_rectangle(
            &mut crop,
            record.x0.saturating_sub(r0),
            record.y0.saturating_sub(c0),
            record.x1.saturating_sub(r0),
            record.y1.saturating_sub(c0),
        );

        let mut marked_page = page;
        draw_rectangle(&mut marked_page, record.x0, record.y0, record.x1, record.y1);

        let unique_id = Uuid::new_v4().to_string();
        let (blob_image, page_image) = self.artifact_paths(&unique_id);

        crop.save(&blob_image)
            .with_context(|| format!("Failed to write blob artifact: {}", blob_image.display()))
            .map_err(ServeError::Other)?;
        marked_page
            .save(&page_image)
            .with_context(|| format!("Failed to write page artifact: {}", page_image.display()))
            .map_err(ServeError::Other)?;

        debug!(%unique_id, page = %page_path.display(), "rendered serve artifacts");

        Ok(RenderContext {
            unique_id,
            blob_image,
            page_image,
            page_parts: record.page_parts(),
        })
    }

    /// Remove the artifacts for one serve; already-gone files are fine
    pub fn cleanup(&self, unique_id: &str) -> anyhow::Result<()> {
        let (blob, page) = self.artifact_paths(unique_id);
        for path in [blob, page] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to remove artifact: {}", path.display()))
                }
            }
        }
        Ok(())
    }
}

/// Outline a row/column-addressed rectangle, clamped to the image
fn draw_rectangle(image: &mut RgbImage, r0: u32, c0: u32, r1: u32, c1: u32) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let r0 = r0.min(height - 1);
    let r1 = r1.min(height - 1).max(r0);
    let c0 = c0.min(width - 1);
    let c1 = c1.min(width - 1).max(c0);

    for r in r0..=r1 {
        image.put_pixel(c0, r, OUTLINE);
        image.put_pixel(c1, r, OUTLINE);
    }
    for c in c0..=c1 {
        image.put_pixel(c, r0, OUTLINE);
        image.put_pixel(c, r1, OUTLINE);
    }
}

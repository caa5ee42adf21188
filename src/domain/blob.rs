//! Blob record schema.
//!
//! Each blob is persisted as one JSON file produced by the preprocessing
//! pass: geometry of the region inside its parent page image, the parent
//! path, and any annotation fields written later. Coordinates use the
//! scan convention: `x` indexes rows (top to bottom), `y` indexes columns.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::core::ServeError;

/// Marker suffix on parent paths pointing at staff-removed page variants
const NOSTAFF_SUFFIX: &str = "_nostaff";

/// A single blob region within a score page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobRecord {
    /// Path to the page image this blob was cut from
    pub parent: String,

    /// Top row of the region
    pub x0: u32,

    /// Left column of the region
    pub y0: u32,

    /// Bottom row of the region (exclusive)
    pub x1: u32,

    /// Right column of the region (exclusive)
    pub y1: u32,

    /// Annotation fields (label values, annotator identity, ...)
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl BlobRecord {
    /// Load a record from disk.
    ///
    /// A readable file that is missing geometry or the parent path is
    /// reported as `MalformedRecord` so the caller can skip it and move
    /// on; I/O failures are surfaced as-is.
    pub async fn load(path: &Path) -> Result<Self, ServeError> {
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read blob record: {}", path.display()))?;

        serde_json::from_str(&raw).map_err(|e| ServeError::MalformedRecord {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Path of the original (staff-intact) page image.
    ///
    /// Preprocessing stores parent paths pointing at the staff-removed
    /// variant; the annotator is shown the original page.
    pub fn page_path(&self) -> PathBuf {
        PathBuf::from(self.parent.replace(NOSTAFF_SUFFIX, ""))
    }

    /// Path components of the page image (author/opera directory names)
    pub fn page_parts(&self) -> Vec<String> {
        self.page_path()
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserialization() {
        let raw = r#"{
            "parent": "scans/verdi/aida/page_003_nostaff.jpg",
            "x0": 10, "y0": 20, "x1": 40, "y1": 60,
            "relevant": 1.0,
            "annotator": "alice"
        }"#;

        let record: BlobRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.x0, 10);
        assert_eq!(record.y1, 60);
        assert_eq!(record.fields.get("relevant"), Some(&serde_json::json!(1.0)));
        assert_eq!(
            record.fields.get("annotator"),
            Some(&serde_json::json!("alice"))
        );
    }

    #[test]
    fn test_missing_geometry_is_rejected() {
        let raw = r#"{"parent": "scans/page.jpg", "x0": 10}"#;
        assert!(serde_json::from_str::<BlobRecord>(raw).is_err());
    }

    #[test]
    fn test_page_path_strips_nostaff_marker() {
        let record: BlobRecord = serde_json::from_str(
            r#"{"parent": "scans/verdi/page_003_nostaff.jpg", "x0": 0, "y0": 0, "x1": 1, "y1": 1}"#,
        )
        .unwrap();

        assert_eq!(
            record.page_path(),
            PathBuf::from("scans/verdi/page_003.jpg")
        );
    }

    #[test]
    fn test_page_parts() {
        let record: BlobRecord = serde_json::from_str(
            r#"{"parent": "scans/verdi/page_003.jpg", "x0": 0, "y0": 0, "x1": 1, "y1": 1}"#,
        )
        .unwrap();

        assert_eq!(record.page_parts(), vec!["scans", "verdi", "page_003.jpg"]);
    }
}

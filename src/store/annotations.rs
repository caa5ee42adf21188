//! Field reads and writes against per-blob JSON records.
//!
//! Each blob record is one JSON file owned by the preprocessing pass;
//! annotation simply adds fields to it. Reads are tolerant of any extra
//! fields; writes rewrite the whole record (they are small).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use serde_json::Value;
use tokio::fs;

/// Glob for blob record files below the corpus directory
const RECORD_PATTERN: &str = "**/*_blob*.json";

/// Discover all blob record files under a corpus directory.
///
/// Returned in filesystem order; callers shuffle before partitioning.
pub fn discover_records(blob_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = blob_dir.join(RECORD_PATTERN);
    let pattern = pattern
        .to_str()
        .with_context(|| format!("Non-UTF8 corpus path: {}", blob_dir.display()))?;

    let mut records = Vec::new();
    for entry in glob(pattern).context("Invalid blob record glob")? {
        records.push(entry.context("Failed to read corpus directory entry")?);
    }
    Ok(records)
}

/// Read one annotation field from a record; None when the field is
/// absent or null.
pub async fn read_field(path: &Path, field: &str) -> Result<Option<Value>> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read blob record: {}", path.display()))?;

    let record: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse blob record: {}", path.display()))?;

    Ok(record.get(field).filter(|v| !v.is_null()).cloned())
}

/// Write a label into a record, tagged with the annotator's identity.
///
/// Read-modify-write of the whole file; any failure leaves the request
/// unserved rather than half-written.
pub async fn write_field(path: &Path, field: &str, value: f64, annotator: &str) -> Result<()> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read blob record: {}", path.display()))?;

    let mut record: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse blob record: {}", path.display()))?;

    let object = record
        .as_object_mut()
        .with_context(|| format!("Blob record is not a JSON object: {}", path.display()))?;
    object.insert(field.to_string(), Value::from(value));
    object.insert("annotator".to_string(), Value::from(annotator));

    let content = serde_json::to_string_pretty(&record)?;
    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write blob record: {}", path.display()))?;

    Ok(())
}

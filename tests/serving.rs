//! Serving-loop integration tests
//!
//! Cover forward selection through the manager, exhaustion, history
//! navigation, and malformed-record skipping, with real record files and
//! page images in a temp directory.

use std::path::{Path, PathBuf};

use blobmark::store::{annotations, CorpusSplit};
use blobmark::{AnnotationManager, ManagerOptions, ServeError};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

fn write_page(dir: &Path) -> PathBuf {
    let path = dir.join("page_001.jpg");
    RgbImage::from_pixel(60, 40, Rgb([255, 255, 255]))
        .save(&path)
        .unwrap();
    path
}

fn write_blob(dir: &Path, name: &str, page: &Path) -> PathBuf {
    let path = dir.join(name);
    let content = serde_json::json!({
        "parent": page.to_str().unwrap(),
        "x0": 5, "y0": 5, "x1": 15, "y1": 20
    });
    std::fs::write(&path, serde_json::to_string(&content).unwrap()).unwrap();
    path
}

fn options(home: &Path, control_freq: u32) -> ManagerOptions {
    ManagerOptions {
        annotation_field: "relevant".to_string(),
        annotator: "alice".to_string(),
        control_length: 2,
        control_freq,
        enlarge: 4,
        seed: 1992,
        split_path: home.join("split.json"),
        table_path: home.join("ratings.json"),
        static_dir: home.join("static"),
    }
}

/// Persist a split up front so the manager loads it instead of shuffling
async fn persist_split(home: &Path, control: Vec<PathBuf>, normal: Vec<PathBuf>) {
    CorpusSplit { control, normal }
        .save(&home.join("split.json"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_normal_items_served_in_split_order_until_exhausted() {
    let temp = TempDir::new().unwrap();
    let page = write_page(temp.path());
    let e = write_blob(temp.path(), "e_blob0.json", &page);
    let b = write_blob(temp.path(), "b_blob0.json", &page);
    let d = write_blob(temp.path(), "d_blob0.json", &page);

    // Empty control set: selection is fully deterministic
    persist_split(temp.path(), vec![], vec![e.clone(), b.clone(), d.clone()]).await;

    let mut manager = AnnotationManager::open(options(temp.path(), 200), vec![])
        .await
        .unwrap();

    for expected in [&e, &b, &d] {
        let served = manager.ask(None).await.unwrap();
        assert_eq!(&served.record_path, expected);
        assert!(!served.is_control);
        manager
            .save_annotation(&served.record_path, false, 1.0, &served.render.unique_id)
            .await
            .unwrap();
    }

    let err = manager.ask(None).await.unwrap_err();
    assert!(matches!(err, ServeError::Exhausted));
}

#[tokio::test]
async fn test_exhaustion_means_every_normal_item_is_labeled() {
    let temp = TempDir::new().unwrap();
    let page = write_page(temp.path());
    let records: Vec<PathBuf> = (0..4)
        .map(|i| write_blob(temp.path(), &format!("r{i}_blob0.json"), &page))
        .collect();

    persist_split(temp.path(), vec![], records.clone()).await;

    let mut manager = AnnotationManager::open(options(temp.path(), 200), vec![])
        .await
        .unwrap();

    loop {
        match manager.ask(None).await {
            Ok(served) => {
                manager
                    .save_annotation(&served.record_path, false, 0.0, &served.render.unique_id)
                    .await
                    .unwrap();
            }
            Err(ServeError::Exhausted) => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    for record in &records {
        let value = annotations::read_field(record, "relevant").await.unwrap();
        assert!(value.is_some(), "{} left unlabeled", record.display());
        let who = annotations::read_field(record, "annotator").await.unwrap();
        assert_eq!(who, Some(serde_json::json!("alice")));
    }
}

#[tokio::test]
async fn test_history_replay_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let page = write_page(temp.path());
    let first = write_blob(temp.path(), "first_blob0.json", &page);
    let second = write_blob(temp.path(), "second_blob0.json", &page);

    persist_split(temp.path(), vec![], vec![first.clone(), second]).await;

    let mut manager = AnnotationManager::open(options(temp.path(), 200), vec![])
        .await
        .unwrap();

    let live = manager.ask(None).await.unwrap();
    assert_eq!(live.record_path, first);

    let once = manager.ask(Some(1)).await.unwrap();
    let twice = manager.ask(Some(1)).await.unwrap();
    assert_eq!(once.record_path, twice.record_path);
    assert_eq!(once.is_control, twice.is_control);
    assert_eq!(once.record_path, first);

    // Replays do not grow the ledger
    assert_eq!(manager.history_len(), 1);
}

#[tokio::test]
async fn test_history_depth_past_session_start() {
    let temp = TempDir::new().unwrap();
    let page = write_page(temp.path());
    let only = write_blob(temp.path(), "only_blob0.json", &page);

    persist_split(temp.path(), vec![], vec![only]).await;

    let mut manager = AnnotationManager::open(options(temp.path(), 200), vec![])
        .await
        .unwrap();

    // Nothing served yet: depth 1 is already out of range
    assert!(matches!(
        manager.ask(Some(1)).await,
        Err(ServeError::EndedHistory {
            requested: 1,
            recorded: 0
        })
    ));

    manager.ask(None).await.unwrap();
    assert!(manager.ask(Some(1)).await.is_ok());
    assert!(matches!(
        manager.ask(Some(2)).await,
        Err(ServeError::EndedHistory { .. })
    ));
}

#[tokio::test]
async fn test_malformed_records_are_skipped() {
    let temp = TempDir::new().unwrap();
    let page = write_page(temp.path());

    // Missing geometry entirely
    let broken = temp.path().join("broken_blob0.json");
    std::fs::write(&broken, r#"{"parent": "page.jpg"}"#).unwrap();

    // Valid record but the page image does not exist
    let orphan = temp.path().join("orphan_blob0.json");
    std::fs::write(
        &orphan,
        r#"{"parent": "nowhere.jpg", "x0": 0, "y0": 0, "x1": 5, "y1": 5}"#,
    )
    .unwrap();

    let good = write_blob(temp.path(), "good_blob0.json", &page);

    persist_split(temp.path(), vec![], vec![broken, orphan, good.clone()]).await;

    let mut manager = AnnotationManager::open(options(temp.path(), 200), vec![])
        .await
        .unwrap();

    let served = manager.ask(None).await.unwrap();
    assert_eq!(served.record_path, good);

    // Only the successfully rendered serve is recorded
    assert_eq!(manager.history_len(), 1);
}

#[tokio::test]
async fn test_save_annotation_releases_artifacts() {
    let temp = TempDir::new().unwrap();
    let page = write_page(temp.path());
    let only = write_blob(temp.path(), "only_blob0.json", &page);

    persist_split(temp.path(), vec![], vec![only]).await;

    let mut manager = AnnotationManager::open(options(temp.path(), 200), vec![])
        .await
        .unwrap();

    let served = manager.ask(None).await.unwrap();
    assert!(served.render.blob_image.exists());
    assert!(served.render.page_image.exists());

    manager
        .save_annotation(&served.record_path, false, 1.0, &served.render.unique_id)
        .await
        .unwrap();

    assert!(!served.render.blob_image.exists());
    assert!(!served.render.page_image.exists());
}

#[tokio::test]
async fn test_split_partition_and_reload_through_manager() {
    let temp = TempDir::new().unwrap();
    let page = write_page(temp.path());
    let corpus: Vec<PathBuf> = (0..10)
        .map(|i| write_blob(temp.path(), &format!("r{i}_blob0.json"), &page))
        .collect();

    // No persisted split: the manager partitions and persists
    let manager = AnnotationManager::open(options(temp.path(), 200), corpus.clone())
        .await
        .unwrap();
    let split = manager.split().clone();

    assert_eq!(split.control.len(), 2);
    assert_eq!(split.normal.len(), 8);
    assert_eq!(split.len(), corpus.len());
    for record in &corpus {
        let in_control = split.control.contains(record);
        let in_normal = split.normal.contains(record);
        assert!(in_control != in_normal, "partition must cover {} exactly once", record.display());
    }

    // A fresh manager over the same home loads the identical split
    let reopened = AnnotationManager::open(options(temp.path(), 200), corpus)
        .await
        .unwrap();
    assert_eq!(reopened.split(), &split);
}

use serde_json::json;
use tempfile::TempDir;

use duopilot::config::{DuoConfig, ProjectPaths};
use duopilot::events::EventKind;
use duopilot::state::StateStore;

async fn store_with_interval(interval_secs: u64) -> (TempDir, StateStore) {
    let dir = TempDir::new().unwrap();

    let mut config = DuoConfig::default();
    config.state.backup_interval_secs = interval_secs;
    config.state.backup_retention_count = 2;

    let paths = ProjectPaths::new(dir.path().to_path_buf(), &config);
    paths.ensure_dirs().await.unwrap();

    let store = StateStore::new(&paths, &config);
    (dir, store)
}

#[tokio::test]
async fn test_initialize_takes_first_snapshot() {
    let (_dir, store) = store_with_interval(600).await;
    store.initialize("task", "claude").await.unwrap();

    assert_eq!(store.list_backups().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_writes_within_interval_do_not_snapshot() {
    let (_dir, store) = store_with_interval(600).await;
    store.initialize("task", "claude").await.unwrap();

    store
        .update_field("current_task", json!("step two"))
        .await
        .unwrap();
    store
        .update_field("current_task", json!("step three"))
        .await
        .unwrap();

    // Only the snapshot taken at initialization
    assert_eq!(store.list_backups().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_recovery_takes_fresh_snapshot() {
    let (_dir, store) = store_with_interval(600).await;
    store.initialize("task", "claude").await.unwrap();

    std::fs::write(store.state_path(), "corrupted").unwrap();
    store.read_state().await.unwrap();

    let backups = store.list_backups().await.unwrap();
    assert_eq!(backups.len(), 2);

    let snapshots_logged = store
        .events()
        .load_recent(100)
        .unwrap()
        .into_iter()
        .filter(|e| e.kind == EventKind::StateRecovered)
        .count();
    assert_eq!(snapshots_logged, 1);
}

#[tokio::test]
async fn test_store_prune_respects_retention_count() {
    let (_dir, store) = store_with_interval(600).await;
    store.initialize("task", "claude").await.unwrap();

    // Force extra snapshots through repeated recovery cycles
    for _ in 0..3 {
        std::fs::write(store.state_path(), "corrupted").unwrap();
        store.read_state().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(store.list_backups().await.unwrap().len(), 4);

    let deleted = store.prune_backups().await.unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(store.list_backups().await.unwrap().len(), 2);

    let pruned_logged = store
        .events()
        .load_recent(100)
        .unwrap()
        .into_iter()
        .any(|e| e.kind == EventKind::SnapshotPruned);
    assert!(pruned_logged);
}

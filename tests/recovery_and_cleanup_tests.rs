//! Stuck-import recovery and failed-activation cleanup.

mod common;

use async_trait::async_trait;
use common::*;
use std::sync::Arc;

use flowsync_core::error::{RegistryError, RegistryResult, RemoteApiError};
use flowsync_core::orchestration::{
    CleanupManager, CleanupPolicy, ErrorCategory, FailedActivation, StuckImportRecovery,
};
use flowsync_core::registry::{MemoryRegistryStore, RegistryEntry, RegistryStore};
use flowsync_core::state_machine::ImportStatus;

/// Store whose table has not been created yet
struct UnprovisionedStore;

#[async_trait]
impl RegistryStore for UnprovisionedStore {
    async fn find_by_filename(&self, _: &str) -> RegistryResult<Option<RegistryEntry>> {
        Err(RegistryError::TableMissing)
    }

    async fn list_all(&self) -> RegistryResult<Vec<RegistryEntry>> {
        Err(RegistryError::TableMissing)
    }

    async fn list_by_status(&self, _: &[ImportStatus]) -> RegistryResult<Vec<RegistryEntry>> {
        Err(RegistryError::TableMissing)
    }

    async fn upsert(&self, _: &RegistryEntry) -> RegistryResult<RegistryEntry> {
        Err(RegistryError::TableMissing)
    }
}

fn with_status(filename: &str, status: ImportStatus) -> RegistryEntry {
    let mut entry = RegistryEntry::new(filename, filename.trim_end_matches(".json"));
    entry.import_status = status;
    if status == ImportStatus::Imported {
        entry.remote_id = Some(format!("id-{filename}"));
        entry.is_active = true;
    }
    entry
}

#[tokio::test]
async fn test_recovery_resets_in_flight_rows_only() {
    let registry = Arc::new(MemoryRegistryStore::with_entries([
        with_status("importing.json", ImportStatus::Importing),
        with_status("updating.json", ImportStatus::Updating),
        with_status("imported.json", ImportStatus::Imported),
    ]));
    let untouched = registry
        .find_by_filename("imported.json")
        .await
        .unwrap()
        .unwrap();

    let report = StuckImportRecovery::new(registry.clone())
        .recover()
        .await
        .unwrap();

    assert_eq!(report.reset, vec!["importing.json", "updating.json"]);
    for filename in ["importing.json", "updating.json"] {
        let row = registry.find_by_filename(filename).await.unwrap().unwrap();
        assert_eq!(row.import_status, ImportStatus::Pending);
        assert!(row.last_error.is_some());
    }
    assert_eq!(
        registry.find_by_filename("imported.json").await.unwrap().unwrap(),
        untouched
    );
}

#[tokio::test]
async fn test_recovery_treats_missing_table_as_empty() {
    let report = StuckImportRecovery::new(Arc::new(UnprovisionedStore))
        .recover()
        .await
        .unwrap();

    assert!(report.table_missing);
    assert_eq!(report.reset_count(), 0);
}

async fn failed_activation(
    api: &FakeWorkflowApi,
    registry: &MemoryRegistryStore,
    name: &str,
) -> FailedActivation {
    let remote_id = api.seed(name, false);
    let filename = format!("{}.json", name.to_lowercase());
    let mut entry = RegistryEntry::new(&filename, name);
    entry.begin_import(false).unwrap();
    entry
        .mark_pending_activation(remote_id.clone(), "abc", vec![])
        .unwrap();
    entry.mark_failed("Credentials not found").unwrap();
    registry.upsert(&entry).await.unwrap();

    FailedActivation {
        filename,
        name: name.to_string(),
        remote_id,
        error: "Credentials not found".into(),
        category: ErrorCategory::MissingCredentials,
    }
}

#[tokio::test]
async fn test_deactivate_policy_tolerates_already_inactive() {
    let api = Arc::new(FakeWorkflowApi::new());
    let registry = Arc::new(MemoryRegistryStore::new());
    let first = failed_activation(&api, &registry, "First").await;
    let second = failed_activation(&api, &registry, "Second").await;
    api.fail_deactivate(
        "Second",
        RemoteApiError::api(400, "Workflow is already inactive"),
    );

    let report = CleanupManager::new(api.clone(), registry.clone())
        .cleanup(&[first, second], CleanupPolicy::Deactivate)
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 2);
    for filename in ["first.json", "second.json"] {
        let row = registry.find_by_filename(filename).await.unwrap().unwrap();
        assert_eq!(row.import_status, ImportStatus::Failed);
        assert!(!row.is_active);
        assert!(row.remote_id.is_some());
        assert_eq!(row.retry_count, 1);
    }
}

#[tokio::test]
async fn test_cleanup_items_fail_independently() {
    let api = Arc::new(FakeWorkflowApi::new());
    let registry = Arc::new(MemoryRegistryStore::new());
    let broken = failed_activation(&api, &registry, "Broken").await;
    let fine = failed_activation(&api, &registry, "Fine").await;
    api.fail_delete("Broken", RemoteApiError::api(500, "Internal Server Error"));

    let report = CleanupManager::new(api.clone(), registry.clone())
        .cleanup(&[broken, fine], CleanupPolicy::Delete)
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(
        report.items[0].error.as_deref(),
        Some("Internal Server Error")
    );

    let broken_row = registry.find_by_filename("broken.json").await.unwrap().unwrap();
    assert_eq!(broken_row.import_status, ImportStatus::Failed);
    assert!(broken_row.remote_id.is_some());

    let fine_row = registry.find_by_filename("fine.json").await.unwrap().unwrap();
    assert_eq!(fine_row.import_status, ImportStatus::Pending);
    assert!(fine_row.remote_id.is_none());
    assert!(api.remote_by_name("Fine").is_none());
}

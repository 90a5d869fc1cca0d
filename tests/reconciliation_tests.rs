//! Registry-vs-remote drift repair.

mod common;

use common::*;
use std::sync::Arc;

use flowsync_core::error::{DeployerError, RemoteApiError};
use flowsync_core::orchestration::RegistrySyncReconciler;
use flowsync_core::registry::{MemoryRegistryStore, RegistryEntry, RegistryStore};
use flowsync_core::state_machine::ImportStatus;

fn imported(filename: &str, name: &str, remote_id: &str, active: bool) -> RegistryEntry {
    let mut entry = RegistryEntry::new(filename, name);
    entry.import_status = ImportStatus::Imported;
    entry.remote_id = Some(remote_id.to_string());
    entry.is_active = active;
    entry.local_checksum = "abc".into();
    entry
}

struct Setup {
    api: Arc<FakeWorkflowApi>,
    registry: Arc<MemoryRegistryStore>,
}

impl Setup {
    fn new() -> Self {
        Self {
            api: Arc::new(FakeWorkflowApi::new()),
            registry: Arc::new(MemoryRegistryStore::new()),
        }
    }

    fn reconciler(&self) -> RegistrySyncReconciler {
        RegistrySyncReconciler::new(self.api.clone(), self.registry.clone())
    }

    async fn row(&self, filename: &str) -> RegistryEntry {
        self.registry
            .find_by_filename(filename)
            .await
            .unwrap()
            .unwrap()
    }
}

#[tokio::test]
async fn test_externally_deleted_definition_is_reset_to_pending() {
    let setup = Setup::new();
    let id = setup.api.seed("A", true);
    setup
        .registry
        .upsert(&imported("a.json", "A", &id, true))
        .await
        .unwrap();
    setup.api.remove_remote(&id);

    let summary = setup.reconciler().reconcile().await.unwrap();

    assert_eq!(summary.checked, 1);
    assert_eq!(summary.marked_deleted, vec!["a.json"]);
    let row = setup.row("a.json").await;
    assert_eq!(row.import_status, ImportStatus::Pending);
    assert!(row.remote_id.is_none());
    assert!(!row.is_active);
    assert!(row.last_error.is_some());
}

#[tokio::test]
async fn test_active_flag_drift_updates_flag_only() {
    let setup = Setup::new();
    let id = setup.api.seed("A", true);
    setup
        .registry
        .upsert(&imported("a.json", "A", &id, true))
        .await
        .unwrap();
    setup.api.set_remote_active(&id, false);

    let summary = setup.reconciler().reconcile().await.unwrap();

    assert_eq!(summary.state_changed, vec!["a.json"]);
    let row = setup.row("a.json").await;
    assert!(!row.is_active);
    assert_eq!(row.import_status, ImportStatus::Imported);
    assert_eq!(row.remote_id.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn test_remote_activation_of_incomplete_entry_is_reported_not_stored() {
    let setup = Setup::new();
    let id = setup.api.seed("A", true);
    let mut waiting = imported("a.json", "A", &id, false);
    waiting.import_status = ImportStatus::PendingActivation;
    setup.registry.upsert(&waiting).await.unwrap();

    let summary = setup.reconciler().reconcile().await.unwrap();

    assert_eq!(summary.inconsistent, vec!["a.json"]);
    let row = setup.row("a.json").await;
    assert!(!row.is_active);
    assert!(row.invariants_hold());
}

#[tokio::test]
async fn test_mixed_registry_summary() {
    let setup = Setup::new();
    let kept = setup.api.seed("Kept", true);
    let toggled = setup.api.seed("Toggled", false);
    let gone = setup.api.seed("Gone", true);

    setup
        .registry
        .upsert(&imported("kept.json", "Kept", &kept, true))
        .await
        .unwrap();
    setup
        .registry
        .upsert(&imported("toggled.json", "Toggled", &toggled, true))
        .await
        .unwrap();
    setup
        .registry
        .upsert(&imported("gone.json", "Gone", &gone, true))
        .await
        .unwrap();
    setup
        .registry
        .upsert(&RegistryEntry::new("never.json", "Never"))
        .await
        .unwrap();
    setup.api.remove_remote(&gone);

    let summary = setup.reconciler().reconcile().await.unwrap();

    assert_eq!(summary.checked, 3);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.marked_deleted, vec!["gone.json"]);
    assert_eq!(summary.state_changed, vec!["toggled.json"]);
    assert!(summary.errors.is_empty());
}

#[tokio::test]
async fn test_listing_failure_aborts_reconciliation() {
    let setup = Setup::new();
    setup
        .registry
        .upsert(&imported("a.json", "A", "wf-1", true))
        .await
        .unwrap();
    setup
        .api
        .fail_list(RemoteApiError::Transport("connection refused".into()));

    let err = setup.reconciler().reconcile().await.unwrap_err();

    assert!(matches!(err, DeployerError::Remote(_)));
    assert_eq!(setup.row("a.json").await.import_status, ImportStatus::Imported);
}

#[tokio::test]
async fn test_imported_chain_reconciles_clean() {
    let harness = Harness::new(chain_bundle());
    harness
        .orchestrator()
        .run(&Default::default(), &Default::default())
        .await
        .unwrap();

    let summary = RegistrySyncReconciler::new(harness.api.clone(), harness.registry.clone())
        .reconcile()
        .await
        .unwrap();

    assert_eq!(summary.checked, 3);
    assert_eq!(summary.unchanged, 3);
}

//! Create / update / skip decision for a bundled definition.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::definitions::BundledDefinition;
use crate::registry::RegistryEntry;
use crate::state_machine::ImportStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Update,
    Skip,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Create => write!(f, "create"),
            ChangeAction::Update => write!(f, "update"),
            ChangeAction::Skip => write!(f, "skip"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector {
    force_update: bool,
}

impl ChangeDetector {
    pub fn new(force_update: bool) -> Self {
        Self { force_update }
    }

    /// Decide what Phase 1 should do with `definition`
    ///
    /// | registry row                                   | action |
    /// |------------------------------------------------|--------|
    /// | missing, or no remote id                       | create |
    /// | `imported`, same checksum, not forced          | skip   |
    /// | different checksum, or forced                  | update |
    /// | left incomplete by an earlier run              | update |
    pub fn detect(
        &self,
        definition: &BundledDefinition,
        entry: Option<&RegistryEntry>,
    ) -> ChangeAction {
        let Some(entry) = entry else {
            return ChangeAction::Create;
        };
        if entry.remote_id.is_none() {
            return ChangeAction::Create;
        }

        let unchanged = entry.local_checksum == definition.checksum;
        if entry.import_status == ImportStatus::Imported && unchanged && !self.force_update {
            ChangeAction::Skip
        } else {
            ChangeAction::Update
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(checksum: &str) -> BundledDefinition {
        BundledDefinition::new(
            "a.json".to_string(),
            checksum.to_string(),
            json!({"name": "A", "nodes": []}),
        )
        .unwrap()
    }

    fn entry(status: ImportStatus, checksum: &str, remote: Option<&str>) -> RegistryEntry {
        let mut entry = RegistryEntry::new("a.json", "A");
        entry.import_status = status;
        entry.local_checksum = checksum.to_string();
        entry.remote_id = remote.map(str::to_string);
        entry
    }

    #[test]
    fn test_missing_row_or_remote_id_creates() {
        let detector = ChangeDetector::default();
        assert_eq!(detector.detect(&definition("x"), None), ChangeAction::Create);

        let row = entry(ImportStatus::Imported, "x", None);
        assert_eq!(
            detector.detect(&definition("x"), Some(&row)),
            ChangeAction::Create
        );
    }

    #[test]
    fn test_unchanged_imported_definition_is_skipped() {
        let row = entry(ImportStatus::Imported, "x", Some("wf-1"));
        assert_eq!(
            ChangeDetector::default().detect(&definition("x"), Some(&row)),
            ChangeAction::Skip
        );
    }

    #[test]
    fn test_changed_checksum_updates() {
        let row = entry(ImportStatus::Imported, "old", Some("wf-1"));
        assert_eq!(
            ChangeDetector::default().detect(&definition("new"), Some(&row)),
            ChangeAction::Update
        );
    }

    #[test]
    fn test_force_update_never_skips() {
        let row = entry(ImportStatus::Imported, "x", Some("wf-1"));
        assert_eq!(
            ChangeDetector::new(true).detect(&definition("x"), Some(&row)),
            ChangeAction::Update
        );
    }

    proptest::proptest! {
        #[test]
        fn skip_only_for_unchanged_imported_rows(
            status_index in 0usize..ImportStatus::ALL.len(),
            same_checksum: bool,
            has_remote: bool,
            force: bool,
        ) {
            let status = ImportStatus::ALL[status_index];
            let stored = if same_checksum { "x" } else { "y" };
            let row = entry(status, stored, has_remote.then_some("wf-1"));

            let action = ChangeDetector::new(force).detect(&definition("x"), Some(&row));
            let expect_skip =
                status == ImportStatus::Imported && same_checksum && has_remote && !force;
            proptest::prop_assert_eq!(action == ChangeAction::Skip, expect_skip);
            if !has_remote {
                proptest::prop_assert_eq!(action, ChangeAction::Create);
            }
        }
    }

    #[test]
    fn test_incomplete_previous_run_is_retried() {
        for status in [
            ImportStatus::Pending,
            ImportStatus::PendingActivation,
            ImportStatus::Failed,
            ImportStatus::Importing,
        ] {
            let row = entry(status, "x", Some("wf-1"));
            assert_eq!(
                ChangeDetector::default().detect(&definition("x"), Some(&row)),
                ChangeAction::Update,
                "status {status}"
            );
        }
    }
}

//! In-process registry store backed by a concurrent map.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{RegistryEntry, RegistryStore};
use crate::error::RegistryResult;
use crate::state_machine::ImportStatus;

/// Non-persistent [`RegistryStore`]
///
/// Useful for embedding the engine without a database and for tests. Rows are
/// lost when the store is dropped.
///
/// ```rust
/// use flowsync_core::registry::{MemoryRegistryStore, RegistryEntry, RegistryStore};
/// use flowsync_core::state_machine::ImportStatus;
///
/// # tokio_test::block_on(async {
/// let store = MemoryRegistryStore::new();
/// store.upsert(&RegistryEntry::new("a.json", "A")).await.unwrap();
///
/// let pending = store.list_by_status(&[ImportStatus::Pending]).await.unwrap();
/// assert_eq!(pending.len(), 1);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemoryRegistryStore {
    rows: DashMap<String, RegistryEntry>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store
    pub fn with_entries(entries: impl IntoIterator<Item = RegistryEntry>) -> Self {
        let store = Self::new();
        for entry in entries {
            store.rows.insert(entry.filename.clone(), entry);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn sorted(mut rows: Vec<RegistryEntry>) -> Vec<RegistryEntry> {
        rows.sort_by(|a, b| a.filename.cmp(&b.filename));
        rows
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn find_by_filename(&self, filename: &str) -> RegistryResult<Option<RegistryEntry>> {
        Ok(self.rows.get(filename).map(|r| r.value().clone()))
    }

    async fn list_all(&self) -> RegistryResult<Vec<RegistryEntry>> {
        Ok(Self::sorted(
            self.rows.iter().map(|r| r.value().clone()).collect(),
        ))
    }

    async fn list_by_status(
        &self,
        statuses: &[ImportStatus],
    ) -> RegistryResult<Vec<RegistryEntry>> {
        Ok(Self::sorted(
            self.rows
                .iter()
                .filter(|r| statuses.contains(&r.value().import_status))
                .map(|r| r.value().clone())
                .collect(),
        ))
    }

    async fn upsert(&self, entry: &RegistryEntry) -> RegistryResult<RegistryEntry> {
        let mut stored = entry.clone();
        if let Some(existing) = self.rows.get(&entry.filename) {
            stored.created_at = existing.created_at;
        }
        self.rows.insert(stored.filename.clone(), stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_replaces_and_keeps_created_at() {
        let store = MemoryRegistryStore::new();
        let original = store
            .upsert(&RegistryEntry::new("a.json", "A"))
            .await
            .unwrap();

        let mut changed = RegistryEntry::new("a.json", "A");
        changed.local_checksum = "new".into();
        let stored = store.upsert(&changed).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(stored.created_at, original.created_at);
        assert_eq!(
            store
                .find_by_filename("a.json")
                .await
                .unwrap()
                .unwrap()
                .local_checksum,
            "new"
        );
    }

    #[tokio::test]
    async fn test_list_by_status_filters_and_sorts() {
        let mut stuck = RegistryEntry::new("b.json", "B");
        stuck.import_status = ImportStatus::Importing;
        let mut also_stuck = RegistryEntry::new("a.json", "A");
        also_stuck.import_status = ImportStatus::Updating;
        let done = RegistryEntry::new("c.json", "C");

        let store = MemoryRegistryStore::with_entries([stuck, also_stuck, done]);
        let rows = store
            .list_by_status(&[ImportStatus::Importing, ImportStatus::Updating])
            .await
            .unwrap();

        let names: Vec<_> = rows.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }
}

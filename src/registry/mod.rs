//! # Deployment Registry
//!
//! Local record of each bundled definition's deployment state, keyed by filename.
//!
//! ## Overview
//!
//! The engine only needs a handful of primitives from storage (lookup, listing,
//! status-filtered listing and upsert), so persistence is a port: the
//! [`RegistryStore`] trait. Two implementations ship with the crate:
//!
//! ```text
//! RegistryStore
//! ├── PgRegistryStore      (sqlx / PostgreSQL, feature `postgres`)
//! └── MemoryRegistryStore  (DashMap, for embedding and tests)
//! ```
//!
//! Only one import run is expected to write at a time; see
//! [`crate::orchestration::run_lock`].

pub mod entry;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::error::RegistryResult;
use crate::state_machine::ImportStatus;

pub use entry::RegistryEntry;
pub use memory::MemoryRegistryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgRegistryStore;

#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn find_by_filename(&self, filename: &str) -> RegistryResult<Option<RegistryEntry>>;

    /// All rows ordered by filename
    async fn list_all(&self) -> RegistryResult<Vec<RegistryEntry>>;

    async fn list_by_status(&self, statuses: &[ImportStatus])
        -> RegistryResult<Vec<RegistryEntry>>;

    /// Insert or replace the row for `entry.filename`, returning the stored row
    async fn upsert(&self, entry: &RegistryEntry) -> RegistryResult<RegistryEntry>;
}

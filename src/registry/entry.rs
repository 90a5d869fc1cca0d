//! # Registry Entry
//!
//! One persisted row per bundled filename. All status changes go through the
//! transition methods below so the row invariants hold before anything is written:
//!
//! - `remote_id` is set only while the definition exists on the remote system
//! - `is_active` is false whenever the status is not `imported`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};
use crate::state_machine::ImportStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub filename: String,
    pub workflow_name: String,
    pub remote_id: Option<String>,
    pub local_checksum: String,
    pub trigger_paths: Vec<String>,
    pub is_active: bool,
    pub import_status: ImportStatus,
    pub last_import_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegistryEntry {
    /// A fresh `pending` row
    pub fn new(filename: impl Into<String>, workflow_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            filename: filename.into(),
            workflow_name: workflow_name.into(),
            remote_id: None,
            local_checksum: String::new(),
            trigger_paths: Vec::new(),
            is_active: false,
            import_status: ImportStatus::Pending,
            last_import_at: None,
            last_error: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: ImportStatus) -> RegistryResult<()> {
        if !self.import_status.can_transition_to(next) {
            return Err(RegistryError::IllegalTransition {
                filename: self.filename.clone(),
                from: self.import_status.to_string(),
                to: next.to_string(),
            });
        }
        self.import_status = next;
        if !next.permits_active() {
            self.is_active = false;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Phase 1 is about to call create (`importing`) or update (`updating`)
    pub fn begin_import(&mut self, updating: bool) -> RegistryResult<()> {
        let next = if updating {
            ImportStatus::Updating
        } else {
            ImportStatus::Importing
        };
        self.transition(next)
    }

    /// Phase 1 call succeeded; the definition exists remotely and is inactive
    pub fn mark_pending_activation(
        &mut self,
        remote_id: impl Into<String>,
        checksum: impl Into<String>,
        trigger_paths: Vec<String>,
    ) -> RegistryResult<()> {
        self.transition(ImportStatus::PendingActivation)?;
        self.remote_id = Some(remote_id.into());
        self.local_checksum = checksum.into();
        self.trigger_paths = trigger_paths;
        self.last_error = None;
        Ok(())
    }

    /// Phase 2 activation succeeded
    pub fn mark_imported(&mut self) -> RegistryResult<()> {
        self.transition(ImportStatus::Imported)?;
        self.is_active = true;
        self.last_error = None;
        self.last_import_at = Some(Utc::now());
        Ok(())
    }

    /// Terminal failure: records the error and bumps the retry counter
    pub fn mark_failed(&mut self, error: impl Into<String>) -> RegistryResult<()> {
        self.transition(ImportStatus::Failed)?;
        self.last_error = Some(error.into());
        self.retry_count += 1;
        Ok(())
    }

    /// Back to `pending`; `forget_remote` clears the remote id
    pub fn reset_to_pending(&mut self, note: impl Into<String>, forget_remote: bool) {
        self.import_status = ImportStatus::Pending;
        self.is_active = false;
        if forget_remote {
            self.remote_id = None;
        }
        self.last_error = Some(note.into());
        self.updated_at = Utc::now();
    }

    /// Record the remote active flag without changing status
    ///
    /// Returns `false` when the flag would break the active/status invariant and
    /// was therefore not applied.
    pub fn set_active_flag(&mut self, active: bool) -> bool {
        if active && !self.import_status.permits_active() {
            return false;
        }
        self.is_active = active;
        self.updated_at = Utc::now();
        true
    }

    pub fn invariants_hold(&self) -> bool {
        !(self.is_active && !self.import_status.permits_active())
    }
}

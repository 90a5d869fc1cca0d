//! # Remote Workflow API
//!
//! The port through which the engine talks to the remote workflow-automation
//! instance, and its HTTP implementation.

pub mod types;
pub mod workflow_client;

use async_trait::async_trait;

use crate::definitions::WorkflowPayload;
use crate::error::RemoteResult;

pub use types::{ActivationState, RemoteWorkflow};
pub use workflow_client::HttpWorkflowClient;

/// Operations the engine needs from the remote system
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    async fn create_workflow(&self, payload: &WorkflowPayload) -> RemoteResult<RemoteWorkflow>;

    async fn update_workflow(
        &self,
        id: &str,
        payload: &WorkflowPayload,
    ) -> RemoteResult<RemoteWorkflow>;

    async fn delete_workflow(&self, id: &str) -> RemoteResult<()>;

    async fn activate_workflow(&self, id: &str) -> RemoteResult<ActivationState>;

    async fn deactivate_workflow(&self, id: &str) -> RemoteResult<ActivationState>;

    /// `None` when the id is unknown to the remote system
    async fn get_workflow(&self, id: &str) -> RemoteResult<Option<RemoteWorkflow>>;

    async fn list_workflows(&self) -> RemoteResult<Vec<RemoteWorkflow>>;

    /// Exact-match lookup by name over the full listing
    async fn find_workflow_by_name(&self, name: &str) -> RemoteResult<Option<RemoteWorkflow>> {
        Ok(self
            .list_workflows()
            .await?
            .into_iter()
            .find(|w| w.name == name))
    }
}

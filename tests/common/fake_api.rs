//! Scriptable in-process [`WorkflowApi`] used by the integration tests.
//!
//! Failures are scripted by definition name because tests do not know the ids
//! the fake hands out.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};

use flowsync_core::client::{ActivationState, RemoteWorkflow, WorkflowApi};
use flowsync_core::error::{RemoteApiError, RemoteResult};
use flowsync_core::WorkflowPayload;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Create(String),
    Update(String),
    Delete(String),
    Activate(String),
    Deactivate(String),
    List,
}

#[derive(Default)]
struct FakeState {
    workflows: BTreeMap<String, RemoteWorkflow>,
    next_id: u32,
    calls: Vec<ApiCall>,
    create_failures: HashMap<String, RemoteApiError>,
    update_failures: HashMap<String, RemoteApiError>,
    delete_failures: HashMap<String, RemoteApiError>,
    deactivate_failures: HashMap<String, RemoteApiError>,
    activation_always: HashMap<String, RemoteApiError>,
    activation_script: HashMap<String, VecDeque<RemoteApiError>>,
    list_failure: Option<RemoteApiError>,
    payloads: Vec<WorkflowPayload>,
}

impl FakeState {
    fn name_of(&self, id: &str) -> RemoteResult<String> {
        self.workflows
            .get(id)
            .map(|w| w.name.clone())
            .ok_or_else(|| RemoteApiError::api(404, "Not Found"))
    }
}

#[derive(Default)]
pub struct FakeWorkflowApi {
    state: Mutex<FakeState>,
}

impl FakeWorkflowApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a definition on the remote side before the test starts
    pub fn seed(&self, name: &str, active: bool) -> String {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = format!("seed-{}", state.next_id);
        state.workflows.insert(
            id.clone(),
            RemoteWorkflow {
                id: id.clone(),
                name: name.to_string(),
                active,
            },
        );
        id
    }

    /// Simulate an out-of-band deletion
    pub fn remove_remote(&self, id: &str) {
        self.state.lock().workflows.remove(id);
    }

    /// Simulate an out-of-band (de)activation
    pub fn set_remote_active(&self, id: &str, active: bool) {
        if let Some(w) = self.state.lock().workflows.get_mut(id) {
            w.active = active;
        }
    }

    pub fn fail_create(&self, name: &str, error: RemoteApiError) {
        self.state.lock().create_failures.insert(name.to_string(), error);
    }

    pub fn fail_update(&self, name: &str, error: RemoteApiError) {
        self.state.lock().update_failures.insert(name.to_string(), error);
    }

    pub fn fail_delete(&self, name: &str, error: RemoteApiError) {
        self.state.lock().delete_failures.insert(name.to_string(), error);
    }

    pub fn fail_deactivate(&self, name: &str, error: RemoteApiError) {
        self.state
            .lock()
            .deactivate_failures
            .insert(name.to_string(), error);
    }

    pub fn fail_list(&self, error: RemoteApiError) {
        self.state.lock().list_failure = Some(error);
    }

    /// Every activation of `name` fails with `error`
    pub fn fail_activation(&self, name: &str, error: RemoteApiError) {
        self.state
            .lock()
            .activation_always
            .insert(name.to_string(), error);
    }

    /// The next activations of `name` fail with `errors`, in order, then succeed
    pub fn script_activation(&self, name: &str, errors: Vec<RemoteApiError>) {
        self.state
            .lock()
            .activation_script
            .insert(name.to_string(), errors.into());
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().calls.clone()
    }

    pub fn activation_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ApiCall::Activate(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ApiCall::Delete(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn remote_by_name(&self, name: &str) -> Option<RemoteWorkflow> {
        self.state
            .lock()
            .workflows
            .values()
            .find(|w| w.name == name)
            .cloned()
    }

    pub fn remote_count(&self) -> usize {
        self.state.lock().workflows.len()
    }

    pub fn payloads(&self) -> Vec<WorkflowPayload> {
        self.state.lock().payloads.clone()
    }
}

#[async_trait]
impl WorkflowApi for FakeWorkflowApi {
    async fn create_workflow(&self, payload: &WorkflowPayload) -> RemoteResult<RemoteWorkflow> {
        let mut state = self.state.lock();
        state.calls.push(ApiCall::Create(payload.name.clone()));
        state.payloads.push(payload.clone());
        if let Some(error) = state.create_failures.get(&payload.name) {
            return Err(error.clone());
        }
        state.next_id += 1;
        let workflow = RemoteWorkflow {
            id: format!("wf-{}", state.next_id),
            name: payload.name.clone(),
            active: false,
        };
        state.workflows.insert(workflow.id.clone(), workflow.clone());
        Ok(workflow)
    }

    async fn update_workflow(
        &self,
        id: &str,
        payload: &WorkflowPayload,
    ) -> RemoteResult<RemoteWorkflow> {
        let mut state = self.state.lock();
        state.calls.push(ApiCall::Update(payload.name.clone()));
        state.payloads.push(payload.clone());
        if let Some(error) = state.update_failures.get(&payload.name) {
            return Err(error.clone());
        }
        let workflow = state
            .workflows
            .get_mut(id)
            .ok_or_else(|| RemoteApiError::api(404, "Not Found"))?;
        workflow.name = payload.name.clone();
        Ok(workflow.clone())
    }

    async fn delete_workflow(&self, id: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        let name = state.name_of(id)?;
        state.calls.push(ApiCall::Delete(name.clone()));
        if let Some(error) = state.delete_failures.get(&name) {
            return Err(error.clone());
        }
        state.workflows.remove(id);
        Ok(())
    }

    async fn activate_workflow(&self, id: &str) -> RemoteResult<ActivationState> {
        let mut state = self.state.lock();
        let name = state.name_of(id)?;
        state.calls.push(ApiCall::Activate(name.clone()));
        if let Some(error) = state.activation_always.get(&name) {
            return Err(error.clone());
        }
        if let Some(error) = state
            .activation_script
            .get_mut(&name)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        if let Some(w) = state.workflows.get_mut(id) {
            w.active = true;
        }
        Ok(ActivationState { active: true })
    }

    async fn deactivate_workflow(&self, id: &str) -> RemoteResult<ActivationState> {
        let mut state = self.state.lock();
        let name = state.name_of(id)?;
        state.calls.push(ApiCall::Deactivate(name.clone()));
        if let Some(error) = state.deactivate_failures.get(&name) {
            return Err(error.clone());
        }
        if let Some(w) = state.workflows.get_mut(id) {
            w.active = false;
        }
        Ok(ActivationState { active: false })
    }

    async fn get_workflow(&self, id: &str) -> RemoteResult<Option<RemoteWorkflow>> {
        Ok(self.state.lock().workflows.get(id).cloned())
    }

    async fn list_workflows(&self) -> RemoteResult<Vec<RemoteWorkflow>> {
        let mut state = self.state.lock();
        state.calls.push(ApiCall::List);
        if let Some(error) = &state.list_failure {
            return Err(error.clone());
        }
        Ok(state.workflows.values().cloned().collect())
    }
}

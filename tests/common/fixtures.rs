//! Bundle directories and engine wiring for integration tests.

use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use flowsync_core::config::{ImportSettings, RetryPolicyConfig};
use flowsync_core::orchestration::TwoPhaseImportOrchestrator;
use flowsync_core::registry::MemoryRegistryStore;

use super::FakeWorkflowApi;

/// A definition document that calls each of `dependencies` as a sub-definition
pub fn definition_doc(name: &str, dependencies: &[&str]) -> Value {
    let mut nodes = vec![json!({
        "name": "Start",
        "type": "n8n-nodes-base.executeWorkflowTrigger",
        "parameters": {}
    })];
    for (index, dependency) in dependencies.iter().enumerate() {
        nodes.push(json!({
            "name": format!("Call {index}"),
            "type": "n8n-nodes-base.executeWorkflow",
            "parameters": { "workflowId": dependency }
        }));
    }
    json!({
        "name": name,
        "nodes": nodes,
        "connections": {},
        "settings": { "executionOrder": "v1" },
        "tags": [{ "name": "bundled" }]
    })
}

/// A webhook-triggered definition that uses a credential
pub fn webhook_doc(name: &str, path: &str) -> Value {
    json!({
        "name": name,
        "nodes": [
            {
                "name": "Webhook",
                "type": "n8n-nodes-base.webhook",
                "parameters": { "path": path }
            },
            {
                "name": "Post",
                "type": "n8n-nodes-base.slack",
                "parameters": {},
                "credentials": { "slackApi": { "id": "3", "name": "Slack" } }
            }
        ],
        "connections": {}
    })
}

pub fn write_definition(dir: &Path, filename: &str, doc: &Value) {
    let body = serde_json::to_vec_pretty(doc).expect("serialize fixture");
    std::fs::write(dir.join(filename), body).expect("write fixture");
}

/// Bundle directory with the given files, in declared order
pub fn bundle(files: &[(&str, Value)]) -> (TempDir, ImportSettings) {
    let dir = tempfile::tempdir().expect("tempdir");
    for (filename, doc) in files {
        write_definition(dir.path(), filename, doc);
    }
    let settings = fast_settings(
        dir.path(),
        files.iter().map(|(f, _)| f.to_string()).collect(),
    );
    (dir, settings)
}

/// The chain A <- B <- C used throughout the suite
pub fn chain_bundle() -> (TempDir, ImportSettings) {
    bundle(&[
        ("a.json", definition_doc("A", &[])),
        ("b.json", definition_doc("B", &["A"])),
        ("c.json", definition_doc("C", &["B"])),
    ])
}

/// Settings without pacing delays or retry back-off
pub fn fast_settings(dir: &Path, order: Vec<String>) -> ImportSettings {
    ImportSettings {
        definitions_dir: dir.to_path_buf(),
        definition_order: order,
        phase1_delay_ms: 0,
        phase2_delay_ms: 0,
        activation_retry: RetryPolicyConfig {
            max_attempts: 3,
            initial_delay_ms: 0,
            backoff_factor: 1.0,
            max_delay_ms: None,
        },
        cleanup_policy: None,
    }
}

pub struct Harness {
    pub api: Arc<FakeWorkflowApi>,
    pub registry: Arc<MemoryRegistryStore>,
    pub settings: ImportSettings,
    _dir: TempDir,
}

impl Harness {
    pub fn new((dir, settings): (TempDir, ImportSettings)) -> Self {
        Self {
            api: Arc::new(FakeWorkflowApi::new()),
            registry: Arc::new(MemoryRegistryStore::new()),
            settings,
            _dir: dir,
        }
    }

    pub fn orchestrator(&self) -> TwoPhaseImportOrchestrator {
        TwoPhaseImportOrchestrator::new(self.api.clone(), self.registry.clone(), &self.settings)
    }

    pub fn dir(&self) -> &Path {
        self._dir.path()
    }
}

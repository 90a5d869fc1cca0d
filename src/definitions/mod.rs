//! # Bundled Definitions
//!
//! Workflow definition files shipped with the application, as loaded from disk,
//! and the write payload derived from them for the remote API.

pub mod checksum;
pub mod loader;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::node_kinds;

pub use checksum::content_checksum;
pub use loader::{BundledDefinitionLoader, LoadedBundle, SkippedDefinition};

/// A bundled definition file, parsed and analysed
///
/// Produced fresh on every load; identity is the filename.
#[derive(Debug, Clone, PartialEq)]
pub struct BundledDefinition {
    pub filename: String,
    pub name: String,
    /// Hex SHA-256 of the raw file bytes
    pub checksum: String,
    /// Endpoint paths of trigger nodes
    pub trigger_paths: Vec<String>,
    pub node_count: usize,
    /// At least one node references stored credentials
    pub has_secret_references: bool,
    /// Names of definitions invoked through sub-definition nodes
    pub dependency_names: Vec<String>,
    document: Value,
}

impl BundledDefinition {
    pub(crate) fn new(
        filename: String,
        checksum: String,
        document: Value,
    ) -> Result<Self, &'static str> {
        let name = document
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())
            .ok_or("name")?
            .to_string();
        let nodes = document
            .get("nodes")
            .and_then(Value::as_array)
            .ok_or("nodes")?;

        let trigger_paths = extract_trigger_paths(nodes);
        let dependency_names = extract_dependency_names(nodes);
        let has_secret_references = nodes.iter().any(node_has_credentials);
        let node_count = nodes.len();

        Ok(Self {
            filename,
            name,
            checksum,
            trigger_paths,
            node_count,
            has_secret_references,
            dependency_names,
            document,
        })
    }

    /// The parsed document exactly as shipped
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Build the create/update body, with credential references stripped
    ///
    /// A fresh instance rejects definitions pointing at credential ids it does
    /// not have, so every node loses its `credentials` block. Read-only fields
    /// such as `tags` are never sent.
    pub fn to_payload(&self) -> WorkflowPayload {
        let nodes = self
            .document
            .get("nodes")
            .and_then(Value::as_array)
            .map(|nodes| nodes.iter().map(strip_credentials).collect())
            .unwrap_or_default();

        WorkflowPayload {
            name: self.name.clone(),
            nodes,
            connections: self
                .document
                .get("connections")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
            settings: self
                .document
                .get("settings")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
            static_data: self
                .document
                .get("staticData")
                .filter(|v| !v.is_null())
                .cloned(),
        }
    }
}

/// Body of a create/update call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPayload {
    pub name: String,
    pub nodes: Vec<Value>,
    pub connections: Value,
    pub settings: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_data: Option<Value>,
}

fn node_type(node: &Value) -> Option<&str> {
    node.get("type").and_then(Value::as_str)
}

fn node_has_credentials(node: &Value) -> bool {
    node.get(node_kinds::CREDENTIALS_KEY)
        .and_then(Value::as_object)
        .is_some_and(|creds| !creds.is_empty())
}

fn strip_credentials(node: &Value) -> Value {
    let mut node = node.clone();
    if let Some(obj) = node.as_object_mut() {
        obj.remove(node_kinds::CREDENTIALS_KEY);
    }
    node
}

fn extract_trigger_paths(nodes: &[Value]) -> Vec<String> {
    let mut paths = Vec::new();
    for node in nodes {
        let is_trigger = node_type(node)
            .is_some_and(|t| node_kinds::TRIGGER_ENDPOINTS.contains(&t));
        if !is_trigger {
            continue;
        }
        let path = node
            .get("parameters")
            .and_then(|p| p.get(node_kinds::TRIGGER_PATH_PARAMETER))
            .and_then(Value::as_str)
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty());
        if let Some(path) = path {
            if !paths.iter().any(|existing| existing == path) {
                paths.push(path.to_string());
            }
        }
    }
    paths
}

/// Referenced definition names from sub-definition nodes
///
/// The reference parameter is either a plain string or a resource locator
/// object; for the latter the cached display name wins over the raw value.
fn extract_dependency_names(nodes: &[Value]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for node in nodes {
        let is_sub_definition = node_type(node)
            .is_some_and(|t| node_kinds::EXECUTE_SUB_DEFINITION.contains(&t));
        if !is_sub_definition {
            continue;
        }
        let reference = node
            .get("parameters")
            .and_then(|p| p.get(node_kinds::SUB_DEFINITION_PARAMETER));
        let name = match reference {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(Value::Object(locator)) => locator
                .get("cachedResultName")
                .and_then(Value::as_str)
                .or_else(|| locator.get("value").and_then(Value::as_str)),
            _ => None,
        };
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            if !names.iter().any(|existing| existing == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

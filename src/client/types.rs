//! Wire types for the remote workflow API.

use serde::{Deserialize, Serialize};

/// A workflow as reported by the remote system
///
/// Only the fields the engine consumes are kept; everything else in the
/// response is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteWorkflow {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub active: bool,
}

/// Response of the activate/deactivate endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationState {
    pub active: bool,
}

impl From<&RemoteWorkflow> for ActivationState {
    fn from(workflow: &RemoteWorkflow) -> Self {
        Self {
            active: workflow.active,
        }
    }
}

/// One page of the list endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkflowPage {
    #[serde(default)]
    pub data: Vec<RemoteWorkflow>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Extract a human-readable message from an error body
///
/// Accepts `{"message": ..}`, `{"error": ".."}` and `{"error": {"message": ..}}`;
/// anything else is returned as trimmed text.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = serde_json::from_str::<serde_json::Value>(trimmed).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        v.get("message")
            .and_then(|m| m.as_str())
            .or_else(|| v.get("error").and_then(|e| e.as_str()))
            .or_else(|| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
            })
            .map(str::to_string)
    });
    Some(from_json.unwrap_or_else(|| trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_variants() {
        assert_eq!(
            extract_error_message(r#"{"message":"Workflow is not published"}"#).as_deref(),
            Some("Workflow is not published")
        );
        assert_eq!(
            extract_error_message(r#"{"error":"bad key"}"#).as_deref(),
            Some("bad key")
        );
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"nested"}}"#).as_deref(),
            Some("nested")
        );
        assert_eq!(
            extract_error_message("<html>Bad Gateway</html>").as_deref(),
            Some("<html>Bad Gateway</html>")
        );
        assert_eq!(extract_error_message("   "), None);
    }

    #[test]
    fn test_remote_workflow_ignores_extra_fields() {
        let wf: RemoteWorkflow = serde_json::from_str(
            r#"{"id":"7","name":"A","active":true,"nodes":[],"tags":[]}"#,
        )
        .unwrap();
        assert_eq!(wf.id, "7");
        assert!(wf.active);
    }
}

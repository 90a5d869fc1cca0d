//! # System Constants
//!
//! Operational boundaries of the deployment engine: remote API paths, node kinds
//! recognised in bundled definitions, pacing and retry defaults, and the fixed
//! messages written into the registry.

/// Node kinds inspected when scanning bundled definitions
pub mod node_kinds {
    /// Node kinds that invoke another workflow definition by reference
    pub const EXECUTE_SUB_DEFINITION: [&str; 2] = [
        "n8n-nodes-base.executeWorkflow",
        "@n8n/n8n-nodes-langchain.toolWorkflow",
    ];

    /// Parameter holding the referenced definition on sub-definition nodes
    pub const SUB_DEFINITION_PARAMETER: &str = "workflowId";

    /// Trigger node kinds that expose an HTTP endpoint path
    pub const TRIGGER_ENDPOINTS: [&str; 3] = [
        "n8n-nodes-base.webhook",
        "n8n-nodes-base.formTrigger",
        "@n8n/n8n-nodes-langchain.chatTrigger",
    ];

    /// Parameter holding the endpoint path on trigger nodes
    pub const TRIGGER_PATH_PARAMETER: &str = "path";

    /// Node-level key holding credential references
    pub const CREDENTIALS_KEY: &str = "credentials";
}

/// Remote API routes, relative to the configured instance URL
pub mod api {
    pub const BASE_PATH: &str = "api/v1";
    pub const WORKFLOWS: &str = "workflows";
    pub const ACTIVATE: &str = "activate";
    pub const DEACTIVATE: &str = "deactivate";
    pub const DEFAULT_API_KEY_HEADER: &str = "X-N8N-API-KEY";
    pub const LIST_PAGE_SIZE: u32 = 250;
    pub const WEBHOOK_PATH_PREFIX: &str = "webhook";
}

/// Timing defaults for the import run
pub mod timing {
    /// Pause after every successful Phase-1 create/update call
    pub const DEFAULT_PHASE1_DELAY_MS: u64 = 500;
    /// Pause after every Phase-2 activation attempt
    pub const DEFAULT_PHASE2_DELAY_MS: u64 = 2_000;
    pub const DEFAULT_ACTIVATION_MAX_ATTEMPTS: u32 = 5;
    pub const DEFAULT_ACTIVATION_INITIAL_DELAY_MS: u64 = 2_000;
    pub const DEFAULT_ACTIVATION_BACKOFF_FACTOR: f64 = 2.0;
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
}

/// Messages recorded in registry `last_error`
pub mod messages {
    pub const ROLLED_BACK: &str = "rolled back";
    pub const STUCK_IMPORT_RESET: &str =
        "import interrupted: process restarted while the import was in flight";
    pub const DELETED_REMOTELY: &str = "definition no longer exists on the remote system";
    pub const CLEANUP_DELETED: &str = "removed after failed activation";
}

/// SQLSTATE for `undefined_table`
pub const PG_UNDEFINED_TABLE: &str = "42P01";

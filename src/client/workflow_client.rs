//! # Workflow API Client
//!
//! HTTP client for the remote instance's public REST API. Every request carries
//! the API key header; non-2xx responses become [`RemoteApiError::Api`] with the
//! status code and the message extracted from the error body.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, Url};
use std::collections::HashSet;
use tracing::{debug, error, info};

use super::types::{extract_error_message, ActivationState, RemoteWorkflow, WorkflowPage};
use super::WorkflowApi;
use crate::config::{RemoteApiConfig, RemoteConfigProvider};
use crate::constants::api;
use crate::definitions::WorkflowPayload;
use crate::error::{DeployerError, DeployerResult, RemoteApiError, RemoteResult};

/// HTTP implementation of [`WorkflowApi`]
///
/// Built from an explicit [`RemoteApiConfig`]; there is no shared or cached
/// client between configurations.
#[derive(Clone)]
pub struct HttpWorkflowClient {
    client: Client,
    config: RemoteApiConfig,
    base_url: Url,
}

impl std::fmt::Debug for HttpWorkflowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpWorkflowClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout_ms", &self.config.timeout_ms)
            .finish()
    }
}

impl HttpWorkflowClient {
    pub fn new(config: RemoteApiConfig) -> DeployerResult<Self> {
        config.validate()?;

        let base_url = Url::parse(&format!(
            "{}/{}/",
            config.api_url.trim_end_matches('/'),
            api::BASE_PATH
        ))
        .map_err(|e| DeployerError::ConfigurationError(format!("Invalid api_url: {e}")))?;

        let header_name = HeaderName::from_bytes(config.api_key_header.as_bytes()).map_err(|e| {
            DeployerError::ConfigurationError(format!("Invalid API key header name: {e}"))
        })?;
        let mut header_value = HeaderValue::from_str(&config.api_key)
            .map_err(|e| DeployerError::ConfigurationError(format!("Invalid API key: {e}")))?;
        header_value.set_sensitive(true);

        let mut default_headers = HeaderMap::new();
        default_headers.insert(header_name, header_value);

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("flowsync/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(default_headers)
            .build()
            .map_err(|e| {
                DeployerError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
            })?;

        info!(
            base_url = %base_url,
            timeout_ms = config.timeout_ms,
            "Created workflow API client"
        );

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Resolve the configuration through `provider` and build a client
    pub async fn from_provider(provider: &dyn RemoteConfigProvider) -> DeployerResult<Self> {
        let config = provider
            .remote_config()
            .await?
            .ok_or(DeployerError::NotConfigured)?;
        Self::new(config)
    }

    pub fn config(&self) -> &RemoteApiConfig {
        &self.config
    }

    fn endpoint(&self, segments: &[&str]) -> RemoteResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn handle_response<T>(&self, response: Response, operation: &str) -> RemoteResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        if response.status().is_success() {
            let result = response.json::<T>().await.map_err(|e| {
                RemoteApiError::InvalidResponse(format!("Failed to parse {operation} response: {e}"))
            })?;
            debug!("Successfully completed operation: {}", operation);
            Ok(result)
        } else {
            Err(Self::error_from_response(response, operation).await)
        }
    }

    async fn error_from_response(response: Response, operation: &str) -> RemoteApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });
        error!(status = %status, error = %message, "Failed operation: {}", operation);
        RemoteApiError::api(status.as_u16(), message)
    }
}

#[async_trait::async_trait]
impl WorkflowApi for HttpWorkflowClient {
    async fn create_workflow(&self, payload: &WorkflowPayload) -> RemoteResult<RemoteWorkflow> {
        let url = self.endpoint(&[api::WORKFLOWS])?;
        debug!(url = %url, name = %payload.name, "Creating workflow");
        let response = self.client.post(url).json(payload).send().await?;
        self.handle_response(response, "create workflow").await
    }

    async fn update_workflow(
        &self,
        id: &str,
        payload: &WorkflowPayload,
    ) -> RemoteResult<RemoteWorkflow> {
        let url = self.endpoint(&[api::WORKFLOWS, id])?;
        debug!(url = %url, name = %payload.name, "Updating workflow");
        let response = self.client.put(url).json(payload).send().await?;
        self.handle_response(response, "update workflow").await
    }

    async fn delete_workflow(&self, id: &str) -> RemoteResult<()> {
        let url = self.endpoint(&[api::WORKFLOWS, id])?;
        debug!(url = %url, "Deleting workflow");
        let response = self.client.delete(url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(response, "delete workflow").await)
        }
    }

    async fn activate_workflow(&self, id: &str) -> RemoteResult<ActivationState> {
        let url = self.endpoint(&[api::WORKFLOWS, id, api::ACTIVATE])?;
        debug!(url = %url, "Activating workflow");
        let response = self.client.post(url).send().await?;
        let workflow: RemoteWorkflow = self.handle_response(response, "activate workflow").await?;
        Ok(ActivationState::from(&workflow))
    }

    async fn deactivate_workflow(&self, id: &str) -> RemoteResult<ActivationState> {
        let url = self.endpoint(&[api::WORKFLOWS, id, api::DEACTIVATE])?;
        debug!(url = %url, "Deactivating workflow");
        let response = self.client.post(url).send().await?;
        let workflow: RemoteWorkflow =
            self.handle_response(response, "deactivate workflow").await?;
        Ok(ActivationState::from(&workflow))
    }

    async fn get_workflow(&self, id: &str) -> RemoteResult<Option<RemoteWorkflow>> {
        let url = self.endpoint(&[api::WORKFLOWS, id])?;
        let response = self.client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.handle_response(response, "get workflow").await.map(Some)
    }

    async fn list_workflows(&self) -> RemoteResult<Vec<RemoteWorkflow>> {
        let mut workflows = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();

        loop {
            let mut url = self.endpoint(&[api::WORKFLOWS])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("limit", &api::LIST_PAGE_SIZE.to_string());
                if let Some(ref c) = cursor {
                    query.append_pair("cursor", c);
                }
            }

            let response = self.client.get(url).send().await?;
            let page: WorkflowPage = self.handle_response(response, "list workflows").await?;
            workflows.extend(page.data);

            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => {
                    // a cursor seen before would page forever
                    if !seen.insert(next.clone()) {
                        return Err(RemoteApiError::InvalidResponse(format!(
                            "list workflows returned cursor {next:?} twice"
                        )));
                    }
                    cursor = Some(next);
                }
                None => break,
            }
        }

        debug!(count = workflows.len(), "Listed remote workflows");
        Ok(workflows)
    }
}

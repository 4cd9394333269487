//! Azure Resource Manager client implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use super::models::{api_versions, ErrorResponse, Workspace};
use crate::config::WorkspaceConfig;
use crate::providers::traits::{
    AccessToken, ProvisionError, ProvisioningState, ResourceScope, TokenCredential,
};

/// Default Azure Resource Manager endpoint.
pub const ARM_ENDPOINT: &str = "https://management.azure.com";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Polling interval when waiting for resources.
const POLL_INTERVAL_SECS: u64 = 15;

/// Tokens expiring within this many seconds are refreshed before use.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// How long-running operations are awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between status checks.
    pub interval: Duration,
    /// Give up after this long. `None` waits until the control plane reports
    /// a terminal state.
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(POLL_INTERVAL_SECS),
            timeout: None,
        }
    }
}

/// Azure control-plane client for one ML workspace.
///
/// Implements [`ManagementClient`](crate::providers::ManagementClient) for
/// Content Safety accounts, and [`ModelRegistry`](crate::providers::ModelRegistry)
/// and [`ServingPlatform`](crate::providers::ServingPlatform) for the workspace.
#[derive(Clone)]
pub struct Azure {
    /// HTTP client.
    pub(super) client: Client,
    /// ARM base URL, without trailing slash.
    pub(super) endpoint: String,
    /// Registry discovery base URL; derived from the workspace location when unset.
    registry_discovery: Option<String>,
    /// Token source.
    credential: Arc<dyn TokenCredential>,
    /// Last token acquired from `credential`.
    token: Arc<Mutex<Option<AccessToken>>>,
    /// Target workspace.
    pub(super) workspace: WorkspaceConfig,
    /// Long-running operation polling.
    pub(super) poll: PollSettings,
    /// Workspace location, fetched on first use.
    workspace_location: OnceCell<String>,
}

impl Azure {
    /// Create a new Azure client.
    ///
    /// # Arguments
    /// * `workspace` - ML workspace to deploy into
    /// * `credential` - source of management-plane tokens; a token is acquired
    ///   on first use and re-acquired when it is about to expire
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(
        workspace: WorkspaceConfig,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(ProvisionError::Http)?;

        Ok(Self {
            client,
            endpoint: ARM_ENDPOINT.to_string(),
            registry_discovery: None,
            credential,
            token: Arc::new(Mutex::new(None)),
            workspace,
            poll: PollSettings::default(),
            workspace_location: OnceCell::new(),
        })
    }

    /// Use a different ARM endpoint (sovereign clouds, tests).
    ///
    /// # Errors
    /// Returns error if `endpoint` is not an absolute URL.
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, ProvisionError> {
        let url = url::Url::parse(endpoint)
            .map_err(|e| ProvisionError::Config(format!("Invalid ARM endpoint {endpoint}: {e}")))?;
        self.endpoint = url.as_str().trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Use a fixed registry discovery endpoint instead of the one in the
    /// workspace's region.
    ///
    /// # Errors
    /// Returns error if `endpoint` is not an absolute URL.
    pub fn with_registry_discovery(mut self, endpoint: &str) -> Result<Self, ProvisionError> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            ProvisionError::Config(format!("Invalid registry discovery endpoint {endpoint}: {e}"))
        })?;
        self.registry_discovery = Some(url.as_str().trim_end_matches('/').to_string());
        Ok(self)
    }

    /// Override long-running operation polling.
    #[must_use]
    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Acquire a token now, so credential problems surface before any
    /// resource is touched.
    ///
    /// # Errors
    /// Returns the credential's error.
    pub async fn authenticate(&self) -> Result<(), ProvisionError> {
        self.bearer().await.map(|_| ())
    }

    /// Current bearer token, refreshed when missing or about to expire.
    async fn bearer(&self) -> Result<String, ProvisionError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if !expires_soon(token) {
                return Ok(token.token.clone());
            }
            debug!(expires_on = ?token.expires_on, "Access token expiring, refreshing");
        }

        let token = self.credential.get_token().await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Resource group URL for a scope.
    pub(super) fn scope_url(&self, scope: &ResourceScope) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}",
            self.endpoint, scope.subscription_id, scope.resource_group
        )
    }

    /// Machine Learning provider URL for the workspace's resource group.
    fn ml_provider_url(&self) -> String {
        format!(
            "{}/providers/Microsoft.MachineLearningServices",
            self.scope_url(&self.workspace.scope())
        )
    }

    /// Workspace URL.
    pub(super) fn workspace_url(&self) -> String {
        format!(
            "{}/workspaces/{}",
            self.ml_provider_url(),
            self.workspace.workspace_name
        )
    }

    /// Location of the workspace; endpoints and deployments are created there.
    pub(super) async fn workspace_location(&self) -> Result<&str, ProvisionError> {
        let location = self
            .workspace_location
            .get_or_try_init(|| async {
                let url = format!(
                    "{}?api-version={}",
                    self.workspace_url(),
                    api_versions::MACHINE_LEARNING
                );
                let workspace: Workspace = self.get(&url).await?;
                debug!(workspace = %workspace.name, location = %workspace.location, "Resolved workspace location");
                Ok::<_, ProvisionError>(workspace.location)
            })
            .await?;
        Ok(location.as_str())
    }

    /// Registry discovery base URL.
    pub(super) async fn registry_discovery_url(&self) -> Result<String, ProvisionError> {
        match &self.registry_discovery {
            Some(url) => Ok(url.clone()),
            None => Ok(format!(
                "https://{}.api.azureml.ms",
                self.workspace_location().await?
            )),
        }
    }

    /// Make an authenticated GET request.
    pub(super) async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, ProvisionError> {
        debug!(url = %url, "GET request");

        let token = self.bearer().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated PUT request.
    pub(super) async fn put<T, B>(&self, url: &str, body: &B) -> Result<T, ProvisionError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        debug!(url = %url, "PUT request");

        let token = self.bearer().await?;
        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated POST request without a body.
    pub(super) async fn post<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, ProvisionError> {
        debug!(url = %url, "POST request");

        let token = self.bearer().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header("Content-Length", "0")
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated POST request with a JSON body.
    pub(super) async fn post_json<T, B>(&self, url: &str, body: &B) -> Result<T, ProvisionError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        debug!(url = %url, "POST request");

        let token = self.bearer().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// PUT raw bytes to a block blob addressed by a SAS URL.
    pub(super) async fn put_blob(&self, url: url::Url, body: Vec<u8>) -> Result<(), ProvisionError> {
        debug!(path = %url.path(), bytes = body.len(), "Blob upload");

        let response = self
            .client
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await?;
            Err(Self::api_error(status, text))
        }
    }

    /// Handle API response.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProvisionError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                ProvisionError::Serialization(e)
            })
        } else if status == StatusCode::NOT_FOUND {
            Err(ProvisionError::NotFound(text))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(ProvisionError::Auth(text))
        } else {
            Err(Self::api_error(status, text))
        }
    }

    /// Classify an ARM error body.
    pub(super) fn api_error(status: StatusCode, text: String) -> ProvisionError {
        match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(body) if body.error.code.contains("Quota") => {
                ProvisionError::QuotaExceeded(format!("{}: {}", body.error.code, body.error.message))
            }
            Ok(body) => ProvisionError::Api {
                status: status.as_u16(),
                message: format!("{}: {}", body.error.code, body.error.message),
            },
            Err(_) => ProvisionError::Api {
                status: status.as_u16(),
                message: text,
            },
        }
    }

    /// PUT a resource and wait until its provisioning state is terminal.
    ///
    /// Returns the resource as last read. Any terminal state other than
    /// `Succeeded` is an error.
    pub(super) async fn put_and_wait<T, B, F>(
        &self,
        url: &str,
        body: &B,
        resource: &str,
        state_of: F,
    ) -> Result<T, ProvisionError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
        F: Fn(&T) -> ProvisioningState,
    {
        let created: T = self.put(url, body).await?;
        let state = state_of(&created);
        if state.is_terminal() {
            return Self::finish(created, state, resource);
        }
        self.wait_for(url, resource, state_of).await
    }

    /// Poll a resource until its provisioning state is terminal.
    pub(super) async fn wait_for<T, F>(
        &self,
        url: &str,
        resource: &str,
        state_of: F,
    ) -> Result<T, ProvisionError>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(&T) -> ProvisioningState,
    {
        info!(
            resource = %resource,
            timeout_secs = self.poll.timeout.map(|t| t.as_secs()),
            "Waiting for operation to complete"
        );

        let start = std::time::Instant::now();

        loop {
            let current: T = self.get(url).await?;
            let state = state_of(&current);

            debug!(
                resource = %resource,
                state = %state,
                elapsed_secs = start.elapsed().as_secs(),
                "Polling provisioning state"
            );

            if state.is_terminal() {
                return Self::finish(current, state, resource);
            }

            if let Some(timeout) = self.poll.timeout {
                if start.elapsed() > timeout {
                    return Err(ProvisionError::Timeout(timeout.as_secs()));
                }
            }

            tokio::time::sleep(self.poll.interval).await;
        }
    }

    fn finish<T>(value: T, state: ProvisioningState, resource: &str) -> Result<T, ProvisionError> {
        if state == ProvisioningState::Succeeded {
            info!(resource = %resource, "Operation succeeded");
            Ok(value)
        } else {
            Err(ProvisionError::OperationFailed {
                resource: resource.to_string(),
                state,
            })
        }
    }
}

fn expires_soon(token: &AccessToken) -> bool {
    token.expires_on.is_some_and(|expires_on| {
        expires_on - Utc::now() < chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)
    })
}

/// Provisioning state from an optional `provisioningState` field.
///
/// A resource that reports no state is treated as settled.
pub(super) fn state_or_succeeded(state: Option<&str>) -> ProvisioningState {
    state.map_or(ProvisioningState::Succeeded, ProvisioningState::from_arm)
}

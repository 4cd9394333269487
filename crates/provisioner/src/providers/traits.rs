//! Control-plane collaborator traits and common types.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Errors that can occur while talking to the control plane.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The requested model version does not exist in the registry.
    #[error("Model {name} version {version} not found in registry {registry}")]
    ModelNotFound {
        registry: String,
        name: String,
        version: String,
    },

    /// A long-running operation reached a terminal state other than success.
    #[error("Operation on {resource} finished in state {state}")]
    OperationFailed {
        resource: String,
        state: ProvisioningState,
    },

    /// Operation timed out.
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication error.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Credential could not be acquired.
    #[error("Credential unavailable: {0}")]
    Credential(String),

    /// Quota exceeded.
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Local file could not be read.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Scope and lifecycle
// ============================================================================

/// Subscription and resource group a management call is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceScope {
    /// Subscription ID.
    pub subscription_id: String,
    /// Resource group name.
    pub resource_group: String,
}

impl ResourceScope {
    /// Create a new scope.
    pub fn new(subscription_id: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
        }
    }
}

/// Provisioning state of a remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    /// Being created.
    Creating,
    /// Being updated.
    Updating,
    /// Accepted, not started yet.
    Accepted,
    /// Provisioning in progress.
    Provisioning,
    /// Completed successfully.
    Succeeded,
    /// Completed with an error.
    Failed,
    /// Canceled before completion.
    Canceled,
    /// Being deleted.
    Deleting,
    /// A state this client does not know.
    #[serde(other)]
    Unknown,
}

impl ProvisioningState {
    /// Parse the `provisioningState` string reported by the control plane.
    #[must_use]
    pub fn from_arm(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "creating" => Self::Creating,
            "updating" => Self::Updating,
            "accepted" => Self::Accepted,
            "provisioning" => Self::Provisioning,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            "deleting" => Self::Deleting,
            _ => Self::Unknown,
        }
    }

    /// Whether the operation has stopped making progress.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creating => write!(f, "creating"),
            Self::Updating => write!(f, "updating"),
            Self::Accepted => write!(f, "accepted"),
            Self::Provisioning => write!(f, "provisioning"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Canceled => write!(f, "canceled"),
            Self::Deleting => write!(f, "deleting"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Content Safety account types
// ============================================================================

/// A Content Safety account (the moderation dependency of the endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSafetyAccount {
    /// Resource ID.
    pub id: String,
    /// Account name.
    pub name: String,
    /// Account kind (e.g. `ContentSafety`).
    pub kind: String,
    /// Location as reported by the control plane (e.g. `eastus`).
    pub location: String,
    /// SKU name (e.g. `S0`).
    pub sku: String,
    /// Whether the account accepts traffic from public networks.
    pub public_network_access: bool,
    /// Custom sub-domain name.
    pub custom_sub_domain: Option<String>,
    /// Generated endpoint URL.
    pub endpoint: Option<String>,
    /// Current provisioning state.
    pub provisioning_state: ProvisioningState,
}

/// Request to create a Content Safety account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    /// Account name.
    pub name: String,
    /// Account kind.
    pub kind: String,
    /// Location (control-plane form, e.g. `eastus`).
    pub location: String,
    /// SKU name.
    pub sku: String,
    /// Custom sub-domain name.
    pub custom_sub_domain: String,
    /// Enable public network access.
    pub public_network_access: bool,
}

/// Access keys of a Content Safety account.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountKeys {
    /// Primary key.
    pub key1: String,
    /// Secondary key.
    pub key2: Option<String>,
}

impl std::fmt::Debug for AccountKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKeys")
            .field("key1", &"<redacted>")
            .field("key2", &self.key2.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// Model registry types
// ============================================================================

/// A model version resolved against a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelReference {
    /// Registry the model was resolved from.
    pub registry: String,
    /// Model name.
    pub name: String,
    /// Model version.
    pub version: String,
    /// Opaque identifier handed to deployments.
    pub id: String,
}

// ============================================================================
// Serving types
// ============================================================================

/// A managed online endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OnlineEndpoint {
    /// Endpoint name.
    pub name: String,
    /// Deployment name to traffic percentage.
    pub traffic: BTreeMap<String, u32>,
    /// Scoring URI, once provisioned.
    pub scoring_uri: Option<String>,
    /// Current provisioning state.
    pub provisioning_state: Option<ProvisioningState>,
}

impl OnlineEndpoint {
    /// Endpoint descriptor with no live traffic assigned.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sum of all traffic percentages.
    #[must_use]
    pub fn traffic_total(&self) -> u32 {
        self.traffic.values().sum()
    }

    /// A traffic map is valid when empty (no live traffic) or summing to 100.
    #[must_use]
    pub fn has_valid_traffic(&self) -> bool {
        self.traffic.is_empty() || self.traffic_total() == 100
    }
}

/// Code bundle and scoring script of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeConfiguration {
    /// Code asset ID.
    pub code: String,
    /// Entry script inside the bundle.
    pub scoring_script: String,
}

/// A managed online deployment under an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineDeployment {
    /// Deployment name.
    pub name: String,
    /// Owning endpoint name.
    pub endpoint_name: String,
    /// Model identifier.
    pub model: String,
    /// Compute SKU.
    pub instance_type: String,
    /// Number of instances.
    pub instance_count: u32,
    /// Code configuration.
    pub code_configuration: CodeConfiguration,
    /// Environment variables injected into the scoring container.
    pub environment_variables: BTreeMap<String, String>,
    /// Current provisioning state.
    pub provisioning_state: Option<ProvisioningState>,
}

// ============================================================================
// Credentials
// ============================================================================

/// A bearer token for the management plane.
#[derive(Clone)]
pub struct AccessToken {
    /// Token value.
    pub token: String,
    /// When the token expires, if known.
    pub expires_on: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Source of management-plane bearer tokens.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Acquire a token.
    async fn get_token(&self) -> Result<AccessToken, ProvisionError>;
}

/// Management operations over Content Safety accounts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// List accounts in the scope, in control-plane listing order.
    async fn list_accounts(
        &self,
        scope: &ResourceScope,
    ) -> Result<Vec<ContentSafetyAccount>, ProvisionError>;

    /// Create (or update) an account and wait for a terminal state.
    async fn create_account(
        &self,
        scope: &ResourceScope,
        req: &CreateAccountRequest,
    ) -> Result<ContentSafetyAccount, ProvisionError>;

    /// List the access keys of an account.
    async fn list_keys(
        &self,
        scope: &ResourceScope,
        account_name: &str,
    ) -> Result<AccountKeys, ProvisionError>;
}

/// Read access to a shared model registry.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Get an exact model version.
    async fn get_model(
        &self,
        registry: &str,
        name: &str,
        version: &str,
    ) -> Result<ModelReference, ProvisionError>;
}

/// Create-or-update operations on the serving platform.
///
/// Every method returns only once the remote operation is terminal.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ServingPlatform: Send + Sync {
    /// Create or update an endpoint.
    async fn create_or_update_endpoint(
        &self,
        endpoint: &OnlineEndpoint,
    ) -> Result<OnlineEndpoint, ProvisionError>;

    /// Create or replace a deployment.
    async fn create_or_update_deployment(
        &self,
        deployment: &OnlineDeployment,
    ) -> Result<OnlineDeployment, ProvisionError>;

    /// Upload a local code directory as a versioned code asset and return
    /// its asset ID.
    ///
    /// The version is derived from the directory contents, so uploading the
    /// same contents again returns the existing asset.
    async fn upload_code(&self, name: &str, local_path: &Path) -> Result<String, ProvisionError>;

    /// Replace the traffic map of an existing endpoint.
    async fn set_traffic(
        &self,
        endpoint: &OnlineEndpoint,
        traffic: &BTreeMap<String, u32>,
    ) -> Result<OnlineEndpoint, ProvisionError>;
}

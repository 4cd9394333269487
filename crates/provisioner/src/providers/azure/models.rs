//! Azure Resource Manager request and response models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Common
// ============================================================================

/// Paged list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    /// Next link for pagination.
    pub next_link: Option<String>,
}

/// Resource SKU.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sku {
    /// SKU name.
    pub name: String,
    /// Capacity (instance count for deployments).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

/// Managed identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedIdentity {
    /// Identity type.
    #[serde(rename = "type")]
    pub identity_type: String,
}

/// ARM error envelope.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorDetail,
}

/// ARM error details.
#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    /// Error code (e.g. `QuotaExceeded`).
    pub code: String,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Cognitive Services accounts
// ============================================================================

/// Cognitive Services account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitiveAccount {
    /// Resource ID.
    pub id: String,
    /// Account name.
    pub name: String,
    /// Account kind.
    #[serde(default)]
    pub kind: String,
    /// Location.
    pub location: String,
    /// SKU.
    pub sku: Option<Sku>,
    /// Account properties.
    #[serde(default)]
    pub properties: CognitiveAccountProperties,
}

/// Cognitive Services account properties.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitiveAccountProperties {
    /// Provisioning state.
    pub provisioning_state: Option<String>,
    /// Endpoint URL.
    pub endpoint: Option<String>,
    /// Custom sub-domain name.
    pub custom_sub_domain_name: Option<String>,
    /// `Enabled` or `Disabled`.
    pub public_network_access: Option<String>,
}

/// Create Cognitive Services account request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCognitiveAccountRequest {
    /// SKU.
    pub sku: Sku,
    /// Account kind.
    pub kind: String,
    /// Location.
    pub location: String,
    /// Properties.
    pub properties: CreateCognitiveAccountProperties,
}

/// Create Cognitive Services account properties.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCognitiveAccountProperties {
    /// Custom sub-domain name.
    pub custom_sub_domain_name: String,
    /// `Enabled` or `Disabled`.
    pub public_network_access: String,
}

/// `listKeys` response.
#[derive(Debug, Deserialize)]
pub struct CognitiveAccountKeys {
    /// Primary key.
    pub key1: String,
    /// Secondary key.
    pub key2: Option<String>,
}

// ============================================================================
// Machine Learning workspaces and registries
// ============================================================================

/// ML workspace (only the fields this client needs).
#[derive(Debug, Clone, Deserialize)]
pub struct Workspace {
    /// Workspace name.
    pub name: String,
    /// Location.
    pub location: String,
}

/// Registry model version.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersion {
    /// Resource ID.
    pub id: String,
    /// Version name.
    pub name: String,
    /// Properties.
    #[serde(default)]
    pub properties: ModelVersionProperties,
}

/// Registry model version properties.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersionProperties {
    /// Model storage URI.
    pub model_uri: Option<String>,
    /// Provisioning state.
    pub provisioning_state: Option<String>,
}

/// Registry discovery response: where a registry actually lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDiscovery {
    /// Registry name.
    #[serde(default)]
    pub registry_name: Option<String>,
    /// Subscription owning the registry.
    pub subscription_id: String,
    /// Resource group owning the registry.
    pub resource_group: String,
    /// Primary region.
    #[serde(default)]
    pub primary_region: Option<String>,
    /// Resource provider base URL serving the registry.
    pub primary_region_resource_provider_uri: String,
}

// ============================================================================
// Code assets
// ============================================================================

/// Code asset version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeVersionResource {
    /// Resource ID.
    #[serde(default, skip_serializing)]
    pub id: String,
    /// Properties.
    pub properties: CodeVersionProperties,
}

/// Code asset version properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeVersionProperties {
    /// Blob directory holding the code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_uri: Option<String>,
    /// Anonymous assets are not listed in the workspace.
    #[serde(default)]
    pub is_anonymous: bool,
    /// Provisioning state.
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
}

/// `startPendingUpload` request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUploadRequest {
    /// Always `TemporaryBlobReference`.
    pub pending_upload_type: String,
}

/// `startPendingUpload` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUploadResponse {
    /// Where to upload.
    pub blob_reference_for_consumption: BlobReference,
}

/// Temporary blob location for an upload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobReference {
    /// Blob directory URI, without credentials.
    pub blob_uri: String,
    /// Write credential.
    pub credential: BlobCredential,
}

/// SAS credential for a blob directory.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobCredential {
    /// Credential type (`SAS`).
    #[serde(default)]
    pub credential_type: Option<String>,
    /// Directory URI with SAS token.
    pub sas_uri: String,
}

// ============================================================================
// Online endpoints
// ============================================================================

/// Managed online endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineEndpointResource {
    /// Resource ID.
    #[serde(default, skip_serializing)]
    pub id: String,
    /// Endpoint name.
    #[serde(default, skip_serializing)]
    pub name: String,
    /// Location.
    pub location: String,
    /// Identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ManagedIdentity>,
    /// Properties.
    pub properties: OnlineEndpointProperties,
}

/// Managed online endpoint properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineEndpointProperties {
    /// `Key` or `AMLToken`.
    pub auth_mode: String,
    /// Deployment name to traffic percentage. Omitted when empty so an update
    /// does not clear the live split.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub traffic: BTreeMap<String, u32>,
    /// Scoring URI.
    #[serde(default, skip_serializing)]
    pub scoring_uri: Option<String>,
    /// Provisioning state.
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
}

/// Managed online deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineDeploymentResource {
    /// Resource ID.
    #[serde(default, skip_serializing)]
    pub id: String,
    /// Deployment name.
    #[serde(default, skip_serializing)]
    pub name: String,
    /// Location.
    pub location: String,
    /// Deployment kind.
    #[serde(default)]
    pub kind: String,
    /// SKU (capacity is the instance count).
    pub sku: Sku,
    /// Properties.
    pub properties: OnlineDeploymentProperties,
}

/// Managed online deployment properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineDeploymentProperties {
    /// Always `Managed`.
    pub endpoint_compute_type: String,
    /// Model asset ID.
    pub model: String,
    /// Compute SKU.
    pub instance_type: String,
    /// Code configuration.
    pub code_configuration: CodeConfigurationResource,
    /// Environment variables.
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
    /// Provisioning state.
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
}

/// Code configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeConfigurationResource {
    /// Code asset ID.
    pub code_id: String,
    /// Scoring script path inside the code asset.
    pub scoring_script: String,
}

// ============================================================================
// Common Azure types
// ============================================================================

/// Resource provider API versions.
pub mod api_versions {
    /// Cognitive Services.
    pub const COGNITIVE_SERVICES: &str = "2023-05-01";
    /// Machine Learning Services.
    pub const MACHINE_LEARNING: &str = "2023-10-01";
}

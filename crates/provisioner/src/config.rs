//! Provisioning configuration.
//!
//! Everything a run needs to know about *what* to provision lives in
//! [`ProvisionConfig`]. Its [`Default`] is the deployment this tool ships for:
//! a `Llama-2-7b-chat` endpoint guarded by an East US Content Safety account.
//! The workspace a run targets (subscription, resource group, workspace) comes
//! from a [`WorkspaceConfig`] file instead.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::providers::{ProvisionError, ResourceScope};

/// File name of the workspace configuration.
pub const WORKSPACE_CONFIG_FILE: &str = "config.json";

/// Directory that may hold the workspace configuration.
pub const WORKSPACE_CONFIG_DIR: &str = ".azureml";

/// Highest severity level Content Safety reports.
pub const MAX_SEVERITY: u8 = 7;

/// Locations where Content Safety accounts can be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyRegion {
    /// East US.
    EastUs,
    /// West Europe.
    WestEurope,
}

impl SafetyRegion {
    /// Display name (e.g. "East US").
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::EastUs => "East US",
            Self::WestEurope => "West Europe",
        }
    }

    /// Control-plane name (e.g. "eastus").
    #[must_use]
    pub fn arm_name(self) -> &'static str {
        match self {
            Self::EastUs => "eastus",
            Self::WestEurope => "westeurope",
        }
    }

    /// Whether a location string reported by the control plane is this region.
    ///
    /// Both "East US" and "eastus" match [`SafetyRegion::EastUs`].
    #[must_use]
    pub fn matches(self, location: &str) -> bool {
        normalize_location(location) == self.arm_name()
    }
}

impl std::fmt::Display for SafetyRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

fn normalize_location(location: &str) -> String {
    location
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Content Safety account settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSafetySettings {
    /// Account name and custom sub-domain of a newly created account.
    pub name: String,
    /// Account location.
    pub location: SafetyRegion,
    /// Account kind.
    pub kind: String,
    /// SKU name.
    pub sku: String,
    /// Severity at or above which content is rejected by the scoring script.
    pub threshold: u8,
    /// Enable public network access on a newly created account.
    pub public_network_access: bool,
}

impl Default for ContentSafetySettings {
    fn default() -> Self {
        Self {
            name: "content-safety-llama".to_string(),
            location: SafetyRegion::EastUs,
            kind: "ContentSafety".to_string(),
            sku: "S0".to_string(),
            threshold: 2,
            public_network_access: true,
        }
    }
}

/// Model settings.
///
/// Text generation models: `Llama-2-7b`, `Llama-2-13b`, `Llama-2-70b`.
/// Chat completion models: `Llama-2-7b-chat`, `Llama-2-13b-chat`, `Llama-2-70b-chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Model name.
    pub name: String,
    /// Exact model version.
    pub version: String,
    /// Registry holding the model.
    pub registry: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: "Llama-2-7b-chat".to_string(),
            version: "6".to_string(),
            registry: "azureml-meta".to_string(),
        }
    }
}

/// Endpoint and deployment settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSettings {
    /// Endpoint name.
    pub endpoint_name: String,
    /// Deployment name.
    pub deployment_name: String,
    /// Compute SKU of the deployment.
    pub instance_type: String,
    /// Number of instances.
    pub instance_count: u32,
    /// Scoring code: a code asset ID, or a local directory that is uploaded
    /// as a code asset versioned by its contents.
    pub code: String,
    /// Scoring script inside the code bundle.
    pub scoring_script: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            endpoint_name: "endpoint-llama".to_string(),
            deployment_name: "blue".to_string(),
            instance_type: "Standard_NC24s_v3".to_string(),
            instance_count: 1,
            code: "./llama/src/".to_string(),
            scoring_script: "score.py".to_string(),
        }
    }
}

/// Complete provisioning configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Content Safety account settings.
    pub content_safety: ContentSafetySettings,
    /// Model settings.
    pub model: ModelSettings,
    /// Endpoint settings.
    pub endpoint: EndpointSettings,
}

impl ProvisionConfig {
    /// Check the configuration before any remote call is made.
    ///
    /// # Errors
    /// Returns [`ProvisionError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        let required = [
            ("content_safety.name", &self.content_safety.name),
            ("content_safety.kind", &self.content_safety.kind),
            ("content_safety.sku", &self.content_safety.sku),
            ("model.name", &self.model.name),
            ("model.version", &self.model.version),
            ("model.registry", &self.model.registry),
            ("endpoint.endpoint_name", &self.endpoint.endpoint_name),
            ("endpoint.deployment_name", &self.endpoint.deployment_name),
            ("endpoint.instance_type", &self.endpoint.instance_type),
            ("endpoint.code", &self.endpoint.code),
            ("endpoint.scoring_script", &self.endpoint.scoring_script),
        ];
        if let Some((field, _)) = required.into_iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ProvisionError::Config(format!("{field} must not be empty")));
        }

        if self.content_safety.threshold > MAX_SEVERITY {
            return Err(ProvisionError::Config(format!(
                "content_safety.threshold must be between 0 and {MAX_SEVERITY}, got {}",
                self.content_safety.threshold
            )));
        }

        if self.endpoint.instance_count == 0 {
            return Err(ProvisionError::Config(
                "endpoint.instance_count must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Workspace the endpoint is deployed into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Subscription ID.
    pub subscription_id: String,
    /// Resource group name.
    pub resource_group: String,
    /// ML workspace name.
    pub workspace_name: String,
}

impl WorkspaceConfig {
    /// Management scope of the workspace.
    #[must_use]
    pub fn scope(&self) -> ResourceScope {
        ResourceScope::new(&self.subscription_id, &self.resource_group)
    }

    /// Load a workspace configuration file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or a field is empty.
    pub fn load(path: &Path) -> Result<Self, ProvisionError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content)?;

        if config.subscription_id.trim().is_empty()
            || config.resource_group.trim().is_empty()
            || config.workspace_name.trim().is_empty()
        {
            return Err(ProvisionError::Config(format!(
                "{} must set subscription_id, resource_group and workspace_name",
                path.display()
            )));
        }

        debug!(path = %path.display(), workspace = %config.workspace_name, "Loaded workspace config");
        Ok(config)
    }

    /// Find the workspace configuration file, starting at `start` and walking up.
    ///
    /// In each directory `config.json` is tried before `.azureml/config.json`.
    #[must_use]
    pub fn find(start: &Path) -> Option<PathBuf> {
        start.ancestors().find_map(|dir| {
            [
                dir.join(WORKSPACE_CONFIG_FILE),
                dir.join(WORKSPACE_CONFIG_DIR).join(WORKSPACE_CONFIG_FILE),
            ]
            .into_iter()
            .find(|candidate| candidate.is_file())
        })
    }

    /// Find and load the workspace configuration.
    ///
    /// # Errors
    /// Returns an error if no file is found, or it cannot be loaded.
    pub fn discover(start: &Path) -> Result<Self, ProvisionError> {
        let path = Self::find(start).ok_or_else(|| {
            ProvisionError::Config(format!(
                "No {WORKSPACE_CONFIG_FILE} found in {} or any parent directory",
                start.display()
            ))
        })?;
        Self::load(&path)
    }
}

//! Endpoint, deployment and traffic cutover.
//!
//! The steps run strictly in order, each waiting for the previous one's
//! remote state: local scoring code is registered first, the endpoint must
//! exist before the deployment is created, and traffic only moves once the
//! deployment has finished rolling out.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use crate::config::EndpointSettings;
use crate::content_safety::ContentSafetyConnection;
use crate::providers::{
    CodeConfiguration, ModelReference, OnlineDeployment, OnlineEndpoint, ProvisionError,
    ProvisioningState, ServingPlatform,
};

/// Environment variable holding the Content Safety endpoint URL.
pub const ENV_CONTENT_SAFETY_ENDPOINT: &str = "CONTENT_SAFETY_ENDPOINT";

/// Environment variable holding the Content Safety access key.
pub const ENV_CONTENT_SAFETY_KEY: &str = "CONTENT_SAFETY_KEY";

/// Environment variable holding the moderation severity threshold.
pub const ENV_CONTENT_SAFETY_THRESHOLD: &str = "CONTENT_SAFETY_THRESHOLD";

/// Whether `code` names a registered code asset rather than a local directory.
#[must_use]
pub fn is_code_asset_id(code: &str) -> bool {
    code.starts_with("/subscriptions/") || code.starts_with("azureml:")
}

/// Result of a completed deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentOutcome {
    /// Endpoint after cutover.
    pub endpoint: OnlineEndpoint,
    /// Deployment as provisioned.
    pub deployment: OnlineDeployment,
}

/// Deploys a model behind a managed online endpoint.
pub struct EndpointDeployer<'a> {
    platform: &'a dyn ServingPlatform,
    settings: &'a EndpointSettings,
}

impl<'a> EndpointDeployer<'a> {
    /// Create a deployer.
    pub fn new(platform: &'a dyn ServingPlatform, settings: &'a EndpointSettings) -> Self {
        Self { platform, settings }
    }

    /// The deployment this deployer creates.
    ///
    /// Its environment holds exactly the Content Safety endpoint, key and
    /// threshold. `code_id` is the code asset holding the scoring script.
    #[must_use]
    pub fn deployment_spec(
        &self,
        model: &ModelReference,
        connection: &ContentSafetyConnection,
        threshold: u8,
        code_id: &str,
    ) -> OnlineDeployment {
        let environment_variables = BTreeMap::from([
            (
                ENV_CONTENT_SAFETY_ENDPOINT.to_string(),
                connection.endpoint.clone(),
            ),
            (
                ENV_CONTENT_SAFETY_KEY.to_string(),
                connection.access_key.clone(),
            ),
            (ENV_CONTENT_SAFETY_THRESHOLD.to_string(), threshold.to_string()),
        ]);

        OnlineDeployment {
            name: self.settings.deployment_name.clone(),
            endpoint_name: self.settings.endpoint_name.clone(),
            model: model.id.clone(),
            instance_type: self.settings.instance_type.clone(),
            instance_count: self.settings.instance_count,
            code_configuration: CodeConfiguration {
                code: code_id.to_string(),
                scoring_script: self.settings.scoring_script.clone(),
            },
            environment_variables,
            provisioning_state: None,
        }
    }

    /// Code asset ID for the configured code, uploading a local directory.
    ///
    /// # Errors
    /// Returns the platform's error if the upload fails.
    pub async fn resolve_code(&self) -> Result<String, ProvisionError> {
        let code = &self.settings.code;
        if is_code_asset_id(code) {
            return Ok(code.clone());
        }

        let name = format!(
            "{}-{}-code",
            self.settings.endpoint_name, self.settings.deployment_name
        );
        let asset = self.platform.upload_code(&name, Path::new(code)).await?;
        info!(path = %code, asset = %asset, "Scoring code registered");
        Ok(asset)
    }

    /// Create or update the endpoint, without touching its traffic.
    ///
    /// # Errors
    /// Returns the platform's error.
    pub async fn ensure_endpoint(&self) -> Result<OnlineEndpoint, ProvisionError> {
        let endpoint = self
            .platform
            .create_or_update_endpoint(&OnlineEndpoint::new(&self.settings.endpoint_name))
            .await?;
        info!(endpoint = %endpoint.name, "Endpoint ready");
        Ok(endpoint)
    }

    /// Create or replace the deployment and wait for it to roll out.
    ///
    /// # Errors
    /// Returns the platform's error, or [`ProvisionError::OperationFailed`] if
    /// the platform reports a state other than succeeded.
    pub async fn create_deployment(
        &self,
        spec: &OnlineDeployment,
    ) -> Result<OnlineDeployment, ProvisionError> {
        let deployment = self.platform.create_or_update_deployment(spec).await?;

        match deployment.provisioning_state {
            None | Some(ProvisioningState::Succeeded) => {
                info!(
                    endpoint = %deployment.endpoint_name,
                    deployment = %deployment.name,
                    "Deployment ready"
                );
                Ok(deployment)
            }
            Some(state) => Err(ProvisionError::OperationFailed {
                resource: format!("{}/{}", spec.endpoint_name, spec.name),
                state,
            }),
        }
    }

    /// Route all traffic of `endpoint` to the configured deployment.
    ///
    /// # Errors
    /// Returns the platform's error.
    pub async fn cut_over(&self, endpoint: &OnlineEndpoint) -> Result<OnlineEndpoint, ProvisionError> {
        let traffic = BTreeMap::from([(self.settings.deployment_name.clone(), 100)]);
        let updated = self.platform.set_traffic(endpoint, &traffic).await?;

        if updated.traffic != traffic {
            warn!(
                endpoint = %updated.name,
                requested = ?traffic,
                reported = ?updated.traffic,
                "Endpoint reports a different traffic split than requested"
            );
        }

        info!(
            endpoint = %updated.name,
            deployment = %self.settings.deployment_name,
            "Traffic cut over"
        );
        Ok(updated)
    }

    /// Code, then endpoint, then deployment, then traffic cutover.
    ///
    /// # Errors
    /// Returns the first failing step's error; later steps are not attempted.
    pub async fn deploy(
        &self,
        model: &ModelReference,
        connection: &ContentSafetyConnection,
        threshold: u8,
    ) -> Result<DeploymentOutcome, ProvisionError> {
        let code_id = self.resolve_code().await?;
        let endpoint = self.ensure_endpoint().await?;
        let deployment = self
            .create_deployment(&self.deployment_spec(model, connection, threshold, &code_id))
            .await?;
        let endpoint = self.cut_over(&endpoint).await?;

        Ok(DeploymentOutcome {
            endpoint,
            deployment,
        })
    }
}

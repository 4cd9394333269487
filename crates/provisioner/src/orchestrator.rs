//! The provisioning pipeline.
//!
//! ```text
//! find-or-create Content Safety ──► resolve model ──► endpoint ──► deployment ──► cutover
//! ```
//!
//! The first failing stage aborts the run. Nothing is rolled back: a failed
//! run may leave a created account, or a deployment that receives no traffic.
//! Every stage converges when repeated, so re-running is the recovery path.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::config::ProvisionConfig;
use crate::content_safety::ContentSafetyProvisioner;
use crate::deployer::EndpointDeployer;
use crate::model::ModelResolver;
use crate::providers::{
    ContentSafetyAccount, ManagementClient, ModelReference, ModelRegistry, OnlineDeployment,
    OnlineEndpoint, ProvisionError, ResourceScope, ServingPlatform,
};

/// What a successful run converged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Content Safety account wired into the deployment.
    pub content_safety: ContentSafetyAccount,
    /// Whether this run created the account.
    pub content_safety_created: bool,
    /// Resolved model.
    pub model: ModelReference,
    /// Endpoint after cutover.
    pub endpoint: OnlineEndpoint,
    /// Deployment serving the model.
    pub deployment: OnlineDeployment,
}

impl ProvisionReport {
    /// Final traffic split of the endpoint.
    #[must_use]
    pub fn traffic(&self) -> &BTreeMap<String, u32> {
        &self.endpoint.traffic
    }
}

/// Runs the provisioning pipeline against a set of control-plane clients.
pub struct Orchestrator {
    config: ProvisionConfig,
    scope: ResourceScope,
    management: Arc<dyn ManagementClient>,
    registry: Arc<dyn ModelRegistry>,
    serving: Arc<dyn ServingPlatform>,
}

impl Orchestrator {
    /// Create an orchestrator.
    ///
    /// `scope` is where the Content Safety account is looked up and created.
    ///
    /// # Errors
    /// Returns [`ProvisionError::Config`] if `config` is invalid.
    pub fn new(
        config: ProvisionConfig,
        scope: ResourceScope,
        management: Arc<dyn ManagementClient>,
        registry: Arc<dyn ModelRegistry>,
        serving: Arc<dyn ServingPlatform>,
    ) -> Result<Self, ProvisionError> {
        config.validate()?;
        Ok(Self {
            config,
            scope,
            management,
            registry,
            serving,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Run every stage once, in order.
    ///
    /// # Errors
    /// Returns the first failing stage's error.
    pub async fn run(&self) -> Result<ProvisionReport, ProvisionError> {
        info!(
            resource_group = %self.scope.resource_group,
            endpoint = %self.config.endpoint.endpoint_name,
            deployment = %self.config.endpoint.deployment_name,
            "Starting provisioning run"
        );

        let content_safety = ContentSafetyProvisioner::new(
            self.management.as_ref(),
            &self.scope,
            &self.config.content_safety,
        );
        let resolved = content_safety.find_or_create().await?;
        let connection = content_safety.connection(&resolved.account).await?;

        let model = ModelResolver::new(self.registry.as_ref())
            .resolve(&self.config.model)
            .await?;

        let outcome = EndpointDeployer::new(self.serving.as_ref(), &self.config.endpoint)
            .deploy(&model, &connection, self.config.content_safety.threshold)
            .await?;

        info!(
            endpoint = %outcome.endpoint.name,
            deployment = %outcome.deployment.name,
            "Created endpoint and deployment"
        );

        Ok(ProvisionReport {
            content_safety: resolved.account,
            content_safety_created: resolved.created,
            model,
            endpoint: outcome.endpoint,
            deployment: outcome.deployment,
        })
    }
}

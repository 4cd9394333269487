//! Model registry and managed online endpoints through the Machine Learning
//! resource provider.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use super::client::{state_or_succeeded, Azure};
use super::models::{
    api_versions, CodeConfigurationResource, ManagedIdentity, ModelVersion,
    OnlineDeploymentProperties, OnlineDeploymentResource, OnlineEndpointProperties,
    OnlineEndpointResource, RegistryDiscovery, Sku,
};
use crate::providers::traits::{
    CodeConfiguration, ModelReference, ModelRegistry, OnlineDeployment, OnlineEndpoint,
    ProvisionError, ServingPlatform,
};

/// Asset URI of a registry model version.
#[must_use]
pub fn registry_model_uri(registry: &str, name: &str, version: &str) -> String {
    format!("azureml://registries/{registry}/models/{name}/versions/{version}")
}

impl Azure {
    /// Find the subscription, resource group and regional resource provider
    /// of a registry. Shared registries such as `azureml-meta` live outside
    /// the caller's subscription.
    async fn discover_registry(&self, registry: &str) -> Result<RegistryDiscovery, ProvisionError> {
        let url = format!(
            "{}/registrymanagement/v1.0/registries/{}/discovery",
            self.registry_discovery_url().await?,
            registry
        );

        match self.get::<RegistryDiscovery>(&url).await {
            Ok(discovery) => {
                debug!(
                    registry = %registry,
                    subscription = %discovery.subscription_id,
                    resource_group = %discovery.resource_group,
                    region = ?discovery.primary_region,
                    "Discovered registry"
                );
                Ok(discovery)
            }
            Err(ProvisionError::NotFound(_)) => {
                Err(ProvisionError::NotFound(format!("registry {registry}")))
            }
            Err(e) => Err(e),
        }
    }

    fn endpoint_url(&self, endpoint_name: &str) -> String {
        format!(
            "{}/onlineEndpoints/{}?api-version={}",
            self.workspace_url(),
            endpoint_name,
            api_versions::MACHINE_LEARNING
        )
    }

    fn deployment_url(&self, endpoint_name: &str, deployment_name: &str) -> String {
        format!(
            "{}/onlineEndpoints/{}/deployments/{}?api-version={}",
            self.workspace_url(),
            endpoint_name,
            deployment_name,
            api_versions::MACHINE_LEARNING
        )
    }

    /// Convert an online endpoint resource to our type.
    fn to_endpoint(resource: &OnlineEndpointResource) -> OnlineEndpoint {
        OnlineEndpoint {
            name: resource.name.clone(),
            traffic: resource.properties.traffic.clone(),
            scoring_uri: resource.properties.scoring_uri.clone(),
            provisioning_state: Some(state_or_succeeded(
                resource.properties.provisioning_state.as_deref(),
            )),
        }
    }

    /// Convert an online deployment resource to our type.
    fn to_deployment(resource: &OnlineDeploymentResource, endpoint_name: &str) -> OnlineDeployment {
        OnlineDeployment {
            name: resource.name.clone(),
            endpoint_name: endpoint_name.to_string(),
            model: resource.properties.model.clone(),
            instance_type: resource.properties.instance_type.clone(),
            instance_count: resource.sku.capacity.unwrap_or(1),
            code_configuration: CodeConfiguration {
                code: resource.properties.code_configuration.code_id.clone(),
                scoring_script: resource.properties.code_configuration.scoring_script.clone(),
            },
            environment_variables: resource.properties.environment_variables.clone(),
            provisioning_state: Some(state_or_succeeded(
                resource.properties.provisioning_state.as_deref(),
            )),
        }
    }
}

#[async_trait]
impl ModelRegistry for Azure {
    async fn get_model(
        &self,
        registry: &str,
        name: &str,
        version: &str,
    ) -> Result<ModelReference, ProvisionError> {
        let location = self.discover_registry(registry).await?;
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/registries/{}/models/{}/versions/{}?api-version={}",
            location.primary_region_resource_provider_uri.trim_end_matches('/'),
            location.subscription_id,
            location.resource_group,
            registry,
            name,
            version,
            api_versions::MACHINE_LEARNING
        );

        let model: ModelVersion = match self.get(&url).await {
            Ok(model) => model,
            Err(ProvisionError::NotFound(_)) => {
                return Err(ProvisionError::ModelNotFound {
                    registry: registry.to_string(),
                    name: name.to_string(),
                    version: version.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        info!(model = %name, version = %model.name, resource_id = %model.id, "Found registry model");

        Ok(ModelReference {
            registry: registry.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            id: registry_model_uri(registry, name, version),
        })
    }
}

#[async_trait]
impl ServingPlatform for Azure {
    async fn create_or_update_endpoint(
        &self,
        endpoint: &OnlineEndpoint,
    ) -> Result<OnlineEndpoint, ProvisionError> {
        info!(endpoint = %endpoint.name, traffic = ?endpoint.traffic, "Creating or updating online endpoint");

        let body = OnlineEndpointResource {
            id: String::new(),
            name: String::new(),
            location: self.workspace_location().await?.to_string(),
            identity: Some(ManagedIdentity {
                identity_type: "SystemAssigned".to_string(),
            }),
            properties: OnlineEndpointProperties {
                auth_mode: "Key".to_string(),
                traffic: endpoint.traffic.clone(),
                scoring_uri: None,
                provisioning_state: None,
            },
        };

        let resource: OnlineEndpointResource = self
            .put_and_wait(
                &self.endpoint_url(&endpoint.name),
                &body,
                &endpoint.name,
                |r: &OnlineEndpointResource| {
                    state_or_succeeded(r.properties.provisioning_state.as_deref())
                },
            )
            .await?;

        let mut converted = Self::to_endpoint(&resource);
        if converted.name.is_empty() {
            converted.name.clone_from(&endpoint.name);
        }
        Ok(converted)
    }

    async fn create_or_update_deployment(
        &self,
        deployment: &OnlineDeployment,
    ) -> Result<OnlineDeployment, ProvisionError> {
        info!(
            endpoint = %deployment.endpoint_name,
            deployment = %deployment.name,
            model = %deployment.model,
            instance_type = %deployment.instance_type,
            instance_count = deployment.instance_count,
            "Creating or updating online deployment"
        );

        let body = OnlineDeploymentResource {
            id: String::new(),
            name: String::new(),
            location: self.workspace_location().await?.to_string(),
            kind: "Managed".to_string(),
            sku: Sku {
                name: "Default".to_string(),
                capacity: Some(deployment.instance_count),
            },
            properties: OnlineDeploymentProperties {
                endpoint_compute_type: "Managed".to_string(),
                model: deployment.model.clone(),
                instance_type: deployment.instance_type.clone(),
                code_configuration: CodeConfigurationResource {
                    code_id: deployment.code_configuration.code.clone(),
                    scoring_script: deployment.code_configuration.scoring_script.clone(),
                },
                environment_variables: deployment.environment_variables.clone(),
                provisioning_state: None,
            },
        };

        let label = format!("{}/{}", deployment.endpoint_name, deployment.name);
        let resource: OnlineDeploymentResource = self
            .put_and_wait(
                &self.deployment_url(&deployment.endpoint_name, &deployment.name),
                &body,
                &label,
                |r: &OnlineDeploymentResource| {
                    state_or_succeeded(r.properties.provisioning_state.as_deref())
                },
            )
            .await?;

        let mut converted = Self::to_deployment(&resource, &deployment.endpoint_name);
        if converted.name.is_empty() {
            converted.name.clone_from(&deployment.name);
        }
        Ok(converted)
    }

    async fn upload_code(&self, name: &str, local_path: &Path) -> Result<String, ProvisionError> {
        self.upload_code_dir(name, local_path).await
    }

    async fn set_traffic(
        &self,
        endpoint: &OnlineEndpoint,
        traffic: &BTreeMap<String, u32>,
    ) -> Result<OnlineEndpoint, ProvisionError> {
        let updated = OnlineEndpoint {
            traffic: traffic.clone(),
            ..endpoint.clone()
        };
        self.create_or_update_endpoint(&updated).await
    }
}

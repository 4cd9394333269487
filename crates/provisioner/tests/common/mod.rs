//! In-memory control plane that records every call it receives.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use endpoint_provisioner::providers::{
    AccountKeys, ContentSafetyAccount, CreateAccountRequest, ManagementClient, ModelReference,
    ModelRegistry, OnlineDeployment, OnlineEndpoint, ProvisionError, ProvisioningState,
    ResourceScope, ServingPlatform,
};
use endpoint_provisioner::{Orchestrator, ProvisionConfig};

/// A control-plane call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListAccounts,
    CreateAccount(String),
    ListKeys(String),
    GetModel { name: String, version: String },
    UploadCode { name: String, path: String },
    UpsertEndpoint(String),
    UpsertDeployment { endpoint: String, name: String },
    SetTraffic { endpoint: String, traffic: BTreeMap<String, u32> },
}

#[derive(Default)]
struct State {
    accounts: Vec<ContentSafetyAccount>,
    models: Vec<ModelReference>,
    endpoints: BTreeMap<String, OnlineEndpoint>,
    deployments: BTreeMap<(String, String), OnlineDeployment>,
    deployment_error: Option<String>,
    calls: Vec<Call>,
}

/// Deterministic stand-in for Azure.
#[derive(Default, Clone)]
pub struct InMemoryCloud {
    state: Arc<Mutex<State>>,
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing account.
    pub fn with_account(self, name: &str, kind: &str, location: &str, sku: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .accounts
            .push(account(name, kind, location, sku));
        self
    }

    /// Seed a registry model version.
    pub fn with_model(self, registry: &str, name: &str, version: &str) -> Self {
        self.state.lock().unwrap().models.push(ModelReference {
            registry: registry.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            id: format!("azureml://registries/{registry}/models/{name}/versions/{version}"),
        });
        self
    }

    /// Make deployment rollouts fail with a quota error, or succeed again with `None`.
    pub fn fail_deployments(&self, message: Option<&str>) {
        self.state.lock().unwrap().deployment_error = message.map(str::to_string);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn accounts(&self) -> Vec<ContentSafetyAccount> {
        self.state.lock().unwrap().accounts.clone()
    }

    pub fn endpoints(&self) -> Vec<OnlineEndpoint> {
        self.state.lock().unwrap().endpoints.values().cloned().collect()
    }

    pub fn deployments(&self) -> Vec<OnlineDeployment> {
        self.state
            .lock()
            .unwrap()
            .deployments
            .values()
            .cloned()
            .collect()
    }

    pub fn create_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::CreateAccount(_)))
            .count()
    }

    /// Orchestrator wired to this cloud.
    pub fn orchestrator(&self, config: ProvisionConfig) -> Orchestrator {
        Orchestrator::new(
            config,
            ResourceScope::new("sub", "rg"),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
        )
        .expect("valid config")
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

pub fn account(name: &str, kind: &str, location: &str, sku: &str) -> ContentSafetyAccount {
    ContentSafetyAccount {
        id: format!("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.CognitiveServices/accounts/{name}"),
        name: name.to_string(),
        kind: kind.to_string(),
        location: location.to_string(),
        sku: sku.to_string(),
        public_network_access: true,
        custom_sub_domain: Some(name.to_string()),
        endpoint: Some(format!("https://{name}.cognitiveservices.azure.com/")),
        provisioning_state: ProvisioningState::Succeeded,
    }
}

pub fn code_asset_id(name: &str) -> String {
    format!("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws/codes/{name}/versions/1")
}

pub fn key_for(account_name: &str) -> String {
    format!("key-{account_name}")
}

#[async_trait]
impl ManagementClient for InMemoryCloud {
    async fn list_accounts(
        &self,
        _scope: &ResourceScope,
    ) -> Result<Vec<ContentSafetyAccount>, ProvisionError> {
        self.record(Call::ListAccounts);
        Ok(self.accounts())
    }

    async fn create_account(
        &self,
        _scope: &ResourceScope,
        req: &CreateAccountRequest,
    ) -> Result<ContentSafetyAccount, ProvisionError> {
        self.record(Call::CreateAccount(req.name.clone()));

        let mut created = account(&req.name, &req.kind, &req.location, &req.sku);
        created.custom_sub_domain = Some(req.custom_sub_domain.clone());
        created.public_network_access = req.public_network_access;

        let mut state = self.state.lock().unwrap();
        match state.accounts.iter_mut().find(|a| a.name == req.name) {
            Some(existing) => *existing = created.clone(),
            None => state.accounts.push(created.clone()),
        }
        Ok(created)
    }

    async fn list_keys(
        &self,
        _scope: &ResourceScope,
        account_name: &str,
    ) -> Result<AccountKeys, ProvisionError> {
        self.record(Call::ListKeys(account_name.to_string()));

        if self.accounts().iter().any(|a| a.name == account_name) {
            Ok(AccountKeys {
                key1: key_for(account_name),
                key2: None,
            })
        } else {
            Err(ProvisionError::NotFound(account_name.to_string()))
        }
    }
}

#[async_trait]
impl ModelRegistry for InMemoryCloud {
    async fn get_model(
        &self,
        registry: &str,
        name: &str,
        version: &str,
    ) -> Result<ModelReference, ProvisionError> {
        self.record(Call::GetModel {
            name: name.to_string(),
            version: version.to_string(),
        });

        self.state
            .lock()
            .unwrap()
            .models
            .iter()
            .find(|m| m.registry == registry && m.name == name && m.version == version)
            .cloned()
            .ok_or_else(|| ProvisionError::ModelNotFound {
                registry: registry.to_string(),
                name: name.to_string(),
                version: version.to_string(),
            })
    }
}

#[async_trait]
impl ServingPlatform for InMemoryCloud {
    async fn create_or_update_endpoint(
        &self,
        endpoint: &OnlineEndpoint,
    ) -> Result<OnlineEndpoint, ProvisionError> {
        self.record(Call::UpsertEndpoint(endpoint.name.clone()));

        let mut state = self.state.lock().unwrap();
        let stored = state
            .endpoints
            .entry(endpoint.name.clone())
            .or_insert_with(|| OnlineEndpoint::new(&endpoint.name));
        // An empty split leaves the live one alone.
        if !endpoint.traffic.is_empty() {
            stored.traffic = endpoint.traffic.clone();
        }
        stored.scoring_uri = Some(format!("https://{}.eastus.inference.ml.azure.com/score", endpoint.name));
        stored.provisioning_state = Some(ProvisioningState::Succeeded);
        Ok(stored.clone())
    }

    async fn create_or_update_deployment(
        &self,
        deployment: &OnlineDeployment,
    ) -> Result<OnlineDeployment, ProvisionError> {
        self.record(Call::UpsertDeployment {
            endpoint: deployment.endpoint_name.clone(),
            name: deployment.name.clone(),
        });

        let mut state = self.state.lock().unwrap();
        if !state.endpoints.contains_key(&deployment.endpoint_name) {
            return Err(ProvisionError::NotFound(deployment.endpoint_name.clone()));
        }
        if let Some(message) = &state.deployment_error {
            return Err(ProvisionError::QuotaExceeded(message.clone()));
        }

        let stored = OnlineDeployment {
            provisioning_state: Some(ProvisioningState::Succeeded),
            ..deployment.clone()
        };
        state.deployments.insert(
            (deployment.endpoint_name.clone(), deployment.name.clone()),
            stored.clone(),
        );
        Ok(stored)
    }

    async fn upload_code(&self, name: &str, local_path: &Path) -> Result<String, ProvisionError> {
        self.record(Call::UploadCode {
            name: name.to_string(),
            path: local_path.display().to_string(),
        });
        Ok(code_asset_id(name))
    }

    async fn set_traffic(
        &self,
        endpoint: &OnlineEndpoint,
        traffic: &BTreeMap<String, u32>,
    ) -> Result<OnlineEndpoint, ProvisionError> {
        self.record(Call::SetTraffic {
            endpoint: endpoint.name.clone(),
            traffic: traffic.clone(),
        });

        let mut state = self.state.lock().unwrap();
        for deployment in traffic.keys() {
            if !state
                .deployments
                .contains_key(&(endpoint.name.clone(), deployment.clone()))
            {
                return Err(ProvisionError::Api {
                    status: 400,
                    message: format!("deployment {deployment} does not exist"),
                });
            }
        }
        if traffic.values().sum::<u32>() != 100 {
            return Err(ProvisionError::Api {
                status: 400,
                message: "traffic must sum to 100".to_string(),
            });
        }

        let stored = state
            .endpoints
            .get_mut(&endpoint.name)
            .ok_or_else(|| ProvisionError::NotFound(endpoint.name.clone()))?;
        stored.traffic = traffic.clone();
        Ok(stored.clone())
    }
}

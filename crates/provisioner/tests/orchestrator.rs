//! End-to-end provisioning runs against an in-memory control plane.

mod common;

use std::collections::BTreeMap;

use common::{code_asset_id, key_for, Call, InMemoryCloud};
use endpoint_provisioner::config::{EndpointSettings, ModelSettings};
use endpoint_provisioner::deployer::{
    ENV_CONTENT_SAFETY_ENDPOINT, ENV_CONTENT_SAFETY_KEY, ENV_CONTENT_SAFETY_THRESHOLD,
};
use endpoint_provisioner::{ProvisionConfig, ProvisionError};

const REGISTRY: &str = "azureml-meta";

fn config() -> ProvisionConfig {
    ProvisionConfig {
        model: ModelSettings {
            name: "ModelX".to_string(),
            version: "3".to_string(),
            registry: REGISTRY.to_string(),
        },
        endpoint: EndpointSettings {
            endpoint_name: "ep1".to_string(),
            deployment_name: "blue".to_string(),
            ..EndpointSettings::default()
        },
        ..ProvisionConfig::default()
    }
}

fn cloud() -> InMemoryCloud {
    InMemoryCloud::new().with_model(REGISTRY, "ModelX", "3")
}

fn position(calls: &[Call], pred: impl Fn(&Call) -> bool) -> usize {
    calls
        .iter()
        .position(pred)
        .unwrap_or_else(|| panic!("call not found in {calls:?}"))
}

#[tokio::test]
async fn test_fresh_resource_group_provisions_everything() {
    let cloud = cloud();
    let report = cloud.orchestrator(config()).run().await.unwrap();

    assert_eq!(
        cloud.calls(),
        vec![
            Call::ListAccounts,
            Call::CreateAccount("content-safety-llama".to_string()),
            Call::ListKeys("content-safety-llama".to_string()),
            Call::GetModel {
                name: "ModelX".to_string(),
                version: "3".to_string(),
            },
            Call::UploadCode {
                name: "ep1-blue-code".to_string(),
                path: "./llama/src/".to_string(),
            },
            Call::UpsertEndpoint("ep1".to_string()),
            Call::UpsertDeployment {
                endpoint: "ep1".to_string(),
                name: "blue".to_string(),
            },
            Call::SetTraffic {
                endpoint: "ep1".to_string(),
                traffic: BTreeMap::from([("blue".to_string(), 100)]),
            },
        ]
    );

    assert!(report.content_safety_created);
    assert_eq!(
        report.model.id,
        "azureml://registries/azureml-meta/models/ModelX/versions/3"
    );
    assert_eq!(report.endpoint.name, "ep1");
    assert_eq!(report.deployment.name, "blue");
    assert_eq!(
        report.deployment.code_configuration.code,
        code_asset_id("ep1-blue-code")
    );
    assert_eq!(
        report.traffic(),
        &BTreeMap::from([("blue".to_string(), 100)])
    );
}

#[tokio::test]
async fn test_created_account_uses_configured_attributes() {
    let cloud = cloud();
    cloud.orchestrator(config()).run().await.unwrap();

    let accounts = cloud.accounts();
    assert_eq!(accounts.len(), 1);
    let account = &accounts[0];
    assert_eq!(account.name, "content-safety-llama");
    assert_eq!(account.kind, "ContentSafety");
    assert_eq!(account.location, "eastus");
    assert_eq!(account.sku, "S0");
    assert_eq!(account.custom_sub_domain.as_deref(), Some("content-safety-llama"));
    assert!(account.public_network_access);
}

#[tokio::test]
async fn test_existing_account_is_reused() {
    let cloud = cloud().with_account("existing-cs", "ContentSafety", "East US", "S0");
    let report = cloud.orchestrator(config()).run().await.unwrap();

    assert_eq!(cloud.create_calls(), 0);
    assert!(!report.content_safety_created);
    assert_eq!(report.content_safety.name, "existing-cs");
    assert_eq!(
        report.deployment.environment_variables[ENV_CONTENT_SAFETY_KEY],
        key_for("existing-cs")
    );
}

#[tokio::test]
async fn test_non_matching_accounts_are_ignored() {
    let cloud = cloud()
        .with_account("wrong-kind", "TextAnalytics", "eastus", "S0")
        .with_account("wrong-region", "ContentSafety", "westeurope", "S0")
        .with_account("wrong-sku", "ContentSafety", "eastus", "F0");
    let report = cloud.orchestrator(config()).run().await.unwrap();

    assert_eq!(cloud.create_calls(), 1);
    assert!(report.content_safety_created);
    assert_eq!(cloud.accounts().len(), 4);
}

#[tokio::test]
async fn test_first_of_several_matching_accounts_is_selected() {
    let cloud = cloud()
        .with_account("cs-a", "ContentSafety", "eastus", "S0")
        .with_account("cs-b", "ContentSafety", "East US", "S0");
    let report = cloud.orchestrator(config()).run().await.unwrap();

    assert_eq!(cloud.create_calls(), 0);
    assert_eq!(report.content_safety.name, "cs-a");
    assert_eq!(
        report.deployment.environment_variables[ENV_CONTENT_SAFETY_ENDPOINT],
        "https://cs-a.cognitiveservices.azure.com/"
    );
}

#[tokio::test]
async fn test_second_run_converges_without_duplicates() {
    let cloud = cloud();
    let first = cloud.orchestrator(config()).run().await.unwrap();
    cloud.clear_calls();
    let second = cloud.orchestrator(config()).run().await.unwrap();

    assert_eq!(cloud.create_calls(), 0);
    assert!(first.content_safety_created);
    assert!(!second.content_safety_created);

    assert_eq!(cloud.accounts().len(), 1);
    assert_eq!(cloud.endpoints().len(), 1);
    assert_eq!(cloud.deployments().len(), 1);
    assert_eq!(second.traffic(), first.traffic());
    assert_eq!(
        second.deployment.environment_variables,
        first.deployment.environment_variables
    );
}

#[tokio::test]
async fn test_cutover_happens_after_deployment() {
    let cloud = cloud();
    cloud.orchestrator(config()).run().await.unwrap();

    let calls = cloud.calls();
    let endpoint = position(&calls, |c| matches!(c, Call::UpsertEndpoint(_)));
    let deployment = position(&calls, |c| matches!(c, Call::UpsertDeployment { .. }));
    let cutover = position(&calls, |c| matches!(c, Call::SetTraffic { .. }));

    assert!(endpoint < deployment);
    assert!(deployment < cutover);
}

#[tokio::test]
async fn test_deployment_environment_is_exactly_the_safety_connection() {
    let cloud = cloud();
    let mut config = config();
    config.content_safety.threshold = 4;
    let report = cloud.orchestrator(config).run().await.unwrap();

    let env = &report.deployment.environment_variables;
    assert_eq!(
        env.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![
            ENV_CONTENT_SAFETY_ENDPOINT,
            ENV_CONTENT_SAFETY_KEY,
            ENV_CONTENT_SAFETY_THRESHOLD,
        ]
    );
    assert_eq!(
        env[ENV_CONTENT_SAFETY_ENDPOINT],
        "https://content-safety-llama.cognitiveservices.azure.com/"
    );
    assert_eq!(env[ENV_CONTENT_SAFETY_KEY], key_for("content-safety-llama"));
    assert_eq!(env[ENV_CONTENT_SAFETY_THRESHOLD], "4");
}

#[tokio::test]
async fn test_missing_model_version_stops_before_serving() {
    let cloud = cloud();
    let mut config = config();
    config.model.version = "99".to_string();

    let err = cloud.orchestrator(config).run().await.unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::ModelNotFound { ref name, ref version, .. }
            if name == "ModelX" && version == "99"
    ));

    let calls = cloud.calls();
    assert!(!calls.iter().any(|c| matches!(
        c,
        Call::UploadCode { .. }
            | Call::UpsertEndpoint(_)
            | Call::UpsertDeployment { .. }
            | Call::SetTraffic { .. }
    )));
    // The account created earlier in the run is left in place.
    assert_eq!(cloud.accounts().len(), 1);
}

#[tokio::test]
async fn test_failed_deployment_keeps_traffic_and_recovers_on_rerun() {
    let cloud = cloud();
    cloud.fail_deployments(Some("Not enough quota for Standard_NC24s_v3"));

    let err = cloud.orchestrator(config()).run().await.unwrap_err();
    assert!(matches!(err, ProvisionError::QuotaExceeded(_)));
    assert!(!cloud
        .calls()
        .iter()
        .any(|c| matches!(c, Call::SetTraffic { .. })));
    assert!(cloud.endpoints()[0].traffic.is_empty());

    cloud.fail_deployments(None);
    cloud.clear_calls();
    let report = cloud.orchestrator(config()).run().await.unwrap();

    assert_eq!(cloud.create_calls(), 0);
    assert_eq!(cloud.accounts().len(), 1);
    assert_eq!(
        report.traffic(),
        &BTreeMap::from([("blue".to_string(), 100)])
    );
}

//! provision-endpoint - deploy a content-safety guarded LLM endpoint to Azure ML.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use endpoint_provisioner::config::{ProvisionConfig, WorkspaceConfig};
use endpoint_provisioner::providers::azure::DefaultCredential;
use endpoint_provisioner::providers::Azure;
use endpoint_provisioner::Orchestrator;

/// Create or update the Llama endpoint, its deployment and its Content Safety account.
///
/// What gets deployed is fixed; see `ProvisionConfig::default()`.
#[derive(Parser)]
#[command(name = "provision-endpoint")]
#[command(about = "Provision a content-safety guarded LLM endpoint on Azure ML", version)]
struct Cli {
    /// Workspace config file (defaults to the nearest `config.json` or
    /// `.azureml/config.json` above the working directory).
    #[arg(long, env = "AZUREML_CONFIG")]
    workspace_config: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let workspace = match &cli.workspace_config {
        Some(path) => WorkspaceConfig::load(path),
        None => WorkspaceConfig::discover(
            &std::env::current_dir().context("Failed to read working directory")?,
        ),
    }
    .context("Failed to load workspace config")?;

    let azure = Arc::new(
        Azure::new(workspace.clone(), Arc::new(DefaultCredential::default()))
            .context("Failed to create Azure client")?,
    );
    azure
        .authenticate()
        .await
        .context("Failed to authenticate to Azure")?;

    let orchestrator = Orchestrator::new(
        ProvisionConfig::default(),
        workspace.scope(),
        azure.clone(),
        azure.clone(),
        azure,
    )
    .context("Invalid provisioning config")?;

    let report = orchestrator.run().await.context("Provisioning failed")?;

    println!("\n✅ Endpoint provisioned");
    println!(
        "   Content Safety: {} ({})",
        report.content_safety.name,
        if report.content_safety_created {
            "created"
        } else {
            "existing"
        }
    );
    println!(
        "   Model:          {} v{}",
        report.model.name, report.model.version
    );
    println!("   Endpoint:       {}", report.endpoint.name);
    println!("   Deployment:     {}", report.deployment.name);
    for (deployment, percent) in report.traffic() {
        println!("   Traffic:        {deployment} {percent}%");
    }
    if let Some(uri) = &report.endpoint.scoring_uri {
        println!("   Scoring URI:    {uri}");
    }

    Ok(())
}

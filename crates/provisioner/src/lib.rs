//! Provisioning of a content-safety guarded LLM inference endpoint.
//!
//! A run converges a resource group and an ML workspace to:
//!
//! - a **Content Safety** account matching the configured kind, location and SKU
//!   (an existing one is reused, otherwise one is created)
//! - a **managed online endpoint** with a single **deployment** serving a
//!   registry model, whose environment carries the account's endpoint, key
//!   and moderation threshold
//! - **100% of the endpoint's traffic** routed to that deployment
//!
//! Running it again is safe: every stage is a lookup or a create-or-update.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use endpoint_provisioner::config::{ProvisionConfig, WorkspaceConfig};
//! use endpoint_provisioner::providers::azure::DefaultCredential;
//! use endpoint_provisioner::providers::Azure;
//! use endpoint_provisioner::Orchestrator;
//!
//! let workspace = WorkspaceConfig::discover(&std::env::current_dir()?)?;
//! let azure = Arc::new(Azure::new(
//!     workspace.clone(),
//!     Arc::new(DefaultCredential::default()),
//! )?);
//!
//! let report = Orchestrator::new(
//!     ProvisionConfig::default(),
//!     workspace.scope(),
//!     azure.clone(),
//!     azure.clone(),
//!     azure,
//! )?
//! .run()
//! .await?;
//! ```

pub mod config;
pub mod content_safety;
pub mod deployer;
pub mod model;
pub mod orchestrator;
pub mod providers;

pub use config::{ProvisionConfig, WorkspaceConfig};
pub use content_safety::{ContentSafetyConnection, ContentSafetyProvisioner, ResolvedAccount};
pub use deployer::{DeploymentOutcome, EndpointDeployer};
pub use model::ModelResolver;
pub use orchestrator::{Orchestrator, ProvisionReport};
pub use providers::{
    ManagementClient, ModelRegistry, ProvisionError, ResourceScope, ServingPlatform,
    TokenCredential,
};

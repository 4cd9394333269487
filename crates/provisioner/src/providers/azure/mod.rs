//! Azure (Microsoft Azure) control plane.
//!
//! Implements the collaborator traits against Azure Resource Manager.
//!
//! ## Services
//!
//! - **Cognitive Services** - Content Safety accounts ([`ManagementClient`])
//! - **Machine Learning** - registry models ([`ModelRegistry`]), code assets
//!   and managed online endpoints and deployments ([`ServingPlatform`])
//!
//! Registries are located through the registry discovery service before any
//! model is read, since shared registries belong to another subscription.
//!
//! ## Content Safety Locations
//!
//! Content Safety accounts are currently available in East US and West Europe.
//! Ideally the ML workspace (and therefore the endpoint) lives in the same
//! location as the account.
//!
//! ## Recommended Instance Types
//!
//! - `Standard_NC24s_v3`: 4x V100 16GB - fits `Llama-2-7b` and `Llama-2-13b`
//! - `Standard_NC24ads_A100_v4`: 1x A100 80GB
//! - `Standard_ND96asr_v4`: 8x A100 40GB - required for `Llama-2-70b`
//!
//! [`ManagementClient`]: crate::providers::ManagementClient
//! [`ModelRegistry`]: crate::providers::ModelRegistry
//! [`ServingPlatform`]: crate::providers::ServingPlatform

mod client;
mod code;
mod cognitive;
mod credential;
mod ml;
mod models;

pub use client::{Azure, PollSettings, ARM_ENDPOINT};
pub use credential::{
    AzureCliCredential, DefaultCredential, EnvironmentCredential, StaticCredential,
    MANAGEMENT_RESOURCE, TOKEN_ENV_VAR,
};
pub use ml::registry_model_uri;
pub use models::*;

//! Control-plane abstractions.
//!
//! This module defines the collaborator traits the provisioning pipeline
//! talks to, and the Azure implementation of them.

pub mod azure;
mod traits;

#[cfg(test)]
pub use traits::{
    MockManagementClient, MockModelRegistry, MockServingPlatform, MockTokenCredential,
};
pub use traits::{
    AccessToken, AccountKeys, CodeConfiguration, ContentSafetyAccount, CreateAccountRequest,
    ManagementClient, ModelReference, ModelRegistry, OnlineDeployment, OnlineEndpoint,
    ProvisionError, ProvisioningState, ResourceScope, ServingPlatform, TokenCredential,
};

pub use azure::Azure;

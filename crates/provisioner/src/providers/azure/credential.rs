//! Management-plane credentials.

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::providers::traits::{AccessToken, ProvisionError, TokenCredential};

/// Resource the tokens are requested for.
pub const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

/// Environment variable holding a pre-acquired bearer token.
pub const TOKEN_ENV_VAR: &str = "AZURE_ACCESS_TOKEN";

/// Token read from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvironmentCredential {
    var: String,
}

impl EnvironmentCredential {
    /// Read the token from `var`.
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvironmentCredential {
    fn default() -> Self {
        Self::new(TOKEN_ENV_VAR)
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    async fn get_token(&self) -> Result<AccessToken, ProvisionError> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(AccessToken {
                token: token.trim().to_string(),
                expires_on: None,
            }),
            _ => Err(ProvisionError::Credential(format!("{} is not set", self.var))),
        }
    }
}

/// A fixed token that is never refreshed.
#[derive(Debug, Clone)]
pub struct StaticCredential {
    token: AccessToken,
}

impl StaticCredential {
    /// Wrap a token with no known expiry.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken {
                token: token.into(),
                expires_on: None,
            },
        }
    }
}

#[async_trait]
impl TokenCredential for StaticCredential {
    async fn get_token(&self) -> Result<AccessToken, ProvisionError> {
        Ok(self.token.clone())
    }
}

/// `az account get-access-token` output.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(rename = "expires_on")]
    expires_on: Option<i64>,
}

/// Token from the signed-in Azure CLI.
#[derive(Debug, Clone, Default)]
pub struct AzureCliCredential;

#[async_trait]
impl TokenCredential for AzureCliCredential {
    async fn get_token(&self) -> Result<AccessToken, ProvisionError> {
        let output = Command::new("az")
            .args([
                "account",
                "get-access-token",
                "--resource",
                MANAGEMENT_RESOURCE,
                "--output",
                "json",
            ])
            .output()
            .await
            .map_err(|e| {
                ProvisionError::Credential(format!(
                    "Azure CLI `az` could not be run ({e}). Install it and run: `az login`"
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisionError::Credential(format!(
                "Azure CLI error: {}",
                stderr.trim()
            )));
        }

        parse_cli_token(&output.stdout)
    }
}

fn parse_cli_token(stdout: &[u8]) -> Result<AccessToken, ProvisionError> {
    let token: CliToken = serde_json::from_slice(stdout)?;
    Ok(AccessToken {
        token: token.access_token,
        expires_on: token
            .expires_on
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
    })
}

/// Tries each credential in turn and returns the first token acquired.
///
/// The default chain is [`EnvironmentCredential`], then [`AzureCliCredential`].
pub struct DefaultCredential {
    sources: Vec<(&'static str, Box<dyn TokenCredential>)>,
}

impl DefaultCredential {
    /// Build a chain from explicit sources.
    #[must_use]
    pub fn with_sources(sources: Vec<(&'static str, Box<dyn TokenCredential>)>) -> Self {
        Self { sources }
    }
}

impl Default for DefaultCredential {
    fn default() -> Self {
        Self::with_sources(vec![
            ("environment", Box::new(EnvironmentCredential::default())),
            ("azure-cli", Box::new(AzureCliCredential)),
        ])
    }
}

#[async_trait]
impl TokenCredential for DefaultCredential {
    async fn get_token(&self) -> Result<AccessToken, ProvisionError> {
        let mut failures = Vec::with_capacity(self.sources.len());

        for (name, source) in &self.sources {
            match source.get_token().await {
                Ok(token) => {
                    debug!(source = %name, expires_on = ?token.expires_on, "Acquired access token");
                    return Ok(token);
                }
                Err(e) => {
                    debug!(source = %name, error = %e, "Credential source unavailable");
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        Err(ProvisionError::Credential(format!(
            "No credential source succeeded ({})",
            failures.join("; ")
        )))
    }
}

//! Content Safety dependency: locate, create, and connect.
//!
//! [`ContentSafetyProvisioner::find_or_create`] is an explicit
//! read-then-conditionally-write. Two runs racing each other can both see
//! "not found" and both create; no lock is taken and the control plane's own
//! create-or-update semantics settle the conflict.

use tracing::{debug, info};

use crate::config::ContentSafetySettings;
use crate::providers::{
    ContentSafetyAccount, CreateAccountRequest, ManagementClient, ProvisionError, ResourceScope,
};

/// Connection details copied into the deployment environment.
#[derive(Clone, PartialEq, Eq)]
pub struct ContentSafetyConnection {
    /// Account endpoint URL.
    pub endpoint: String,
    /// Primary access key.
    pub access_key: String,
}

impl std::fmt::Debug for ContentSafetyConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSafetyConnection")
            .field("endpoint", &self.endpoint)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

/// The account a run settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccount {
    /// Account descriptor.
    pub account: ContentSafetyAccount,
    /// Whether this run created it.
    pub created: bool,
}

/// Locates or creates the Content Safety account of a resource group.
pub struct ContentSafetyProvisioner<'a> {
    client: &'a dyn ManagementClient,
    scope: &'a ResourceScope,
    settings: &'a ContentSafetySettings,
}

impl<'a> ContentSafetyProvisioner<'a> {
    /// Create a provisioner for `scope`.
    pub fn new(
        client: &'a dyn ManagementClient,
        scope: &'a ResourceScope,
        settings: &'a ContentSafetySettings,
    ) -> Self {
        Self {
            client,
            scope,
            settings,
        }
    }

    /// Whether an account has the kind, location and SKU this run needs.
    #[must_use]
    pub fn matches(&self, account: &ContentSafetyAccount) -> bool {
        account.kind == self.settings.kind
            && self.settings.location.matches(&account.location)
            && account.sku.eq_ignore_ascii_case(&self.settings.sku)
    }

    /// Find an existing matching account.
    ///
    /// Returns the first match in listing order, or `None`. Listing failures
    /// are returned as-is.
    ///
    /// # Errors
    /// Returns the management client's error if the listing fails.
    pub async fn locate(&self) -> Result<Option<ContentSafetyAccount>, ProvisionError> {
        let accounts = self.client.list_accounts(self.scope).await?;
        let mut matching = accounts.into_iter().filter(|a| self.matches(a));

        let Some(found) = matching.next() else {
            debug!(
                resource_group = %self.scope.resource_group,
                kind = %self.settings.kind,
                location = %self.settings.location,
                sku = %self.settings.sku,
                "No matching Content Safety account"
            );
            return Ok(None);
        };

        let others = matching.count();
        if others > 0 {
            debug!(selected = %found.name, others, "Several matching Content Safety accounts, using the first");
        }

        info!(name = %found.name, "Found existing Content Safety account");
        Ok(Some(found))
    }

    /// Create the account and wait for it to be provisioned.
    ///
    /// # Errors
    /// Returns an error if the create operation fails.
    pub async fn provision(&self) -> Result<ContentSafetyAccount, ProvisionError> {
        let req = CreateAccountRequest {
            name: self.settings.name.clone(),
            kind: self.settings.kind.clone(),
            location: self.settings.location.arm_name().to_string(),
            sku: self.settings.sku.clone(),
            custom_sub_domain: self.settings.name.clone(),
            public_network_access: self.settings.public_network_access,
        };

        let account = self.client.create_account(self.scope, &req).await?;
        info!(name = %account.name, "Created Content Safety account");
        Ok(account)
    }

    /// Locate a matching account, creating one only if none exists.
    ///
    /// # Errors
    /// Returns an error if listing or creation fails.
    pub async fn find_or_create(&self) -> Result<ResolvedAccount, ProvisionError> {
        if let Some(account) = self.locate().await? {
            return Ok(ResolvedAccount {
                account,
                created: false,
            });
        }

        Ok(ResolvedAccount {
            account: self.provision().await?,
            created: true,
        })
    }

    /// Endpoint URL and primary key of an account.
    ///
    /// # Errors
    /// Returns an error if the account has no endpoint yet or its keys cannot be listed.
    pub async fn connection(
        &self,
        account: &ContentSafetyAccount,
    ) -> Result<ContentSafetyConnection, ProvisionError> {
        let endpoint = account.endpoint.clone().ok_or_else(|| {
            ProvisionError::Config(format!(
                "Content Safety account {} has no endpoint",
                account.name
            ))
        })?;

        let keys = self.client.list_keys(self.scope, &account.name).await?;

        info!(name = %account.name, endpoint = %endpoint, "Content Safety endpoint resolved");
        Ok(ContentSafetyConnection {
            endpoint,
            access_key: keys.key1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SafetyRegion;
    use crate::providers::{AccountKeys, MockManagementClient, ProvisioningState};

    fn account(name: &str, kind: &str, location: &str, sku: &str) -> ContentSafetyAccount {
        ContentSafetyAccount {
            id: format!("/accounts/{name}"),
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

    fn scope() -> ResourceScope {
        ResourceScope::new("sub", "rg")
    }

    #[tokio::test]
    async fn test_locate_skips_non_matching_accounts() {
        let mut client = MockManagementClient::new();
        client.expect_list_accounts().returning(|_| {
            Ok(vec![
                account("vision", "ComputerVision", "eastus", "S0"),
                account("wrong-region", "ContentSafety", "westeurope", "S0"),
                account("wrong-sku", "ContentSafety", "eastus", "F0"),
                account("good", "ContentSafety", "eastus", "s0"),
            ])
        });
        client.expect_create_account().never();

        let scope = scope();
        let settings = ContentSafetySettings::default();
        let provisioner = ContentSafetyProvisioner::new(&client, &scope, &settings);

        let found = provisioner.locate().await.unwrap().unwrap();
        assert_eq!(found.name, "good");
    }

    #[tokio::test]
    async fn test_locate_picks_first_of_duplicates() {
        let mut client = MockManagementClient::new();
        client.expect_list_accounts().returning(|_| {
            Ok(vec![
                account("first", "ContentSafety", "eastus", "S0"),
                account("second", "ContentSafety", "East US", "S0"),
            ])
        });

        let scope = scope();
        let settings = ContentSafetySettings::default();
        let provisioner = ContentSafetyProvisioner::new(&client, &scope, &settings);

        let found = provisioner.locate().await.unwrap().unwrap();
        assert_eq!(found.name, "first");
    }

    #[tokio::test]
    async fn test_locate_propagates_listing_errors() {
        let mut client = MockManagementClient::new();
        client
            .expect_list_accounts()
            .returning(|_| Err(ProvisionError::Auth("forbidden".to_string())));
        client.expect_create_account().never();

        let scope = scope();
        let settings = ContentSafetySettings::default();
        let provisioner = ContentSafetyProvisioner::new(&client, &scope, &settings);

        assert!(matches!(
            provisioner.find_or_create().await,
            Err(ProvisionError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_find_or_create_creates_when_absent() {
        let mut client = MockManagementClient::new();
        client.expect_list_accounts().returning(|_| Ok(vec![]));
        client
            .expect_create_account()
            .times(1)
            .withf(|scope, req| {
                scope.resource_group == "rg"
                    && req.name == "cs-test"
                    && req.custom_sub_domain == "cs-test"
                    && req.kind == "ContentSafety"
                    && req.location == "westeurope"
                    && req.sku == "S0"
                    && req.public_network_access
            })
            .returning(|_, req| Ok(account(&req.name, &req.kind, &req.location, &req.sku)));

        let scope = scope();
        let settings = ContentSafetySettings {
            name: "cs-test".to_string(),
            location: SafetyRegion::WestEurope,
            ..ContentSafetySettings::default()
        };
        let provisioner = ContentSafetyProvisioner::new(&client, &scope, &settings);

        let resolved = provisioner.find_or_create().await.unwrap();
        assert!(resolved.created);
        assert_eq!(resolved.account.name, "cs-test");
        assert!(provisioner.matches(&resolved.account));
    }

    #[tokio::test]
    async fn test_connection_uses_primary_key() {
        let mut client = MockManagementClient::new();
        client
            .expect_list_keys()
            .withf(|_, name| name == "good")
            .returning(|_, _| {
                Ok(AccountKeys {
                    key1: "primary".to_string(),
                    key2: Some("secondary".to_string()),
                })
            });

        let scope = scope();
        let settings = ContentSafetySettings::default();
        let provisioner = ContentSafetyProvisioner::new(&client, &scope, &settings);

        let connection = provisioner
            .connection(&account("good", "ContentSafety", "eastus", "S0"))
            .await
            .unwrap();
        assert_eq!(connection.access_key, "primary");
        assert_eq!(connection.endpoint, "https://good.cognitiveservices.azure.com/");
        assert!(!format!("{connection:?}").contains("primary"));
    }

    #[tokio::test]
    async fn test_connection_requires_endpoint() {
        let mut client = MockManagementClient::new();
        client.expect_list_keys().never();

        let scope = scope();
        let settings = ContentSafetySettings::default();
        let provisioner = ContentSafetyProvisioner::new(&client, &scope, &settings);

        let mut pending = account("pending", "ContentSafety", "eastus", "S0");
        pending.endpoint = None;
        assert!(matches!(
            provisioner.connection(&pending).await,
            Err(ProvisionError::Config(_))
        ));
    }
}

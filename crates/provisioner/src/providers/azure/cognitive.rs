//! Content Safety accounts through the Cognitive Services resource provider.

use async_trait::async_trait;
use tracing::{debug, info};

use super::client::{state_or_succeeded, Azure};
use super::models::{
    api_versions, CognitiveAccount, CognitiveAccountKeys, CreateCognitiveAccountProperties,
    CreateCognitiveAccountRequest, ListResponse, Sku,
};
use crate::providers::traits::{
    AccountKeys, ContentSafetyAccount, CreateAccountRequest, ManagementClient, ProvisionError,
    ResourceScope,
};

impl Azure {
    fn accounts_url(&self, scope: &ResourceScope) -> String {
        format!(
            "{}/providers/Microsoft.CognitiveServices/accounts",
            self.scope_url(scope)
        )
    }

    /// Convert a Cognitive Services account to our type.
    fn to_account(account: &CognitiveAccount) -> ContentSafetyAccount {
        ContentSafetyAccount {
            id: account.id.clone(),
            name: account.name.clone(),
            kind: account.kind.clone(),
            location: account.location.clone(),
            sku: account
                .sku
                .as_ref()
                .map(|s| s.name.clone())
                .unwrap_or_default(),
            public_network_access: account
                .properties
                .public_network_access
                .as_deref()
                .is_none_or(|access| access.eq_ignore_ascii_case("Enabled")),
            custom_sub_domain: account.properties.custom_sub_domain_name.clone(),
            endpoint: account.properties.endpoint.clone(),
            provisioning_state: state_or_succeeded(
                account.properties.provisioning_state.as_deref(),
            ),
        }
    }
}

#[async_trait]
impl ManagementClient for Azure {
    async fn list_accounts(
        &self,
        scope: &ResourceScope,
    ) -> Result<Vec<ContentSafetyAccount>, ProvisionError> {
        let mut url = Some(format!(
            "{}?api-version={}",
            self.accounts_url(scope),
            api_versions::COGNITIVE_SERVICES
        ));
        let mut accounts = Vec::new();

        while let Some(page_url) = url {
            let page: ListResponse<CognitiveAccount> = self.get(&page_url).await?;
            accounts.extend(page.value.iter().map(Self::to_account));
            url = page.next_link;
        }

        debug!(
            resource_group = %scope.resource_group,
            count = accounts.len(),
            "Listed Cognitive Services accounts"
        );
        Ok(accounts)
    }

    async fn create_account(
        &self,
        scope: &ResourceScope,
        req: &CreateAccountRequest,
    ) -> Result<ContentSafetyAccount, ProvisionError> {
        info!(
            name = %req.name,
            kind = %req.kind,
            location = %req.location,
            sku = %req.sku,
            "Creating Content Safety account"
        );

        let body = CreateCognitiveAccountRequest {
            sku: Sku {
                name: req.sku.clone(),
                capacity: None,
            },
            kind: req.kind.clone(),
            location: req.location.clone(),
            properties: CreateCognitiveAccountProperties {
                custom_sub_domain_name: req.custom_sub_domain.clone(),
                public_network_access: if req.public_network_access {
                    "Enabled".to_string()
                } else {
                    "Disabled".to_string()
                },
            },
        };

        let url = format!(
            "{}/{}?api-version={}",
            self.accounts_url(scope),
            req.name,
            api_versions::COGNITIVE_SERVICES
        );

        let account: CognitiveAccount = self
            .put_and_wait(&url, &body, &req.name, |a: &CognitiveAccount| {
                state_or_succeeded(a.properties.provisioning_state.as_deref())
            })
            .await?;

        Ok(Self::to_account(&account))
    }

    async fn list_keys(
        &self,
        scope: &ResourceScope,
        account_name: &str,
    ) -> Result<AccountKeys, ProvisionError> {
        let url = format!(
            "{}/{}/listKeys?api-version={}",
            self.accounts_url(scope),
            account_name,
            api_versions::COGNITIVE_SERVICES
        );

        let keys: CognitiveAccountKeys = self.post(&url).await?;
        Ok(AccountKeys {
            key1: keys.key1,
            key2: keys.key2,
        })
    }
}

//! Provider seams between the orchestrator and ARM.
//!
//! The orchestrator only ever talks to these traits; `ArmGateway` is the
//! live implementation over [`ArmClient`], and tests drive the same
//! surface with in-memory fakes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use crate::app_service;
use crate::client::ArmClient;
use crate::cosmos;
use crate::functions;
use crate::resource_groups;
use crate::subscriptions;
use crate::types::{
    AppServiceSelections, AzureConfig, AzureError, AzureResult, CosmosDeployment,
    CosmosSelections, FunctionsSelections, ResourceGroupItem, ResourceGroupSelection,
    ResourceKind, SubscriptionItem,
};

// ─── Traits ─────────────────────────────────────────────────────────

#[async_trait]
pub trait AuthSource: Send + Sync {
    /// Establishes the session. `false` means no credentials are
    /// configured; failures while exchanging them are errors.
    async fn login(&self) -> AzureResult<bool>;
    async fn logout(&self) -> AzureResult<bool>;
    async fn user_email(&self) -> AzureResult<String>;
    async fn subscriptions(&self) -> AzureResult<Vec<SubscriptionItem>>;
    async fn locations(
        &self,
        kind: ResourceKind,
        subscription: &SubscriptionItem,
    ) -> AzureResult<Vec<String>>;
}

#[async_trait]
pub trait AppServiceProvider: Send + Sync {
    async fn check_name(
        &self,
        subscription: &SubscriptionItem,
        name: &str,
    ) -> AzureResult<Option<String>>;
    /// Returns the deployment resource id of the created site.
    async fn create(
        &self,
        subscription: &SubscriptionItem,
        selections: &AppServiceSelections,
        tier: &str,
    ) -> AzureResult<String>;
    async fn update_app_settings(
        &self,
        subscription: &SubscriptionItem,
        resource_group: &str,
        site_name: &str,
        settings: &HashMap<String, String>,
    ) -> AzureResult<()>;
}

#[async_trait]
pub trait CosmosProvider: Send + Sync {
    async fn check_name(
        &self,
        subscription: &SubscriptionItem,
        name: &str,
    ) -> AzureResult<Option<String>>;
    async fn create(
        &self,
        subscription: &SubscriptionItem,
        selections: &CosmosSelections,
    ) -> AzureResult<CosmosDeployment>;
}

#[async_trait]
pub trait FunctionsProvider: Send + Sync {
    async fn check_name(
        &self,
        subscription: &SubscriptionItem,
        name: &str,
    ) -> AzureResult<Option<String>>;
    /// Returns the deployment resource id of the created function app.
    async fn create(
        &self,
        subscription: &SubscriptionItem,
        selections: &FunctionsSelections,
    ) -> AzureResult<String>;
}

#[async_trait]
pub trait ResourceGroupProvider: Send + Sync {
    async fn list(&self, subscription: &SubscriptionItem) -> AzureResult<Vec<ResourceGroupItem>>;
    async fn create(&self, selection: &ResourceGroupSelection) -> AzureResult<ResourceGroupItem>;
}

/// User-facing side effects the orchestrator can request from whatever
/// is hosting it.
#[async_trait]
pub trait HostInteraction: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
    fn notify(&self, message: &str);
}

/// Headless host: declines confirmations, routes notifications to the log.
pub struct SilentHost;

#[async_trait]
impl HostInteraction for SilentHost {
    async fn confirm(&self, _message: &str) -> bool {
        false
    }

    fn notify(&self, message: &str) {
        info!("{}", message);
    }
}

// ─── ARM-backed implementation ───────────────────────────────────────

pub struct ArmGateway {
    client: Arc<ArmClient>,
    config: AzureConfig,
}

impl ArmGateway {
    pub fn new(client: Arc<ArmClient>, config: AzureConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl AuthSource for ArmGateway {
    async fn login(&self) -> AzureResult<bool> {
        let Some(credentials) = self.client.credentials().await else {
            return Ok(false);
        };
        // Exchanging for the home-tenant token proves the credentials work.
        self.client.bearer(&credentials.tenant_id).await?;
        Ok(true)
    }

    async fn logout(&self) -> AzureResult<bool> {
        self.client.clear_tokens().await;
        Ok(true)
    }

    async fn user_email(&self) -> AzureResult<String> {
        let credentials = self
            .client
            .credentials()
            .await
            .ok_or_else(AzureError::not_authenticated)?;
        Ok(credentials.account_email.unwrap_or_default())
    }

    async fn subscriptions(&self) -> AzureResult<Vec<SubscriptionItem>> {
        subscriptions::list_subscriptions(&self.client, &self.config).await
    }

    async fn locations(
        &self,
        kind: ResourceKind,
        subscription: &SubscriptionItem,
    ) -> AzureResult<Vec<String>> {
        let (namespace, resource_type) = match kind {
            ResourceKind::AppService | ResourceKind::Functions => ("Microsoft.Web", "sites"),
            ResourceKind::CosmosDb => ("Microsoft.DocumentDB", "databaseAccounts"),
            ResourceKind::ResourceGroup => ("Microsoft.Resources", "resourceGroups"),
        };
        subscriptions::provider_locations(&self.client, &self.config, subscription, namespace, resource_type)
            .await
    }
}

#[async_trait]
impl AppServiceProvider for ArmGateway {
    async fn check_name(
        &self,
        subscription: &SubscriptionItem,
        name: &str,
    ) -> AzureResult<Option<String>> {
        app_service::check_name_availability(&self.client, &self.config, subscription, name).await
    }

    async fn create(
        &self,
        subscription: &SubscriptionItem,
        selections: &AppServiceSelections,
        tier: &str,
    ) -> AzureResult<String> {
        app_service::create_web_app(&self.client, &self.config, subscription, selections, tier).await
    }

    async fn update_app_settings(
        &self,
        subscription: &SubscriptionItem,
        resource_group: &str,
        site_name: &str,
        settings: &HashMap<String, String>,
    ) -> AzureResult<()> {
        app_service::update_app_settings(
            &self.client,
            &self.config,
            subscription,
            resource_group,
            site_name,
            settings,
        )
        .await
    }
}

#[async_trait]
impl CosmosProvider for ArmGateway {
    async fn check_name(
        &self,
        subscription: &SubscriptionItem,
        name: &str,
    ) -> AzureResult<Option<String>> {
        cosmos::check_name(&self.client, &self.config, subscription, name).await
    }

    async fn create(
        &self,
        subscription: &SubscriptionItem,
        selections: &CosmosSelections,
    ) -> AzureResult<CosmosDeployment> {
        let account =
            cosmos::create_account(&self.client, &self.config, subscription, selections).await?;
        let keys = cosmos::list_keys(
            &self.client,
            &self.config,
            subscription,
            &selections.resource_group,
            &selections.account_name,
        )
        .await?;
        let endpoint = account
            .properties
            .as_ref()
            .and_then(|p| p.document_endpoint.clone())
            .unwrap_or_default();
        let connection_string = cosmos::connection_string(
            selections.api,
            &account.name,
            &endpoint,
            &keys.primary_master_key,
        );
        Ok(CosmosDeployment {
            account_id: account.id,
            account_name: account.name,
            connection_string,
        })
    }
}

#[async_trait]
impl FunctionsProvider for ArmGateway {
    async fn check_name(
        &self,
        subscription: &SubscriptionItem,
        name: &str,
    ) -> AzureResult<Option<String>> {
        functions::check_name(&self.client, &self.config, subscription, name).await
    }

    async fn create(
        &self,
        subscription: &SubscriptionItem,
        selections: &FunctionsSelections,
    ) -> AzureResult<String> {
        functions::create_function_app(&self.client, &self.config, subscription, selections).await
    }
}

#[async_trait]
impl ResourceGroupProvider for ArmGateway {
    async fn list(&self, subscription: &SubscriptionItem) -> AzureResult<Vec<ResourceGroupItem>> {
        resource_groups::list(&self.client, &self.config, subscription).await
    }

    async fn create(&self, selection: &ResourceGroupSelection) -> AzureResult<ResourceGroupItem> {
        resource_groups::create(&self.client, &self.config, selection).await
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

//! Deployment orchestration façade.
//!
//! `AzureServices` owns the session, the per-kind subscription cache and
//! the provider seams, and sequences every multi-step flow: validate
//! before create, classify the tenant for tier selection, normalize
//! deployment ids, fan connection settings out to env files and linked
//! web apps. Failures are reported to the optional telemetry hook and
//! then rethrown unchanged; no retries happen at this layer.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use log::{error, info};
use tokio::sync::Mutex;

use crate::app_service;
use crate::cache::SubscriptionCache;
use crate::client::ArmClient;
use crate::gateway::{
    AppServiceProvider, ArmGateway, AuthSource, CosmosProvider, FunctionsProvider,
    HostInteraction, ResourceGroupProvider, SilentHost,
};
use crate::names;
use crate::resource_groups;
use crate::settings;
use crate::types::{
    AppServiceDeployment, AppServiceSelections, AzureConfig, AzureError, AzureErrorKind,
    AzureResult, CosmosDeployment, CosmosSelections, FunctionsDeployment, FunctionsSelections,
    LinkedWebApp, NameValidationResult, ResourceGroupPlanRequest, ResourceGroupSelection,
    ResourceKind, SubscriptionData, SubscriptionItem, UserStatus,
};

/// Called with the operation name and the error before it is rethrown.
pub type TelemetryHook = Arc<dyn Fn(&str, &AzureError) + Send + Sync>;

/// Shared handle hosts keep the orchestrator behind.
pub type AzureServicesState = Arc<Mutex<AzureServices>>;

struct Session {
    email: String,
    subscriptions: Vec<SubscriptionItem>,
}

pub struct AzureServices {
    auth: Arc<dyn AuthSource>,
    app_service: Arc<dyn AppServiceProvider>,
    cosmos: Arc<dyn CosmosProvider>,
    functions: Arc<dyn FunctionsProvider>,
    resource_groups: Arc<dyn ResourceGroupProvider>,
    host: Arc<dyn HostInteraction>,
    config: AzureConfig,
    session: Option<Session>,
    cache: SubscriptionCache,
    telemetry: Option<TelemetryHook>,
}

impl AzureServices {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        auth: Arc<dyn AuthSource>,
        app_service: Arc<dyn AppServiceProvider>,
        cosmos: Arc<dyn CosmosProvider>,
        functions: Arc<dyn FunctionsProvider>,
        resource_groups: Arc<dyn ResourceGroupProvider>,
        host: Arc<dyn HostInteraction>,
        config: AzureConfig,
    ) -> Self {
        Self {
            auth,
            app_service,
            cosmos,
            functions,
            resource_groups,
            host,
            config,
            session: None,
            cache: SubscriptionCache::new(),
            telemetry: None,
        }
    }

    /// Wires every provider seam to one ARM gateway over the given client.
    pub fn over_arm(client: Arc<ArmClient>, config: AzureConfig) -> Self {
        let gateway = Arc::new(ArmGateway::new(client, config.clone()));
        Self::new(
            gateway.clone(),
            gateway.clone(),
            gateway.clone(),
            gateway.clone(),
            gateway,
            Arc::new(SilentHost),
            config,
        )
    }

    pub fn with_host(mut self, host: Arc<dyn HostInteraction>) -> Self {
        self.host = host;
        self
    }

    pub fn with_telemetry(mut self, hook: TelemetryHook) -> Self {
        self.telemetry = Some(hook);
        self
    }

    pub fn into_state(self) -> AzureServicesState {
        Arc::new(Mutex::new(self))
    }

    // ── Session ──────────────────────────────────────────────────────

    pub async fn login(&mut self) -> AzureResult<UserStatus> {
        match self.try_login().await {
            Ok(status) => Ok(status),
            Err(e) => {
                self.observe("login", &e);
                Err(e)
            }
        }
    }

    async fn try_login(&mut self) -> AzureResult<UserStatus> {
        let completed = self.auth.login().await?;
        if !completed {
            return Err(AzureError::new(
                AzureErrorKind::Auth,
                "Azure login did not complete",
            ));
        }
        let email = self.auth.user_email().await?;
        let subscriptions = self.auth.subscriptions().await?;
        info!("Signed in as {} with {} subscriptions", email, subscriptions.len());
        let status = UserStatus {
            email: email.clone(),
            subscriptions: subscriptions.clone(),
        };
        self.session = Some(Session { email, subscriptions });
        Ok(status)
    }

    pub async fn logout(&mut self) -> AzureResult<()> {
        match self.try_logout().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.observe("logout", &e);
                Err(e)
            }
        }
    }

    async fn try_logout(&mut self) -> AzureResult<()> {
        self.auth.logout().await?;
        self.session = None;
        self.cache.clear();
        info!("Signed out");
        Ok(())
    }

    /// `None` when nobody is signed in.
    pub fn user_status(&self) -> Option<UserStatus> {
        self.session.as_ref().map(|s| UserStatus {
            email: s.email.clone(),
            subscriptions: s.subscriptions.clone(),
        })
    }

    // ── Subscription cache ───────────────────────────────────────────

    /// Resolves the subscription a resource kind should use, going through
    /// the per-kind cache.
    pub fn ensure_subscription(
        &mut self,
        kind: ResourceKind,
        label: &str,
    ) -> AzureResult<SubscriptionItem> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(AzureError::not_authenticated)?;
        self.cache.ensure(kind, label, &session.subscriptions)
    }

    // ── Names ────────────────────────────────────────────────────────

    /// Derives a well-formed candidate name from the project name. Offline
    /// only; live uniqueness is the validator's job.
    pub fn generate_valid_name(&self, kind: ResourceKind, project_name: &str) -> String {
        names::generate(kind, project_name)
    }

    pub async fn validate_name(
        &mut self,
        kind: ResourceKind,
        name: &str,
        subscription_label: &str,
    ) -> AzureResult<NameValidationResult> {
        match self.try_validate_name(kind, name, subscription_label).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.observe("validate-name", &e);
                Err(e)
            }
        }
    }

    async fn try_validate_name(
        &mut self,
        kind: ResourceKind,
        name: &str,
        subscription_label: &str,
    ) -> AzureResult<NameValidationResult> {
        let subscription = self.ensure_subscription(kind, subscription_label)?;
        self.check_availability(kind, &subscription, name).await
    }

    /// Offline rules first, then the provider. An unavailable name is a
    /// result, never an error; only transport and auth failures throw.
    async fn check_availability(
        &self,
        kind: ResourceKind,
        subscription: &SubscriptionItem,
        name: &str,
    ) -> AzureResult<NameValidationResult> {
        if let Some(reason) = names::check(kind, name) {
            return Ok(NameValidationResult::unavailable(reason));
        }
        let reason = match kind {
            ResourceKind::AppService => self.app_service.check_name(subscription, name).await?,
            ResourceKind::Functions => self.functions.check_name(subscription, name).await?,
            ResourceKind::CosmosDb => self.cosmos.check_name(subscription, name).await?,
            ResourceKind::ResourceGroup => {
                let existing = self.resource_groups.list(subscription).await?;
                existing
                    .iter()
                    .find(|g| g.name.eq_ignore_ascii_case(name))
                    .map(|g| format!("Resource group '{}' already exists", g.name))
            }
        };
        // A blank reason counts as available, matching the providers'
        // truthiness contract.
        Ok(match reason.filter(|r| !r.is_empty()) {
            Some(reason) => NameValidationResult::unavailable(reason),
            None => NameValidationResult::available(),
        })
    }

    // ── Subscription data ────────────────────────────────────────────

    pub async fn subscription_data(
        &mut self,
        kind: ResourceKind,
        subscription_label: &str,
        project_name: &str,
    ) -> AzureResult<SubscriptionData> {
        match self
            .try_subscription_data(kind, subscription_label, project_name)
            .await
        {
            Ok(data) => Ok(data),
            Err(e) => {
                self.observe("get-subscription-data", &e);
                Err(e)
            }
        }
    }

    async fn try_subscription_data(
        &mut self,
        kind: ResourceKind,
        subscription_label: &str,
        project_name: &str,
    ) -> AzureResult<SubscriptionData> {
        let subscription = self.ensure_subscription(kind, subscription_label)?;
        let locations = self.auth.locations(kind, &subscription).await?;
        let resource_groups = self.resource_groups.list(&subscription).await?;
        Ok(SubscriptionData {
            locations,
            resource_groups,
            default_name: names::generate(kind, project_name),
        })
    }

    // ── Resource group planning ──────────────────────────────────────

    pub async fn plan_resource_groups(
        &mut self,
        request: &ResourceGroupPlanRequest,
    ) -> AzureResult<Vec<ResourceGroupSelection>> {
        match self.try_plan_resource_groups(request).await {
            Ok(plan) => Ok(plan),
            Err(e) => {
                self.observe("plan-resource-groups", &e);
                Err(e)
            }
        }
    }

    async fn try_plan_resource_groups(
        &mut self,
        request: &ResourceGroupPlanRequest,
    ) -> AzureResult<Vec<ResourceGroupSelection>> {
        // Resolve every target through its own cache slot, then collapse
        // to distinct subscriptions by id; two labels can point at the
        // same subscription.
        let mut distinct: Vec<SubscriptionItem> = Vec::new();
        for target in &request.targets {
            let subscription = self.ensure_subscription(target.kind, &target.subscription_label)?;
            if !distinct
                .iter()
                .any(|s| s.subscription_id == subscription.subscription_id)
            {
                distinct.push(subscription);
            }
        }

        let listings = join_all(
            distinct
                .iter()
                .map(|subscription| self.resource_groups.list(subscription)),
        )
        .await;
        let mut existing: Vec<Vec<_>> = Vec::with_capacity(listings.len());
        for result in listings {
            existing.push(result?);
        }

        // One shared name, free in every involved subscription.
        let mut taken: HashSet<String> = HashSet::new();
        for groups in &existing {
            for group in groups {
                taken.insert(group.name.clone());
            }
        }
        let base = format!(
            "{}-rg",
            names::normalize(ResourceKind::ResourceGroup, &request.project_name)
        );
        let shared_name = resource_groups::find_free_name(&base, &taken)?;

        let mut plan = Vec::with_capacity(distinct.len());
        for (subscription, groups) in distinct.into_iter().zip(existing) {
            if subscription.is_sandbox(&self.config.sandbox_tenants) {
                // Sandboxes cannot create groups; reuse the pre-provisioned
                // one and keep its location.
                let first = groups.first().ok_or_else(|| {
                    AzureError::validation(format!(
                        "Sandbox subscription '{}' has no resource group to reuse",
                        subscription.label
                    ))
                })?;
                plan.push(ResourceGroupSelection {
                    resource_group: first.name.clone(),
                    location: first.location.clone(),
                    subscription,
                });
            } else {
                plan.push(ResourceGroupSelection {
                    resource_group: shared_name.clone(),
                    location: self.config.default_location.clone(),
                    subscription,
                });
            }
        }
        Ok(plan)
    }

    /// Plans and then creates the groups, skipping sandbox subscriptions
    /// whose group already exists. Returns the executed plan.
    pub async fn deploy_resource_groups(
        &mut self,
        request: &ResourceGroupPlanRequest,
    ) -> AzureResult<Vec<ResourceGroupSelection>> {
        match self.try_deploy_resource_groups(request).await {
            Ok(plan) => Ok(plan),
            Err(e) => {
                self.observe("deploy-resource-groups", &e);
                Err(e)
            }
        }
    }

    async fn try_deploy_resource_groups(
        &mut self,
        request: &ResourceGroupPlanRequest,
    ) -> AzureResult<Vec<ResourceGroupSelection>> {
        let plan = self.try_plan_resource_groups(request).await?;
        let results = join_all(
            plan.iter()
                .filter(|s| !s.subscription.is_sandbox(&self.config.sandbox_tenants))
                .map(|selection| self.resource_groups.create(selection)),
        )
        .await;
        for result in results {
            result?;
        }
        Ok(plan)
    }

    // ── Deployments ──────────────────────────────────────────────────

    pub async fn deploy_app_service(
        &mut self,
        selections: &AppServiceSelections,
    ) -> AzureResult<AppServiceDeployment> {
        match self.try_deploy_app_service(selections).await {
            Ok(deployment) => Ok(deployment),
            Err(e) => {
                self.observe("deploy-app-service", &e);
                Err(e)
            }
        }
    }

    async fn try_deploy_app_service(
        &mut self,
        selections: &AppServiceSelections,
    ) -> AzureResult<AppServiceDeployment> {
        let subscription =
            self.ensure_subscription(ResourceKind::AppService, &selections.subscription_label)?;

        // Names can be taken between the UI check and the deploy click.
        let validation = self
            .check_availability(ResourceKind::AppService, &subscription, &selections.site_name)
            .await?;
        if !validation.available {
            return Err(AzureError::validation(validation.reason.unwrap_or_else(|| {
                format!("Site name '{}' is not available", selections.site_name)
            })));
        }

        let tier = app_service::choose_tier(subscription.is_sandbox(&self.config.sandbox_tenants));
        let deployment_id = self.app_service.create(&subscription, selections, tier).await?;
        if deployment_id.is_empty() {
            return Err(AzureError::creation(format!(
                "App Service deployment for '{}' returned no id",
                selections.site_name
            )));
        }

        let site_id = app_service::site_id_from_deployment(&deployment_id);
        self.host
            .notify(&format!("App Service '{}' created", selections.site_name));
        Ok(AppServiceDeployment {
            site_id,
            site_name: selections.site_name.clone(),
        })
    }

    pub async fn deploy_cosmos(
        &mut self,
        selections: &CosmosSelections,
        env_path: Option<&Path>,
        linked_app: Option<&LinkedWebApp>,
    ) -> AzureResult<CosmosDeployment> {
        match self.try_deploy_cosmos(selections, env_path, linked_app).await {
            Ok(deployment) => Ok(deployment),
            Err(e) => {
                self.observe("deploy-cosmos", &e);
                Err(e)
            }
        }
    }

    async fn try_deploy_cosmos(
        &mut self,
        selections: &CosmosSelections,
        env_path: Option<&Path>,
        linked_app: Option<&LinkedWebApp>,
    ) -> AzureResult<CosmosDeployment> {
        let subscription =
            self.ensure_subscription(ResourceKind::CosmosDb, &selections.subscription_label)?;

        let validation = self
            .check_availability(ResourceKind::CosmosDb, &subscription, &selections.account_name)
            .await?;
        if !validation.available {
            return Err(AzureError::validation(validation.reason.unwrap_or_else(|| {
                format!("Account name '{}' is not available", selections.account_name)
            })));
        }

        let deployment = self.cosmos.create(&subscription, selections).await?;
        if deployment.account_id.is_empty() {
            return Err(AzureError::creation(format!(
                "Cosmos DB deployment for '{}' returned no id",
                selections.account_name
            )));
        }
        self.host.notify(&format!(
            "Cosmos DB account '{}' created",
            selections.account_name
        ));

        if let Some(path) = env_path {
            let question = format!(
                "Update {} with the new Cosmos DB connection settings?",
                path.display()
            );
            if self.host.confirm(&question).await {
                settings::sync_env_file(path, &deployment.connection_string)?;
                self.host.notify(&format!("Updated {}", path.display()));
            }
        }

        if let Some(app) = linked_app {
            let app_subscription =
                self.ensure_subscription(ResourceKind::AppService, &app.subscription_label)?;
            let pairs = settings::parse_connection_string(&deployment.connection_string);
            let map = settings::to_map(&pairs);
            self.app_service
                .update_app_settings(&app_subscription, &app.resource_group, &app.site_name, &map)
                .await?;
            self.host.notify(&format!(
                "Connection settings pushed to '{}'",
                app.site_name
            ));
        }

        Ok(deployment)
    }

    pub async fn deploy_functions(
        &mut self,
        selections: &FunctionsSelections,
    ) -> AzureResult<FunctionsDeployment> {
        match self.try_deploy_functions(selections).await {
            Ok(deployment) => Ok(deployment),
            Err(e) => {
                self.observe("deploy-functions", &e);
                Err(e)
            }
        }
    }

    async fn try_deploy_functions(
        &mut self,
        selections: &FunctionsSelections,
    ) -> AzureResult<FunctionsDeployment> {
        let subscription =
            self.ensure_subscription(ResourceKind::Functions, &selections.subscription_label)?;

        let validation = self
            .check_availability(ResourceKind::Functions, &subscription, &selections.app_name)
            .await?;
        if !validation.available {
            return Err(AzureError::validation(validation.reason.unwrap_or_else(|| {
                format!("App name '{}' is not available", selections.app_name)
            })));
        }

        let deployment_id = self.functions.create(&subscription, selections).await?;
        if deployment_id.is_empty() {
            return Err(AzureError::creation(format!(
                "Function App deployment for '{}' returned no id",
                selections.app_name
            )));
        }

        let site_id = app_service::site_id_from_deployment(&deployment_id);
        self.host
            .notify(&format!("Function App '{}' created", selections.app_name));
        Ok(FunctionsDeployment {
            site_id,
            app_name: selections.app_name.clone(),
        })
    }

    // ── Telemetry ────────────────────────────────────────────────────

    fn observe(&self, operation: &str, error: &AzureError) {
        error!("{} failed: {}", operation, error);
        if let Some(hook) = &self.telemetry {
            hook(operation, error);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

//! End-to-end orchestration tests over in-memory providers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use acorn_azure::commands::{self, Command};
use acorn_azure::cosmos;
use acorn_azure::gateway::{
    AppServiceProvider, AuthSource, CosmosProvider, FunctionsProvider, HostInteraction,
    ResourceGroupProvider,
};
use acorn_azure::service::AzureServices;
use acorn_azure::types::{
    AppServiceSelections, AzureConfig, AzureErrorKind, AzureResult, CosmosApi, CosmosDeployment,
    CosmosSelections, FunctionsSelections, LinkedWebApp, PlanTarget, ResourceGroupItem,
    ResourceGroupPlanRequest, ResourceGroupSelection, ResourceKind, SubscriptionItem,
    SANDBOX_TENANTS,
};

// ─── Fakes ──────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeAzure {
    email: String,
    subscriptions: Vec<SubscriptionItem>,
    locations: Vec<String>,
    fail_login: bool,
    empty_ids: bool,
    taken_names: Mutex<HashSet<String>>,
    groups: Mutex<HashMap<String, Vec<ResourceGroupItem>>>,
    app_creates: Mutex<Vec<(String, String)>>,
    function_creates: Mutex<Vec<String>>,
    cosmos_creates: Mutex<Vec<String>>,
    settings_pushed: Mutex<Vec<(String, HashMap<String, String>)>>,
}

impl FakeAzure {
    fn new() -> Self {
        Self {
            email: "dev@example.com".into(),
            locations: vec!["Central US".into(), "West Europe".into()],
            ..Default::default()
        }
    }

    fn with_subscription(mut self, label: &str, id: &str, tenant: &str) -> Self {
        self.subscriptions.push(SubscriptionItem {
            label: label.into(),
            subscription_id: id.into(),
            tenant_id: tenant.into(),
        });
        self
    }

    fn with_group(self, subscription_id: &str, name: &str, location: &str) -> Self {
        self.groups
            .lock()
            .unwrap()
            .entry(subscription_id.to_string())
            .or_default()
            .push(ResourceGroupItem {
                name: name.into(),
                location: location.into(),
            });
        self
    }

    fn with_taken(self, name: &str) -> Self {
        self.taken_names.lock().unwrap().insert(name.into());
        self
    }

    fn with_empty_ids(mut self) -> Self {
        self.empty_ids = true;
        self
    }

    fn with_failing_login(mut self) -> Self {
        self.fail_login = true;
        self
    }

    fn availability(&self, name: &str) -> Option<String> {
        if self.taken_names.lock().unwrap().contains(name) {
            Some(format!("'{}' is already taken", name))
        } else {
            None
        }
    }

    fn groups_of(&self, subscription_id: &str) -> Vec<ResourceGroupItem> {
        self.groups
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuthSource for FakeAzure {
    async fn login(&self) -> AzureResult<bool> {
        Ok(!self.fail_login)
    }

    async fn logout(&self) -> AzureResult<bool> {
        Ok(true)
    }

    async fn user_email(&self) -> AzureResult<String> {
        Ok(self.email.clone())
    }

    async fn subscriptions(&self) -> AzureResult<Vec<SubscriptionItem>> {
        Ok(self.subscriptions.clone())
    }

    async fn locations(
        &self,
        _kind: ResourceKind,
        _subscription: &SubscriptionItem,
    ) -> AzureResult<Vec<String>> {
        Ok(self.locations.clone())
    }
}

#[async_trait]
impl AppServiceProvider for FakeAzure {
    async fn check_name(
        &self,
        _subscription: &SubscriptionItem,
        name: &str,
    ) -> AzureResult<Option<String>> {
        Ok(self.availability(name))
    }

    async fn create(
        &self,
        subscription: &SubscriptionItem,
        selections: &AppServiceSelections,
        tier: &str,
    ) -> AzureResult<String> {
        self.app_creates
            .lock()
            .unwrap()
            .push((selections.site_name.clone(), tier.to_string()));
        if self.empty_ids {
            return Ok(String::new());
        }
        Ok(format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Resources/deployments/{}-AppService",
            subscription.subscription_id, selections.resource_group, selections.site_name
        ))
    }

    async fn update_app_settings(
        &self,
        _subscription: &SubscriptionItem,
        _resource_group: &str,
        site_name: &str,
        settings: &HashMap<String, String>,
    ) -> AzureResult<()> {
        self.settings_pushed
            .lock()
            .unwrap()
            .push((site_name.to_string(), settings.clone()));
        Ok(())
    }
}

#[async_trait]
impl CosmosProvider for FakeAzure {
    async fn check_name(
        &self,
        _subscription: &SubscriptionItem,
        name: &str,
    ) -> AzureResult<Option<String>> {
        Ok(self.availability(name))
    }

    async fn create(
        &self,
        _subscription: &SubscriptionItem,
        selections: &CosmosSelections,
    ) -> AzureResult<CosmosDeployment> {
        self.cosmos_creates
            .lock()
            .unwrap()
            .push(selections.account_name.clone());
        let account_id = if self.empty_ids {
            String::new()
        } else {
            format!(
                "/subscriptions/s/providers/Microsoft.DocumentDB/databaseAccounts/{}",
                selections.account_name
            )
        };
        let endpoint = format!("https://{}.documents.azure.com:443/", selections.account_name);
        Ok(CosmosDeployment {
            account_id,
            account_name: selections.account_name.clone(),
            connection_string: cosmos::connection_string(
                selections.api,
                &selections.account_name,
                &endpoint,
                "key-123",
            ),
        })
    }
}

#[async_trait]
impl FunctionsProvider for FakeAzure {
    async fn check_name(
        &self,
        _subscription: &SubscriptionItem,
        name: &str,
    ) -> AzureResult<Option<String>> {
        Ok(self.availability(name))
    }

    async fn create(
        &self,
        subscription: &SubscriptionItem,
        selections: &FunctionsSelections,
    ) -> AzureResult<String> {
        self.function_creates
            .lock()
            .unwrap()
            .push(selections.app_name.clone());
        if self.empty_ids {
            return Ok(String::new());
        }
        Ok(format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Resources/deployments/{}-Functions",
            subscription.subscription_id, selections.resource_group, selections.app_name
        ))
    }
}

#[async_trait]
impl ResourceGroupProvider for FakeAzure {
    async fn list(&self, subscription: &SubscriptionItem) -> AzureResult<Vec<ResourceGroupItem>> {
        Ok(self.groups_of(&subscription.subscription_id))
    }

    async fn create(&self, selection: &ResourceGroupSelection) -> AzureResult<ResourceGroupItem> {
        let item = ResourceGroupItem {
            name: selection.resource_group.clone(),
            location: selection.location.clone(),
        };
        self.groups
            .lock()
            .unwrap()
            .entry(selection.subscription.subscription_id.clone())
            .or_default()
            .push(item.clone());
        Ok(item)
    }
}

struct RecordingHost {
    confirm_answer: bool,
    confirmations: Mutex<Vec<String>>,
    notifications: Mutex<Vec<String>>,
}

impl RecordingHost {
    fn new(confirm_answer: bool) -> Self {
        Self {
            confirm_answer,
            confirmations: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
        }
    }

    fn notifications(&self) -> Vec<String> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostInteraction for RecordingHost {
    async fn confirm(&self, message: &str) -> bool {
        self.confirmations.lock().unwrap().push(message.to_string());
        self.confirm_answer
    }

    fn notify(&self, message: &str) {
        self.notifications.lock().unwrap().push(message.to_string());
    }
}

// ─── Harness ────────────────────────────────────────────────────────

const PAID_TENANT: &str = "11111111-2222-3333-4444-555555555555";

fn harness(
    fake: FakeAzure,
    host: RecordingHost,
) -> (AzureServices, Arc<FakeAzure>, Arc<RecordingHost>) {
    let fake = Arc::new(fake);
    let host = Arc::new(host);
    let services = AzureServices::new(
        fake.clone(),
        fake.clone(),
        fake.clone(),
        fake.clone(),
        fake.clone(),
        host.clone(),
        AzureConfig::new(),
    );
    (services, fake, host)
}

fn paid_fake() -> FakeAzure {
    FakeAzure::new().with_subscription("Dev", "sub-dev", PAID_TENANT)
}

fn app_selections(site: &str) -> AppServiceSelections {
    AppServiceSelections {
        site_name: site.into(),
        subscription_label: "Dev".into(),
        resource_group: "rg-demo".into(),
        location: "Central US".into(),
        runtime_stack: "NODE|18-lts".into(),
    }
}

fn cosmos_selections(account: &str) -> CosmosSelections {
    CosmosSelections {
        account_name: account.into(),
        subscription_label: "Dev".into(),
        resource_group: "rg-demo".into(),
        location: "Central US".into(),
        api: CosmosApi::Sql,
    }
}

// ─── Session ────────────────────────────────────────────────────────

#[tokio::test]
async fn login_then_status_then_logout() {
    let (mut services, _fake, _host) = harness(paid_fake(), RecordingHost::new(true));

    assert!(services.user_status().is_none());
    let status = services.login().await.unwrap();
    assert_eq!(status.email, "dev@example.com");
    assert_eq!(status.subscriptions.len(), 1);

    let again = services.user_status().unwrap();
    assert_eq!(again.subscriptions[0].label, "Dev");

    services.logout().await.unwrap();
    assert!(services.user_status().is_none());
}

#[tokio::test]
async fn failed_login_leaves_no_session() {
    let (mut services, _fake, _host) = harness(
        paid_fake().with_failing_login(),
        RecordingHost::new(true),
    );
    let err = services.login().await.unwrap_err();
    assert_eq!(err.kind, AzureErrorKind::Auth);
    assert!(services.user_status().is_none());
}

// ─── Name validation ────────────────────────────────────────────────

#[tokio::test]
async fn validate_name_both_outcomes() {
    let (mut services, _fake, _host) = harness(
        paid_fake().with_taken("taken-app"),
        RecordingHost::new(true),
    );
    services.login().await.unwrap();

    let free = services
        .validate_name(ResourceKind::AppService, "fresh-app", "Dev")
        .await
        .unwrap();
    assert!(free.available);
    assert!(free.reason.is_none());

    // Validation has no side effects; asking again gives the same answer.
    let again = services
        .validate_name(ResourceKind::AppService, "fresh-app", "Dev")
        .await
        .unwrap();
    assert_eq!(free, again);

    let taken = services
        .validate_name(ResourceKind::AppService, "taken-app", "Dev")
        .await
        .unwrap();
    assert!(!taken.available);
    assert!(taken.reason.unwrap().contains("taken-app"));
}

#[tokio::test]
async fn offline_rules_short_circuit_validation() {
    let (mut services, _fake, _host) = harness(paid_fake(), RecordingHost::new(true));
    services.login().await.unwrap();

    let result = services
        .validate_name(ResourceKind::CosmosDb, "Bad Name!", "Dev")
        .await
        .unwrap();
    assert!(!result.available);
    assert!(result.reason.unwrap().contains("lowercase"));
}

#[tokio::test]
async fn resource_group_validation_checks_existing_groups() {
    let (mut services, _fake, _host) = harness(
        paid_fake().with_group("sub-dev", "Existing-RG", "centralus"),
        RecordingHost::new(true),
    );
    services.login().await.unwrap();

    let clash = services
        .validate_name(ResourceKind::ResourceGroup, "existing-rg", "Dev")
        .await
        .unwrap();
    assert!(!clash.available);

    let free = services
        .validate_name(ResourceKind::ResourceGroup, "new-rg", "Dev")
        .await
        .unwrap();
    assert!(free.available);
}

#[tokio::test]
async fn unknown_subscription_label_errors() {
    let (mut services, _fake, _host) = harness(paid_fake(), RecordingHost::new(true));
    services.login().await.unwrap();

    let err = services
        .validate_name(ResourceKind::AppService, "fresh-app", "Nope")
        .await
        .unwrap_err();
    assert_eq!(err.kind, AzureErrorKind::SubscriptionNotFound);
}

// ─── Resource group planning ────────────────────────────────────────

fn plan_request(project: &str, targets: &[(ResourceKind, &str)]) -> ResourceGroupPlanRequest {
    ResourceGroupPlanRequest {
        project_name: project.into(),
        targets: targets
            .iter()
            .map(|(kind, label)| PlanTarget {
                kind: *kind,
                subscription_label: label.to_string(),
            })
            .collect(),
    }
}

#[tokio::test]
async fn planning_collapses_targets_on_the_same_subscription() {
    let (mut services, _fake, _host) = harness(paid_fake(), RecordingHost::new(true));
    services.login().await.unwrap();

    let plan = services
        .plan_resource_groups(&plan_request(
            "My Cool App",
            &[
                (ResourceKind::AppService, "Dev"),
                (ResourceKind::CosmosDb, "Dev"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].resource_group, "my-cool-app-rg");
    assert_eq!(plan[0].location, "centralus");
}

#[tokio::test]
async fn planning_shares_one_name_free_everywhere() {
    let fake = FakeAzure::new()
        .with_subscription("Dev", "sub-dev", PAID_TENANT)
        .with_subscription("Prod", "sub-prod", PAID_TENANT)
        .with_group("sub-prod", "demo-rg", "westeurope");
    let (mut services, _fake, _host) = harness(fake, RecordingHost::new(true));
    services.login().await.unwrap();

    let plan = services
        .plan_resource_groups(&plan_request(
            "demo",
            &[
                (ResourceKind::AppService, "Dev"),
                (ResourceKind::CosmosDb, "Prod"),
            ],
        ))
        .await
        .unwrap();

    // The base clashes in sub-prod, so every subscription gets the bumped
    // name even where the base was free.
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].resource_group, "demo-rg-2");
    assert_eq!(plan[1].resource_group, "demo-rg-2");
}

#[tokio::test]
async fn sandbox_reuses_its_existing_group() {
    let fake = FakeAzure::new()
        .with_subscription("Dev", "sub-dev", PAID_TENANT)
        .with_subscription("Sandbox", "sub-learn", SANDBOX_TENANTS[0])
        .with_group("sub-learn", "learn-123-rg", "westus2");
    let (mut services, fake, _host) = harness(fake, RecordingHost::new(true));
    services.login().await.unwrap();

    let plan = services
        .deploy_resource_groups(&plan_request(
            "demo",
            &[
                (ResourceKind::AppService, "Sandbox"),
                (ResourceKind::CosmosDb, "Dev"),
            ],
        ))
        .await
        .unwrap();

    let sandbox = plan.iter().find(|s| s.subscription.label == "Sandbox").unwrap();
    assert_eq!(sandbox.resource_group, "learn-123-rg");
    assert_eq!(sandbox.location, "westus2");

    let paid = plan.iter().find(|s| s.subscription.label == "Dev").unwrap();
    assert_eq!(paid.resource_group, "demo-rg");
    assert_eq!(paid.location, "centralus");

    // Creation only ran for the paid subscription.
    assert_eq!(fake.groups_of("sub-learn").len(), 1);
    assert_eq!(fake.groups_of("sub-dev").len(), 1);
    assert_eq!(fake.groups_of("sub-dev")[0].name, "demo-rg");
}

#[tokio::test]
async fn sandbox_without_group_fails_planning() {
    let fake = FakeAzure::new().with_subscription("Sandbox", "sub-learn", SANDBOX_TENANTS[0]);
    let (mut services, _fake, _host) = harness(fake, RecordingHost::new(true));
    services.login().await.unwrap();

    let err = services
        .plan_resource_groups(&plan_request("demo", &[(ResourceKind::AppService, "Sandbox")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind, AzureErrorKind::Validation);
}

// ─── App Service deployment ─────────────────────────────────────────

#[tokio::test]
async fn app_service_deploy_normalizes_the_deployment_id() {
    let (mut services, fake, host) = harness(paid_fake(), RecordingHost::new(true));
    services.login().await.unwrap();

    let deployment = services.deploy_app_service(&app_selections("myapp")).await.unwrap();
    assert_eq!(
        deployment.site_id,
        "/subscriptions/sub-dev/resourceGroups/rg-demo/providers/Microsoft.Web/sites/myapp"
    );
    assert_eq!(deployment.site_name, "myapp");

    let creates = fake.app_creates.lock().unwrap().clone();
    assert_eq!(creates, vec![("myapp".to_string(), "B1".to_string())]);
    assert!(host.notifications().iter().any(|n| n.contains("myapp")));
}

#[tokio::test]
async fn sandbox_subscriptions_get_the_free_tier() {
    let fake = FakeAzure::new().with_subscription("Dev", "sub-learn", SANDBOX_TENANTS[1]);
    let (mut services, fake, _host) = harness(fake, RecordingHost::new(true));
    services.login().await.unwrap();

    services.deploy_app_service(&app_selections("myapp")).await.unwrap();
    let creates = fake.app_creates.lock().unwrap().clone();
    assert_eq!(creates[0].1, "F1");
}

#[tokio::test]
async fn deploy_rechecks_the_name_and_rejects_taken_ones() {
    let (mut services, fake, _host) = harness(
        paid_fake().with_taken("myapp"),
        RecordingHost::new(true),
    );
    services.login().await.unwrap();

    let err = services.deploy_app_service(&app_selections("myapp")).await.unwrap_err();
    assert_eq!(err.kind, AzureErrorKind::Validation);
    assert!(fake.app_creates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_deployment_id_is_a_creation_error() {
    let (mut services, _fake, _host) = harness(
        paid_fake().with_empty_ids(),
        RecordingHost::new(true),
    );
    services.login().await.unwrap();

    let err = services.deploy_app_service(&app_selections("myapp")).await.unwrap_err();
    assert_eq!(err.kind, AzureErrorKind::Creation);
}

// ─── Cosmos DB deployment ───────────────────────────────────────────

#[tokio::test]
async fn cosmos_deploy_writes_env_file_when_confirmed() {
    let (mut services, _fake, host) = harness(paid_fake(), RecordingHost::new(true));
    services.login().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let env_path = dir.path().join(".env");
    std::fs::write(&env_path, "PORT=3000\n").unwrap();

    let deployment = services
        .deploy_cosmos(&cosmos_selections("my-cosmos"), Some(env_path.as_path()), None)
        .await
        .unwrap();
    assert!(deployment.account_id.ends_with("/my-cosmos"));

    let content = std::fs::read_to_string(&env_path).unwrap();
    assert!(content.starts_with("PORT=3000\n"));
    assert!(content.contains("COSMOSDB_URI=https://my-cosmos.documents.azure.com:443/"));
    assert!(content.contains("COSMOSDB_PRIMARY_KEY=key-123"));
    assert!(host.notifications().iter().any(|n| n.contains(".env")));
}

#[tokio::test]
async fn cosmos_deploy_leaves_env_file_alone_when_declined() {
    let (mut services, _fake, host) = harness(paid_fake(), RecordingHost::new(false));
    services.login().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let env_path = dir.path().join(".env");
    std::fs::write(&env_path, "PORT=3000\n").unwrap();

    services
        .deploy_cosmos(&cosmos_selections("my-cosmos"), Some(env_path.as_path()), None)
        .await
        .unwrap();

    // The question was asked, the file was not touched.
    assert_eq!(host.confirmations.lock().unwrap().len(), 1);
    assert_eq!(std::fs::read_to_string(&env_path).unwrap(), "PORT=3000\n");
}

#[tokio::test]
async fn cosmos_deploy_pushes_settings_to_the_linked_web_app() {
    let (mut services, fake, _host) = harness(paid_fake(), RecordingHost::new(true));
    services.login().await.unwrap();

    let linked = LinkedWebApp {
        subscription_label: "Dev".into(),
        resource_group: "rg-demo".into(),
        site_name: "myapp".into(),
    };
    services
        .deploy_cosmos(&cosmos_selections("my-cosmos"), None, Some(&linked))
        .await
        .unwrap();

    let pushed = fake.settings_pushed.lock().unwrap().clone();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].0, "myapp");
    assert_eq!(
        pushed[0].1.get("COSMOSDB_URI").unwrap(),
        "https://my-cosmos.documents.azure.com:443/"
    );
    assert_eq!(pushed[0].1.get("COSMOSDB_PRIMARY_KEY").unwrap(), "key-123");
}

// ─── Function App deployment ────────────────────────────────────────

#[tokio::test]
async fn functions_deploy_normalizes_the_deployment_id() {
    let (mut services, fake, _host) = harness(paid_fake(), RecordingHost::new(true));
    services.login().await.unwrap();

    let selections = FunctionsSelections {
        app_name: "myfn".into(),
        subscription_label: "Dev".into(),
        resource_group: "rg-demo".into(),
        location: "Central US".into(),
        runtime: "node".into(),
    };
    let deployment = services.deploy_functions(&selections).await.unwrap();
    assert_eq!(
        deployment.site_id,
        "/subscriptions/sub-dev/resourceGroups/rg-demo/providers/Microsoft.Web/sites/myfn"
    );
    assert_eq!(fake.function_creates.lock().unwrap().clone(), vec!["myfn".to_string()]);
}

// ─── Telemetry ──────────────────────────────────────────────────────

#[tokio::test]
async fn failures_reach_the_telemetry_hook_and_still_throw() {
    let seen: Arc<Mutex<Vec<(String, AzureErrorKind)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let (services, _fake, _host) = harness(paid_fake(), RecordingHost::new(true));
    let mut services = services.with_telemetry(Arc::new(move |operation, error| {
        sink.lock().unwrap().push((operation.to_string(), error.kind.clone()));
    }));
    services.login().await.unwrap();

    let err = services
        .validate_name(ResourceKind::AppService, "fresh-app", "Nope")
        .await
        .unwrap_err();
    assert_eq!(err.kind, AzureErrorKind::SubscriptionNotFound);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "validate-name");
    assert_eq!(seen[0].1, AzureErrorKind::SubscriptionNotFound);
}

// ─── Command envelopes ──────────────────────────────────────────────

#[tokio::test]
async fn command_round_trip_over_the_envelope() {
    let (mut services, _fake, _host) = harness(
        paid_fake().with_taken("taken-app"),
        RecordingHost::new(true),
    );

    // Not signed in yet: null payload.
    let response = commands::dispatch(
        &mut services,
        commands::parse_command(r#"{"command":"get-user-status","scope":{"panel":1}}"#).unwrap(),
    )
    .await
    .unwrap();
    assert!(response.payload.is_none());
    assert_eq!(response.scope["panel"], 1);

    let response = commands::dispatch(
        &mut services,
        Command::Login { scope: json!(null) },
    )
    .await
    .unwrap();
    assert_eq!(response.payload.unwrap()["email"], "dev@example.com");

    let response = commands::dispatch(
        &mut services,
        commands::parse_command(
            r#"{"command":"validate-name","scope":"wizard","kind":"app-service","name":"taken-app","subscription":"Dev"}"#,
        )
        .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.command, "validate-name");
    assert_eq!(response.scope, json!("wizard"));
    let payload = response.payload.unwrap();
    assert_eq!(payload["available"], false);

    let response = commands::dispatch(
        &mut services,
        commands::parse_command(
            r#"{"command":"get-subscription-data","scope":2,"kind":"app-service","subscription":"Dev","projectName":"My Cool App"}"#,
        )
        .unwrap(),
    )
    .await
    .unwrap();
    let payload = response.payload.unwrap();
    assert_eq!(payload["locations"][0], "Central US");
    assert!(payload["default_name"].as_str().unwrap().starts_with("my-cool-app-"));
}

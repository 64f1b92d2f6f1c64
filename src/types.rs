//! Core types for the Acorn Azure deployment orchestrator.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Error types ─────────────────────────────────────────────────────

/// Categorised error kinds for orchestration and ARM operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AzureErrorKind {
    Auth,
    NotAuthenticated,
    SubscriptionNotFound,
    Validation,
    Creation,
    NotFound,
    Conflict,
    Forbidden,
    RateLimit,
    BadRequest,
    ServerError,
    Network,
    Parse,
    Io,
}

impl fmt::Display for AzureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => write!(f, "Authentication error"),
            Self::NotAuthenticated => write!(f, "Not authenticated"),
            Self::SubscriptionNotFound => write!(f, "Subscription not found"),
            Self::Validation => write!(f, "Validation error"),
            Self::Creation => write!(f, "Creation error"),
            Self::NotFound => write!(f, "Resource not found"),
            Self::Conflict => write!(f, "Resource conflict"),
            Self::Forbidden => write!(f, "Forbidden"),
            Self::RateLimit => write!(f, "Rate limit exceeded"),
            Self::BadRequest => write!(f, "Bad request"),
            Self::ServerError => write!(f, "Server error"),
            Self::Network => write!(f, "Network error"),
            Self::Parse => write!(f, "Parse error"),
            Self::Io => write!(f, "File error"),
        }
    }
}

/// Main error type for all orchestrator operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureError {
    pub kind: AzureErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl AzureError {
    pub fn new(kind: AzureErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(kind: AzureErrorKind, message: impl Into<String>, status: u16) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: Some(status),
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            400 => AzureErrorKind::BadRequest,
            401 => AzureErrorKind::Auth,
            403 => AzureErrorKind::Forbidden,
            404 => AzureErrorKind::NotFound,
            409 => AzureErrorKind::Conflict,
            429 => AzureErrorKind::RateLimit,
            500..=599 => AzureErrorKind::ServerError,
            _ => AzureErrorKind::Network,
        };
        Self::with_status(kind, body.to_string(), status)
    }

    pub fn not_authenticated() -> Self {
        Self::new(
            AzureErrorKind::NotAuthenticated,
            "Not signed in to Azure. Set credentials and call login first.",
        )
    }

    pub fn subscription_not_found(label: &str) -> Self {
        Self::new(
            AzureErrorKind::SubscriptionNotFound,
            format!("Subscription '{}' was not found in the current session", label),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AzureErrorKind::Validation, message)
    }

    pub fn creation(message: impl Into<String>) -> Self {
        Self::new(AzureErrorKind::Creation, message)
    }
}

impl fmt::Display for AzureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for AzureError {}

impl From<AzureError> for String {
    fn from(e: AzureError) -> String {
        e.to_string()
    }
}

pub type AzureResult<T> = Result<T, AzureError>;

// ─── Resource kinds ──────────────────────────────────────────────────

/// The resource families the orchestrator can validate names for, cache a
/// subscription for, and deploy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    AppService,
    CosmosDb,
    Functions,
    ResourceGroup,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppService => "app-service",
            Self::CosmosDb => "cosmos-db",
            Self::Functions => "functions",
            Self::ResourceGroup => "resource-group",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppService => write!(f, "App Service"),
            Self::CosmosDb => write!(f, "Cosmos DB"),
            Self::Functions => write!(f, "Function App"),
            Self::ResourceGroup => write!(f, "Resource Group"),
        }
    }
}

// ─── OAuth / Auth ────────────────────────────────────────────────────

/// Client credentials for Azure AD (service-principal or app-registration).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AzureCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// Home tenant; subscriptions from foreign (sandbox) tenants get their
    /// tokens from that tenant's endpoint with the same app registration.
    pub tenant_id: String,
    /// Display identity surfaced by `get-user-status`; a service principal
    /// has no mailbox, so the host supplies whatever it wants shown.
    #[serde(default)]
    pub account_email: Option<String>,
}

/// Cached bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AzureToken {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AzureToken {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => Utc::now() >= exp,
            None => false,
        }
    }

    /// True when the token expires within `margin_secs`, so callers can
    /// refresh slightly early instead of racing the expiry instant.
    pub fn expires_within(&self, margin_secs: i64) -> bool {
        match self.expires_at {
            Some(exp) => Utc::now() + chrono::Duration::seconds(margin_secs) >= exp,
            None => false,
        }
    }
}

/// Raw token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

// ─── Core data model ─────────────────────────────────────────────────

/// One subscription visible in the signed-in session. The `label` is the
/// display name the UI selects by; identity comparisons use
/// `subscription_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionItem {
    pub label: String,
    pub subscription_id: String,
    pub tenant_id: String,
}

impl SubscriptionItem {
    /// Whether this subscription lives in a learn/sandbox tenant, which
    /// restricts it to free tiers and its pre-provisioned resource group.
    pub fn is_sandbox(&self, sandbox_tenants: &[String]) -> bool {
        sandbox_tenants.iter().any(|t| t == &self.tenant_id)
    }
}

/// An existing resource group inside a subscription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceGroupItem {
    pub name: String,
    pub location: String,
}

/// One planned resource group: which subscription it belongs to, what it is
/// called, and where it goes. Built once per deployment request, never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceGroupSelection {
    pub subscription: SubscriptionItem,
    pub resource_group: String,
    pub location: String,
}

/// Uniform result of a live name check. Always returned, never thrown:
/// "name taken" is data, not an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NameValidationResult {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl NameValidationResult {
    pub fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

/// Payload for `login` / `get-user-status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStatus {
    pub email: String,
    pub subscriptions: Vec<SubscriptionItem>,
}

///// Payload for `get-subscription-data`: everything the UI needs to populate
/// its dropdowns for one resource kind on one subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionData {
    pub locations: Vec<String>,
    pub resource_groups: Vec<ResourceGroupItem>,
    pub default_name: String,
}

// ─── Deployment selections ───────────────────────────────────────────

/// User choices for one App Service deployment, assembled just before the
/// create call and discarded after use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppServiceSelections {
    pub site_name: String,
    pub subscription_label: String,
    pub resource_group: String,
    pub location: String,
    /// Linux runtime stack, e.g. `NODE|18-lts`.
    pub runtime_stack: String,
}

/// Cosmos DB API flavour; decides account kind and connection-string shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CosmosApi {
    MongoDb,
    Sql,
}

/// User choices for one Cosmos DB account deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosmosSelections {
    pub account_name: String,
    pub subscription_label: String,
    pub resource_group: String,
    pub location: String,
    pub api: CosmosApi,
}

/// User choices for one Function App deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionsSelections {
    pub app_name: String,
    pub subscription_label: String,
    pub resource_group: String,
    pub location: String,
    /// Worker runtime, e.g. `node`.
    pub runtime: String,
}

/// Web app that should receive the Cosmos connection string as application
/// settings after a database deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedWebApp {
    pub subscription_label: String,
    pub resource_group: String,
    pub site_name: String,
}

/// One resource kind the user opted into, with its chosen subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanTarget {
    pub kind: ResourceKind,
    pub subscription_label: String,
}

/// Input to resource-group planning: the project name the group name is
/// derived from, plus every opted-in resource kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceGroupPlanRequest {
    pub project_name: String,
    pub targets: Vec<PlanTarget>,
}

// ─── Deployment outputs ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppServiceDeployment {
    /// Resource-scoped site id (already normalized from the deployment id).
    pub site_id: String,
    pub site_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CosmosDeployment {
    pub account_id: String,
    pub account_name: String,
    /// Line-delimited `KEY=value` pairs ready for an env file.
    pub connection_string: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionsDeployment {
    pub site_id: String,
    pub app_name: String,
}

// ─── ARM wire shapes ─────────────────────────────────────────────────

/// Generic ARM list wrapper (`value` array with optional `nextLink`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmList<T> {
    #[serde(default)]
    pub value: Vec<T>,
    #[serde(default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmSubscription {
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub tenant_id: String,
}

/// Resource-provider metadata (`GET .../providers/{namespace}`); carries the
/// per-resource-type location lists the UI dropdowns are built from.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmProvider {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub resource_types: Vec<ArmProviderResourceType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmProviderResourceType {
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmResourceGroup {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub properties: Option<ArmResourceGroupProperties>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmResourceGroupProperties {
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResourceGroupRequest {
    pub location: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
}

/// ARM template deployment resource (`Microsoft.Resources/deployments`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmDeployment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: Option<ArmDeploymentProperties>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmDeploymentProperties {
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

/// `Microsoft.Web/sites` resource (web apps and function apps).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmSite {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub properties: Option<ArmSiteProperties>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmSiteProperties {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub default_host_name: Option<String>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

/// `Microsoft.DocumentDB/databaseAccounts` resource.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmCosmosAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub properties: Option<ArmCosmosAccountProperties>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmCosmosAccountProperties {
    #[serde(default)]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub document_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmCosmosKeyList {
    #[serde(default)]
    pub primary_master_key: String,
    #[serde(default)]
    pub secondary_master_key: String,
}

/// Body for `Microsoft.Web/checknameavailability`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckNameRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CheckNameResponse {
    #[serde(default)]
    pub name_available: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// ─── Configuration ───────────────────────────────────────────────────

/// ARM management endpoint.
pub const ARM_BASE: &str = "https://management.azure.com";
/// Microsoft Identity Platform endpoint.
pub const LOGIN_BASE: &str = "https://login.microsoftonline.com";

/// Learn/sandbox tenant directories: free-tier-only, pre-provisioned
/// resource group, no group creation allowed.
pub const SANDBOX_TENANTS: &[&str] = &[
    "604c1504-c6a3-4080-81aa-b33091104187",
    "cdc5aeea-15c5-4db6-b079-fcadd2505dc2",
];

/// Static orchestrator configuration: ARM api versions, fixed defaults and
/// the sandbox tenant list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    pub api_version_web: String,
    pub api_version_cosmos: String,
    pub api_version_resources: String,
    pub api_version_subscriptions: String,
    /// Location applied to newly generated resource groups.
    pub default_location: String,
    /// Delay between provisioning-state polls.
    pub poll_interval_ms: u64,
    pub sandbox_tenants: Vec<String>,
}

impl AzureConfig {
    pub fn new() -> Self {
        Self {
            api_version_web: "2023-12-01".into(),
            api_version_cosmos: "2024-05-15".into(),
            api_version_resources: "2024-03-01".into(),
            api_version_subscriptions: "2022-12-01".into(),
            default_location: "centralus".into(),
            poll_interval_ms: 5_000,
            sandbox_tenants: SANDBOX_TENANTS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

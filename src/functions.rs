//! Function App provisioning over ARM.
//!
//! Function apps live in the same `Microsoft.Web/sites` namespace as web
//! apps, so name checks go through the shared Web provider probe. Creation
//! uses a template deployment named `{app}-Functions` on the consumption
//! plan.

use log::info;
use serde_json::json;

use crate::app_service;
use crate::client::{self, ArmClient};
use crate::types::{ArmDeployment, AzureConfig, AzureResult, FunctionsSelections, SubscriptionItem};

/// Consumption plan; function apps never get a dedicated tier here.
const CONSUMPTION_SKU: &str = "Y1";

pub fn deployment_name(app_name: &str) -> String {
    format!("{}-Functions", app_name)
}

pub async fn check_name(
    client: &ArmClient,
    config: &AzureConfig,
    subscription: &SubscriptionItem,
    name: &str,
) -> AzureResult<Option<String>> {
    app_service::check_name_availability(client, config, subscription, name).await
}

/// Creates a Linux function app plus its consumption plan via a template
/// deployment and polls it to completion. Returns the deployment id.
pub async fn create_function_app(
    client: &ArmClient,
    config: &AzureConfig,
    subscription: &SubscriptionItem,
    selections: &FunctionsSelections,
) -> AzureResult<String> {
    let deployment = deployment_name(&selections.app_name);
    let url = client::resource_group_url(
        &subscription.subscription_id,
        &selections.resource_group,
        &format!(
            "/providers/Microsoft.Resources/deployments/{}?api-version={}",
            deployment, config.api_version_resources
        ),
    );
    let body = json!({
        "properties": {
            "mode": "Incremental",
            "template": deployment_template(selections, config),
        }
    });

    let submitted: ArmDeployment = client
        .put_json(&subscription.tenant_id, &url, &body)
        .await?;
    info!(
        "Submitted deployment {} for function app {}",
        deployment, selections.app_name
    );

    let finished =
        app_service::poll_deployment(client, config, &subscription.tenant_id, &url, submitted)
            .await?;
    Ok(finished.id)
}

fn deployment_template(selections: &FunctionsSelections, config: &AzureConfig) -> serde_json::Value {
    let plan = format!("{}-plan", selections.app_name);
    let plan_id = format!("[resourceId('Microsoft.Web/serverfarms', '{}')]", plan);
    json!({
        "$schema": "https://schema.management.azure.com/schemas/2019-04-01/deploymentTemplate.json#",
        "contentVersion": "1.0.0.0",
        "resources": [
            {
                "type": "Microsoft.Web/serverfarms",
                "apiVersion": config.api_version_web,
                "name": plan,
                "location": selections.location,
                "kind": "functionapp",
                "sku": { "name": CONSUMPTION_SKU, "tier": "Dynamic" },
                "properties": { "reserved": true }
            },
            {
                "type": "Microsoft.Web/sites",
                "apiVersion": config.api_version_web,
                "name": selections.app_name,
                "location": selections.location,
                "kind": "functionapp,linux",
                "dependsOn": [ plan_id ],
                "properties": {
                    "serverFarmId": plan_id,
                    "siteConfig": {
                        "appSettings": [
                            { "name": "FUNCTIONS_WORKER_RUNTIME", "value": selections.runtime },
                            { "name": "FUNCTIONS_EXTENSION_VERSION", "value": "~4" }
                        ]
                    }
                }
            }
        ]
    })
}

// ─── Tests ──────────────────────────────────────────────────────────

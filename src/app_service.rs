//! App Service provisioning over ARM.
//!
//! Web apps are created through an ARM template deployment named
//! `{site}-AppService` that carries both the server farm and the site.
//! The deployment id ARM hands back is therefore deployment-scoped; use
//! [`site_id_from_deployment`] to translate it to the site resource id.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info};
use serde_json::json;

use crate::client::{self, ArmClient};
use crate::types::{
    AppServiceSelections, ArmDeployment, AzureConfig, AzureError, AzureResult, CheckNameRequest,
    CheckNameResponse, SubscriptionItem,
};

/// Free tier for sandbox subscriptions, Basic for everything else.
pub fn choose_tier(sandbox: bool) -> &'static str {
    if sandbox {
        "F1"
    } else {
        "B1"
    }
}

pub fn deployment_name(site_name: &str) -> String {
    format!("{}-AppService", site_name)
}

/// Translates a template-deployment resource id into the site resource id
/// it created. Pure string transform, no lookup.
pub fn site_id_from_deployment(deployment_id: &str) -> String {
    let id = deployment_id.replace("Microsoft.Resources/deployments", "Microsoft.Web/sites");
    id.strip_suffix("-AppService")
        .or_else(|| id.strip_suffix("-Functions"))
        .map(|s| s.to_string())
        .unwrap_or(id)
}

/// Asks the Web provider whether a site name is free. `None` means
/// available; `Some(reason)` explains why not.
pub async fn check_name_availability(
    client: &ArmClient,
    config: &AzureConfig,
    subscription: &SubscriptionItem,
    name: &str,
) -> AzureResult<Option<String>> {
    let url = client::subscription_url(
        &subscription.subscription_id,
        &format!(
            "/providers/Microsoft.Web/checknameavailability?api-version={}",
            config.api_version_web
        ),
    );
    let request = CheckNameRequest {
        name: name.to_string(),
        resource_type: "Microsoft.Web/sites".into(),
    };
    let response: CheckNameResponse = client
        .post_json(&subscription.tenant_id, &url, &request)
        .await?;
    Ok(availability_reason(response))
}

fn availability_reason(response: CheckNameResponse) -> Option<String> {
    if response.name_available {
        None
    } else {
        Some(
            response
                .message
                .or(response.reason)
                .unwrap_or_else(|| "Name is already taken".into()),
        )
    }
}

/// Creates a Linux web app plus its server farm via a template deployment
/// and polls it to completion. Returns the deployment resource id.
pub async fn create_web_app(
    client: &ArmClient,
    config: &AzureConfig,
    subscription: &SubscriptionItem,
    selections: &AppServiceSelections,
    tier: &str,
) -> AzureResult<String> {
    let deployment = deployment_name(&selections.site_name);
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
            "template": deployment_template(selections, tier, config),
        }
    });

    let submitted: ArmDeployment = client
        .put_json(&subscription.tenant_id, &url, &body)
        .await?;
    info!(
        "Submitted deployment {} for site {} ({} tier)",
        deployment, selections.site_name, tier
    );

    let finished = poll_deployment(client, config, &subscription.tenant_id, &url, submitted).await?;
    Ok(finished.id)
}

fn deployment_template(
    selections: &AppServiceSelections,
    tier: &str,
    config: &AzureConfig,
) -> serde_json::Value {
    let plan = format!("{}-plan", selections.site_name);
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
                "kind": "linux",
                "sku": { "name": tier },
                "properties": { "reserved": true }
            },
            {
                "type": "Microsoft.Web/sites",
                "apiVersion": config.api_version_web,
                "name": selections.site_name,
                "location": selections.location,
                "dependsOn": [ plan_id ],
                "properties": {
                    "serverFarmId": plan_id,
                    "siteConfig": { "linuxFxVersion": selections.runtime_stack }
                }
            }
        ]
    })
}

/// Polls a template deployment until it reaches a terminal state.
pub async fn poll_deployment(
    client: &ArmClient,
    config: &AzureConfig,
    tenant_id: &str,
    url: &str,
    mut current: ArmDeployment,
) -> AzureResult<ArmDeployment> {
    loop {
        let state = current
            .properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_deref())
            .unwrap_or("");
        match state {
            "Succeeded" => return Ok(current),
            "Failed" | "Canceled" => {
                return Err(AzureError::creation(format!(
                    "Deployment {} ended in state {}",
                    current.name, state
                )));
            }
            _ => {
                debug!("Deployment {} is {}, polling again", current.name, state);
                tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
                current = client.get_json(tenant_id, url).await?;
            }
        }
    }
}

/// Replaces the site's application settings wholesale.
pub async fn update_app_settings(
    client: &ArmClient,
    config: &AzureConfig,
    subscription: &SubscriptionItem,
    resource_group: &str,
    site_name: &str,
    settings: &HashMap<String, String>,
) -> AzureResult<()> {
    let url = client::resource_group_url(
        &subscription.subscription_id,
        resource_group,
        &format!(
            "/providers/Microsoft.Web/sites/{}/config/appsettings?api-version={}",
            site_name, config.api_version_web
        ),
    );
    let body = json!({ "properties": settings });
    let _: serde_json::Value = client
        .put_json(&subscription.tenant_id, &url, &body)
        .await?;
    info!("Updated {} app settings on {}", settings.len(), site_name);
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────

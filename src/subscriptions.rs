//! Subscription and provider-metadata listings.
//!
//! A session's subscription list is the union of what the credentials can
//! see in the home tenant and in each known sandbox tenant. Sandbox
//! tenants that reject the credentials are skipped, not fatal.

use log::{debug, warn};

use crate::client::{self, ArmClient};
use crate::types::{ArmProvider, ArmSubscription, AzureConfig, AzureResult, SubscriptionItem};

/// Lists every enabled subscription visible to the session, home tenant
/// first, then sandbox tenants.
pub async fn list_subscriptions(
    client: &ArmClient,
    config: &AzureConfig,
) -> AzureResult<Vec<SubscriptionItem>> {
    let home_tenant = client
        .credentials()
        .await
        .map(|c| c.tenant_id)
        .unwrap_or_default();

    let mut tenants = vec![home_tenant.clone()];
    for sandbox in &config.sandbox_tenants {
        if !tenants.contains(sandbox) {
            tenants.push(sandbox.clone());
        }
    }

    let mut items = Vec::new();
    for tenant in &tenants {
        match list_for_tenant(client, config, tenant).await {
            Ok(raw) => items.extend(subscription_items(raw, tenant)),
            Err(e) if tenant == &home_tenant => return Err(e),
            Err(e) => {
                debug!("Skipping tenant {}: {}", tenant, e);
            }
        }
    }

    debug!("Session has {} subscriptions across {} tenants", items.len(), tenants.len());
    Ok(items)
}

async fn list_for_tenant(
    client: &ArmClient,
    config: &AzureConfig,
    tenant_id: &str,
) -> AzureResult<Vec<ArmSubscription>> {
    let url = client::arm_url(&format!(
        "/subscriptions?api-version={}",
        config.api_version_subscriptions
    ));
    client.get_all_pages(tenant_id, &url).await
}

/// Maps raw ARM subscriptions to session items, dropping disabled ones.
/// `fallback_tenant` covers older API shapes that omit `tenantId`.
pub fn subscription_items(raw: Vec<ArmSubscription>, fallback_tenant: &str) -> Vec<SubscriptionItem> {
    raw.into_iter()
        .filter(|s| s.state.is_empty() || s.state == "Enabled")
        .map(|s| SubscriptionItem {
            label: s.display_name,
            subscription_id: s.subscription_id,
            tenant_id: if s.tenant_id.is_empty() {
                fallback_tenant.to_string()
            } else {
                s.tenant_id
            },
        })
        .collect()
}

/// Fetches the locations a resource type is offered in for a subscription,
/// from the resource provider's metadata.
pub async fn provider_locations(
    client: &ArmClient,
    config: &AzureConfig,
    subscription: &SubscriptionItem,
    namespace: &str,
    resource_type: &str,
) -> AzureResult<Vec<String>> {
    let url = client::subscription_url(
        &subscription.subscription_id,
        &format!("/providers/{}?api-version={}", namespace, config.api_version_resources),
    );
    let provider: ArmProvider = client.get_json(&subscription.tenant_id, &url).await?;
    match locations_for(&provider, resource_type) {
        Some(locations) => Ok(locations),
        None => {
            warn!("Provider {} has no resource type {}", namespace, resource_type);
            Ok(Vec::new())
        }
    }
}

fn locations_for(provider: &ArmProvider, resource_type: &str) -> Option<Vec<String>> {
    provider
        .resource_types
        .iter()
        .find(|rt| rt.resource_type.eq_ignore_ascii_case(resource_type))
        .map(|rt| rt.locations.clone())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArmProviderResourceType;

    fn raw(id: &str, name: &str, state: &str, tenant: &str) -> ArmSubscription {
        ArmSubscription {
            subscription_id: id.into(),
            display_name: name.into(),
            state: state.into(),
            tenant_id: tenant.into(),
        }
    }

    #[test]
    fn maps_enabled_subscriptions() {
        let items = subscription_items(
            vec![
                raw("s1", "Dev", "Enabled", "t1"),
                raw("s2", "Old", "Disabled", "t1"),
                raw("s3", "Sandbox", "Enabled", ""),
            ],
            "fallback-tenant",
        );
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, "Dev");
        assert_eq!(items[0].tenant_id, "t1");
        assert_eq!(items[1].tenant_id, "fallback-tenant");
    }

    #[test]
    fn finds_resource_type_locations() {
        let provider = ArmProvider {
            namespace: "Microsoft.Web".into(),
            resource_types: vec![
                ArmProviderResourceType {
                    resource_type: "serverFarms".into(),
                    locations: vec!["Central US".into()],
                },
                ArmProviderResourceType {
                    resource_type: "sites".into(),
                    locations: vec!["Central US".into(), "West Europe".into()],
                },
            ],
        };
        let locations = locations_for(&provider, "Sites").unwrap();
        assert_eq!(locations, vec!["Central US", "West Europe"]);
        assert!(locations_for(&provider, "databaseAccounts").is_none());
    }
}

//! Resource group listing and creation.

use std::collections::HashSet;

use log::info;

use crate::client::{self, ArmClient};
use crate::types::{
    ArmResourceGroup, AzureConfig, AzureError, AzureResult, CreateResourceGroupRequest,
    ResourceGroupItem, ResourceGroupSelection, SubscriptionItem,
};

/// Upper bound on `-n` suffixes tried before giving up on a base name.
const MAX_NAME_ATTEMPTS: u32 = 50;

pub async fn list(
    client: &ArmClient,
    config: &AzureConfig,
    subscription: &SubscriptionItem,
) -> AzureResult<Vec<ResourceGroupItem>> {
    let url = client::subscription_url(
        &subscription.subscription_id,
        &format!("/resourcegroups?api-version={}", config.api_version_resources),
    );
    let groups: Vec<ArmResourceGroup> = client
        .get_all_pages(&subscription.tenant_id, &url)
        .await?;
    Ok(groups
        .into_iter()
        .map(|g| ResourceGroupItem {
            name: g.name,
            location: g.location,
        })
        .collect())
}

pub async fn create(
    client: &ArmClient,
    config: &AzureConfig,
    selection: &ResourceGroupSelection,
) -> AzureResult<ResourceGroupItem> {
    let url = client::subscription_url(
        &selection.subscription.subscription_id,
        &format!(
            "/resourcegroups/{}?api-version={}",
            selection.resource_group, config.api_version_resources
        ),
    );
    let body = CreateResourceGroupRequest {
        location: selection.location.clone(),
        tags: Default::default(),
    };
    let created: ArmResourceGroup = client
        .put_json(&selection.subscription.tenant_id, &url, &body)
        .await?;
    info!(
        "Created resource group {} in {} ({})",
        created.name, created.location, selection.subscription.label
    );
    Ok(ResourceGroupItem {
        name: created.name,
        location: created.location,
    })
}

/// Finds a name not present in `taken`, trying `base` first and then
/// numbered variants. Comparison is case-insensitive, matching ARM.
pub fn find_free_name(base: &str, taken: &HashSet<String>) -> AzureResult<String> {
    let taken: HashSet<String> = taken.iter().map(|n| n.to_ascii_lowercase()).collect();
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = if attempt == 0 {
            base.to_string()
        } else {
            format!("{}-{}", base, attempt + 1)
        };
        if !taken.contains(&candidate.to_ascii_lowercase()) {
            return Ok(candidate);
        }
    }
    Err(AzureError::validation(format!(
        "Could not find a free resource group name from '{}'",
        base
    )))
}

// ─── Tests ──────────────────────────────────────────────────────────

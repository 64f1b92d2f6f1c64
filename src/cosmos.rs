//! Cosmos DB account provisioning over ARM.

use std::time::Duration;

use log::{debug, info};
use serde_json::json;

use crate::client::{self, ArmClient};
use crate::types::{
    ArmCosmosAccount, ArmCosmosKeyList, AzureConfig, AzureError, AzureResult, CosmosApi,
    CosmosSelections, SubscriptionItem,
};

/// Cosmos account names are globally unique; the DocumentDB provider
/// exposes a tenant-level existence probe (200 taken, 404 free).
pub async fn check_name(
    client: &ArmClient,
    config: &AzureConfig,
    subscription: &SubscriptionItem,
    name: &str,
) -> AzureResult<Option<String>> {
    let url = client::arm_url(&format!(
        "/providers/Microsoft.DocumentDB/databaseAccountNames/{}?api-version={}",
        name, config.api_version_cosmos
    ));
    let exists = client.get_exists(&subscription.tenant_id, &url).await?;
    if exists {
        Ok(Some(format!(
            "A Cosmos DB account named '{}' already exists",
            name
        )))
    } else {
        Ok(None)
    }
}

/// Creates the account and polls until provisioning finishes. Returns the
/// final account resource, endpoint included.
pub async fn create_account(
    client: &ArmClient,
    config: &AzureConfig,
    subscription: &SubscriptionItem,
    selections: &CosmosSelections,
) -> AzureResult<ArmCosmosAccount> {
    let url = account_url(config, subscription, &selections.resource_group, &selections.account_name);
    let body = account_body(selections);

    let submitted: ArmCosmosAccount = client
        .put_json(&subscription.tenant_id, &url, &body)
        .await?;
    info!(
        "Submitted Cosmos DB account {} ({:?} API) in {}",
        selections.account_name, selections.api, selections.resource_group
    );

    poll_account(client, config, &subscription.tenant_id, &url, submitted).await
}

fn account_url(
    config: &AzureConfig,
    subscription: &SubscriptionItem,
    resource_group: &str,
    account_name: &str,
) -> String {
    client::resource_group_url(
        &subscription.subscription_id,
        resource_group,
        &format!(
            "/providers/Microsoft.DocumentDB/databaseAccounts/{}?api-version={}",
            account_name, config.api_version_cosmos
        ),
    )
}

fn account_body(selections: &CosmosSelections) -> serde_json::Value {
    let kind = match selections.api {
        CosmosApi::MongoDb => "MongoDB",
        CosmosApi::Sql => "GlobalDocumentDB",
    };
    json!({
        "location": selections.location,
        "kind": kind,
        "properties": {
            "databaseAccountOfferType": "Standard",
            "locations": [
                {
                    "locationName": selections.location,
                    "failoverPriority": 0,
                    "isZoneRedundant": false
                }
            ]
        }
    })
}

async fn poll_account(
    client: &ArmClient,
    config: &AzureConfig,
    tenant_id: &str,
    url: &str,
    mut current: ArmCosmosAccount,
) -> AzureResult<ArmCosmosAccount> {
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
                    "Cosmos DB account {} ended in state {}",
                    current.name, state
                )));
            }
            _ => {
                debug!("Cosmos DB account {} is {}, polling again", current.name, state);
                tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
                current = client.get_json(tenant_id, url).await?;
            }
        }
    }
}

pub async fn list_keys(
    client: &ArmClient,
    config: &AzureConfig,
    subscription: &SubscriptionItem,
    resource_group: &str,
    account_name: &str,
) -> AzureResult<ArmCosmosKeyList> {
    let url = client::resource_group_url(
        &subscription.subscription_id,
        resource_group,
        &format!(
            "/providers/Microsoft.DocumentDB/databaseAccounts/{}/listKeys?api-version={}",
            account_name, config.api_version_cosmos
        ),
    );
    client
        .post_json(&subscription.tenant_id, &url, &json!({}))
        .await
}

/// Builds the line-delimited connection string the env file and linked
/// web app consume.
pub fn connection_string(api: CosmosApi, account_name: &str, endpoint: &str, key: &str) -> String {
    match api {
        CosmosApi::Sql => {
            format!("COSMOSDB_URI={}\nCOSMOSDB_PRIMARY_KEY={}\n", endpoint, key)
        }
        CosmosApi::MongoDb => {
            format!(
                "COSMOSDB_CONNSTRING=mongodb://{}:{}@{}.mongo.cosmos.azure.com:10255/?ssl=true\n",
                account_name, key, account_name
            )
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

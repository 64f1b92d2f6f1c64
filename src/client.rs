//! HTTP client for the Azure Resource Manager REST API.
//!
//! One client instance is shared by every provider module. It owns the
//! credentials, the per-tenant token cache and the retry policy; callers
//! hand it a tenant id and a fully built URL and get typed JSON back.

use std::time::Duration;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{self, TokenCache};
use crate::types::{ArmList, AzureCredentials, AzureError, AzureErrorKind, AzureResult, ARM_BASE};

const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 500;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Copy)]
enum Verb {
    Get,
    Post,
    Put,
}

impl Verb {
    fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
        }
    }
}

pub struct ArmClient {
    http: reqwest::Client,
    credentials: RwLock<Option<AzureCredentials>>,
    tokens: TokenCache,
}

impl ArmClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            http,
            credentials: RwLock::new(None),
            tokens: TokenCache::new(),
        }
    }

    // ── Credentials and tokens ───────────────────────────────────────

    pub async fn set_credentials(&self, credentials: AzureCredentials) {
        let mut slot = self.credentials.write().await;
        *slot = Some(credentials);
    }

    pub async fn credentials(&self) -> Option<AzureCredentials> {
        self.credentials.read().await.clone()
    }

    pub async fn clear_tokens(&self) {
        self.tokens.clear().await;
    }

    /// Returns a valid bearer token for the tenant, acquiring one if the
    /// cache has nothing fresh.
    pub async fn bearer(&self, tenant_id: &str) -> AzureResult<String> {
        if let Some(token) = self.tokens.get(tenant_id).await {
            return Ok(token.access_token);
        }
        let credentials = self
            .credentials()
            .await
            .ok_or_else(AzureError::not_authenticated)?;
        let token = auth::acquire_token(&self.http, &credentials, tenant_id).await?;
        let access = token.access_token.clone();
        self.tokens.insert(tenant_id, token).await;
        Ok(access)
    }

    // ── JSON verbs ───────────────────────────────────────────────────

    pub async fn get_json<T: DeserializeOwned>(&self, tenant_id: &str, url: &str) -> AzureResult<T> {
        let response = self.send(Verb::Get, tenant_id, url, None).await?;
        Self::parse_json(response).await
    }

    pub async fn post_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        tenant_id: &str,
        url: &str,
        body: &B,
    ) -> AzureResult<T> {
        let body = serde_json::to_value(body)
            .map_err(|e| AzureError::new(AzureErrorKind::Parse, e.to_string()))?;
        let response = self.send(Verb::Post, tenant_id, url, Some(&body)).await?;
        Self::parse_json(response).await
    }

    pub async fn put_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        tenant_id: &str,
        url: &str,
        body: &B,
    ) -> AzureResult<T> {
        let body = serde_json::to_value(body)
            .map_err(|e| AzureError::new(AzureErrorKind::Parse, e.to_string()))?;
        let response = self.send(Verb::Put, tenant_id, url, Some(&body)).await?;
        Self::parse_json(response).await
    }

    /// GET that only asks whether the resource exists: 2xx is `true`,
    /// 404 is `false`, anything else stays an error.
    pub async fn get_exists(&self, tenant_id: &str, url: &str) -> AzureResult<bool> {
        match self.send(Verb::Get, tenant_id, url, None).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind == AzureErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// GETs an ARM list endpoint and follows `nextLink` until exhausted.
    pub async fn get_all_pages<T: DeserializeOwned + Default>(
        &self,
        tenant_id: &str,
        url: &str,
    ) -> AzureResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        while let Some(page_url) = next {
            let page: ArmList<T> = self.get_json(tenant_id, &page_url).await?;
            items.extend(page.value);
            next = page.next_link;
        }
        Ok(items)
    }

    // ── Request plumbing ─────────────────────────────────────────────

    async fn send(
        &self,
        verb: Verb,
        tenant_id: &str,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> AzureResult<reqwest::Response> {
        let token = self.bearer(tenant_id).await?;

        for attempt in 0..=MAX_RETRIES {
            debug!("{} {} (attempt {})", verb.as_str(), url, attempt + 1);

            let mut request = match verb {
                Verb::Get => self.http.get(url),
                Verb::Post => self.http.post(url),
                Verb::Put => self.http.put(url),
            };
            request = request
                .bearer_auth(&token)
                .header("x-ms-client-request-id", Uuid::new_v4().to_string());
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if (200..300).contains(&status) {
                        return Ok(response);
                    }
                    let body = response.text().await.unwrap_or_default();
                    if Self::should_retry(status) && attempt < MAX_RETRIES {
                        let delay = BASE_DELAY_MS * 2u64.pow(attempt);
                        warn!("{} {} returned {}, retrying in {}ms", verb.as_str(), url, status, delay);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        continue;
                    }
                    return Err(AzureError::from_status(status, &body));
                }
                Err(e) => {
                    if attempt < MAX_RETRIES {
                        let delay = BASE_DELAY_MS * 2u64.pow(attempt);
                        warn!("{} {} failed ({}), retrying in {}ms", verb.as_str(), url, e, delay);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        continue;
                    }
                    return Err(AzureError::new(AzureErrorKind::Network, e.to_string()));
                }
            }
        }
        unreachable!("retry loop always returns")
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> AzureResult<T> {
        response
            .json()
            .await
            .map_err(|e| AzureError::new(AzureErrorKind::Parse, e.to_string()))
    }

    fn should_retry(status: u16) -> bool {
        matches!(status, 429 | 500 | 502 | 503 | 504)
    }
}

impl Default for ArmClient {
    fn default() -> Self {
        Self::new()
    }
}

// ─── URL builders ────────────────────────────────────────────────────

pub fn arm_url(path: &str) -> String {
    format!("{}{}", ARM_BASE, path)
}

pub fn subscription_url(subscription_id: &str, suffix: &str) -> String {
    format!("{}/subscriptions/{}{}", ARM_BASE, subscription_id, suffix)
}

pub fn resource_group_url(subscription_id: &str, resource_group: &str, suffix: &str) -> String {
    format!(
        "{}/subscriptions/{}/resourceGroups/{}{}",
        ARM_BASE, subscription_id, resource_group, suffix
    )
}

// ─── Tests ──────────────────────────────────────────────────────────

//! Azure AD client-credentials flow and per-tenant token caching.
//!
//! Sandbox subscriptions live in foreign tenants, so one signed-in session
//! can need bearer tokens from several directories at once. Tokens are
//! cached per tenant id and refreshed shortly before expiry.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use log::debug;
use tokio::sync::RwLock;

use crate::types::{AzureCredentials, AzureError, AzureErrorKind, AzureResult, AzureToken, TokenResponse, LOGIN_BASE};

/// Refresh a cached token this many seconds before it actually expires.
const EXPIRY_MARGIN_SECS: i64 = 120;

/// ARM scope for the v2.0 token endpoint.
const ARM_SCOPE: &str = "https://management.azure.com/.default";

pub fn token_url(tenant_id: &str) -> String {
    format!("{}/{}/oauth2/v2.0/token", LOGIN_BASE, tenant_id)
}

/// Acquires a bearer token for the given tenant using client credentials.
pub async fn acquire_token(
    http: &reqwest::Client,
    credentials: &AzureCredentials,
    tenant_id: &str,
) -> AzureResult<AzureToken> {
    if credentials.client_id.is_empty() || credentials.client_secret.is_empty() {
        return Err(AzureError::new(
            AzureErrorKind::Auth,
            "Missing client credentials",
        ));
    }
    if tenant_id.is_empty() {
        return Err(AzureError::new(AzureErrorKind::Auth, "Missing tenant id"));
    }

    let url = token_url(tenant_id);
    debug!("Requesting token from {}", url);

    let params = [
        ("grant_type", "client_credentials"),
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
        ("scope", ARM_SCOPE),
    ];

    let response = http
        .post(&url)
        .form(&params)
        .send()
        .await
        .map_err(|e| AzureError::new(AzureErrorKind::Network, e.to_string()))?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        let body = response.text().await.unwrap_or_default();
        return Err(AzureError::with_status(AzureErrorKind::Auth, body, status));
    }

    let raw: TokenResponse = response
        .json()
        .await
        .map_err(|e| AzureError::new(AzureErrorKind::Parse, e.to_string()))?;

    Ok(token_from_response(raw))
}

pub fn token_from_response(raw: TokenResponse) -> AzureToken {
    let expires_at = raw
        .expires_in
        .map(|secs| Utc::now() + Duration::seconds(secs as i64));
    AzureToken {
        access_token: raw.access_token,
        token_type: raw.token_type,
        expires_at,
    }
}

/// Per-tenant token store shared across concurrent provider calls.
#[derive(Default)]
pub struct TokenCache {
    tokens: RwLock<HashMap<String, AzureToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token for a tenant if it is still comfortably
    /// inside its lifetime.
    pub async fn get(&self, tenant_id: &str) -> Option<AzureToken> {
        let tokens = self.tokens.read().await;
        tokens
            .get(tenant_id)
            .filter(|t| !t.is_expired() && !t.expires_within(EXPIRY_MARGIN_SECS))
            .cloned()
    }

    pub async fn insert(&self, tenant_id: &str, token: AzureToken) {
        let mut tokens = self.tokens.write().await;
        tokens.insert(tenant_id.to_string(), token);
    }

    pub async fn clear(&self) {
        let mut tokens = self.tokens.write().await;
        tokens.clear();
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_url_format() {
        let url = token_url("aaaa-bbbb");
        assert_eq!(
            url,
            "https://login.microsoftonline.com/aaaa-bbbb/oauth2/v2.0/token"
        );
    }

    #[test]
    fn token_from_response_sets_expiry() {
        let raw = TokenResponse {
            access_token: "tok".into(),
            token_type: "Bearer".into(),
            expires_in: Some(3600),
        };
        let token = token_from_response(raw);
        assert_eq!(token.access_token, "tok");
        assert!(!token.is_expired());
        assert!(token.expires_within(3601));
    }

    #[test]
    fn token_from_response_without_expiry() {
        let raw = TokenResponse {
            access_token: "tok".into(),
            token_type: "Bearer".into(),
            expires_in: None,
        };
        let token = token_from_response(raw);
        assert!(!token.is_expired());
        assert!(!token.expires_within(3600));
    }

    #[tokio::test]
    async fn acquire_token_rejects_empty_credentials() {
        let http = reqwest::Client::new();
        let creds = AzureCredentials::default();
        let err = acquire_token(&http, &creds, "tenant").await.unwrap_err();
        assert_eq!(err.kind, AzureErrorKind::Auth);
    }

    #[tokio::test]
    async fn cache_returns_fresh_tokens_only() {
        let cache = TokenCache::new();
        let fresh = AzureToken {
            access_token: "fresh".into(),
            token_type: "Bearer".into(),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        };
        let stale = AzureToken {
            access_token: "stale".into(),
            token_type: "Bearer".into(),
            expires_at: Some(Utc::now() + Duration::seconds(30)),
        };
        cache.insert("t1", fresh).await;
        cache.insert("t2", stale).await;

        assert_eq!(cache.get("t1").await.unwrap().access_token, "fresh");
        // Inside the refresh margin counts as a miss.
        assert!(cache.get("t2").await.is_none());
        assert!(cache.get("t3").await.is_none());

        cache.clear().await;
        assert!(cache.get("t1").await.is_none());
    }
}

//! Ambient Azure credential resolution
//!
//! Credentials are resolved from environment variables in this order:
//!
//! 1. `AZURE_ACCESS_TOKEN` - a pre-acquired bearer token
//!    (e.g. from `az account get-access-token`)
//! 2. `AZURE_TENANT_ID` + `AZURE_CLIENT_ID` + `AZURE_CLIENT_SECRET` - a
//!    service principal, exchanged for tokens with the client credentials grant
//!
//! `AZURE_AUTHORITY_HOST` overrides the Microsoft Entra authority for
//! sovereign clouds.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::config::ConfigError;
use crate::error::{CoreError, Result};

/// OAuth scope for Azure Resource Manager
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Default Microsoft Entra authority
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Tokens are refreshed this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// Something that can hand out bearer tokens for the management API
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A fixed, pre-acquired token
#[derive(Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenCredential")
            .field("token", &"***")
            .finish()
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Service principal credential using the OAuth2 client credentials grant
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    cache: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("authority_host", &self.authority_host)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

impl ClientSecretCredential {
    pub fn new(
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            authority_host: authority_host.into().trim_end_matches('/').to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cache: Mutex::new(None),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host, self.tenant_id
        )
    }

    async fn request_token(&self) -> Result<CachedToken> {
        let body = serde_urlencoded::to_string([
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", MANAGEMENT_SCOPE),
        ])
        .map_err(|e| CoreError::Authentication(e.to_string()))?;

        debug!("Requesting management token for client {}", self.client_id);
        let response = self
            .http
            .post(self.token_url())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let reason = serde_json::from_str::<TokenErrorResponse>(&text)
                .map(|e| match e.error_description {
                    Some(desc) => format!("{}: {}", e.error, desc),
                    None => e.error,
                })
                .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
            return Err(CoreError::Authentication(reason));
        }

        let token: TokenResponse = serde_json::from_str(&text)?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        trace!("Token valid for {:?}", lifetime);
        Ok(CachedToken {
            token: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        })
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref()
            && Instant::now() < cached.refresh_at
        {
            return Ok(cached.token.clone());
        }

        let fresh = self.request_token().await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}

/// Resolve a credential from the process environment
pub fn credential_from_env() -> std::result::Result<Box<dyn TokenCredential>, ConfigError> {
    credential_from_lookup(|key| std::env::var(key).ok())
}

/// Resolve a credential from an arbitrary variable lookup
pub fn credential_from_lookup<F>(
    lookup: F,
) -> std::result::Result<Box<dyn TokenCredential>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = get("AZURE_ACCESS_TOKEN") {
        debug!("Using pre-acquired token from AZURE_ACCESS_TOKEN");
        return Ok(Box::new(StaticTokenCredential::new(token)));
    }

    match (
        get("AZURE_TENANT_ID"),
        get("AZURE_CLIENT_ID"),
        get("AZURE_CLIENT_SECRET"),
    ) {
        (Some(tenant), Some(client), Some(secret)) => {
            let authority =
                get("AZURE_AUTHORITY_HOST").unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());
            debug!("Using service principal {} in tenant {}", client, tenant);
            Ok(Box::new(ClientSecretCredential::new(
                authority, tenant, client, secret,
            )))
        }
        (tenant, client, secret) => {
            let missing: Vec<&str> = [
                ("AZURE_TENANT_ID", tenant.is_none()),
                ("AZURE_CLIENT_ID", client.is_none()),
                ("AZURE_CLIENT_SECRET", secret.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
            Err(ConfigError::NoCredential {
                suggestion: format!(
                    "Set AZURE_ACCESS_TOKEN, or set {} for a service principal",
                    missing.join(", ")
                ),
            })
        }
    }
}

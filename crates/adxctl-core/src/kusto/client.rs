//! Azure Resource Manager client for the `Microsoft.Kusto` provider
//!
//! Implements [`KustoApi`] over HTTPS. Long-running operations follow the ARM
//! asynchronous operation conventions:
//!
//! - `Azure-AsyncOperation` header: poll the status document until `status`
//!   is `Succeeded`, `Failed` or `Canceled`
//! - otherwise `Location` header: poll until the response is no longer `202`
//! - otherwise: poll the resource itself and read `properties.provisioningState`

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use super::api::KustoApi;
use super::models::{Cluster, ClusterSpec, Database, DatabaseSpec, DeleteOutcome};
use crate::credential::TokenCredential;
use crate::error::{CoreError, Result};
use crate::pager::Page;
use crate::progress::{BoxOperation, Operation, PollStatus};

/// API version of the `Microsoft.Kusto` resource provider
pub const API_VERSION: &str = "2023-08-15";

/// User agent string for adxctl HTTP requests
const USER_AGENT: &str = concat!("adxctl/", env!("CARGO_PKG_VERSION"));

const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Client for Kusto cluster and database management
#[derive(Clone)]
pub struct KustoManagementClient {
    http: reqwest::Client,
    endpoint: Url,
    subscription_id: String,
    credential: Arc<dyn TokenCredential>,
}

impl std::fmt::Debug for KustoManagementClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KustoManagementClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct AsyncOperationStatus {
    status: String,
    #[serde(default)]
    error: Option<ErrorBody>,
}

impl KustoManagementClient {
    pub fn new(
        endpoint: Url,
        subscription_id: impl Into<String>,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            subscription_id: subscription_id.into(),
            credential,
        })
    }

    /// URL of `tail` under the Kusto provider of a resource group
    fn provider_url(&self, resource_group: &str, tail: &str) -> Result<Url> {
        let mut url = self
            .endpoint
            .join(&format!(
                "subscriptions/{}/resourceGroups/{}/providers/Microsoft.Kusto/{}",
                self.subscription_id, resource_group, tail
            ))
            .map_err(|e| CoreError::InvalidResponse(format!("bad resource path: {}", e)))?;
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    fn cluster_collection_url(&self, resource_group: &str) -> Result<Url> {
        self.provider_url(resource_group, "clusters")
    }

    fn cluster_url(&self, resource_group: &str, cluster: &str) -> Result<Url> {
        self.provider_url(resource_group, &format!("clusters/{}", cluster))
    }

    fn database_collection_url(&self, resource_group: &str, cluster: &str) -> Result<Url> {
        self.provider_url(resource_group, &format!("clusters/{}/databases", cluster))
    }

    fn database_url(&self, resource_group: &str, cluster: &str, database: &str) -> Result<Url> {
        self.provider_url(
            resource_group,
            &format!("clusters/{}/databases/{}", cluster, database),
        )
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<reqwest::Response> {
        let token = self.credential.token().await?;
        trace!("{} {}", method, url);
        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        Ok(request.send().await?)
    }

    /// Send a request and turn any non-success status into [`CoreError::Api`]
    async fn send_checked(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<reqwest::Response> {
        let response = self.send(method, url, body).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(api_error(response).await)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.send_checked(Method::GET, url, None).await?;
        Ok(response.json::<T>().await?)
    }

    async fn list_page<T: DeserializeOwned>(
        &self,
        collection: Url,
        next_link: Option<String>,
    ) -> Result<Page<T>> {
        let url = match next_link {
            Some(link) => Url::parse(&link)
                .map_err(|e| CoreError::InvalidResponse(format!("bad nextLink: {}", e)))?,
            None => collection,
        };
        self.get_json(url).await
    }

    async fn begin_put<T>(
        &self,
        url: Url,
        body: Value,
        description: String,
    ) -> Result<BoxOperation<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let response = self
            .send_checked(Method::PUT, url.clone(), Some(body))
            .await?;
        let strategy = PollingStrategy::for_create(response.headers())?;
        debug!("Accepted '{}' ({:?})", description, strategy);
        Ok(Box::new(CreateOperation::<T> {
            poller: Poller {
                client: self.clone(),
                resource_url: url,
                strategy,
            },
            description,
            _resource: PhantomData,
        }))
    }

    async fn begin_delete(
        &self,
        url: Url,
        description: String,
    ) -> Result<BoxOperation<DeleteOutcome>> {
        let response = self
            .send_checked(Method::DELETE, url.clone(), None)
            .await?;
        let strategy = PollingStrategy::for_delete(response.status(), response.headers())?;
        debug!("Accepted '{}' ({:?})", description, strategy);
        Ok(Box::new(DeleteOperation {
            poller: Poller {
                client: self.clone(),
                resource_url: url,
                strategy,
            },
            description,
        }))
    }
}

async fn api_error(response: reqwest::Response) -> CoreError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(envelope) => CoreError::Api {
            status: status.as_u16(),
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => CoreError::Api {
            status: status.as_u16(),
            code: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .replace(' ', ""),
            message: text,
        },
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn header_url(
    headers: &HeaderMap,
    name: impl reqwest::header::AsHeaderName,
) -> Result<Option<Url>> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|e| CoreError::InvalidResponse(format!("bad polling header: {}", e)))?;
            Url::parse(raw)
                .map(Some)
                .map_err(|e| CoreError::InvalidResponse(format!("bad polling URL '{}': {}", raw, e)))
        }
    }
}

/// How completion of an accepted request is observed
#[derive(Debug, Clone)]
enum PollingStrategy {
    AsyncOperation(Url),
    Location(Url),
    Resource,
    Done(u16),
}

impl PollingStrategy {
    fn from_headers(headers: &HeaderMap) -> Result<Option<Self>> {
        if let Some(url) = header_url(headers, AZURE_ASYNC_OPERATION)? {
            return Ok(Some(Self::AsyncOperation(url)));
        }
        if let Some(url) = header_url(headers, LOCATION)? {
            return Ok(Some(Self::Location(url)));
        }
        Ok(None)
    }

    fn for_create(headers: &HeaderMap) -> Result<Self> {
        Ok(Self::from_headers(headers)?.unwrap_or(Self::Resource))
    }

    fn for_delete(status: StatusCode, headers: &HeaderMap) -> Result<Self> {
        match Self::from_headers(headers)? {
            Some(strategy) => Ok(strategy),
            None if status == StatusCode::ACCEPTED => Ok(Self::Resource),
            None => Ok(Self::Done(status.as_u16())),
        }
    }
}

/// Terminal classification of an ARM status string; matching ignores case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArmState {
    Succeeded,
    Failed,
    InProgress,
}

impl ArmState {
    fn parse(status: &str) -> Self {
        let status = status.trim();
        if status.eq_ignore_ascii_case("succeeded") {
            Self::Succeeded
        } else if status.eq_ignore_ascii_case("failed") || status.eq_ignore_ascii_case("canceled")
        {
            Self::Failed
        } else {
            Self::InProgress
        }
    }
}

/// Result of one step of the shared polling logic
enum RawStatus {
    Pending {
        status: String,
        retry_after: Option<Duration>,
    },
    Succeeded {
        status_code: u16,
    },
    Failed(String),
}

/// Polling state shared by create and delete operations
struct Poller {
    client: KustoManagementClient,
    resource_url: Url,
    strategy: PollingStrategy,
}

impl Poller {
    async fn step(&mut self, deleting: bool) -> Result<RawStatus> {
        match &self.strategy {
            PollingStrategy::Done(code) => Ok(RawStatus::Succeeded { status_code: *code }),
            PollingStrategy::AsyncOperation(url) => {
                let response = self
                    .client
                    .send_checked(Method::GET, url.clone(), None)
                    .await?;
                let code = response.status().as_u16();
                let delay = retry_after(response.headers());
                let doc: AsyncOperationStatus = response.json().await?;
                Ok(match ArmState::parse(&doc.status) {
                    ArmState::Succeeded => RawStatus::Succeeded { status_code: code },
                    ArmState::Failed => RawStatus::Failed(match doc.error {
                        Some(err) if !err.message.is_empty() => {
                            format!("{} ({}): {}", doc.status, err.code, err.message)
                        }
                        _ => format!("operation ended in state {}", doc.status),
                    }),
                    ArmState::InProgress => RawStatus::Pending {
                        status: doc.status,
                        retry_after: delay,
                    },
                })
            }
            PollingStrategy::Location(url) => {
                let response = self
                    .client
                    .send_checked(Method::GET, url.clone(), None)
                    .await?;
                let status = response.status();
                if status == StatusCode::ACCEPTED {
                    Ok(RawStatus::Pending {
                        status: "InProgress".to_string(),
                        retry_after: retry_after(response.headers()),
                    })
                } else {
                    Ok(RawStatus::Succeeded {
                        status_code: status.as_u16(),
                    })
                }
            }
            PollingStrategy::Resource => {
                let response = self
                    .client
                    .send(Method::GET, self.resource_url.clone(), None)
                    .await?;
                let status = response.status();
                if deleting && status == StatusCode::NOT_FOUND {
                    return Ok(RawStatus::Succeeded { status_code: 200 });
                }
                if !status.is_success() {
                    return Err(api_error(response).await);
                }
                let delay = retry_after(response.headers());
                let body: Value = response.json().await?;
                let state = body
                    .pointer("/properties/provisioningState")
                    .and_then(Value::as_str)
                    .unwrap_or("Succeeded")
                    .to_string();
                Ok(match ArmState::parse(&state) {
                    ArmState::Succeeded if !deleting => RawStatus::Succeeded {
                        status_code: status.as_u16(),
                    },
                    ArmState::Failed => {
                        RawStatus::Failed(format!("provisioning state is {}", state))
                    }
                    _ => RawStatus::Pending {
                        status: state,
                        retry_after: delay,
                    },
                })
            }
        }
    }
}

/// Create-or-update operation; resolves to the finished resource
struct CreateOperation<T> {
    poller: Poller,
    description: String,
    _resource: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T> Operation for CreateOperation<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = T;

    fn description(&self) -> &str {
        &self.description
    }

    async fn poll(&mut self) -> Result<PollStatus<T>> {
        match self.poller.step(false).await? {
            RawStatus::Pending {
                status,
                retry_after,
            } => Ok(PollStatus::Pending {
                status,
                retry_after,
            }),
            RawStatus::Failed(message) => Ok(PollStatus::Failed(message)),
            RawStatus::Succeeded { .. } => {
                let resource = self
                    .poller
                    .client
                    .get_json::<T>(self.poller.resource_url.clone())
                    .await?;
                Ok(PollStatus::Succeeded(resource))
            }
        }
    }
}

/// Delete operation; resolves to the final HTTP status
struct DeleteOperation {
    poller: Poller,
    description: String,
}

#[async_trait]
impl Operation for DeleteOperation {
    type Output = DeleteOutcome;

    fn description(&self) -> &str {
        &self.description
    }

    async fn poll(&mut self) -> Result<PollStatus<DeleteOutcome>> {
        Ok(match self.poller.step(true).await? {
            RawStatus::Pending {
                status,
                retry_after,
            } => PollStatus::Pending {
                status,
                retry_after,
            },
            RawStatus::Failed(message) => PollStatus::Failed(message),
            RawStatus::Succeeded { status_code } => {
                PollStatus::Succeeded(DeleteOutcome { status_code })
            }
        })
    }
}

#[async_trait]
impl KustoApi for KustoManagementClient {
    async fn begin_create_cluster(
        &self,
        resource_group: &str,
        cluster: &str,
        spec: &ClusterSpec,
    ) -> Result<BoxOperation<Cluster>> {
        let url = self.cluster_url(resource_group, cluster)?;
        let body = serde_json::to_value(spec)?;
        self.begin_put(url, body, format!("create cluster {}", cluster))
            .await
    }

    async fn list_clusters_page(
        &self,
        resource_group: &str,
        next_link: Option<String>,
    ) -> Result<Page<Cluster>> {
        let url = self.cluster_collection_url(resource_group)?;
        self.list_page(url, next_link).await
    }

    async fn begin_delete_cluster(
        &self,
        resource_group: &str,
        cluster: &str,
    ) -> Result<BoxOperation<DeleteOutcome>> {
        let url = self.cluster_url(resource_group, cluster)?;
        self.begin_delete(url, format!("delete cluster {}", cluster))
            .await
    }

    async fn begin_create_database(
        &self,
        resource_group: &str,
        cluster: &str,
        database: &str,
        spec: &DatabaseSpec,
    ) -> Result<BoxOperation<Database>> {
        let url = self.database_url(resource_group, cluster, database)?;
        let body = serde_json::to_value(spec)?;
        self.begin_put(url, body, format!("create database {}", database))
            .await
    }

    async fn list_databases_page(
        &self,
        resource_group: &str,
        cluster: &str,
        next_link: Option<String>,
    ) -> Result<Page<Database>> {
        let url = self.database_collection_url(resource_group, cluster)?;
        self.list_page(url, next_link).await
    }

    async fn begin_delete_database(
        &self,
        resource_group: &str,
        cluster: &str,
        database: &str,
    ) -> Result<BoxOperation<DeleteOutcome>> {
        let url = self.database_url(resource_group, cluster, database)?;
        self.begin_delete(url, format!("delete database {}", database))
            .await
    }
}

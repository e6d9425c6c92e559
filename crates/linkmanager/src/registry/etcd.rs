//! etcd v2 keys API client.
//!
//! ```text
//! PUT    /v2/keys/{key}        value=..&ttl=..
//! GET    /v2/keys/{prefix}     directory listing
//! GET    /v2/keys/{prefix}?wait=true&recursive=true
//! DELETE /v2/keys/{key}
//! ```

use async_trait::async_trait;
use linkmanager_common::constants::ETCD_KEY_NOT_FOUND;
use linkmanager_common::{LinkError, RegistryEntry};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::Registry;

/// Response envelope for successful key operations
#[derive(Debug, Deserialize)]
struct EtcdResponse {
    node: Option<EtcdNode>,
}

#[derive(Debug, Deserialize)]
struct EtcdNode {
    key: Option<String>,
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    nodes: Vec<EtcdNode>,
}

/// Error body, e.g. `{"errorCode":100,"message":"Key not found","cause":"/links"}`
#[derive(Debug, Deserialize)]
struct EtcdErrorBody {
    #[serde(rename = "errorCode")]
    error_code: u64,
    message: String,
}

/// etcd client over HTTP
#[derive(Clone)]
pub struct EtcdClient {
    http: reqwest::Client,
    endpoint: String,
}

impl EtcdClient {
    pub fn new(endpoint: &str) -> Result<Self, LinkError> {
        Url::parse(endpoint)
            .map_err(|e| LinkError::Config(format!("invalid etcd endpoint {endpoint:?}: {e}")))?;

        // No request timeout: watches are long polls
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| LinkError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn key_url(&self, key: &str) -> String {
        format!("{}/v2/keys/{}", self.endpoint, key.trim_matches('/'))
    }

    /// Send a request, returning the body on success and `None` for key-not-found
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Option<String>, LinkError> {
        let response = request.send().await.map_err(unavailable)?;
        let status = response.status();
        let body = response.text().await.map_err(unavailable)?;

        if status.is_success() {
            return Ok(Some(body));
        }

        if status == StatusCode::NOT_FOUND && is_key_not_found(&body) {
            return Ok(None);
        }

        let detail = serde_json::from_str::<EtcdErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(LinkError::RegistryUnavailable(format!(
            "etcd returned {status}: {detail}"
        )))
    }
}

#[async_trait]
impl Registry for EtcdClient {
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), LinkError> {
        let mut form = vec![("value", value.to_string())];
        if let Some(ttl) = ttl_secs {
            form.push(("ttl", ttl.to_string()));
        }

        self.execute(self.http.put(self.key_url(key)).form(&form)).await?;

        tracing::trace!(key = %key, ttl = ?ttl_secs, "etcd set");
        Ok(())
    }

    async fn get_all(&self, prefix: &str) -> Result<Vec<RegistryEntry>, LinkError> {
        match self.execute(self.http.get(self.key_url(prefix))).await? {
            Some(body) => decode_listing(&body),
            None => {
                tracing::debug!(prefix = %prefix, "Prefix not present in etcd");
                Ok(Vec::new())
            }
        }
    }

    async fn wait_for_change(&self, prefix: &str) -> Result<(), LinkError> {
        let request = self
            .http
            .get(self.key_url(prefix))
            .query(&[("wait", "true"), ("recursive", "true")]);

        self.execute(request).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), LinkError> {
        if self
            .execute(self.http.delete(self.key_url(key)))
            .await?
            .is_none()
        {
            tracing::debug!(key = %key, "Key already absent");
        }
        Ok(())
    }
}

fn unavailable(error: reqwest::Error) -> LinkError {
    LinkError::RegistryUnavailable(error.to_string())
}

fn is_key_not_found(body: &str) -> bool {
    serde_json::from_str::<EtcdErrorBody>(body)
        .map(|e| e.error_code == ETCD_KEY_NOT_FOUND)
        .unwrap_or(false)
}

/// Extract the value-bearing children of a directory listing
fn decode_listing(body: &str) -> Result<Vec<RegistryEntry>, LinkError> {
    let response: EtcdResponse = serde_json::from_str(body).map_err(|e| {
        LinkError::RegistryUnavailable(format!("undecodable etcd response: {e}"))
    })?;

    let Some(node) = response.node else {
        return Ok(Vec::new());
    };

    Ok(node
        .nodes
        .into_iter()
        .filter(|child| !child.dir)
        .filter_map(|child| match (child.key, child.value) {
            (Some(key), Some(value)) => Some(RegistryEntry { key, value }),
            _ => None,
        })
        .collect())
}

//! Remote Entry Store.
//!
//! Talks to another cache node's `/store` routes over JSON/HTTP. Every call
//! carries the configured timeout; any transport failure, timeout or
//! unexpected status becomes [`CacheError::BackendUnavailable`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheStats, Category, EntryMeta, EntryStore};
use crate::error::{CacheError, Result};
use crate::models::{
    CountResponse, DeleteMatchingRequest, DeleteResponse, GetResponse, KeysResponse,
    SetResponse, StatsResponse, StoreSetRequest,
};
use crate::registry::Pattern;

#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: Client,
    base: Url,
}

impl RemoteStore {
    /// Creates a client for the node at `base_url` (e.g. `http://cache-1:3000`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|err| CacheError::InvalidRequest(format!("invalid store url '{base_url}': {err}")))?;
        if base.cannot_be_a_base() {
            return Err(CacheError::InvalidRequest(format!(
                "store url '{base_url}' cannot be a base"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CacheError::BackendUnavailable(err.to_string()))?;
        Ok(Self { client, base })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CacheError::InvalidRequest("store url cannot be a base".to_string()))?
            .pop_if_empty()
            .push("store")
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self.client.request(method, self.url(segments)?))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(unavailable)
    }

    /// Decodes a 2xx body; 404 becomes `None`; anything else is an outage.
    async fn decode_optional<T: DeserializeOwned>(&self, response: Response) -> Result<Option<T>> {
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response.json().await.map(Some).map_err(unavailable),
            status => Err(CacheError::BackendUnavailable(format!(
                "remote store answered {status}"
            ))),
        }
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::BackendUnavailable(format!(
                "remote store answered {status}"
            )));
        }
        response.json().await.map_err(unavailable)
    }

    async fn read_entry(&self, key: &str, peek: bool) -> Result<Option<Value>> {
        let mut request = self.request(Method::GET, &["entries", key])?;
        if peek {
            request = request.query(&[("peek", "true")]);
        }
        let response = self.send(request).await?;
        let body: Option<GetResponse> = self.decode_optional(response).await?;
        Ok(body.map(|body| body.value))
    }
}

fn unavailable(err: reqwest::Error) -> CacheError {
    debug!(error = %err, "Remote store call failed");
    if err.is_timeout() {
        CacheError::BackendUnavailable(format!("remote store timed out: {err}"))
    } else {
        CacheError::BackendUnavailable(err.to_string())
    }
}

#[async_trait]
impl EntryStore for RemoteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.read_entry(key, false).await
    }

    async fn peek(&self, key: &str) -> Result<Option<Value>> {
        self.read_entry(key, true).await
    }

    async fn metadata(&self, key: &str) -> Result<Option<EntryMeta>> {
        let response = self.send(self.request(Method::GET, &["meta", key])?).await?;
        self.decode_optional(response).await
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration, category: Category) -> Result<()> {
        let body = StoreSetRequest {
            value,
            ttl_ms: ttl.as_millis() as u64,
            category,
        };
        let response = self
            .send(self.request(Method::PUT, &["entries", key])?.json(&body))
            .await?;
        let _: SetResponse = self.decode(response).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let response = self.send(self.request(Method::DELETE, &["entries", key])?).await?;
        let body: DeleteResponse = self.decode(response).await?;
        Ok(body.deleted)
    }

    async fn delete_matching(&self, pattern: &Pattern) -> Result<Vec<String>> {
        let body = DeleteMatchingRequest {
            pattern: pattern.source().to_string(),
        };
        let response = self
            .send(self.request(Method::POST, &["delete-matching"])?.json(&body))
            .await?;
        let body: KeysResponse = self.decode(response).await?;
        Ok(body.keys)
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let response = self.send(self.request(Method::GET, &["keys"])?).await?;
        let body: KeysResponse = self.decode(response).await?;
        Ok(body.keys)
    }

    async fn clear(&self) -> Result<usize> {
        let response = self.send(self.request(Method::DELETE, &["entries"])?).await?;
        let body: CountResponse = self.decode(response).await?;
        Ok(body.count)
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.stats().await?.entries)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let response = self.send(self.request(Method::GET, &["stats"])?).await?;
        let body: StatsResponse = self.decode(response).await?;
        Ok(body.stats)
    }

    fn backend_name(&self) -> &'static str {
        "remote"
    }
}

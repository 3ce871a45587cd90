//! Shared HTTP plumbing for collectors.
//!
//! One [`HttpClient`] (and its connection pool) is shared by every collector.
//! Transport failures, non-2xx statuses, and undecodable bodies map onto
//! [`CollectorError`] variants.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use naka_core::error::CollectorError;

const USER_AGENT: &str = concat!("naka/", env!("CARGO_PKG_VERSION"));

/// Thin wrapper over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Build a client whose every request is capped at `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CollectorError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: HeaderMap,
    ) -> Result<T, CollectorError> {
        let request = self.client.get(url).query(query).headers(headers);
        send_json(request, url).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        headers: HeaderMap,
    ) -> Result<T, CollectorError> {
        let request = self.client.post(url).json(body).headers(headers);
        send_json(request, url).await
    }

    /// JSON-RPC 2.0 call returning the decoded `result` member.
    pub async fn json_rpc<T: DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: Value,
    ) -> Result<T, CollectorError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let resp: Value = self.post_json(url, &body, HeaderMap::new()).await?;

        if let Some(err) = resp.get("error") {
            if !err.is_null() {
                return Err(CollectorError::Malformed(format!("rpc error: {err}")));
            }
        }
        let result = resp
            .get("result")
            .cloned()
            .ok_or_else(|| CollectorError::Malformed(format!("{method}: missing result")))?;
        serde_json::from_value(result).map_err(|e| CollectorError::Malformed(e.to_string()))
    }
}

async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    url: &str,
) -> Result<T, CollectorError> {
    let resp = request.send().await.map_err(map_transport)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(CollectorError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    let bytes = resp.bytes().await.map_err(map_transport)?;
    serde_json::from_slice(&bytes).map_err(|e| CollectorError::Malformed(e.to_string()))
}

fn map_transport(err: reqwest::Error) -> CollectorError {
    if err.is_timeout() {
        CollectorError::Timeout
    } else {
        CollectorError::Http(err.to_string())
    }
}

/// Single-header map, reading the value from `env_var` when it is set.
///
/// A missing or empty variable yields an empty map: some upstreams serve
/// unauthenticated requests at a lower rate limit.
pub fn header_from_env(
    name: &'static str,
    env_var: &str,
    prefix: &str,
) -> Result<HeaderMap, CollectorError> {
    let mut headers = HeaderMap::new();
    let Ok(secret) = std::env::var(env_var) else {
        return Ok(headers);
    };
    if secret.is_empty() {
        return Ok(headers);
    }
    let value = HeaderValue::from_str(&format!("{prefix}{secret}"))
        .map_err(|e| CollectorError::Config(format!("{env_var}: {e}")))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(headers)
}

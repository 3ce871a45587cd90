//! Endpoints that already publish a concentration coefficient.
//!
//! The value at `pointer` must be a positive integer, or a string
//! holding one. The engine is bypassed for these networks.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderMap;
use serde_json::Value;

use naka_core::error::CollectorError;
use naka_core::traits::{Collected, Collector};
use naka_core::{CoefficientResult, Token};

use crate::http::HttpClient;

pub struct PrecomputedCollector {
    client: HttpClient,
    url: String,
    pointer: String,
}

impl PrecomputedCollector {
    pub fn new(client: HttpClient, url: &str, pointer: &str) -> Result<Self, CollectorError> {
        if !pointer.is_empty() && !pointer.starts_with('/') {
            return Err(CollectorError::Config(format!(
                "json pointer must be empty or start with '/': {pointer:?}"
            )));
        }
        Ok(Self {
            client,
            url: url.to_string(),
            pointer: pointer.to_string(),
        })
    }
}

pub(crate) fn extract(body: &Value, pointer: &str) -> Result<u32, CollectorError> {
    let node = body
        .pointer(pointer)
        .ok_or_else(|| CollectorError::Malformed(format!("nothing at {pointer:?}")))?;
    let raw = match node {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    raw.and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v >= 1)
        .ok_or_else(|| CollectorError::Malformed(format!("{pointer:?} is not a coefficient: {node}")))
}

#[async_trait]
impl Collector for PrecomputedCollector {
    async fn fetch(&self, token: &Token) -> Result<Collected, CollectorError> {
        let body: Value = self.client.get_json(&self.url, &[], HeaderMap::new()).await?;
        let coefficient = extract(&body, &self.pointer)?;
        Ok(Collected::Precomputed(CoefficientResult::precomputed(
            token.clone(),
            coefficient,
            Utc::now(),
        )))
    }
}

//! Substrate validator sets via Subscan's staking API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use naka_core::error::CollectorError;
use naka_core::traits::{Collected, Collector};
use naka_core::{StakeDistribution, Token, Weight, WeightMode};

use crate::http::{header_from_env, HttpClient};

#[derive(Debug, Deserialize)]
pub(crate) struct SubscanResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<SubscanData>,
}

#[derive(Debug, Deserialize)]
struct SubscanData {
    #[serde(default)]
    list: Vec<SubscanValidator>,
}

#[derive(Debug, Deserialize)]
struct SubscanValidator {
    #[serde(default)]
    validator_stash: String,
    bonded_total: String,
}

pub struct SubscanCollector {
    client: HttpClient,
    api_url: String,
    api_key_env: String,
}

impl SubscanCollector {
    pub fn new(client: HttpClient, api_url: &str, api_key_env: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key_env: api_key_env.to_string(),
        }
    }
}

pub(crate) fn normalize(token: &Token, resp: SubscanResponse) -> Result<StakeDistribution, CollectorError> {
    if resp.code != 0 {
        return Err(CollectorError::Malformed(format!(
            "subscan code {}: {}",
            resp.code, resp.message
        )));
    }
    let data = resp
        .data
        .ok_or_else(|| CollectorError::Malformed("subscan: missing data".into()))?;

    let mut dist = StakeDistribution::new(token.clone(), WeightMode::Absolute);
    for (i, v) in data.list.into_iter().enumerate() {
        let id = if v.validator_stash.is_empty() {
            format!("#{i}")
        } else {
            v.validator_stash
        };
        dist.push(id, Weight::parse(WeightMode::Absolute, &v.bonded_total)?);
    }
    Ok(dist)
}

#[async_trait]
impl Collector for SubscanCollector {
    async fn fetch(&self, token: &Token) -> Result<Collected, CollectorError> {
        let url = format!("{}/api/scan/staking/validators", self.api_url);
        let body = json!({
            "order": "desc",
            "order_field": "bonded_total",
            "row": 0,
            "page": 0,
        });
        let headers = header_from_env("x-api-key", &self.api_key_env, "")?;
        let resp: SubscanResponse = self.client.post_json(&url, &body, headers).await?;
        normalize(token, resp).map(Collected::Distribution)
    }
}

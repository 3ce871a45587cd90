//! Ethereum staking operators from the Rated API.
//!
//! Each operator reports `networkPenetration`, its share of all validators,
//! so weights are PROPORTIONAL against an asserted total of 1. The listing
//! only covers the largest operators; the network's tolerance must allow
//! for the long tail.

use async_trait::async_trait;
use serde::Deserialize;

use naka_core::error::CollectorError;
use naka_core::traits::{Collected, Collector};
use naka_core::{StakeDistribution, Token, Weight, WeightMode};

use crate::http::{header_from_env, HttpClient};

const PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
pub(crate) struct OperatorsResponse {
    #[serde(default)]
    data: Vec<Operator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Operator {
    id: String,
    network_penetration: f64,
}

pub struct RatedCollector {
    client: HttpClient,
    api_url: String,
    api_key_env: String,
}

impl RatedCollector {
    pub fn new(client: HttpClient, api_url: &str, api_key_env: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key_env: api_key_env.to_string(),
        }
    }
}

pub(crate) fn normalize(token: &Token, resp: OperatorsResponse) -> Result<StakeDistribution, CollectorError> {
    let mut dist = StakeDistribution::new(token.clone(), WeightMode::Proportional);
    for op in resp.data {
        dist.push(op.id, Weight::from_f64(WeightMode::Proportional, op.network_penetration)?);
    }
    Ok(dist.with_total(Weight::from_u64(WeightMode::Proportional, 1)))
}

#[async_trait]
impl Collector for RatedCollector {
    async fn fetch(&self, token: &Token) -> Result<Collected, CollectorError> {
        let url = format!("{}/v0/eth/operators", self.api_url);
        let query = [
            ("window", "all".to_string()),
            ("idType", "entity".to_string()),
            ("size", PAGE_SIZE.to_string()),
        ];
        let headers = header_from_env("authorization", &self.api_key_env, "Bearer ")?;
        let resp: OperatorsResponse = self.client.get_json(&url, &query, headers).await?;
        normalize(token, resp).map(Collected::Distribution)
    }
}

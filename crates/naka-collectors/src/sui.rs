//! Sui active validators via `suix_getLatestSuiSystemState`.
//!
//! `votingPower` is in basis points of a fixed 10 000 total, so the network
//! is PROPORTIONAL with that total asserted.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use naka_core::error::CollectorError;
use naka_core::traits::{Collected, Collector};
use naka_core::{StakeDistribution, Token, Weight, WeightMode};

use crate::http::HttpClient;

/// Sum of all validators' voting power on Sui.
pub const TOTAL_VOTING_POWER: u64 = 10_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SystemState {
    active_validators: Vec<SuiValidator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuiValidator {
    sui_address: String,
    voting_power: String,
}

pub struct SuiCollector {
    client: HttpClient,
    rpc_url: String,
}

impl SuiCollector {
    pub fn new(client: HttpClient, rpc_url: &str) -> Self {
        Self {
            client,
            rpc_url: rpc_url.to_string(),
        }
    }
}

pub(crate) fn normalize(token: &Token, state: SystemState) -> Result<StakeDistribution, CollectorError> {
    let mut dist = StakeDistribution::new(token.clone(), WeightMode::Proportional);
    for v in state.active_validators {
        dist.push(v.sui_address, Weight::parse(WeightMode::Proportional, &v.voting_power)?);
    }
    Ok(dist.with_total(Weight::from_u64(WeightMode::Proportional, TOTAL_VOTING_POWER)))
}

#[async_trait]
impl Collector for SuiCollector {
    async fn fetch(&self, token: &Token) -> Result<Collected, CollectorError> {
        let state: SystemState = self
            .client
            .json_rpc(&self.rpc_url, "suix_getLatestSuiSystemState", json!([]))
            .await?;
        normalize(token, state).map(Collected::Distribution)
    }
}

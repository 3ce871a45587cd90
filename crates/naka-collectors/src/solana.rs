//! Solana validator stakes from validators.app.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use naka_core::error::CollectorError;
use naka_core::traits::{Collected, Collector};
use naka_core::{StakeDistribution, Token, Weight, WeightMode};

use crate::http::{header_from_env, HttpClient};

#[derive(Debug, Deserialize)]
pub(crate) struct SolanaValidator {
    #[serde(default)]
    account: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    active_stake: Option<u64>,
    #[serde(default)]
    delinquent: bool,
}

pub struct SolanaCollector {
    client: HttpClient,
    api_url: String,
    api_key_env: String,
}

impl SolanaCollector {
    pub fn new(client: HttpClient, api_url: &str, api_key_env: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key_env: api_key_env.to_string(),
        }
    }
}

/// Delinquent validators and those without a reported stake are dropped.
pub(crate) fn normalize(token: &Token, validators: Vec<SolanaValidator>) -> StakeDistribution {
    let mut dist = StakeDistribution::new(token.clone(), WeightMode::Absolute);
    let mut skipped = 0usize;
    for (i, v) in validators.into_iter().enumerate() {
        let Some(stake) = v.active_stake.filter(|_| !v.delinquent) else {
            skipped += 1;
            continue;
        };
        let id = v.account.or(v.name).unwrap_or_else(|| format!("#{i}"));
        dist.push(id, Weight::from_u64(WeightMode::Absolute, stake));
    }
    debug!(%token, kept = dist.len(), skipped, "solana validators");
    dist
}

#[async_trait]
impl Collector for SolanaCollector {
    async fn fetch(&self, token: &Token) -> Result<Collected, CollectorError> {
        let url = format!("{}/api/v1/validators/mainnet.json", self.api_url);
        let headers = header_from_env("token", &self.api_key_env, "")?;
        let validators: Vec<SolanaValidator> = self.client.get_json(&url, &[], headers).await?;
        Ok(Collected::Distribution(normalize(token, validators)))
    }
}

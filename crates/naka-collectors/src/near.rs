//! NEAR current validators via JSON-RPC. Stakes are yoctoNEAR strings and
//! routinely exceed 64 bits.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use naka_core::error::CollectorError;
use naka_core::traits::{Collected, Collector};
use naka_core::{StakeDistribution, Token, Weight, WeightMode};

use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
pub(crate) struct EpochValidators {
    current_validators: Vec<NearValidator>,
}

#[derive(Debug, Deserialize)]
struct NearValidator {
    account_id: String,
    stake: String,
}

pub struct NearCollector {
    client: HttpClient,
    rpc_url: String,
}

impl NearCollector {
    pub fn new(client: HttpClient, rpc_url: &str) -> Self {
        Self {
            client,
            rpc_url: rpc_url.to_string(),
        }
    }
}

pub(crate) fn normalize(token: &Token, epoch: EpochValidators) -> Result<StakeDistribution, CollectorError> {
    let mut dist = StakeDistribution::new(token.clone(), WeightMode::Absolute);
    for v in epoch.current_validators {
        dist.push(v.account_id, Weight::parse(WeightMode::Absolute, &v.stake)?);
    }
    Ok(dist)
}

#[async_trait]
impl Collector for NearCollector {
    async fn fetch(&self, token: &Token) -> Result<Collected, CollectorError> {
        let epoch: EpochValidators = self
            .client
            .json_rpc(&self.rpc_url, "validators", json!([null]))
            .await?;
        normalize(token, epoch).map(Collected::Distribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yocto_stakes() {
        let epoch: EpochValidators = serde_json::from_str(
            r#"{"current_validators": [
                {"account_id": "figment.poolv1.near", "stake": "32841796427427648484814718526080", "is_slashed": false},
                {"account_id": "small.poolv1.near", "stake": "1"}
            ], "next_validators": []}"#,
        )
        .unwrap();
        let dist = normalize(&Token::new("NEAR"), epoch).unwrap();
        assert_eq!(dist.len(), 2);
        assert_eq!(
            dist.entries[0].weight.to_string(),
            "32841796427427648484814718526080"
        );
    }
}

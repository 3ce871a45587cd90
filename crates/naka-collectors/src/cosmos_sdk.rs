//! Cosmos SDK staking REST (`/cosmos/staking/v1beta1`).
//!
//! Validators are paged with `pagination.key` until `next_key` comes back
//! empty. Only bonded, non-jailed validators count. When enabled, the staking
//! pool's `bonded_tokens` is asserted as the total.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::{debug, warn};

use naka_core::error::CollectorError;
use naka_core::traits::{Collected, Collector};
use naka_core::{StakeDistribution, Token, Weight, WeightMode};

use crate::http::HttpClient;

const BONDED: &str = "BOND_STATUS_BONDED";
/// Hard stop against an upstream that never terminates pagination.
const MAX_PAGES: usize = 64;

#[derive(Debug, Deserialize)]
pub(crate) struct ValidatorsPage {
    #[serde(default)]
    validators: Vec<Validator>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Validator {
    operator_address: String,
    #[serde(default)]
    jailed: bool,
    status: String,
    tokens: String,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    next_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PoolResponse {
    pool: Pool,
}

#[derive(Debug, Deserialize)]
struct Pool {
    bonded_tokens: String,
}

pub struct CosmosSdkCollector {
    client: HttpClient,
    api_url: String,
    page_limit: u32,
    use_pool_total: bool,
}

impl CosmosSdkCollector {
    pub fn new(client: HttpClient, api_url: &str, page_limit: u32, use_pool_total: bool) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            page_limit,
            use_pool_total,
        }
    }

    async fn fetch_page(&self, key: Option<&str>) -> Result<ValidatorsPage, CollectorError> {
        let url = format!("{}/cosmos/staking/v1beta1/validators", self.api_url);
        let mut query = vec![
            ("status", BONDED.to_string()),
            ("pagination.limit", self.page_limit.to_string()),
        ];
        if let Some(key) = key {
            query.push(("pagination.key", key.to_string()));
        }
        self.client.get_json(&url, &query, HeaderMap::new()).await
    }

    async fn fetch_pool(&self) -> Result<PoolResponse, CollectorError> {
        let url = format!("{}/cosmos/staking/v1beta1/pool", self.api_url);
        self.client.get_json(&url, &[], HeaderMap::new()).await
    }
}

/// Fold one page of validators into `dist`, returning the next page key.
///
/// A bonded validator with unparseable `tokens` fails the whole page.
pub(crate) fn absorb_page(
    dist: &mut StakeDistribution,
    page: ValidatorsPage,
) -> Result<Option<String>, CollectorError> {
    for v in page.validators {
        if v.jailed || v.status != BONDED {
            continue;
        }
        let weight = Weight::parse(WeightMode::Absolute, &v.tokens).map_err(|e| {
            warn!(token = %dist.token, validator = %v.operator_address, "bad validator tokens: {e}");
            CollectorError::Malformed(format!("validator {}: {e}", v.operator_address))
        })?;
        dist.push(v.operator_address, weight);
    }
    Ok(page
        .pagination
        .and_then(|p| p.next_key)
        .filter(|k| !k.is_empty()))
}

pub(crate) fn pool_total(pool: &PoolResponse) -> Result<Weight, CollectorError> {
    Ok(Weight::parse(WeightMode::Absolute, &pool.pool.bonded_tokens)?)
}

#[async_trait]
impl Collector for CosmosSdkCollector {
    async fn fetch(&self, token: &Token) -> Result<Collected, CollectorError> {
        let mut dist = StakeDistribution::new(token.clone(), WeightMode::Absolute);
        let mut key: Option<String> = None;

        for page_no in 0..MAX_PAGES {
            let page = self.fetch_page(key.as_deref()).await?;
            key = absorb_page(&mut dist, page)?;
            debug!(%token, page = page_no, validators = dist.len(), "cosmos page");
            if key.is_none() {
                break;
            }
        }
        if key.is_some() {
            return Err(CollectorError::Malformed(format!(
                "pagination did not terminate after {MAX_PAGES} pages"
            )));
        }

        if self.use_pool_total {
            let pool = self.fetch_pool().await?;
            dist = dist.with_total(pool_total(&pool)?);
        }
        Ok(Collected::Distribution(dist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_ONE: &str = r#"{
        "validators": [
            {"operator_address": "cosmosvaloper1a", "jailed": false,
             "status": "BOND_STATUS_BONDED", "tokens": "25000000000000"},
            {"operator_address": "cosmosvaloper1b", "jailed": true,
             "status": "BOND_STATUS_BONDED", "tokens": "99000000000000"},
            {"operator_address": "cosmosvaloper1c", "jailed": false,
             "status": "BOND_STATUS_UNBONDING", "tokens": "5"}
        ],
        "pagination": {"next_key": "FPoJ8/8dYQ==", "total": "0"}
    }"#;

    const PAGE_TWO: &str = r#"{
        "validators": [
            {"operator_address": "cosmosvaloper1d", "jailed": false,
             "status": "BOND_STATUS_BONDED", "tokens": "340282366920938463463374607431768211457"}
        ],
        "pagination": {"next_key": null, "total": "0"}
    }"#;

    #[test]
    fn filters_jailed_and_unbonded() {
        let mut dist = StakeDistribution::new(Token::new("ATOM"), WeightMode::Absolute);
        let next = absorb_page(&mut dist, serde_json::from_str(PAGE_ONE).unwrap()).unwrap();
        assert_eq!(next.as_deref(), Some("FPoJ8/8dYQ=="));
        assert_eq!(dist.len(), 1);
        assert_eq!(dist.entries[0].entity_id, "cosmosvaloper1a");
    }

    #[test]
    fn last_page_has_no_key_and_keeps_big_values() {
        let mut dist = StakeDistribution::new(Token::new("ATOM"), WeightMode::Absolute);
        let next = absorb_page(&mut dist, serde_json::from_str(PAGE_TWO).unwrap()).unwrap();
        assert!(next.is_none());
        assert_eq!(
            dist.entries[0].weight.to_string(),
            "340282366920938463463374607431768211457"
        );
    }

    #[test]
    fn empty_next_key_ends_pagination() {
        let page: ValidatorsPage =
            serde_json::from_str(r#"{"validators": [], "pagination": {"next_key": ""}}"#).unwrap();
        let mut dist = StakeDistribution::new(Token::new("OSMO"), WeightMode::Absolute);
        assert!(absorb_page(&mut dist, page).unwrap().is_none());
    }

    #[test]
    fn malformed_bonded_tokens_fail_the_page() {
        let page: ValidatorsPage = serde_json::from_str(
            r#"{"validators": [
                {"operator_address": "a", "status": "BOND_STATUS_BONDED", "tokens": "10"},
                {"operator_address": "whale", "status": "BOND_STATUS_BONDED", "tokens": "9.9e20"},
                {"operator_address": "b", "status": "BOND_STATUS_BONDED", "tokens": "10"}
            ]}"#,
        )
        .unwrap();
        let mut dist = StakeDistribution::new(Token::new("JUNO"), WeightMode::Absolute);
        let err = absorb_page(&mut dist, page).unwrap_err();
        assert!(matches!(&err, CollectorError::Malformed(m) if m.contains("whale")), "{err}");
    }

    #[test]
    fn malformed_tokens_on_jailed_validator_are_ignored() {
        let page: ValidatorsPage = serde_json::from_str(
            r#"{"validators": [
                {"operator_address": "x", "jailed": true, "status": "BOND_STATUS_BONDED", "tokens": "1e9"},
                {"operator_address": "y", "status": "BOND_STATUS_BONDED", "tokens": "7"}
            ]}"#,
        )
        .unwrap();
        let mut dist = StakeDistribution::new(Token::new("JUNO"), WeightMode::Absolute);
        absorb_page(&mut dist, page).unwrap();
        assert_eq!(dist.len(), 1);
        assert_eq!(dist.entries[0].entity_id, "y");
    }

    #[test]
    fn pool_total_parses_bonded_tokens() {
        let pool: PoolResponse = serde_json::from_str(
            r#"{"pool": {"not_bonded_tokens": "1", "bonded_tokens": "272000000000000"}}"#,
        )
        .unwrap();
        assert_eq!(pool_total(&pool).unwrap(), Weight::from_u64(WeightMode::Absolute, 272_000_000_000_000));
    }
}

//! Collector selection as it appears in network configuration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use naka_core::error::CollectorError;
use naka_core::traits::Collector;
use naka_core::WeightMode;

use crate::cosmos_sdk::CosmosSdkCollector;
use crate::fixed::{FixedCollector, FixedEntry};
use crate::http::HttpClient;
use crate::near::NearCollector;
use crate::precomputed::PrecomputedCollector;
use crate::rated::RatedCollector;
use crate::solana::SolanaCollector;
use crate::subscan::SubscanCollector;
use crate::sui::SuiCollector;

fn default_page_limit() -> u32 {
    500
}

fn default_true() -> bool {
    true
}

fn default_solana_key_env() -> String {
    "SOLANA_API_KEY".to_string()
}

fn default_rated_key_env() -> String {
    "RATED_API_KEY".to_string()
}

fn default_subscan_key_env() -> String {
    "SUBSCAN_API_KEY".to_string()
}

/// Which upstream a network is read from, and where.
///
/// Serialized with an inline `kind` tag:
///
/// ```toml
/// [networks.collector]
/// kind = "cosmos_sdk"
/// api_url = "https://cosmos-rest.publicnode.com"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollectorConfig {
    CosmosSdk {
        api_url: String,
        #[serde(default = "default_page_limit")]
        page_limit: u32,
        /// Assert the staking pool's `bonded_tokens` as the total.
        #[serde(default = "default_true")]
        use_pool_total: bool,
    },
    Subscan {
        api_url: String,
        #[serde(default = "default_subscan_key_env")]
        api_key_env: String,
    },
    Solana {
        api_url: String,
        #[serde(default = "default_solana_key_env")]
        api_key_env: String,
    },
    Near {
        rpc_url: String,
    },
    Sui {
        rpc_url: String,
    },
    Rated {
        api_url: String,
        #[serde(default = "default_rated_key_env")]
        api_key_env: String,
    },
    Precomputed {
        url: String,
        /// RFC 6901 pointer to the coefficient inside the response body.
        pointer: String,
    },
    Fixed {
        entries: Vec<FixedEntry>,
        #[serde(default)]
        total: Option<String>,
    },
}

impl CollectorConfig {
    /// Weight mode the upstream reports in, if the collector dictates one.
    ///
    /// `None` means the collector follows whatever mode the network declares.
    pub fn native_mode(&self) -> Option<WeightMode> {
        match self {
            Self::CosmosSdk { .. } | Self::Subscan { .. } | Self::Solana { .. } | Self::Near { .. } => {
                Some(WeightMode::Absolute)
            }
            Self::Sui { .. } | Self::Rated { .. } => Some(WeightMode::Proportional),
            Self::Precomputed { .. } | Self::Fixed { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::CosmosSdk { .. } => "cosmos_sdk",
            Self::Subscan { .. } => "subscan",
            Self::Solana { .. } => "solana",
            Self::Near { .. } => "near",
            Self::Sui { .. } => "sui",
            Self::Rated { .. } => "rated",
            Self::Precomputed { .. } => "precomputed",
            Self::Fixed { .. } => "fixed",
        }
    }
}

/// Instantiate the collector described by `config`.
///
/// `mode` is the network's declared weight mode; only collectors without a
/// native mode consult it.
pub fn build_collector(
    config: &CollectorConfig,
    mode: WeightMode,
    client: &HttpClient,
) -> Result<Arc<dyn Collector>, CollectorError> {
    if let Some(native) = config.native_mode() {
        if native != mode {
            return Err(CollectorError::Config(format!(
                "{} reports {native:?} weights, network declares {mode:?}",
                config.kind()
            )));
        }
    }

    let collector: Arc<dyn Collector> = match config {
        CollectorConfig::CosmosSdk {
            api_url,
            page_limit,
            use_pool_total,
        } => Arc::new(CosmosSdkCollector::new(
            client.clone(),
            api_url,
            *page_limit,
            *use_pool_total,
        )),
        CollectorConfig::Subscan {
            api_url,
            api_key_env,
        } => Arc::new(SubscanCollector::new(client.clone(), api_url, api_key_env)),
        CollectorConfig::Solana {
            api_url,
            api_key_env,
        } => Arc::new(SolanaCollector::new(client.clone(), api_url, api_key_env)),
        CollectorConfig::Near { rpc_url } => Arc::new(NearCollector::new(client.clone(), rpc_url)),
        CollectorConfig::Sui { rpc_url } => Arc::new(SuiCollector::new(client.clone(), rpc_url)),
        CollectorConfig::Rated {
            api_url,
            api_key_env,
        } => Arc::new(RatedCollector::new(client.clone(), api_url, api_key_env)),
        CollectorConfig::Precomputed { url, pointer } => {
            Arc::new(PrecomputedCollector::new(client.clone(), url, pointer)?)
        }
        CollectorConfig::Fixed { entries, total } => {
            Arc::new(FixedCollector::new(mode, entries, total.as_deref())?)
        }
    };
    Ok(collector)
}

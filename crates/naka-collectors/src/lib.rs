//! # naka-collectors — Upstream stake sources.
//!
//! Each collector normalizes one family of upstream APIs into the canonical
//! [`Collected`](naka_core::traits::Collected) shape:
//! - [`cosmos_sdk::CosmosSdkCollector`] — Cosmos SDK staking REST (ATOM, OSMO, JUNO, ...)
//! - [`subscan::SubscanCollector`] — Substrate chains via Subscan (DOT, AVAIL)
//! - [`solana::SolanaCollector`] — validators.app
//! - [`near::NearCollector`] — NEAR JSON-RPC `validators`
//! - [`sui::SuiCollector`] — Sui JSON-RPC system state (basis-point voting power)
//! - [`rated::RatedCollector`] — Ethereum operator network penetration
//! - [`precomputed::PrecomputedCollector`] — APIs that report the coefficient directly
//! - [`fixed::FixedCollector`] — a distribution given inline in configuration
//!
//! [`build_collector`] turns a [`CollectorConfig`] into a boxed collector.

pub mod config;
pub mod cosmos_sdk;
pub mod fixed;
pub mod http;
pub mod near;
pub mod precomputed;
pub mod rated;
pub mod solana;
pub mod subscan;
pub mod sui;

pub use config::{build_collector, CollectorConfig};
pub use http::HttpClient;

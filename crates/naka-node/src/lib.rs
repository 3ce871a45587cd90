//! # naka-node — Registry, scheduler, storage, HTTP.
//!
//! Composes the collectors and the engine into a running service:
//! - [`registry::RegistryHandle`] — atomically swapped, immutable registry snapshots
//! - [`scheduler::Scheduler`] — one bounded, concurrent refresh pass over all networks
//! - [`storage::RocksStore`] — best-effort durable mirror backed by RocksDB
//! - [`node::Node`] — context object wiring the above, plus the periodic loop
//! - [`api`] — read-only HTTP query surface
//! - [`config::NodeConfig`] — layered node and per-network configuration

pub mod api;
pub mod config;
pub mod node;
pub mod registry;
pub mod scheduler;
pub mod storage;

pub use api::router;
pub use config::{NetworkConfig, NodeConfig};
pub use node::Node;
pub use registry::{FreshRecord, Registry, RegistryHandle};
pub use scheduler::{CycleReport, FailureEvent, JobError, Scheduler};
pub use storage::RocksStore;

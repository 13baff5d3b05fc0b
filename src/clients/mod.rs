//! Contracts for the engine's remote collaborators.
//!
//! The engine never talks to a transport directly: the marketplace, the
//! blockchain order directory, the worker-management service and the
//! blacklist all arrive as trait objects. The `memory` module provides
//! in-process implementations that back the paper binary and the
//! end-to-end tests.

mod memory;

use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::errors::RpcError;
use crate::types::{AskPlan, MarketOrder, ResourceVector};

pub use memory::{InMemoryDirectory, InMemoryMarket, InMemoryWorker, StaticBlacklist};

/// Live market orders, already cached by whatever sits behind it.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    async fn active_orders(&self) -> Result<Vec<MarketOrder>, RpcError>;
}

/// On-chain order lookup by id.
#[async_trait]
pub trait OrderDirectory: Send + Sync {
    async fn order_info(&self, id: U256) -> Result<MarketOrder, RpcError>;
}

/// Worker-management surface the engine drives.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// The worker's full hardware.
    async fn devices(&self) -> Result<ResourceVector, RpcError>;

    /// Currently published plans, keyed by plan id.
    async fn ask_plans(&self) -> Result<HashMap<String, AskPlan>, RpcError>;

    /// Unix seconds of the next maintenance window.
    async fn next_maintenance(&self) -> Result<u64, RpcError>;

    /// Publish one plan; returns the assigned plan id.
    async fn create_ask_plan(&self, plan: AskPlan) -> Result<String, RpcError>;

    /// Remove the given plans in bulk.
    async fn remove_ask_plans(&self, ids: &[String]) -> Result<(), RpcError>;
}

/// Counterparty blacklist. `update` refreshes once per epoch; afterwards
/// `is_allowed` is a read-only snapshot query.
#[async_trait]
pub trait Blacklist: Send + Sync {
    async fn update(&self) -> Result<(), RpcError>;

    fn is_allowed(&self, addr: Address) -> bool;
}

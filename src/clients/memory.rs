//! In-process client implementations.
//!
//! These back the paper-mode binary and the end-to-end tests: the engine
//! runs unmodified against them, and every mutation it performs is
//! observable afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::errors::RpcError;
use crate::types::{AskPlan, MarketOrder, ResourceVector};

use super::{Blacklist, MarketFeed, OrderDirectory, WorkerClient};

/// A static snapshot of market orders.
#[derive(Default)]
pub struct InMemoryMarket {
    orders: Mutex<Vec<MarketOrder>>,
}

impl InMemoryMarket {
    pub fn new(orders: Vec<MarketOrder>) -> Self {
        Self {
            orders: Mutex::new(orders),
        }
    }

    pub fn set_orders(&self, orders: Vec<MarketOrder>) {
        *self.orders.lock().unwrap() = orders;
    }
}

#[async_trait]
impl MarketFeed for InMemoryMarket {
    async fn active_orders(&self) -> Result<Vec<MarketOrder>, RpcError> {
        Ok(self.orders.lock().unwrap().clone())
    }
}

/// Order lookup over a fixed set, indexed by id.
#[derive(Default)]
pub struct InMemoryDirectory {
    orders: HashMap<U256, MarketOrder>,
}

impl InMemoryDirectory {
    pub fn new(orders: impl IntoIterator<Item = MarketOrder>) -> Self {
        Self {
            orders: orders.into_iter().map(|o| (o.id, o)).collect(),
        }
    }
}

#[async_trait]
impl OrderDirectory for InMemoryDirectory {
    async fn order_info(&self, id: U256) -> Result<MarketOrder, RpcError> {
        self.orders
            .get(&id)
            .cloned()
            .ok_or_else(|| RpcError::new(format!("order {id} not found")))
    }
}

/// A worker with fixed hardware and a mutable plan book.
pub struct InMemoryWorker {
    devices: ResourceVector,
    maintenance_at_secs: u64,
    plans: Mutex<HashMap<String, AskPlan>>,
    removed: Mutex<Vec<String>>,
    next_plan_id: AtomicU64,
    clock_secs: AtomicU64,
}

impl InMemoryWorker {
    pub fn new(devices: ResourceVector, now_secs: u64) -> Self {
        Self {
            devices,
            maintenance_at_secs: u64::MAX,
            plans: Mutex::new(HashMap::new()),
            removed: Mutex::new(Vec::new()),
            next_plan_id: AtomicU64::new(1),
            clock_secs: AtomicU64::new(now_secs),
        }
    }

    pub fn with_maintenance_at(mut self, at_secs: u64) -> Self {
        self.maintenance_at_secs = at_secs;
        self
    }

    /// Seed an already-published plan.
    pub fn insert_plan(&self, id: impl Into<String>, plan: AskPlan) {
        let id = id.into();
        let mut plan = plan;
        plan.id = Some(id.clone());
        self.plans.lock().unwrap().insert(id, plan);
    }

    pub fn plans_snapshot(&self) -> HashMap<String, AskPlan> {
        self.plans.lock().unwrap().clone()
    }

    /// Ids removed so far, in removal order.
    pub fn removed_ids(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    pub fn advance_clock(&self, secs: u64) {
        self.clock_secs.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn now_secs(&self) -> u64 {
        self.clock_secs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerClient for InMemoryWorker {
    async fn devices(&self) -> Result<ResourceVector, RpcError> {
        Ok(self.devices.clone())
    }

    async fn ask_plans(&self) -> Result<HashMap<String, AskPlan>, RpcError> {
        Ok(self.plans_snapshot())
    }

    async fn next_maintenance(&self) -> Result<u64, RpcError> {
        Ok(self.maintenance_at_secs)
    }

    async fn create_ask_plan(&self, plan: AskPlan) -> Result<String, RpcError> {
        if plan.order_id.is_some() {
            return Err(RpcError::new("plan must not carry an order id"));
        }

        let id = format!("plan-{}", self.next_plan_id.fetch_add(1, Ordering::SeqCst));
        let mut plan = plan;
        plan.id = Some(id.clone());
        plan.created_at_secs = self.now_secs();
        self.plans.lock().unwrap().insert(id.clone(), plan);
        Ok(id)
    }

    async fn remove_ask_plans(&self, ids: &[String]) -> Result<(), RpcError> {
        let mut plans = self.plans.lock().unwrap();
        for id in ids {
            if plans.remove(id).is_none() {
                return Err(RpcError::new(format!("plan {id} not found")));
            }
            self.removed.lock().unwrap().push(id.clone());
        }
        Ok(())
    }
}

/// A blacklist over a fixed denial set.
#[derive(Default)]
pub struct StaticBlacklist {
    denied: HashSet<Address>,
}

impl StaticBlacklist {
    pub fn new(denied: impl IntoIterator<Item = Address>) -> Self {
        Self {
            denied: denied.into_iter().collect(),
        }
    }

    /// A blacklist that denies nobody.
    pub fn permissive() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Blacklist for StaticBlacklist {
    async fn update(&self) -> Result<(), RpcError> {
        Ok(())
    }

    fn is_allowed(&self, addr: Address) -> bool {
        !self.denied.contains(&addr)
    }
}

//! The per-epoch optimization engine.
//!
//! Each epoch: gate on maintenance, refresh the blacklist, gather inputs
//! concurrently, sweep stale plans (restarting once per removal round),
//! derive the natural and virtual free-capacity snapshots, optimize both
//! tracks in parallel and either append fresh plans or swing into
//! replacement mode when the virtual packing beats the current price by the
//! configured threshold.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, U256};
use futures_util::future::try_join_all;
use tracing::{debug, info, warn};

use crate::clients::{Blacklist, MarketFeed, OrderDirectory, WorkerClient};
use crate::errors::{CapacityError, EngineError};
use crate::prelude::EngineResult;
use crate::types::{sum_price, AskPlan, BenchmarkMapping, MarketOrder, ResourceVector};

use super::config::EngineConfig;
use super::device_manager::DeviceManager;
use super::filter::OrderFilter;
use super::knapsack::Knapsack;
use super::methods::{
    DefaultMethodFactory, MethodFactory, SearchBudget, SpecMethodFactory,
};
use super::tagger::Tagger;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The epoch's input snapshot. Captured once at the top of the epoch; no
/// re-reads happen until the next one.
pub struct OptimizationInput {
    pub orders: Vec<MarketOrder>,
    pub devices: ResourceVector,
    pub plans: HashMap<String, AskPlan>,
}

impl OptimizationInput {
    /// Plans that may be removed to make room for better ones. Spot plans
    /// carry no commitment and are always fair game.
    pub fn victim_plans(&self) -> HashMap<String, AskPlan> {
        self.plans
            .iter()
            .filter(|(_, plan)| plan.is_spot())
            .map(|(id, plan)| (id.clone(), plan.clone()))
            .collect()
    }

    /// Σ price of everything currently published.
    pub fn price(&self) -> U256 {
        sum_price(self.plans.values())
    }

    /// Capacity left after subtracting every existing plan.
    pub fn free_devices(&self) -> Result<ResourceVector, CapacityError> {
        self.free_devices_without(&HashSet::new())
    }

    /// Capacity left after subtracting everything except the victims, i.e.
    /// what the worker would have free if the victims were evicted.
    pub fn virtual_free_devices(&self) -> Result<ResourceVector, CapacityError> {
        let victims: HashSet<String> = self.victim_plans().into_keys().collect();
        self.free_devices_without(&victims)
    }

    fn free_devices_without(
        &self,
        removal_victims: &HashSet<String>,
    ) -> Result<ResourceVector, CapacityError> {
        let mut free = self.devices.clone();
        for (id, plan) in &self.plans {
            if !removal_victims.contains(id) {
                free = free.checked_sub(&plan.resources)?;
            }
        }
        Ok(free)
    }
}

/// The per-worker optimization engine.
pub struct WorkerEngine {
    cfg: EngineConfig,
    addr: Address,
    master_addr: Address,
    market: Arc<dyn MarketFeed>,
    directory: Arc<dyn OrderDirectory>,
    worker: Arc<dyn WorkerClient>,
    blacklist: Arc<dyn Blacklist>,
    mapping: Arc<BenchmarkMapping>,
    factory: Arc<dyn MethodFactory>,
    tagger: Tagger,
    budget: SearchBudget,
}

impl WorkerEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: EngineConfig,
        addr: Address,
        master_addr: Address,
        market: Arc<dyn MarketFeed>,
        directory: Arc<dyn OrderDirectory>,
        worker: Arc<dyn WorkerClient>,
        blacklist: Arc<dyn Blacklist>,
        mapping: Arc<BenchmarkMapping>,
    ) -> Self {
        let seed = cfg.optimization.seed.unwrap_or(0);
        let factory: Arc<dyn MethodFactory> = match &cfg.optimization.model {
            Some(spec) => Arc::new(SpecMethodFactory::new(spec.clone(), seed)),
            None => Arc::new(DefaultMethodFactory::with_seed(seed)),
        };

        Self {
            cfg,
            addr,
            master_addr,
            market,
            directory,
            worker,
            blacklist,
            mapping,
            factory,
            tagger: Tagger::new(),
            budget: SearchBudget::unbounded(),
        }
    }

    /// Replace the method factory. Intended for tests and experiments.
    pub fn with_factory(mut self, factory: Arc<dyn MethodFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn on_run(&self) {
        info!(addr = %self.addr, "managing worker");
    }

    pub fn on_shutdown(&self) {
        self.budget.cancel();
        info!(addr = %self.addr, "stop managing worker");
    }

    /// Run one epoch. Failures never escape: benign outcomes are logged at
    /// info, everything else at warn, and the next epoch starts fresh.
    pub async fn execute(&self) {
        info!("optimization epoch started");

        match self.run_epoch(None).await {
            Ok(()) => info!("optimization epoch finished"),
            Err(err) if err.is_benign() => info!("{err}"),
            Err(err) => warn!("{err}"),
        }
    }

    async fn run_epoch(&self, restart_budget: Option<usize>) -> EngineResult<()> {
        let maintenance = self
            .worker
            .next_maintenance()
            .await
            .map_err(|e| EngineError::rpc("failed to get maintenance", e))?;
        if unix_now() >= maintenance {
            return Err(EngineError::OnMaintenance);
        }

        self.blacklist
            .update()
            .await
            .map_err(|e| EngineError::rpc("failed to update blacklist", e))?;

        let input = self.gather_input().await?;
        debug!(
            orders = input.orders.len(),
            plans = input.plans.len(),
            "pulled optimization input"
        );

        let removed = self.try_remove_unsold_plans(&input.plans).await?;
        if removed != 0 {
            let remaining = restart_budget.unwrap_or(input.plans.len());
            if remaining == 0 {
                return Err(EngineError::RestartLimit);
            }
            info!(removed, "removed unsold plans, restarting epoch");
            return Box::pin(self.run_epoch(Some(remaining - 1))).await;
        }

        let victim_plans = input.victim_plans();
        debug!(victims = victim_plans.len(), "collected victim plans");

        let natural_free = input.free_devices()?;
        let virtual_free = input.virtual_free_devices()?;

        // Victim plans re-enter the auction as their original orders so the
        // virtual track can weigh them against the fresh market.
        let victim_orders = self.orders_for_plans(&victim_plans).await?;
        let mut ext_orders = input.orders.clone();
        ext_orders.extend(victim_orders);

        let (natural_knapsack, virtual_knapsack) = tokio::try_join!(
            self.optimize_track("natural", &input.devices, natural_free, input.orders.clone()),
            self.optimize_track("virtual", &input.devices, virtual_free, ext_orders),
        )?;

        // The virtual outcome is what the worker would earn after the
        // swing: the freshly packed plans plus every kept (non-victim)
        // plan. The kept plans join the candidate set so the diff below
        // classifies them as `ignore` rather than re-creating them.
        let kept_plans: Vec<AskPlan> = input
            .plans
            .iter()
            .filter(|(id, plan)| !victim_plans.contains_key(*id) && plan.order_id.is_some())
            .map(|(_, plan)| plan.clone())
            .collect();

        let current_price = input.price();
        let virtual_price = virtual_knapsack.price() + sum_price(&kept_plans);
        info!(
            current = %current_price,
            natural = %natural_knapsack.price(),
            virtual_ = %virtual_price,
            "optimization tracks finished"
        );

        if self.cfg.dry_run {
            return Err(EngineError::DryRunActive);
        }

        let swing = virtual_price
            .checked_sub(current_price)
            .map(|diff| diff >= self.cfg.price_threshold_wei)
            .unwrap_or(false);

        let winners = if swing {
            info!("using replacement strategy");
            let mut candidates = virtual_knapsack.into_plans();
            candidates.extend(kept_plans);
            let (create, remove, ignore) = split_plans(&input.plans, candidates);
            info!(
                create = create.len(),
                remove = remove.len(),
                ignore = ignore.len(),
                "diffed virtual plans against existing"
            );

            if !remove.is_empty() {
                self.worker
                    .remove_ask_plans(&remove)
                    .await
                    .map_err(|e| EngineError::rpc("failed to remove plans", e))?;
            }

            create
        } else {
            info!("using appending strategy");
            natural_knapsack.into_plans()
        };

        if winners.is_empty() {
            return Err(EngineError::NoPlansFound);
        }

        for mut plan in winners {
            // The worker rejects plans that still reference an order.
            let order_id = plan.order_id.take();
            plan.identity = self.cfg.identity;
            plan.tag = Some(self.tagger.tag());

            match self.worker.create_ask_plan(plan).await {
                Ok(id) => info!(plan = %id, order = ?order_id, "created sell plan"),
                Err(err) => warn!(order = ?order_id, %err, "failed to create sell plan"),
            }
        }

        Ok(())
    }

    async fn gather_input(&self) -> EngineResult<OptimizationInput> {
        let gather = async {
            tokio::try_join!(
                async {
                    self.market
                        .active_orders()
                        .await
                        .map_err(|e| EngineError::rpc("failed to pull market orders", e))
                },
                async {
                    self.worker
                        .devices()
                        .await
                        .map_err(|e| EngineError::rpc("failed to pull worker devices", e))
                },
                async {
                    self.worker
                        .ask_plans()
                        .await
                        .map_err(|e| EngineError::rpc("failed to pull worker plans", e))
                },
            )
        };

        let (orders, devices, plans) = tokio::time::timeout(self.cfg.prelude_timeout(), gather)
            .await
            .map_err(|_| EngineError::PreludeTimeout)??;

        if orders.is_empty() {
            return Err(EngineError::NotEnoughOrders);
        }

        Ok(OptimizationInput {
            orders,
            devices,
            plans,
        })
    }

    /// Remove plans that sat unsold past the stale threshold. Returns how
    /// many were removed.
    async fn try_remove_unsold_plans(
        &self,
        plans: &HashMap<String, AskPlan>,
    ) -> EngineResult<usize> {
        let now = unix_now();
        let victims: Vec<String> = plans
            .iter()
            .filter(|(_, plan)| plan.unsold_for(now) >= self.cfg.stale_threshold())
            .map(|(id, _)| id.clone())
            .collect();

        if victims.is_empty() {
            debug!("no unsold plans found");
            return Ok(0);
        }

        info!(
            threshold_secs = self.cfg.stale_threshold_secs,
            plans = ?victims,
            "removing unsold plans"
        );
        self.worker
            .remove_ask_plans(&victims)
            .await
            .map_err(|e| EngineError::rpc("failed to remove unsold plans", e))?;

        Ok(victims.len())
    }

    /// Fetch the marketplace orders behind the victim plans, concurrently.
    /// Any failure aborts the epoch; the next one retries.
    async fn orders_for_plans(
        &self,
        plans: &HashMap<String, AskPlan>,
    ) -> EngineResult<Vec<MarketOrder>> {
        let fetches = plans
            .iter()
            .map(|(id, plan)| {
                let order_id = plan
                    .order_id
                    .ok_or_else(|| EngineError::VictimWithoutOrder(id.clone()))?;
                Ok(async move {
                    self.directory
                        .order_info(order_id)
                        .await
                        .map_err(|e| EngineError::rpc("failed to get victim order", e))
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        try_join_all(fetches).await
    }

    async fn optimize_track(
        &self,
        track: &'static str,
        devices: &ResourceVector,
        free: ResourceVector,
        orders: Vec<MarketOrder>,
    ) -> EngineResult<Knapsack> {
        let manager = DeviceManager::new(devices.clone(), free, Arc::clone(&self.mapping));
        let filter = OrderFilter::new(
            self.cfg.order_policy,
            self.addr,
            self.master_addr,
            self.blacklist.as_ref(),
            &manager,
        );
        let matched = filter.matching(&orders);
        info!(
            track,
            matched = matched.len(),
            total = orders.len(),
            "found matching orders"
        );

        let knapsack = Knapsack::new(manager);
        if matched.is_empty() {
            return Ok(knapsack);
        }

        let method = self.factory.create(&orders, &matched);
        let name = method.name();
        let budget = self.budget.clone();
        let started = Instant::now();

        let packed = tokio::task::spawn_blocking(move || {
            let mut knapsack = knapsack;
            method
                .optimize(&mut knapsack, &matched, &budget)
                .map(|()| knapsack)
        })
        .await
        .map_err(|e| EngineError::TaskFailed(e.to_string()))??;

        info!(
            track,
            method = name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            price = packed.pps_f64(),
            plans = packed.len(),
            "optimization finished"
        );

        Ok(packed)
    }
}

/// Diff the candidate plans against the existing ones by order id.
///
/// Returns `(create, remove, ignore)`: candidates to publish, existing plan
/// ids to evict, and candidates already covered by a published plan.
fn split_plans(
    existing: &HashMap<String, AskPlan>,
    candidates: Vec<AskPlan>,
) -> (Vec<AskPlan>, Vec<String>, Vec<AskPlan>) {
    let existing_orders: HashSet<U256> = existing
        .values()
        .filter_map(|plan| plan.order_id)
        .collect();
    let candidate_orders: HashSet<U256> =
        candidates.iter().filter_map(|plan| plan.order_id).collect();

    let mut create = Vec::new();
    let mut ignore = Vec::new();
    for plan in candidates {
        match plan.order_id {
            Some(order_id) if existing_orders.contains(&order_id) => ignore.push(plan),
            _ => create.push(plan),
        }
    }

    let remove = existing
        .iter()
        .filter(|(_, plan)| match plan.order_id {
            Some(order_id) => !candidate_orders.contains(&order_id),
            None => true,
        })
        .map(|(id, _)| id.clone())
        .collect();

    (create, remove, ignore)
}

#[cfg(test)]
mod tests {
    use crate::types::{IdentityLevel, NetFlags};

    use super::*;

    fn plan(order_id: Option<u64>, price: u64, duration_secs: u64, cores: u64) -> AskPlan {
        AskPlan {
            id: None,
            order_id: order_id.map(U256::from),
            price_per_second: U256::from(price),
            duration_secs,
            resources: ResourceVector {
                cpu_cores: cores,
                ..Default::default()
            },
            identity: IdentityLevel::default(),
            tag: None,
            created_at_secs: 0,
        }
    }

    fn input(plans: Vec<(&str, AskPlan)>) -> OptimizationInput {
        OptimizationInput {
            orders: Vec::new(),
            devices: ResourceVector {
                cpu_cores: 8,
                ram_bytes: 16 << 30,
                net_flags: NetFlags::from_parts(true, true, false),
                ..Default::default()
            },
            plans: plans
                .into_iter()
                .map(|(id, plan)| (id.to_string(), plan))
                .collect(),
        }
    }

    #[test]
    fn test_victims_are_spot_plans_only() {
        let input = input(vec![
            ("a", plan(Some(1), 10, 0, 2)),
            ("b", plan(Some(2), 20, 3600, 2)),
        ]);
        let victims = input.victim_plans();
        assert_eq!(victims.len(), 1);
        assert!(victims.contains_key("a"));
    }

    #[test]
    fn test_free_snapshots_differ_by_victims() {
        let input = input(vec![
            ("spot", plan(Some(1), 10, 0, 4)),
            ("forward", plan(Some(2), 20, 3600, 2)),
        ]);

        let natural = input.free_devices().expect("plans fit");
        assert_eq!(natural.cpu_cores, 2);

        // The spot plan is virtually evicted; only the forward plan binds.
        let virtual_free = input.virtual_free_devices().expect("plans fit");
        assert_eq!(virtual_free.cpu_cores, 6);
    }

    #[test]
    fn test_oversubscribed_plans_error() {
        let input = input(vec![("a", plan(Some(1), 10, 0, 16))]);
        assert!(input.free_devices().is_err());
    }

    #[test]
    fn test_current_price_sums_plans() {
        let input = input(vec![
            ("a", plan(Some(1), 10, 0, 1)),
            ("b", plan(Some(2), 7, 0, 1)),
        ]);
        assert_eq!(input.price(), U256::from(17u64));
    }

    #[test]
    fn test_split_plans_classifies_by_order_id() {
        let existing = HashMap::from([
            ("p1".to_string(), plan(Some(1), 10, 0, 1)),
            ("p2".to_string(), plan(Some(2), 20, 0, 1)),
            ("untracked".to_string(), plan(None, 5, 0, 1)),
        ]);
        let candidates = vec![plan(Some(2), 20, 0, 1), plan(Some(3), 30, 0, 1)];

        let (create, remove, ignore) = split_plans(&existing, candidates);

        assert_eq!(create.len(), 1);
        assert_eq!(create[0].order_id, Some(U256::from(3u64)));

        assert_eq!(ignore.len(), 1);
        assert_eq!(ignore[0].order_id, Some(U256::from(2u64)));

        let mut removed = remove;
        removed.sort();
        assert_eq!(removed, vec!["p1".to_string(), "untracked".to_string()]);
    }

    #[test]
    fn test_split_plans_empty_existing_creates_everything() {
        let (create, remove, ignore) =
            split_plans(&HashMap::new(), vec![plan(Some(1), 10, 0, 1)]);
        assert_eq!(create.len(), 1);
        assert!(remove.is_empty());
        assert!(ignore.is_empty());
    }
}

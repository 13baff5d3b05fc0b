//! Capacity-maker paper runner.
//!
//! Drives the optimization engine against an in-process scenario: a worker
//! hardware description, an optional book of already-published plans and a
//! set of market orders, all loaded from a TOML file. Useful for validating
//! configs and previewing what the engine would publish before pointing it
//! at real infrastructure.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, U256};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;

use capacity_maker::clients::{
    InMemoryDirectory, InMemoryMarket, InMemoryWorker, StaticBlacklist, WorkerClient,
};
use capacity_maker::logging::{init_logging, LogConfig};
use capacity_maker::{
    AskPlan, BenchmarkMapping, ConfigError, EngineConfig, MarketOrder, ResourceVector,
    WorkerEngine,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "capacity_maker")]
#[command(version, about = "Worker capacity sell-plan optimizer", long_about = None)]
struct Cli {
    /// Path to the engine config file
    #[arg(short, long, env = "CAPACITY_MAKER_CONFIG", default_value = "capacity_maker.toml")]
    config: String,

    /// Path to the paper scenario file
    #[arg(short, long, env = "CAPACITY_MAKER_SCENARIO", default_value = "scenario.toml")]
    scenario: String,

    /// Force dry-run regardless of config
    #[arg(long)]
    dry_run: bool,

    /// Number of epochs to run
    #[arg(long, default_value_t = 1)]
    epochs: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = "capacity_maker.toml")]
        output: String,
    },
    /// Generate a sample scenario file
    GenerateScenario {
        /// Output file path
        #[arg(short, long, default_value = "scenario.toml")]
        output: String,
    },
    /// Validate config and scenario without running
    ValidateConfig,
    /// Run the engine over the scenario (default)
    Run,
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
struct AppConfig {
    worker: WorkerIdentity,
    engine: EngineConfig,
    logging: LogConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
struct WorkerIdentity {
    address: Address,
    master_address: Address,
}

/// The paper world the engine runs against.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
struct Scenario {
    /// The worker's full hardware.
    devices: ResourceVector,

    /// Already-published plans, keyed by plan id.
    plans: HashMap<String, ScenarioPlan>,

    /// Live market orders.
    orders: Vec<MarketOrder>,

    /// Extra orders resolvable by id only (victim-plan lookups).
    chain_orders: Vec<MarketOrder>,

    /// Authors the blacklist denies.
    denied_authors: Vec<Address>,
}

/// A published plan described relative to "now".
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
struct ScenarioPlan {
    order_id: Option<U256>,
    price_per_second: U256,
    duration_secs: u64,
    resources: ResourceVector,
    /// How long the plan has already sat unsold.
    age_secs: u64,
}

impl Default for ScenarioPlan {
    fn default() -> Self {
        Self {
            order_id: None,
            price_per_second: U256::ZERO,
            duration_secs: 0,
            resources: ResourceVector::default(),
            age_secs: 0,
        }
    }
}

impl ScenarioPlan {
    fn into_ask_plan(self, now_secs: u64) -> AskPlan {
        AskPlan {
            id: None,
            order_id: self.order_id,
            price_per_second: self.price_per_second,
            duration_secs: self.duration_secs,
            resources: self.resources,
            identity: Default::default(),
            tag: None,
            created_at_secs: now_secs.saturating_sub(self.age_secs),
        }
    }
}

fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    if !Path::new(path).exists() {
        return Ok(AppConfig::default());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

fn load_scenario(path: &str) -> Result<Scenario, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

fn sample_scenario() -> Scenario {
    use capacity_maker::{ordinal_benchmarks, NetFlags, OrderKind};

    let devices = ResourceVector {
        cpu_cores: 8,
        ram_bytes: 16 << 30,
        storage_bytes: 512 << 30,
        net_down_bps: 100_000_000,
        net_up_bps: 100_000_000,
        net_flags: NetFlags::from_parts(true, true, false),
        gpus: Vec::new(),
    };

    let spot_plan = ScenarioPlan {
        order_id: Some(U256::from(1u64)),
        price_per_second: U256::from(10u64),
        duration_secs: 0,
        resources: ResourceVector {
            cpu_cores: 4,
            ram_bytes: 8 << 30,
            ..Default::default()
        },
        age_secs: 30,
    };

    let victim_order = MarketOrder {
        id: U256::from(1u64),
        kind: OrderKind::Bid,
        author: Address::ZERO,
        counterparty: Address::ZERO,
        price_per_second: U256::from(10u64),
        duration_secs: 0,
        benchmarks: ordinal_benchmarks(&[(0, 4), (1, 8 << 30)]),
        net_flags: NetFlags::default(),
    };

    let big_bid = MarketOrder {
        id: U256::from(2u64),
        kind: OrderKind::Bid,
        author: Address::ZERO,
        counterparty: Address::ZERO,
        price_per_second: U256::from(25u64),
        duration_secs: 0,
        benchmarks: ordinal_benchmarks(&[(0, 8), (1, 16 << 30)]),
        net_flags: NetFlags::default(),
    };

    Scenario {
        devices,
        plans: HashMap::from([("existing".to_string(), spot_plan)]),
        orders: vec![big_bid],
        chain_orders: vec![victim_order],
        denied_authors: Vec::new(),
    }
}

// ============================================================================
// Entrypoint
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if cli.dry_run {
        config.engine.dry_run = true;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    match cli.command.take().unwrap_or(Commands::Run) {
        Commands::GenerateConfig { output } => {
            std::fs::write(&output, toml::to_string_pretty(&AppConfig::default())?)?;
            println!("wrote sample config to {output}");
            Ok(())
        }
        Commands::GenerateScenario { output } => {
            std::fs::write(&output, toml::to_string_pretty(&sample_scenario())?)?;
            println!("wrote sample scenario to {output}");
            Ok(())
        }
        Commands::ValidateConfig => {
            load_scenario(&cli.scenario)?;
            println!("config and scenario are valid");
            Ok(())
        }
        Commands::Run => {
            let _guard = init_logging(&config.logging);
            run(config, cli).await
        }
    }
}

async fn run(config: AppConfig, cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = load_scenario(&cli.scenario)?;
    let now_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let worker = Arc::new(InMemoryWorker::new(scenario.devices.clone(), now_secs));
    for (id, plan) in scenario.plans {
        worker.insert_plan(id, plan.into_ask_plan(now_secs));
    }

    let directory_orders: Vec<MarketOrder> = scenario
        .chain_orders
        .into_iter()
        .chain(scenario.orders.iter().cloned())
        .collect();

    let engine = WorkerEngine::new(
        config.engine.clone(),
        config.worker.address,
        config.worker.master_address,
        Arc::new(InMemoryMarket::new(scenario.orders)),
        Arc::new(InMemoryDirectory::new(directory_orders)),
        Arc::clone(&worker) as Arc<dyn WorkerClient>,
        Arc::new(StaticBlacklist::new(scenario.denied_authors)),
        Arc::new(BenchmarkMapping::default()),
    );

    engine.on_run();

    let mut interval = tokio::time::interval(config.engine.epoch_interval());
    for epoch in 0..cli.epochs {
        tokio::select! {
            _ = interval.tick() => {
                info!(epoch, "running epoch");
                engine.execute().await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    engine.on_shutdown();

    let book = worker.plans_snapshot();
    println!("final plan book ({} plans):", book.len());
    println!("{}", serde_json::to_string_pretty(&book)?);

    Ok(())
}

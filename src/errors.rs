//! Error types, grouped by scope.
//!
//! Capacity errors are local: they reject a single order and the packing
//! continues. Method errors abort one search strategy. Engine errors abort
//! one epoch and are logged at the orchestrator boundary; the engine makes
//! opportunistic progress across epochs and never propagates them further.

use thiserror::Error;

use crate::types::Dimension;

/// Resource-algebra and device-manager failures.
///
/// All variants leave the rejecting component unmodified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapacityError {
    /// A subtraction would drive one dimension negative.
    #[error("insufficient {dimension} capacity: requested {requested}, free {free}")]
    Insufficient {
        dimension: Dimension,
        requested: u64,
        free: u64,
    },

    /// The worker's network flags do not cover the requested flags.
    #[error("worker network flags do not admit the requested flags")]
    FlagMismatch,

    /// Too few free GPUs individually satisfy the requested per-device floor.
    #[error("not enough matching GPUs: requested {requested}, matched {matched}")]
    GpuExhausted { requested: usize, matched: usize },

    /// A GPU referenced by a plan is not present in the pool it is
    /// subtracted from.
    #[error("GPU {0} is not present in the pool")]
    UnknownGpu(u32),

    /// A nonzero benchmark ordinal has no entry in the catalog mapping.
    #[error("benchmark ordinal {0} is not present in the catalog mapping")]
    UnknownBenchmark(usize),
}

/// Failure of a single optimization method.
#[derive(Error, Debug, Clone)]
pub enum MethodError {
    /// The price regression could not be fitted.
    #[error("price regression failed: {0}")]
    Regression(String),

    /// Every sub-method of a batch run failed.
    #[error("all batch sub-methods failed")]
    AllMethodsFailed,
}

/// Transport-level failure reported by a remote collaborator.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct RpcError(pub String);

impl RpcError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Epoch-scope failures. None of these escape the engine's `execute`
/// boundary other than as log records.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The worker is inside its maintenance window; skip the epoch.
    #[error("worker is on maintenance")]
    OnMaintenance,

    /// The marketplace returned no orders; skip the epoch.
    #[error("not enough orders to perform optimization")]
    NotEnoughOrders,

    /// A remote call failed; retry next epoch.
    #[error("{context}: {source}")]
    Rpc {
        context: &'static str,
        source: RpcError,
    },

    /// The input gather did not complete within the prelude timeout.
    #[error("input gather timed out")]
    PreludeTimeout,

    /// Snapshot arithmetic failed, e.g. an unknown benchmark ordinal or a
    /// plan that no longer fits the reported devices.
    #[error("failed to virtualize free devices: {0}")]
    Capacity(#[from] CapacityError),

    /// A victim plan carries no order id and cannot be re-priced.
    #[error("victim plan {0} has no order id")]
    VictimWithoutOrder(String),

    /// All optimization methods failed on both tracks.
    #[error(transparent)]
    Method(#[from] MethodError),

    /// Stale-plan removal kept restarting the epoch past the safety cap.
    #[error("stale-plan sweep exceeded the restart budget")]
    RestartLimit,

    /// The optimization produced no plans worth publishing.
    #[error("no plans found")]
    NoPlansFound,

    /// Dry-run mode stops the epoch after optimization, by request.
    #[error("further worker management has been interrupted: dry-run mode is active")]
    DryRunActive,

    /// A background search task panicked or was aborted.
    #[error("optimization task failed: {0}")]
    TaskFailed(String),
}

impl EngineError {
    /// Wrap a transport failure with the call-site context.
    pub fn rpc(context: &'static str, source: RpcError) -> Self {
        Self::Rpc { context, source }
    }

    /// Errors that describe an idle epoch rather than a malfunction.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::OnMaintenance | Self::NotEnoughOrders | Self::NoPlansFound | Self::DryRunActive
        )
    }
}

/// Configuration failures. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

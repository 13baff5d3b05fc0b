//! Resource vectors and the algebra the packing engine runs on.
//!
//! A [`ResourceVector`] describes either a capacity (what a worker owns or
//! still has free) or a consumption (what one plan occupies). Scalars are
//! totals; GPUs are discrete devices matched by set-packing. All mutating
//! arithmetic is checked: a failed operation reports the offending dimension
//! and leaves no partial state behind.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::CapacityError;

/// A resource dimension, used for error reporting and benchmark mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    CpuCores,
    RamBytes,
    StorageBytes,
    NetDownBps,
    NetUpBps,
    GpuCount,
    GpuMemory,
    GpuHash,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::CpuCores => "cpu-cores",
            Dimension::RamBytes => "ram-bytes",
            Dimension::StorageBytes => "storage-bytes",
            Dimension::NetDownBps => "net-down-bps",
            Dimension::NetUpBps => "net-up-bps",
            Dimension::GpuCount => "gpu-count",
            Dimension::GpuMemory => "gpu-memory",
            Dimension::GpuHash => "gpu-hash",
        };
        f.write_str(name)
    }
}

/// Network capability bits.
///
/// A worker admits an order iff the worker's flags form a superset of the
/// order's flags: selling capacity never grants capabilities the hardware
/// does not offer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "NetFlagsRepr", into = "NetFlagsRepr")]
pub struct NetFlags {
    bits: u8,
}

impl NetFlags {
    pub const OVERLAY: u8 = 1 << 0;
    pub const OUTBOUND: u8 = 1 << 1;
    pub const INCOMING: u8 = 1 << 2;

    const MASK: u8 = Self::OVERLAY | Self::OUTBOUND | Self::INCOMING;

    pub fn new(bits: u8) -> Self {
        Self {
            bits: bits & Self::MASK,
        }
    }

    pub fn from_parts(overlay: bool, outbound: bool, incoming: bool) -> Self {
        let mut bits = 0;
        if overlay {
            bits |= Self::OVERLAY;
        }
        if outbound {
            bits |= Self::OUTBOUND;
        }
        if incoming {
            bits |= Self::INCOMING;
        }
        Self { bits }
    }

    pub fn bits(self) -> u8 {
        self.bits
    }

    pub fn contains(self, bit: u8) -> bool {
        self.bits & bit != 0
    }

    /// Whether these flags cover every capability `requested` demands.
    pub fn admits(self, requested: NetFlags) -> bool {
        requested.bits & !self.bits == 0
    }
}

/// Serde view of [`NetFlags`] as named booleans, for readable config files.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
struct NetFlagsRepr {
    overlay: bool,
    outbound: bool,
    incoming: bool,
}

impl From<NetFlagsRepr> for NetFlags {
    fn from(repr: NetFlagsRepr) -> Self {
        NetFlags::from_parts(repr.overlay, repr.outbound, repr.incoming)
    }
}

impl From<NetFlags> for NetFlagsRepr {
    fn from(flags: NetFlags) -> Self {
        Self {
            overlay: flags.contains(NetFlags::OVERLAY),
            outbound: flags.contains(NetFlags::OUTBOUND),
            incoming: flags.contains(NetFlags::INCOMING),
        }
    }
}

/// A single GPU in the worker's pool.
///
/// The vendor string is carried for operator visibility; matching is by
/// capability (memory and hash rate) only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuDevice {
    /// Stable index within the worker's pool.
    pub id: u32,
    #[serde(default)]
    pub vendor: String,
    pub memory_bytes: u64,
    pub hash_rate: u64,
}

impl GpuDevice {
    /// Whether this device individually satisfies the per-device floors.
    pub fn satisfies(&self, memory_floor: u64, hash_floor: u64) -> bool {
        self.memory_bytes >= memory_floor && self.hash_rate >= hash_floor
    }
}

/// A concrete demand derived from an order's benchmarks.
///
/// Scalar fields are totals; the GPU fields describe a set-packing request:
/// `gpu_count` devices, each with at least `gpu_memory_bytes` of memory and
/// `gpu_hash_rate` of hash capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceRequest {
    pub cpu_cores: u64,
    pub ram_bytes: u64,
    pub storage_bytes: u64,
    pub net_down_bps: u64,
    pub net_up_bps: u64,
    pub net_flags: NetFlags,
    pub gpu_count: usize,
    pub gpu_memory_bytes: u64,
    pub gpu_hash_rate: u64,
}

/// The full resource tuple.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceVector {
    pub cpu_cores: u64,
    pub ram_bytes: u64,
    pub storage_bytes: u64,
    pub net_down_bps: u64,
    pub net_up_bps: u64,
    pub net_flags: NetFlags,
    pub gpus: Vec<GpuDevice>,
}

impl ResourceVector {
    /// Component-wise sum. GPU sets are united; a device already present
    /// (by id) is not duplicated.
    pub fn add(&self, other: &ResourceVector) -> ResourceVector {
        let mut gpus = self.gpus.clone();
        for gpu in &other.gpus {
            if !gpus.iter().any(|g| g.id == gpu.id) {
                gpus.push(gpu.clone());
            }
        }

        ResourceVector {
            cpu_cores: self.cpu_cores + other.cpu_cores,
            ram_bytes: self.ram_bytes + other.ram_bytes,
            storage_bytes: self.storage_bytes + other.storage_bytes,
            net_down_bps: self.net_down_bps + other.net_down_bps,
            net_up_bps: self.net_up_bps + other.net_up_bps,
            net_flags: NetFlags::new(self.net_flags.bits() | other.net_flags.bits()),
            gpus,
        }
    }

    /// Component-wise subtraction.
    ///
    /// Fails with the offending dimension if any scalar would go negative or
    /// if `used` references a GPU this vector does not hold. On failure
    /// `self` is untouched and no partial result escapes.
    pub fn checked_sub(&self, used: &ResourceVector) -> Result<ResourceVector, CapacityError> {
        fn sub(dimension: Dimension, free: u64, requested: u64) -> Result<u64, CapacityError> {
            free.checked_sub(requested)
                .ok_or(CapacityError::Insufficient {
                    dimension,
                    requested,
                    free,
                })
        }

        let mut gpus = self.gpus.clone();
        for gpu in &used.gpus {
            let position = gpus
                .iter()
                .position(|g| g.id == gpu.id)
                .ok_or(CapacityError::UnknownGpu(gpu.id))?;
            gpus.swap_remove(position);
        }

        Ok(ResourceVector {
            cpu_cores: sub(Dimension::CpuCores, self.cpu_cores, used.cpu_cores)?,
            ram_bytes: sub(Dimension::RamBytes, self.ram_bytes, used.ram_bytes)?,
            storage_bytes: sub(Dimension::StorageBytes, self.storage_bytes, used.storage_bytes)?,
            net_down_bps: sub(Dimension::NetDownBps, self.net_down_bps, used.net_down_bps)?,
            net_up_bps: sub(Dimension::NetUpBps, self.net_up_bps, used.net_up_bps)?,
            net_flags: self.net_flags,
            gpus,
        })
    }

    /// Pure feasibility test: can this vector satisfy `request`?
    pub fn fits(&self, request: &ResourceRequest) -> bool {
        if !self.net_flags.admits(request.net_flags) {
            return false;
        }

        let scalars_fit = self.cpu_cores >= request.cpu_cores
            && self.ram_bytes >= request.ram_bytes
            && self.storage_bytes >= request.storage_bytes
            && self.net_down_bps >= request.net_down_bps
            && self.net_up_bps >= request.net_up_bps;
        if !scalars_fit {
            return false;
        }

        let matching = self
            .gpus
            .iter()
            .filter(|g| g.satisfies(request.gpu_memory_bytes, request.gpu_hash_rate))
            .count();
        matching >= request.gpu_count
    }

    /// Element-wise minimum against a cap. GPU sets keep only the devices
    /// present (by id) in both vectors.
    pub fn limit_to(&self, cap: &ResourceVector) -> ResourceVector {
        let gpus = self
            .gpus
            .iter()
            .filter(|g| cap.gpus.iter().any(|c| c.id == g.id))
            .cloned()
            .collect();

        ResourceVector {
            cpu_cores: self.cpu_cores.min(cap.cpu_cores),
            ram_bytes: self.ram_bytes.min(cap.ram_bytes),
            storage_bytes: self.storage_bytes.min(cap.storage_bytes),
            net_down_bps: self.net_down_bps.min(cap.net_down_bps),
            net_up_bps: self.net_up_bps.min(cap.net_up_bps),
            net_flags: NetFlags::new(self.net_flags.bits() & cap.net_flags.bits()),
            gpus,
        }
    }

    /// Select `count` free GPUs, each satisfying the per-device floors.
    ///
    /// Weaker devices are taken first so that stronger GPUs stay available
    /// for larger requests later in the packing.
    pub fn select_gpus(
        &self,
        count: usize,
        memory_floor: u64,
        hash_floor: u64,
    ) -> Result<Vec<GpuDevice>, CapacityError> {
        let mut candidates: Vec<&GpuDevice> = self
            .gpus
            .iter()
            .filter(|g| g.satisfies(memory_floor, hash_floor))
            .collect();

        if candidates.len() < count {
            return Err(CapacityError::GpuExhausted {
                requested: count,
                matched: candidates.len(),
            });
        }

        candidates.sort_by_key(|g| (g.memory_bytes, g.hash_rate, g.id));
        Ok(candidates.into_iter().take(count).cloned().collect())
    }
}

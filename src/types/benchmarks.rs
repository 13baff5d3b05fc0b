//! Benchmark vectors and the catalog mapping onto resource dimensions.
//!
//! Orders express their demands as a fixed-ordinal array of benchmark
//! values. The platform's catalog assigns every ordinal a resource dimension
//! and an aggregation rule; the mapping below is the engine's only view of
//! that catalog.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::errors::CapacityError;

use super::resources::{Dimension, NetFlags, ResourceRequest};

/// A fixed-ordinal array of benchmark values. Zero means "no demand".
pub type BenchmarkVector = SmallVec<[u64; 12]>;

/// Well-known ordinals of the default catalog.
pub mod ordinal {
    pub const CPU_CORES: usize = 0;
    pub const RAM_BYTES: usize = 1;
    pub const STORAGE_BYTES: usize = 2;
    pub const NET_DOWN_BPS: usize = 3;
    pub const NET_UP_BPS: usize = 4;
    pub const GPU_COUNT: usize = 5;
    pub const GPU_MEMORY_BYTES: usize = 6;
    pub const GPU_HASH_RATE: usize = 7;
}

/// Build a benchmark vector from `(ordinal, value)` pairs, zero elsewhere.
pub fn ordinal_benchmarks(entries: &[(usize, u64)]) -> BenchmarkVector {
    let len = entries.iter().map(|(ordinal, _)| ordinal + 1).max().unwrap_or(0);
    let mut benchmarks: BenchmarkVector = SmallVec::from_elem(0, len);
    for &(ordinal, value) in entries {
        benchmarks[ordinal] = value;
    }
    benchmarks
}

/// How a benchmark value constrains the matched hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// The value is a total over the whole allocation.
    Total,
    /// The value is a floor every matched device must clear individually.
    PerDevice,
}

/// One catalog entry: ordinal → (dimension, aggregation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkDef {
    pub ordinal: usize,
    pub dimension: Dimension,
    pub aggregation: Aggregation,
}

/// The benchmark catalog mapping consumed by the device manager.
#[derive(Debug, Clone)]
pub struct BenchmarkMapping {
    defs: Vec<Option<BenchmarkDef>>,
}

impl Default for BenchmarkMapping {
    fn default() -> Self {
        use Aggregation::*;
        use Dimension::*;

        Self::new(vec![
            BenchmarkDef {
                ordinal: ordinal::CPU_CORES,
                dimension: CpuCores,
                aggregation: Total,
            },
            BenchmarkDef {
                ordinal: ordinal::RAM_BYTES,
                dimension: RamBytes,
                aggregation: Total,
            },
            BenchmarkDef {
                ordinal: ordinal::STORAGE_BYTES,
                dimension: StorageBytes,
                aggregation: Total,
            },
            BenchmarkDef {
                ordinal: ordinal::NET_DOWN_BPS,
                dimension: NetDownBps,
                aggregation: Total,
            },
            BenchmarkDef {
                ordinal: ordinal::NET_UP_BPS,
                dimension: NetUpBps,
                aggregation: Total,
            },
            BenchmarkDef {
                ordinal: ordinal::GPU_COUNT,
                dimension: GpuCount,
                aggregation: Total,
            },
            BenchmarkDef {
                ordinal: ordinal::GPU_MEMORY_BYTES,
                dimension: GpuMemory,
                aggregation: PerDevice,
            },
            BenchmarkDef {
                ordinal: ordinal::GPU_HASH_RATE,
                dimension: GpuHash,
                aggregation: PerDevice,
            },
        ])
    }
}

impl BenchmarkMapping {
    pub fn new(defs: Vec<BenchmarkDef>) -> Self {
        let len = defs.iter().map(|d| d.ordinal + 1).max().unwrap_or(0);
        let mut slots = vec![None; len];
        for def in defs {
            slots[def.ordinal] = Some(def);
        }
        Self { defs: slots }
    }

    /// Number of ordinals the catalog covers.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Translate a benchmark vector plus net flags into a concrete demand.
    ///
    /// Nonzero values at unmapped ordinals are a catalog-level problem and
    /// abort the epoch rather than silently dropping a constraint.
    pub fn resolve(
        &self,
        benchmarks: &BenchmarkVector,
        net_flags: NetFlags,
    ) -> Result<ResourceRequest, CapacityError> {
        let mut request = ResourceRequest {
            net_flags,
            ..Default::default()
        };

        for (ordinal, &value) in benchmarks.iter().enumerate() {
            if value == 0 {
                continue;
            }
            let def = self
                .defs
                .get(ordinal)
                .copied()
                .flatten()
                .ok_or(CapacityError::UnknownBenchmark(ordinal))?;

            match def.dimension {
                Dimension::CpuCores => request.cpu_cores = value,
                Dimension::RamBytes => request.ram_bytes = value,
                Dimension::StorageBytes => request.storage_bytes = value,
                Dimension::NetDownBps => request.net_down_bps = value,
                Dimension::NetUpBps => request.net_up_bps = value,
                Dimension::GpuCount => request.gpu_count = value as usize,
                Dimension::GpuMemory => request.gpu_memory_bytes = value,
                Dimension::GpuHash => request.gpu_hash_rate = value,
            }
        }

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_resolve_default_catalog() {
        let mapping = BenchmarkMapping::default();
        let benchmarks: BenchmarkVector =
            smallvec![4, 8 << 30, 0, 0, 0, 2, 6 << 30, 25];

        let request = mapping
            .resolve(&benchmarks, NetFlags::from_parts(false, true, false))
            .expect("all ordinals mapped");

        assert_eq!(request.cpu_cores, 4);
        assert_eq!(request.ram_bytes, 8 << 30);
        assert_eq!(request.gpu_count, 2);
        assert_eq!(request.gpu_memory_bytes, 6 << 30);
        assert_eq!(request.gpu_hash_rate, 25);
        assert!(request.net_flags.contains(NetFlags::OUTBOUND));
    }

    #[test]
    fn test_unknown_ordinal_rejected() {
        let mapping = BenchmarkMapping::default();
        let mut benchmarks: BenchmarkVector = smallvec![0; mapping.len() + 1];
        benchmarks[mapping.len()] = 1;

        assert_eq!(
            mapping.resolve(&benchmarks, NetFlags::default()),
            Err(CapacityError::UnknownBenchmark(mapping.len()))
        );
    }

    #[test]
    fn test_zero_at_unknown_ordinal_ignored() {
        let mapping = BenchmarkMapping::default();
        let benchmarks: BenchmarkVector = smallvec![0; 32];
        assert!(mapping.resolve(&benchmarks, NetFlags::default()).is_ok());
    }

    #[test]
    fn test_sparse_catalog_keeps_holes() {
        let mapping = BenchmarkMapping::new(vec![BenchmarkDef {
            ordinal: 3,
            dimension: Dimension::CpuCores,
            aggregation: Aggregation::Total,
        }]);

        let benchmarks: BenchmarkVector = smallvec![0, 7];
        assert_eq!(
            mapping.resolve(&benchmarks, NetFlags::default()),
            Err(CapacityError::UnknownBenchmark(1))
        );
    }
}

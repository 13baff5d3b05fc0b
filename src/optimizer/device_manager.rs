//! Residual-capacity tracking for one optimization run.
//!
//! A `DeviceManager` owns the mutable free-capacity vector and shares the
//! immutable worker total and benchmark mapping. `consume` is the only
//! mutator and is all-or-nothing. The manager is not thread-safe; search
//! strategies that explore alternative branches clone it instead of
//! sharing.

use std::sync::Arc;

use crate::errors::CapacityError;
use crate::types::{BenchmarkMapping, BenchmarkVector, NetFlags, ResourceVector};

#[derive(Debug, Clone)]
pub struct DeviceManager {
    /// The worker's full hardware. Immutable, shared across clones.
    total: Arc<ResourceVector>,
    /// The benchmark catalog mapping. Immutable, shared across clones.
    mapping: Arc<BenchmarkMapping>,
    /// Capacity still unclaimed by this run.
    free: ResourceVector,
}

impl DeviceManager {
    pub fn new(
        total: ResourceVector,
        free: ResourceVector,
        mapping: Arc<BenchmarkMapping>,
    ) -> Self {
        Self {
            total: Arc::new(total),
            mapping,
            free,
        }
    }

    pub fn free(&self) -> &ResourceVector {
        &self.free
    }

    pub fn total(&self) -> &ResourceVector {
        &self.total
    }

    /// Atomically claim the resources a benchmark vector demands.
    ///
    /// On success the concrete consumed vector (with the requested net
    /// flags and the exact GPUs picked) is returned and subtracted from the
    /// free pool. On failure nothing is mutated.
    pub fn consume(
        &mut self,
        benchmarks: &BenchmarkVector,
        net_flags: NetFlags,
    ) -> Result<ResourceVector, CapacityError> {
        let request = self.mapping.resolve(benchmarks, net_flags)?;

        if !self.total.net_flags.admits(net_flags) {
            return Err(CapacityError::FlagMismatch);
        }

        let gpus = self
            .free
            .select_gpus(request.gpu_count, request.gpu_memory_bytes, request.gpu_hash_rate)?;

        let consumed = ResourceVector {
            cpu_cores: request.cpu_cores,
            ram_bytes: request.ram_bytes,
            storage_bytes: request.storage_bytes,
            net_down_bps: request.net_down_bps,
            net_up_bps: request.net_up_bps,
            net_flags,
            gpus,
        };

        self.free = self.free.checked_sub(&consumed)?;
        Ok(consumed)
    }

    /// Pure test: could the *total* worker capacity ever satisfy this
    /// demand? Used by the order filter to drop orders that can never fit,
    /// regardless of what is currently free.
    pub fn contains(&self, benchmarks: &BenchmarkVector, net_flags: NetFlags) -> bool {
        match self.mapping.resolve(benchmarks, net_flags) {
            Ok(request) => self.total.fits(&request),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ordinal, GpuDevice};
    use smallvec::smallvec;

    fn gpu(id: u32, memory_gib: u64, hash: u64) -> GpuDevice {
        GpuDevice {
            id,
            vendor: "test".to_string(),
            memory_bytes: memory_gib << 30,
            hash_rate: hash,
        }
    }

    fn worker() -> ResourceVector {
        ResourceVector {
            cpu_cores: 8,
            ram_bytes: 16 << 30,
            storage_bytes: 512 << 30,
            net_down_bps: 100_000_000,
            net_up_bps: 100_000_000,
            net_flags: NetFlags::from_parts(true, true, false),
            gpus: vec![gpu(0, 4, 20), gpu(1, 8, 30)],
        }
    }

    fn manager() -> DeviceManager {
        let total = worker();
        DeviceManager::new(total.clone(), total, Arc::new(BenchmarkMapping::default()))
    }

    fn cpu_ram(cores: u64, ram_gib: u64) -> BenchmarkVector {
        let mut benchmarks: BenchmarkVector = smallvec![0; 8];
        benchmarks[ordinal::CPU_CORES] = cores;
        benchmarks[ordinal::RAM_BYTES] = ram_gib << 30;
        benchmarks
    }

    #[test]
    fn test_consume_subtracts_free() {
        let mut m = manager();
        let consumed = m
            .consume(&cpu_ram(4, 8), NetFlags::default())
            .expect("fits");

        assert_eq!(consumed.cpu_cores, 4);
        assert_eq!(m.free().cpu_cores, 4);
        assert_eq!(m.free().ram_bytes, 8 << 30);
        // Total is untouched.
        assert_eq!(m.total().cpu_cores, 8);
    }

    #[test]
    fn test_consume_failure_leaves_state() {
        let mut m = manager();
        m.consume(&cpu_ram(6, 4), NetFlags::default()).expect("fits");
        let before = m.free().clone();

        assert!(m.consume(&cpu_ram(4, 1), NetFlags::default()).is_err());
        assert_eq!(m.free(), &before);
    }

    #[test]
    fn test_consume_rejects_uncovered_flags() {
        let mut m = manager();
        let err = m
            .consume(&cpu_ram(1, 1), NetFlags::from_parts(false, false, true))
            .unwrap_err();
        assert_eq!(err, CapacityError::FlagMismatch);
        assert_eq!(m.free().cpu_cores, 8);
    }

    #[test]
    fn test_consume_picks_weakest_gpu() {
        let mut m = manager();
        let mut benchmarks: BenchmarkVector = smallvec![0; 8];
        benchmarks[ordinal::GPU_COUNT] = 1;
        benchmarks[ordinal::GPU_MEMORY_BYTES] = 2 << 30;

        let consumed = m.consume(&benchmarks, NetFlags::default()).expect("fits");
        assert_eq!(consumed.gpus.len(), 1);
        assert_eq!(consumed.gpus[0].id, 0);
        assert_eq!(m.free().gpus.len(), 1);
        assert_eq!(m.free().gpus[0].id, 1);
    }

    #[test]
    fn test_contains_checks_total_not_free() {
        let mut m = manager();
        m.consume(&cpu_ram(8, 16), NetFlags::default()).expect("fits");

        // Nothing is free any more, but the total could satisfy it: the
        // filter keeps such orders alive for the virtual track.
        assert!(m.contains(&cpu_ram(8, 16), NetFlags::default()));
        assert!(!m.contains(&cpu_ram(9, 1), NetFlags::default()));
    }

    #[test]
    fn test_clone_isolates_mutation() {
        let mut original = manager();
        let clone = original.clone();

        original.consume(&cpu_ram(8, 16), NetFlags::default()).expect("fits");
        assert_eq!(original.free().cpu_cores, 0);
        assert_eq!(clone.free().cpu_cores, 8);
    }
}

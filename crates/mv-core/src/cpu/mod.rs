pub mod buffer;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, debug_span};

use crate::device::{Device, KernelArgs};
use crate::error::{Direction, MatVecError, Result};
use crate::kernel::{self, KernelVariant, TaskBody};
use crate::partition::{Dim2, LaunchConfig, MAX_TASKS_PER_BLOCK};

pub use buffer::{CpuBuffer, MemoryLedger};

/// Settings for a [`CpuDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuDeviceConfig {
    /// Worker threads; 0 lets rayon decide.
    pub threads: usize,
    /// Total bytes of live buffers allowed; `None` is unbounded.
    pub memory_limit: Option<usize>,
    /// Largest block a launch may request.
    pub max_tasks_per_block: usize,
}

impl Default for CpuDeviceConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            memory_limit: None,
            max_tasks_per_block: MAX_TASKS_PER_BLOCK,
        }
    }
}

/// Counters describing the work a device has run.
#[derive(Debug, Default)]
pub struct LaunchStats {
    launches: AtomicUsize,
    tasks: AtomicUsize,
}

impl LaunchStats {
    /// Launches that reached the execution stage.
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::Acquire)
    }

    /// In-bounds tasks that performed an update.
    pub fn tasks(&self) -> usize {
        self.tasks.load(Ordering::Acquire)
    }
}

/// Compute device backed by a private rayon thread pool.
///
/// Each grid block becomes one rayon work item; tasks inside a block run in
/// order on whichever worker picked the block up. Device memory is host
/// memory held as `AtomicI64` cells.
#[derive(Debug)]
pub struct CpuDevice {
    pool: ThreadPool,
    ledger: Arc<MemoryLedger>,
    max_tasks_per_block: usize,
    stats: LaunchStats,
}

impl CpuDevice {
    /// Create a device with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(CpuDeviceConfig::default())
    }

    /// # Errors
    /// Returns `ExecutionFailure` if the thread pool cannot be built.
    pub fn with_config(config: CpuDeviceConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("mv-worker-{i}"))
            .build()
            .map_err(|e| MatVecError::ExecutionFailure(format!("thread pool: {e}")))?;
        debug!(
            threads = pool.current_num_threads(),
            memory_limit = ?config.memory_limit,
            "cpu device ready"
        );
        Ok(CpuDevice {
            pool,
            ledger: Arc::new(MemoryLedger::new(config.memory_limit)),
            max_tasks_per_block: config.max_tasks_per_block,
            stats: LaunchStats::default(),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn stats(&self) -> &LaunchStats {
        &self.stats
    }

    pub fn memory(&self) -> &MemoryLedger {
        &self.ledger
    }

    fn check_shape(&self, variant: KernelVariant, config: &LaunchConfig) -> Result<()> {
        match variant {
            KernelVariant::Sequential => {
                if config.grid != Dim2::square(1) || config.block != Dim2::square(1) {
                    return Err(MatVecError::ExecutionFailure(format!(
                        "sequential kernel needs a 1x1 grid of 1x1 blocks, got {config}"
                    )));
                }
            }
            KernelVariant::Parallel | KernelVariant::Unsynchronized => {
                let tasks = config.block.volume();
                if tasks == 0 || tasks > self.max_tasks_per_block {
                    return Err(MatVecError::ExecutionFailure(format!(
                        "too many resources requested for launch: \
                         block {} has {} tasks, limit is {}",
                        config.block, tasks, self.max_tasks_per_block
                    )));
                }
            }
        }
        Ok(())
    }

    fn run(
        &self,
        variant: KernelVariant,
        config: &LaunchConfig,
        args: &KernelArgs<'_, CpuBuffer>,
    ) -> usize {
        let n = config.n;
        let (a, b, c) = (args.a.cells(), args.b.cells(), args.c.cells());
        let body: TaskBody = match variant {
            KernelVariant::Sequential => return kernel::sequential(n, a, b, c),
            KernelVariant::Parallel => kernel::accumulate,
            KernelVariant::Unsynchronized => kernel::accumulate_unsynchronized,
        };
        self.pool.install(|| {
            (0..config.tile_count())
                .into_par_iter()
                .map(|i| {
                    let tile = config.tile(i);
                    kernel::run_block(tile.block_idx, config.block, n, a, b, c, body)
                })
                .sum()
        })
    }
}

fn check_len(direction: Direction, label: &str, buffer: usize, host: usize) -> Result<()> {
    if buffer != host {
        return Err(MatVecError::TransferFailure {
            direction,
            reason: format!(
                "buffer {} holds {} elements but host slice has {}",
                label, buffer, host
            ),
        });
    }
    Ok(())
}

impl Device for CpuDevice {
    type Buffer = CpuBuffer;

    fn name(&self) -> &str {
        "cpu"
    }

    fn allocate(&self, label: &'static str, len: usize) -> Result<CpuBuffer> {
        CpuBuffer::allocate(&self.ledger, label, len)
    }

    fn copy_to_device(&self, dst: &mut CpuBuffer, src: &[i64]) -> Result<()> {
        check_len(Direction::HostToDevice, dst.label(), dst.len(), src.len())?;
        for (cell, &v) in dst.cells_mut().zip(src) {
            *cell = v;
        }
        Ok(())
    }

    fn copy_to_host(&self, dst: &mut [i64], src: &CpuBuffer) -> Result<()> {
        check_len(Direction::DeviceToHost, src.label(), src.len(), dst.len())?;
        for (out, cell) in dst.iter_mut().zip(src.cells()) {
            *out = cell.load(Ordering::Acquire);
        }
        Ok(())
    }

    fn zero(&self, dst: &mut CpuBuffer) -> Result<()> {
        dst.cells_mut().for_each(|cell| *cell = 0);
        Ok(())
    }

    fn launch(
        &self,
        variant: KernelVariant,
        config: &LaunchConfig,
        args: KernelArgs<'_, CpuBuffer>,
    ) -> Result<()> {
        let _span = debug_span!("launch", %variant, %config).entered();
        let n = config.n;
        if args.a.len() != n * n || args.b.len() != n || args.c.len() != n {
            return Err(MatVecError::ExecutionFailure(format!(
                "argument sizes A={} B={} C={} do not match n={}",
                args.a.len(),
                args.b.len(),
                args.c.len(),
                n
            )));
        }
        if config.is_empty() {
            debug!("empty grid, nothing to run");
            return Ok(());
        }
        self.check_shape(variant, config)?;

        self.stats.launches.fetch_add(1, Ordering::AcqRel);
        let done = panic::catch_unwind(AssertUnwindSafe(|| self.run(variant, config, &args)))
            .map_err(|payload| {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                MatVecError::ExecutionFailure(format!("kernel panicked: {msg}"))
            })?;
        self.stats.tasks.fetch_add(done, Ordering::AcqRel);
        debug!(tasks = done, "launch complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> CpuDevice {
        CpuDevice::with_config(CpuDeviceConfig {
            threads: 4,
            ..Default::default()
        })
        .unwrap()
    }

    fn upload(dev: &CpuDevice, label: &'static str, data: &[i64]) -> CpuBuffer {
        let mut buf = dev.allocate(label, data.len()).unwrap();
        dev.copy_to_device(&mut buf, data).unwrap();
        buf
    }

    fn zeroed(dev: &CpuDevice, n: usize) -> CpuBuffer {
        let mut c = dev.allocate("C", n).unwrap();
        dev.zero(&mut c).unwrap();
        c
    }

    #[test]
    fn test_round_trip_copy() {
        let dev = device();
        let buf = upload(&dev, "A", &[3, -1, 4]);
        let mut out = vec![0; 3];
        dev.copy_to_host(&mut out, &buf).unwrap();
        assert_eq!(out, vec![3, -1, 4]);
    }

    #[test]
    fn test_copy_length_mismatch() {
        let dev = device();
        let mut buf = dev.allocate("B", 2).unwrap();
        let err = dev.copy_to_device(&mut buf, &[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            MatVecError::TransferFailure {
                direction: Direction::HostToDevice,
                ..
            }
        ));
        let mut out = vec![0; 1];
        assert!(dev.copy_to_host(&mut out, &buf).is_err());
    }

    #[test]
    fn test_parallel_launch_scenario() {
        let dev = device();
        let a = upload(&dev, "A", &[1, 2, 3, 1, 2, 3, 1, 2, 3]);
        let b = upload(&dev, "B", &[1, 2, 3]);
        let c = zeroed(&dev, 3);
        let cfg = LaunchConfig::parallel(3, 2).unwrap();
        dev.launch(KernelVariant::Parallel, &cfg, KernelArgs { a: &a, b: &b, c: &c })
            .unwrap();
        let mut out = vec![0; 3];
        dev.copy_to_host(&mut out, &c).unwrap();
        assert_eq!(out, vec![14, 14, 14]);
        assert_eq!(dev.stats().launches(), 1);
        assert_eq!(dev.stats().tasks(), 9);
    }

    #[test]
    fn test_sequential_requires_unit_shape() {
        let dev = device();
        let a = upload(&dev, "A", &[1, 2, 3, 4]);
        let b = upload(&dev, "B", &[1, 1]);
        let c = zeroed(&dev, 2);
        let cfg = LaunchConfig::parallel(2, 2).unwrap();
        let err = dev
            .launch(KernelVariant::Sequential, &cfg, KernelArgs { a: &a, b: &b, c: &c })
            .unwrap_err();
        assert!(matches!(err, MatVecError::ExecutionFailure(_)));
        assert_eq!(dev.stats().launches(), 0);
    }

    #[test]
    fn test_oversized_block_rejected() {
        let dev = device();
        let a = upload(&dev, "A", &[1]);
        let b = upload(&dev, "B", &[1]);
        let c = zeroed(&dev, 1);
        let cfg = LaunchConfig::parallel(1, 64).unwrap();
        let err = dev
            .launch(KernelVariant::Parallel, &cfg, KernelArgs { a: &a, b: &b, c: &c })
            .unwrap_err();
        assert!(err.to_string().contains("too many resources"));
    }

    #[test]
    fn test_argument_size_mismatch() {
        let dev = device();
        let a = upload(&dev, "A", &[1, 2, 3, 4]);
        let b = upload(&dev, "B", &[1]);
        let c = zeroed(&dev, 2);
        let cfg = LaunchConfig::parallel(2, 2).unwrap();
        assert!(dev
            .launch(KernelVariant::Parallel, &cfg, KernelArgs { a: &a, b: &b, c: &c })
            .is_err());
    }

    #[test]
    fn test_memory_limit_and_release() {
        let dev = CpuDevice::with_config(CpuDeviceConfig {
            threads: 1,
            memory_limit: Some(80),
            ..Default::default()
        })
        .unwrap();
        let a = dev.allocate("A", 9).unwrap();
        assert!(matches!(
            dev.allocate("B", 3),
            Err(MatVecError::AllocationFailure { buffer: "B", .. })
        ));
        drop(a);
        assert_eq!(dev.memory().in_use(), 0);
        assert!(dev.allocate("B", 3).is_ok());
    }
}

//! One-shot product runs through a [`Device`].
//!
//! Phases are strictly ordered: plan, allocate A/B/C, copy A and B in, zero
//! C, launch and wait, copy C out. Device buffers live only inside
//! [`run`] and are dropped on every exit path.

use std::time::{Duration, Instant};

use tracing::{debug, info, info_span};

use crate::device::{Device, KernelArgs};
use crate::error::{MatVecError, Result};
use crate::kernel::KernelVariant;
use crate::operands::Operands;
use crate::partition::LaunchConfig;

/// Outcome of a single kernel run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub variant: KernelVariant,
    pub config: LaunchConfig,
    pub output: Vec<i64>,
    /// Wall time of the launch alone, transfers excluded.
    pub kernel_time: Duration,
}

/// Outcome of running both kernels over the same operands.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub sequential: RunReport,
    pub parallel: RunReport,
}

impl Comparison {
    /// Sequential kernel time divided by parallel kernel time.
    pub fn speedup(&self) -> f64 {
        let par = self.parallel.kernel_time.as_secs_f64();
        if par == 0.0 {
            return f64::INFINITY;
        }
        self.sequential.kernel_time.as_secs_f64() / par
    }
}

/// Launch shape for `variant` over an `n`-sized problem.
pub fn plan(variant: KernelVariant, n: usize, tile_edge: usize) -> Result<LaunchConfig> {
    match variant {
        KernelVariant::Sequential => Ok(LaunchConfig::sequential(n)),
        KernelVariant::Parallel | KernelVariant::Unsynchronized => {
            LaunchConfig::parallel(n, tile_edge)
        }
    }
}

/// Compute `A . B` with `variant` on `device`.
///
/// An empty problem returns an empty vector without touching the device.
pub fn run<D: Device>(
    device: &D,
    variant: KernelVariant,
    operands: &Operands,
    tile_edge: usize,
) -> Result<RunReport> {
    let n = operands.dim();
    let _span = info_span!("run", device = device.name(), %variant, n).entered();
    let config = plan(variant, n, tile_edge)?;
    debug!(
        %config,
        tiles = config.tile_count(),
        padding = config.padding_tasks(),
        "planned"
    );

    if config.is_empty() {
        debug!("empty problem, skipping device");
        return Ok(RunReport {
            variant,
            config,
            output: Vec::new(),
            kernel_time: Duration::ZERO,
        });
    }

    let mut a = device.allocate("A", n * n)?;
    let mut b = device.allocate("B", n)?;
    let mut c = device.allocate("C", n)?;
    debug!("allocated device buffers");

    device.copy_to_device(&mut a, operands.matrix().as_slice())?;
    device.copy_to_device(&mut b, operands.vector().as_slice())?;
    device.zero(&mut c)?;
    debug!("inputs transferred");

    let start = Instant::now();
    device.launch(variant, &config, KernelArgs { a: &a, b: &b, c: &c })?;
    let kernel_time = start.elapsed();

    let mut output = vec![0i64; n];
    device.copy_to_host(&mut output, &c)?;
    info!(?kernel_time, "kernel finished");

    Ok(RunReport {
        variant,
        config,
        output,
        kernel_time,
    })
}

/// Check that two result vectors are bit-identical.
///
/// # Errors
/// Returns `Mismatch` naming the first differing index.
pub fn verify(sequential: &[i64], parallel: &[i64]) -> Result<()> {
    if sequential.len() != parallel.len() {
        return Err(MatVecError::InvalidArgument(format!(
            "result lengths differ: {} vs {}",
            sequential.len(),
            parallel.len()
        )));
    }
    match sequential
        .iter()
        .zip(parallel)
        .position(|(s, p)| s != p)
    {
        Some(index) => Err(MatVecError::Mismatch {
            index,
            sequential: sequential[index],
            parallel: parallel[index],
        }),
        None => Ok(()),
    }
}

/// Run the sequential and parallel kernels and verify they agree.
pub fn compare<D: Device>(device: &D, operands: &Operands, tile_edge: usize) -> Result<Comparison> {
    let sequential = run(device, KernelVariant::Sequential, operands, tile_edge)?;
    let parallel = run(device, KernelVariant::Parallel, operands, tile_edge)?;
    verify(&sequential.output, &parallel.output)?;
    Ok(Comparison {
        sequential,
        parallel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::{CpuDevice, CpuDeviceConfig};
    use crate::partition::DEFAULT_TILE_EDGE;

    fn device() -> CpuDevice {
        CpuDevice::with_config(CpuDeviceConfig {
            threads: 4,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_scenario_n3() {
        let dev = device();
        let ops = Operands::reference(3).unwrap();
        for variant in [KernelVariant::Parallel, KernelVariant::Sequential] {
            let r = run(&dev, variant, &ops, DEFAULT_TILE_EDGE).unwrap();
            assert_eq!(r.output, vec![14, 14, 14], "{variant}");
        }
    }

    #[test]
    fn test_scenario_n1() {
        let dev = device();
        let ops = Operands::reference(1).unwrap();
        let r = run(&dev, KernelVariant::Parallel, &ops, DEFAULT_TILE_EDGE).unwrap();
        assert_eq!(r.output, vec![1]);
    }

    #[test]
    fn test_empty_problem_never_launches() {
        let dev = device();
        let ops = Operands::reference(0).unwrap();
        for variant in [KernelVariant::Parallel, KernelVariant::Sequential] {
            let r = run(&dev, variant, &ops, DEFAULT_TILE_EDGE).unwrap();
            assert!(r.output.is_empty());
        }
        assert_eq!(dev.stats().launches(), 0);
        assert_eq!(dev.stats().tasks(), 0);
    }

    #[test]
    fn test_remainder_tile_matches_formula() {
        let dev = device();
        let ops = Operands::reference(21).unwrap();
        let r = run(&dev, KernelVariant::Parallel, &ops, 20).unwrap();
        assert_eq!(r.config.tile_count(), 4);
        assert_eq!(r.output, ops.expected());
        assert_eq!(dev.stats().tasks(), 21 * 21);
    }

    #[test]
    fn test_buffers_released_after_run() {
        let dev = device();
        let ops = Operands::reference(50).unwrap();
        run(&dev, KernelVariant::Parallel, &ops, 16).unwrap();
        assert_eq!(dev.memory().in_use(), 0);
    }

    #[test]
    fn test_allocation_failure_stops_before_launch() {
        let dev = CpuDevice::with_config(CpuDeviceConfig {
            threads: 2,
            memory_limit: Some(1024),
            ..Default::default()
        })
        .unwrap();
        let ops = Operands::reference(20).unwrap();
        let err = run(&dev, KernelVariant::Parallel, &ops, 20).unwrap_err();
        assert_eq!(err.phase(), "allocation");
        assert_eq!(dev.stats().launches(), 0);
        assert_eq!(dev.memory().in_use(), 0);
    }

    #[test]
    fn test_launch_failure_is_reported() {
        let dev = device();
        let ops = Operands::reference(4).unwrap();
        let err = run(&dev, KernelVariant::Parallel, &ops, 40).unwrap_err();
        assert_eq!(err.phase(), "execution");
        assert_eq!(dev.memory().in_use(), 0);
    }

    #[test]
    fn test_zero_tile_edge() {
        let dev = device();
        let ops = Operands::reference(4).unwrap();
        let err = run(&dev, KernelVariant::Parallel, &ops, 0).unwrap_err();
        assert!(matches!(err, MatVecError::InvalidArgument(_)));
    }

    #[test]
    fn test_sequential_ignores_tile_edge() {
        let dev = device();
        let ops = Operands::reference(4).unwrap();
        let r = run(&dev, KernelVariant::Sequential, &ops, 0).unwrap();
        assert_eq!(r.output, ops.expected());
    }

    #[test]
    fn test_compare_agrees() {
        let dev = device();
        let ops = Operands::random(37, 1000, 7).unwrap();
        let cmp = compare(&dev, &ops, 8).unwrap();
        assert_eq!(cmp.sequential.output, cmp.parallel.output);
        assert_eq!(cmp.parallel.output, ops.expected());
        assert!(cmp.speedup() > 0.0);
    }

    #[test]
    fn test_verify_reports_first_difference() {
        let err = verify(&[1, 2, 3], &[1, 5, 4]).unwrap_err();
        match err {
            MatVecError::Mismatch {
                index,
                sequential,
                parallel,
            } => {
                assert_eq!((index, sequential, parallel), (1, 2, 5));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(verify(&[1], &[1, 2]).is_err());
        assert!(verify(&[], &[]).is_ok());
    }
}

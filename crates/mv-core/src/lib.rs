//! `mv-core` - tiled matrix-vector accumulation kernels.
//!
//! This crate provides:
//! - `Matrix`, `Vector` and `Operands` input types with the reference construction
//! - A work-partition planner tiling the N x N task domain (`LaunchConfig`)
//! - Parallel (atomic fetch-add), sequential and unsynchronized kernels
//! - A `Device` trait for the host/device transfer and launch boundary
//! - A rayon-backed `CpuDevice`
//! - A phase pipeline (`run`, `compare`) and a text results sink

pub mod cpu;
pub mod device;
pub mod error;
pub mod kernel;
pub mod operands;
pub mod partition;
pub mod pipeline;
pub mod sink;

// Re-export primary types at the crate root for convenience.
pub use cpu::{CpuDevice, CpuDeviceConfig};
pub use device::{Device, KernelArgs};
pub use error::{Direction, MatVecError, Result};
pub use kernel::KernelVariant;
pub use operands::{Matrix, Operands, Vector};
pub use partition::{Dim2, LaunchConfig, DEFAULT_TILE_EDGE};
pub use pipeline::{compare, run, Comparison, RunReport};

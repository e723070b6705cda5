use std::fmt::Debug;

use crate::error::Result;
use crate::kernel::KernelVariant;
use crate::partition::LaunchConfig;

/// Buffers handed to a kernel launch. A and B are read-only for the
/// duration of the launch; C is the accumulation target.
#[derive(Debug)]
pub struct KernelArgs<'a, B> {
    pub a: &'a B,
    pub b: &'a B,
    pub c: &'a B,
}

/// Execution boundary between the host and a compute device.
///
/// Buffers are sized in `i64` elements. Every call blocks until its effect
/// is complete: a copy has landed, or a launch has run all of its tasks.
/// Buffers are released when dropped.
pub trait Device: Send + Sync + Debug {
    /// Device-side storage for one buffer.
    type Buffer: Send + Sync;

    /// Returns the name of this device (e.g., "cpu").
    fn name(&self) -> &str;

    /// Allocate an uninitialised device buffer of `len` elements.
    ///
    /// `label` names the buffer in error messages.
    fn allocate(&self, label: &'static str, len: usize) -> Result<Self::Buffer>;

    /// Copy `src` into `dst`. Lengths must match.
    fn copy_to_device(&self, dst: &mut Self::Buffer, src: &[i64]) -> Result<()>;

    /// Copy `src` back into `dst`. Lengths must match.
    fn copy_to_host(&self, dst: &mut [i64], src: &Self::Buffer) -> Result<()>;

    /// Fill `dst` with zeros.
    fn zero(&self, dst: &mut Self::Buffer) -> Result<()>;

    /// Launch `variant` over `config` and wait for every task to finish.
    fn launch(
        &self,
        variant: KernelVariant,
        config: &LaunchConfig,
        args: KernelArgs<'_, Self::Buffer>,
    ) -> Result<()>;
}

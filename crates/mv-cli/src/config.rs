use clap::{Parser, ValueEnum};
use mv_core::{CpuDeviceConfig, KernelVariant, DEFAULT_TILE_EDGE};

/// Which kernel(s) to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Sequential,
    Parallel,
    /// Run both kernels and check they agree.
    Compare,
}

impl Mode {
    pub fn banner(&self) -> &'static str {
        match self {
            Mode::Sequential => "Sequential calculation selected",
            Mode::Parallel => "Parallel calculation selected",
            Mode::Compare => "Sequential and parallel comparison selected",
        }
    }

    /// The single kernel this mode runs; `None` for `Compare`, which runs both.
    pub fn variant(&self) -> Option<KernelVariant> {
        match self {
            Mode::Sequential => Some(KernelVariant::Sequential),
            Mode::Parallel => Some(KernelVariant::Parallel),
            Mode::Compare => None,
        }
    }
}

/// Matrix-vector product C = A . B, sequential or tiled-parallel.
///
/// Without --mode or --size the missing value is asked for on stdin.
#[derive(Debug, Parser)]
#[command(name = "matvec")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Kernel to run
    #[arg(short, long, value_enum, env = "MATVEC_MODE")]
    pub mode: Option<Mode>,

    /// Matrix edge / vector length N
    #[arg(short = 'n', long, env = "MATVEC_SIZE")]
    pub size: Option<usize>,

    /// Tile edge length G for the parallel kernel
    #[arg(short, long, env = "MATVEC_TILE_EDGE", default_value_t = DEFAULT_TILE_EDGE)]
    pub tile_edge: usize,

    /// Worker threads (0 = one per core)
    #[arg(long, env = "MATVEC_THREADS", default_value_t = 0)]
    pub threads: usize,

    /// Cap on device buffer bytes
    #[arg(long, env = "MATVEC_MEMORY_LIMIT")]
    pub memory_limit: Option<usize>,
}

/// Settings for one invocation, after prompts have filled any gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub mode: Mode,
    pub size: usize,
    pub tile_edge: usize,
    pub device: CpuDeviceConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Parallel,
            size: 0,
            tile_edge: DEFAULT_TILE_EDGE,
            device: CpuDeviceConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn new(cli: &Cli, mode: Mode, size: usize) -> Self {
        Self {
            mode,
            size,
            tile_edge: cli.tile_edge,
            device: CpuDeviceConfig {
                threads: cli.threads,
                memory_limit: cli.memory_limit,
                ..Default::default()
            },
        }
    }
}

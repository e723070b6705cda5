//! `matvec` - computes C = A . B for the reference N x N inputs with either
//! the sequential or the tiled parallel kernel and prints C.

mod config;
mod error;
mod logging;
mod prompt;

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use mv_core::{pipeline, sink, CpuDevice, Operands};
use tracing::error;

use crate::config::{Cli, RunConfig};
use crate::error::Result;
use crate::prompt::{ask, parse_mode, parse_size, MODE_PROMPT, SIZE_PROMPT};

fn main() -> ExitCode {
    logging::init_tracing();
    let cli = Cli::parse();

    let stdin = io::stdin();
    let stdout = io::stdout();
    match execute(&cli, &mut stdin.lock(), &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(phase = e.phase(), "{e}");
            eprintln!("error ({} phase): {}", e.phase(), e);
            ExitCode::FAILURE
        }
    }
}

/// Resolve the run settings (flags first, prompts for the rest), run the
/// product and write the result line.
fn execute<R: BufRead, W: Write>(cli: &Cli, input: &mut R, out: &mut W) -> Result<()> {
    let mode = match cli.mode {
        Some(mode) => mode,
        None => ask(input, out, MODE_PROMPT, parse_mode)?,
    };
    let size = match cli.size {
        Some(size) => size,
        None => ask(input, out, SIZE_PROMPT, parse_size)?,
    };
    let config = RunConfig::new(cli, mode, size);
    writeln!(out, "{}", config.mode.banner())?;

    let device = CpuDevice::with_config(config.device.clone())?;
    let operands = Operands::reference(config.size)?;

    match config.mode.variant() {
        Some(variant) => {
            let report = pipeline::run(&device, variant, &operands, config.tile_edge)?;
            sink::write_result(out, &report.output)?;
        }
        None => {
            let cmp = pipeline::compare(&device, &operands, config.tile_edge)?;
            sink::write_result(out, &cmp.parallel.output)?;
            writeln!(
                out,
                "sequential {:?}, parallel {:?} ({} threads), speedup {:.2}x",
                cmp.sequential.kernel_time,
                cmp.parallel.kernel_time,
                device.threads(),
                cmp.speedup()
            )?;
        }
    }
    out.flush()?;
    Ok(())
}

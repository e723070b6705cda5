use std::io::{BufRead, Write};

use mv_core::MatVecError;

use crate::config::Mode;
use crate::error::{CliError, Result};

pub const MODE_PROMPT: &str =
    "Enter 1 for Sequential calculation or enter 0 for Parallel calculation";
pub const SIZE_PROMPT: &str = "Enter in the maximum square to calculate";

/// `1` selects sequential; any other integer selects parallel.
pub fn parse_mode(input: &str) -> std::result::Result<Mode, MatVecError> {
    let trimmed = input.trim();
    let value: i64 = trimmed.parse().map_err(|_| {
        MatVecError::InvalidArgument(format!("mode must be an integer, got {:?}", trimmed))
    })?;
    Ok(if value == 1 {
        Mode::Sequential
    } else {
        Mode::Parallel
    })
}

/// A non-negative integer dimension.
pub fn parse_size(input: &str) -> std::result::Result<usize, MatVecError> {
    let trimmed = input.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        if value < 0 {
            return Err(MatVecError::InvalidArgument(format!(
                "size must be non-negative, got {}",
                value
            )));
        }
    }
    trimmed.parse().map_err(|_| {
        MatVecError::InvalidArgument(format!(
            "size must be a non-negative integer, got {:?}",
            trimmed
        ))
    })
}

/// Print `prompt`, read one line, and parse it.
pub fn ask<R, W, T, F>(input: &mut R, output: &mut W, prompt: &str, parse: F) -> Result<T>
where
    R: BufRead,
    W: Write,
    F: FnOnce(&str) -> std::result::Result<T, MatVecError>,
{
    writeln!(output, "{prompt}")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(CliError::MatVec(MatVecError::InvalidArgument(
            "unexpected end of input".to_string(),
        )));
    }
    Ok(parse(&line)?)
}

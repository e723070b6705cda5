use std::fmt;

use thiserror::Error;

/// Direction of a host/device copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HostToDevice,
    DeviceToHost,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::HostToDevice => write!(f, "host to device"),
            Direction::DeviceToHost => write!(f, "device to host"),
        }
    }
}

#[derive(Error, Debug)]
pub enum MatVecError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("allocation failed for buffer {buffer} ({bytes} bytes): {reason}")]
    AllocationFailure {
        buffer: &'static str,
        bytes: usize,
        reason: String,
    },
    #[error("transfer failed ({direction}): {reason}")]
    TransferFailure { direction: Direction, reason: String },
    #[error("execution failed: {0}")]
    ExecutionFailure(String),
    #[error("result mismatch at index {index}: sequential={sequential}, parallel={parallel}")]
    Mismatch {
        index: usize,
        sequential: i64,
        parallel: i64,
    },
}

impl MatVecError {
    /// Short name of the phase that produced this error.
    pub fn phase(&self) -> &'static str {
        match self {
            MatVecError::InvalidArgument(_) => "input",
            MatVecError::AllocationFailure { .. } => "allocation",
            MatVecError::TransferFailure { .. } => "transfer",
            MatVecError::ExecutionFailure(_) => "execution",
            MatVecError::Mismatch { .. } => "verification",
        }
    }
}

pub type Result<T> = std::result::Result<T, MatVecError>;

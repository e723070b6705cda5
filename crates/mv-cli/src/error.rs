use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    MatVec(#[from] mv_core::MatVecError),
}

impl CliError {
    /// Phase named in the user-facing error line.
    pub fn phase(&self) -> &'static str {
        match self {
            CliError::Io(_) => "io",
            CliError::MatVec(e) => e.phase(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

use std::num::ParseIntError;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or running a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Non-positive buffer capacity or idle interval
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Config file or environment override could not be read
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A source line was not an integer
    #[error("Cannot parse {input:?} as an integer: {source}")]
    Parse {
        input: String,
        #[source]
        source: ParseIntError,
    },

    /// The pipeline input is no longer accepting values
    #[error("Pipeline input is closed")]
    InputClosed,

    /// Thread join error
    #[error("Thread join error: {0}")]
    ThreadError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

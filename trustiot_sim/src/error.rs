//! Error types for the simulation harness.

use thiserror::Error;
use trustiot_env::EnvError;

/// Errors that abort a simulation or its aggregation.
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration or setup problem, reported before any run
    #[error("Configuration error: {0}")]
    Config(#[from] EnvError),
    
    /// A run produced the wrong number of iterations
    #[error("Run {run} of {strategy} produced {actual} iterations, expected {expected}")]
    TruncatedRun {
        strategy: String,
        run: usize,
        expected: usize,
        actual: usize,
    },
    
    /// Export serialization or I/O failed
    #[error("Export error: {0}")]
    Export(String),
    
    /// Terminal rendering failed
    #[error("Render error: {0}")]
    Render(String),
}

//! Error types for the TrustIoT environment abstraction.

use thiserror::Error;

/// Configuration errors, reported before any simulation runs.
///
/// Resource shortfalls, deadline misses and allocator non-convergence are
/// modeled outcomes, never errors.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Setup produced no devices
    #[error("Setup returned no devices")]
    NoDevices,
    
    /// Setup produced no servers
    #[error("Setup returned no servers")]
    NoServers,
    
    /// Two devices share an identifier
    #[error("Duplicate device id: {0}")]
    DuplicateDevice(String),
    
    /// Two servers share an identifier
    #[error("Duplicate server id: {0}")]
    DuplicateServer(String),
    
    /// A device request is not a positive finite number
    #[error("Invalid request on device {device}: {reason}")]
    InvalidRequest { device: String, reason: String },
    
    /// A server capacity is not a positive finite number
    #[error("Invalid capacity on server {server}: {reason}")]
    InvalidCapacity { server: String, reason: String },
    
    /// Runs or iterations below one
    #[error("Invalid {what}: {value} (must be >= 1)")]
    InvalidCount { what: &'static str, value: usize },
    
    /// A parameter outside its allowed range
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    
    /// Setup file missing or unreadable
    #[error("Setup file {path}: {reason}")]
    SetupFile { path: String, reason: String },
    
    /// Setup file does not have the (devices, servers) shape
    #[error("Malformed setup: {0}")]
    MalformedSetup(String),
    
    /// No built-in scenario with that name
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),
    
    /// No allocation strategy with that name
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}

impl EnvError {
    /// Creates an invalid-request error.
    pub fn request(device: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            device: device.to_string(),
            reason: reason.into(),
        }
    }
    
    /// Creates an invalid-capacity error.
    pub fn capacity(server: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::InvalidCapacity {
            server: server.to_string(),
            reason: reason.into(),
        }
    }
    
    /// Creates an invalid-parameter error.
    pub fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

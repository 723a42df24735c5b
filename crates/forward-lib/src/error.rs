//! Error types for discovery, validation and process control

use std::fmt;
use thiserror::Error;

/// Errors raised by forwarding operations
#[derive(Debug, Error)]
pub enum ForwardError {
    /// A requested entry failed input validation
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// The short name is not present in the discovered services
    #[error("service '{name}' not found")]
    ServiceNotFound { name: String },

    /// The short name exists but no usable environment entry was found
    #[error("no '{environment}' environment found for service '{name}'")]
    EnvironmentNotFound { name: String, environment: String },

    /// The cluster query tool failed or is unavailable
    #[error("cluster query failed: {0}")]
    Query(String),

    /// A process could not be launched
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A termination signal could not be delivered
    #[error("failed to signal process {pid}: {reason}")]
    Signal { pid: u32, reason: String },
}

impl ForwardError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ForwardError::Validation {
            field,
            message: message.into(),
        }
    }

    /// True for errors caused by the caller's input rather than the cluster
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            ForwardError::ServiceNotFound { .. } | ForwardError::EnvironmentNotFound { .. }
        )
    }
}

/// A failure attached to one entry of a batched request
#[derive(Debug)]
pub struct EntryError {
    /// Position of the entry in the request
    pub index: usize,
    /// Service name, when one was given
    pub service: Option<String>,
    pub error: ForwardError,
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.service {
            Some(name) => write!(f, "services[{}] ({}): {}", self.index, name, self.error),
            None => write!(f, "services[{}]: {}", self.index, self.error),
        }
    }
}

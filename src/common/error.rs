//! Error types for keyscope

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Which scan pass an error or cancellation interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Sampling,
    Aggregation,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Sampling => write!(f, "sampling"),
            Pass::Aggregation => write!(f, "aggregation"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // === Store Errors ===
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    // === Run Control ===
    #[error("{pass} pass cancelled")]
    Cancelled { pass: Pass },

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    // === Output Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Was the run interrupted by the operator?
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Did the scan or a batched lookup fail at the network/protocol layer?
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Redis(_))
    }

    /// Process exit status for this error: 130 on cancellation, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_cancelled() {
            130
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_distinct_from_transport() {
        let cancelled = Error::Cancelled {
            pass: Pass::Aggregation,
        };
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_transport());
        assert_eq!(cancelled.exit_code(), 130);
        assert_eq!(cancelled.to_string(), "aggregation pass cancelled");

        let transport = Error::Transport("connection reset".into());
        assert!(transport.is_transport());
        assert!(!transport.is_cancelled());
        assert_eq!(transport.exit_code(), 1);
    }
}

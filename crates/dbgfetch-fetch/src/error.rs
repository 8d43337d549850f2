//! Error types for dbgfetch-fetch.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no servers to query")]
    NoServers,

    #[error("all {} servers failed: {}", .0.len(), summarize(.0))]
    AllServersFailed(Vec<ServerFailure>),

    #[error("cancelled by progress callback")]
    UserCancelled,
}

/// Why a single server's attempt did not produce the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out")]
    Timeout,

    #[error("artifact larger than {limit} bytes")]
    TooLarge { limit: u64 },
}

impl FailureReason {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FailureReason::Status(404))
    }
}

/// One server's failed attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFailure {
    pub url:    String,
    pub reason: FailureReason,
}

impl fmt::Display for ServerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.reason)
    }
}

fn summarize(failures: &[ServerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

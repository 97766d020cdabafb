use std::time::Duration;

use crate::genbank::ParseError;

#[derive(thiserror::Error, Debug)]
pub enum RetrievalError {
    #[error("Request to {endpoint} failed")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("Malformed {endpoint} response: {reason}")]
    MalformedResponse {
        endpoint: &'static str,
        reason: String,
    },
    #[error("No active session: a search must succeed before fetching")]
    NoActiveSession,
    #[error("Couldn't parse page at offset {offset}")]
    Parse {
        offset: u64,
        #[source]
        source: ParseError,
    },
    #[error("Retrieval didn't finish within {0:?}")]
    DeadlineExceeded(Duration),
    #[error("Retrieval cancelled")]
    Cancelled,
}

impl RetrievalError {
    pub fn transport(endpoint: &'static str, err: impl Into<anyhow::Error>) -> Self {
        Self::Transport {
            endpoint,
            source: err.into(),
        }
    }

    pub fn malformed(endpoint: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint,
            reason: reason.into(),
        }
    }

    // Only the network may heal by itself; a malformed body will be malformed again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

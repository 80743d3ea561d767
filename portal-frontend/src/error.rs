use service_core::retry::{is_retryable_status, is_retryable_transport, Transient};
use thiserror::Error;

/// Failure talking to the content store or view-matrix store.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned {status}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },

    #[error("{endpoint} returned an unreadable body: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { source, .. } => is_retryable_transport(source),
            FetchError::Status { status, .. } => is_retryable_status(*status),
            FetchError::Decode { .. } => false,
        }
    }
}

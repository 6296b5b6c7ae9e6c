use std::fmt;
use std::time::Duration;

/// Failures talking to the document store. Carried inside `anyhow::Error`;
/// callers that care about the kind use `downcast_ref::<StoreError>()`.
#[derive(Debug, Clone)]
pub enum StoreError {
    Transport {
        collection: String,
        detail: String,
    },
    Http {
        collection: String,
        status: u16,
        body: String,
    },
    Decode {
        collection: String,
        detail: String,
    },
    Timeout {
        collection: String,
        after: Duration,
    },
}

impl StoreError {
    /// Client errors (4xx) are not worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Http { status, .. } => *status >= 500 || *status == 429,
            StoreError::Transport { .. } | StoreError::Timeout { .. } => true,
            StoreError::Decode { .. } => false,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Transport { collection, detail } => {
                write!(f, "store request failed (collection={collection}): {detail}")
            }
            StoreError::Http {
                collection,
                status,
                body,
            } => write!(f, "store HTTP {status} (collection={collection}): {body}"),
            StoreError::Decode { collection, detail } => {
                write!(f, "store response decode failed (collection={collection}): {detail}")
            }
            StoreError::Timeout { collection, after } => write!(
                f,
                "store request timed out after {}ms (collection={collection})",
                after.as_millis()
            ),
        }
    }
}

impl std::error::Error for StoreError {}

pub mod cache;

pub use cache::SessionCache;

use serde::{Deserialize, Serialize};

/// The signed-in account, as reported by the remote auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
}

/// The remote auth service is the only source of truth for sessions.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// `Ok(None)` when the token does not identify a live session.
    async fn current_session(&self, token: &str) -> anyhow::Result<Option<Session>>;

    async fn end_session(&self, token: &str) -> anyhow::Result<()>;
}

use crate::auth::{Session, SessionProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedSession {
    session: Option<Session>,
    fetched_at: Instant,
}

/// Time-bounded memoization of session lookups, owned by whoever constructs it.
///
/// Negative answers are cached too, so a burst of requests with a dead token
/// costs one remote call per TTL.
pub struct SessionCache {
    provider: Arc<dyn SessionProvider>,
    ttl: Duration,
    entries: tokio::sync::Mutex<HashMap<String, CachedSession>>,
}

impl SessionCache {
    pub fn new(provider: Arc<dyn SessionProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            entries: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn current_session(&self, token: &str) -> anyhow::Result<Option<Session>> {
        {
            let entries = self.entries.lock().await;
            if let Some(cached) = entries.get(token) {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(cached.session.clone());
                }
            }
        }

        // Lookup errors are not cached.
        let session = self.provider.current_session(token).await?;

        let mut entries = self.entries.lock().await;
        entries.retain(|_, cached| cached.fetched_at.elapsed() < self.ttl);
        entries.insert(
            token.to_string(),
            CachedSession {
                session: session.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(session)
    }

    pub async fn invalidate(&self, token: &str) {
        self.entries.lock().await.remove(token);
    }

    pub async fn invalidate_all(&self) {
        self.entries.lock().await.clear();
    }

    /// Ends the remote session and forgets the cached answer.
    pub async fn end_session(&self, token: &str) -> anyhow::Result<()> {
        self.invalidate(token).await;
        self.provider.end_session(token).await
    }
}

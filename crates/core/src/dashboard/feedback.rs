use crate::dashboard::Dashboard;
use crate::domain::records::{Feedback, UserProfile};
use crate::store::lookup::bounded_lookups;
use crate::store::query::{SortDirection, CREATED_AT};
use crate::store::{get_typed, list_typed, DocumentQuery, DocumentStore};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

pub const UNKNOWN_USER: &str = "Unknown User";
pub const DEFAULT_RECENT_FEEDBACK: u32 = 5;
pub const MAX_RECENT_FEEDBACK: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewWithUser {
    #[serde(flatten)]
    pub feedback: Feedback,
    pub username: String,
}

impl Dashboard {
    /// Newest feedback first, each with its author's display name.
    pub async fn recent_feedback(&self, limit: u32) -> anyhow::Result<Vec<ReviewWithUser>> {
        let limit = limit.clamp(1, MAX_RECENT_FEEDBACK);
        let query = DocumentQuery::new()
            .order_by(CREATED_AT, SortDirection::Desc)
            .limit(limit);
        let feedback = tokio::time::timeout(
            self.timeout,
            list_typed::<Feedback>(self.store.as_ref(), &self.collections.feedback, &query),
        )
        .await
        .context("recent feedback query timed out")?
        .context("recent feedback query failed")?;

        Ok(self.with_usernames(feedback).await)
    }

    pub(crate) async fn with_usernames(&self, feedback: Vec<Feedback>) -> Vec<ReviewWithUser> {
        let user_ids: Vec<String> = feedback
            .iter()
            .filter_map(|f| f.user_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let names = resolve_usernames(
            Arc::clone(&self.store),
            &self.collections.users,
            user_ids,
            self.lookup_concurrency,
            self.timeout,
        )
        .await;

        feedback
            .into_iter()
            .map(|feedback| {
                let username = feedback
                    .user_id
                    .as_ref()
                    .and_then(|id| names.get(id))
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_USER.to_string());
                ReviewWithUser { feedback, username }
            })
            .collect()
    }
}

/// Display names by user id. Users that cannot be resolved are absent.
pub async fn resolve_usernames(
    store: Arc<dyn DocumentStore>,
    users_collection: &str,
    user_ids: Vec<String>,
    concurrency: usize,
    timeout: Duration,
) -> HashMap<String, String> {
    let results = bounded_lookups(user_ids, concurrency, |user_id: String| {
        let store = Arc::clone(&store);
        let collection = users_collection.to_string();
        async move {
            tokio::time::timeout(
                timeout,
                get_typed::<UserProfile>(store.as_ref(), &collection, &user_id),
            )
            .await
            .context("user lookup timed out")?
        }
    })
    .await;

    let mut out = HashMap::new();
    for (user_id, result) in results {
        match result {
            Ok(Some(user)) => match user.username.filter(|s| !s.trim().is_empty()) {
                Some(name) => {
                    out.insert(user_id, name);
                }
                None => tracing::debug!(%user_id, "user has no username"),
            },
            Ok(None) => tracing::warn!(%user_id, "feedback author not found"),
            Err(e) => tracing::warn!(%user_id, error = %format!("{e:#}"), "user lookup failed"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionIds;
    use crate::store::memory::MemoryStore;
    use chrono::FixedOffset;
    use serde_json::json;

    fn dashboard(store: Arc<MemoryStore>, concurrency: usize) -> Dashboard {
        Dashboard::new(
            store,
            CollectionIds::default(),
            Duration::from_secs(2),
            concurrency,
            FixedOffset::east_opt(7 * 3600).unwrap(),
        )
    }

    fn store() -> MemoryStore {
        let feedback = (1..=8)
            .map(|i| {
                json!({
                    "$id": format!("f{i}"),
                    "$createdAt": format!("2026-01-{:02}T03:00:00.000+00:00", 10 + i),
                    "user_id": if i % 2 == 0 { "u-known" } else { "u-gone" },
                    "rate": 4,
                    "content": format!("review {i}")
                })
            })
            .collect();
        MemoryStore::default()
            .with_documents("feedback", feedback)
            .with_documents("users", vec![json!({"$id": "u-known", "username": "linh"})])
    }

    #[tokio::test]
    async fn recent_feedback_is_newest_first_with_usernames() {
        let store = Arc::new(store());
        let reviews = dashboard(store, 4)
            .recent_feedback(DEFAULT_RECENT_FEEDBACK)
            .await
            .unwrap();

        let ids: Vec<&str> = reviews.iter().map(|r| r.feedback.id.as_str()).collect();
        assert_eq!(ids, vec!["f8", "f7", "f6", "f5", "f4"]);
        assert_eq!(reviews[0].username, "linh");
        assert_eq!(reviews[1].username, UNKNOWN_USER);
    }

    #[tokio::test]
    async fn failed_user_lookup_degrades_to_unknown() {
        let store = Arc::new(store().failing_get("users", "u-known"));
        let reviews = dashboard(store, 4).recent_feedback(2).await.unwrap();
        assert!(reviews.iter().all(|r| r.username == UNKNOWN_USER));
    }

    #[tokio::test]
    async fn user_lookups_are_deduplicated_and_bounded() {
        let store = Arc::new(store().with_get_delay(Duration::from_millis(5)));
        dashboard(store.clone(), 1).recent_feedback(8).await.unwrap();
        assert_eq!(store.get_calls(), 2);
        assert_eq!(store.max_in_flight_gets(), 1);
    }

    #[tokio::test]
    async fn feedback_query_failure_is_an_error() {
        let store = Arc::new(store().failing_list("feedback"));
        assert!(dashboard(store, 4).recent_feedback(5).await.is_err());
    }
}

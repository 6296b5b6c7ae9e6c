use crate::dashboard::{Dashboard, ReviewWithUser};
use crate::domain::financial::{BucketTransaction, DISPLAY_DATE_FORMAT};
use crate::domain::records::{Feedback, Transaction};
use crate::financial::status::resolve_statuses;
use crate::store::query::{SortDirection, CREATED_AT};
use crate::store::{list_typed, DocumentQuery};
use crate::time::calendar;
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything recorded on one calendar day, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayDetails {
    pub day: NaiveDate,
    pub date: String,
    pub revenue: f64,
    pub transactions: Vec<BucketTransaction>,
    pub reviews: Vec<ReviewWithUser>,
}

impl Dashboard {
    pub async fn day_details(&self, day: NaiveDate) -> anyhow::Result<DayDetails> {
        let (start, end) = calendar::day_bounds_utc(day, self.offset)?;
        let query = DocumentQuery::created_between(start, end).order_by(CREATED_AT, SortDirection::Desc);

        let (transactions, feedback) = tokio::try_join!(
            async {
                tokio::time::timeout(
                    self.timeout,
                    list_typed::<Transaction>(self.store.as_ref(), &self.collections.transactions, &query),
                )
                .await
                .context("day transactions query timed out")?
                .context("day transactions query failed")
            },
            async {
                tokio::time::timeout(
                    self.timeout,
                    list_typed::<Feedback>(self.store.as_ref(), &self.collections.feedback, &query),
                )
                .await
                .context("day feedback query timed out")?
                .context("day feedback query failed")
            },
        )?;

        let statuses = resolve_statuses(
            Arc::clone(&self.store),
            &self.collections.payments,
            transactions.iter().map(|t| t.id.clone()).collect(),
            self.lookup_concurrency,
            self.timeout,
        )
        .await;

        let transactions: Vec<BucketTransaction> = transactions
            .into_iter()
            .map(|transaction| {
                let status = statuses.get(&transaction.id).copied().unwrap_or_default();
                BucketTransaction {
                    transaction,
                    status,
                }
            })
            .collect();
        let revenue: f64 = transactions
            .iter()
            .filter(|t| t.status.is_completed())
            .map(|t| t.transaction.amount_in.max(0.0))
            .sum();
        let reviews = self.with_usernames(feedback).await;

        tracing::debug!(%day, transactions = transactions.len(), reviews = reviews.len(), "day details loaded");

        Ok(DayDetails {
            day,
            date: day.format(DISPLAY_DATE_FORMAT).to_string(),
            revenue,
            transactions,
            reviews,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionIds;
    use crate::dashboard::feedback::UNKNOWN_USER;
    use crate::domain::records::PaymentStatus;
    use crate::store::memory::MemoryStore;
    use chrono::FixedOffset;
    use serde_json::json;
    use std::time::Duration;

    fn dashboard(store: MemoryStore) -> Dashboard {
        Dashboard::new(
            Arc::new(store),
            CollectionIds::default(),
            Duration::from_secs(2),
            4,
            FixedOffset::east_opt(7 * 3600).unwrap(),
        )
    }

    fn store() -> MemoryStore {
        MemoryStore::default()
            .with_documents(
                "transactions",
                vec![
                    // 2026-01-27 08:00 and 22:00 at UTC+7
                    json!({"$id": "t-am", "$createdAt": "2026-01-27T01:00:00.000+00:00", "amountIn": 100000}),
                    json!({"$id": "t-pm", "$createdAt": "2026-01-27T15:00:00.000+00:00", "amountIn": 50000}),
                    // 2026-01-28 00:30 at UTC+7
                    json!({"$id": "t-next", "$createdAt": "2026-01-27T17:30:00.000+00:00", "amountIn": 9}),
                ],
            )
            .with_documents(
                "payments",
                vec![
                    json!({"$id": "p1", "$createdAt": "2026-01-20T00:00:00.000+00:00", "payment_transaction_id": "t-am", "status": "completed"}),
                    json!({"$id": "p2", "$createdAt": "2026-01-27T15:00:01.000+00:00", "payment_transaction_id": "t-pm", "status": "failed"}),
                ],
            )
            .with_documents(
                "feedback",
                vec![json!({"$id": "f1", "$createdAt": "2026-01-27T02:00:00.000+00:00", "user_id": "u1", "rate": 3, "content": "ok"})],
            )
    }

    #[tokio::test]
    async fn loads_one_local_day_newest_first() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 27).unwrap();
        let details = dashboard(store()).day_details(day).await.unwrap();

        assert_eq!(details.date, "27/01/2026");
        let ids: Vec<&str> = details
            .transactions
            .iter()
            .map(|t| t.transaction.id.as_str())
            .collect();
        assert_eq!(ids, vec!["t-pm", "t-am"]);
        assert_eq!(details.transactions[0].status, PaymentStatus::Failed);
        assert_eq!(details.transactions[1].status, PaymentStatus::Completed);
        assert_eq!(details.revenue, 100000.0);
        assert_eq!(details.reviews.len(), 1);
        assert_eq!(details.reviews[0].username, UNKNOWN_USER);
    }

    #[tokio::test]
    async fn fetch_failure_is_reported() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 27).unwrap();
        let err = dashboard(store().failing_list("transactions"))
            .day_details(day)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("day transactions query failed"));
    }
}

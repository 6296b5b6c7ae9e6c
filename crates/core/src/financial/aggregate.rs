use crate::config::{CollectionIds, Settings};
use crate::domain::financial::{apply_growth_rates, BucketTransaction, DayBucket, SeriesOrder};
use crate::domain::records::{Feedback, Payment, PaymentStatus, Transaction};
use crate::financial::status::{index_payment_statuses, resolve_statuses};
use crate::financial::{AggregateError, TimeWindow};
use crate::store::{list_typed, DocumentQuery, DocumentStore};
use crate::time::calendar;
use anyhow::Context;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Bound for each remote call. A bulk fetch exceeding it aborts the aggregation.
    pub timeout: Duration,
    pub lookup_concurrency: usize,
    /// Timezone in which records are assigned to calendar days.
    pub offset: FixedOffset,
    /// Resolve transactions whose payment predates the window one by one.
    pub resolve_missing_payments: bool,
}

impl AggregatorOptions {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            timeout: settings.store_timeout(),
            lookup_concurrency: settings.lookup_concurrency,
            offset: settings.display_offset()?,
            resolve_missing_payments: true,
        })
    }
}

/// Builds the per-day revenue/activity series for the dashboard.
#[derive(Clone)]
pub struct FinancialAggregator {
    store: Arc<dyn DocumentStore>,
    collections: CollectionIds,
    options: AggregatorOptions,
}

impl FinancialAggregator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collections: CollectionIds,
        options: AggregatorOptions,
    ) -> Self {
        Self {
            store,
            collections,
            options,
        }
    }

    pub fn from_settings(store: Arc<dyn DocumentStore>, settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self::new(
            store,
            settings.collections.clone(),
            AggregatorOptions::from_settings(settings)?,
        ))
    }

    pub fn options(&self) -> &AggregatorOptions {
        &self.options
    }

    /// Oldest-first series for the window ending today.
    pub async fn aggregate(&self, window: TimeWindow) -> Result<Vec<DayBucket>, AggregateError> {
        self.aggregate_at(window, Utc::now(), SeriesOrder::Ascending)
            .await
    }

    pub async fn aggregate_at(
        &self,
        window: TimeWindow,
        now_utc: DateTime<Utc>,
        order: SeriesOrder,
    ) -> Result<Vec<DayBucket>, AggregateError> {
        let t0 = std::time::Instant::now();
        let offset = self.options.offset;
        let today = calendar::today(now_utc, offset);
        let days = calendar::window_days(today, window.days());
        let (start, end) = calendar::window_bounds_utc(today, window.days(), offset)
            .map_err(AggregateError::Upstream)?;
        let query = DocumentQuery::created_between(start, end);

        let (transactions, payments, feedback) = tokio::try_join!(
            self.fetch::<Transaction>(&self.collections.transactions, &query),
            self.fetch::<Payment>(&self.collections.payments, &query),
            self.fetch::<Feedback>(&self.collections.feedback, &query),
        )
        .map_err(|e| {
            tracing::error!(window = window.days(), error = %format!("{e:#}"), "financial fetch failed");
            AggregateError::Upstream(e)
        })?;

        let mut statuses = index_payment_statuses(&payments);

        let unresolved: Vec<String> = transactions
            .iter()
            .filter(|tx| !statuses.contains_key(&tx.id))
            .map(|tx| tx.id.clone())
            .collect();
        if self.options.resolve_missing_payments && !unresolved.is_empty() {
            let resolved = resolve_statuses(
                Arc::clone(&self.store),
                &self.collections.payments,
                unresolved,
                self.options.lookup_concurrency,
                self.options.timeout,
            )
            .await;
            statuses.extend(resolved);
        }

        let mut buckets = build_buckets(&days, transactions, &statuses, feedback, offset);
        if order == SeriesOrder::Descending {
            buckets.reverse();
        }

        tracing::info!(
            window = window.days(),
            %today,
            buckets = buckets.len(),
            payments = payments.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "financial aggregation complete"
        );
        Ok(buckets)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> anyhow::Result<Vec<T>> {
        let timeout = self.options.timeout;
        tokio::time::timeout(timeout, list_typed::<T>(self.store.as_ref(), collection, query))
            .await
            .with_context(|| {
                format!(
                    "{collection} query timed out after {}ms",
                    timeout.as_millis()
                )
            })?
            .with_context(|| format!("{collection} query failed"))
    }
}

/// Buckets records by calendar day and computes growth. Output is oldest first
/// with exactly one bucket per entry in `days`; records outside them are dropped.
pub fn build_buckets(
    days: &[NaiveDate],
    transactions: Vec<Transaction>,
    statuses: &HashMap<String, PaymentStatus>,
    feedback: Vec<Feedback>,
    offset: FixedOffset,
) -> Vec<DayBucket> {
    let mut by_day: BTreeMap<NaiveDate, DayBucket> = days
        .iter()
        .map(|&day| (day, DayBucket::empty(day)))
        .collect();

    for transaction in transactions {
        let day = calendar::local_day(transaction.created_at, offset);
        let Some(bucket) = by_day.get_mut(&day) else {
            tracing::warn!(transaction_id = %transaction.id, %day, "transaction outside window");
            continue;
        };
        let status = statuses
            .get(&transaction.id)
            .copied()
            .unwrap_or_default();
        if status.is_completed() {
            if transaction.amount_in >= 0.0 {
                bucket.revenue += transaction.amount_in;
            } else {
                tracing::warn!(
                    transaction_id = %transaction.id,
                    amount_in = transaction.amount_in,
                    "ignoring negative inflow"
                );
            }
        }
        bucket.transactions.push(BucketTransaction {
            transaction,
            status,
        });
    }

    for review in feedback {
        let day = calendar::local_day(review.created_at, offset);
        match by_day.get_mut(&day) {
            Some(bucket) => bucket.reviews.push(review),
            None => tracing::warn!(feedback_id = %review.id, %day, "feedback outside window"),
        }
    }

    let mut buckets: Vec<DayBucket> = by_day.into_values().collect();
    apply_growth_rates(&mut buckets);
    buckets
}

use crate::domain::records::{Payment, PaymentStatus};
use crate::store::lookup::bounded_lookups;
use crate::store::query::{SortDirection, CREATED_AT};
use crate::store::{list_typed, DocumentQuery, DocumentStore};
use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const PAYMENT_TRANSACTION_FIELD: &str = "payment_transaction_id";

/// Maps linked transaction id to payment status. Later payments overwrite earlier ones.
pub fn index_payment_statuses(payments: &[Payment]) -> HashMap<String, PaymentStatus> {
    let mut index = HashMap::with_capacity(payments.len());
    for payment in payments {
        let Some(tx_id) = payment.payment_transaction_id.as_deref() else {
            tracing::debug!(payment_id = %payment.id, "payment has no linked transaction");
            continue;
        };
        if let Some(previous) = index.insert(tx_id.to_string(), payment.status) {
            tracing::debug!(
                transaction_id = tx_id,
                %previous,
                current = %payment.status,
                "duplicate payment for transaction; keeping latest"
            );
        }
    }
    index
}

/// Looks up the payment for each transaction id individually.
///
/// Ids that cannot be resolved (no payment, lookup error, timeout) are absent
/// from the result and read as `Pending` downstream.
pub async fn resolve_statuses(
    store: Arc<dyn DocumentStore>,
    payments_collection: &str,
    transaction_ids: Vec<String>,
    concurrency: usize,
    timeout: Duration,
) -> HashMap<String, PaymentStatus> {
    if transaction_ids.is_empty() {
        return HashMap::new();
    }

    let requested = transaction_ids.len();
    let results = bounded_lookups(transaction_ids, concurrency, |tx_id: String| {
        let store = Arc::clone(&store);
        let collection = payments_collection.to_string();
        async move {
            let query = DocumentQuery::equal(PAYMENT_TRANSACTION_FIELD, tx_id.as_str())
                .order_by(CREATED_AT, SortDirection::Desc)
                .limit(1);
            let payments = tokio::time::timeout(
                timeout,
                list_typed::<Payment>(store.as_ref(), &collection, &query),
            )
            .await
            .with_context(|| format!("payment lookup timed out after {}ms", timeout.as_millis()))??;
            Ok(payments.into_iter().next())
        }
    })
    .await;

    let mut out = HashMap::new();
    for (tx_id, result) in results {
        match result {
            Ok(Some(payment)) => {
                out.insert(tx_id, payment.status);
            }
            Ok(None) => {
                tracing::debug!(transaction_id = %tx_id, "no payment for transaction; status Pending");
            }
            Err(e) => {
                tracing::warn!(
                    transaction_id = %tx_id,
                    error = %format!("{e:#}"),
                    "payment lookup failed; status Pending"
                );
            }
        }
    }
    tracing::debug!(requested, resolved = out.len(), "payment fallback lookups done");
    out
}

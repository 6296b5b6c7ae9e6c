use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs `lookup` for every key with at most `concurrency` calls in flight.
///
/// Results come back in input order. A failing or panicking lookup only
/// affects its own slot.
pub async fn bounded_lookups<K, T, F, Fut>(
    keys: Vec<K>,
    concurrency: usize,
    lookup: F,
) -> Vec<(K, anyhow::Result<T>)>
where
    K: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();

    for (idx, key) in keys.iter().cloned().enumerate() {
        let permits = Arc::clone(&permits);
        let fut = lookup(key);
        set.spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(_permit) => fut.await,
                Err(e) => Err(anyhow::Error::new(e).context("lookup pool closed")),
            };
            (idx, result)
        });
    }

    let mut slots: Vec<Option<anyhow::Result<T>>> = keys.iter().map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, result)) => slots[idx] = Some(result),
            Err(e) => tracing::error!(error = %e, "lookup task failed"),
        }
    }

    keys.into_iter()
        .zip(slots)
        .map(|(key, slot)| {
            let result = slot.unwrap_or_else(|| Err(anyhow::anyhow!("lookup task did not complete")));
            (key, result)
        })
        .collect()
}

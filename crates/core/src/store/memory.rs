use crate::store::query::{DocumentQuery, Filter, SortDirection};
use crate::store::{DocumentStore, StoreError};
use chrono::DateTime;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory store for tests, with failure and latency injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<Value>>,
    failing_lists: HashSet<String>,
    failing_gets: HashSet<(String, String)>,
    list_delay: Option<Duration>,
    get_delay: Option<Duration>,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
    in_flight_gets: AtomicUsize,
    max_in_flight_gets: AtomicUsize,
    queries: Mutex<Vec<(String, DocumentQuery)>>,
}

impl MemoryStore {
    pub fn with_documents(mut self, collection: &str, docs: Vec<Value>) -> Self {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
        self
    }

    pub fn failing_list(mut self, collection: &str) -> Self {
        self.failing_lists.insert(collection.to_string());
        self
    }

    pub fn failing_get(mut self, collection: &str, id: &str) -> Self {
        self.failing_gets
            .insert((collection.to_string(), id.to_string()));
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = Some(delay);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn max_in_flight_gets(&self) -> usize {
        self.max_in_flight_gets.load(AtomicOrdering::SeqCst)
    }

    pub fn recorded_queries(&self) -> Vec<(String, DocumentQuery)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    fn matches(doc: &Value, filter: &Filter) -> bool {
        let (attribute, expected) = match filter {
            Filter::Equal(a, v) | Filter::GreaterThanEqual(a, v) | Filter::LessThanEqual(a, v) => {
                (a, v)
            }
        };
        let Some(ord) = doc
            .get(attribute)
            .and_then(|actual| compare(actual, expected))
        else {
            return false;
        };
        match filter {
            Filter::Equal(..) => ord == Ordering::Equal,
            Filter::GreaterThanEqual(..) => ord != Ordering::Less,
            Filter::LessThanEqual(..) => ord != Ordering::Greater,
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => {
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => Some(a.cmp(&b)),
                _ => Some(a.cmp(b)),
            }
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (a, b) => (a == b).then_some(Ordering::Equal),
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn list_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> anyhow::Result<Vec<Value>> {
        self.list_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if let Ok(mut q) = self.queries.lock() {
            q.push((collection.to_string(), query.clone()));
        }
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_lists.contains(collection) {
            return Err(StoreError::Http {
                collection: collection.to_string(),
                status: 503,
                body: "service unavailable".to_string(),
            }
            .into());
        }

        let mut docs: Vec<Value> = self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| query.filters.iter().all(|f| Self::matches(doc, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some((attribute, direction)) = &query.order {
            docs.sort_by(|a, b| {
                let ord = match (a.get(attribute), b.get(attribute)) {
                    (Some(a), Some(b)) => compare(a, b).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit as usize);
        }
        Ok(docs)
    }

    async fn get_document(&self, collection: &str, id: &str) -> anyhow::Result<Option<Value>> {
        self.get_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let now = self.in_flight_gets.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        self.max_in_flight_gets.fetch_max(now, AtomicOrdering::SeqCst);
        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight_gets.fetch_sub(1, AtomicOrdering::SeqCst);

        if self
            .failing_gets
            .contains(&(collection.to_string(), id.to_string()))
        {
            return Err(StoreError::Transport {
                collection: collection.to_string(),
                detail: format!("connection reset fetching {id}"),
            }
            .into());
        }

        Ok(self.collections.get(collection).and_then(|docs| {
            docs.iter()
                .find(|doc| doc.get("$id").and_then(Value::as_str) == Some(id))
                .cloned()
        }))
    }
}

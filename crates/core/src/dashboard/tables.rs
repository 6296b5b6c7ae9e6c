use crate::config::CollectionIds;
use crate::dashboard::Dashboard;
use crate::store::query::{SortDirection, CREATED_AT};
use crate::store::DocumentQuery;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_TABLE_LIMIT: u32 = 100;
pub const MAX_TABLE_LIMIT: u32 = 1000;

/// Collections with a read-only table page in the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Users,
    Payments,
    Transactions,
    Packages,
    Feedback,
}

impl CollectionKind {
    pub fn collection_id(self, ids: &CollectionIds) -> &str {
        match self {
            CollectionKind::Users => &ids.users,
            CollectionKind::Payments => &ids.payments,
            CollectionKind::Transactions => &ids.transactions,
            CollectionKind::Packages => &ids.packages,
            CollectionKind::Feedback => &ids.feedback,
        }
    }
}

impl std::str::FromStr for CollectionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "users" => Ok(CollectionKind::Users),
            "payments" => Ok(CollectionKind::Payments),
            "transactions" => Ok(CollectionKind::Transactions),
            "packages" => Ok(CollectionKind::Packages),
            "feedback" => Ok(CollectionKind::Feedback),
            other => anyhow::bail!("unknown collection: {other}"),
        }
    }
}

impl Dashboard {
    /// Raw documents for a table page, ordered by creation time.
    pub async fn list_collection(
        &self,
        kind: CollectionKind,
        limit: Option<u32>,
        direction: SortDirection,
    ) -> anyhow::Result<Vec<Value>> {
        let limit = limit.unwrap_or(DEFAULT_TABLE_LIMIT).clamp(1, MAX_TABLE_LIMIT);
        let collection = kind.collection_id(&self.collections);
        let query = DocumentQuery::new().order_by(CREATED_AT, direction).limit(limit);

        tokio::time::timeout(self.timeout, self.store.list_documents(collection, &query))
            .await
            .with_context(|| format!("{kind:?} listing timed out"))?
            .with_context(|| format!("{kind:?} listing failed"))
    }
}

//! Read views behind the admin dashboard pages.

pub mod details;
pub mod feedback;
pub mod tables;

use crate::config::{CollectionIds, Settings};
use crate::store::DocumentStore;
use chrono::FixedOffset;
use std::sync::Arc;
use std::time::Duration;

pub use details::DayDetails;
pub use feedback::ReviewWithUser;
pub use tables::CollectionKind;

#[derive(Clone)]
pub struct Dashboard {
    store: Arc<dyn DocumentStore>,
    collections: CollectionIds,
    timeout: Duration,
    lookup_concurrency: usize,
    offset: FixedOffset,
}

impl Dashboard {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collections: CollectionIds,
        timeout: Duration,
        lookup_concurrency: usize,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            collections,
            timeout,
            lookup_concurrency,
            offset,
        }
    }

    pub fn from_settings(store: Arc<dyn DocumentStore>, settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self::new(
            store,
            settings.collections.clone(),
            settings.store_timeout(),
            settings.lookup_concurrency,
            settings.display_offset()?,
        ))
    }
}

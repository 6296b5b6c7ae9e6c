use crate::domain::records::{Feedback, PaymentStatus, Transaction};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

/// One calendar day's aggregated activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
    pub day: NaiveDate,
    /// `day` rendered for display (`dd/mm/YYYY`).
    pub date: String,
    pub revenue: f64,
    pub transactions: Vec<BucketTransaction>,
    pub reviews: Vec<Feedback>,
    pub growth_rate: f64,
}

impl DayBucket {
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            date: day.format(DISPLAY_DATE_FORMAT).to_string(),
            revenue: 0.0,
            transactions: Vec::new(),
            reviews: Vec::new(),
            growth_rate: 0.0,
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn review_count(&self) -> usize {
        self.reviews.len()
    }
}

/// A transaction tagged with the status of its linked payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub status: PaymentStatus,
}

/// Output order of a finished series. Charts read `Ascending`, tables `Descending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesOrder {
    #[default]
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

impl std::str::FromStr for SeriesOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SeriesOrder::Ascending),
            "desc" | "descending" => Ok(SeriesOrder::Descending),
            other => anyhow::bail!("invalid series order: {other} (expected asc|desc)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_revenue: f64,
    pub total_transactions: usize,
    pub total_reviews: usize,
}

impl FinancialSummary {
    pub fn from_buckets(buckets: &[DayBucket]) -> Self {
        Self {
            total_revenue: buckets.iter().map(|b| b.revenue).sum(),
            total_transactions: buckets.iter().map(DayBucket::transaction_count).sum(),
            total_reviews: buckets.iter().map(DayBucket::review_count).sum(),
        }
    }
}

/// Day-over-day revenue change in percent.
///
/// A zero previous day reports 100 for any positive current revenue and 0
/// otherwise, so the series never divides by zero.
pub fn growth_rate(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Fills `growth_rate` for buckets already sorted oldest-first. The first bucket gets 0.
pub fn apply_growth_rates(buckets: &mut [DayBucket]) {
    if let Some(first) = buckets.first_mut() {
        first.growth_rate = 0.0;
    }
    for i in 1..buckets.len() {
        let previous = buckets[i - 1].revenue;
        buckets[i].growth_rate = growth_rate(previous, buckets[i].revenue);
    }
}

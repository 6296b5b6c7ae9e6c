use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studyboard_core::domain::financial::{DayBucket, FinancialSummary, SeriesOrder};
use studyboard_core::financial::{FinancialAggregator, TimeWindow};
use studyboard_core::store::appwrite::AppwriteClient;

#[derive(Debug, Parser)]
#[command(name = "studyboard_report")]
struct Args {
    /// Trailing window in days, ending today (1..=366).
    #[arg(long, default_value_t = 7)]
    window: i64,

    /// Output order: asc (oldest first) or desc (newest first).
    #[arg(long, default_value = "asc")]
    order: String,

    /// Only print the totals.
    #[arg(long)]
    summary_only: bool,

    /// Pretty-print JSON output.
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = studyboard_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let window = TimeWindow::new(args.window)?;
    let order: SeriesOrder = args.order.parse()?;

    let client = Arc::new(AppwriteClient::from_settings(&settings)?);
    let aggregator = FinancialAggregator::from_settings(client, &settings)?;

    let buckets = match aggregator
        .aggregate_at(window, chrono::Utc::now(), order)
        .await
    {
        Ok(buckets) => buckets,
        Err(err) => {
            let err = anyhow::Error::new(err);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(window = window.days(), error = %err, "financial report failed");
            return Err(err);
        }
    };

    let summary = FinancialSummary::from_buckets(&buckets);
    tracing::info!(
        window = window.days(),
        total_revenue = summary.total_revenue,
        total_transactions = summary.total_transactions,
        total_reviews = summary.total_reviews,
        "financial report ready"
    );

    let out = render(&summary, &buckets, args.summary_only, args.pretty)?;
    println!("{out}");
    Ok(())
}

fn render(
    summary: &FinancialSummary,
    buckets: &[DayBucket],
    summary_only: bool,
    pretty: bool,
) -> anyhow::Result<String> {
    let value = if summary_only {
        serde_json::to_value(summary)
    } else {
        serde_json::to_value(serde_json::json!({
            "summary": summary,
            "buckets": buckets,
        }))
    }
    .context("failed to serialize report")?;

    let text = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .context("failed to render report")?;
    Ok(text)
}

fn init_sentry(settings: &studyboard_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_defaults() {
        let args = Args::parse_from(["studyboard_report"]);
        assert_eq!(args.window, 7);
        assert_eq!(args.order, "asc");
        assert!(!args.summary_only);
    }

    #[test]
    fn renders_summary_only() {
        let buckets = vec![DayBucket {
            revenue: 1500.0,
            ..DayBucket::empty(NaiveDate::from_ymd_opt(2026, 1, 27).unwrap())
        }];
        let summary = FinancialSummary::from_buckets(&buckets);

        let text = render(&summary, &buckets, true, false).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["totalRevenue"], 1500.0);
        assert_eq!(v["totalTransactions"], 0);
        assert!(v.get("buckets").is_none());

        let text = render(&summary, &buckets, false, true).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["buckets"][0]["date"], "27/01/2026");
        assert_eq!(v["buckets"][0]["growthRate"], 0.0);
    }
}

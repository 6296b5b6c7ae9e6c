use std::fmt;

#[derive(Debug)]
pub enum AggregateError {
    /// Window outside `TimeWindow::MIN_DAYS..=TimeWindow::MAX_DAYS`.
    InvalidWindow { days: i64 },
    /// A bulk fetch failed or timed out; no partial series is returned.
    Upstream(anyhow::Error),
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateError::InvalidWindow { days } => write!(
                f,
                "invalid window: {days} days (expected {}..={})",
                super::TimeWindow::MIN_DAYS,
                super::TimeWindow::MAX_DAYS
            ),
            AggregateError::Upstream(err) => write!(f, "failed to fetch financial data: {err:#}"),
        }
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AggregateError::InvalidWindow { .. } => None,
            AggregateError::Upstream(err) => Some(err.as_ref()),
        }
    }
}

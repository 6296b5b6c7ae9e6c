pub mod aggregate;
pub mod error;
pub mod status;
pub mod window;

pub use aggregate::{build_buckets, AggregatorOptions, FinancialAggregator};
pub use error::AggregateError;
pub use window::TimeWindow;

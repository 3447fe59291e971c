//! Metric aggregation: period rollups, daily workflow trends, and
//! cross-period trend math.

pub mod aggregator;
pub mod period;
pub mod trend;

pub use aggregator::{AggregationReport, MetricsAggregator};
pub use period::PeriodType;
pub use trend::MetricsTrend;

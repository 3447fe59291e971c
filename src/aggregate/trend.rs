//! Cross-period trend math.
//!
//! Trends compare the two most recent aggregation rows of the same type.
//! All figures are clamped so that low-volume periods cannot produce
//! chart-breaking outliers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::metrics_aggregation::Model as AggregationModel;

/// Period-over-period movement of the headline metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MetricsTrend {
    /// Relative change in execution count, percent, clamped to [-100, 500].
    pub execution_trend: f64,
    /// Success-rate movement in percentage points, clamped to [-100, 100].
    pub success_rate_trend: f64,
    /// Relative improvement in average execution time, percent; positive
    /// means faster. Clamped to [-100, 100].
    pub performance_trend: f64,
}

impl MetricsTrend {
    /// Compare two aggregation rows, `previous` before `current`.
    pub fn between(previous: &AggregationModel, current: &AggregationModel) -> Self {
        Self {
            execution_trend: execution_count_trend(
                previous.total_executions,
                current.total_executions,
            ),
            success_rate_trend: success_rate_trend(previous.success_rate, current.success_rate),
            performance_trend: performance_trend(
                previous.avg_execution_time_ms,
                current.avg_execution_time_ms,
            ),
        }
    }
}

/// Relative change in execution count.
///
/// Going from nothing to something is +100%, not infinity; going to nothing
/// is -100%. Everything else is standard percentage change clamped to
/// [-100, 500].
pub fn execution_count_trend(previous: i64, current: i64) -> f64 {
    match (previous, current) {
        (0, 0) => 0.0,
        (0, _) => 100.0,
        (_, 0) => -100.0,
        (prev, cur) => {
            let change = (cur - prev) as f64 / prev as f64 * 100.0;
            change.clamp(-100.0, 500.0)
        }
    }
}

/// Success-rate movement as a percentage-point difference, not a relative
/// percentage.
pub fn success_rate_trend(previous: f64, current: f64) -> f64 {
    (current - previous).clamp(-100.0, 100.0)
}

/// Relative improvement in average execution time; positive means faster.
pub fn performance_trend(previous: Option<f64>, current: Option<f64>) -> f64 {
    match (previous, current) {
        (Some(prev), Some(cur)) if prev > 0.0 => {
            ((prev - cur) / prev * 100.0).clamp(-100.0, 100.0)
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_to_some_is_plus_hundred() {
        assert_eq!(execution_count_trend(0, 40), 100.0);
    }

    #[test]
    fn some_to_zero_is_minus_hundred() {
        assert_eq!(execution_count_trend(40, 0), -100.0);
    }

    #[test]
    fn zero_to_zero_is_flat() {
        assert_eq!(execution_count_trend(0, 0), 0.0);
    }

    #[test]
    fn execution_trend_is_clamped() {
        // 10 -> 1000 would be +9900%.
        assert_eq!(execution_count_trend(10, 1000), 500.0);
        assert_eq!(execution_count_trend(10, 15), 50.0);
    }

    #[test]
    fn success_rate_trend_is_point_delta() {
        assert_eq!(success_rate_trend(80.0, 95.0), 15.0);
        assert_eq!(success_rate_trend(95.0, 80.0), -15.0);
    }

    #[test]
    fn performance_trend_positive_means_faster() {
        assert_eq!(performance_trend(Some(200.0), Some(100.0)), 50.0);
        assert!(performance_trend(Some(100.0), Some(200.0)) < 0.0);
        assert_eq!(performance_trend(None, Some(100.0)), 0.0);
        assert_eq!(performance_trend(Some(0.0), Some(100.0)), 0.0);
    }

    #[test]
    fn performance_trend_is_clamped() {
        // 100ms -> 500ms is -400% relative, clamped.
        assert_eq!(performance_trend(Some(100.0), Some(500.0)), -100.0);
    }
}

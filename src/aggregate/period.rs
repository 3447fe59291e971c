//! Aggregation period types and their UTC boundaries.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Granularity of an aggregation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
        }
    }

    /// Inclusive `[start, end]` boundaries of the period containing `date`.
    ///
    /// Weekly periods start on Monday; monthly periods on the first of the
    /// month. The end boundary is the last microsecond of the period so that
    /// inclusive range queries never capture the next period's midnight.
    pub fn bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let period_start_date = match self {
            PeriodType::Daily => date,
            PeriodType::Weekly => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            PeriodType::Monthly => date.with_day(1).unwrap_or(date),
        };

        let next_start_date = match self {
            PeriodType::Daily => period_start_date + Duration::days(1),
            PeriodType::Weekly => period_start_date + Duration::days(7),
            PeriodType::Monthly => {
                let (year, month) = if period_start_date.month() == 12 {
                    (period_start_date.year() + 1, 1)
                } else {
                    (period_start_date.year(), period_start_date.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)
                    .unwrap_or(period_start_date + Duration::days(31))
            }
        };

        let start = Utc.from_utc_datetime(&period_start_date.and_hms_opt(0, 0, 0).unwrap());
        let end = Utc.from_utc_datetime(&next_start_date.and_hms_opt(0, 0, 0).unwrap())
            - Duration::microseconds(1);
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_bounds_cover_one_day() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let (start, end) = PeriodType::Daily.bounds(date);
        assert_eq!(start.to_rfc3339(), "2026-01-15T00:00:00+00:00");
        assert!(end < start + Duration::days(1));
        assert!(end > start + Duration::hours(23));
    }

    #[test]
    fn weekly_bounds_start_on_monday() {
        // 2026-01-15 is a Thursday.
        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let (start, _) = PeriodType::Weekly.bounds(date);
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2026, 1, 12).unwrap());
    }

    #[test]
    fn monthly_bounds_handle_year_rollover() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 20).unwrap();
        let (start, end) = PeriodType::Monthly.bounds(date);
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }
}

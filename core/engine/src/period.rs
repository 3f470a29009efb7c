use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeDelta, Utc};
use worklog_schemas::SummaryType;

use crate::error::{EngineError, EngineResult};

/// Inclusive calendar span covered by one summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub summary_type: SummaryType,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn day(date: NaiveDate) -> Self {
        Self {
            summary_type: SummaryType::Daily,
            start: date,
            end: date,
        }
    }

    pub fn week(start: NaiveDate) -> EngineResult<Self> {
        let end = start
            .checked_add_days(Days::new(6))
            .ok_or_else(|| EngineError::InvalidPeriod(format!("week starting {} overflows", start)))?;
        Ok(Self {
            summary_type: SummaryType::Weekly,
            start,
            end,
        })
    }

    pub fn month(year: i32, month: u32) -> EngineResult<Self> {
        let invalid = || EngineError::InvalidPeriod(format!("{}-{:02} is not a month", year, month));
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        let end = next.and_then(|d| d.pred_opt()).ok_or_else(invalid)?;
        Ok(Self {
            summary_type: SummaryType::Monthly,
            start,
            end,
        })
    }

    pub fn year(year: i32) -> EngineResult<Self> {
        let invalid = || EngineError::InvalidPeriod(format!("{} is out of range", year));
        Ok(Self {
            summary_type: SummaryType::Yearly,
            start: NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(invalid)?,
        })
    }

    /// Period of the given type anchored at `anchor`
    pub fn anchored(summary_type: SummaryType, anchor: NaiveDate) -> EngineResult<Self> {
        match summary_type {
            SummaryType::Daily => Ok(Self::day(anchor)),
            SummaryType::Weekly => Self::week(anchor),
            SummaryType::Monthly => Self::month(anchor.year(), anchor.month()),
            SummaryType::Yearly => Self::year(anchor.year()),
        }
    }

    /// Summary type rolled up into this one; daily summaries come from
    /// raw source data instead.
    pub fn child_type(&self) -> Option<SummaryType> {
        match self.summary_type {
            SummaryType::Daily => None,
            SummaryType::Weekly | SummaryType::Monthly => Some(SummaryType::Daily),
            SummaryType::Yearly => Some(SummaryType::Monthly),
        }
    }

    /// `[start 00:00:00, end 23:59:59.999999999]` in UTC
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        day_bounds(self.start, self.end)
    }
}

/// Inclusive bounds covering every instant of the days `start..=end`,
/// sub-second timestamps in the last second included.
pub fn day_bounds(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = start.and_time(NaiveTime::MIN).and_utc();
    let to = end.and_time(NaiveTime::MIN).and_utc() + TimeDelta::days(1) - TimeDelta::nanoseconds(1);
    (from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_bounds_are_inclusive() {
        let (start, end) = Period::day(date(2024, 3, 1)).bounds();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap() + TimeDelta::nanoseconds(999_999_999));
    }

    #[test]
    fn test_last_fraction_of_the_day_is_inside() {
        let (start, end) = Period::day(date(2024, 3, 1)).bounds();
        let late = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap() + TimeDelta::milliseconds(500);
        let next_day = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        assert!(late >= start && late <= end);
        assert!(next_day > end);
    }

    #[test]
    fn test_week_spans_seven_days() {
        let week = Period::week(date(2024, 2, 26)).unwrap();
        assert_eq!(week.end, date(2024, 3, 3));
        assert_eq!(week.child_type(), Some(SummaryType::Daily));
    }

    #[test]
    fn test_month_handles_leap_year_and_december() {
        assert_eq!(Period::month(2024, 2).unwrap().end, date(2024, 2, 29));
        assert_eq!(Period::month(2023, 12).unwrap().end, date(2023, 12, 31));
        assert!(matches!(Period::month(2024, 13), Err(EngineError::InvalidPeriod(_))));
    }

    #[test]
    fn test_year_rolls_up_months() {
        let year = Period::year(2024).unwrap();
        assert_eq!(year.start, date(2024, 1, 1));
        assert_eq!(year.end, date(2024, 12, 31));
        assert_eq!(year.child_type(), Some(SummaryType::Monthly));
    }

    #[test]
    fn test_anchored_normalises_to_period_start() {
        let month = Period::anchored(SummaryType::Monthly, date(2024, 3, 17)).unwrap();
        assert_eq!(month.start, date(2024, 3, 1));
        assert_eq!(Period::anchored(SummaryType::Daily, date(2024, 3, 17)).unwrap().child_type(), None);
    }
}

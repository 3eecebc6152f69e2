//! Inclusive calendar date bounds for price queries.

use crate::domain::error::RiskError;
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(input: &str) -> Result<NaiveDate, RiskError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| {
        RiskError::invalid_parameter(
            "date",
            format!("invalid date format: {input}. Use YYYY-MM-DD"),
        )
    })
}

/// Optional inclusive bounds; an open side is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, RiskError> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(RiskError::invalid_parameter(
                    "date_range",
                    format!("start {s} is after end {e}"),
                ));
            }
        }
        Ok(Self { start, end })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, RiskError> {
        let start = start.map(parse_date).transpose()?;
        let end = end.map(parse_date).transpose()?;
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(d("2024-02-29"), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert!(matches!(
            parse_date("2024/01/01"),
            Err(RiskError::InvalidParameter { .. })
        ));
        assert!(parse_date("2023-02-29").is_err());
    }

    #[test]
    fn bounds_are_inclusive() {
        let range = DateRange::parse(Some("2024-01-02"), Some("2024-01-04")).unwrap();
        assert!(!range.contains(d("2024-01-01")));
        assert!(range.contains(d("2024-01-02")));
        assert!(range.contains(d("2024-01-04")));
        assert!(!range.contains(d("2024-01-05")));
    }

    #[test]
    fn open_sides_are_unbounded() {
        let range = DateRange::parse(None, Some("2024-01-04")).unwrap();
        assert!(range.contains(d("1990-01-01")));
        assert!(DateRange::unbounded().contains(d("2100-12-31")));
    }

    #[test]
    fn reversed_bounds_are_invalid() {
        assert!(DateRange::parse(Some("2024-02-01"), Some("2024-01-01")).is_err());
    }
}

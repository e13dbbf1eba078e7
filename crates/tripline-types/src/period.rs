//! Month-scoped periods within the target year.

use chrono::NaiveDate;

use crate::calendar;

/// Error returned when a period number falls outside 1..=12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("period must be between 1 and 12, got {0}")]
pub struct InvalidPeriod(pub u32);

/// One month of the target year. `Option<Period>` denotes the whole year
/// wherever a broader scope is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(u8);

impl Period {
    pub const JANUARY: Period = Period(1);
    pub const DECEMBER: Period = Period(12);

    /// Construct a period from a month number.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPeriod`] when `number` is outside 1..=12.
    pub fn new(number: u32) -> Result<Self, InvalidPeriod> {
        if (1..=12).contains(&number) {
            #[allow(clippy::cast_possible_truncation)]
            Ok(Self(number as u8))
        } else {
            Err(InvalidPeriod(number))
        }
    }

    /// Month number, 1..=12.
    pub fn number(self) -> u8 {
        self.0
    }

    /// The following month, or `None` after December.
    pub fn next(self) -> Option<Period> {
        if self.0 == 12 {
            None
        } else {
            Some(Period(self.0 + 1))
        }
    }

    /// All twelve periods in calendar order.
    pub fn all() -> impl Iterator<Item = Period> {
        (1..=12).map(Period)
    }

    /// Month name, e.g. `"January"`.
    pub fn name(self) -> &'static str {
        calendar::month_name(self)
    }

    /// Half-open date bounds of this month in `year`: the first day of the
    /// month up to (excluding) the first day of the following month.
    pub fn bounds(self, year: i32) -> (NaiveDate, NaiveDate) {
        let start = NaiveDate::from_ymd_opt(year, u32::from(self.0), 1)
            .expect("month number is always a valid month");
        let end = match self.next() {
            Some(next) => NaiveDate::from_ymd_opt(year, u32::from(next.0), 1),
            None => NaiveDate::from_ymd_opt(year + 1, 1, 1),
        }
        .expect("month number is always a valid month");
        (start, end)
    }

    /// Human-readable inclusive date range, e.g. `"2024-03-01 to 2024-03-31"`.
    pub fn date_range_label(self, year: i32) -> String {
        let (start, end) = self.bounds(year);
        let last_day = end.pred_opt().expect("month end is never the minimum date");
        format!("{start} to {last_day}")
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Half-open SQL date bounds covering the whole target year.
pub fn year_bounds(year: i32) -> (String, String) {
    (format!("{year}-01-01"), format!("{}-01-01", year + 1))
}

/// Human-readable inclusive date range for the whole year.
pub fn year_range_label(year: i32) -> String {
    format!("{year}-01-01 to {year}-12-31")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_valid_months() {
        for n in 1..=12 {
            assert_eq!(Period::new(n).unwrap().number(), n as u8);
        }
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert_eq!(Period::new(0), Err(InvalidPeriod(0)));
        assert_eq!(Period::new(13), Err(InvalidPeriod(13)));
    }

    #[test]
    fn test_next_progression() {
        assert_eq!(Period::new(5).unwrap().next(), Some(Period::new(6).unwrap()));
        assert_eq!(Period::JANUARY.next(), Some(Period::new(2).unwrap()));
        assert_eq!(Period::DECEMBER.next(), None);
    }

    #[test]
    fn test_all_yields_twelve_in_order() {
        let periods: Vec<u8> = Period::all().map(Period::number).collect();
        assert_eq!(periods, (1..=12).collect::<Vec<u8>>());
    }

    #[test]
    fn test_bounds_mid_year() {
        let (start, end) = Period::new(3).unwrap().bounds(2024);
        assert_eq!(start.to_string(), "2024-03-01");
        assert_eq!(end.to_string(), "2024-04-01");
    }

    #[test]
    fn test_bounds_december_rolls_into_next_year() {
        let (start, end) = Period::DECEMBER.bounds(2024);
        assert_eq!(start.to_string(), "2024-12-01");
        assert_eq!(end.to_string(), "2025-01-01");
    }

    #[test]
    fn test_date_range_label_leap_february() {
        let label = Period::new(2).unwrap().date_range_label(2024);
        assert_eq!(label, "2024-02-01 to 2024-02-29");
    }

    #[test]
    fn test_year_bounds_and_label() {
        let (start, end) = year_bounds(2024);
        assert_eq!(start, "2024-01-01");
        assert_eq!(end, "2025-01-01");
        assert_eq!(year_range_label(2024), "2024-01-01 to 2024-12-31");
    }

    #[test]
    fn test_display_uses_month_name() {
        assert_eq!(Period::new(7).unwrap().to_string(), "July");
    }
}

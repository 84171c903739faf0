//! Monthly billing periods (`YYYY-MM`)

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Period parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid period '{0}', expected YYYY-MM")]
pub struct PeriodError(pub String);

/// A calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Build from year and month (1-12)
    ///
    /// # Errors
    /// When the month is out of range
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) || !(1900..=9999).contains(&year) {
            return Err(PeriodError(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    /// Month containing `date`
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Year
    #[inline]
    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month (1-12)
    #[inline]
    #[must_use]
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Following month
    #[must_use]
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Number of days in this month
    #[must_use]
    pub fn days(&self) -> u32 {
        let next = self.next();
        match (
            NaiveDate::from_ymd_opt(self.year, self.month, 1),
            NaiveDate::from_ymd_opt(next.year, next.month, 1),
        ) {
            (Some(start), Some(end)) => u32::try_from((end - start).num_days()).unwrap_or(28),
            _ => 28,
        }
    }

    /// First day of the month
    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        self.day_clamped(1)
    }

    /// The given day of this month, clamped to its length
    ///
    /// Day 31 in February yields the 28th (or 29th).
    #[must_use]
    pub fn day_clamped(&self, day: u32) -> NaiveDate {
        let day = day.clamp(1, self.days());
        NaiveDate::from_ymd_opt(self.year, self.month, day).unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| PeriodError(trimmed.to_string()))?;
        let year: i32 = year.parse().map_err(|_| PeriodError(trimmed.to_string()))?;
        let month: u32 = month.parse().map_err(|_| PeriodError(trimmed.to_string()))?;
        Self::new(year, month).map_err(|_| PeriodError(trimmed.to_string()))
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_and_display() {
        let p: Period = "2024-03".parse().unwrap();
        assert_eq!(p.year(), 2024);
        assert_eq!(p.month(), 3);
        assert_eq!(p.to_string(), "2024-03");
        assert!("2024-13".parse::<Period>().is_err());
        assert!("marzo".parse::<Period>().is_err());
    }

    #[test]
    fn next_wraps_year() {
        let p = Period::new(2024, 12).unwrap().next();
        assert_eq!(p, Period::new(2025, 1).unwrap());
    }

    #[test]
    fn clamps_to_month_length() {
        assert_eq!(Period::new(2024, 2).unwrap().day_clamped(31), date(2024, 2, 29));
        assert_eq!(Period::new(2023, 2).unwrap().day_clamped(30), date(2023, 2, 28));
        assert_eq!(Period::new(2024, 4).unwrap().day_clamped(31), date(2024, 4, 30));
        assert_eq!(Period::new(2024, 5).unwrap().day_clamped(5), date(2024, 5, 5));
    }
}

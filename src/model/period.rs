use anyhow::{bail, Context};
use chrono::{DateTime, Datelike, Local, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const MONTHS_ID: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// A calendar month used to filter reports, written as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> crate::Result<Self> {
        if !(1..=12).contains(&month) {
            bail!("Month must be between 1 and 12, got {month}");
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// True if `timestamp` falls in this month in local time.
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        let local = timestamp.with_timezone(&Local);
        local.year() == self.year && local.month() == self.month
    }

    /// The month written out in Indonesian, e.g. `Oktober 2026`.
    pub fn label(&self) -> String {
        format!("{} {}", MONTHS_ID[(self.month - 1) as usize], self.year)
    }
}

impl FromStr for YearMonth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .with_context(|| format!("Expected a month like 2025-03, got '{s}'"))?;
        let year = year
            .parse::<i32>()
            .with_context(|| format!("Invalid year in '{s}'"))?;
        let month = month
            .parse::<u32>()
            .with_context(|| format!("Invalid month in '{s}'"))?;
        YearMonth::new(year, month)
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        YearMonth::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_and_display() {
        let ym = YearMonth::from_str("2025-3").unwrap();
        assert_eq!(ym.year(), 2025);
        assert_eq!(ym.month(), 3);
        assert_eq!(ym.to_string(), "2025-03");
        assert_eq!(ym.label(), "Maret 2025");
    }

    #[test]
    fn test_parse_errors() {
        assert!(YearMonth::from_str("2025").is_err());
        assert!(YearMonth::from_str("2025-13").is_err());
        assert!(YearMonth::from_str("abcd-01").is_err());
    }

    #[test]
    fn test_contains_mid_month() {
        let ym = YearMonth::new(2025, 10).unwrap();
        let inside = Utc.with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(2025, 11, 15, 12, 0, 0).unwrap();
        assert!(ym.contains(&inside));
        assert!(!ym.contains(&outside));
    }
}

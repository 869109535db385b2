use chrono::{Datelike, Months, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("invalid period '{0}': expected YYYY-MM")]
    Format(String),
    #[error("invalid month {1} in period '{0}'")]
    Month(String, u32),
}

/// Monthly fiscal reporting window (e.g. "2025-04").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::Month(format!("{year:04}-{month:02}"), month));
        }
        Ok(Period { year, month })
    }

    /// Period containing the given date
    pub fn from_date(date: NaiveDate) -> Self {
        Period {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The immediately preceding period
    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Period {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Period {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Period {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Period {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("month validated on construction")
    }

    /// Last calendar day, used as the assessment date of the period
    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day().pred_opt().expect("not the first representable date")
    }
}

/// Whole calendar months elapsed from `from` to `to`; zero if `to` precedes `from`.
///
/// A month only counts once the day-of-month has been reached, clamped to the
/// end of shorter months (31 Jan -> 28 Feb counts as one month).
pub fn whole_months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if to <= from {
        return 0;
    }
    let raw = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    let mut months = raw.max(0) as u32;
    while months > 0 {
        match from.checked_add_months(Months::new(months)) {
            Some(anniversary) if anniversary <= to => break,
            _ => months -= 1,
        }
    }
    months
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| PeriodError::Format(s.to_string()))?;
        if year.len() != 4 || month.len() != 2 {
            return Err(PeriodError::Format(s.to_string()));
        }
        let year: i32 = year.parse().map_err(|_| PeriodError::Format(s.to_string()))?;
        let month: u32 = month.parse().map_err(|_| PeriodError::Format(s.to_string()))?;
        if !(1..=12).contains(&month) {
            return Err(PeriodError::Month(s.to_string(), month));
        }
        Ok(Period { year, month })
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for Period {
    fn schema_name() -> String {
        "Period".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

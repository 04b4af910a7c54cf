//! Per-column value preparation for batch rows.
//!
//! Columns whose key mentions `date` get today's date when left empty;
//! columns whose key mentions `name` are rewritten in the chosen name style.

use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// How generated dates are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFormat {
    /// `03/05/2024`
    #[default]
    MdySlash,
    /// `March 5, 2024`
    MonthDYyyy,
    /// `2024-03-05`
    Iso,
}

impl DateFormat {
    pub fn format(&self, date: NaiveDate) -> String {
        let pattern = match self {
            DateFormat::MdySlash => "%m/%d/%Y",
            DateFormat::MonthDYyyy => "%B %-d, %Y",
            DateFormat::Iso => "%Y-%m-%d",
        };
        date.format(pattern).to_string()
    }
}

impl FromStr for DateFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mdy_slash" => Ok(DateFormat::MdySlash),
            "month_d_yyyy" => Ok(DateFormat::MonthDYyyy),
            "iso" => Ok(DateFormat::Iso),
            other => Err(format!(
                "unknown date format '{}' (expected mdy_slash, month_d_yyyy or iso)",
                other
            )),
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DateFormat::MdySlash => "mdy_slash",
            DateFormat::MonthDYyyy => "month_d_yyyy",
            DateFormat::Iso => "iso",
        })
    }
}

/// How person names are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameFormat {
    /// As given: `Ada Lovelace`
    #[default]
    FirstLast,
    /// `Lovelace, Ada`
    LastFirst,
    /// `Ms. Lovelace`, or `Mr./Ms. Lovelace` without a title
    MrMsLast,
}

const TITLES: &[&str] = &["mr", "ms", "mrs", "dr"];

impl NameFormat {
    pub fn format(&self, raw: &str) -> String {
        let raw = raw.trim();
        let parts: Vec<&str> = raw.split_whitespace().collect();
        let (Some(first), Some(last)) = (parts.first(), parts.last()) else {
            return String::new();
        };
        match self {
            NameFormat::FirstLast => raw.to_string(),
            NameFormat::LastFirst if parts.len() >= 2 => {
                format!("{}, {}", last, parts[..parts.len() - 1].join(" "))
            }
            NameFormat::LastFirst => raw.to_string(),
            NameFormat::MrMsLast => {
                let title = first.to_lowercase();
                if TITLES.contains(&title.trim_end_matches('.')) {
                    format!("{} {}", first, last)
                } else {
                    format!("Mr./Ms. {}", last)
                }
            }
        }
    }
}

impl FromStr for NameFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_last" => Ok(NameFormat::FirstLast),
            "last_first" => Ok(NameFormat::LastFirst),
            "mrms_last" => Ok(NameFormat::MrMsLast),
            other => Err(format!(
                "unknown name format '{}' (expected first_last, last_first or mrms_last)",
                other
            )),
        }
    }
}

impl fmt::Display for NameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NameFormat::FirstLast => "first_last",
            NameFormat::LastFirst => "last_first",
            NameFormat::MrMsLast => "mrms_last",
        })
    }
}

/// Formatting applied to every batch row before filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFormats {
    pub date: DateFormat,
    pub name: NameFormat,
    /// Date written into empty date columns.
    pub today: NaiveDate,
}

impl FieldFormats {
    /// Formats using the local calendar date.
    pub fn new(date: DateFormat, name: NameFormat) -> Self {
        Self {
            date,
            name,
            today: Local::now().date_naive(),
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Rewrite `values` in place, choosing the treatment by key name.
    pub fn apply(&self, values: &mut HashMap<String, String>) {
        for (key, value) in values.iter_mut() {
            let key = key.to_lowercase();
            if key.contains("date") && value.trim().is_empty() {
                *value = self.date.format(self.today);
            }
            if key.contains("name") {
                *value = self.name.format(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(DateFormat::MdySlash.format(day()), "03/05/2024");
        assert_eq!(DateFormat::MonthDYyyy.format(day()), "March 5, 2024");
        assert_eq!(DateFormat::Iso.format(day()), "2024-03-05");
        let late = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
        assert_eq!(DateFormat::MonthDYyyy.format(late), "December 25, 2024");
    }

    #[test]
    fn test_name_formats() {
        assert_eq!(NameFormat::FirstLast.format("  Ada Lovelace "), "Ada Lovelace");
        assert_eq!(NameFormat::LastFirst.format("Ada King Lovelace"), "Lovelace, Ada King");
        assert_eq!(NameFormat::LastFirst.format("Ada"), "Ada");
        assert_eq!(NameFormat::MrMsLast.format("Dr. Grace Hopper"), "Dr. Hopper");
        assert_eq!(NameFormat::MrMsLast.format("ms Lovelace"), "ms Lovelace");
        assert_eq!(NameFormat::MrMsLast.format("Grace Hopper"), "Mr./Ms. Hopper");
        assert_eq!(NameFormat::MrMsLast.format("   "), "");
    }

    #[test]
    fn test_parse_format_keys() {
        assert_eq!("iso".parse::<DateFormat>(), Ok(DateFormat::Iso));
        assert_eq!("mrms_last".parse::<NameFormat>(), Ok(NameFormat::MrMsLast));
        assert!("dmy".parse::<DateFormat>().is_err());
        assert_eq!(NameFormat::LastFirst.to_string(), "last_first");
        assert_eq!(DateFormat::MonthDYyyy.to_string(), "month_d_yyyy");
    }

    #[test]
    fn test_apply_by_column_name() {
        let formats = FieldFormats::new(DateFormat::Iso, NameFormat::LastFirst).with_today(day());
        let mut values: HashMap<String, String> = [
            ("Submittal_Date", ""),
            ("Due_Date", "04/01/2024"),
            ("Reviewer_Name", "Grace Hopper"),
            ("Sub_No", "S-1"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        formats.apply(&mut values);
        assert_eq!(values["Submittal_Date"], "2024-03-05");
        assert_eq!(values["Due_Date"], "04/01/2024");
        assert_eq!(values["Reviewer_Name"], "Hopper, Grace");
        assert_eq!(values["Sub_No"], "S-1");
    }
}

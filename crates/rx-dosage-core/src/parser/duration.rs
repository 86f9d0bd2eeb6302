//! Duration clause parsing.
//!
//! Accepts an optional separator (`x`, `*`, `/`, `for`) followed by one of:
//! `N days`, `N day`, `Nd`, bare `N`, `N/7` or `N week(s)`. Trailing
//! punctuation is ignored.

use regex::Regex;
use thiserror::Error;

/// Why a duration clause was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("Could not parse duration: '{0}'. Try 'x 5 days', '5d', or just '5'")]
    Unparseable(String),

    #[error("Duration must be a positive number of days")]
    NotPositive,

    #[error("Duration must be a whole number of days, got '{0}'")]
    NotWholeDays(String),

    #[error("Duration cannot exceed {0} days")]
    TooLong(u32),
}

/// A parsed duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duration {
    /// Display form ("5 days", "2 weeks")
    pub display: String,
    /// Length in days
    pub days: u32,
}

const SEPARATOR: &str = r"(?:[x*/]\s*|for\s+)?";
const SIGNED_NUMBER: &str = r"([-+]?[0-9]+(?:\.[0-9]+)?)";

/// Duration clause parser.
pub struct DurationParser {
    week_notation: Regex,
    weeks: Regex,
    days: Regex,
    trailing_punctuation: Regex,
    max_days: u32,
}

impl DurationParser {
    /// Create a parser that rejects durations longer than `max_days`.
    pub fn new(max_days: u32) -> Self {
        Self {
            week_notation: compile(&format!(r"^{SEPARATOR}{SIGNED_NUMBER}\s*/\s*7$")),
            weeks: compile(&format!(r"^{SEPARATOR}{SIGNED_NUMBER}\s*weeks?$")),
            days: compile(&format!(r"^{SEPARATOR}{SIGNED_NUMBER}\s*(?:days?|d)?$")),
            trailing_punctuation: compile(r"[.,;:!?]+$"),
            max_days,
        }
    }

    /// Longest accepted duration in days.
    pub fn max_days(&self) -> u32 {
        self.max_days
    }

    /// Parse a duration clause.
    pub fn parse(&self, clause: &str) -> Result<Duration, DurationError> {
        let trimmed = clause.trim();
        let cleaned = self.trailing_punctuation.replace(trimmed, "");
        let cleaned = cleaned.trim();

        // N/7 first, so "7/7" is not read as a "/" separator followed by 7
        if let Some(caps) = self.week_notation.captures(cleaned) {
            let days = self.whole_days(&caps[1], 1)?;
            return Ok(Duration {
                display: plural(days, "day"),
                days,
            });
        }

        if let Some(caps) = self.weeks.captures(cleaned) {
            let days = self.whole_days(&caps[1], 7)?;
            return Ok(Duration {
                display: plural(days / 7, "week"),
                days,
            });
        }

        if let Some(caps) = self.days.captures(cleaned) {
            let days = self.whole_days(&caps[1], 1)?;
            return Ok(Duration {
                display: plural(days, "day"),
                days,
            });
        }

        Err(DurationError::Unparseable(trimmed.to_string()))
    }

    /// Convert a captured count into days, enforcing positivity and range.
    fn whole_days(&self, raw: &str, days_per_unit: u64) -> Result<u32, DurationError> {
        if raw.starts_with('-') {
            return Err(DurationError::NotPositive);
        }
        let raw = raw.trim_start_matches('+');

        let count = match raw.split_once('.') {
            Some((whole, fraction)) => {
                if fraction.chars().any(|c| c != '0') {
                    return Err(DurationError::NotWholeDays(raw.to_string()));
                }
                whole
            }
            None => raw,
        };

        // ASCII digits only at this point; a parse failure means the value overflowed
        let count: u64 = count
            .parse()
            .map_err(|_| DurationError::TooLong(self.max_days))?;
        if count == 0 {
            return Err(DurationError::NotPositive);
        }

        let days = count.saturating_mul(days_per_unit);
        if days > u64::from(self.max_days) {
            return Err(DurationError::TooLong(self.max_days));
        }
        Ok(days as u32)
    }
}

fn plural(count: u32, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Compile a case-insensitive pattern known at build time.
pub(crate) fn compile(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("static pattern must compile")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> DurationParser {
        DurationParser::new(365)
    }

    #[test]
    fn test_day_formats() {
        let p = parser();
        for (input, expected) in [
            ("x 5 days", 5),
            ("x 1 day", 1),
            ("* 5", 5),
            ("/ 5d", 5),
            ("for 5", 5),
            ("5 days", 5),
            ("5d", 5),
            ("5", 5),
            ("X 10 DAYS", 10),
            ("x 5 days.", 5),
            ("30 days!", 30),
        ] {
            assert_eq!(p.parse(input).unwrap().days, expected, "input: {input}");
        }
    }

    #[test]
    fn test_week_notation() {
        let p = parser();
        let duration = p.parse("7/7").unwrap();
        assert_eq!(duration.days, 7);
        assert_eq!(duration.display, "7 days");

        assert_eq!(p.parse("x 5/7").unwrap().days, 5);
    }

    #[test]
    fn test_weeks() {
        let p = parser();
        let duration = p.parse("x 2 weeks").unwrap();
        assert_eq!(duration.days, 14);
        assert_eq!(duration.display, "2 weeks");

        let duration = p.parse("1 week").unwrap();
        assert_eq!(duration.days, 7);
        assert_eq!(duration.display, "1 week");
    }

    #[test]
    fn test_display_pluralisation() {
        let p = parser();
        assert_eq!(p.parse("x 1 days").unwrap().display, "1 day");
        assert_eq!(p.parse("x 5 days").unwrap().display, "5 days");
    }

    #[test]
    fn test_zero_and_negative() {
        let p = parser();
        assert_eq!(p.parse("x 0 days"), Err(DurationError::NotPositive));
        assert_eq!(p.parse("x -5 days"), Err(DurationError::NotPositive));
        assert_eq!(p.parse("0 weeks"), Err(DurationError::NotPositive));
    }

    #[test]
    fn test_non_integer() {
        let p = parser();
        assert_eq!(
            p.parse("x 2.5 days"),
            Err(DurationError::NotWholeDays("2.5".into()))
        );
        assert_eq!(p.parse("x 3.0 days").unwrap().days, 3);
    }

    #[test]
    fn test_too_long() {
        let p = DurationParser::new(30);
        assert_eq!(p.parse("x 31 days"), Err(DurationError::TooLong(30)));
        assert_eq!(p.parse("x 5 weeks"), Err(DurationError::TooLong(30)));
        assert_eq!(
            p.parse("x 99999999999999999999 days"),
            Err(DurationError::TooLong(30))
        );
    }

    #[test]
    fn test_unparseable() {
        let p = parser();
        assert!(matches!(p.parse("a while"), Err(DurationError::Unparseable(_))));
        assert!(matches!(p.parse(""), Err(DurationError::Unparseable(_))));
    }

    #[test]
    fn test_non_ascii_digits_unparseable() {
        let p = parser();
        assert_eq!(
            p.parse("x ５ days"),
            Err(DurationError::Unparseable("x ５ days".into()))
        );
        assert!(matches!(p.parse("x ٣ days"), Err(DurationError::Unparseable(_))));
    }
}

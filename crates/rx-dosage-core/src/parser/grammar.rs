//! Schedule-shape grammar.
//!
//! Core shapes, in match order:
//! - Taper: `4-3-2-1 taper` (optional duration override)
//! - Split dose: `1-0-1 x 30 days`
//! - STAT: `2 STAT`, `2 tabs STAT`, `STAT`
//! - PRN: `2 PRN`, `2 PRN max 8/24h x 7 days`
//! - Standard: `2 BD x 5 days`, `5ml TDS x 7/7`, `1 OD for 2 weeks`
//!
//! Extended shapes (opt-in): topical tube counts, patch change intervals,
//! the injectable `0-12-24H` schedule and custom hour lists.
//!
//! Once a shape matches, the grammar commits to it: a bad duration or dose
//! inside a matched shape is reported against that shape, never retried as
//! another one.

use regex::Regex;

use super::duration::{compile, DurationParser};
use crate::config::ParserConfig;
use crate::models::{
    DrugForm, FrequencyCode, ParseResult, Schedule, SchedulePattern, ScheduleType,
};

const NUMBER: &str = r"[0-9]+(?:\.[0-9]+)?";
const COUNT_UNIT: &str = r"tablets?|tabs?|capsules?|caps?|ml";
const DOSE_UNIT: &str = r"ml|mg|tablets?|tabs?|capsules?|caps?";
const FREQUENCY: &str = r"OD|BD|BID|TDS|TID|QDS|QID|Q6H|Q8H|Q12H";

pub(crate) const MISSING_DURATION: &str = "Could not find duration. Add \"x N days\" or \"x N/7\"";
pub(crate) const ZERO_DOSE: &str = "Dose must be greater than zero";
pub(crate) const TOO_LARGE: &str = "Quantity is too large to dispense";

/// Outcome of matching input against the grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Fully parsed schedule
    Matched(Schedule),
    /// A shape matched but its contents were invalid
    Rejected(ParseResult),
}

/// Compiled schedule grammar.
pub struct Grammar {
    durations: DurationParser,
    split_dose_requires_duration: bool,
    extended: bool,
    dash_sequence: Regex,
    taper: Regex,
    stat: Regex,
    prn_max: Regex,
    prn: Regex,
    standard: Regex,
    topical: Regex,
    patch: Regex,
    injectable: Regex,
    custom_hours: Regex,
    custom_at: Regex,
    custom_hrs: Regex,
}

impl Grammar {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            durations: DurationParser::new(config.max_duration_days),
            split_dose_requires_duration: config.split_dose_requires_duration,
            extended: config.extended_schedules,
            dash_sequence: compile(&format!(r"^({NUMBER}(?:-{NUMBER})+)\s*(.*)$")),
            taper: compile(&format!(r"^({NUMBER}(?:-{NUMBER})+)\s*taper\s*(.*)$")),
            stat: compile(&format!(r"^(?:({NUMBER})\s*({COUNT_UNIT})?\s*)?stat$")),
            prn_max: compile(&format!(
                r"^(?:({NUMBER})\s*({COUNT_UNIT})?\s*)?prn\s+max\s+([0-9]+)\s*/\s*24\s*h(?:rs?)?\s*(.+)$"
            )),
            prn: compile(&format!(r"^(?:({NUMBER})\s*({COUNT_UNIT})?\s*)?prn$")),
            standard: compile(&format!(
                r"^({NUMBER})\s*({DOSE_UNIT})?\s*({FREQUENCY})(?:\s*(?:[x*/]|for\s)\s*(.+?))?\s*$"
            )),
            topical: compile(r"^([0-9]+)\s*(tubes?)?$"),
            patch: compile(r"^(?:change\s+)?every\s+([0-9]+)\s*days?\s*((?:[x*/]|for\s).*)$"),
            injectable: compile(&format!(
                r"^({NUMBER})\s*(mg|ml|units?)?\s*0-12-24\s*(?:h|hrs?)$"
            )),
            custom_hours: compile(&format!(
                r"^({NUMBER})\s*(tabs?|capsules?|caps?|ml|mg)?\s*((?:[0-9]+h?,?\s*)+)$"
            )),
            custom_at: compile(&format!(
                r"^({NUMBER})\s*(tabs?|capsules?|caps?|ml|mg)?\s*at\s*((?:[0-9]+,?\s*)+)$"
            )),
            custom_hrs: compile(&format!(r"^({NUMBER})\s*(mg|ml)\s+((?:[0-9]+,)+[0-9]+)\s*(?:hrs?)?$")),
        }
    }

    /// Classify trimmed, non-empty input. `None` means no shape matched.
    pub fn classify(&self, input: &str, form: Option<DrugForm>) -> Option<Classified> {
        if self.extended && form.is_some_and(|f| f.is_topical()) {
            if let Some(schedule) = self.match_topical(input) {
                return Some(Classified::Matched(schedule));
            }
        }

        if let Some(classified) = self.match_taper(input) {
            return Some(classified);
        }
        if let Some(classified) = self.match_dash_sequence(input) {
            return Some(classified);
        }
        if let Some(classified) = self.match_stat(input) {
            return Some(classified);
        }
        if let Some(classified) = self.match_prn(input) {
            return Some(classified);
        }
        if let Some(classified) = self.match_standard(input) {
            return Some(classified);
        }

        if self.extended {
            if let Some(classified) = self.match_patch(input) {
                return Some(classified);
            }
            if let Some(classified) = self.match_injectable(input, form) {
                return Some(classified);
            }
            if let Some(classified) = self.match_custom_intervals(input) {
                return Some(classified);
            }
        }

        None
    }

    /// Parse a duration clause with this grammar's limits.
    pub fn durations(&self) -> &DurationParser {
        &self.durations
    }

    fn match_taper(&self, input: &str) -> Option<Classified> {
        let caps = self.taper.captures(input)?;
        let steps = parse_sequence(&caps[1]);
        let pattern = caps[1].to_string();

        let reject = |error: String| {
            let mut result = ParseResult::invalid(vec![error]);
            result.dose_quantity = Some(pattern.clone());
            result.frequency_code = Some(FrequencyCode::Taper);
            Some(Classified::Rejected(result))
        };

        if steps.iter().any(|s| *s <= 0.0) {
            return reject("Taper steps must all be greater than zero".into());
        }

        let step_days = steps.len() as u32;
        let remainder = caps[2].trim();
        let (duration, duration_days) = if remainder.is_empty() {
            (plural_days(step_days), step_days)
        } else {
            match self.durations.parse(remainder) {
                Ok(d) => (d.display, d.days),
                Err(e) => return reject(e.to_string()),
            }
        };

        let Some(quantity_to_dispense) = whole_units(steps.iter().sum()) else {
            return reject(TOO_LARGE.into());
        };
        let display_text = if remainder.is_empty() {
            format!("{pattern} taper")
        } else {
            format!("{pattern} taper x {duration}")
        };

        Some(Classified::Matched(Schedule {
            dose_quantity: pattern,
            frequency: "Taper schedule".into(),
            frequency_code: FrequencyCode::Taper,
            duration: Some(duration),
            duration_days,
            quantity_to_dispense,
            schedule_type: ScheduleType::Taper,
            pattern: SchedulePattern::Taper {
                doses: steps,
                duration_days,
            },
            display_text,
        }))
    }

    /// Dash sequences without the taper keyword: exactly three values is a
    /// split dose, any other length is an error.
    fn match_dash_sequence(&self, input: &str) -> Option<Classified> {
        let caps = self.dash_sequence.captures(input)?;
        let values = parse_sequence(&caps[1]);
        let pattern = caps[1].to_string();
        let remainder = caps[2].trim();

        if values.len() != 3 {
            let mut result = ParseResult::invalid(vec![format!(
                "A {}-step dose sequence needs the 'taper' keyword (e.g., '4-3-2-1 taper'). \
                 Split doses use exactly three values (e.g., '1-0-1 x 7 days')",
                values.len()
            )]);
            result.dose_quantity = Some(pattern);
            return Some(Classified::Rejected(result));
        }

        let (morning, noon, evening) = (values[0], values[1], values[2]);
        let daily_total = morning + noon + evening;

        let reject = |error: String| {
            let mut result = ParseResult::invalid(vec![error]);
            result.dose_quantity = Some(pattern.clone());
            result.frequency_code = Some(FrequencyCode::Split);
            Some(Classified::Rejected(result))
        };

        let (duration, duration_days) = if remainder.is_empty() {
            if self.split_dose_requires_duration {
                return reject(MISSING_DURATION.into());
            }
            (None, 1)
        } else {
            match self.durations.parse(remainder) {
                Ok(d) => (Some(d.display), d.days),
                Err(e) => return reject(e.to_string()),
            }
        };

        if daily_total <= 0.0 {
            return reject("Split dose must include at least one non-zero dose".into());
        }
        let Some(quantity_to_dispense) = whole_units(daily_total * f64::from(duration_days)) else {
            return reject(TOO_LARGE.into());
        };

        let slots: Vec<String> = [(morning, "morning"), (noon, "noon"), (evening, "evening")]
            .iter()
            .filter(|(amount, _)| *amount > 0.0)
            .map(|(amount, slot)| format!("{} {}", format_number(*amount), slot))
            .collect();
        let frequency = format!("{} ({}/day)", slots.join(", "), format_number(daily_total));

        let display_text = match &duration {
            Some(d) => format!("{pattern} x {d}"),
            None => pattern.clone(),
        };

        Some(Classified::Matched(Schedule {
            dose_quantity: pattern,
            frequency,
            frequency_code: FrequencyCode::Split,
            duration,
            duration_days,
            quantity_to_dispense,
            schedule_type: ScheduleType::SplitDose,
            pattern: SchedulePattern::SplitDose {
                morning,
                noon,
                evening,
                daily_total,
            },
            display_text,
        }))
    }

    fn match_stat(&self, input: &str) -> Option<Classified> {
        let caps = self.stat.captures(input)?;
        let (dose, dose_quantity) = dose_from(caps.get(1), caps.get(2));

        if dose <= 0.0 {
            return Some(Classified::Rejected(rejected_dose(dose_quantity, FrequencyCode::Stat)));
        }
        let Some(quantity_to_dispense) = whole_units(dose) else {
            return Some(Classified::Rejected(too_large(dose_quantity, FrequencyCode::Stat)));
        };

        Some(Classified::Matched(Schedule {
            display_text: format!("{dose_quantity} STAT"),
            dose_quantity,
            frequency: "Immediately (STAT)".into(),
            frequency_code: FrequencyCode::Stat,
            duration: None,
            duration_days: 0,
            quantity_to_dispense,
            schedule_type: ScheduleType::Stat,
            pattern: SchedulePattern::Stat { dose },
        }))
    }

    fn match_prn(&self, input: &str) -> Option<Classified> {
        if let Some(caps) = self.prn_max.captures(input) {
            let (dose, dose_quantity) = dose_from(caps.get(1), caps.get(2));
            if dose <= 0.0 {
                return Some(Classified::Rejected(rejected_dose(dose_quantity, FrequencyCode::Prn)));
            }

            let reject = |error: String| {
                let mut result = ParseResult::invalid(vec![error]);
                result.dose_quantity = Some(dose_quantity.clone());
                result.frequency_code = Some(FrequencyCode::Prn);
                Some(Classified::Rejected(result))
            };

            // Digits only, so a parse failure is an overflow
            let max_daily: u32 = match caps[3].parse() {
                Ok(0) => return reject("PRN maximum must be at least 1 per 24h".into()),
                Ok(max) => max,
                Err(_) => return reject(TOO_LARGE.into()),
            };

            let duration = match self.durations.parse(&caps[4]) {
                Ok(d) => d,
                Err(e) => return reject(e.to_string()),
            };
            let Some(quantity_to_dispense) = max_daily.checked_mul(duration.days) else {
                return reject(TOO_LARGE.into());
            };

            return Some(Classified::Matched(Schedule {
                display_text: format!(
                    "{dose_quantity} PRN (max {max_daily}/24h) x {}",
                    duration.display
                ),
                dose_quantity,
                frequency: format!("As needed (max {max_daily}/24h)"),
                frequency_code: FrequencyCode::Prn,
                duration: Some(duration.display),
                duration_days: duration.days,
                quantity_to_dispense,
                schedule_type: ScheduleType::Prn,
                pattern: SchedulePattern::Prn {
                    max_daily: Some(max_daily),
                    duration_days: Some(duration.days),
                },
            }));
        }

        let caps = self.prn.captures(input)?;
        let (dose, dose_quantity) = dose_from(caps.get(1), caps.get(2));
        if dose <= 0.0 {
            return Some(Classified::Rejected(rejected_dose(dose_quantity, FrequencyCode::Prn)));
        }
        let Some(quantity_to_dispense) = whole_units(dose) else {
            return Some(Classified::Rejected(too_large(dose_quantity, FrequencyCode::Prn)));
        };

        Some(Classified::Matched(Schedule {
            display_text: format!("{dose_quantity} PRN"),
            dose_quantity,
            frequency: "As needed (PRN)".into(),
            frequency_code: FrequencyCode::Prn,
            duration: None,
            duration_days: 0,
            quantity_to_dispense,
            schedule_type: ScheduleType::Prn,
            pattern: SchedulePattern::Prn {
                max_daily: None,
                duration_days: None,
            },
        }))
    }

    fn match_standard(&self, input: &str) -> Option<Classified> {
        let caps = self.standard.captures(input)?;
        let (dose, dose_quantity) = dose_from(caps.get(1), caps.get(2));
        let code = FrequencyCode::from_token(&caps[3])?;
        let times_per_day = code.times_per_day()?;
        let description = code.description().unwrap_or_default().to_string();

        let partial = |error: String| {
            let mut result = ParseResult::invalid(vec![error]);
            result.dose_quantity = Some(dose_quantity.clone());
            result.frequency = Some(description.clone());
            result.frequency_code = Some(code);
            result
        };

        if dose <= 0.0 {
            return Some(Classified::Rejected(partial(ZERO_DOSE.into())));
        }

        let duration = match caps.get(4) {
            None => return Some(Classified::Rejected(partial(MISSING_DURATION.into()))),
            Some(clause) => match self.durations.parse(clause.as_str()) {
                Ok(d) => d,
                Err(e) => return Some(Classified::Rejected(partial(e.to_string()))),
            },
        };

        let total = dose * f64::from(times_per_day) * f64::from(duration.days);
        let Some(quantity_to_dispense) = whole_units(total) else {
            return Some(Classified::Rejected(partial(TOO_LARGE.into())));
        };

        Some(Classified::Matched(Schedule {
            display_text: format!("{dose_quantity} {code} x {}", duration.display),
            dose_quantity,
            frequency: description,
            frequency_code: code,
            duration: Some(duration.display),
            duration_days: duration.days,
            quantity_to_dispense,
            schedule_type: ScheduleType::Standard,
            pattern: SchedulePattern::Standard {
                frequency_code: code,
                times_per_day,
            },
        }))
    }

    fn match_topical(&self, input: &str) -> Option<Schedule> {
        let caps = self.topical.captures(input)?;
        let quantity: u32 = caps[1].parse().ok().filter(|q| *q >= 1)?;
        let label = if quantity == 1 { "tube" } else { "tubes" };

        Some(Schedule {
            dose_quantity: quantity.to_string(),
            frequency: "As directed".into(),
            frequency_code: FrequencyCode::Topical,
            duration: Some("As directed".into()),
            duration_days: 0,
            quantity_to_dispense: quantity,
            schedule_type: ScheduleType::Topical,
            pattern: SchedulePattern::Topical { quantity },
            display_text: format!("{quantity} {label}"),
        })
    }

    fn match_patch(&self, input: &str) -> Option<Classified> {
        let caps = self.patch.captures(input)?;

        let reject = |error: String| {
            let mut result = ParseResult::invalid(vec![error]);
            result.dose_quantity = Some("1".into());
            result.frequency_code = Some(FrequencyCode::Interval);
            Some(Classified::Rejected(result))
        };

        let change_interval_days: u32 = match caps[1].parse() {
            Ok(days) if (1..=self.durations.max_days()).contains(&days) => days,
            _ => {
                return reject(format!(
                    "Change interval must be between 1 and {} days",
                    self.durations.max_days()
                ))
            }
        };
        let duration = match self.durations.parse(&caps[2]) {
            Ok(d) => d,
            Err(e) => return reject(e.to_string()),
        };
        let duration_days = duration.days;

        Some(Classified::Matched(Schedule {
            dose_quantity: "1".into(),
            frequency: format!("Every {change_interval_days} days"),
            frequency_code: FrequencyCode::Interval,
            duration: Some(duration.display),
            duration_days,
            quantity_to_dispense: duration_days.div_ceil(change_interval_days),
            schedule_type: ScheduleType::Interval,
            pattern: SchedulePattern::Interval {
                change_interval_days,
                duration_days,
            },
            display_text: format!(
                "Change every {change_interval_days} days x {}",
                plural_days(duration_days)
            ),
        }))
    }

    fn match_injectable(&self, input: &str, form: Option<DrugForm>) -> Option<Classified> {
        let caps = self.injectable.captures(input)?;
        let (dose, dose_quantity) = dose_from(caps.get(1), caps.get(2));

        if let Some(form) = form.filter(|f| !f.is_injectable()) {
            return Some(Classified::Rejected(ParseResult::invalid(vec![
                "0-12-24H schedule is only valid for injectable drugs.".into(),
                format!("This drug is a '{form}', not an injection."),
            ])));
        }
        if dose <= 0.0 {
            return Some(Classified::Rejected(rejected_dose(
                dose_quantity,
                FrequencyCode::Hours0To24,
            )));
        }

        let total_doses = 3;
        let Some(quantity_to_dispense) = whole_units(dose * f64::from(total_doses)) else {
            return Some(Classified::Rejected(too_large(
                dose_quantity,
                FrequencyCode::Hours0To24,
            )));
        };

        Some(Classified::Matched(Schedule {
            display_text: format!("{dose_quantity} at 0, 12, 24 hours"),
            dose_quantity,
            frequency: "At 0, 12, 24 hours (0-12-24H)".into(),
            frequency_code: FrequencyCode::Hours0To24,
            duration: Some("24 hours (3 doses)".into()),
            duration_days: 1,
            quantity_to_dispense,
            schedule_type: ScheduleType::InjectableInterval,
            pattern: SchedulePattern::InjectableInterval {
                intervals_hours: vec![0, 12, 24],
                dose_per_interval: dose,
                total_doses,
            },
        }))
    }

    fn match_custom_intervals(&self, input: &str) -> Option<Classified> {
        let caps = self
            .custom_hours
            .captures(input)
            .or_else(|| self.custom_at.captures(input))
            .or_else(|| self.custom_hrs.captures(input))?;
        let (dose, dose_quantity) = dose_from(caps.get(1), caps.get(2));
        if dose <= 0.0 {
            return None;
        }

        let mut hours: Vec<u32> = caps[3]
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(|h| h.trim_end_matches(['h', 'H']))
            .filter(|h| !h.is_empty())
            .filter_map(|h| h.parse().ok())
            .collect();
        if hours.len() < 2 {
            return None;
        }
        if hours[0] != 0 {
            hours.insert(0, 0);
        }

        let total_doses = hours.len() as u32;
        let last_hour = hours.iter().copied().max().unwrap_or(0);
        let hours_display = hours
            .iter()
            .map(|h| format!("{h}h"))
            .collect::<Vec<_>>()
            .join(", ");
        let Some(quantity_to_dispense) = whole_units(dose * f64::from(total_doses)) else {
            return Some(Classified::Rejected(too_large(dose_quantity, FrequencyCode::Custom)));
        };

        Some(Classified::Matched(Schedule {
            display_text: format!("{dose_quantity} at {hours_display}"),
            dose_quantity,
            frequency: format!("Custom intervals ({total_doses} doses)"),
            frequency_code: FrequencyCode::Custom,
            duration: Some("Custom schedule".into()),
            duration_days: last_hour.div_ceil(24) + 1,
            quantity_to_dispense,
            schedule_type: ScheduleType::CustomInterval,
            pattern: SchedulePattern::CustomInterval {
                intervals_hours: hours,
                dose_per_interval: dose,
                total_doses,
            },
        }))
    }
}

/// Dose amount and its display form from optional number/unit captures.
/// A missing number means a single unit.
fn dose_from(number: Option<regex::Match<'_>>, unit: Option<regex::Match<'_>>) -> (f64, String) {
    let raw = number.map(|m| m.as_str()).unwrap_or("1");
    let amount = raw.parse().unwrap_or(0.0);
    let display = match unit {
        Some(unit) => format!("{raw} {}", unit.as_str().to_lowercase()),
        None => raw.to_string(),
    };
    (amount, display)
}

fn rejected_dose(dose_quantity: String, code: FrequencyCode) -> ParseResult {
    rejected_with(ZERO_DOSE, dose_quantity, code)
}

fn too_large(dose_quantity: String, code: FrequencyCode) -> ParseResult {
    rejected_with(TOO_LARGE, dose_quantity, code)
}

fn rejected_with(error: &str, dose_quantity: String, code: FrequencyCode) -> ParseResult {
    let mut result = ParseResult::invalid(vec![error.into()]);
    result.dose_quantity = Some(dose_quantity);
    result.frequency_code = Some(code);
    result
}

fn parse_sequence(raw: &str) -> Vec<f64> {
    raw.split('-').filter_map(|v| v.parse().ok()).collect()
}

fn plural_days(days: u32) -> String {
    if days == 1 {
        "1 day".into()
    } else {
        format!("{days} days")
    }
}

/// Display a dose number without a trailing ".0".
pub(crate) fn format_number(value: f64) -> String {
    // f64's Display already drops ".0" and never switches to exponent form
    format!("{value}")
}

/// Round a quantity up to whole units, ignoring floating point noise.
/// `None` when the result does not fit a `u32`.
pub(crate) fn whole_units(value: f64) -> Option<u32> {
    let settled = ((value * 1_000_000.0).round() / 1_000_000.0).ceil().max(0.0);
    (settled.is_finite() && settled <= f64::from(u32::MAX)).then_some(settled as u32)
}

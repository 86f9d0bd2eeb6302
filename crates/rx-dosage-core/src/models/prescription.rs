//! Prescription parse models: requests, results and the schedule vocabulary.

use serde::{Deserialize, Serialize};

use super::DrugForm;

/// Frequency codes recognised by the parser.
///
/// The fixed-frequency codes (`OD` .. `Q12H`) carry a times-per-day
/// multiplier; the remaining codes name a schedule shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FrequencyCode {
    #[serde(rename = "OD")]
    Od,
    #[serde(rename = "BD")]
    Bd,
    #[serde(rename = "TDS")]
    Tds,
    #[serde(rename = "QDS")]
    Qds,
    #[serde(rename = "Q6H")]
    Q6h,
    #[serde(rename = "Q8H")]
    Q8h,
    #[serde(rename = "Q12H")]
    Q12h,
    #[serde(rename = "STAT")]
    Stat,
    #[serde(rename = "PRN")]
    Prn,
    #[serde(rename = "SPLIT")]
    Split,
    #[serde(rename = "TAPER")]
    Taper,
    #[serde(rename = "CUSTOM")]
    Custom,
    #[serde(rename = "INTERVAL")]
    Interval,
    #[serde(rename = "TOPICAL")]
    Topical,
    #[serde(rename = "0-12-24H")]
    Hours0To24,
}

/// Fixed-frequency tokens accepted in free text, with the code each maps to.
pub const FREQUENCY_TOKENS: &[(&str, FrequencyCode)] = &[
    ("OD", FrequencyCode::Od),
    ("BD", FrequencyCode::Bd),
    ("BID", FrequencyCode::Bd),
    ("TDS", FrequencyCode::Tds),
    ("TID", FrequencyCode::Tds),
    ("QDS", FrequencyCode::Qds),
    ("QID", FrequencyCode::Qds),
    ("Q6H", FrequencyCode::Q6h),
    ("Q8H", FrequencyCode::Q8h),
    ("Q12H", FrequencyCode::Q12h),
];

impl FrequencyCode {
    /// Look up a fixed-frequency token (case-insensitive, aliases folded).
    pub fn from_token(token: &str) -> Option<Self> {
        let upper = token.trim().to_uppercase();
        FREQUENCY_TOKENS
            .iter()
            .find(|(t, _)| *t == upper)
            .map(|(_, code)| *code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Od => "OD",
            Self::Bd => "BD",
            Self::Tds => "TDS",
            Self::Qds => "QDS",
            Self::Q6h => "Q6H",
            Self::Q8h => "Q8H",
            Self::Q12h => "Q12H",
            Self::Stat => "STAT",
            Self::Prn => "PRN",
            Self::Split => "SPLIT",
            Self::Taper => "TAPER",
            Self::Custom => "CUSTOM",
            Self::Interval => "INTERVAL",
            Self::Topical => "TOPICAL",
            Self::Hours0To24 => "0-12-24H",
        }
    }

    /// Administrations per day, for fixed-frequency codes only.
    pub fn times_per_day(&self) -> Option<u32> {
        match self {
            Self::Od => Some(1),
            Self::Bd | Self::Q12h => Some(2),
            Self::Tds | Self::Q8h => Some(3),
            Self::Qds | Self::Q6h => Some(4),
            _ => None,
        }
    }

    /// Human-readable description of a fixed-frequency code.
    pub fn description(&self) -> Option<&'static str> {
        match self {
            Self::Od => Some("Once daily (OD)"),
            Self::Bd => Some("Twice daily (BD)"),
            Self::Tds => Some("Three times daily (TDS)"),
            Self::Qds => Some("Four times daily (QDS)"),
            Self::Q6h => Some("Every 6 hours (Q6H)"),
            Self::Q8h => Some("Every 8 hours (Q8H)"),
            Self::Q12h => Some("Every 12 hours (Q12H)"),
            _ => None,
        }
    }
}

impl std::fmt::Display for FrequencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schedule shape a prescription was classified into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    Standard,
    SplitDose,
    Stat,
    Prn,
    Taper,
    CustomInterval,
    InjectableInterval,
    Interval,
    Topical,
}

impl ScheduleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::SplitDose => "split_dose",
            Self::Stat => "stat",
            Self::Prn => "prn",
            Self::Taper => "taper",
            Self::CustomInterval => "custom_interval",
            Self::InjectableInterval => "injectable_interval",
            Self::Interval => "interval",
            Self::Topical => "topical",
        }
    }
}

/// Structured schedule data for the medication administration record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulePattern {
    Standard {
        frequency_code: FrequencyCode,
        times_per_day: u32,
    },
    SplitDose {
        morning: f64,
        noon: f64,
        evening: f64,
        daily_total: f64,
    },
    Stat {
        dose: f64,
    },
    Prn {
        max_daily: Option<u32>,
        duration_days: Option<u32>,
    },
    Taper {
        doses: Vec<f64>,
        duration_days: u32,
    },
    CustomInterval {
        intervals_hours: Vec<u32>,
        dose_per_interval: f64,
        total_doses: u32,
    },
    InjectableInterval {
        intervals_hours: Vec<u32>,
        dose_per_interval: f64,
        total_doses: u32,
    },
    Interval {
        change_interval_days: u32,
        duration_days: u32,
    },
    Topical {
        quantity: u32,
    },
}

/// Input to a single parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParseRequest {
    /// Free-text dosage instruction
    pub input: String,
    /// Dosage form of the prescribed drug, if known
    pub drug_form: Option<DrugForm>,
    /// Bottle volume in ml, for liquid forms
    pub bottle_size: Option<f64>,
}

impl ParseRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            drug_form: None,
            bottle_size: None,
        }
    }

    pub fn with_form(mut self, form: DrugForm) -> Self {
        self.drug_form = Some(form);
        self
    }

    pub fn with_bottle_size(mut self, bottle_size: f64) -> Self {
        self.bottle_size = Some(bottle_size);
        self
    }
}

/// A successfully classified schedule, before it becomes a [`ParseResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub dose_quantity: String,
    pub frequency: String,
    pub frequency_code: FrequencyCode,
    pub duration: Option<String>,
    pub duration_days: u32,
    pub quantity_to_dispense: u32,
    pub schedule_type: ScheduleType,
    pub pattern: SchedulePattern,
    pub display_text: String,
}

/// Outcome of parsing one dosage instruction.
///
/// `is_valid` is true exactly when `errors` is empty. Invalid results never
/// carry a quantity, but may carry whatever dose/frequency/duration could be
/// recognised so the caller can show partial feedback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub is_valid: bool,
    pub dose_quantity: Option<String>,
    pub frequency: Option<String>,
    pub frequency_code: Option<FrequencyCode>,
    pub duration: Option<String>,
    pub duration_days: Option<u32>,
    pub quantity_to_dispense: Option<u32>,
    pub schedule_type: Option<ScheduleType>,
    pub schedule_pattern: Option<SchedulePattern>,
    pub display_text: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ParseResult {
    /// Invalid result carrying only error messages.
    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            dose_quantity: None,
            frequency: None,
            frequency_code: None,
            duration: None,
            duration_days: None,
            quantity_to_dispense: None,
            schedule_type: None,
            schedule_pattern: None,
            display_text: None,
            errors,
            warnings: Vec::new(),
        }
    }

    /// Turn this result invalid, keeping the recognised parts as feedback.
    pub fn reject(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self.is_valid = false;
        self.quantity_to_dispense = None;
        self.schedule_pattern = None;
        self.display_text = None;
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Administrations per day, for fixed-frequency results.
    pub fn times_per_day(&self) -> Option<u32> {
        self.frequency_code.and_then(|code| code.times_per_day())
    }

    /// Serialize to the JSON response shape.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<Schedule> for ParseResult {
    fn from(schedule: Schedule) -> Self {
        Self {
            is_valid: true,
            dose_quantity: Some(schedule.dose_quantity),
            frequency: Some(schedule.frequency),
            frequency_code: Some(schedule.frequency_code),
            duration: schedule.duration,
            duration_days: Some(schedule.duration_days),
            quantity_to_dispense: Some(schedule.quantity_to_dispense),
            schedule_type: Some(schedule.schedule_type),
            schedule_pattern: Some(schedule.pattern),
            display_text: Some(schedule.display_text),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

//! Prescription dosage parser.
//!
//! Pipeline: Grammar Matching → Quantity Calculation → Feedback
//!
//! Parsing is a pure function of the request and the parser configuration.
//! Malformed dosage text is never an `Err`: it comes back as a
//! [`ParseResult`] with `is_valid == false` and explanatory errors.

mod duration;
mod feedback;
mod grammar;
mod quantity;

pub use duration::*;
pub use feedback::*;
pub use grammar::*;
pub use quantity::*;

use crate::config::ParserConfig;
use crate::models::{DrugRecord, FrequencyCode, ParseRequest, ParseResult, SchedulePattern};

pub const EMPTY_INPUT: &str = "Please enter a prescription";

/// Main parser that coordinates grammar, quantity calculation and feedback.
pub struct PrescriptionParser {
    config: ParserConfig,
    grammar: Grammar,
    feedback: Feedback,
}

impl Default for PrescriptionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PrescriptionParser {
    /// Create a parser with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    /// Create a parser with a custom configuration.
    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            grammar: Grammar::new(&config),
            feedback: Feedback::new(config.suggestion_threshold),
            config,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse a dosage instruction with optional drug context.
    pub fn parse(&self, request: &ParseRequest) -> ParseResult {
        let input = request.input.trim();
        if input.is_empty() {
            return ParseResult::invalid(vec![EMPTY_INPUT.to_string()]);
        }

        match self.grammar.classify(input, request.drug_form) {
            Some(Classified::Matched(schedule)) => {
                tracing::debug!(
                    input,
                    schedule_type = schedule.schedule_type.as_str(),
                    quantity = schedule.quantity_to_dispense,
                    "parsed prescription"
                );
                self.apply_drug(schedule.into(), request)
            }
            Some(Classified::Rejected(result)) => {
                tracing::debug!(input, errors = ?result.errors, "prescription shape rejected");
                result
            }
            None => self.feedback.diagnose(input, self.grammar.durations()),
        }
    }

    /// Parse a dosage instruction without drug context.
    pub fn parse_input(&self, input: &str) -> ParseResult {
        self.parse(&ParseRequest::new(input))
    }

    /// Parse a dosage instruction for a specific drug record.
    pub fn parse_for_drug(&self, input: &str, drug: &DrugRecord) -> ParseResult {
        let mut request = ParseRequest::new(input).with_form(drug.form);
        request.bottle_size = drug.bottle_size;
        self.parse(&request)
    }

    /// Look up a fixed-frequency token ("BD", "tid", "Q8H").
    pub fn parse_frequency(&self, token: &str) -> Option<FrequencyCode> {
        FrequencyCode::from_token(token)
    }

    /// Parse a standalone duration clause ("x 5 days", "7/7", "2 weeks").
    pub fn parse_duration(&self, clause: &str) -> Result<Duration, DurationError> {
        self.grammar.durations().parse(clause)
    }

    /// Quantity to dispense for a parsed result and a drug record.
    ///
    /// Returns 0 when no quantity can be computed (invalid result, or a
    /// liquid that needs manual entry).
    pub fn calculate_quantity(&self, result: &ParseResult, drug: &DrugRecord) -> u32 {
        dispense_quantity(
            result,
            Some(drug.form),
            drug.usable_bottle_size(),
            self.config.liquid_without_bottle,
        )
        .map(|d| d.quantity)
        .unwrap_or(0)
    }

    /// Schedule data for the administration record, for valid results only.
    pub fn to_schedule_pattern<'r>(&self, result: &'r ParseResult) -> Option<&'r SchedulePattern> {
        if !result.is_valid {
            return None;
        }
        result.schedule_pattern.as_ref()
    }

    /// Canonical display text, or an empty string for invalid results.
    pub fn format(&self, result: &ParseResult) -> String {
        if !result.is_valid {
            return String::new();
        }
        if let Some(text) = &result.display_text {
            return text.clone();
        }

        let mut parts = Vec::new();
        if let Some(dose) = &result.dose_quantity {
            parts.push(dose.clone());
        }
        if let Some(code) = result.frequency_code.filter(|c| c.times_per_day().is_some()) {
            parts.push(code.to_string());
        }
        if let Some(duration) = &result.duration {
            parts.push(format!("x {duration}"));
        }
        parts.join(" ")
    }

    /// Replace the grammar's unit count with the drug-form quantity.
    fn apply_drug(&self, mut result: ParseResult, request: &ParseRequest) -> ParseResult {
        let Some(form) = request.drug_form else {
            return result;
        };

        match dispense_quantity(
            &result,
            Some(form),
            request.bottle_size,
            self.config.liquid_without_bottle,
        ) {
            Ok(dispense) => {
                result.quantity_to_dispense = Some(dispense.quantity);
                if let Some(warning) = dispense.warning {
                    tracing::warn!(form = form.as_str(), "{warning}");
                    result.warnings.push(warning);
                }
                result
            }
            Err(e) => result.reject(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LiquidFallback;
    use crate::models::{DrugForm, ScheduleType};

    #[test]
    fn test_parser_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PrescriptionParser>();
    }

    #[test]
    fn test_empty_input() {
        let parser = PrescriptionParser::new();
        for input in ["", "   ", "\t\n"] {
            let result = parser.parse_input(input);
            assert!(!result.is_valid);
            assert_eq!(result.errors, vec![EMPTY_INPUT.to_string()]);
        }
    }

    #[test]
    fn test_trims_whitespace() {
        let parser = PrescriptionParser::new();
        let result = parser.parse_input("   2 BD x 5 days  ");
        assert!(result.is_valid);
        assert_eq!(result.quantity_to_dispense, Some(20));
    }

    #[test]
    fn test_liquid_with_bottle() {
        let parser = PrescriptionParser::new();
        let request = ParseRequest::new("5ml TDS x 7 days")
            .with_form(DrugForm::Syrup)
            .with_bottle_size(100.0);

        let result = parser.parse(&request);
        assert!(result.is_valid);
        assert_eq!(result.dose_quantity.as_deref(), Some("5 ml"));
        assert_eq!(result.quantity_to_dispense, Some(2));
    }

    #[test]
    fn test_liquid_without_bottle_warns() {
        let parser = PrescriptionParser::new();
        let request = ParseRequest::new("5ml TDS x 7 days").with_form(DrugForm::Syrup);

        let result = parser.parse(&request);
        assert!(result.is_valid);
        assert_eq!(result.quantity_to_dispense, Some(105));
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_liquid_without_bottle_rejected_by_policy() {
        let parser = PrescriptionParser::with_config(ParserConfig {
            liquid_without_bottle: LiquidFallback::Reject,
            ..ParserConfig::default()
        });
        let request = ParseRequest::new("5ml TDS x 7 days").with_form(DrugForm::Syrup);

        let result = parser.parse(&request);
        assert!(!result.is_valid);
        assert!(result.quantity_to_dispense.is_none());
        assert_eq!(result.frequency_code, Some(FrequencyCode::Tds));
    }

    #[test]
    fn test_liquid_taper_rejected() {
        let parser = PrescriptionParser::new();
        let request = ParseRequest::new("4-3-2-1 taper")
            .with_form(DrugForm::Syrup)
            .with_bottle_size(100.0);

        let result = parser.parse(&request);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("taper"));
    }

    #[test]
    fn test_parse_for_drug() {
        let parser = PrescriptionParser::new();
        let drug = DrugRecord::new("D100".into(), "Ventolin".into(), DrugForm::Inhaler);

        let result = parser.parse_for_drug("2 QDS x 30 days", &drug);
        assert_eq!(result.quantity_to_dispense, Some(1));
    }

    #[test]
    fn test_calculate_quantity() {
        let parser = PrescriptionParser::new();
        let syrup = DrugRecord::new("D2".into(), "Amoxicillin syrup".into(), DrugForm::Syrup)
            .with_bottle_size(100.0);

        let result = parser.parse_input("5ml TDS x 7 days");
        assert_eq!(parser.calculate_quantity(&result, &syrup), 2);

        let invalid = parser.parse_input("nonsense");
        assert_eq!(parser.calculate_quantity(&invalid, &syrup), 0);
    }

    #[test]
    fn test_format_and_pattern() {
        let parser = PrescriptionParser::new();

        let result = parser.parse_input("2 bd X 5 DAYS");
        assert_eq!(parser.format(&result), "2 BD x 5 days");
        assert!(matches!(
            parser.to_schedule_pattern(&result),
            Some(SchedulePattern::Standard {
                frequency_code: FrequencyCode::Bd,
                times_per_day: 2
            })
        ));

        let invalid = parser.parse_input("invalid");
        assert_eq!(parser.format(&invalid), "");
        assert!(parser.to_schedule_pattern(&invalid).is_none());
    }

    #[test]
    fn test_format_without_display_text() {
        let parser = PrescriptionParser::new();
        let mut result = parser.parse_input("1 TDS x 7 days");
        result.display_text = None;
        assert_eq!(parser.format(&result), "1 TDS x 7 days");
    }

    #[test]
    fn test_parse_frequency_and_duration() {
        let parser = PrescriptionParser::new();
        assert_eq!(parser.parse_frequency("qid"), Some(FrequencyCode::Qds));
        assert_eq!(parser.parse_duration("x 2 weeks").unwrap().days, 14);
    }

    #[test]
    fn test_extended_config() {
        let strict = PrescriptionParser::new();
        let extended = PrescriptionParser::with_config(ParserConfig::extended());

        let input = "change every 3 days x 30 days";
        assert!(!strict.parse_input(input).is_valid);

        let result = extended.parse_input(input);
        assert!(result.is_valid);
        assert_eq!(result.schedule_type, Some(ScheduleType::Interval));
    }
}

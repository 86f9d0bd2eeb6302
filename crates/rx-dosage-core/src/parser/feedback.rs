//! Feedback for input that matched no schedule shape.
//!
//! Re-scans the input for whatever can be recognised (dose, frequency,
//! duration) and explains what is missing, suggesting the closest frequency
//! code when a token looks like a misspelling.

use regex::Regex;
use strsim::{jaro_winkler, normalized_levenshtein};

use super::duration::{compile, DurationParser};
use super::grammar::MISSING_DURATION;
use crate::models::{FrequencyCode, ParseResult, FREQUENCY_TOKENS};

pub(crate) const MISSING_DOSE: &str =
    "Unable to extract dose quantity. Start with a number (e.g., \"2 BD x 5 days\")";
pub(crate) const MISSING_FREQUENCY: &str =
    "Could not find frequency. Use OD, BD, TDS, QDS, Q6H, Q8H, or Q12H";
pub(crate) const STAT_LAYOUT: &str =
    "STAT is a single immediate dose with no frequency or duration. Write it as '2 STAT' or '2 tabs STAT'";
pub(crate) const PRN_LAYOUT: &str =
    "PRN is written '2 PRN', or with a daily maximum and a duration: '2 PRN max 8/24h x 7 days'";
pub(crate) const UNPARSEABLE: &str =
    "Could not parse prescription. Try formats like '2 BD x 5 days' or '1-0-1 x 7 days'";

/// Diagnoses unmatched input.
pub struct Feedback {
    dose: Regex,
    duration_clause: Regex,
    suggestion_threshold: f64,
}

impl Feedback {
    pub fn new(suggestion_threshold: f64) -> Self {
        Self {
            dose: compile(r"^([0-9]+(?:\.[0-9]+)?)\s*(ml|mg|tablets?|tabs?|capsules?|caps?)?(?:\s+|$)"),
            duration_clause: compile(r"(?:^|\s)((?:[x*/]|for\s)\s*[-+]?[0-9].*)$"),
            suggestion_threshold,
        }
    }

    /// Build an invalid result describing what was and wasn't recognised.
    pub fn diagnose(&self, input: &str, durations: &DurationParser) -> ParseResult {
        let mut errors = Vec::new();
        let mut result = ParseResult::invalid(Vec::new());

        let dose_end = match self.dose.captures(input) {
            Some(caps) => {
                let number = &caps[1];
                result.dose_quantity = Some(match caps.get(2) {
                    Some(unit) => format!("{number} {}", unit.as_str().to_lowercase()),
                    None => number.to_string(),
                });
                caps.get(0).map(|m| m.end()).unwrap_or(0)
            }
            None => {
                errors.push(MISSING_DOSE.to_string());
                0
            }
        };

        // Frequency: any known token anywhere in the input
        let tokens: Vec<&str> = input
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();
        let known = tokens.iter().find_map(|t| FrequencyCode::from_token(t));
        // STAT and PRN have fixed layouts; explain the layout instead of the parts
        let layout = tokens.iter().find_map(|t| layout_keyword(t));

        match (known, layout) {
            (Some(code), _) => {
                result.frequency_code = Some(code);
                result.frequency = code.description().map(str::to_string);
            }
            (None, Some((code, hint))) => {
                result.frequency_code = Some(code);
                errors.push(hint.to_string());
            }
            (None, None) => {
                let candidate = (result.dose_quantity.is_some())
                    .then(|| first_word(&input[dose_end..]))
                    .flatten()
                    .filter(|t| !is_separator(t));

                match candidate {
                    Some(token) => errors.push(self.unknown_frequency(token)),
                    None => errors.push(MISSING_FREQUENCY.to_string()),
                }
            }
        }

        // Duration
        let clause = self
            .duration_clause
            .captures(&input[dose_end..])
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());
        let explained = known.is_none() && layout.is_some();
        match clause.map(|c| durations.parse(c)) {
            Some(Ok(duration)) => {
                result.duration = Some(duration.display);
                result.duration_days = Some(duration.days);
            }
            Some(Err(_)) | None if explained => {}
            Some(Err(e)) => errors.push(e.to_string()),
            None => errors.push(MISSING_DURATION.to_string()),
        }

        if errors.is_empty() {
            errors.push(UNPARSEABLE.to_string());
        }

        tracing::debug!(input, error_count = errors.len(), "prescription did not match any schedule");
        result.errors = errors;
        result
    }

    /// Error for a token in the frequency position that is not a known code.
    fn unknown_frequency(&self, token: &str) -> String {
        let mut message = format!(
            "Unrecognized frequency token '{token}'. Use OD, BD, TDS, QDS, Q6H, Q8H, or Q12H"
        );
        if let Some(suggestion) = self.suggest(token) {
            message.push_str(&format!(". Did you mean '{suggestion}'?"));
        }
        message
    }

    /// Closest frequency token above the similarity threshold.
    pub fn suggest(&self, token: &str) -> Option<&'static str> {
        let upper = token.to_uppercase();
        FREQUENCY_TOKENS
            .iter()
            .map(|(code, _)| (*code, similarity(&upper, code)))
            .filter(|(_, score)| *score >= self.suggestion_threshold)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(code, _)| code)
    }
}

fn layout_keyword(token: &str) -> Option<(FrequencyCode, &'static str)> {
    match token.to_uppercase().as_str() {
        "STAT" => Some((FrequencyCode::Stat, STAT_LAYOUT)),
        "PRN" => Some((FrequencyCode::Prn, PRN_LAYOUT)),
        _ => None,
    }
}

fn first_word(text: &str) -> Option<&str> {
    text.split_whitespace().next()
}

/// "x", "*", "/", "for", or a separator glued to a number ("x5").
fn is_separator(token: &str) -> bool {
    let lower = token.to_lowercase();
    match lower.strip_prefix(['x', '*', '/']) {
        Some(rest) => rest.is_empty() || rest.starts_with(|c: char| c.is_ascii_digit()),
        None => lower == "for",
    }
}

/// Combined string similarity: Jaro-Winkler for typos, Levenshtein overall.
fn similarity(a: &str, b: &str) -> f64 {
    jaro_winkler(a, b) * 0.6 + normalized_levenshtein(a, b) * 0.4
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnose(input: &str) -> ParseResult {
        Feedback::new(0.75).diagnose(input, &DurationParser::new(365))
    }

    #[test]
    fn test_random_text() {
        let result = diagnose("take some medicine");

        assert!(!result.is_valid);
        assert!(result.quantity_to_dispense.is_none());
        assert_eq!(
            result.errors,
            vec![
                MISSING_DOSE.to_string(),
                MISSING_FREQUENCY.to_string(),
                MISSING_DURATION.to_string()
            ]
        );
    }

    #[test]
    fn test_missing_frequency() {
        let result = diagnose("2 x 5 days");

        assert_eq!(result.dose_quantity.as_deref(), Some("2"));
        assert_eq!(result.duration_days, Some(5));
        assert_eq!(result.errors, vec![MISSING_FREQUENCY.to_string()]);
    }

    #[test]
    fn test_unknown_frequency() {
        let result = diagnose("2 XYZ x 5 days");

        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Unrecognized frequency token 'XYZ'"));
        assert!(!result.errors[0].contains("Did you mean"));
    }

    #[test]
    fn test_suggestion_for_typo() {
        let result = diagnose("2 BDD x 5 days");
        assert!(result.errors[0].ends_with("Did you mean 'BD'?"), "{}", result.errors[0]);
    }

    #[test]
    fn test_suggest() {
        let feedback = Feedback::new(0.75);
        assert_eq!(feedback.suggest("bdd"), Some("BD"));
        assert_eq!(feedback.suggest("xyz"), None);
    }

    #[test]
    fn test_known_frequency_bad_layout() {
        // Known code but not in a recognised shape
        let result = diagnose("2 BD 5 days");
        assert_eq!(result.frequency_code, Some(FrequencyCode::Bd));
        assert_eq!(result.errors, vec![MISSING_DURATION.to_string()]);
    }

    #[test]
    fn test_stat_with_duration() {
        let result = diagnose("2 STAT x 5 days");

        assert_eq!(result.dose_quantity.as_deref(), Some("2"));
        assert_eq!(result.frequency_code, Some(FrequencyCode::Stat));
        assert_eq!(result.errors, vec![STAT_LAYOUT.to_string()]);
    }

    #[test]
    fn test_prn_max_without_duration() {
        let result = diagnose("2 PRN max 8/24h");

        assert_eq!(result.frequency_code, Some(FrequencyCode::Prn));
        assert_eq!(result.errors, vec![PRN_LAYOUT.to_string()]);
        assert!(!result.errors[0].contains("Unrecognized"));
    }

    #[test]
    fn test_non_ascii_dose() {
        let result = diagnose("２ BD x 5 days");

        assert_eq!(result.dose_quantity, None);
        assert_eq!(result.frequency_code, Some(FrequencyCode::Bd));
        assert_eq!(result.duration_days, Some(5));
        assert_eq!(result.errors, vec![MISSING_DOSE.to_string()]);
    }

    #[test]
    fn test_bad_duration_reported() {
        let result = diagnose("2 XYZ x 0 days");
        assert!(result
            .errors
            .contains(&"Duration must be a positive number of days".to_string()));
    }
}

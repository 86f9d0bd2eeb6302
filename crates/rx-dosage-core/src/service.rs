//! Request-level validation in front of the parser.
//!
//! A request names the dosage text and, optionally, a drug from the catalog.
//! Problems with the request itself (no text, a drug id that does not
//! resolve) are returned as [`RequestError`]s tagged with the offending
//! field. Problems with the dosage text are reported inside the
//! [`ParseResult`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{DbError, DbResult};
use crate::models::{DrugRecord, ParseResult};
use crate::parser::PrescriptionParser;

/// Source of drug records for a request's `drug_id`.
pub trait DrugLookup {
    fn find_drug(&self, drug_id: &str) -> DbResult<Option<DrugRecord>>;
}

impl DrugLookup for HashMap<String, DrugRecord> {
    fn find_drug(&self, drug_id: &str) -> DbResult<Option<DrugRecord>> {
        Ok(self.get(drug_id).cloned())
    }
}

/// A prescription entry as submitted by a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionRequest {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub drug_id: Option<String>,
}

impl PrescriptionRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            drug_id: None,
        }
    }

    pub fn with_drug(mut self, drug_id: impl Into<String>) -> Self {
        self.drug_id = Some(drug_id.into());
        self
    }
}

/// Request errors, each tied to a request field where one applies.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("The {field} field is required")]
    MissingField { field: &'static str },

    #[error("Drug not found: {drug_id}")]
    UnknownDrug { drug_id: String },

    #[error("Drug is inactive: {drug_id}")]
    InactiveDrug { drug_id: String },

    #[error("Drug lookup failed: {0}")]
    Lookup(#[from] DbError),
}

impl RequestError {
    /// Request field the error belongs to.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field } => Some(*field),
            Self::UnknownDrug { .. } | Self::InactiveDrug { .. } => Some("drug_id"),
            Self::Lookup(_) => None,
        }
    }
}

pub type RequestResult<T> = Result<T, RequestError>;

/// Validates prescription requests and parses them against the catalog.
pub struct PrescriptionService<'a, L: DrugLookup + ?Sized> {
    lookup: &'a L,
    parser: &'a PrescriptionParser,
}

impl<'a, L: DrugLookup + ?Sized> PrescriptionService<'a, L> {
    pub fn new(lookup: &'a L, parser: &'a PrescriptionParser) -> Self {
        Self { lookup, parser }
    }

    /// Validate the request, resolve its drug and parse the dosage text.
    pub fn evaluate(&self, request: &PrescriptionRequest) -> RequestResult<ParseResult> {
        let input = request.input.trim();
        if input.is_empty() {
            return Err(RequestError::MissingField { field: "input" });
        }

        let drug_id = request
            .drug_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let result = match drug_id {
            Some(drug_id) => {
                let drug = self.resolve_drug(drug_id)?;
                self.parser.parse_for_drug(input, &drug)
            }
            None => self.parser.parse_input(input),
        };

        tracing::debug!(
            input,
            drug_id,
            is_valid = result.is_valid,
            "evaluated prescription request"
        );
        Ok(result)
    }

    fn resolve_drug(&self, drug_id: &str) -> RequestResult<DrugRecord> {
        let drug = self
            .lookup
            .find_drug(drug_id)?
            .ok_or_else(|| RequestError::UnknownDrug {
                drug_id: drug_id.to_string(),
            })?;

        if !drug.active {
            tracing::warn!(drug_id, "prescription requested for inactive drug");
            return Err(RequestError::InactiveDrug {
                drug_id: drug_id.to_string(),
            });
        }
        Ok(drug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DrugForm;

    fn catalog() -> HashMap<String, DrugRecord> {
        let mut drugs = HashMap::new();
        drugs.insert(
            "AMOX".to_string(),
            DrugRecord::new("AMOX".into(), "Amoxicillin 125mg/5ml".into(), DrugForm::Syrup)
                .with_bottle_size(100.0),
        );
        let mut old = DrugRecord::new("OLD".into(), "Withdrawn".into(), DrugForm::Tablet);
        old.active = false;
        drugs.insert("OLD".to_string(), old);
        drugs
    }

    #[test]
    fn test_missing_input() {
        let drugs = catalog();
        let parser = PrescriptionParser::new();
        let service = PrescriptionService::new(&drugs, &parser);

        let err = service.evaluate(&PrescriptionRequest::new("  ")).unwrap_err();
        assert!(matches!(err, RequestError::MissingField { field: "input" }));
        assert_eq!(err.field(), Some("input"));
    }

    #[test]
    fn test_without_drug() {
        let drugs = catalog();
        let parser = PrescriptionParser::new();
        let service = PrescriptionService::new(&drugs, &parser);

        let result = service.evaluate(&PrescriptionRequest::new("2 BD x 5 days")).unwrap();
        assert_eq!(result.quantity_to_dispense, Some(20));
    }

    #[test]
    fn test_blank_drug_id_is_ignored() {
        let drugs = catalog();
        let parser = PrescriptionParser::new();
        let service = PrescriptionService::new(&drugs, &parser);

        let request = PrescriptionRequest::new("2 BD x 5 days").with_drug(" ");
        assert!(service.evaluate(&request).unwrap().is_valid);
    }

    #[test]
    fn test_drug_context_applies() {
        let drugs = catalog();
        let parser = PrescriptionParser::new();
        let service = PrescriptionService::new(&drugs, &parser);

        let request = PrescriptionRequest::new("5ml TDS x 7 days").with_drug("AMOX");
        let result = service.evaluate(&request).unwrap();
        assert_eq!(result.quantity_to_dispense, Some(2));
    }

    #[test]
    fn test_unknown_and_inactive_drug() {
        let drugs = catalog();
        let parser = PrescriptionParser::new();
        let service = PrescriptionService::new(&drugs, &parser);

        let err = service
            .evaluate(&PrescriptionRequest::new("2 BD x 5 days").with_drug("NOPE"))
            .unwrap_err();
        assert!(matches!(&err, RequestError::UnknownDrug { drug_id } if drug_id == "NOPE"));
        assert_eq!(err.field(), Some("drug_id"));

        let err = service
            .evaluate(&PrescriptionRequest::new("2 BD x 5 days").with_drug("OLD"))
            .unwrap_err();
        assert!(matches!(err, RequestError::InactiveDrug { .. }));
        assert_eq!(err.field(), Some("drug_id"));
    }

    #[test]
    fn test_request_json() {
        let request: PrescriptionRequest =
            serde_json::from_str(r#"{"input": "2 STAT", "drugId": "AMOX"}"#).unwrap();
        assert_eq!(request.drug_id.as_deref(), Some("AMOX"));

        let request: PrescriptionRequest = serde_json::from_str("{}").unwrap();
        assert!(request.input.is_empty());
    }
}

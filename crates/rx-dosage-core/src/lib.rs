//! Rx Dosage Core Library
//!
//! Prescription dosage-string parser with a local drug catalog.
//!
//! # Architecture
//!
//! ```text
//! PrescriptionRequest { input, drug_id }
//!             │
//!     [SERVICE: request validation]
//!       missing input / unknown drug / inactive drug → RequestError
//!             │
//!     ┌───────▼────────────────────────────┐
//!     │            Grammar                 │
//!     │  taper → split → STAT → PRN →      │
//!     │  standard (→ extended shapes)      │
//!     └───────┬──────────────────┬─────────┘
//!             │ matched          │ no shape
//!             ▼                  ▼
//!     Quantity (drug form)    Feedback (partial result,
//!     units / bottles / 1     "did you mean" suggestion)
//!             │                  │
//!             └────────┬─────────┘
//!                      ▼
//!                 ParseResult
//! ```
//!
//! # Core Principle
//!
//! **Dosage text never fails with an error.** Anything the grammar cannot
//! accept comes back as an invalid [`ParseResult`] that says what was wrong.
//!
//! # Modules
//!
//! - [`parser`]: Grammar, duration, quantity and feedback
//! - [`models`]: Domain types (DrugRecord, ParseResult, SchedulePattern, etc.)
//! - [`service`]: Request validation against the drug catalog
//! - [`db`]: SQLite drug catalog
//! - [`config`]: Parser configuration

pub mod config;
pub mod db;
pub mod models;
pub mod parser;
pub mod service;

// Re-export commonly used types
pub use config::{LiquidFallback, ParserConfig};
pub use db::Database;
pub use models::{
    DrugForm, DrugRecord, FrequencyCode, ParseRequest, ParseResult, SchedulePattern, ScheduleType,
};
pub use parser::PrescriptionParser;
pub use service::{DrugLookup, PrescriptionRequest, PrescriptionService, RequestError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex, OnceLock};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum RxDosageError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for RxDosageError {
    fn from(e: db::DbError) -> Self {
        RxDosageError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for RxDosageError {
    fn from(e: serde_json::Error) -> Self {
        RxDosageError::SerializationError(e.to_string())
    }
}

impl From<config::ConfigError> for RxDosageError {
    fn from(e: config::ConfigError) -> Self {
        RxDosageError::InvalidInput(e.to_string())
    }
}

impl From<RequestError> for RxDosageError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::UnknownDrug { .. } => RxDosageError::NotFound(e.to_string()),
            RequestError::Lookup(inner) => inner.into(),
            other => match other.field() {
                Some(field) => RxDosageError::InvalidInput(format!("{field}: {other}")),
                None => RxDosageError::InvalidInput(other.to_string()),
            },
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for RxDosageError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        RxDosageError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a drug catalog at the given path.
#[uniffi::export]
pub fn open_catalog(path: String) -> Result<Arc<RxDosageCore>, RxDosageError> {
    let db = Database::open(&path)?;
    Ok(RxDosageCore::new(db, ParserConfig::default()))
}

/// Open a drug catalog with a JSON parser configuration.
#[uniffi::export]
pub fn open_catalog_with_config(
    path: String,
    config_json: String,
) -> Result<Arc<RxDosageCore>, RxDosageError> {
    let config = ParserConfig::from_json_str(&config_json)?;
    let db = Database::open(&path)?;
    Ok(RxDosageCore::new(db, config))
}

/// Create an in-memory drug catalog (for testing).
#[uniffi::export]
pub fn open_catalog_in_memory() -> Result<Arc<RxDosageCore>, RxDosageError> {
    let db = Database::open_in_memory()?;
    Ok(RxDosageCore::new(db, ParserConfig::default()))
}

/// Default-config parser shared by catalog-free calls.
fn default_parser() -> &'static PrescriptionParser {
    static PARSER: OnceLock<PrescriptionParser> = OnceLock::new();
    PARSER.get_or_init(PrescriptionParser::new)
}

/// Parse a dosage string without a catalog.
#[uniffi::export]
pub fn parse_dosage(
    input: String,
    drug_form: Option<String>,
    bottle_size: Option<f64>,
) -> FfiParseResult {
    let request = ParseRequest {
        input,
        drug_form: drug_form.as_deref().map(DrugForm::from_label),
        bottle_size,
    };
    default_parser().parse(&request).into()
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe catalog and parser wrapper for FFI.
#[derive(uniffi::Object)]
pub struct RxDosageCore {
    db: Arc<Mutex<Database>>,
    parser: PrescriptionParser,
}

impl RxDosageCore {
    fn new(db: Database, config: ParserConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            parser: PrescriptionParser::with_config(config),
        })
    }
}

#[uniffi::export]
impl RxDosageCore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Add or update a drug.
    pub fn upsert_drug(&self, drug: FfiDrugRecord) -> Result<(), RxDosageError> {
        let db = self.db.lock()?;
        db.upsert_drug(&drug.into())?;
        Ok(())
    }

    /// Get a drug by id.
    pub fn get_drug(&self, drug_id: String) -> Result<Option<FfiDrugRecord>, RxDosageError> {
        let db = self.db.lock()?;
        let drug = db.get_drug(&drug_id)?;
        Ok(drug.map(|d| d.into()))
    }

    /// List drugs ordered by name.
    pub fn list_drugs(&self, active_only: bool) -> Result<Vec<FfiDrugRecord>, RxDosageError> {
        let db = self.db.lock()?;
        let drugs = db.list_drugs(active_only)?;
        Ok(drugs.into_iter().map(|d| d.into()).collect())
    }

    /// Mark a drug inactive. Returns false if it does not exist.
    pub fn deactivate_drug(&self, drug_id: String) -> Result<bool, RxDosageError> {
        let db = self.db.lock()?;
        Ok(db.deactivate_drug(&drug_id)?)
    }

    // =========================================================================
    // Parser Operations
    // =========================================================================

    /// Parse a prescription, optionally against a catalog drug.
    pub fn parse_prescription(
        &self,
        input: String,
        drug_id: Option<String>,
    ) -> Result<FfiParseResult, RxDosageError> {
        let db = self.db.lock()?;
        let service = PrescriptionService::new(&*db, &self.parser);
        let request = PrescriptionRequest { input, drug_id };
        let result = service.evaluate(&request)?;
        Ok(result.into())
    }

    /// Parse a prescription and return the camelCase JSON response.
    pub fn parse_prescription_json(
        &self,
        input: String,
        drug_id: Option<String>,
    ) -> Result<String, RxDosageError> {
        let db = self.db.lock()?;
        let service = PrescriptionService::new(&*db, &self.parser);
        let request = PrescriptionRequest { input, drug_id };
        Ok(service.evaluate(&request)?.to_json()?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe drug record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDrugRecord {
    pub drug_id: String,
    pub name: String,
    pub form: String,
    pub bottle_size: Option<f64>,
    pub active: bool,
}

impl From<DrugRecord> for FfiDrugRecord {
    fn from(drug: DrugRecord) -> Self {
        Self {
            drug_id: drug.drug_id,
            name: drug.name,
            form: drug.form.as_str().to_string(),
            bottle_size: drug.bottle_size,
            active: drug.active,
        }
    }
}

impl From<FfiDrugRecord> for DrugRecord {
    fn from(drug: FfiDrugRecord) -> Self {
        DrugRecord {
            drug_id: drug.drug_id,
            name: drug.name,
            form: DrugForm::from_label(&drug.form),
            bottle_size: drug.bottle_size,
            active: drug.active,
        }
    }
}

/// FFI-safe parse result. The schedule pattern travels as JSON.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiParseResult {
    pub is_valid: bool,
    pub dose_quantity: Option<String>,
    pub frequency: Option<String>,
    pub frequency_code: Option<String>,
    pub duration: Option<String>,
    pub duration_days: Option<u32>,
    pub quantity_to_dispense: Option<u32>,
    pub schedule_type: Option<String>,
    pub schedule_pattern_json: Option<String>,
    pub display_text: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl From<ParseResult> for FfiParseResult {
    fn from(result: ParseResult) -> Self {
        Self {
            is_valid: result.is_valid,
            dose_quantity: result.dose_quantity,
            frequency: result.frequency,
            frequency_code: result.frequency_code.map(|c| c.as_str().to_string()),
            duration: result.duration,
            duration_days: result.duration_days,
            quantity_to_dispense: result.quantity_to_dispense,
            schedule_type: result.schedule_type.map(|t| t.as_str().to_string()),
            schedule_pattern_json: result
                .schedule_pattern
                .and_then(|p| serde_json::to_string(&p).ok()),
            display_text: result.display_text,
            errors: result.errors,
            warnings: result.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dosage() {
        let result = parse_dosage("5ml TDS x 7 days".into(), Some("Syrup".into()), Some(100.0));
        assert!(result.is_valid);
        assert_eq!(result.frequency_code.as_deref(), Some("TDS"));
        assert_eq!(result.schedule_type.as_deref(), Some("standard"));
        assert_eq!(result.quantity_to_dispense, Some(2));
        assert!(result
            .schedule_pattern_json
            .unwrap()
            .contains("\"type\":\"standard\""));
    }

    #[test]
    fn test_default_parser_is_shared() {
        assert!(std::ptr::eq(default_parser(), default_parser()));

        let first = parse_dosage("2 BD x 5 days".into(), None, None);
        let second = parse_dosage("2 BD x 5 days".into(), None, None);
        assert_eq!(first.quantity_to_dispense, Some(20));
        assert_eq!(first.quantity_to_dispense, second.quantity_to_dispense);
    }

    #[test]
    fn test_catalog_round_trip() {
        let core = open_catalog_in_memory().unwrap();
        core.upsert_drug(FfiDrugRecord {
            drug_id: "D1".into(),
            name: "Paracetamol 120mg/5ml".into(),
            form: "suspension".into(),
            bottle_size: Some(100.0),
            active: true,
        })
        .unwrap();

        let drug = core.get_drug("D1".into()).unwrap().unwrap();
        assert_eq!(drug.form, "suspension");
        assert_eq!(core.list_drugs(true).unwrap().len(), 1);

        let result = core
            .parse_prescription("10ml QDS x 3 days".into(), Some("D1".into()))
            .unwrap();
        assert_eq!(result.quantity_to_dispense, Some(2));

        assert!(core.deactivate_drug("D1".into()).unwrap());
        assert!(core.list_drugs(true).unwrap().is_empty());
    }

    #[test]
    fn test_request_errors_map() {
        let core = open_catalog_in_memory().unwrap();

        let err = core.parse_prescription("".into(), None).unwrap_err();
        assert!(matches!(err, RxDosageError::InvalidInput(msg) if msg.starts_with("input")));

        let err = core
            .parse_prescription("2 BD x 5 days".into(), Some("missing".into()))
            .unwrap_err();
        assert!(matches!(err, RxDosageError::NotFound(_)));
    }

    #[test]
    fn test_parse_prescription_json() {
        let core = open_catalog_in_memory().unwrap();
        let json = core
            .parse_prescription_json("1-0-1 x 30 days".into(), None)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["frequencyCode"], "SPLIT");
        assert_eq!(value["quantityToDispense"], 60);
    }

    #[test]
    fn test_open_catalog_with_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rx.db").to_string_lossy().to_string();

        let core = open_catalog_with_config(path.clone(), r#"{"extended_schedules": true}"#.into())
            .unwrap();
        let result = core
            .parse_prescription("change every 3 days x 30 days".into(), None)
            .unwrap();
        assert_eq!(result.quantity_to_dispense, Some(10));

        let err = open_catalog_with_config(path, r#"{"suggestion_threshold": 2.0}"#.into());
        assert!(matches!(err, Err(RxDosageError::InvalidInput(_))));
    }
}

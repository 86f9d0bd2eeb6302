//! Drug catalog models.

use serde::{Deserialize, Serialize};

/// Dosage form of a drug record.
///
/// The form decides how a parsed dose turns into a dispensable quantity:
/// solids count units, liquids count bottles, topicals count tubes and
/// fixed-unit forms always dispense a single item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DrugForm {
    Tablet,
    Capsule,
    Syrup,
    Suspension,
    Solution,
    OtherLiquid,
    Injection,
    IvBag,
    Cream,
    Ointment,
    Gel,
    Lotion,
    Drops,
    Inhaler,
    CombinationPack,
    Other,
}

impl DrugForm {
    /// Parse a form label (case-insensitive). Unknown labels map to `Other`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "tablet" | "tablets" | "tab" => Self::Tablet,
            "capsule" | "capsules" | "cap" => Self::Capsule,
            "syrup" => Self::Syrup,
            "suspension" => Self::Suspension,
            "solution" => Self::Solution,
            "other_liquid" | "liquid" => Self::OtherLiquid,
            "injection" => Self::Injection,
            "iv_bag" => Self::IvBag,
            "cream" => Self::Cream,
            "ointment" => Self::Ointment,
            "gel" => Self::Gel,
            "lotion" => Self::Lotion,
            "drops" => Self::Drops,
            "inhaler" => Self::Inhaler,
            "combination_pack" => Self::CombinationPack,
            _ => Self::Other,
        }
    }

    /// Canonical storage label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tablet => "tablet",
            Self::Capsule => "capsule",
            Self::Syrup => "syrup",
            Self::Suspension => "suspension",
            Self::Solution => "solution",
            Self::OtherLiquid => "other_liquid",
            Self::Injection => "injection",
            Self::IvBag => "iv_bag",
            Self::Cream => "cream",
            Self::Ointment => "ointment",
            Self::Gel => "gel",
            Self::Lotion => "lotion",
            Self::Drops => "drops",
            Self::Inhaler => "inhaler",
            Self::CombinationPack => "combination_pack",
            Self::Other => "other",
        }
    }

    /// Liquids are dispensed by the bottle.
    pub fn is_liquid(&self) -> bool {
        matches!(
            self,
            Self::Syrup | Self::Suspension | Self::Solution | Self::OtherLiquid
        )
    }

    /// Topicals are prescribed as a number of tubes.
    pub fn is_topical(&self) -> bool {
        matches!(self, Self::Cream | Self::Ointment | Self::Gel | Self::Lotion)
    }

    /// Forms dispensed as a single item regardless of schedule.
    pub fn is_fixed_unit(&self) -> bool {
        matches!(self, Self::Drops | Self::Inhaler | Self::CombinationPack)
    }

    pub fn is_injectable(&self) -> bool {
        matches!(self, Self::Injection | Self::IvBag)
    }
}

impl std::fmt::Display for DrugForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A drug record from the formulary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrugRecord {
    /// Formulary identifier
    pub drug_id: String,
    /// Display name (e.g., "Paracetamol 500mg tablets")
    pub name: String,
    /// Dosage form
    pub form: DrugForm,
    /// Bottle volume in ml, for liquid forms
    pub bottle_size: Option<f64>,
    /// Whether this drug can currently be prescribed
    pub active: bool,
}

impl DrugRecord {
    /// Create a new active drug record.
    pub fn new(drug_id: String, name: String, form: DrugForm) -> Self {
        Self {
            drug_id,
            name,
            form,
            bottle_size: None,
            active: true,
        }
    }

    /// Set the bottle size (builder style).
    pub fn with_bottle_size(mut self, bottle_size: f64) -> Self {
        self.bottle_size = Some(bottle_size);
        self
    }

    /// Bottle size usable for conversion (positive and finite).
    pub fn usable_bottle_size(&self) -> Option<f64> {
        self.bottle_size.filter(|size| size.is_finite() && *size > 0.0)
    }
}

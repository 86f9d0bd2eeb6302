//! Dispensing quantity calculator.
//!
//! Turns a parsed schedule into the quantity the pharmacy hands out, given
//! the drug's form:
//! - solids: whole units (already computed by the grammar)
//! - liquids: bottles, `ceil(total ml / bottle size)`
//! - fixed-unit forms (drops, inhalers, packs): always 1
//! - topicals: the dose number is the tube count

use thiserror::Error;

use super::grammar::whole_units;
use crate::config::LiquidFallback;
use crate::models::{DrugForm, ParseResult, SchedulePattern, ScheduleType};

/// Why a quantity could not be computed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    #[error("Cannot calculate a quantity for an invalid prescription")]
    InvalidPrescription,

    #[error("Bottle conversion is not supported for {0} schedules; prescribe this liquid with a standard frequency")]
    UnsupportedLiquidSchedule(&'static str),

    #[error("No bottle size is configured for this liquid; enter the quantity manually")]
    MissingBottleSize,

    #[error("Quantity is too large to dispense")]
    TooLarge,
}

/// Quantity to dispense plus an optional note for the prescriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispense {
    pub quantity: u32,
    pub warning: Option<String>,
}

impl Dispense {
    fn units(quantity: u32) -> Self {
        Self {
            quantity,
            warning: None,
        }
    }
}

/// Calculate the quantity to dispense for a valid parse result.
pub fn dispense_quantity(
    result: &ParseResult,
    form: Option<DrugForm>,
    bottle_size: Option<f64>,
    fallback: LiquidFallback,
) -> Result<Dispense, QuantityError> {
    if !result.is_valid {
        return Err(QuantityError::InvalidPrescription);
    }
    let parsed = result.quantity_to_dispense.unwrap_or(0);
    let schedule_type = match result.schedule_type {
        Some(t) => t,
        None => return Err(QuantityError::InvalidPrescription),
    };

    // One-off and tube-count schedules keep what was parsed
    if matches!(
        schedule_type,
        ScheduleType::Stat | ScheduleType::Prn | ScheduleType::Topical
    ) {
        return Ok(Dispense::units(parsed));
    }

    let form = match form {
        Some(form) => form,
        None => return Ok(Dispense::units(parsed)),
    };

    if form.is_fixed_unit() {
        return Ok(Dispense::units(1));
    }

    if form.is_topical() {
        let dose = leading_number(result.dose_quantity.as_deref()).unwrap_or(1.0);
        let tubes = whole_units(dose).ok_or(QuantityError::TooLarge)?;
        return Ok(Dispense::units(tubes.max(1)));
    }

    if form.is_liquid() {
        let total_ml = liquid_volume(result, schedule_type)?;
        let bottle_size = bottle_size.filter(|size| size.is_finite() && *size > 0.0);

        return match (bottle_size, fallback) {
            (Some(size), _) => {
                let bottles = whole_units(total_ml / size).ok_or(QuantityError::TooLarge)?;
                Ok(Dispense::units(bottles))
            }
            (None, LiquidFallback::TotalVolume) => {
                let ml = whole_units(total_ml).ok_or(QuantityError::TooLarge)?;
                Ok(Dispense {
                    quantity: ml,
                    warning: Some(format!(
                        "No bottle size configured; quantity is the total volume ({ml} ml)"
                    )),
                })
            }
            (None, LiquidFallback::ManualEntry) => Ok(Dispense {
                quantity: 0,
                warning: Some(QuantityError::MissingBottleSize.to_string()),
            }),
            (None, LiquidFallback::Reject) => Err(QuantityError::MissingBottleSize),
        };
    }

    Ok(Dispense::units(parsed))
}

/// Total volume in ml for a liquid schedule. The dose number is read as ml.
fn liquid_volume(result: &ParseResult, schedule_type: ScheduleType) -> Result<f64, QuantityError> {
    let dose = leading_number(result.dose_quantity.as_deref()).unwrap_or(0.0);

    match (schedule_type, &result.schedule_pattern) {
        (ScheduleType::Standard, _) => {
            let times_per_day = f64::from(result.times_per_day().unwrap_or(1));
            let days = f64::from(result.duration_days.unwrap_or(1));
            Ok(dose * times_per_day * days)
        }
        (
            ScheduleType::CustomInterval | ScheduleType::InjectableInterval,
            Some(
                SchedulePattern::CustomInterval {
                    dose_per_interval,
                    total_doses,
                    ..
                }
                | SchedulePattern::InjectableInterval {
                    dose_per_interval,
                    total_doses,
                    ..
                },
            ),
        ) => Ok(dose_per_interval * f64::from(*total_doses)),
        (other, _) => Err(QuantityError::UnsupportedLiquidSchedule(label(other))),
    }
}

fn label(schedule_type: ScheduleType) -> &'static str {
    match schedule_type {
        ScheduleType::SplitDose => "split-dose",
        ScheduleType::Interval => "change-interval",
        other => other.as_str(),
    }
}

/// Leading numeric value of a dose string ("5 ml" -> 5.0, "2 tabs" -> 2.0).
fn leading_number(dose: Option<&str>) -> Option<f64> {
    let dose = dose?.trim();
    let end = dose
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(dose.len());
    dose[..end].parse().ok()
}

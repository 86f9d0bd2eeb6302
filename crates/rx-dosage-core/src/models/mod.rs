//! Domain models for the rx-dosage system.

mod drug;
mod prescription;

pub use drug::*;
pub use prescription::*;

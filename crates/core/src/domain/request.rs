use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_UNIT: &str = "lot";
pub const DEFAULT_LOCATION: &str = "General";

/// One unit of requested work, as produced by extraction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit: String,
    pub location: String,
}

impl RequestItem {
    pub fn new(
        description: impl Into<String>,
        quantity: Decimal,
        unit: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit: unit.into(),
            location: location.into(),
        }
    }

    /// A single lot of work with no known location.
    pub fn lot(description: impl Into<String>) -> Self {
        Self::new(description, Decimal::ONE, DEFAULT_UNIT, DEFAULT_LOCATION)
    }
}

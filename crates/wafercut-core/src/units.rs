//! Unit conversion and numeric formatting
//!
//! Handles conversion between model length units and the output measurement
//! system (mm or inch), and the deterministic rounding used by every output
//! sink. Preview and G-code go through the same [`NumericFormatter`] so both
//! show identical numbers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Millimeters per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Measurement system of the generated output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementSystem {
    /// Metric system (mm)
    Metric,
    /// Imperial system (inches)
    Imperial,
}

impl Default for MeasurementSystem {
    fn default() -> Self {
        Self::Metric
    }
}

impl MeasurementSystem {
    /// Decimal places used when no explicit override is configured.
    pub fn default_places(self) -> u8 {
        match self {
            Self::Metric => 3,
            Self::Imperial => 4,
        }
    }

    /// Short unit label used in output comments.
    pub fn label(self) -> &'static str {
        match self {
            Self::Metric => "mm",
            Self::Imperial => "inches",
        }
    }

    /// The length unit this system expresses values in.
    pub fn length_unit(self) -> LengthUnit {
        match self {
            Self::Metric => LengthUnit::Millimeters,
            Self::Imperial => LengthUnit::Inches,
        }
    }
}

impl fmt::Display for MeasurementSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric => write!(f, "Metric"),
            Self::Imperial => write!(f, "Imperial"),
        }
    }
}

impl FromStr for MeasurementSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "metric" | "mm" => Ok(Self::Metric),
            "imperial" | "inch" | "inches" | "in" => Ok(Self::Imperial),
            _ => Err(format!("Unknown measurement system: {}", s)),
        }
    }
}

/// Length unit the model geometry is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Millimeters,
    Inches,
}

impl Default for LengthUnit {
    fn default() -> Self {
        Self::Millimeters
    }
}

impl LengthUnit {
    /// Convert `value` expressed in `self` into `target`.
    pub fn convert(self, value: f64, target: LengthUnit) -> f64 {
        match (self, target) {
            (Self::Millimeters, Self::Inches) => value / MM_PER_INCH,
            (Self::Inches, Self::Millimeters) => value * MM_PER_INCH,
            _ => value,
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millimeters => write!(f, "mm"),
            Self::Inches => write!(f, "in"),
        }
    }
}

impl FromStr for LengthUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mm" | "millimeters" | "millimetres" => Ok(Self::Millimeters),
            "in" | "inch" | "inches" => Ok(Self::Inches),
            _ => Err(format!("Unknown length unit: {}", s)),
        }
    }
}

/// Round `value` to `places` decimals, never returning negative zero.
pub fn round_to_places(value: f64, places: u8) -> f64 {
    let scale = 10f64.powi(places as i32);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Converts model lengths into the output system and rounds them.
///
/// Each call is independent of every other; there is no hidden state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericFormatter {
    model_unit: LengthUnit,
    system: MeasurementSystem,
    places: u8,
}

impl NumericFormatter {
    pub fn new(model_unit: LengthUnit, system: MeasurementSystem) -> Self {
        Self {
            model_unit,
            system,
            places: system.default_places(),
        }
    }

    /// Override the number of decimal places.
    pub fn with_places(mut self, places: u8) -> Self {
        self.places = places;
        self
    }

    pub fn system(&self) -> MeasurementSystem {
        self.system
    }

    pub fn places(&self) -> u8 {
        self.places
    }

    /// Convert a model length into the output system without rounding.
    pub fn convert(&self, value: f64) -> f64 {
        self.model_unit.convert(value, self.system.length_unit())
    }

    /// Convert and round a model length.
    pub fn round(&self, value: f64) -> f64 {
        round_to_places(self.convert(value), self.places)
    }

    /// Convert, round and render a model length with a fixed number of decimals.
    pub fn format(&self, value: f64) -> String {
        format!("{:.*}", self.places as usize, self.round(value))
    }
}

impl Default for NumericFormatter {
    fn default() -> Self {
        Self::new(LengthUnit::Millimeters, MeasurementSystem::Metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_system_parse() {
        assert_eq!(
            "mm".parse::<MeasurementSystem>().unwrap(),
            MeasurementSystem::Metric
        );
        assert_eq!(
            "Inches".parse::<MeasurementSystem>().unwrap(),
            MeasurementSystem::Imperial
        );
        assert!("furlong".parse::<MeasurementSystem>().is_err());
        assert_eq!(MeasurementSystem::Imperial.to_string(), "Imperial");
    }

    #[test]
    fn test_length_unit_convert() {
        let mm = LengthUnit::Millimeters;
        let inch = LengthUnit::Inches;
        assert_eq!(mm.convert(25.4, inch), 1.0);
        assert_eq!(inch.convert(2.0, mm), 50.8);
        assert_eq!(mm.convert(7.0, mm), 7.0);
    }

    #[test]
    fn test_round_to_places() {
        assert_eq!(round_to_places(1.23456, 3), 1.235);
        assert_eq!(round_to_places(1.23444, 4), 1.2344);
        assert_eq!(round_to_places(-2.5, 0), -3.0);
        let z = round_to_places(-0.0001, 3);
        assert_eq!(z, 0.0);
        assert!(z.is_sign_positive());
    }

    #[test]
    fn test_formatter_metric() {
        let f = NumericFormatter::default();
        assert_eq!(f.places(), 3);
        assert_eq!(f.format(7.0), "7.000");
        assert_eq!(f.format(1.23456), "1.235");
        assert_eq!(f.format(-0.0002), "0.000");
    }

    #[test]
    fn test_formatter_imperial() {
        let f = NumericFormatter::new(LengthUnit::Millimeters, MeasurementSystem::Imperial);
        assert_eq!(f.places(), 4);
        assert_eq!(f.format(25.4), "1.0000");
        assert_eq!(f.round(10.0), 0.3937);
    }

    #[test]
    fn test_formatter_places_override() {
        let f = NumericFormatter::default().with_places(1);
        assert_eq!(f.format(2.26), "2.3");
    }

    #[test]
    fn test_formatter_is_deterministic() {
        let f = NumericFormatter::new(LengthUnit::Inches, MeasurementSystem::Metric);
        let a: Vec<String> = (0..100).map(|i| f.format(i as f64 * 0.0137)).collect();
        let b: Vec<String> = (0..100).map(|i| f.format(i as f64 * 0.0137)).collect();
        assert_eq!(a, b);
    }
}

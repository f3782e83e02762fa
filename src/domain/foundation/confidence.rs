//! Confidence score attached to a reasoning decision.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// A probability-like score in `[0.0, 1.0]`.
///
/// Finite values outside the range are clamped. Non-finite values are
/// rejected, on construction and when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub const ZERO: Self = Self(0.0);
    pub const FULL: Self = Self(1.0);

    /// Creates a confidence, clamping finite values into range.
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::invalid_format(
                "confidence",
                "must be a finite number",
            ));
        }
        Ok(Self(value.clamp(0.0, 1.0)))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// True when strictly above `threshold`.
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.0 > threshold
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<f64> for Confidence {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Confidence::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_values() {
        assert_eq!(Confidence::new(1.7).unwrap().value(), 1.0);
        assert_eq!(Confidence::new(-0.2).unwrap().value(), 0.0);
    }

    #[test]
    fn rejects_nan_and_infinity() {
        assert!(Confidence::new(f64::NAN).is_err());
        assert!(Confidence::new(f64::INFINITY).is_err());
    }

    #[test]
    fn exceeds_is_strict() {
        let c = Confidence::new(0.5).unwrap();
        assert!(!c.exceeds(0.5));
        assert!(c.exceeds(0.49));
    }

    #[test]
    fn deserializes_from_plain_number() {
        let c: Confidence = serde_json::from_str("0.8").unwrap();
        assert_eq!(c.value(), 0.8);
    }
}

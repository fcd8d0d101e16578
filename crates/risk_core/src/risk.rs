//! Risk classification
//!
//! Pure functions of the default probability. The decision threshold that
//! sets the binary label and the two risk-tier cutoffs are independent
//! configuration values.

use crate::errors::{Result, RiskCoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse three-bucket risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Borderline,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Borderline => "Borderline",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification cutoffs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Probability at or above which the binary label is 1
    pub decision_threshold: f64,
    /// Probabilities strictly below this are Low
    pub low_upper: f64,
    /// Probabilities strictly above this are High
    pub high_lower: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            decision_threshold: 0.5,
            low_upper: 0.40,
            high_lower: 0.60,
        }
    }
}

impl RiskThresholds {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("decision_threshold", self.decision_threshold),
            ("low_upper", self.low_upper),
            ("high_lower", self.high_lower),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RiskCoreError::validation(
                    name,
                    format!("{value} is outside [0, 1]"),
                ));
            }
        }
        if self.low_upper > self.high_lower {
            return Err(RiskCoreError::validation(
                "low_upper",
                format!(
                    "{} is above high_lower {}",
                    self.low_upper, self.high_lower
                ),
            ));
        }
        Ok(())
    }

    pub fn risk_level(&self, probability: f64) -> RiskLevel {
        if probability < self.low_upper {
            RiskLevel::Low
        } else if probability <= self.high_lower {
            RiskLevel::Borderline
        } else {
            RiskLevel::High
        }
    }

    pub fn binary_label(&self, probability: f64) -> u8 {
        u8::from(probability >= self.decision_threshold)
    }

    /// Classify a probability
    pub fn classify(&self, probability: f64) -> PredictionResult {
        PredictionResult {
            probability,
            binary_label: self.binary_label(probability),
            risk_level: self.risk_level(probability),
        }
    }
}

/// Outcome of scoring one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub probability: f64,
    pub binary_label: u8,
    pub risk_level: RiskLevel,
}

impl PredictionResult {
    /// Probability as a percentage rounded to one decimal place.
    ///
    /// Display only: the tier and the binary label are decided on the
    /// unrounded probability, so 0.39996 reads as 40.0 yet stays Low.
    pub fn percent(&self) -> f64 {
        (self.probability * 1000.0).round() / 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_boundaries() {
        let t = RiskThresholds::default();
        assert_eq!(t.risk_level(0.399), RiskLevel::Low);
        assert_eq!(t.risk_level(0.40), RiskLevel::Borderline);
        assert_eq!(t.risk_level(0.60), RiskLevel::Borderline);
        assert_eq!(t.risk_level(0.601), RiskLevel::High);
    }

    #[test]
    fn test_binary_label_is_independent_of_tiers() {
        let t = RiskThresholds {
            decision_threshold: 0.3,
            ..RiskThresholds::default()
        };
        let result = t.classify(0.35);
        assert_eq!(result.binary_label, 1);
        assert_eq!(result.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_percent_rounding() {
        let result = RiskThresholds::default().classify(0.12345);
        assert_eq!(result.percent(), 12.3);
        assert_eq!(RiskThresholds::default().classify(1.0).percent(), 100.0);

        let edge = RiskThresholds::default().classify(0.39996);
        assert_eq!(edge.percent(), 40.0);
        assert_eq!(edge.risk_level, RiskLevel::Low);
        let edge = RiskThresholds::default().classify(0.49996);
        assert_eq!(edge.percent(), 50.0);
        assert_eq!(edge.binary_label, 0);
    }

    #[test]
    fn test_validate() {
        assert!(RiskThresholds::default().validate().is_ok());
        let bad = RiskThresholds {
            low_upper: 0.7,
            ..RiskThresholds::default()
        };
        assert!(bad.validate().is_err());
        let bad = RiskThresholds {
            decision_threshold: 1.5,
            ..RiskThresholds::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_serialized_names() {
        let json = serde_json::to_string(&RiskLevel::Borderline).unwrap();
        assert_eq!(json, "\"Borderline\"");
    }

    proptest! {
        #[test]
        fn classification_is_pure(p in 0.0f64..=1.0) {
            let t = RiskThresholds::default();
            let a = t.classify(p);
            let b = t.classify(p);
            prop_assert_eq!(a, b);
            prop_assert_eq!(a.binary_label == 1, p >= t.decision_threshold);
            prop_assert!((0.0..=100.0).contains(&a.percent()));
        }
    }
}

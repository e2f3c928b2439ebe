//! Scoring constants and grade tiers

use crate::core::error::ConfigurationError;
use crate::rating::{CANONICAL_MAX, CANONICAL_MIN};
use serde::{Deserialize, Serialize};

/// Constants of the category score formula
/// `(base + average * scale) * multiplier`.
///
/// With the defaults a category ranges from 40 (all -4) to 80 (all +4),
/// and a neutral average lands on 60.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConstants {
    pub base: f64,
    pub scale: f64,
    pub multiplier: f64,
    /// Cap on the final score
    pub max_total: f64,
}

impl Default for ScoringConstants {
    fn default() -> Self {
        Self {
            base: 6.0,
            scale: 0.5,
            multiplier: 10.0,
            max_total: 1000.0,
        }
    }
}

impl ScoringConstants {
    /// Score of a category whose average rating is neutral.
    pub fn midpoint(&self) -> f64 {
        self.base * self.multiplier
    }

    pub fn floor(&self) -> f64 {
        self.category_score(f64::from(CANONICAL_MIN))
    }

    pub fn ceiling(&self) -> f64 {
        self.category_score(f64::from(CANONICAL_MAX))
    }

    /// Apply the formula to an average canonical rating.
    pub fn category_score(&self, average: f64) -> f64 {
        (self.base + average * self.scale) * self.multiplier
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let all_finite = [self.base, self.scale, self.multiplier, self.max_total]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ConfigurationError::Scoring(
                "constants must be finite".to_string(),
            ));
        }
        if self.max_total <= 0.0 {
            return Err(ConfigurationError::Scoring(format!(
                "max_total must be positive (got {})",
                self.max_total
            )));
        }
        if self.scale <= 0.0 || self.multiplier <= 0.0 {
            return Err(ConfigurationError::Scoring(
                "scale and multiplier must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// One row of the grade table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeTier {
    pub threshold: f64,
    pub grade: String,
}

impl GradeTier {
    pub fn new(threshold: f64, grade: impl Into<String>) -> Self {
        Self {
            threshold,
            grade: grade.into(),
        }
    }
}

/// Descending `(threshold, grade)` table; the first threshold met wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradeTable(Vec<GradeTier>);

impl Default for GradeTable {
    fn default() -> Self {
        Self(
            [
                (920.0, "M"),
                (840.0, "D"),
                (760.0, "E"),
                (680.0, "P"),
                (600.0, "G"),
                (520.0, "S"),
                (440.0, "B"),
                (360.0, "I"),
                (280.0, "T"),
                (0.0, "L"),
            ]
            .into_iter()
            .map(|(t, g)| GradeTier::new(t, g))
            .collect(),
        )
    }
}

impl GradeTable {
    /// Build a table, checking the thresholds are strictly descending and
    /// the last one admits a zero score.
    pub fn new(tiers: Vec<GradeTier>) -> Result<Self, ConfigurationError> {
        let table = Self(tiers);
        table.validate()?;
        Ok(table)
    }

    pub fn tiers(&self) -> &[GradeTier] {
        &self.0
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let Some(last) = self.0.last() else {
            return Err(ConfigurationError::Scoring(
                "grade table is empty".to_string(),
            ));
        };
        if self.0.windows(2).any(|w| w[0].threshold <= w[1].threshold) {
            return Err(ConfigurationError::Scoring(
                "grade thresholds must be strictly descending".to_string(),
            ));
        }
        if last.threshold > 0.0 {
            return Err(ConfigurationError::Scoring(format!(
                "lowest grade threshold must be <= 0 (got {})",
                last.threshold
            )));
        }
        Ok(())
    }

    /// Grade for a final score.
    pub fn grade_for(&self, score: f64) -> &str {
        self.0
            .iter()
            .find(|tier| score >= tier.threshold)
            .or(self.0.last())
            .map(|tier| tier.grade.as_str())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_range() {
        let c = ScoringConstants::default();
        assert_eq!(c.midpoint(), 60.0);
        assert_eq!(c.floor(), 40.0);
        assert_eq!(c.ceiling(), 80.0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_invalid_constants() {
        let c = ScoringConstants {
            max_total: 0.0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
        let c = ScoringConstants {
            base: f64::NAN,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_grade_boundaries() {
        let table = GradeTable::default();
        assert_eq!(table.grade_for(1000.0), "M");
        assert_eq!(table.grade_for(920.0), "M");
        assert_eq!(table.grade_for(919.9), "D");
        assert_eq!(table.grade_for(600.0), "G");
        assert_eq!(table.grade_for(279.0), "L");
        assert_eq!(table.grade_for(0.0), "L");
    }

    #[test]
    fn test_grade_table_rejects_unsorted() {
        let tiers = vec![GradeTier::new(100.0, "A"), GradeTier::new(200.0, "B")];
        assert!(GradeTable::new(tiers).is_err());
        assert!(GradeTable::new(vec![]).is_err());
        assert!(GradeTable::new(vec![GradeTier::new(10.0, "A")]).is_err());
    }
}

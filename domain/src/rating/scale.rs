//! Rating scale normalization
//!
//! Raters emit ratings in different representations. Everything is mapped
//! onto one canonical integer scale `[-4, +4]` (with a `[-1.0, +1.0]` view)
//! before aggregation. The mapping is a pure function of `(raw, scale)`.
//!
//! | Scale | Most negative | Neutral | Most positive | Step |
//! |-------|---------------|---------|---------------|------|
//! | [`RatingScale::LetterGrade`] | `I` | `E` | `A` | 1 per letter |
//! | [`RatingScale::SignedInteger`] | `-4` | `0` | `+4` | 1 |
//! | [`RatingScale::SignedSmall`] | `-2` | `0` | `+2` | 2 |

use crate::core::error::NormalizationError;
use serde::{Deserialize, Serialize};

/// Lowest canonical value.
pub const CANONICAL_MIN: i8 = -4;
/// Highest canonical value.
pub const CANONICAL_MAX: i8 = 4;

const LETTER_GRADES: [char; 9] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I'];

/// A rating on the canonical scale. Always within `[-4, +4]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub struct CanonicalRating(i8);

impl CanonicalRating {
    pub const MOST_NEGATIVE: CanonicalRating = CanonicalRating(CANONICAL_MIN);
    pub const NEUTRAL: CanonicalRating = CanonicalRating(0);
    pub const MOST_POSITIVE: CanonicalRating = CanonicalRating(CANONICAL_MAX);

    /// Construct from an integer, `None` if outside `[-4, +4]`.
    pub fn new(value: i8) -> Option<Self> {
        (CANONICAL_MIN..=CANONICAL_MAX)
            .contains(&value)
            .then_some(Self(value))
    }

    pub fn value(self) -> i8 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }

    /// The same rating on the `[-1.0, +1.0]` scale.
    pub fn unit(self) -> f64 {
        f64::from(self.0) / f64::from(CANONICAL_MAX)
    }
}

impl TryFrom<i8> for CanonicalRating {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        CanonicalRating::new(value)
            .ok_or_else(|| format!("canonical rating {} outside [-4, 4]", value))
    }
}

impl From<CanonicalRating> for i8 {
    fn from(r: CanonicalRating) -> Self {
        r.0
    }
}

impl std::fmt::Display for CanonicalRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:+}", self.0)
    }
}

/// The representation a rater uses for its ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingScale {
    /// `A` (best) through `I` (worst), evenly spaced, `E` neutral.
    LetterGrade,
    /// Integers `-4..=+4`.
    #[default]
    SignedInteger,
    /// Integers `-2..=+2`, each step worth two canonical points.
    SignedSmall,
}

impl RatingScale {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingScale::LetterGrade => "letter_grade",
            RatingScale::SignedInteger => "signed_integer",
            RatingScale::SignedSmall => "signed_small",
        }
    }

    /// The raw values at the negative and positive ends of this scale.
    pub fn extremes(&self) -> (&'static str, &'static str) {
        match self {
            RatingScale::LetterGrade => ("I", "A"),
            RatingScale::SignedInteger => ("-4", "+4"),
            RatingScale::SignedSmall => ("-2", "+2"),
        }
    }

    /// Short description of the accepted values, for evaluator prompts.
    pub fn describe(&self) -> &'static str {
        match self {
            RatingScale::LetterGrade => {
                "a letter grade from A (strongly positive) through E (neutral) to I (strongly negative)"
            }
            RatingScale::SignedInteger => {
                "an integer from -4 (strongly negative) through 0 (neutral) to +4 (strongly positive)"
            }
            RatingScale::SignedSmall => {
                "an integer from -2 (strongly negative) through 0 (neutral) to +2 (strongly positive)"
            }
        }
    }
}

impl std::fmt::Display for RatingScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RatingScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "letter" | "letter_grade" | "grade" => Ok(RatingScale::LetterGrade),
            "signed" | "signed_integer" | "integer" => Ok(RatingScale::SignedInteger),
            "signed_small" | "small" => Ok(RatingScale::SignedSmall),
            other => Err(format!(
                "unknown rating scale '{}' (expected letter_grade, signed_integer or signed_small)",
                other
            )),
        }
    }
}

/// Normalize a raw rating onto the canonical scale.
///
/// # Examples
///
/// ```
/// use assay_domain::rating::{normalize, CanonicalRating, RatingScale};
///
/// assert_eq!(normalize("A", RatingScale::LetterGrade).unwrap(), CanonicalRating::MOST_POSITIVE);
/// assert_eq!(normalize("-2", RatingScale::SignedSmall).unwrap(), CanonicalRating::MOST_NEGATIVE);
/// assert_eq!(normalize("+3", RatingScale::SignedInteger).unwrap().value(), 3);
/// assert!(normalize("Z", RatingScale::LetterGrade).is_err());
/// ```
pub fn normalize(raw: &str, scale: RatingScale) -> Result<CanonicalRating, NormalizationError> {
    let trimmed = raw.trim();
    let value = match scale {
        RatingScale::LetterGrade => letter_value(trimmed),
        RatingScale::SignedInteger => signed_value(trimmed, 4).map(|v| v as i8),
        RatingScale::SignedSmall => signed_value(trimmed, 2).map(|v| (v * 2) as i8),
    };

    value
        .and_then(CanonicalRating::new)
        .ok_or_else(|| NormalizationError {
            raw: raw.to_string(),
            scale: scale.as_str().to_string(),
        })
}

fn letter_value(raw: &str) -> Option<i8> {
    let mut chars = raw.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() {
        return None;
    }
    let position = LETTER_GRADES.iter().position(|&g| g == letter)?;
    Some(CANONICAL_MAX - position as i8)
}

fn signed_value(raw: &str, bound: i64) -> Option<i64> {
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    let value: i64 = digits.parse().ok()?;
    (-bound..=bound).contains(&value).then_some(value)
}

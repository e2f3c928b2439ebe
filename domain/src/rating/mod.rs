//! Rating scales and the canonical rating every record is normalized to.

pub mod scale;

pub use scale::{CANONICAL_MAX, CANONICAL_MIN, CanonicalRating, RatingScale, normalize};

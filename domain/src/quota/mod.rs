//! Quota planning: how many items each `(category, rater, polarity)` cell owes.

pub mod plan;
pub mod planner;

pub use plan::{CategoryQuota, CellQuota, PolaritySplit, QuotaPlan, RaterWeight, RemainderRule};
pub use planner::{QuotaPlanner, WEIGHT_TOLERANCE, largest_remainder};

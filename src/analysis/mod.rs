//! Analysis modules.
//!
//! Aggregation of observations, admin-area statistics and unit helpers.

pub mod admin_stats;
pub mod aggregator;
pub mod units;

pub use admin_stats::*;
pub use aggregator::*;
pub use units::*;

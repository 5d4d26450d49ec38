//! Facility aggregation.
//!
//! Groups facility records by owner or by state and derives the summary
//! statistics behind the leaderboards and rollup tables. Aggregates are
//! recomputed from the dataset on every request and never persisted.

pub mod owners;
pub mod states;
pub mod types;
pub mod utility;

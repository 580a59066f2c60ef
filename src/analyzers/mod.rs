//! Trip aggregation.
//!
//! Turns raw trips into the two reporting tables every page consumes: the
//! top-N station ranking and the date-ordered daily series joined with
//! temperature.

pub mod aggregate;
pub mod types;
pub mod utility;

//! Fetches NOAA daily temperature extremes and EIA hourly electricity demand
//! for a fixed set of U.S. cities over a rolling 90-day window, and writes
//! both as fixed-schema CSV files.

pub mod config;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod sources;
pub mod window;

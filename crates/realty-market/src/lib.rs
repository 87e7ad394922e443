//! Listing model, filterable query engine, and moderation workflow for a
//! real-estate marketplace.

pub mod config;
pub mod error;
pub mod marketplace;
pub mod ratelimit;
pub mod telemetry;

//! Shared run state
//!
//! This module provides the pieces of state shared by concurrent workers during
//! a board run.
//!
//! # Components
//!
//! - `RateLimiter`: per-traffic-class politeness spacing of outbound calls
//! - `StatsAggregator`: atomically updated counters merged across workers

mod rate_limiter;
mod stats;

// Re-export main types
pub use rate_limiter::{RateLimiter, TrafficClass};
pub use stats::{Stat, StatsAggregator, StatsSnapshot, Timing};

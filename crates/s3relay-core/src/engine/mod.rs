//! Transfer engine
//!
//! - Per-channel byte-rate limiting (token bucket and scoped pacing)
//! - Fetch-then-store pipeline for a single task
//! - Sequential batch driver with per-task failure isolation

mod driver;
mod pipeline;
mod rate_limiter;

pub use driver::*;
pub use pipeline::*;
pub use rate_limiter::*;

#![forbid(unsafe_code)]
//! docql-limit: fixed-window rate limiting keyed by caller identity.
//!
//! The limiter is the only shared mutable state in the compiler. Every
//! check-and-increment happens under one lock, so concurrent callers can
//! neither overshoot the limit nor lose a use.

pub mod error;
pub mod limiter;

pub use error::{Error, Result};
pub use limiter::{RateLimitStats, RateLimiter};

//! Admission guard: authentication and per-identity rate limiting.
//!
//! Both checks run before any subprocess work is attempted, and neither
//! has side effects on denial.

pub mod auth;
pub mod rate_limit;

pub use auth::{ApiKeySet, AuthError, Identity};
pub use rate_limit::{RateLimiter, RetryAfter};

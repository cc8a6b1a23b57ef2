//! Request budgeting and hostile-input heuristics for search endpoints.

pub mod rate_limit;
pub mod security;

pub use rate_limit::{InMemoryRateLimitStore, RateDecision, RateLimitStore, RateLimiter, RedisRateLimitStore};
pub use security::{FindingKind, SecurityFinding, SecurityMonitor, Severity};

//! spotex core library.
//!
//! Search filters for the freight spot exchange: validation, normalization, tenant-scoped
//! RediSearch query building, per-user saved searches, rate limiting and input heuristics.

pub mod config;
pub mod errors;
pub mod filters;
pub mod id;
pub mod keys;
pub mod monitor;
pub mod saved_search;
pub mod search;
pub mod validators;

pub use config::ExchangeConfig;
pub use errors::*;
pub use filters::{SearchFilters, normalize, normalize_value, validate, validate_value};
pub use saved_search::{NewSavedSearch, SavedSearch, SavedSearchService, SavedSearchStore};
pub use search::{OpportunityQuery, SearchResult, SortOrder};

pub use redis;
pub use redis::aio::ConnectionManager;

//! Opportunity search filters: the value type, its validator, and its normalizer.
//!
//! Incoming filters flow `validate` → `normalize` → query builder. Saved searches store the
//! normalized form.

pub mod normalize;
pub mod types;
pub mod validate;

pub use normalize::{normalize, normalize_value};
pub use types::*;
pub use validate::{ensure_valid, validate, validate_value};

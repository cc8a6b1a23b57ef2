//! Per-user saved searches.
//!
//! A saved search is a named, normalized [`SearchFilters`] snapshot owned by one user inside
//! one tenant. Persistence goes through [`SavedSearchStore`]; [`SavedSearchService`] adds input
//! validation, the per-user limit and logging on top of any store.

pub mod redis_store;
pub mod scripts;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

use crate::errors::{SearchError, ValidationError, ValidationIssue, codes};
use crate::filters::{SearchFilters, normalize, validate_value};
use crate::id::{generate_search_id, is_search_id};
use crate::validators::is_valid_uuid;

pub use redis_store::RedisSavedSearchStore;
pub use store::{InMemorySavedSearchStore, SavedSearchStore};

pub const DEFAULT_MAX_PER_USER: usize = 25;
pub const DEFAULT_MAX_NAME_LENGTH: usize = 100;

#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSearch {
    pub id: String,
    pub user_id: String,
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub use_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`SavedSearchService::create`]. Filters arrive as raw JSON so malformed
/// payloads are reported as validation issues rather than deserialization failures.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSavedSearch {
    pub user_id: String,
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub filters: Value,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedSearchLimits {
    pub max_per_user: usize,
    pub max_name_length: usize,
}

impl Default for SavedSearchLimits {
    fn default() -> Self {
        Self {
            max_per_user: DEFAULT_MAX_PER_USER,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
        }
    }
}

#[derive(Debug)]
pub struct SavedSearchService<S> {
    store: S,
    limits: SavedSearchLimits,
}

impl<S: SavedSearchStore> SavedSearchService<S> {
    pub fn new(store: S, limits: SavedSearchLimits) -> Self {
        Self { store, limits }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn limits(&self) -> SavedSearchLimits {
        self.limits
    }

    /// Validate, normalize and persist a new saved search.
    ///
    /// Every problem with the input is reported in one [`ValidationError`]. The per-user limit
    /// is checked before insert.
    pub async fn create(&self, input: NewSavedSearch) -> Result<SavedSearch, SearchError> {
        let mut issues = Vec::new();
        let user_id = canonical_uuid("user_id", &input.user_id, &mut issues);
        let tenant_id = canonical_uuid("tenant_id", &input.tenant_id, &mut issues);
        let name = self.check_name(&input.name, &mut issues);
        let filters = check_filters(&input.filters, &mut issues);
        ValidationError::new(issues).into_result()?;

        let existing = self.store.count_for_user(&user_id).await?;
        if existing >= self.limits.max_per_user {
            log::info!("user {user_id} hit the saved search limit ({})", self.limits.max_per_user);
            return Err(SearchError::LimitExceeded {
                limit: self.limits.max_per_user,
            });
        }

        let now = Utc::now();
        let mut search = SavedSearch {
            id: generate_search_id(),
            user_id,
            tenant_id,
            name,
            filters,
            is_default: false,
            use_count: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&search, input.is_default).await?;
        search.is_default = input.is_default;
        log::info!(
            "created saved search {} for user {} (default: {})",
            search.id,
            search.user_id,
            search.is_default
        );
        Ok(search)
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<SavedSearch>, SearchError> {
        let user_id = require_user(user_id)?;
        self.store.list_for_user(&user_id).await
    }

    pub async fn get(&self, user_id: &str, search_id: &str) -> Result<SavedSearch, SearchError> {
        let user_id = require_user(user_id)?;
        let search_id = require_search_id(search_id)?;
        self.store
            .get(&user_id, search_id)
            .await?
            .ok_or_else(|| not_found(search_id))
    }

    pub async fn rename(&self, user_id: &str, search_id: &str, name: &str) -> Result<SavedSearch, SearchError> {
        let mut issues = Vec::new();
        let name = self.check_name(name, &mut issues);
        ValidationError::new(issues).into_result()?;

        let mut search = self.get(user_id, search_id).await?;
        search.name = name;
        search.updated_at = Utc::now();
        self.store.update(&search).await?;
        log::info!("renamed saved search {} for user {}", search.id, search.user_id);
        Ok(search)
    }

    /// Replace the stored filters. Issues are reported under `filters.<path>`.
    pub async fn update_filters(
        &self,
        user_id: &str,
        search_id: &str,
        filters: &Value,
    ) -> Result<SavedSearch, SearchError> {
        let mut issues = Vec::new();
        let filters = check_filters(filters, &mut issues);
        ValidationError::new(issues).into_result()?;

        let mut search = self.get(user_id, search_id).await?;
        search.filters = filters;
        search.updated_at = Utc::now();
        self.store.update(&search).await?;
        log::info!("updated filters of saved search {} for user {}", search.id, search.user_id);
        Ok(search)
    }

    pub async fn delete(&self, user_id: &str, search_id: &str) -> Result<(), SearchError> {
        let user_id = require_user(user_id)?;
        let search_id = require_search_id(search_id)?;
        if !self.store.delete(&user_id, search_id).await? {
            return Err(not_found(search_id));
        }
        log::info!("deleted saved search {search_id} for user {user_id}");
        Ok(())
    }

    /// Make `search_id` the user's default, replacing any previous default.
    pub async fn set_default(&self, user_id: &str, search_id: &str) -> Result<SavedSearch, SearchError> {
        let user_id = require_user(user_id)?;
        let search_id = require_search_id(search_id)?;
        self.store.set_default(&user_id, search_id).await?;
        log::info!("saved search {search_id} is now the default for user {user_id}");
        self.store
            .get(&user_id, search_id)
            .await?
            .ok_or_else(|| not_found(search_id))
    }

    pub async fn clear_default(&self, user_id: &str) -> Result<(), SearchError> {
        let user_id = require_user(user_id)?;
        self.store.clear_default(&user_id).await?;
        log::info!("cleared default saved search for user {user_id}");
        Ok(())
    }

    pub async fn default_search(&self, user_id: &str) -> Result<Option<SavedSearch>, SearchError> {
        let user_id = require_user(user_id)?;
        self.store.default_for_user(&user_id).await
    }

    /// Count one use of the search and return it, ready to be executed.
    pub async fn record_use(&self, user_id: &str, search_id: &str) -> Result<SavedSearch, SearchError> {
        let user_id = require_user(user_id)?;
        let search_id = require_search_id(search_id)?;
        let search = self
            .store
            .record_use(&user_id, search_id, Utc::now())
            .await?
            .ok_or_else(|| not_found(search_id))?;
        log::debug!("saved search {search_id} used {} time(s)", search.use_count);
        Ok(search)
    }

    fn check_name(&self, name: &str, issues: &mut Vec<ValidationIssue>) -> String {
        let name = name.trim();
        let length = name.chars().count();
        if length == 0 {
            issues.push(ValidationIssue::new("name", codes::REQUIRED, "name must not be empty"));
        } else if length > self.limits.max_name_length {
            issues.push(ValidationIssue::new(
                "name",
                codes::LENGTH,
                format!("name must be at most {} characters", self.limits.max_name_length),
            ));
        }
        name.to_string()
    }
}

fn canonical_uuid(field: &str, value: &str, issues: &mut Vec<ValidationIssue>) -> String {
    let value = value.trim();
    if !is_valid_uuid(value) {
        issues.push(ValidationIssue::new(field, codes::FORMAT, format!("{field} must be a UUID")));
    }
    value.to_ascii_lowercase()
}

fn check_filters(raw: &Value, issues: &mut Vec<ValidationIssue>) -> SearchFilters {
    let found = validate_value(raw);
    if !found.is_empty() {
        issues.extend(found.into_iter().map(|mut issue| {
            if issue.field != "filters" {
                issue.field = format!("filters.{}", issue.field);
            }
            issue
        }));
        return SearchFilters::default();
    }
    SearchFilters::from_value(raw).map(normalize).unwrap_or_default()
}

fn require_user(user_id: &str) -> Result<String, SearchError> {
    let user_id = user_id.trim();
    if !is_valid_uuid(user_id) {
        return Err(SearchError::invalid(format!("user id '{user_id}' is not a UUID")));
    }
    Ok(user_id.to_ascii_lowercase())
}

fn require_search_id(search_id: &str) -> Result<&str, SearchError> {
    let search_id = search_id.trim();
    if !is_search_id(search_id) {
        return Err(not_found(search_id));
    }
    Ok(search_id)
}

fn not_found(search_id: &str) -> SearchError {
    SearchError::NotFound {
        saved_search_id: Some(search_id.to_string()),
    }
}

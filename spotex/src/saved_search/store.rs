use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::errors::SearchError;
use crate::saved_search::SavedSearch;

/// Persistence seam for saved searches.
///
/// Implementations own the "at most one default per user" rule: `is_default` on returned
/// records reflects the store's single default slot for that user, never a flag written by
/// the caller.
#[allow(async_fn_in_trait)]
pub trait SavedSearchStore {
    /// Persist a new record; when `make_default` the record also takes the user's default slot.
    async fn insert(&self, search: &SavedSearch, make_default: bool) -> Result<(), SearchError>;

    async fn get(&self, user_id: &str, search_id: &str) -> Result<Option<SavedSearch>, SearchError>;

    /// All searches owned by the user, default first, then most recently updated.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SavedSearch>, SearchError>;

    async fn count_for_user(&self, user_id: &str) -> Result<usize, SearchError>;

    /// Overwrite an existing record. Fails with `NotFound` when it does not exist.
    ///
    /// `use_count` and `last_used_at` belong to the store and are left as stored, so a
    /// concurrent [`record_use`](Self::record_use) is never lost.
    async fn update(&self, search: &SavedSearch) -> Result<(), SearchError>;

    /// Remove a record, releasing the default slot if it held it. Returns whether it existed.
    async fn delete(&self, user_id: &str, search_id: &str) -> Result<bool, SearchError>;

    /// Point the user's default slot at an existing record. Fails with `NotFound` otherwise.
    async fn set_default(&self, user_id: &str, search_id: &str) -> Result<(), SearchError>;

    async fn clear_default(&self, user_id: &str) -> Result<(), SearchError>;

    async fn default_for_user(&self, user_id: &str) -> Result<Option<SavedSearch>, SearchError>;

    /// Increment the usage counter and stamp `last_used_at`, returning the updated record.
    async fn record_use(
        &self,
        user_id: &str,
        search_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<SavedSearch>, SearchError>;
}

/// Orders searches the way every store returns them.
pub(crate) fn sort_for_listing(searches: &mut [SavedSearch]) {
    searches.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[derive(Debug, Default)]
struct UserSearches {
    searches: HashMap<String, SavedSearch>,
    default_id: Option<String>,
}

impl UserSearches {
    fn materialize(&self, search: &SavedSearch) -> SavedSearch {
        let mut search = search.clone();
        search.is_default = self.default_id.as_deref() == Some(search.id.as_str());
        search
    }
}

/// Process-local store, used by tests and single-node tooling.
#[derive(Debug, Default)]
pub struct InMemorySavedSearchStore {
    users: Mutex<HashMap<String, UserSearches>>,
}

impl InMemorySavedSearchStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, UserSearches>>, SearchError> {
        self.users
            .lock()
            .map_err(|_| SearchError::other("saved search store lock poisoned"))
    }
}

impl SavedSearchStore for InMemorySavedSearchStore {
    async fn insert(&self, search: &SavedSearch, make_default: bool) -> Result<(), SearchError> {
        let mut users = self.lock()?;
        let user = users.entry(search.user_id.clone()).or_default();
        let mut stored = search.clone();
        stored.is_default = false;
        user.searches.insert(stored.id.clone(), stored);
        if make_default {
            user.default_id = Some(search.id.clone());
        }
        Ok(())
    }

    async fn get(&self, user_id: &str, search_id: &str) -> Result<Option<SavedSearch>, SearchError> {
        let users = self.lock()?;
        Ok(users
            .get(user_id)
            .and_then(|user| user.searches.get(search_id).map(|search| user.materialize(search))))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SavedSearch>, SearchError> {
        let users = self.lock()?;
        let mut searches: Vec<SavedSearch> = users
            .get(user_id)
            .map(|user| user.searches.values().map(|search| user.materialize(search)).collect())
            .unwrap_or_default();
        sort_for_listing(&mut searches);
        Ok(searches)
    }

    async fn count_for_user(&self, user_id: &str) -> Result<usize, SearchError> {
        let users = self.lock()?;
        Ok(users.get(user_id).map_or(0, |user| user.searches.len()))
    }

    async fn update(&self, search: &SavedSearch) -> Result<(), SearchError> {
        let mut users = self.lock()?;
        let slot = users
            .get_mut(&search.user_id)
            .and_then(|user| user.searches.get_mut(&search.id))
            .ok_or_else(|| SearchError::NotFound {
                saved_search_id: Some(search.id.clone()),
            })?;
        let (use_count, last_used_at) = (slot.use_count, slot.last_used_at);
        *slot = SavedSearch {
            is_default: false,
            use_count,
            last_used_at,
            ..search.clone()
        };
        Ok(())
    }

    async fn delete(&self, user_id: &str, search_id: &str) -> Result<bool, SearchError> {
        let mut users = self.lock()?;
        let Some(user) = users.get_mut(user_id) else {
            return Ok(false);
        };
        let removed = user.searches.remove(search_id).is_some();
        if user.default_id.as_deref() == Some(search_id) {
            user.default_id = None;
        }
        Ok(removed)
    }

    async fn set_default(&self, user_id: &str, search_id: &str) -> Result<(), SearchError> {
        let mut users = self.lock()?;
        match users.get_mut(user_id) {
            Some(user) if user.searches.contains_key(search_id) => {
                user.default_id = Some(search_id.to_string());
                Ok(())
            }
            _ => Err(SearchError::NotFound {
                saved_search_id: Some(search_id.to_string()),
            }),
        }
    }

    async fn clear_default(&self, user_id: &str) -> Result<(), SearchError> {
        let mut users = self.lock()?;
        if let Some(user) = users.get_mut(user_id) {
            user.default_id = None;
        }
        Ok(())
    }

    async fn default_for_user(&self, user_id: &str) -> Result<Option<SavedSearch>, SearchError> {
        let users = self.lock()?;
        Ok(users.get(user_id).and_then(|user| {
            let id = user.default_id.as_deref()?;
            user.searches.get(id).map(|search| user.materialize(search))
        }))
    }

    async fn record_use(
        &self,
        user_id: &str,
        search_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<SavedSearch>, SearchError> {
        let mut users = self.lock()?;
        let Some(user) = users.get_mut(user_id) else {
            return Ok(None);
        };
        let Some(search) = user.searches.get_mut(search_id) else {
            return Ok(None);
        };
        search.use_count += 1;
        search.last_used_at = Some(at);
        let snapshot = search.clone();
        Ok(Some(user.materialize(&snapshot)))
    }
}

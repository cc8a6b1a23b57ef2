use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use redis::aio::ConnectionManager;
use redis::{cmd, pipe};

use crate::errors::SearchError;
use crate::keys::KeyContext;
use crate::saved_search::SavedSearch;
use crate::saved_search::scripts::{
    SAVED_SEARCH_DELETE_SCRIPT, SAVED_SEARCH_RECORD_USE_SCRIPT, SAVED_SEARCH_SET_DEFAULT_SCRIPT,
};
use crate::saved_search::store::{SavedSearchStore, sort_for_listing};

/// Saved searches stored as JSON strings, one key per record.
///
/// ```text
/// {prefix}:saved_search:{user}:{id}        record
/// {prefix}:saved_search:{user}:{id}:usage  hash of use_count, last_used_at
/// {prefix}:saved_search:{user}:ids         set of ids
/// {prefix}:saved_search:{user}:default     id of the default record
/// ```
///
/// Records never carry `is_default` or usage; both are merged in on read.
/// `HMGET usage use_count last_used_at`
type Usage = (Option<u64>, Option<String>);

const USAGE_FIELDS: [&str; 2] = ["use_count", "last_used_at"];

#[derive(Clone)]
pub struct RedisSavedSearchStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisSavedSearchStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    fn keys(&self) -> KeyContext<'_> {
        KeyContext::new(&self.prefix)
    }

    fn encode(search: &SavedSearch) -> Result<String, SearchError> {
        let stored = SavedSearch {
            is_default: false,
            use_count: 0,
            last_used_at: None,
            ..search.clone()
        };
        serde_json::to_string(&stored)
            .map_err(|err| SearchError::other(format!("failed to serialize saved search: {err}")))
    }

    fn decode(raw: &str, default_id: Option<&str>, usage: Usage) -> Result<SavedSearch, SearchError> {
        let mut search: SavedSearch = serde_json::from_str(raw)
            .map_err(|err| SearchError::other(format!("failed to parse saved search: {err}")))?;
        let (use_count, last_used_at) = usage;
        search.is_default = default_id == Some(search.id.as_str());
        search.use_count = use_count.unwrap_or(0);
        search.last_used_at = last_used_at.as_deref().map(parse_timestamp).transpose()?;
        Ok(search)
    }
}

impl SavedSearchStore for RedisSavedSearchStore {
    async fn insert(&self, search: &SavedSearch, make_default: bool) -> Result<(), SearchError> {
        let keys = self.keys();
        let payload = Self::encode(search)?;
        let mut pipeline = pipe();
        pipeline
            .atomic()
            .set(keys.saved_search(&search.user_id, &search.id), payload)
            .ignore()
            .sadd(keys.saved_search_ids(&search.user_id), &search.id)
            .ignore();
        if make_default {
            pipeline
                .set(keys.saved_search_default(&search.user_id), &search.id)
                .ignore();
        }
        let mut conn = self.conn.clone();
        pipeline.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, user_id: &str, search_id: &str) -> Result<Option<SavedSearch>, SearchError> {
        let keys = self.keys();
        let mut conn = self.conn.clone();
        let (raw, default_id, usage): (Option<String>, Option<String>, Usage) = pipe()
            .get(keys.saved_search(user_id, search_id))
            .get(keys.saved_search_default(user_id))
            .cmd("HMGET")
            .arg(keys.saved_search_usage(user_id, search_id))
            .arg(&USAGE_FIELDS[..])
            .query_async(&mut conn)
            .await?;
        raw.map(|raw| Self::decode(&raw, default_id.as_deref(), usage))
            .transpose()
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SavedSearch>, SearchError> {
        let keys = self.keys();
        let mut conn = self.conn.clone();
        let (ids, default_id): (HashSet<String>, Option<String>) = pipe()
            .smembers(keys.saved_search_ids(user_id))
            .get(keys.saved_search_default(user_id))
            .query_async(&mut conn)
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ids.into_iter().collect();
        let record_keys: Vec<String> = ids.iter().map(|id| keys.saved_search(user_id, id)).collect();
        let records: Vec<Option<String>> = cmd("MGET").arg(&record_keys).query_async(&mut conn).await?;

        let mut usage_pipeline = pipe();
        for id in &ids {
            usage_pipeline
                .cmd("HMGET")
                .arg(keys.saved_search_usage(user_id, id))
                .arg(&USAGE_FIELDS[..]);
        }
        let usage: Vec<Usage> = usage_pipeline.query_async(&mut conn).await?;

        let mut searches = Vec::with_capacity(records.len());
        for (raw, usage) in records.into_iter().zip(usage) {
            if let Some(raw) = raw {
                searches.push(Self::decode(&raw, default_id.as_deref(), usage)?);
            }
        }
        sort_for_listing(&mut searches);
        Ok(searches)
    }

    async fn count_for_user(&self, user_id: &str) -> Result<usize, SearchError> {
        let mut conn = self.conn.clone();
        let count: usize = cmd("SCARD")
            .arg(self.keys().saved_search_ids(user_id))
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn update(&self, search: &SavedSearch) -> Result<(), SearchError> {
        let payload = Self::encode(search)?;
        let mut conn = self.conn.clone();
        let written: Option<String> = cmd("SET")
            .arg(self.keys().saved_search(&search.user_id, &search.id))
            .arg(payload)
            .arg("XX")
            .query_async(&mut conn)
            .await?;
        if written.is_none() {
            return Err(SearchError::NotFound {
                saved_search_id: Some(search.id.clone()),
            });
        }
        Ok(())
    }

    async fn delete(&self, user_id: &str, search_id: &str) -> Result<bool, SearchError> {
        let keys = self.keys();
        let mut invocation = SAVED_SEARCH_DELETE_SCRIPT.prepare_invoke();
        invocation
            .key(keys.saved_search(user_id, search_id))
            .key(keys.saved_search_ids(user_id))
            .key(keys.saved_search_default(user_id))
            .key(keys.saved_search_usage(user_id, search_id))
            .arg(search_id);
        let mut conn = self.conn.clone();
        let removed: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn set_default(&self, user_id: &str, search_id: &str) -> Result<(), SearchError> {
        let keys = self.keys();
        let mut invocation = SAVED_SEARCH_SET_DEFAULT_SCRIPT.prepare_invoke();
        invocation
            .key(keys.saved_search(user_id, search_id))
            .key(keys.saved_search_default(user_id))
            .arg(search_id);
        let mut conn = self.conn.clone();
        let updated: i64 = invocation.invoke_async(&mut conn).await?;
        if updated == 0 {
            return Err(SearchError::NotFound {
                saved_search_id: Some(search_id.to_string()),
            });
        }
        Ok(())
    }

    async fn clear_default(&self, user_id: &str) -> Result<(), SearchError> {
        let mut conn = self.conn.clone();
        cmd("DEL")
            .arg(self.keys().saved_search_default(user_id))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn default_for_user(&self, user_id: &str) -> Result<Option<SavedSearch>, SearchError> {
        let mut conn = self.conn.clone();
        let default_id: Option<String> = cmd("GET")
            .arg(self.keys().saved_search_default(user_id))
            .query_async(&mut conn)
            .await?;
        match default_id {
            Some(id) => self.get(user_id, &id).await,
            None => Ok(None),
        }
    }

    async fn record_use(
        &self,
        user_id: &str,
        search_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<SavedSearch>, SearchError> {
        let keys = self.keys();
        let stamp = at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut invocation = SAVED_SEARCH_RECORD_USE_SCRIPT.prepare_invoke();
        invocation
            .key(keys.saved_search(user_id, search_id))
            .key(keys.saved_search_usage(user_id, search_id))
            .arg(&stamp);
        let mut conn = self.conn.clone();
        let used: Option<(String, u64)> = invocation.invoke_async(&mut conn).await?;
        let Some((raw, use_count)) = used else {
            return Ok(None);
        };
        let default_id: Option<String> = cmd("GET")
            .arg(keys.saved_search_default(user_id))
            .query_async(&mut conn)
            .await?;
        Self::decode(&raw, default_id.as_deref(), (Some(use_count), Some(stamp))).map(Some)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SearchError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| SearchError::other(format!("invalid last_used_at '{raw}': {err}")))
}

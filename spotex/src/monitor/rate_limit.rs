use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::pipe;

use crate::errors::SearchError;
use crate::keys::KeyContext;

/// Counter backend for fixed-window rate limiting.
#[allow(async_fn_in_trait)]
pub trait RateLimitStore {
    /// Count one request for `subject` in the window containing `now` and return the
    /// number of requests seen in that window so far, this one included.
    async fn hit(&self, subject: &str, window: Duration, now: DateTime<Utc>) -> Result<u64, SearchError>;
}

/// Epoch second at which the window containing `now` started.
pub(crate) fn window_start(now: DateTime<Utc>, window: Duration) -> i64 {
    let secs = window_secs(window) as i64;
    let ts = now.timestamp();
    ts - ts.rem_euclid(secs)
}

fn window_secs(window: Duration) -> u64 {
    window.as_secs().max(1)
}

#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    windows: Mutex<HashMap<String, (i64, u64)>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(&self, subject: &str, window: Duration, now: DateTime<Utc>) -> Result<u64, SearchError> {
        let start = window_start(now, window);
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| SearchError::other("rate limit store lock poisoned"))?;
        let entry = windows.entry(subject.to_string()).or_insert((start, 0));
        if entry.0 != start {
            *entry = (start, 0);
        }
        entry.1 += 1;
        Ok(entry.1)
    }
}

/// One counter key per subject and window, expiring with the window.
#[derive(Clone)]
pub struct RedisRateLimitStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisRateLimitStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }
}

impl RateLimitStore for RedisRateLimitStore {
    async fn hit(&self, subject: &str, window: Duration, now: DateTime<Utc>) -> Result<u64, SearchError> {
        let key = KeyContext::new(&self.prefix).rate_limit(subject, window_start(now, window));
        let mut conn = self.conn.clone();
        let (count,): (u64,) = pipe()
            .atomic()
            .incr(&key, 1)
            .cmd("EXPIRE")
            .arg(&key)
            .arg(window_secs(window))
            .arg("NX")
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u64,
    /// Time until the current window closes; set only when the request was denied.
    pub retry_after: Option<Duration>,
}

#[derive(Debug)]
pub struct RateLimiter<S> {
    store: S,
    max_requests: u64,
    window: Duration,
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn new(store: S, max_requests: u64, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window,
        }
    }

    pub async fn check(&self, subject: &str) -> Result<RateDecision, SearchError> {
        self.check_at(subject, Utc::now()).await
    }

    pub async fn check_at(&self, subject: &str, now: DateTime<Utc>) -> Result<RateDecision, SearchError> {
        let count = self.store.hit(subject, self.window, now).await?;
        if count <= self.max_requests {
            return Ok(RateDecision {
                allowed: true,
                remaining: self.max_requests - count,
                retry_after: None,
            });
        }
        let window_end = window_start(now, self.window) + window_secs(self.window) as i64;
        let retry_after = Duration::from_secs((window_end - now.timestamp()).max(1) as u64);
        Ok(RateDecision {
            allowed: false,
            remaining: 0,
            retry_after: Some(retry_after),
        })
    }

    /// Like [`check`](Self::check) but turns a denial into [`SearchError::RateLimited`].
    pub async fn enforce(&self, subject: &str) -> Result<RateDecision, SearchError> {
        self.enforce_at(subject, Utc::now()).await
    }

    pub async fn enforce_at(&self, subject: &str, now: DateTime<Utc>) -> Result<RateDecision, SearchError> {
        let decision = self.check_at(subject, now).await?;
        if decision.allowed {
            return Ok(decision);
        }
        let retry_after_secs = decision.retry_after.map_or(1, |d| d.as_secs());
        log::warn!("rate limit exceeded for {subject}; retry after {retry_after_secs}s");
        Err(SearchError::RateLimited {
            key: subject.to_string(),
            retry_after_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    #[test]
    fn windows_align_to_their_length() {
        let minute = Duration::from_secs(60);
        assert_eq!(window_start(at(1_700_000_059), minute), 1_700_000_040);
        assert_eq!(window_start(at(1_700_000_100), minute), 1_700_000_100);
        assert_eq!(window_start(at(17), Duration::ZERO), 17);
    }

    #[tokio::test]
    async fn allows_up_to_the_limit_then_denies() {
        let limiter = RateLimiter::new(InMemoryRateLimitStore::new(), 3, Duration::from_secs(60));
        let now = at(1_700_000_045);

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_at("search:u1", now).await.expect("check");
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }
        let denied = limiter.check_at("search:u1", now).await.expect("check");
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Some(Duration::from_secs(55)));
    }

    #[tokio::test]
    async fn subjects_and_windows_are_independent() {
        let limiter = RateLimiter::new(InMemoryRateLimitStore::new(), 1, Duration::from_secs(60));
        let now = at(1_700_000_045);

        assert!(limiter.check_at("search:u1", now).await.expect("check").allowed);
        assert!(limiter.check_at("search:u2", now).await.expect("check").allowed);
        assert!(!limiter.check_at("search:u1", now).await.expect("check").allowed);
        assert!(limiter.check_at("search:u1", at(1_700_000_100)).await.expect("check").allowed);
    }

    #[tokio::test]
    async fn enforce_reports_retry_after() {
        let limiter = RateLimiter::new(InMemoryRateLimitStore::new(), 0, Duration::from_secs(30));
        let err = limiter
            .enforce_at("saved:u1", at(1_700_000_020))
            .await
            .expect_err("limit of zero");
        match err {
            SearchError::RateLimited { key, retry_after_secs } => {
                assert_eq!(key, "saved:u1");
                assert_eq!(retry_after_secs, 20);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

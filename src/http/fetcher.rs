use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::Utc;
use rusqlite::Connection;
use sha1::{Digest, Sha1};

use super::client::{Request, RequestError, Response, Transport};
use super::rate_limiter::RateLimiter;
use crate::store::http_cache::{self, CacheEntry};

/// Rate-limited fetch primitive backed by a persistent response cache.
///
/// Fresh cache hits are served without consuming rate-limit quota. Misses wait
/// on the shared [`RateLimiter`], go out through the [`Transport`] and, for
/// `200` responses to GET/HEAD requests, are written back to the cache.
pub struct CachingFetcher {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    cache: Mutex<Connection>,
    ttl: Duration,
    stale_if_error: bool,
}

/// Cache key: SHA-1 hex digest of the canonical request text.
pub fn cache_key(request: &Request) -> String {
    format!("{:x}", Sha1::digest(request.canonical().as_bytes()))
}

impl CachingFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        conn: Connection,
        ttl: Duration,
        stale_if_error: bool,
    ) -> rusqlite::Result<Self> {
        http_cache::create_table(&conn)?;
        Ok(Self {
            transport,
            limiter,
            cache: Mutex::new(conn),
            ttl,
            stale_if_error,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub async fn fetch(&self, request: &Request) -> Result<Response, RequestError> {
        let cacheable = request.is_cacheable();
        let key = cache_key(request);

        let mut stale = None;
        if cacheable {
            match self.lookup(&key) {
                Some(entry) if entry.is_fresh(Utc::now().timestamp_millis()) => {
                    log::debug!("cache hit: {}", request);
                    return Ok(cached_response(entry));
                }
                Some(entry) => stale = Some(entry),
                None => {}
            }
        }

        self.limiter.admit().await;
        log::debug!("fetching {}", request);

        match self.transport.execute(request).await {
            Ok(response) if response.is_success() => {
                if cacheable && response.status == 200 {
                    self.store(&key, request, &response);
                }
                Ok(response)
            }
            Ok(response) => {
                let err = RequestError::Http {
                    url: request.url.to_string(),
                    status: response.status,
                    body: response.body,
                };
                self.fall_back(request, stale, err)
            }
            Err(err) => self.fall_back(request, stale, err),
        }
    }

    /// Removes expired entries. Returns the number removed.
    pub fn purge_expired(&self) -> rusqlite::Result<usize> {
        let conn = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        http_cache::purge_expired(&conn, Utc::now().timestamp_millis())
    }

    /// Removes every entry. Returns the number removed.
    pub fn clear(&self) -> rusqlite::Result<usize> {
        let conn = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        http_cache::clear(&conn)
    }

    fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let conn = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        match http_cache::get_entry(&conn, key) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("cache read failed, treating as miss: {}", e);
                None
            }
        }
    }

    fn store(&self, key: &str, request: &Request, response: &Response) {
        let now = Utc::now().timestamp_millis();
        let ttl = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let entry = CacheEntry {
            key: key.to_string(),
            request: request.canonical(),
            status: response.status,
            body: response.body.clone(),
            expires_at: now.saturating_add(ttl),
            created_at: now,
        };

        let conn = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = http_cache::save_entry(&conn, &entry) {
            log::warn!("cache write failed for {}: {}", request, e);
        }
    }

    fn fall_back(
        &self,
        request: &Request,
        stale: Option<CacheEntry>,
        err: RequestError,
    ) -> Result<Response, RequestError> {
        match stale {
            Some(entry) if self.stale_if_error => {
                log::warn!("serving stale cache entry for {} after error: {}", request, err);
                Ok(cached_response(entry))
            }
            _ => Err(err),
        }
    }
}

fn cached_response(entry: CacheEntry) -> Response {
    Response {
        status: entry.status,
        body: entry.body,
        from_cache: true,
    }
}

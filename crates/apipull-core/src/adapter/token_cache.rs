//! Single-flight auth token cache
//!
//! Vendors that hand out short-lived bearer tokens per API version get one
//! refresh at a time: concurrent requests that find the cache empty (or
//! invalidated after a 401) queue behind a refresh gate, and all but the
//! first find a fresh token on re-check.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;

use tracing::debug;

use crate::error::{CoreError, Result};

#[derive(Default)]
pub struct TokenCache {
    tokens: Mutex<HashMap<u32, String>>,
    invalidated: Mutex<HashSet<u32>>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached token for `api_version`, refreshing it first if
    /// none is cached or the cached one was invalidated. `refresh` is
    /// called at most once per miss across all concurrent callers.
    pub async fn get_or_refresh<F, Fut>(&self, api_version: u32, refresh: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        if let Some(token) = self.cached(api_version)? {
            return Ok(token);
        }

        let _gate = self.refresh_gate.lock().await;
        // Another caller may have refreshed while we waited on the gate.
        if let Some(token) = self.cached(api_version)? {
            return Ok(token);
        }

        debug!(api_version, "refreshing auth token");
        let token = refresh().await?;
        if token.trim().is_empty() {
            return Err(CoreError::Auth(format!(
                "token refresh for api version {api_version} returned an empty token"
            )));
        }

        self.lock_tokens()?.insert(api_version, token.clone());
        self.lock_invalidated()?.remove(&api_version);
        Ok(token)
    }

    /// Mark the token for `api_version` stale (typically after a 401).
    /// The next `get_or_refresh` performs a refresh. Synchronous so it can
    /// be called from response classification.
    pub fn invalidate(&self, api_version: u32) -> Result<()> {
        debug!(api_version, "invalidating auth token");
        self.lock_invalidated()?.insert(api_version);
        Ok(())
    }

    fn cached(&self, api_version: u32) -> Result<Option<String>> {
        if self.lock_invalidated()?.contains(&api_version) {
            return Ok(None);
        }
        Ok(self
            .lock_tokens()?
            .get(&api_version)
            .filter(|t| !t.is_empty())
            .cloned())
    }

    fn lock_tokens(&self) -> Result<std::sync::MutexGuard<'_, HashMap<u32, String>>> {
        self.tokens
            .lock()
            .map_err(|_| CoreError::Auth("token cache lock poisoned".to_string()))
    }

    fn lock_invalidated(&self) -> Result<std::sync::MutexGuard<'_, HashSet<u32>>> {
        self.invalidated
            .lock()
            .map_err(|_| CoreError::Auth("token cache lock poisoned".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_refresh_called_once_then_cached() {
        let cache = TokenCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let token = cache
                .get_or_refresh(4, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("token-a".to_string())
                })
                .await
                .unwrap();
            assert_eq!(token, "token-a");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let cache = TokenCache::new();
        let calls = AtomicUsize::new(0);
        let refresh = || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("token-{n}"))
        };

        assert_eq!(cache.get_or_refresh(4, refresh).await.unwrap(), "token-0");
        cache.invalidate(4).unwrap();
        assert_eq!(cache.get_or_refresh(4, refresh).await.unwrap(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_versions_cached_independently() {
        let cache = TokenCache::new();
        let v4 = cache
            .get_or_refresh(4, || async { Ok("v4-token".to_string()) })
            .await
            .unwrap();
        let v5 = cache
            .get_or_refresh(5, || async { Ok("v5-token".to_string()) })
            .await
            .unwrap();
        assert_eq!(v4, "v4-token");
        assert_eq!(v5, "v5-token");

        cache.invalidate(4).unwrap();
        // v5 still served from cache
        let v5_again = cache
            .get_or_refresh(5, || async { panic!("should not refresh") })
            .await
            .unwrap();
        assert_eq!(v5_again, "v5-token");
    }

    #[tokio::test]
    async fn test_concurrent_misses_refresh_once() {
        let cache = Arc::new(TokenCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh(4, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        Ok("shared-token".to_string())
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), "shared-token");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_token_is_an_error() {
        let cache = TokenCache::new();
        let result = cache.get_or_refresh(4, || async { Ok("  ".to_string()) }).await;
        assert!(matches!(result, Err(CoreError::Auth(_))));
    }
}

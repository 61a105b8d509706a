use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::Result;

/// How long before expiry a token is treated as stale.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }
}

/// Single-slot bearer token cache owned by a carrier client.
///
/// The slot is guarded by an async mutex held across the refresh call,
/// so concurrent callers finding a stale token collapse into one
/// in-flight token request; the rest wait and reuse its result.
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token, refreshing through `refresh` when the
    /// slot is empty or within the refresh margin of expiry. `refresh`
    /// yields the token and its validity duration.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, Duration)>>,
    {
        let mut slot = self.slot.lock().await;
        let now = Instant::now();

        if let Some(cached) = slot.as_ref() {
            if cached.is_fresh(now) {
                return Ok(cached.token.clone());
            }
        }

        let (token, valid_for) = refresh().await?;
        *slot = Some(CachedToken {
            token: token.clone(),
            expires_at: now + valid_for,
        });
        Ok(token)
    }

    /// Drops the cached token so the next caller re-authenticates.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_caches_until_margin() {
        let cache = TokenCache::new();
        let refreshes = AtomicU32::new(0);

        for _ in 0..5 {
            let token = cache
                .get_or_refresh(|| async {
                    refreshes.fetch_add(1, Ordering::SeqCst);
                    Ok(("tok-1".to_string(), Duration::from_secs(3600)))
                })
                .await
                .unwrap();
            assert_eq!(token, "tok-1");
        }

        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refreshes_inside_margin() {
        let cache = TokenCache::new();

        // Valid for less than the refresh margin, so immediately stale.
        let first = cache
            .get_or_refresh(|| async { Ok(("tok-1".to_string(), Duration::from_secs(30))) })
            .await
            .unwrap();
        assert_eq!(first, "tok-1");

        let second = cache
            .get_or_refresh(|| async { Ok(("tok-2".to_string(), Duration::from_secs(3600))) })
            .await
            .unwrap();
        assert_eq!(second, "tok-2");
    }

    #[tokio::test]
    async fn test_concurrent_callers_collapse_into_one_refresh() {
        let cache = Arc::new(TokenCache::new());
        let refreshes = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let refreshes = Arc::clone(&refreshes);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh(|| async move {
                        refreshes.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(("tok-shared".to_string(), Duration::from_secs(3600)))
                    })
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), "tok-shared");
        }
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let cache = TokenCache::new();
        let refreshes = AtomicU32::new(0);

        let refresh = || async {
            refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(("tok".to_string(), Duration::from_secs(3600)))
        };

        cache.get_or_refresh(refresh).await.unwrap();
        cache.invalidate().await;
        cache
            .get_or_refresh(|| async {
                refreshes.fetch_add(1, Ordering::SeqCst);
                Ok(("tok".to_string(), Duration::from_secs(3600)))
            })
            .await
            .unwrap();

        assert_eq!(refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_error_propagates_and_leaves_slot_empty() {
        let cache = TokenCache::new();

        let err = cache
            .get_or_refresh(|| async {
                Err(crate::CarrierError::Auth {
                    status: 401,
                    body: "bad client".to_string(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, crate::CarrierError::Auth { status: 401, .. }));

        // Next caller retries the exchange.
        let token = cache
            .get_or_refresh(|| async { Ok(("tok".to_string(), Duration::from_secs(3600))) })
            .await
            .unwrap();
        assert_eq!(token, "tok");
    }
}

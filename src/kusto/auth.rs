//! Cluster Authorization
//!
//! An opaque credential reference handed to clients at construction time.
//! Tokens come from a pluggable [`TokenProvider`] and are cached until
//! shortly before their assumed expiry.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if the provider can't tell us (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Source of bearer tokens for management calls
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Fetch a fresh access token
    async fn token(&self) -> Result<String>;

    /// Stable, non-secret description used to tell credentials apart
    fn fingerprint(&self) -> String;
}

/// Provider that always hands out the same token
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }

    fn fingerprint(&self) -> String {
        // Never expose the token itself
        let mut hasher = DefaultHasher::new();
        self.token.hash(&mut hasher);
        format!("static:{:016x}", hasher.finish())
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Credential reference with token caching
#[derive(Clone, Default)]
pub struct Authorization {
    provider: Option<Arc<dyn TokenProvider>>,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

impl Authorization {
    /// Authorization that sends no credentials
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Authorization with a fixed bearer token
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::from_provider(Arc::new(StaticToken::new(token)))
    }

    pub fn from_provider(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider: Some(provider),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn fingerprint(&self) -> String {
        match &self.provider {
            Some(provider) => provider.fingerprint(),
            None => "anonymous".to_string(),
        }
    }

    /// Get an access token, or `None` for anonymous access
    pub async fn get_token(&self) -> Result<Option<String>> {
        let Some(provider) = &self.provider else {
            return Ok(None);
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(Some(cached.token.clone()));
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = provider
            .token()
            .await
            .context("Failed to get access token")?;

        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;
        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at,
            });
        }

        Ok(Some(token))
    }

    /// Drop the cached token so the next call goes to the provider
    pub async fn invalidate(&self) {
        let mut cache = self.token_cache.write().await;
        *cache = None;
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorization")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn token(&self) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("token-{}", n))
        }

        fn fingerprint(&self) -> String {
            "counting".to_string()
        }
    }

    #[tokio::test]
    async fn test_anonymous_has_no_token() {
        let auth = Authorization::anonymous();
        assert_eq!(auth.get_token().await.unwrap(), None);
        assert_eq!(auth.fingerprint(), "anonymous");
    }

    #[tokio::test]
    async fn test_token_is_cached_until_invalidated() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let auth = Authorization::from_provider(provider.clone());

        assert_eq!(auth.get_token().await.unwrap().as_deref(), Some("token-0"));
        assert_eq!(auth.get_token().await.unwrap().as_deref(), Some("token-0"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        auth.invalidate().await;
        assert_eq!(auth.get_token().await.unwrap().as_deref(), Some("token-1"));
    }

    #[test]
    fn test_fingerprint_hides_token() {
        let auth = Authorization::bearer("super-secret");
        let fingerprint = auth.fingerprint();
        assert!(fingerprint.starts_with("static:"));
        assert!(!fingerprint.contains("super-secret"));
        assert_eq!(fingerprint, Authorization::bearer("super-secret").fingerprint());
        assert_ne!(fingerprint, Authorization::bearer("other").fingerprint());
        assert!(!format!("{:?}", auth).contains("super-secret"));
    }
}

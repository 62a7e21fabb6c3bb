/*!
Access tokens for the REST document store.

A [`TokenProvider`] hands out bearer tokens. The provider owns its cache, so
token lifetime is tied to the store instance that was given the provider
rather than to the process.
*/

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

/// Supplies bearer tokens for outgoing requests
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A token with its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints fresh tokens (for example by an OAuth exchange)
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken>;
}

/// A fixed token, e.g. one minted by `gcloud auth print-access-token`
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Caches tokens from a [`TokenSource`], refreshing shortly before expiry
pub struct CachingTokenProvider<S: TokenSource> {
    source: S,
    refresh_margin: Duration,
    cached: Mutex<Option<AccessToken>>,
}

impl<S: TokenSource> CachingTokenProvider<S> {
    /// Refresh 60 seconds before the cached token expires
    pub fn new(source: S) -> Self {
        Self::with_refresh_margin(source, Duration::seconds(60))
    }

    pub fn with_refresh_margin(source: S, refresh_margin: Duration) -> Self {
        Self {
            source,
            refresh_margin,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<S: TokenSource> TokenProvider for CachingTokenProvider<S> {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at - self.refresh_margin > Utc::now() {
                return Ok(token.token.clone());
            }
            debug!(expires_at = %token.expires_at, "Access token near expiry, refreshing");
        }

        let fresh = self.source.fetch_token().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

//! Per-worker token cache with a fixed TTL and renew buffer

use super::client::TokenClient;
use chrono::{DateTime, Duration, Utc};
use loadkit_common::{LoadkitError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Lifetime the token endpoint grants
pub const TOKEN_TTL_SECS: i64 = 300;

/// Renew this long before the token actually expires
pub const TOKEN_RENEW_BUFFER_SECS: i64 = 60;

/// Validity window of cached tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    pub ttl: Duration,
    pub renew_buffer: Duration,
}

impl TokenPolicy {
    /// How long a token is served from cache
    pub fn usable_for(&self) -> Duration {
        self.ttl - self.renew_buffer
    }
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(TOKEN_TTL_SECS),
            renew_buffer: Duration::seconds(TOKEN_RENEW_BUFFER_SECS),
        }
    }
}

/// A token and the moment it was issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(token: String, issued_at: DateTime<Utc>) -> Self {
        Self { token, issued_at }
    }

    /// `now - issued_at < ttl - renew_buffer`
    pub fn is_valid_at(&self, now: DateTime<Utc>, policy: &TokenPolicy) -> bool {
        now - self.issued_at < policy.usable_for()
    }
}

/// Maps client identities to their current bearer token.
///
/// Owned by one worker context. The lock is never held across the token
/// exchange, so concurrent misses for one identity may each fetch a token;
/// the last one stored wins.
pub struct CredentialCache {
    client: TokenClient,
    policy: TokenPolicy,
    entries: Mutex<HashMap<String, CachedToken>>,
    exchanges: AtomicU64,
}

impl CredentialCache {
    pub fn new(client: TokenClient) -> Self {
        Self::with_policy(client, TokenPolicy::default())
    }

    pub fn with_policy(client: TokenClient, policy: TokenPolicy) -> Self {
        Self {
            client,
            policy,
            entries: Mutex::new(HashMap::new()),
            exchanges: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// Return a valid token for `client_identity`, fetching one on miss or
    /// expiry.
    pub async fn get_token(
        &self,
        client_identity: &str,
        client_secret: &str,
        token_endpoint: &str,
    ) -> Result<String> {
        require(client_identity, client_identity, "client identity")?;
        require(client_identity, client_secret, "client secret")?;
        require(client_identity, token_endpoint, "token endpoint")?;

        if let Some(token) = self.cached(client_identity) {
            debug!(client_id = %client_identity, "Token cache hit");
            return Ok(token);
        }

        let token = self
            .client
            .exchange(client_identity, client_secret, token_endpoint)
            .await?;
        self.exchanges.fetch_add(1, Ordering::Relaxed);

        self.entries.lock().insert(
            client_identity.to_string(),
            CachedToken::new(token.clone(), Utc::now()),
        );
        info!(client_id = %client_identity, "Issued new token");

        Ok(token)
    }

    /// Token currently cached for `client_identity`, if still valid
    pub fn cached(&self, client_identity: &str) -> Option<String> {
        let entries = self.entries.lock();
        entries
            .get(client_identity)
            .filter(|entry| entry.is_valid_at(Utc::now(), &self.policy))
            .map(|entry| entry.token.clone())
    }

    /// Drop the cached token, e.g. after the system under test rejected it
    pub fn invalidate(&self, client_identity: &str) -> bool {
        let removed = self.entries.lock().remove(client_identity).is_some();
        if removed {
            debug!(client_id = %client_identity, "Token invalidated");
        }
        removed
    }

    /// Client identities with an entry, valid or not
    pub fn cached_identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of token exchanges performed so far
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }
}

fn require(client: &str, value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LoadkitError::auth(client, format!("missing {}", what)));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn token_at(issued_at: DateTime<Utc>) -> CachedToken {
        CachedToken::new("tok".to_string(), issued_at)
    }

    #[test]
    fn test_default_policy_serves_for_four_minutes() {
        let policy = TokenPolicy::default();
        assert_eq!(policy.usable_for(), Duration::seconds(240));
    }

    #[test]
    fn test_validity_window_boundaries() {
        let policy = TokenPolicy::default();
        let issued = Utc::now();
        let token = token_at(issued);

        assert!(token.is_valid_at(issued, &policy));
        assert!(token.is_valid_at(issued + Duration::seconds(239), &policy));
        assert!(!token.is_valid_at(issued + Duration::seconds(240), &policy));
        assert!(!token.is_valid_at(issued + Duration::seconds(299), &policy));
    }

    #[tokio::test]
    async fn test_missing_inputs_fail_without_network() {
        let cache = CredentialCache::new(TokenClient::new(std::time::Duration::from_secs(1)).unwrap());

        let err = cache.get_token("svc", "", "http://127.0.0.1:9").await.unwrap_err();
        assert!(err.to_string().contains("missing client secret"));

        let err = cache.get_token("", "secret", "http://127.0.0.1:9").await.unwrap_err();
        assert_eq!(err.kind(), "auth");

        let err = cache.get_token("svc", "secret", " ").await.unwrap_err();
        assert!(err.to_string().contains("missing token endpoint"));

        assert_eq!(cache.exchange_count(), 0);
    }

    #[test]
    fn test_invalidate_unknown_identity() {
        let cache = CredentialCache::new(TokenClient::new(std::time::Duration::from_secs(1)).unwrap());
        assert!(!cache.invalidate("nobody"));
        assert!(cache.cached_identities().is_empty());
    }
}

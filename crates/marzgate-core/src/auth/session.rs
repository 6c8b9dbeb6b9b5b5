use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::Clock;

/// Default token lifetime assumed by the client.
/// The panel does not report expiry, so this is a local estimate; a 401
/// still triggers re-authentication regardless of this value.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// A bearer token and the time after which it is no longer trusted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Expiry saturates at the latest representable time instead of overflowing.
    pub fn issued_at(token: String, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// In-memory holder of the current credential.
///
/// Reads go through an `RwLock` and never wait on the network. Acquisition
/// is serialized by a separate mutex, so concurrent callers that find the
/// token missing or expired wait for a single round-trip and then reuse its
/// result.
pub struct TokenCache {
    credential: RwLock<Option<Credential>>,
    acquiring: Mutex<()>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl TokenCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            credential: RwLock::new(None),
            acquiring: Mutex::new(()),
            clock,
            ttl,
        }
    }

    /// True iff a token is cached and has not reached its expiry.
    pub async fn is_valid(&self) -> bool {
        self.valid_token().await.is_some()
    }

    /// Expiry of the cached token, if any.
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.credential.read().await.as_ref().map(|c| c.expires_at)
    }

    /// Drop the cached token.
    pub async fn invalidate(&self) {
        *self.credential.write().await = None;
    }

    /// Drop the cached token only if it is still `token`.
    pub async fn discard(&self, token: &str) {
        let mut slot = self.credential.write().await;
        if slot.as_ref().is_some_and(|c| c.token == token) {
            *slot = None;
        }
    }

    /// Return the cached token, running `acquire` first when it is absent or expired.
    pub async fn get_or_acquire<F, Fut, E>(&self, acquire: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(token) = self.valid_token().await {
            return Ok(token);
        }

        let _acquiring = self.acquiring.lock().await;
        // Another caller may have finished acquiring while we waited.
        if let Some(token) = self.valid_token().await {
            return Ok(token);
        }
        debug!("No valid token cached, acquiring");
        self.store(acquire().await).await
    }

    /// Replace a token the server rejected.
    ///
    /// If another caller already swapped `rejected` for a fresh token, that
    /// token is returned without a new acquisition.
    pub async fn replace_rejected<F, Fut, E>(&self, rejected: &str, acquire: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let _acquiring = self.acquiring.lock().await;
        if let Some(token) = self.valid_token().await.filter(|t| t != rejected) {
            debug!("Rejected token already replaced by another caller");
            return Ok(token);
        }
        self.discard(rejected).await;
        self.store(acquire().await).await
    }

    async fn valid_token(&self) -> Option<String> {
        let now = self.clock.now();
        self.credential
            .read()
            .await
            .as_ref()
            .filter(|c| c.is_valid_at(now))
            .map(|c| c.token.clone())
    }

    async fn store<E>(&self, acquired: Result<String, E>) -> Result<String, E> {
        let mut slot = self.credential.write().await;
        match acquired {
            Ok(token) => {
                let credential = Credential::issued_at(token.clone(), self.clock.now(), self.ttl);
                debug!(expires_at = %credential.expires_at, "Token cached");
                *slot = Some(credential);
                Ok(token)
            }
            Err(e) => {
                *slot = None;
                Err(e)
            }
        }
    }
}

//! Resolved-session cache and token revocation set.
//!
//! The session cache maps a SHA-256 digest of a bearer token to the user it resolved to, so
//! repeated requests skip JWT verification and the user lookup. It is best effort: every entry
//! lives at most `auth.cache.ttl` and never past the token's own `exp`, and the entries of a user
//! are dropped whenever that user changes.
//!
//! The revocation set holds the `jti` of every logged-out token until the token would have
//! expired anyway. Both live in process memory only.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;
use moka::{Expiry, future::Cache};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{api::models::users::CurrentUser, config::AuthCacheConfig, types::UserId};

pub type TokenDigest = [u8; 32];

pub fn digest_token(token: &str) -> TokenDigest {
    Sha256::digest(token.as_bytes()).into()
}

/// What a token resolved to
#[derive(Debug, Clone)]
pub struct CachedSession {
    pub user: CurrentUser,
    pub jti: Uuid,
    /// Token expiry, unix seconds
    pub expires_at: i64,
}

fn until(expires_at: i64) -> Duration {
    let remaining = expires_at - Utc::now().timestamp();
    Duration::from_secs(remaining.max(0) as u64)
}

struct SessionExpiry {
    ttl: Duration,
}

impl Expiry<TokenDigest, CachedSession> for SessionExpiry {
    fn expire_after_create(&self, _key: &TokenDigest, value: &CachedSession, _created_at: Instant) -> Option<Duration> {
        Some(self.ttl.min(until(value.expires_at)))
    }
}

struct RevocationExpiry;

impl Expiry<Uuid, i64> for RevocationExpiry {
    fn expire_after_create(&self, _key: &Uuid, expires_at: &i64, _created_at: Instant) -> Option<Duration> {
        Some(until(*expires_at))
    }
}

#[derive(Clone)]
pub struct AuthCache {
    sessions: Cache<TokenDigest, CachedSession>,
    revoked: Cache<Uuid, i64>,
}

impl fmt::Debug for AuthCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCache")
            .field("sessions", &self.sessions.entry_count())
            .field("revoked", &self.revoked.entry_count())
            .finish()
    }
}

impl AuthCache {
    pub fn new(config: &AuthCacheConfig) -> Self {
        let sessions = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(SessionExpiry { ttl: config.ttl })
            .build();
        // Revocations must not be evicted for capacity, only by expiry
        let revoked = Cache::builder().expire_after(RevocationExpiry).build();

        debug!(max_capacity = config.max_capacity, ttl_seconds = config.ttl.as_secs(), "Auth cache created");
        Self { sessions, revoked }
    }

    pub async fn get(&self, digest: &TokenDigest) -> Option<CachedSession> {
        self.sessions.get(digest).await
    }

    pub async fn insert(&self, digest: TokenDigest, session: CachedSession) {
        self.sessions.insert(digest, session).await;
    }

    pub async fn remove(&self, digest: &TokenDigest) {
        self.sessions.invalidate(digest).await;
    }

    /// Drop every cached session of a user, e.g. after a role change or deactivation.
    pub async fn invalidate_user(&self, user_id: UserId) {
        let stale: Vec<_> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.user.id == user_id)
            .map(|(digest, _)| digest)
            .collect();
        for digest in &stale {
            self.sessions.invalidate(digest.as_ref()).await;
        }
        if !stale.is_empty() {
            debug!(user_id = %user_id, entries = stale.len(), "Invalidated cached sessions");
        }
    }

    /// Reject `jti` until `expires_at` (unix seconds).
    pub async fn revoke(&self, jti: Uuid, expires_at: i64) {
        self.revoked.insert(jti, expires_at).await;
    }

    pub async fn is_revoked(&self, jti: &Uuid) -> bool {
        self.revoked.contains_key(jti)
    }

    /// Evict expired entries now rather than lazily.
    pub async fn sweep(&self) {
        self.sessions.run_pending_tasks().await;
        self.revoked.run_pending_tasks().await;
    }

    pub fn entry_count(&self) -> u64 {
        self.sessions.entry_count()
    }
}

/// Sweep the cache every `interval` until cancelled.
pub async fn run_sweeper(cache: AuthCache, interval: Duration, shutdown: CancellationToken) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Auth cache sweeper shutting down");
                return Ok(());
            }
            _ = ticker.tick() => {
                cache.sweep().await;
                debug!(entries = cache.entry_count(), "Swept auth cache");
            }
        }
    }
}

//! # Session Store
//!
//! Per-buyer checkout state keyed by a signed token.
//!
//! Token format: `{uuid}.{hex(hmac_sha256(secret, uuid))}`. The signature lets
//! the server reject forged ids before touching the map. Each session's
//! `OrderSession` sits behind its own mutex. A separate confirm gate keeps
//! confirms exclusive without refusing them while a plain read or a `begin`
//! holds the state.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use shop_core::{OrderSession, ShopError, ShopResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the session token
pub const SESSION_HEADER: &str = "x-session-token";

/// One buyer's checkout state
pub struct BuyerSession {
    state: Mutex<OrderSession>,
    confirming: Mutex<()>,
}

impl BuyerSession {
    fn new() -> Self {
        Self {
            state: Mutex::new(OrderSession::new()),
            confirming: Mutex::new(()),
        }
    }

    /// Wait for exclusive access to the checkout state
    pub async fn lock(&self) -> MutexGuard<'_, OrderSession> {
        self.state.lock().await
    }

    /// Claim the confirm slot. Held for the whole confirm; a second claim
    /// while it is held is `CaptureInProgress`.
    pub fn claim_confirm(&self) -> ShopResult<MutexGuard<'_, ()>> {
        self.confirming
            .try_lock()
            .map_err(|_| ShopError::CaptureInProgress)
    }
}

/// Shared handle to one buyer's checkout state
pub type SessionHandle = Arc<BuyerSession>;

struct SessionEntry {
    state: SessionHandle,
    last_seen: Instant,
}

/// In-memory session map
#[derive(Clone)]
pub struct SessionStore {
    secret: Arc<Vec<u8>>,
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl SessionStore {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            ttl,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Open a fresh session and return its token
    pub async fn open(&self) -> ShopResult<String> {
        let id = Uuid::new_v4();
        let token = format!("{}.{}", id, self.sign(&id)?);

        self.sessions.write().await.insert(
            id,
            SessionEntry {
                state: Arc::new(BuyerSession::new()),
                last_seen: Instant::now(),
            },
        );

        debug!("Opened session {}", id);
        Ok(token)
    }

    /// Resolve a token to its session, refreshing its idle timer
    pub async fn get(&self, token: &str) -> ShopResult<SessionHandle> {
        let id = self.verify(token)?;
        self.purge_expired().await;

        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| ShopError::Session("Unknown or expired session".to_string()))?;
        entry.last_seen = Instant::now();

        Ok(entry.state.clone())
    }

    /// End a session, dropping all of its state
    pub async fn end(&self, token: &str) -> ShopResult<()> {
        let id = self.verify(token)?;

        match self.sessions.write().await.remove(&id) {
            Some(_) => {
                debug!("Ended session {}", id);
                Ok(())
            }
            None => Err(ShopError::Session("Unknown or expired session".to_string())),
        }
    }

    /// Drop sessions idle for longer than the TTL; returns how many went
    pub async fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < ttl);

        let purged = before - sessions.len();
        if purged > 0 {
            debug!("Purged {} idle sessions", purged);
        }
        purged
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn sign(&self, id: &Uuid) -> ShopResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ShopError::Internal(format!("Invalid session secret: {}", e)))?;
        mac.update(id.to_string().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check the token signature and return the session id
    fn verify(&self, token: &str) -> ShopResult<Uuid> {
        let malformed = || ShopError::Session("Malformed session token".to_string());

        let (id, signature) = token.trim().split_once('.').ok_or_else(malformed)?;
        let id = Uuid::parse_str(id).map_err(|_| malformed())?;

        if !constant_time_compare(&self.sign(&id)?, signature) {
            return Err(ShopError::Session("Invalid session token signature".to_string()));
        }

        Ok(id)
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

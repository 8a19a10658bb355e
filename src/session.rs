//! Session credential and the injectable context that owns it.
//!
//! `SessionContext` is the single answer to "is this client signed in". The
//! access gate reads it, the API client takes the bearer token from it, and a
//! `401` from the backend clears it. The credential is written through to a
//! persisted slot so a later process picks it up again.
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::db::{self, Pool};
use crate::error::{ApiError, ApiResult};

/// Name of the persisted slot holding the credential.
pub const SESSION_SLOT: &str = "ecoAdminToken";

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    token: String,
    issued_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Credential {
    pub fn new(token: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self::issued_at(token, Utc::now(), ttl)
    }

    pub fn issued_at(token: impl Into<String>, issued_at: DateTime<Utc>, ttl: Option<Duration>) -> Self {
        Self {
            token: token.into(),
            issued_at,
            expires_at: ttl.map(|ttl| issued_at + ttl),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    /// Non-empty and not past its expiry. The token itself stays opaque.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && !self.is_expired_at(now)
    }

    /// Decode a stored slot value. Values written by older clients are the
    /// bare token string; those carry no expiry.
    fn from_slot(raw: &str) -> Self {
        match serde_json::from_str::<Credential>(raw) {
            Ok(cred) => cred,
            Err(_) => Self {
                token: raw.to_string(),
                issued_at: Utc::now(),
                expires_at: None,
            },
        }
    }
}

/// Persisted key-value slot backing the session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn read(&self) -> ApiResult<Option<String>>;
    async fn write(&self, value: &str) -> ApiResult<()>;
    async fn clear(&self) -> ApiResult<()>;
}

/// Session slot stored in the local SQLite database.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: Pool,
}

impl SqliteSessionStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn read(&self) -> ApiResult<Option<String>> {
        Ok(db::get_slot(&self.pool, SESSION_SLOT).await?)
    }

    async fn write(&self, value: &str) -> ApiResult<()> {
        Ok(db::put_slot(&self.pool, SESSION_SLOT, value).await?)
    }

    async fn clear(&self) -> ApiResult<()> {
        db::delete_slot(&self.pool, SESSION_SLOT).await?;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct SessionContext {
    current: Arc<RwLock<Option<Credential>>>,
    store: Option<Arc<dyn SessionStore>>,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("current", &self.snapshot())
            .field("persisted", &self.store.is_some())
            .finish()
    }
}

impl SessionContext {
    /// A context that lives only in memory.
    pub fn detached(credential: Option<Credential>) -> Self {
        Self {
            current: Arc::new(RwLock::new(credential)),
            store: None,
        }
    }

    /// Load whatever credential the store holds.
    pub async fn restore(store: Arc<dyn SessionStore>) -> ApiResult<Self> {
        let credential = store.read().await?.map(|raw| Credential::from_slot(&raw));
        debug!(present = credential.is_some(), "restored session slot");
        Ok(Self {
            current: Arc::new(RwLock::new(credential)),
            store: Some(store),
        })
    }

    pub async fn login(&self, credential: Credential) -> ApiResult<()> {
        if let Some(store) = &self.store {
            let raw = serde_json::to_string(&credential)
                .map_err(|err| ApiError::decode("session slot", err))?;
            store.write(&raw).await?;
        }
        info!(expires_at = ?credential.expires_at, "session stored");
        self.set(Some(credential));
        Ok(())
    }

    pub async fn logout(&self) -> ApiResult<()> {
        self.set(None);
        if let Some(store) = &self.store {
            store.clear().await?;
        }
        info!("session cleared");
        Ok(())
    }

    /// Drop a credential the backend rejected.
    pub async fn invalidate(&self) {
        warn!("backend rejected the session token; clearing it");
        self.set(None);
        if let Some(store) = &self.store {
            if let Err(err) = store.clear().await {
                warn!(?err, "failed to clear persisted session");
            }
        }
    }

    /// Raw stored credential, usable or not.
    pub fn snapshot(&self) -> Option<Credential> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        self.snapshot().is_some_and(|c| c.is_usable_at(now))
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    /// Bearer token for authorized requests, if the session is usable.
    pub fn bearer(&self) -> Option<String> {
        self.snapshot()
            .filter(|c| c.is_usable_at(Utc::now()))
            .map(|c| c.token)
    }

    fn set(&self, credential: Option<Credential>) {
        match self.current.write() {
            Ok(mut guard) => *guard = credential,
            Err(poisoned) => *poisoned.into_inner() = credential,
        }
    }
}

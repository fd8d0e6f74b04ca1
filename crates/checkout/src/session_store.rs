//! Checkout session storage keyed by session token.
//!
//! Reads and writes are per-key atomic. Two concurrent requests for the same
//! session are not serialized against each other here; [`crate::CheckoutFlow`]
//! does that.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use cleanjoy_core::SessionId;

use crate::error::StoreError;
use crate::models::CheckoutSession;

/// Storage for [`CheckoutSession`]s.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session, if one exists for the token.
    async fn load(&self, id: &SessionId) -> Result<Option<CheckoutSession>, StoreError>;

    /// Store a session under its own token, replacing any previous value.
    async fn save(&self, session: CheckoutSession) -> Result<(), StoreError>;

    /// Drop a session.
    async fn clear(&self, id: &SessionId) -> Result<(), StoreError>;
}

/// In-memory session store with idle expiry and bounded capacity.
#[derive(Clone)]
pub struct MokaSessionStore {
    cache: Cache<SessionId, CheckoutSession>,
}

impl std::fmt::Debug for MokaSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaSessionStore")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl MokaSessionStore {
    /// Create a store holding at most `capacity` sessions, each dropped after
    /// `idle` without access.
    #[must_use]
    pub fn new(capacity: u64, idle: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_idle(idle)
            .build();
        Self { cache }
    }
}

#[async_trait]
impl SessionStore for MokaSessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<CheckoutSession>, StoreError> {
        Ok(self.cache.get(id).await)
    }

    async fn save(&self, session: CheckoutSession) -> Result<(), StoreError> {
        self.cache
            .insert(session.session_id().clone(), session)
            .await;
        Ok(())
    }

    async fn clear(&self, id: &SessionId) -> Result<(), StoreError> {
        debug!(session_id = %id, "Clearing checkout session");
        self.cache.invalidate(id).await;
        Ok(())
    }
}

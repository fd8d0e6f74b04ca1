//! Checkout lifecycle notifications.
//!
//! A [`CheckoutStarted`] event is emitted once per session, the first time
//! the details step is entered. Listeners must not block the request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use cleanjoy_core::{Email, SessionId, UserId};

use crate::models::ServiceKind;

/// Emitted when a customer first enters checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutStarted {
    pub session_id: SessionId,
    pub user_id: Option<UserId>,
    pub email: Option<Email>,
    pub service: ServiceKind,
    pub at: DateTime<Utc>,
}

/// Sink for checkout lifecycle events.
#[async_trait]
pub trait CheckoutEvents: Send + Sync {
    async fn checkout_started(&self, event: CheckoutStarted);
}

/// Writes events to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEvents;

#[async_trait]
impl CheckoutEvents for LogEvents {
    async fn checkout_started(&self, event: CheckoutStarted) {
        info!(
            session_id = %event.session_id,
            user_id = ?event.user_id,
            service = %event.service,
            "Checkout started"
        );
    }
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelEvents {
    tx: mpsc::UnboundedSender<CheckoutStarted>,
}

impl ChannelEvents {
    /// Create the sink and the receiving half.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CheckoutStarted>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl CheckoutEvents for ChannelEvents {
    async fn checkout_started(&self, event: CheckoutStarted) {
        if self.tx.send(event).is_err() {
            warn!("Checkout event receiver dropped");
        }
    }
}

//! The checkout engine as seen by a request layer.
//!
//! [`CheckoutFlow`] owns the session store, the step sequencer and the
//! collaborators. Requests for the same session are serialized: each one
//! takes a per-session lock, loads (or creates) the session, runs the step
//! and saves the result before the next request sees it.

use std::sync::Arc;

use moka::future::Cache;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use cleanjoy_core::{AddressId, SessionId};

use crate::config::CheckoutConfig;
use crate::error::CheckoutError;
use crate::events::{CheckoutEvents, LogEvents};
use crate::models::{AddressForm, Basket, CheckoutSession, Identity, Message, Step, Transition};
use crate::payment::PaymentCoordinator;
use crate::registry::ServiceRegistry;
use crate::resolver::validate_fields;
use crate::sequencer::{StepHandlers, StepSequencer};
use crate::services::{
    AddressBook, GatewayError, InMemoryAddressBook, InMemoryOrderStore, OrderStore,
    PaymentGateway, SandboxGateway, ShippingRepository, StaticShippingRepository, StripeGateway,
};
use crate::session_store::{MokaSessionStore, SessionStore};
use crate::steps::{
    Action, AddressStep, DetailsStep, PaymentDetailsStep, PaymentMethodStep, ShippingMethodStep,
    StepContext, ThankYouStep,
};

/// Info message after an address-book entry is updated.
pub const ADDRESS_SAVED: &str = "Address saved";

/// Info message after an address-book entry is deleted.
pub const ADDRESS_DELETED: &str = "Address deleted";

/// One checkout request, as handed over by the request layer.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub session_id: SessionId,
    pub identity: Identity,
    pub basket: Basket,
    pub step: Step,
    pub action: Action,
}

/// Checkout engine shared across request handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct CheckoutFlow {
    inner: Arc<CheckoutFlowInner>,
}

struct CheckoutFlowInner {
    config: CheckoutConfig,
    sessions: Arc<dyn SessionStore>,
    locks: Cache<SessionId, Arc<Mutex<()>>>,
    sequencer: StepSequencer,
    registry: Arc<ServiceRegistry>,
    address_book: Arc<dyn AddressBook>,
    orders: Arc<dyn OrderStore>,
}

impl CheckoutFlow {
    /// Start building a flow; every collaborator has an in-memory default.
    #[must_use]
    pub fn builder(config: CheckoutConfig) -> CheckoutFlowBuilder {
        CheckoutFlowBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &CheckoutConfig {
        &self.inner.config
    }

    /// Services that can be booked.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.inner.registry
    }

    /// Order store the flow places orders into.
    #[must_use]
    pub fn orders(&self) -> &Arc<dyn OrderStore> {
        &self.inner.orders
    }

    /// Run one step request for a session.
    ///
    /// The session is created on first use and saved after every request.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Store`] if a collaborator store fails, and
    /// other errors no step can recover from. Checkout-level failures come
    /// back as a [`Transition::Redirect`].
    #[instrument(
        skip(self, request),
        fields(session_id = %request.session_id, step = %request.step)
    )]
    pub async fn handle(&self, request: CheckoutRequest) -> Result<Transition, CheckoutError> {
        let CheckoutRequest {
            session_id,
            identity,
            basket,
            step,
            action,
        } = request;

        let lock = self
            .inner
            .locks
            .get_with(session_id.clone(), async { Arc::new(Mutex::new(())) })
            .await;
        let _guard = lock.lock().await;

        let mut session = if let Some(session) = self.inner.sessions.load(&session_id).await? {
            session
        } else {
            debug!("Creating checkout session");
            CheckoutSession::new(session_id)
        };

        let mut ctx = StepContext {
            session: &mut session,
            basket: &basket,
            identity: &identity,
        };
        let transition = self.inner.sequencer.advance(step, &mut ctx, action).await?;

        self.inner.sessions.save(session).await?;
        Ok(transition)
    }

    /// Current state of a session, if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Store`] if the session store fails.
    pub async fn session(&self, id: &SessionId) -> Result<Option<CheckoutSession>, CheckoutError> {
        Ok(self.inner.sessions.load(id).await?)
    }

    /// Drop everything captured for a session.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Store`] if the session store fails.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn abandon(&self, id: &SessionId) -> Result<(), CheckoutError> {
        let lock = self
            .inner
            .locks
            .get_with(id.clone(), async { Arc::new(Mutex::new(())) })
            .await;
        let _guard = lock.lock().await;

        self.inner.sessions.clear(id).await?;
        info!("Checkout abandoned");
        Ok(())
    }

    /// Update one of the requester's address-book entries.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::NotFound`] for guests and for entries owned by
    ///   someone else
    /// - [`CheckoutError::Invalid`] if the fields do not validate
    #[instrument(
        skip(self, identity, form),
        fields(user_id = ?identity.user_id(), address_id = %id)
    )]
    pub async fn update_user_address(
        &self,
        identity: &Identity,
        id: AddressId,
        form: &AddressForm,
    ) -> Result<Message, CheckoutError> {
        let owner = identity.user_id().ok_or(CheckoutError::NotFound)?;
        let record = validate_fields(form).map_err(CheckoutError::Invalid)?;
        self.inner
            .address_book
            .update(owner, id, record)
            .await?
            .ok_or(CheckoutError::NotFound)?;
        info!("Address-book entry updated");
        Ok(Message::info(ADDRESS_SAVED))
    }

    /// Delete one of the requester's address-book entries.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotFound`] for guests and for entries owned
    /// by someone else.
    #[instrument(skip(self, identity), fields(user_id = ?identity.user_id(), address_id = %id))]
    pub async fn delete_user_address(
        &self,
        identity: &Identity,
        id: AddressId,
    ) -> Result<Message, CheckoutError> {
        let owner = identity.user_id().ok_or(CheckoutError::NotFound)?;
        if !self.inner.address_book.remove(owner, id).await? {
            return Err(CheckoutError::NotFound);
        }
        info!("Address-book entry deleted");
        Ok(Message::info(ADDRESS_DELETED))
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Assembles a [`CheckoutFlow`].
pub struct CheckoutFlowBuilder {
    config: CheckoutConfig,
    sessions: Option<Arc<dyn SessionStore>>,
    shipping: Option<Arc<dyn ShippingRepository>>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    orders: Option<Arc<dyn OrderStore>>,
    address_book: Option<Arc<dyn AddressBook>>,
    events: Option<Arc<dyn CheckoutEvents>>,
    registry: Option<ServiceRegistry>,
}

impl CheckoutFlowBuilder {
    fn new(config: CheckoutConfig) -> Self {
        Self {
            config,
            sessions: None,
            shipping: None,
            gateway: None,
            orders: None,
            address_book: None,
            events: None,
            registry: None,
        }
    }

    #[must_use]
    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    #[must_use]
    pub fn shipping(mut self, shipping: Arc<dyn ShippingRepository>) -> Self {
        self.shipping = Some(shipping);
        self
    }

    #[must_use]
    pub fn gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    #[must_use]
    pub fn orders(mut self, orders: Arc<dyn OrderStore>) -> Self {
        self.orders = Some(orders);
        self
    }

    #[must_use]
    pub fn address_book(mut self, address_book: Arc<dyn AddressBook>) -> Self {
        self.address_book = Some(address_book);
        self
    }

    #[must_use]
    pub fn events(mut self, events: Arc<dyn CheckoutEvents>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: ServiceRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the flow.
    ///
    /// Without an explicit gateway the Stripe gateway is used when Stripe is
    /// configured, and the sandbox gateway otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the Stripe client cannot be created.
    pub fn build(self) -> Result<CheckoutFlow, GatewayError> {
        let config = self.config;

        let gateway: Arc<dyn PaymentGateway> = match (self.gateway, &config.stripe) {
            (Some(gateway), _) => gateway,
            (None, Some(stripe)) => {
                info!(api_base = %stripe.api_base, "Using Stripe payment gateway");
                Arc::new(StripeGateway::new(stripe, config.payment_timeout)?)
            }
            (None, None) => {
                info!("Stripe not configured, using sandbox payment gateway");
                Arc::new(SandboxGateway::new())
            }
        };

        let sessions = self.sessions.unwrap_or_else(|| {
            Arc::new(MokaSessionStore::new(
                config.session_capacity,
                config.session_ttl,
            ))
        });
        let shipping = self
            .shipping
            .unwrap_or_else(|| Arc::new(StaticShippingRepository::default()));
        let orders = self
            .orders
            .unwrap_or_else(|| Arc::new(InMemoryOrderStore::new()));
        let address_book = self
            .address_book
            .unwrap_or_else(|| Arc::new(InMemoryAddressBook::new()));
        let events = self.events.unwrap_or_else(|| Arc::new(LogEvents));
        let registry = Arc::new(self.registry.unwrap_or_default());

        let payments =
            PaymentCoordinator::new(gateway, Arc::clone(&orders), config.payment_timeout);

        let sequencer = StepSequencer::new(StepHandlers {
            details: Box::new(DetailsStep::new(Arc::clone(&registry), events)),
            address: Box::new(AddressStep::new(Arc::clone(&address_book))),
            shipping_method: Box::new(ShippingMethodStep::new(Arc::clone(&shipping))),
            payment_method: Box::new(PaymentMethodStep),
            payment_details: Box::new(PaymentDetailsStep::new(
                shipping,
                Arc::clone(&orders),
                payments,
                config.publishable_key().map(str::to_owned),
            )),
            thank_you: Box::new(ThankYouStep::new(Arc::clone(&orders))),
        });

        let locks = Cache::builder()
            .max_capacity(config.session_capacity)
            .time_to_idle(config.session_ttl)
            .build();

        Ok(CheckoutFlow {
            inner: Arc::new(CheckoutFlowInner {
                config,
                sessions,
                locks,
                sequencer,
                registry,
                address_book,
                orders,
            }),
        })
    }
}

//! In-process collaborators.
//!
//! Thread-safe, non-persistent implementations of the service traits. The
//! CLI simulator and the test suites run the whole checkout against these.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use cleanjoy_core::{AddressId, OrderNumber, OrderStatus, UserId};

use super::{AddressBook, GatewayError, OrderStore, PaymentGateway, ShippingRepository};
use crate::error::StoreError;
use crate::models::{
    AddressRecord, Basket, ChargeRequest, Identity, PaymentEvent, PaymentSource, PlacedOrder,
    ShippingMethod, ShippingMethodCode, UserAddress,
};

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Default)]
struct Ledger {
    sources: Vec<PaymentSource>,
    events: Vec<PaymentEvent>,
    declines: u32,
}

#[derive(Debug, Default)]
struct OrderBook {
    orders: HashMap<OrderNumber, PlacedOrder>,
    ledgers: HashMap<OrderNumber, Ledger>,
}

impl OrderBook {
    /// The stored order with its ledger attached.
    fn snapshot(&self, number: OrderNumber) -> Option<PlacedOrder> {
        let mut order = self.orders.get(&number)?.clone();
        if let Some(ledger) = self.ledgers.get(&number) {
            order.payment_sources.clone_from(&ledger.sources);
            order.payment_events.clone_from(&ledger.events);
            if order.status == OrderStatus::Placed && !ledger.sources.is_empty() {
                order.status = OrderStatus::Paid;
            }
        }
        Some(order)
    }
}

/// Orders and payment ledgers held in memory.
///
/// Payments may be recorded before the order they belong to is placed; the
/// ledger is keyed by order number and merged in on read.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOrderStore {
    book: Arc<Mutex<OrderBook>>,
}

impl InMemoryOrderStore {
    /// Creates a new, empty order store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of placed orders.
    pub async fn len(&self) -> usize {
        self.book.lock().await.orders.len()
    }

    /// Whether no order has been placed.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, number: OrderNumber) -> Result<Option<PlacedOrder>, StoreError> {
        Ok(self.book.lock().await.snapshot(number))
    }

    async fn place(&self, order: PlacedOrder) -> Result<PlacedOrder, StoreError> {
        let number = order.number;
        let mut book = self.book.lock().await;
        if book.orders.contains_key(&number) {
            debug!(order_number = %number, "Order already placed");
        } else {
            book.orders.insert(number, order);
        }
        book.snapshot(number)
            .ok_or_else(|| StoreError::Conflict(format!("order {number} vanished")))
    }

    async fn record_payment(
        &self,
        number: OrderNumber,
        source: PaymentSource,
        event: PaymentEvent,
    ) -> Result<bool, StoreError> {
        let mut book = self.book.lock().await;
        let ledger = book.ledgers.entry(number).or_default();
        if ledger
            .sources
            .iter()
            .any(|existing| existing.reference == source.reference)
        {
            return Ok(false);
        }
        ledger.sources.push(source);
        ledger.events.push(event);
        Ok(true)
    }

    async fn declined_attempts(&self, number: OrderNumber) -> Result<u32, StoreError> {
        Ok(self
            .book
            .lock()
            .await
            .ledgers
            .get(&number)
            .map_or(0, |ledger| ledger.declines))
    }

    async fn record_decline(&self, number: OrderNumber) -> Result<u32, StoreError> {
        let mut book = self.book.lock().await;
        let ledger = book.ledgers.entry(number).or_default();
        ledger.declines = ledger.declines.saturating_add(1);
        Ok(ledger.declines)
    }
}

// =============================================================================
// Address book
// =============================================================================

/// Address-book entries held in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAddressBook {
    entries: Arc<RwLock<Vec<UserAddress>>>,
}

impl InMemoryAddressBook {
    /// Creates a new, empty address book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an address book pre-filled with `entries`.
    #[must_use]
    pub fn with_entries(entries: Vec<UserAddress>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Add an entry.
    pub async fn insert(&self, entry: UserAddress) {
        self.entries.write().await.push(entry);
    }
}

#[async_trait]
impl AddressBook for InMemoryAddressBook {
    async fn addresses_for(&self, owner: UserId) -> Result<Vec<UserAddress>, StoreError> {
        let entries = self.entries.read().await;
        let mut owned: Vec<UserAddress> = entries
            .iter()
            .filter(|entry| entry.owner == owner)
            .cloned()
            .collect();
        owned.sort_by_key(|entry| (!entry.is_default_for_shipping, entry.id));
        Ok(owned)
    }

    async fn get(&self, owner: UserId, id: AddressId) -> Result<Option<UserAddress>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .find(|entry| entry.id == id && entry.owner == owner)
            .cloned())
    }

    async fn update(
        &self,
        owner: UserId,
        id: AddressId,
        record: AddressRecord,
    ) -> Result<Option<UserAddress>, StoreError> {
        let mut entries = self.entries.write().await;
        Ok(entries
            .iter_mut()
            .find(|entry| entry.id == id && entry.owner == owner)
            .map(|entry| {
                entry.record = record;
                entry.clone()
            }))
    }

    async fn remove(&self, owner: UserId, id: AddressId) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| !(entry.id == id && entry.owner == owner));
        Ok(entries.len() < before)
    }
}

// =============================================================================
// Shipping
// =============================================================================

/// A fixed list of shipping methods, optionally limited to some countries.
#[derive(Debug, Clone)]
pub struct StaticShippingRepository {
    methods: Vec<ShippingMethod>,
    countries: Option<Vec<String>>,
}

impl StaticShippingRepository {
    /// Offer `methods` to every address.
    #[must_use]
    pub const fn new(methods: Vec<ShippingMethod>) -> Self {
        Self {
            methods,
            countries: None,
        }
    }

    /// Only offer methods for addresses in `countries` (ISO alpha-2).
    #[must_use]
    pub fn serving(mut self, countries: &[&str]) -> Self {
        self.countries = Some(
            countries
                .iter()
                .map(|c| c.to_ascii_uppercase())
                .collect(),
        );
        self
    }

    fn serves(&self, address: Option<&AddressRecord>) -> bool {
        match (&self.countries, address) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(countries), Some(address)) => countries
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&address.country)),
        }
    }
}

impl Default for StaticShippingRepository {
    /// A single free home visit.
    fn default() -> Self {
        Self::new(vec![ShippingMethod {
            code: ShippingMethodCode::new("home-visit"),
            name: "Home visit".to_string(),
            charge_excl_tax: Decimal::ZERO,
            charge_incl_tax: Decimal::ZERO,
        }])
    }
}

#[async_trait]
impl ShippingRepository for StaticShippingRepository {
    async fn shipping_methods(
        &self,
        _basket: &Basket,
        _identity: &Identity,
        address: Option<&AddressRecord>,
    ) -> Result<Vec<ShippingMethod>, StoreError> {
        if self.serves(address) {
            Ok(self.methods.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

// =============================================================================
// Payments
// =============================================================================

/// Card tokens with a fixed outcome, mirroring the gateway's test cards.
const DECLINING_TOKENS: &[(&str, &str)] = &[
    ("tok_chargeDeclined", "generic_decline"),
    ("tok_chargeDeclinedInsufficientFunds", "insufficient_funds"),
    ("tok_chargeDeclinedExpiredCard", "expired_card"),
    ("tok_chargeDeclinedIncorrectCvc", "incorrect_cvc"),
];

/// Token that always fails with a transient processing error.
pub const SANDBOX_PROCESSING_ERROR_TOKEN: &str = "tok_chargeDeclinedProcessingError";

/// Test-mode gateway.
///
/// Any `tok_` token succeeds unless it is one of the declining test tokens.
/// Outcomes are remembered per idempotency key, so a repeated request returns
/// the first result without creating a second charge, whatever token it
/// carries. Transient failures are never remembered.
#[derive(Debug, Default)]
pub struct SandboxGateway {
    outcomes: Mutex<HashMap<String, Result<String, GatewayError>>>,
    charges_created: AtomicU64,
    fail_next: AtomicU32,
    lose_next: AtomicU32,
    delay: Option<Duration>,
}

impl SandboxGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request only after `delay`.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `count` requests with a transient error.
    #[must_use]
    pub fn failing_next(self, count: u32) -> Self {
        self.fail_next.store(count, Ordering::SeqCst);
        self
    }

    /// Create the charge for the next `count` new requests but answer them
    /// with a transient error, as when the response is lost in transit.
    #[must_use]
    pub fn losing_next_response(self, count: u32) -> Self {
        self.lose_next.store(count, Ordering::SeqCst);
        self
    }

    /// Charges actually created, excluding replays.
    #[must_use]
    pub fn charges_created(&self) -> u64 {
        self.charges_created.load(Ordering::SeqCst)
    }

    fn take_injected_failure(&self) -> bool {
        take_one(&self.fail_next)
    }

    fn take_lost_response(&self) -> bool {
        take_one(&self.lose_next)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<String, GatewayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.take_injected_failure() {
            return Err(GatewayError::Transient("sandbox: connection reset".to_string()));
        }

        let token = request.card_token.as_str();
        if token == SANDBOX_PROCESSING_ERROR_TOKEN {
            return Err(GatewayError::Transient("processing_error".to_string()));
        }

        let mut outcomes = self.outcomes.lock().await;
        if let Some(previous) = outcomes.get(&request.idempotency_key) {
            debug!(order_number = %request.order_number, "Replaying sandbox charge");
            return previous.clone();
        }

        let outcome = if let Some((_, code)) = DECLINING_TOKENS.iter().find(|(t, _)| *t == token)
        {
            Err(GatewayError::Declined((*code).to_string()))
        } else if token.starts_with("tok_") {
            let n = self.charges_created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("ch_sandbox_{n:06}"))
        } else {
            Err(GatewayError::Declined("invalid_card_token".to_string()))
        };

        outcomes.insert(request.idempotency_key.clone(), outcome.clone());
        if outcome.is_ok() && self.take_lost_response() {
            debug!(order_number = %request.order_number, "Sandbox charge created, response lost");
            return Err(GatewayError::Transient("sandbox: response lost".to_string()));
        }
        outcome
    }
}

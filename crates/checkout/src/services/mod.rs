//! External collaborators of the checkout.
//!
//! # Services
//!
//! - `ShippingRepository` - Shipping (travel) methods available for a basket
//! - `PaymentGateway` - Card charges
//! - `AddressBook` - A signed-in user's saved addresses
//! - `OrderStore` - Placed orders and their payment ledger
//!
//! `memory` holds in-process implementations used by the CLI and tests;
//! `stripe` talks to the Stripe charges API.

pub mod memory;
pub mod stripe;

use async_trait::async_trait;
use thiserror::Error;

use cleanjoy_core::{AddressId, OrderNumber, UserId};

use crate::error::StoreError;
use crate::models::{
    AddressRecord, Basket, ChargeRequest, Identity, PaymentEvent, PaymentSource, PlacedOrder,
    ShippingMethod, UserAddress,
};

pub use memory::{
    InMemoryAddressBook, InMemoryOrderStore, SandboxGateway, StaticShippingRepository,
};
pub use stripe::StripeGateway;

/// Failure reported by a payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The card was refused; resubmitting the same card will not help.
    #[error("card declined: {0}")]
    Declined(String),

    /// The gateway could not complete the request; safe to retry.
    #[error("gateway unavailable: {0}")]
    Transient(String),
}

/// Source of shipping methods for a basket and address.
#[async_trait]
pub trait ShippingRepository: Send + Sync {
    /// Methods available for the basket, shipped to `address`.
    async fn shipping_methods(
        &self,
        basket: &Basket,
        identity: &Identity,
        address: Option<&AddressRecord>,
    ) -> Result<Vec<ShippingMethod>, StoreError>;
}

/// Card payment collaborator.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge the card and return the gateway reference.
    ///
    /// Repeated calls with the same idempotency key must not create a second
    /// charge.
    async fn charge(&self, request: &ChargeRequest) -> Result<String, GatewayError>;
}

/// Saved addresses of signed-in users. Every call is scoped to the owner.
#[async_trait]
pub trait AddressBook: Send + Sync {
    /// All entries of `owner`, default-for-shipping first.
    async fn addresses_for(&self, owner: UserId) -> Result<Vec<UserAddress>, StoreError>;

    /// One entry, if it exists and belongs to `owner`.
    async fn get(&self, owner: UserId, id: AddressId) -> Result<Option<UserAddress>, StoreError>;

    /// Replace an entry's fields. Returns `None` if it is not `owner`'s.
    async fn update(
        &self,
        owner: UserId,
        id: AddressId,
        record: AddressRecord,
    ) -> Result<Option<UserAddress>, StoreError>;

    /// Delete an entry. Returns `false` if it is not `owner`'s.
    async fn remove(&self, owner: UserId, id: AddressId) -> Result<bool, StoreError>;
}

/// Placed orders and the payments recorded against them.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Look up an order, with its recorded payments.
    async fn get(&self, number: OrderNumber) -> Result<Option<PlacedOrder>, StoreError>;

    /// Place an order. Placing the same number twice returns the existing one.
    async fn place(&self, order: PlacedOrder) -> Result<PlacedOrder, StoreError>;

    /// Record a source and event for an order in one step.
    ///
    /// Returns `false` if a source with the same reference is already
    /// recorded, in which case nothing changes.
    async fn record_payment(
        &self,
        number: OrderNumber,
        source: PaymentSource,
        event: PaymentEvent,
    ) -> Result<bool, StoreError>;

    /// Declined card attempts counted against an order so far.
    async fn declined_attempts(&self, number: OrderNumber) -> Result<u32, StoreError>;

    /// Count one more declined card attempt and return the new total.
    async fn record_decline(&self, number: OrderNumber) -> Result<u32, StoreError>;
}

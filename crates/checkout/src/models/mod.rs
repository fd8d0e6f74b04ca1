//! Domain models for the checkout.

pub mod address;
pub mod basket;
pub mod identity;
pub mod order;
pub mod payment;
pub mod service;
pub mod session;
pub mod shipping;
pub mod step;

pub use address::{AddressForm, AddressRecord, AddressSource, Title, UserAddress};
pub use basket::{Basket, BasketLine};
pub use identity::Identity;
pub use order::{OrderTotal, PlacedOrder};
pub use payment::{
    ChargeRequest, PAYMENT_METHOD_STRIPE, PaymentAttempt, PaymentEvent, PaymentSource,
    PaymentSubmission, idempotency_key,
};
pub use service::{ServiceKind, ServiceSelection};
pub use session::{CheckoutSession, SessionError};
pub use shipping::{ShippingMethod, ShippingMethodCode};
pub use step::{Message, MessageLevel, Step, StepView, Transition};

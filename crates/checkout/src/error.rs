//! Checkout error taxonomy.
//!
//! Every variant is scoped to the single in-flight request. The sequencer
//! turns the recoverable ones into a redirect or a rendered error state;
//! only collaborator failures propagate to the caller.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cleanjoy_core::{OrderNumber, PriceError};

use crate::guard::Precondition;
use crate::models::{SessionError, Step};

/// Errors raised while handling a checkout request.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A step precondition is not met.
    #[error("precondition failed: {0}")]
    GuardFailed(Precondition),

    /// Submitted fields failed validation.
    #[error("invalid fields: {0}")]
    Invalid(FieldErrors),

    /// The referenced address-book entry does not exist for this user.
    #[error("address not found")]
    NotFound,

    /// The submitted shipping method is not among the available ones.
    #[error("shipping method not permitted: {0}")]
    ShippingNotPermitted(String),

    /// The card was declined.
    #[error("payment declined: {reason}")]
    Declined { reason: String },

    /// The payment collaborator failed or timed out; safe to retry.
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// The basket already produced a different order; it cannot be booked
    /// again.
    #[error("basket already ordered as {0}")]
    BasketAlreadyOrdered(OrderNumber),

    /// The thank-you page was requested without a placed order.
    #[error("no order found")]
    NoOrderFound,

    /// The service kind has no registered form.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// Session mutation rejected.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Amounts could not be combined.
    #[error("price error: {0}")]
    Price(#[from] PriceError),

    /// A collaborator store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Whether resubmitting the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(_))
    }

    /// The step a user should be sent to in order to recover, if any.
    #[must_use]
    pub const fn redirect_target(&self) -> Option<Step> {
        match self {
            Self::GuardFailed(precondition) => Some(precondition.redirect_target()),
            Self::NotFound => Some(Step::Address),
            Self::Declined { .. } | Self::Gateway(_) => Some(Step::PaymentDetails),
            Self::NoOrderFound | Self::BasketAlreadyOrdered(_) => Some(Step::Details),
            _ => None,
        }
    }
}

/// Failure of an external store (orders, address book, shipping rates).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The write conflicts with existing data.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// A single field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Field-level validation messages, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Record a message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Append all messages from `other`.
    pub fn merge(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Names of the offending fields.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.field.as_str())
    }

    /// Messages for one field.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> {
        self.0
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// `Ok(())` when empty, otherwise [`CheckoutError::Invalid`].
    ///
    /// # Errors
    ///
    /// Returns the collected errors as [`CheckoutError::Invalid`].
    pub fn into_result(self) -> std::result::Result<(), CheckoutError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CheckoutError::Invalid(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// Result type alias for `CheckoutError`.
pub type Result<T> = std::result::Result<T, CheckoutError>;

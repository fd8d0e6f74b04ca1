//! Payment types: submissions, charge requests, attempts, and the records
//! appended to an order once a charge succeeds.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cleanjoy_core::{CurrencyCode, Email, OrderNumber, PaymentEventKind, PaymentOutcome, Price};

/// Source type name recorded for card payments taken through Stripe.
pub const PAYMENT_METHOD_STRIPE: &str = "Stripe";

/// Card details posted from the payment-details step.
///
/// `Debug` is implemented manually so the card token never reaches logs.
#[derive(Clone, Deserialize)]
pub struct PaymentSubmission {
    /// Single-use token produced by the gateway's browser library.
    pub stripe_token: String,
    /// Email the payer entered in the gateway widget.
    pub stripe_email: Email,
}

impl std::fmt::Debug for PaymentSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentSubmission")
            .field("stripe_token", &"[REDACTED]")
            .field("stripe_email", &self.stripe_email)
            .finish()
    }
}

/// Everything the payment collaborator needs to take one charge.
#[derive(Clone)]
pub struct ChargeRequest {
    pub order_number: OrderNumber,
    pub amount: Price,
    pub card_token: String,
    pub description: String,
    pub metadata: BTreeMap<String, String>,
    /// Derived from the order number and the attempt sequence, never from the
    /// card token.
    pub idempotency_key: String,
}

impl ChargeRequest {
    /// Build the charge for a pending attempt.
    ///
    /// The description is the payer's email and the metadata carries the
    /// order number.
    #[must_use]
    pub fn for_attempt(attempt: &PaymentAttempt, submission: &PaymentSubmission) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("order_number".to_string(), attempt.order_number.to_string());
        Self {
            order_number: attempt.order_number,
            amount: attempt.amount,
            card_token: attempt.card_token.clone(),
            description: submission.stripe_email.to_string(),
            metadata,
            idempotency_key: idempotency_key(attempt.order_number, attempt.sequence),
        }
    }
}

impl std::fmt::Debug for ChargeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargeRequest")
            .field("order_number", &self.order_number)
            .field("amount", &self.amount)
            .field("card_token", &"[REDACTED]")
            .field("description", &self.description)
            .field("metadata", &self.metadata)
            .field("idempotency_key", &self.idempotency_key)
            .finish()
    }
}

/// Gateway idempotency key for the `sequence`-th card attempt on an order.
///
/// The sequence only moves on after a decline, so every resubmission
/// following a gateway failure reuses the key whatever token it carries.
#[must_use]
pub fn idempotency_key(order_number: OrderNumber, sequence: u32) -> String {
    format!("cleanjoy-order-{order_number}-{sequence}")
}

/// A single payment submission and what became of it.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct PaymentAttempt {
    pub id: Uuid,
    pub order_number: OrderNumber,
    /// Position among the order's card attempts, starting at 1.
    pub sequence: u32,
    pub amount: Price,
    #[serde(skip_serializing)]
    pub card_token: String,
    pub outcome: PaymentOutcome,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentAttempt {
    /// Start a pending attempt.
    #[must_use]
    pub fn pending(
        order_number: OrderNumber,
        sequence: u32,
        amount: Price,
        card_token: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_number,
            sequence,
            amount,
            card_token: card_token.into(),
            outcome: PaymentOutcome::Pending,
            reference: None,
            created_at: Utc::now(),
        }
    }

    /// Mark the attempt as succeeded with the gateway reference.
    ///
    /// Returns `false` (and changes nothing) if the attempt is already terminal.
    pub fn succeed(&mut self, reference: impl Into<String>) -> bool {
        self.finish(PaymentOutcome::Succeeded, Some(reference.into()))
    }

    /// Mark the attempt as declined.
    pub fn decline(&mut self) -> bool {
        self.finish(PaymentOutcome::Declined, None)
    }

    /// Mark the attempt as errored (safe to retry).
    pub fn error(&mut self) -> bool {
        self.finish(PaymentOutcome::Errored, None)
    }

    fn finish(&mut self, outcome: PaymentOutcome, reference: Option<String>) -> bool {
        if self.outcome.is_terminal() {
            return false;
        }
        self.outcome = outcome;
        self.reference = reference;
        true
    }
}

impl std::fmt::Debug for PaymentAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentAttempt")
            .field("id", &self.id)
            .field("order_number", &self.order_number)
            .field("sequence", &self.sequence)
            .field("amount", &self.amount)
            .field("card_token", &"[REDACTED]")
            .field("outcome", &self.outcome)
            .field("reference", &self.reference)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// The payment instrument/reference that funded an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSource {
    pub source_type: String,
    pub currency: CurrencyCode,
    pub amount_allocated: Decimal,
    pub amount_debited: Decimal,
    pub reference: String,
}

/// Append-only record of a monetary action against an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub kind: PaymentEventKind,
    pub amount: Decimal,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

//! Status enums for checkout entities.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a single payment attempt.
///
/// An attempt starts `Pending` and becomes terminal once it leaves that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    #[default]
    Pending,
    Succeeded,
    /// The gateway refused the card; resubmitting the same details will not help.
    Declined,
    /// Transport or gateway failure; safe to retry with the same idempotency key.
    Errored,
}

impl PaymentOutcome {
    /// Whether the outcome is final.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Kind of monetary action recorded against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    Purchase,
    Refund,
}

impl fmt::Display for PaymentEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Purchase => write!(f, "purchase"),
            Self::Refund => write!(f, "refund"),
        }
    }
}

/// Order financial status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed without payment (zero total).
    #[default]
    Placed,
    Paid,
    Refunded,
}

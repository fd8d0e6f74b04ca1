//! Step preconditions.
//!
//! Each step declares an ordered list of named [`Precondition`]s.
//! [`evaluate`] runs them in declaration order and stops at the first one
//! that fails, so the reported reason is always the earliest unmet
//! requirement. Evaluation has no side effects.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Basket, CheckoutSession, Identity, Step};

/// A named check gating entry to a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    BasketNotEmpty,
    BasketValid,
    EmailCaptured,
    /// Satisfied when an address is staged or the basket needs no shipping.
    AddressCaptured,
    ShippingMethodCaptured,
}

impl Precondition {
    /// Stable name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BasketNotEmpty => "basket_not_empty",
            Self::BasketValid => "basket_valid",
            Self::EmailCaptured => "email_captured",
            Self::AddressCaptured => "address_captured",
            Self::ShippingMethodCaptured => "shipping_method_captured",
        }
    }

    /// Message shown to the user when the check fails.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::BasketNotEmpty => "You need to add some items to your basket to checkout",
            Self::BasketValid => "Your basket has items that can no longer be booked",
            Self::EmailCaptured => "Please either sign in or enter your email address",
            Self::AddressCaptured => "Please choose a shipping address",
            Self::ShippingMethodCaptured => "Please choose a shipping method",
        }
    }

    /// The step that can satisfy this precondition.
    #[must_use]
    pub const fn redirect_target(self) -> Step {
        match self {
            Self::AddressCaptured => Step::Address,
            Self::ShippingMethodCaptured => Step::ShippingMethod,
            Self::BasketNotEmpty | Self::BasketValid | Self::EmailCaptured => Step::Details,
        }
    }

    /// Run the check.
    #[must_use]
    pub fn is_satisfied(self, ctx: &GuardContext<'_>) -> bool {
        match self {
            Self::BasketNotEmpty => !ctx.basket.is_empty(),
            Self::BasketValid => ctx.basket.is_valid(),
            Self::EmailCaptured => {
                ctx.identity.is_authenticated() || ctx.session.guest_email().is_some()
            }
            Self::AddressCaptured => {
                !ctx.basket.is_shipping_required() || ctx.session.is_shipping_address_set()
            }
            Self::ShippingMethodCaptured => ctx.session.is_shipping_method_set(),
        }
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only inputs to precondition checks.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub session: &'a CheckoutSession,
    pub basket: &'a Basket,
    pub identity: &'a Identity,
}

/// Outcome of evaluating a step's preconditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied(Precondition),
}

const SUBMISSION: &[Precondition] = &[
    Precondition::BasketNotEmpty,
    Precondition::BasketValid,
    Precondition::EmailCaptured,
    Precondition::AddressCaptured,
    Precondition::ShippingMethodCaptured,
];

/// Preconditions declared by a step, in evaluation order.
#[must_use]
pub const fn preconditions(step: Step) -> &'static [Precondition] {
    match step {
        Step::Details | Step::ThankYou => &[],
        Step::Address => &[Precondition::BasketNotEmpty, Precondition::BasketValid],
        Step::ShippingMethod => &[
            Precondition::BasketNotEmpty,
            Precondition::BasketValid,
            Precondition::EmailCaptured,
            Precondition::AddressCaptured,
        ],
        Step::PaymentMethod | Step::PaymentDetails => SUBMISSION,
    }
}

/// Evaluate a list of preconditions, stopping at the first failure.
#[must_use]
pub fn evaluate_all(preconditions: &[Precondition], ctx: &GuardContext<'_>) -> Verdict {
    preconditions
        .iter()
        .copied()
        .find(|p| !p.is_satisfied(ctx))
        .map_or(Verdict::Allowed, Verdict::Denied)
}

/// Evaluate the preconditions declared for `step`.
#[must_use]
pub fn evaluate(step: Step, ctx: &GuardContext<'_>) -> Verdict {
    evaluate_all(preconditions(step), ctx)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use cleanjoy_core::{BasketId, CurrencyCode, Email, SessionId, UserId};

    use super::*;
    use crate::models::{AddressRecord, BasketLine};

    fn basket(lines: usize) -> Basket {
        let mut basket = Basket::new(BasketId::new(1), CurrencyCode::SEK);
        for _ in 0..lines {
            basket.lines.push(BasketLine {
                sku: "clean-30hr".to_string(),
                title: "Home cleaning 3h".to_string(),
                quantity: 1,
                unit_price_excl_tax: dec!(800),
                unit_tax: dec!(200),
                available: true,
            });
        }
        basket
    }

    fn address() -> AddressRecord {
        AddressRecord {
            title: None,
            first_name: "Anna".to_string(),
            last_name: "Svensson".to_string(),
            line1: "Storgatan 1".to_string(),
            line2: None,
            line3: None,
            line4: "Stockholm".to_string(),
            state: None,
            postcode: "11122".to_string(),
            country: "SE".to_string(),
            phone: None,
            notes: None,
        }
    }

    #[test]
    fn test_first_failure_wins() {
        // BasketNotEmpty passes, EmailCaptured and AddressCaptured both fail.
        let session = CheckoutSession::new(SessionId::new("s"));
        let basket = basket(1);
        let ctx = GuardContext {
            session: &session,
            basket: &basket,
            identity: &Identity::Guest,
        };
        let order = [
            Precondition::BasketNotEmpty,
            Precondition::EmailCaptured,
            Precondition::AddressCaptured,
        ];
        assert_eq!(
            evaluate_all(&order, &ctx),
            Verdict::Denied(Precondition::EmailCaptured)
        );

        let reversed = [
            Precondition::BasketNotEmpty,
            Precondition::AddressCaptured,
            Precondition::EmailCaptured,
        ];
        assert_eq!(
            evaluate_all(&reversed, &ctx),
            Verdict::Denied(Precondition::AddressCaptured)
        );
    }

    #[test]
    fn test_empty_basket_denied_before_anything_else() {
        let session = CheckoutSession::new(SessionId::new("s"));
        let basket = basket(0);
        let ctx = GuardContext {
            session: &session,
            basket: &basket,
            identity: &Identity::Guest,
        };
        assert_eq!(
            evaluate(Step::PaymentDetails, &ctx),
            Verdict::Denied(Precondition::BasketNotEmpty)
        );
    }

    #[test]
    fn test_signed_in_user_has_email() {
        let session = CheckoutSession::new(SessionId::new("s"));
        let basket = basket(1);
        let identity = Identity::User {
            id: UserId::new(5),
            email: Email::parse("kund@example.se").unwrap(),
        };
        let ctx = GuardContext {
            session: &session,
            basket: &basket,
            identity: &identity,
        };
        assert!(Precondition::EmailCaptured.is_satisfied(&ctx));
    }

    #[test]
    fn test_address_not_needed_without_shipping() {
        let session = CheckoutSession::new(SessionId::new("s"));
        let mut basket = basket(1);
        basket.shipping_required = false;
        let ctx = GuardContext {
            session: &session,
            basket: &basket,
            identity: &Identity::Guest,
        };
        assert!(Precondition::AddressCaptured.is_satisfied(&ctx));
    }

    #[test]
    fn test_payment_steps_allowed_when_everything_captured() {
        let mut session = CheckoutSession::new(SessionId::new("s"));
        session
            .set_guest_email(Email::parse("kund@example.se").unwrap())
            .unwrap();
        session.ship_to_new_address(address()).unwrap();
        session
            .use_shipping_method(crate::models::ShippingMethodCode::new("standard"), true)
            .unwrap();
        let basket = basket(1);
        let ctx = GuardContext {
            session: &session,
            basket: &basket,
            identity: &Identity::Guest,
        };
        assert_eq!(evaluate(Step::PaymentMethod, &ctx), Verdict::Allowed);
        assert_eq!(evaluate(Step::PaymentDetails, &ctx), Verdict::Allowed);
    }

    #[test]
    fn test_entry_and_terminal_steps_are_unguarded() {
        assert!(preconditions(Step::Details).is_empty());
        assert!(preconditions(Step::ThankYou).is_empty());
    }
}

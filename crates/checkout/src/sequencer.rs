//! Step sequencing.
//!
//! [`StepSequencer::advance`] runs one request against one step:
//!
//! 1. A finalized session only serves the thank-you page. Asking for the
//!    details step starts a fresh checkout; any other step redirects to
//!    thank-you.
//! 2. The step's preconditions are evaluated in order; the first failure
//!    redirects to the step that can satisfy it.
//! 3. Submissions meant for another step are rejected.
//! 4. The handler runs. Recoverable errors become redirects carrying a user
//!    message; collaborator failures propagate.

use tracing::{error, info, instrument, warn};

use crate::error::CheckoutError;
use crate::guard::{self, GuardContext, Verdict};
use crate::models::{Message, Step, Transition};
use crate::steps::shipping_method::SHIPPING_NOT_PERMITTED;
use crate::steps::{Action, CheckoutStep, StepContext};

/// Shown when a submitted address-book entry is not the user's.
pub const ADDRESS_NOT_FOUND: &str = "The selected address could not be found";

/// Shown when the gateway failed or timed out.
pub const PAYMENT_UNAVAILABLE: &str =
    "We could not reach the payment provider. Please try again.";

/// Shown when the basket was already turned into a different order.
pub const BASKET_ALREADY_ORDERED: &str =
    "This basket has already been booked. Please start a new booking.";

/// Shown when the thank-you page has no order to display.
pub const NO_ORDER_FOUND: &str = "No order found";

/// One handler per checkout step.
pub struct StepHandlers {
    pub details: Box<dyn CheckoutStep>,
    pub address: Box<dyn CheckoutStep>,
    pub shipping_method: Box<dyn CheckoutStep>,
    pub payment_method: Box<dyn CheckoutStep>,
    pub payment_details: Box<dyn CheckoutStep>,
    pub thank_you: Box<dyn CheckoutStep>,
}

/// Drives the linear checkout.
pub struct StepSequencer {
    handlers: StepHandlers,
}

impl StepSequencer {
    #[must_use]
    pub const fn new(handlers: StepHandlers) -> Self {
        Self { handlers }
    }

    /// The handler serving `step`.
    #[must_use]
    pub fn handler(&self, step: Step) -> &dyn CheckoutStep {
        let handler = match step {
            Step::Details => &self.handlers.details,
            Step::Address => &self.handlers.address,
            Step::ShippingMethod => &self.handlers.shipping_method,
            Step::PaymentMethod => &self.handlers.payment_method,
            Step::PaymentDetails => &self.handlers.payment_details,
            Step::ThankYou => &self.handlers.thank_you,
        };
        handler.as_ref()
    }

    /// Run `action` against `step`.
    ///
    /// # Errors
    ///
    /// Returns collaborator failures (stores, price arithmetic) that no step
    /// can recover from. Every checkout-level failure is returned as a
    /// [`Transition::Redirect`] instead.
    #[instrument(
        skip(self, ctx, action),
        fields(step = %step, session_id = %ctx.session.session_id())
    )]
    pub async fn advance(
        &self,
        step: Step,
        ctx: &mut StepContext<'_>,
        action: Action,
    ) -> Result<Transition, CheckoutError> {
        if ctx.session.is_finalized() {
            match step {
                Step::Details => {
                    info!("Order already placed, starting a new checkout");
                    ctx.session.reset();
                }
                Step::ThankYou => {}
                _ => {
                    info!("Order already placed, redirecting to thank-you");
                    return Ok(Transition::Redirect {
                        target: Step::ThankYou,
                        message: None,
                    });
                }
            }
        }

        let handler = self.handler(step);

        let verdict = guard::evaluate_all(
            handler.preconditions(),
            &GuardContext {
                session: ctx.session,
                basket: ctx.basket,
                identity: ctx.identity,
            },
        );
        if let Verdict::Denied(precondition) = verdict {
            warn!(precondition = %precondition, "Step precondition not met");
            return Ok(Transition::redirect(
                precondition.redirect_target(),
                Message::error(precondition.message()),
            ));
        }

        if let Action::Submit(input) = &action
            && let Err(err) = handler.validate(input)
        {
            return recover(step, err);
        }

        match handler.handle(ctx, action).await {
            Ok(transition) => {
                info!(destination = %transition.destination(), "Step handled");
                Ok(transition)
            }
            Err(err) => recover(step, err),
        }
    }
}

/// Turn a recoverable error into a redirect; pass the rest through.
fn recover(step: Step, err: CheckoutError) -> Result<Transition, CheckoutError> {
    let message = match &err {
        CheckoutError::GuardFailed(precondition) => {
            warn!(precondition = %precondition, "Step precondition not met");
            Message::error(precondition.message())
        }
        CheckoutError::Invalid(errors) => {
            warn!(errors = %errors, "Rejected submission");
            return Ok(Transition::redirect(step, Message::error(errors.to_string())));
        }
        CheckoutError::NotFound => {
            warn!("Address-book entry not found for requester");
            Message::error(ADDRESS_NOT_FOUND)
        }
        CheckoutError::ShippingNotPermitted(code) => {
            warn!(code = %code, "Rejected shipping method");
            return Ok(Transition::redirect(
                Step::ShippingMethod,
                Message::error(SHIPPING_NOT_PERMITTED),
            ));
        }
        CheckoutError::Declined { reason } => {
            warn!(reason = %reason, "Payment declined");
            Message::error(format!("Your payment was declined: {reason}"))
        }
        CheckoutError::Gateway(detail) => {
            error!(detail = %detail, "Payment gateway failure");
            Message::error(PAYMENT_UNAVAILABLE)
        }
        CheckoutError::BasketAlreadyOrdered(number) => {
            warn!(order_number = %number, "Basket already ordered");
            Message::error(BASKET_ALREADY_ORDERED)
        }
        CheckoutError::NoOrderFound => {
            warn!("Thank-you requested without a placed order");
            Message::error(NO_ORDER_FOUND)
        }
        _ => return Err(err),
    };

    match err.redirect_target() {
        Some(target) => Ok(Transition::redirect(target, message)),
        None => Err(err),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use cleanjoy_core::{BasketId, CurrencyCode, Email, OrderNumber, SessionId};

    use super::*;
    use crate::events::LogEvents;
    use crate::models::{
        AddressRecord, Basket, BasketLine, CheckoutSession, Identity, PaymentSubmission,
        ShippingMethodCode,
    };
    use crate::payment::PaymentCoordinator;
    use crate::registry::ServiceRegistry;
    use crate::services::{
        InMemoryAddressBook, InMemoryOrderStore, OrderStore, SandboxGateway, ShippingRepository,
        StaticShippingRepository,
    };
    use crate::steps::{
        AddressStep, DetailsStep, PaymentDetailsStep, PaymentMethodStep, ShippingMethodStep,
        StepInput, ThankYouStep,
    };

    fn sequencer(orders: &InMemoryOrderStore) -> StepSequencer {
        let shipping: Arc<dyn ShippingRepository> = Arc::new(StaticShippingRepository::default());
        let orders: Arc<dyn OrderStore> = Arc::new(orders.clone());
        StepSequencer::new(StepHandlers {
            details: Box::new(DetailsStep::new(
                Arc::new(ServiceRegistry::default()),
                Arc::new(LogEvents),
            )),
            address: Box::new(AddressStep::new(Arc::new(InMemoryAddressBook::new()))),
            shipping_method: Box::new(ShippingMethodStep::new(Arc::clone(&shipping))),
            payment_method: Box::new(PaymentMethodStep),
            payment_details: Box::new(PaymentDetailsStep::new(
                shipping,
                Arc::clone(&orders),
                PaymentCoordinator::new(
                    Arc::new(SandboxGateway::new()),
                    Arc::clone(&orders),
                    Duration::from_secs(5),
                ),
                None,
            )),
            thank_you: Box::new(ThankYouStep::new(orders)),
        })
    }

    fn basket() -> Basket {
        let mut basket = Basket::new(BasketId::new(8), CurrencyCode::SEK);
        basket.lines.push(BasketLine {
            sku: "clean-30hr".to_string(),
            title: "Home cleaning 3h".to_string(),
            quantity: 1,
            unit_price_excl_tax: dec!(800),
            unit_tax: dec!(200),
            available: true,
        });
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
            postcode: "111 22".to_string(),
            country: "SE".to_string(),
            phone: None,
            notes: None,
        }
    }

    fn ready_to_pay() -> CheckoutSession {
        let mut session = CheckoutSession::new(SessionId::new("s"));
        session
            .set_guest_email(Email::parse("kund@example.se").unwrap())
            .unwrap();
        session.ship_to_new_address(address()).unwrap();
        session
            .use_shipping_method(ShippingMethodCode::new("home-visit"), true)
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_missing_address_redirects_with_message() {
        let sequencer = sequencer(&InMemoryOrderStore::new());
        let mut session = CheckoutSession::new(SessionId::new("s"));
        session
            .set_guest_email(Email::parse("kund@example.se").unwrap())
            .unwrap();
        let basket = basket();
        let mut ctx = StepContext {
            session: &mut session,
            basket: &basket,
            identity: &Identity::Guest,
        };

        let transition = sequencer
            .advance(Step::ShippingMethod, &mut ctx, Action::View)
            .await
            .unwrap();
        assert_eq!(
            transition,
            Transition::redirect(
                Step::Address,
                Message::error("Please choose a shipping address")
            )
        );
    }

    #[tokio::test]
    async fn test_empty_basket_reported_before_missing_email() {
        let sequencer = sequencer(&InMemoryOrderStore::new());
        let mut session = CheckoutSession::new(SessionId::new("s"));
        let basket = Basket::new(BasketId::new(8), CurrencyCode::SEK);
        let mut ctx = StepContext {
            session: &mut session,
            basket: &basket,
            identity: &Identity::Guest,
        };

        let transition = sequencer
            .advance(Step::PaymentDetails, &mut ctx, Action::View)
            .await
            .unwrap();
        assert_eq!(
            transition,
            Transition::redirect(
                Step::Details,
                Message::error("You need to add some items to your basket to checkout")
            )
        );
    }

    #[tokio::test]
    async fn test_decline_redirects_to_payment_details() {
        let orders = InMemoryOrderStore::new();
        let sequencer = sequencer(&orders);
        let mut session = ready_to_pay();
        let before = session.clone();
        let basket = basket();
        let mut ctx = StepContext {
            session: &mut session,
            basket: &basket,
            identity: &Identity::Guest,
        };

        let transition = sequencer
            .advance(
                Step::PaymentDetails,
                &mut ctx,
                Action::Submit(StepInput::Payment(PaymentSubmission {
                    stripe_token: "tok_chargeDeclinedInsufficientFunds".to_string(),
                    stripe_email: Email::parse("kund@example.se").unwrap(),
                })),
            )
            .await
            .unwrap();
        assert_eq!(
            transition,
            Transition::redirect(
                Step::PaymentDetails,
                Message::error("Your payment was declined: insufficient_funds")
            )
        );
        assert_eq!(session, before);
        assert!(orders.is_empty().await);
    }

    #[tokio::test]
    async fn test_finalized_session_only_serves_thank_you() {
        let sequencer = sequencer(&InMemoryOrderStore::new());
        let mut session = CheckoutSession::new(SessionId::new("s"));
        session.finalize(OrderNumber::new(100_008));
        let basket = basket();
        let mut ctx = StepContext {
            session: &mut session,
            basket: &basket,
            identity: &Identity::Guest,
        };

        let transition = sequencer
            .advance(Step::Address, &mut ctx, Action::View)
            .await
            .unwrap();
        assert_eq!(
            transition,
            Transition::Redirect {
                target: Step::ThankYou,
                message: None
            }
        );

        sequencer
            .advance(Step::Details, &mut ctx, Action::View)
            .await
            .unwrap();
        assert!(!ctx.session.is_finalized());
        assert!(ctx.session.order_number().is_none());
    }

    #[tokio::test]
    async fn test_thank_you_without_order_redirects_to_details() {
        let sequencer = sequencer(&InMemoryOrderStore::new());
        let mut session = CheckoutSession::new(SessionId::new("s"));
        let basket = basket();
        let mut ctx = StepContext {
            session: &mut session,
            basket: &basket,
            identity: &Identity::Guest,
        };

        let transition = sequencer
            .advance(Step::ThankYou, &mut ctx, Action::View)
            .await
            .unwrap();
        assert_eq!(
            transition,
            Transition::redirect(Step::Details, Message::error(NO_ORDER_FOUND))
        );
    }

    #[tokio::test]
    async fn test_input_for_another_step_rejected() {
        let sequencer = sequencer(&InMemoryOrderStore::new());
        let mut session = ready_to_pay();
        let basket = basket();
        let mut ctx = StepContext {
            session: &mut session,
            basket: &basket,
            identity: &Identity::Guest,
        };

        let transition = sequencer
            .advance(
                Step::PaymentDetails,
                &mut ctx,
                Action::Submit(StepInput::ShippingMethod {
                    code: "home-visit".to_string(),
                }),
            )
            .await
            .unwrap();
        assert_eq!(transition.destination(), Step::PaymentDetails);
        assert!(!session.is_finalized());
    }
}

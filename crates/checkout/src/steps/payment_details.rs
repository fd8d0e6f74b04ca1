//! Payment-details step: take the card payment and place the order.
//!
//! The order number is derived from the basket, so resubmitting after a
//! gateway failure charges against the same order. An order already stored
//! under that number is only taken as this checkout's when it books the same
//! thing; otherwise the basket is refused. The session is only changed once
//! the order is placed; a declined or failed charge leaves it exactly as it
//! was.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, instrument};

use cleanjoy_core::{OrderNumber, OrderStatus};

use super::{Action, CheckoutStep, StepContext, StepInput};
use crate::error::CheckoutError;
use crate::guard::Precondition;
use crate::models::{
    OrderTotal, PaymentSubmission, PlacedOrder, ShippingMethod, Step, StepView, Transition,
};
use crate::payment::PaymentCoordinator;
use crate::services::{OrderStore, ShippingRepository};

/// Handler for [`Step::PaymentDetails`].
pub struct PaymentDetailsStep {
    shipping: Arc<dyn ShippingRepository>,
    orders: Arc<dyn OrderStore>,
    payments: PaymentCoordinator,
    publishable_key: Option<String>,
}

impl PaymentDetailsStep {
    #[must_use]
    pub fn new(
        shipping: Arc<dyn ShippingRepository>,
        orders: Arc<dyn OrderStore>,
        payments: PaymentCoordinator,
        publishable_key: Option<String>,
    ) -> Self {
        Self {
            shipping,
            orders,
            payments,
            publishable_key,
        }
    }

    /// The shipping method recorded in the session, as currently offered.
    async fn chosen_method(
        &self,
        ctx: &StepContext<'_>,
    ) -> Result<ShippingMethod, CheckoutError> {
        let code = ctx
            .session
            .shipping_method_code()
            .ok_or(CheckoutError::GuardFailed(Precondition::ShippingMethodCaptured))?;
        if code.is_no_shipping_required() {
            return Ok(ShippingMethod::no_shipping_required());
        }
        self.shipping
            .shipping_methods(ctx.basket, ctx.identity, ctx.session.shipping_address())
            .await?
            .into_iter()
            .find(|method| &method.code == code)
            .ok_or(CheckoutError::GuardFailed(Precondition::ShippingMethodCaptured))
    }

    async fn place_order(
        &self,
        ctx: &mut StepContext<'_>,
        submission: &PaymentSubmission,
    ) -> Result<Transition, CheckoutError> {
        let number = OrderNumber::for_basket(ctx.basket.id);
        let method = self.chosen_method(ctx).await?;
        let total = OrderTotal::calculate(ctx.basket, &method)?;

        let email = ctx
            .identity
            .email()
            .or_else(|| ctx.session.guest_email())
            .cloned()
            .unwrap_or_else(|| submission.stripe_email.clone());

        let order = PlacedOrder {
            number,
            status: OrderStatus::Placed,
            user_id: ctx.identity.user_id(),
            email,
            service: ctx.session.service().cloned(),
            lines: ctx.basket.lines.clone(),
            shipping_address: ctx.session.shipping_address().cloned(),
            shipping_method: method,
            total,
            payment_sources: Vec::new(),
            payment_events: Vec::new(),
            placed_at: Utc::now(),
        };

        if let Some(existing) = self.orders.get(number).await? {
            if !existing.is_same_booking(&order) {
                return Err(CheckoutError::BasketAlreadyOrdered(number));
            }
            info!(order_number = %existing.number, "Order already placed for this checkout");
            ctx.session.finalize(existing.number);
            return Ok(self.advance());
        }

        if total.is_payment_required() {
            self.payments
                .charge(number, total.incl_tax, submission)
                .await?;
        } else {
            info!(order_number = %number, "Nothing to pay, placing order without a charge");
        }

        let placed = self.orders.place(order).await?;

        info!(order_number = %placed.number, total = %placed.total.incl_tax, "Order placed");
        ctx.session.finalize(placed.number);
        Ok(self.advance())
    }
}

#[async_trait]
impl CheckoutStep for PaymentDetailsStep {
    fn step(&self) -> Step {
        Step::PaymentDetails
    }

    #[instrument(skip(self, ctx, action), fields(session_id = %ctx.session.session_id()))]
    async fn handle(
        &self,
        ctx: &mut StepContext<'_>,
        action: Action,
    ) -> Result<Transition, CheckoutError> {
        match action {
            Action::Submit(StepInput::Payment(submission)) => {
                self.place_order(ctx, &submission).await
            }
            Action::Submit(other) => {
                self.validate(&other)?;
                Ok(self.advance())
            }
            Action::View => {
                let method = self.chosen_method(ctx).await?;
                let total = OrderTotal::calculate(ctx.basket, &method)?;
                Ok(Transition::render(StepView::PaymentDetails {
                    total,
                    total_minor_units: total.incl_tax.to_minor_units()?,
                    publishable_key: self.publishable_key.clone(),
                }))
            }
        }
    }
}

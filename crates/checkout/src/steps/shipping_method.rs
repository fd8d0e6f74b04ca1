//! Shipping-method step.
//!
//! Skipped when the basket needs no shipping (the no-shipping sentinel is
//! recorded instead) and when exactly one method is available (it is chosen
//! automatically). With no methods the user is sent back to pick another
//! address.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::{Action, CheckoutStep, StepContext, StepInput};
use crate::error::CheckoutError;
use crate::models::{Message, ShippingMethod, ShippingMethodCode, Step, StepView, Transition};
use crate::services::ShippingRepository;

/// Warning shown when no method serves the chosen address.
pub const SHIPPING_UNAVAILABLE: &str =
    "Shipping is unavailable for your chosen address - please choose another";

/// Error shown when the submitted code is not one of the offered methods.
pub const SHIPPING_NOT_PERMITTED: &str = "Your submitted shipping method is not permitted";

/// Handler for [`Step::ShippingMethod`].
pub struct ShippingMethodStep {
    shipping: Arc<dyn ShippingRepository>,
}

impl ShippingMethodStep {
    #[must_use]
    pub fn new(shipping: Arc<dyn ShippingRepository>) -> Self {
        Self { shipping }
    }

    fn select(
        &self,
        ctx: &mut StepContext<'_>,
        code: ShippingMethodCode,
    ) -> Result<Transition, CheckoutError> {
        ctx.session
            .use_shipping_method(code, ctx.basket.is_shipping_required())?;
        Ok(self.advance())
    }
}

/// The offered method with `code`.
///
/// # Errors
///
/// Returns [`CheckoutError::ShippingNotPermitted`] if no offered method has it.
pub fn choose<'a>(
    methods: &'a [ShippingMethod],
    code: &str,
) -> Result<&'a ShippingMethod, CheckoutError> {
    methods
        .iter()
        .find(|m| m.code.as_str() == code)
        .ok_or_else(|| CheckoutError::ShippingNotPermitted(code.to_string()))
}

#[async_trait]
impl CheckoutStep for ShippingMethodStep {
    fn step(&self) -> Step {
        Step::ShippingMethod
    }

    #[instrument(skip(self, ctx, action), fields(session_id = %ctx.session.session_id()))]
    async fn handle(
        &self,
        ctx: &mut StepContext<'_>,
        action: Action,
    ) -> Result<Transition, CheckoutError> {
        if !ctx.basket.is_shipping_required() {
            debug!("Basket needs no shipping, skipping method choice");
            return self.select(ctx, ShippingMethodCode::no_shipping_required());
        }

        let methods = self
            .shipping
            .shipping_methods(ctx.basket, ctx.identity, ctx.session.shipping_address())
            .await?;

        if methods.is_empty() {
            info!("No shipping methods for chosen address");
            return Ok(Transition::redirect(
                Step::Address,
                Message::warning(SHIPPING_UNAVAILABLE),
            ));
        }

        match action {
            Action::View => {
                if let [only] = methods.as_slice() {
                    debug!(code = %only.code, "Single shipping method, auto-selecting");
                    let code = only.code.clone();
                    return self.select(ctx, code);
                }
                Ok(Transition::render(StepView::ShippingMethod { methods }))
            }
            Action::Submit(StepInput::ShippingMethod { code }) => {
                match choose(&methods, &code).map(|method| method.code.clone()) {
                    Ok(code) => self.select(ctx, code),
                    Err(CheckoutError::ShippingNotPermitted(code)) => {
                        info!(code = %code, "Rejected shipping method");
                        Ok(Transition::render_with(
                            StepView::ShippingMethod { methods },
                            Message::error(SHIPPING_NOT_PERMITTED),
                        ))
                    }
                    Err(other) => Err(other),
                }
            }
            Action::Submit(other) => {
                self.validate(&other)?;
                Ok(Transition::render(StepView::ShippingMethod { methods }))
            }
        }
    }
}

//! Payment-method step. Card payment is the only method, so this step
//! always passes straight through to payment details.

use async_trait::async_trait;

use super::{Action, CheckoutStep, StepContext};
use crate::error::CheckoutError;
use crate::models::{Step, Transition};

/// Handler for [`Step::PaymentMethod`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PaymentMethodStep;

#[async_trait]
impl CheckoutStep for PaymentMethodStep {
    fn step(&self) -> Step {
        Step::PaymentMethod
    }

    async fn handle(
        &self,
        _ctx: &mut StepContext<'_>,
        _action: Action,
    ) -> Result<Transition, CheckoutError> {
        Ok(self.advance())
    }
}

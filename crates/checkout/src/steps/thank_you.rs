//! Thank-you step. Renders the order placed by this session; never charges.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{Action, CheckoutStep, StepContext};
use crate::error::CheckoutError;
use crate::models::{Step, StepView, Transition};
use crate::services::OrderStore;

/// Handler for [`Step::ThankYou`].
pub struct ThankYouStep {
    orders: Arc<dyn OrderStore>,
}

impl ThankYouStep {
    #[must_use]
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl CheckoutStep for ThankYouStep {
    fn step(&self) -> Step {
        Step::ThankYou
    }

    #[instrument(skip(self, ctx, _action), fields(session_id = %ctx.session.session_id()))]
    async fn handle(
        &self,
        ctx: &mut StepContext<'_>,
        _action: Action,
    ) -> Result<Transition, CheckoutError> {
        let number = ctx.session.order_number().ok_or(CheckoutError::NoOrderFound)?;
        let order = self
            .orders
            .get(number)
            .await?
            .ok_or(CheckoutError::NoOrderFound)?;
        debug!(order_number = %number, "Rendering placed order");
        Ok(Transition::render(StepView::ThankYou {
            order: Box::new(order),
        }))
    }
}

//! Address step: pick an address-book entry or enter a new address.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use super::{Action, CheckoutStep, StepContext, StepInput};
use crate::error::{CheckoutError, FieldErrors};
use crate::models::{Identity, Step, StepView, Transition, UserAddress};
use crate::resolver::AddressResolver;
use crate::services::AddressBook;

/// Address-book entries offered on the address step.
pub const MAX_LISTED_ADDRESSES: usize = 2;

/// Handler for [`Step::Address`].
pub struct AddressStep {
    resolver: AddressResolver,
    book: Arc<dyn AddressBook>,
}

impl AddressStep {
    #[must_use]
    pub fn new(book: Arc<dyn AddressBook>) -> Self {
        Self {
            resolver: AddressResolver::new(Arc::clone(&book)),
            book,
        }
    }

    /// The user's entries to offer, default-for-shipping first.
    async fn available_addresses(
        &self,
        identity: &Identity,
    ) -> Result<Vec<UserAddress>, CheckoutError> {
        let Some(owner) = identity.user_id() else {
            return Ok(Vec::new());
        };
        let mut addresses = self.book.addresses_for(owner).await?;
        addresses.truncate(MAX_LISTED_ADDRESSES);
        Ok(addresses)
    }

    async fn view(
        &self,
        identity: &Identity,
        errors: FieldErrors,
    ) -> Result<Transition, CheckoutError> {
        Ok(Transition::render(StepView::Address {
            addresses: self.available_addresses(identity).await?,
            errors,
        }))
    }
}

#[async_trait]
impl CheckoutStep for AddressStep {
    fn step(&self) -> Step {
        Step::Address
    }

    #[instrument(skip(self, ctx, action), fields(session_id = %ctx.session.session_id()))]
    async fn handle(
        &self,
        ctx: &mut StepContext<'_>,
        action: Action,
    ) -> Result<Transition, CheckoutError> {
        let source = match action {
            Action::View => return self.view(ctx.identity, FieldErrors::new()).await,
            Action::Submit(StepInput::Address { source }) => source,
            Action::Submit(other) => {
                self.validate(&other)?;
                return self.view(ctx.identity, FieldErrors::new()).await;
            }
        };

        match self.resolver.resolve(ctx.identity, &source).await {
            Ok(resolved) => {
                resolved.stage_into(ctx.session)?;
                Ok(self.advance())
            }
            Err(CheckoutError::Invalid(errors)) => self.view(ctx.identity, errors).await,
            Err(other) => Err(other),
        }
    }
}

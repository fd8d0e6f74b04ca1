//! Checkout step handlers.
//!
//! Each step implements [`CheckoutStep`]. The sequencer checks the step's
//! preconditions, validates the submission shape, then hands the request to
//! [`CheckoutStep::handle`], which may mutate the session.
//!
//! # Steps
//!
//! - `details` - Service selection and guest email
//! - `address` - Shipping address from the address book or entered fields
//! - `shipping_method` - Shipping method choice, auto-selected where possible
//! - `payment_method` - Pass-through to payment details
//! - `payment_details` - Card charge and order placement
//! - `thank_you` - Placed order summary

pub mod address;
pub mod details;
pub mod payment_details;
pub mod payment_method;
pub mod shipping_method;
pub mod thank_you;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{CheckoutError, FieldErrors};
use crate::guard::{self, Precondition};
use crate::models::{
    AddressSource, Basket, CheckoutSession, Identity, PaymentSubmission, ServiceKind, Step,
    Transition,
};
use crate::registry::FormInput;

pub use address::AddressStep;
pub use details::DetailsStep;
pub use payment_details::PaymentDetailsStep;
pub use payment_method::PaymentMethodStep;
pub use shipping_method::ShippingMethodStep;
pub use thank_you::ThankYouStep;

/// Data submitted to a step.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepInput {
    /// Details step: the service form and, for guests, an email address.
    Service {
        kind: ServiceKind,
        #[serde(default)]
        fields: FormInput,
        #[serde(default)]
        guest_email: Option<String>,
    },
    /// Address step.
    Address { source: AddressSource },
    /// Shipping-method step.
    ShippingMethod { code: String },
    /// Payment-details step.
    Payment(PaymentSubmission),
}

impl StepInput {
    /// The step this input belongs to.
    #[must_use]
    pub const fn step(&self) -> Step {
        match self {
            Self::Service { .. } => Step::Details,
            Self::Address { .. } => Step::Address,
            Self::ShippingMethod { .. } => Step::ShippingMethod,
            Self::Payment(_) => Step::PaymentDetails,
        }
    }
}

/// What the caller wants from a step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Show the step.
    View,
    /// Submit the step's form.
    Submit(StepInput),
}

/// Per-request inputs handed to a step.
#[derive(Debug)]
pub struct StepContext<'a> {
    pub session: &'a mut CheckoutSession,
    pub basket: &'a Basket,
    pub identity: &'a Identity,
}

/// One stage of the checkout.
#[async_trait]
pub trait CheckoutStep: Send + Sync {
    /// The step this handler serves.
    fn step(&self) -> Step;

    /// Preconditions checked before the handler runs, in order.
    fn preconditions(&self) -> &'static [Precondition] {
        guard::preconditions(self.step())
    }

    /// Reject submissions that do not belong to this step.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Invalid`] for input meant for another step.
    fn validate(&self, input: &StepInput) -> Result<(), CheckoutError> {
        if input.step() == self.step() {
            return Ok(());
        }
        let mut errors = FieldErrors::new();
        errors.add(
            "step",
            format!("{} data cannot be submitted to the {} step", input.step(), self.step()),
        );
        Err(CheckoutError::Invalid(errors))
    }

    /// Handle the request, staging whatever it captures into the session.
    async fn handle(
        &self,
        ctx: &mut StepContext<'_>,
        action: Action,
    ) -> Result<Transition, CheckoutError>;

    /// Where a successful submission leads.
    fn next(&self) -> Option<Step> {
        self.step().next()
    }

    /// Transition to the next step, or stay here if this is the last one.
    fn advance(&self) -> Transition {
        Transition::next(self.next().unwrap_or_else(|| self.step()))
    }
}

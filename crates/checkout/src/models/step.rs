//! Checkout steps and the transitions between them.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FieldErrors;
use crate::registry::FormSchema;

use super::{OrderTotal, PlacedOrder, ServiceKind, ShippingMethod, UserAddress};

/// One stage of the linear checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Details,
    Address,
    ShippingMethod,
    PaymentMethod,
    PaymentDetails,
    ThankYou,
}

impl Step {
    /// All steps in workflow order.
    pub const ALL: [Self; 6] = [
        Self::Details,
        Self::Address,
        Self::ShippingMethod,
        Self::PaymentMethod,
        Self::PaymentDetails,
        Self::ThankYou,
    ];

    /// The step that follows this one on success.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Details => Some(Self::Address),
            Self::Address => Some(Self::ShippingMethod),
            Self::ShippingMethod => Some(Self::PaymentMethod),
            Self::PaymentMethod => Some(Self::PaymentDetails),
            Self::PaymentDetails => Some(Self::ThankYou),
            Self::ThankYou => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Details => "details",
            Self::Address => "address",
            Self::ShippingMethod => "shipping-method",
            Self::PaymentMethod => "payment-method",
            Self::PaymentDetails => "payment-details",
            Self::ThankYou => "thank-you",
        };
        f.write_str(s)
    }
}

/// Severity of a user-facing flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// A user-facing flash message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

impl Message {
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            text: text.into(),
        }
    }
}

/// What a step asks the presentation layer to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepView {
    Details {
        service: ServiceKind,
        form: FormSchema,
        email_required: bool,
        errors: FieldErrors,
    },
    Address {
        /// Address-book entries, default-for-shipping first.
        addresses: Vec<UserAddress>,
        errors: FieldErrors,
    },
    ShippingMethod {
        methods: Vec<ShippingMethod>,
    },
    PaymentDetails {
        total: OrderTotal,
        /// Order total in the currency's minor units, as gateways expect.
        total_minor_units: i64,
        publishable_key: Option<String>,
    },
    ThankYou {
        order: Box<PlacedOrder>,
    },
}

impl StepView {
    /// The step this view belongs to.
    #[must_use]
    pub const fn step(&self) -> Step {
        match self {
            Self::Details { .. } => Step::Details,
            Self::Address { .. } => Step::Address,
            Self::ShippingMethod { .. } => Step::ShippingMethod,
            Self::PaymentDetails { .. } => Step::PaymentDetails,
            Self::ThankYou { .. } => Step::ThankYou,
        }
    }
}

/// Result of handling one checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// Proceed to the given step.
    Next { step: Step },
    /// Stay and render the current step.
    Render {
        view: StepView,
        messages: Vec<Message>,
    },
    /// Send the user back to the step that can fix the problem.
    Redirect {
        target: Step,
        message: Option<Message>,
    },
}

impl Transition {
    #[must_use]
    pub const fn next(step: Step) -> Self {
        Self::Next { step }
    }

    #[must_use]
    pub const fn render(view: StepView) -> Self {
        Self::Render {
            view,
            messages: Vec::new(),
        }
    }

    #[must_use]
    pub fn render_with(view: StepView, message: Message) -> Self {
        Self::Render {
            view,
            messages: vec![message],
        }
    }

    #[must_use]
    pub const fn redirect(target: Step, message: Message) -> Self {
        Self::Redirect {
            target,
            message: Some(message),
        }
    }

    /// The step the user ends up on.
    #[must_use]
    pub const fn destination(&self) -> Step {
        match self {
            Self::Next { step } => *step,
            Self::Render { view, .. } => view.step(),
            Self::Redirect { target, .. } => *target,
        }
    }
}

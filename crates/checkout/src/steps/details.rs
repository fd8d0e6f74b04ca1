//! Details step: choose the service and, for guests, give an email address.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use cleanjoy_core::Email;

use super::{Action, CheckoutStep, StepContext, StepInput};
use crate::error::{CheckoutError, FieldErrors};
use crate::events::{CheckoutEvents, CheckoutStarted};
use crate::models::{ServiceKind, Step, StepView, Transition};
use crate::registry::{FormInput, ServiceRegistry};

/// Field name of the guest email on the details form.
pub const GUEST_EMAIL: &str = "guest_email";

/// Handler for [`Step::Details`].
pub struct DetailsStep {
    registry: Arc<ServiceRegistry>,
    events: Arc<dyn CheckoutEvents>,
}

impl DetailsStep {
    #[must_use]
    pub fn new(registry: Arc<ServiceRegistry>, events: Arc<dyn CheckoutEvents>) -> Self {
        Self { registry, events }
    }

    fn view(
        &self,
        ctx: &StepContext<'_>,
        kind: ServiceKind,
        errors: FieldErrors,
    ) -> Result<Transition, CheckoutError> {
        let form = self.registry.resolve(kind)?;
        Ok(Transition::render(StepView::Details {
            service: kind,
            form: form.schema.clone(),
            email_required: !ctx.identity.is_authenticated(),
            errors,
        }))
    }

    async fn submit(
        &self,
        ctx: &mut StepContext<'_>,
        kind: ServiceKind,
        fields: &FormInput,
        guest_email: Option<&str>,
    ) -> Result<Transition, CheckoutError> {
        let mut errors = FieldErrors::new();

        let selection = match self.registry.resolve(kind)?.validate(kind, fields) {
            Ok(selection) => Some(selection),
            Err(CheckoutError::Invalid(invalid)) => {
                errors.merge(invalid);
                None
            }
            Err(other) => return Err(other),
        };

        let email = if ctx.identity.is_authenticated() {
            None
        } else {
            match guest_email
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(Email::parse)
            {
                None => {
                    errors.add(GUEST_EMAIL, "This field is required.");
                    None
                }
                Some(Err(_)) => {
                    errors.add(GUEST_EMAIL, "Enter a valid email address.");
                    None
                }
                Some(Ok(email)) => Some(email),
            }
        };

        let Some(selection) = selection.filter(|_| errors.is_empty()) else {
            return self.view(ctx, kind, errors);
        };

        if let Some(email) = email {
            ctx.session.set_guest_email(email)?;
        }
        ctx.session.use_service(selection)?;

        if ctx.session.mark_started() {
            debug!("First details submission, emitting checkout started");
            self.events
                .checkout_started(CheckoutStarted {
                    session_id: ctx.session.session_id().clone(),
                    user_id: ctx.identity.user_id(),
                    email: ctx
                        .identity
                        .email()
                        .or_else(|| ctx.session.guest_email())
                        .cloned(),
                    service: kind,
                    at: Utc::now(),
                })
                .await;
        }

        Ok(self.advance())
    }
}

#[async_trait]
impl CheckoutStep for DetailsStep {
    fn step(&self) -> Step {
        Step::Details
    }

    #[instrument(skip(self, ctx, action), fields(session_id = %ctx.session.session_id()))]
    async fn handle(
        &self,
        ctx: &mut StepContext<'_>,
        action: Action,
    ) -> Result<Transition, CheckoutError> {
        match action {
            Action::View => {
                let kind = ctx
                    .session
                    .service()
                    .map_or(ServiceKind::HomeCleaning, |s| s.kind);
                self.view(ctx, kind, FieldErrors::new())
            }
            Action::Submit(StepInput::Service {
                kind,
                fields,
                guest_email,
            }) => self.submit(ctx, kind, &fields, guest_email.as_deref()).await,
            Action::Submit(other) => {
                self.validate(&other)?;
                Ok(self.advance())
            }
        }
    }
}

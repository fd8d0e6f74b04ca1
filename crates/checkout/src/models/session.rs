//! Checkout session state.
//!
//! A [`CheckoutSession`] holds everything captured so far for one user's
//! checkout. It is created on first step entry, mutated only by step
//! handlers, and finalized once the order is placed. After finalization only
//! a full reset is allowed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cleanjoy_core::{AddressId, Email, OrderNumber, SessionId};

use super::{AddressRecord, ServiceSelection, ShippingMethodCode};

/// Errors raised by session mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The order has been placed; the session is read-only until reset.
    #[error("checkout session is finalized")]
    Finalized,

    /// A shipping method was chosen before a shipping address.
    #[error("a shipping address must be chosen before a shipping method")]
    ShippingAddressRequired,
}

/// Partial checkout state for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    session_id: SessionId,
    guest_email: Option<Email>,
    service: Option<ServiceSelection>,
    shipping_address: Option<AddressRecord>,
    /// Address-book entry the shipping address was copied from, if any.
    user_address_id: Option<AddressId>,
    shipping_method_code: Option<ShippingMethodCode>,
    order_number: Option<OrderNumber>,
    started: bool,
    finalized: bool,
}

impl CheckoutSession {
    /// Create an empty session.
    #[must_use]
    pub const fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            guest_email: None,
            service: None,
            shipping_address: None,
            user_address_id: None,
            shipping_method_code: None,
            order_number: None,
            started: false,
            finalized: false,
        }
    }

    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub const fn guest_email(&self) -> Option<&Email> {
        self.guest_email.as_ref()
    }

    #[must_use]
    pub const fn service(&self) -> Option<&ServiceSelection> {
        self.service.as_ref()
    }

    #[must_use]
    pub const fn shipping_address(&self) -> Option<&AddressRecord> {
        self.shipping_address.as_ref()
    }

    #[must_use]
    pub const fn user_address_id(&self) -> Option<AddressId> {
        self.user_address_id
    }

    #[must_use]
    pub const fn shipping_method_code(&self) -> Option<&ShippingMethodCode> {
        self.shipping_method_code.as_ref()
    }

    #[must_use]
    pub const fn order_number(&self) -> Option<OrderNumber> {
        self.order_number
    }

    #[must_use]
    pub const fn is_shipping_address_set(&self) -> bool {
        self.shipping_address.is_some()
    }

    #[must_use]
    pub const fn is_shipping_method_set(&self) -> bool {
        self.shipping_method_code.is_some()
    }

    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Stage the guest's email address.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Finalized`] after the order is placed.
    pub fn set_guest_email(&mut self, email: Email) -> Result<(), SessionError> {
        self.ensure_mutable()?;
        self.guest_email = Some(email);
        Ok(())
    }

    /// Stage the chosen service.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Finalized`] after the order is placed.
    pub fn use_service(&mut self, service: ServiceSelection) -> Result<(), SessionError> {
        self.ensure_mutable()?;
        self.service = Some(service);
        Ok(())
    }

    /// Ship to a freshly entered address.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Finalized`] after the order is placed.
    pub fn ship_to_new_address(&mut self, address: AddressRecord) -> Result<(), SessionError> {
        self.ensure_mutable()?;
        self.shipping_address = Some(address);
        self.user_address_id = None;
        Ok(())
    }

    /// Ship to an address-book entry.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Finalized`] after the order is placed.
    pub fn ship_to_user_address(
        &mut self,
        id: AddressId,
        address: AddressRecord,
    ) -> Result<(), SessionError> {
        self.ensure_mutable()?;
        self.shipping_address = Some(address);
        self.user_address_id = Some(id);
        Ok(())
    }

    /// Record the chosen shipping method.
    ///
    /// A method may only be recorded once an address is staged, unless the
    /// basket needs no shipping.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Finalized`] after the order is placed, or
    /// [`SessionError::ShippingAddressRequired`] if no address is staged for a
    /// basket that needs shipping.
    pub fn use_shipping_method(
        &mut self,
        code: ShippingMethodCode,
        shipping_required: bool,
    ) -> Result<(), SessionError> {
        self.ensure_mutable()?;
        if shipping_required && self.shipping_address.is_none() {
            return Err(SessionError::ShippingAddressRequired);
        }
        self.shipping_method_code = Some(code);
        Ok(())
    }

    /// Note that the checkout has started.
    ///
    /// Returns `true` only the first time, so the start event fires once.
    pub const fn mark_started(&mut self) -> bool {
        let first = !self.started;
        self.started = true;
        first
    }

    /// Finalize after the order is placed.
    ///
    /// Drops all staged checkout data and keeps only the order number so the
    /// thank-you page can find the order.
    pub fn finalize(&mut self, order_number: OrderNumber) {
        let session_id = self.session_id.clone();
        *self = Self::new(session_id);
        self.order_number = Some(order_number);
        self.finalized = true;
    }

    /// Clear everything, including a finalized order, to start over.
    pub fn reset(&mut self) {
        let session_id = self.session_id.clone();
        *self = Self::new(session_id);
    }

    const fn ensure_mutable(&self) -> Result<(), SessionError> {
        if self.finalized {
            return Err(SessionError::Finalized);
        }
        Ok(())
    }
}

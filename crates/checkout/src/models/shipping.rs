//! Shipping-method types.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Code identifying a shipping method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShippingMethodCode(String);

impl ShippingMethodCode {
    /// Sentinel recorded when the basket needs no shipping at all.
    pub const NO_SHIPPING_REQUIRED: &'static str = "no-shipping-required";

    /// Wrap a method code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The sentinel code for baskets that need no shipping.
    #[must_use]
    pub fn no_shipping_required() -> Self {
        Self(Self::NO_SHIPPING_REQUIRED.to_owned())
    }

    /// Whether this is the no-shipping sentinel.
    #[must_use]
    pub fn is_no_shipping_required(&self) -> bool {
        self.0 == Self::NO_SHIPPING_REQUIRED
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShippingMethodCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A shipping (for services: travel/visit) option offered for a basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub code: ShippingMethodCode,
    pub name: String,
    #[serde(default)]
    pub charge_excl_tax: Decimal,
    #[serde(default)]
    pub charge_incl_tax: Decimal,
}

impl ShippingMethod {
    /// The free pseudo-method used when shipping is not required.
    #[must_use]
    pub fn no_shipping_required() -> Self {
        Self {
            code: ShippingMethodCode::no_shipping_required(),
            name: "No shipping required".to_string(),
            charge_excl_tax: Decimal::ZERO,
            charge_incl_tax: Decimal::ZERO,
        }
    }
}

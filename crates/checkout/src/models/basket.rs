//! Read-only basket view supplied by the surrounding shop.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cleanjoy_core::{BasketId, CurrencyCode, Price};

/// The basket being checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    pub id: BasketId,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default)]
    pub lines: Vec<BasketLine>,
    /// Whether any line needs a shipping address (on-site services do).
    #[serde(default = "default_true")]
    pub shipping_required: bool,
}

const fn default_true() -> bool {
    true
}

/// A single basket line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketLine {
    pub sku: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price_excl_tax: Decimal,
    pub unit_tax: Decimal,
    /// Whether the product can still be purchased at this price.
    #[serde(default = "default_true")]
    pub available: bool,
}

impl BasketLine {
    /// Line total excluding tax.
    #[must_use]
    pub fn total_excl_tax(&self) -> Decimal {
        self.unit_price_excl_tax * Decimal::from(self.quantity)
    }

    /// Line total including tax.
    #[must_use]
    pub fn total_incl_tax(&self) -> Decimal {
        (self.unit_price_excl_tax + self.unit_tax) * Decimal::from(self.quantity)
    }
}

impl Basket {
    /// Create an empty basket.
    #[must_use]
    pub const fn new(id: BasketId, currency: CurrencyCode) -> Self {
        Self {
            id,
            currency,
            lines: Vec::new(),
            shipping_required: true,
        }
    }

    /// Whether the basket has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether checkout needs a shipping address and method.
    #[must_use]
    pub const fn is_shipping_required(&self) -> bool {
        self.shipping_required
    }

    /// Reasons the basket cannot be checked out, one per offending line.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|line| {
                if line.quantity == 0 {
                    Some(format!("'{}' has no quantity", line.title))
                } else if !line.available {
                    Some(format!("'{}' is no longer available", line.title))
                } else if line.unit_price_excl_tax.is_sign_negative()
                    || line.unit_tax.is_sign_negative()
                {
                    Some(format!("'{}' has an invalid price", line.title))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Whether every line can be purchased.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    /// Basket total excluding tax.
    #[must_use]
    pub fn total_excl_tax(&self) -> Price {
        Price::new(
            self.lines.iter().map(BasketLine::total_excl_tax).sum(),
            self.currency,
        )
    }

    /// Basket total including tax.
    #[must_use]
    pub fn total_incl_tax(&self) -> Price {
        Price::new(
            self.lines.iter().map(BasketLine::total_incl_tax).sum(),
            self.currency,
        )
    }
}

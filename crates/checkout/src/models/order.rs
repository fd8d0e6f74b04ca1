//! Orders placed by the checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cleanjoy_core::{Email, OrderNumber, OrderStatus, Price, PriceError, UserId};

use super::{
    AddressRecord, Basket, BasketLine, PaymentEvent, PaymentSource, ServiceSelection,
    ShippingMethod,
};

/// Order total broken down for display and charging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotal {
    pub excl_tax: Price,
    pub incl_tax: Price,
    pub shipping_incl_tax: Price,
}

impl OrderTotal {
    /// Basket total plus the chosen shipping charge.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::CurrencyMismatch`] if the shipping charge is in a
    /// different currency than the basket.
    pub fn calculate(basket: &Basket, shipping: &ShippingMethod) -> Result<Self, PriceError> {
        let shipping_excl_tax = Price::new(shipping.charge_excl_tax, basket.currency);
        let shipping_incl_tax = Price::new(shipping.charge_incl_tax, basket.currency);
        Ok(Self {
            excl_tax: basket.total_excl_tax().checked_add(shipping_excl_tax)?,
            incl_tax: basket.total_incl_tax().checked_add(shipping_incl_tax)?,
            shipping_incl_tax,
        })
    }

    /// Whether the customer has anything to pay.
    #[must_use]
    pub fn is_payment_required(&self) -> bool {
        !self.incl_tax.is_zero()
    }
}

/// A submitted order, as rendered on the thank-you page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub number: OrderNumber,
    pub status: OrderStatus,
    pub user_id: Option<UserId>,
    pub email: Email,
    pub service: Option<ServiceSelection>,
    pub lines: Vec<BasketLine>,
    pub shipping_address: Option<AddressRecord>,
    pub shipping_method: ShippingMethod,
    pub total: OrderTotal,
    #[serde(default)]
    pub payment_sources: Vec<PaymentSource>,
    #[serde(default)]
    pub payment_events: Vec<PaymentEvent>,
    pub placed_at: DateTime<Utc>,
}

impl PlacedOrder {
    /// Whether `other` books the same thing for the same customer.
    ///
    /// Status, payments and timestamps are ignored.
    #[must_use]
    pub fn is_same_booking(&self, other: &Self) -> bool {
        self.email == other.email
            && self.user_id == other.user_id
            && self.service == other.service
            && self.lines == other.lines
            && self.shipping_address == other.shipping_address
            && self.shipping_method.code == other.shipping_method.code
            && self.total == other.total
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use cleanjoy_core::{BasketId, CurrencyCode};

    use super::*;
    use crate::models::ShippingMethodCode;

    #[test]
    fn test_total_includes_shipping() {
        let mut basket = Basket::new(BasketId::new(3), CurrencyCode::SEK);
        basket.lines.push(BasketLine {
            sku: "clean-20hr".to_string(),
            title: "Home cleaning 2h".to_string(),
            quantity: 1,
            unit_price_excl_tax: dec!(560),
            unit_tax: dec!(140),
            available: true,
        });
        let travel = ShippingMethod {
            code: ShippingMethodCode::new("travel-zone-1"),
            name: "Travel zone 1".to_string(),
            charge_excl_tax: dec!(40),
            charge_incl_tax: dec!(50),
        };

        let total = OrderTotal::calculate(&basket, &travel).unwrap();
        assert_eq!(total.excl_tax.amount, dec!(600));
        assert_eq!(total.incl_tax.amount, dec!(750));
        assert_eq!(total.shipping_incl_tax.amount, dec!(50));
        assert!(total.is_payment_required());
    }

    #[test]
    fn test_same_booking_ignores_payments_but_not_lines() {
        let zero = Price::zero(CurrencyCode::SEK);
        let order = PlacedOrder {
            number: OrderNumber::new(100_042),
            status: OrderStatus::Placed,
            user_id: None,
            email: Email::parse("kund@example.se").unwrap(),
            service: None,
            lines: vec![BasketLine {
                sku: "clean-30hr".to_string(),
                title: "Home cleaning 3h".to_string(),
                quantity: 1,
                unit_price_excl_tax: dec!(800),
                unit_tax: dec!(200),
                available: true,
            }],
            shipping_address: None,
            shipping_method: ShippingMethod::no_shipping_required(),
            total: OrderTotal {
                excl_tax: zero,
                incl_tax: zero,
                shipping_incl_tax: zero,
            },
            payment_sources: Vec::new(),
            payment_events: Vec::new(),
            placed_at: Utc::now(),
        };

        let mut paid = order.clone();
        paid.status = OrderStatus::Paid;
        assert!(order.is_same_booking(&paid));

        let mut bigger = order.clone();
        for line in &mut bigger.lines {
            line.quantity = 3;
        }
        assert!(!order.is_same_booking(&bigger));
    }
}

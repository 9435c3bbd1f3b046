use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::config::AppConfig;
use crate::models::order;

/// Montants d'une commande. `total_amount` est toujours dérivé des composantes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

impl OrderTotals {
    pub fn new(subtotal: Decimal, discount_amount: Decimal, shipping_cost: Decimal, tax_amount: Decimal) -> Self {
        Self {
            subtotal,
            discount_amount,
            shipping_cost,
            tax_amount,
            total_amount: subtotal - discount_amount + shipping_cost + tax_amount,
        }
    }

    /// Recalcule à partir des composantes stockées sur la commande
    pub fn of(order: &order::Model) -> Self {
        Self::new(order.subtotal, order.discount_amount, order.shipping_cost, order.tax_amount)
    }

    pub fn with_shipping(self, shipping_cost: Decimal) -> Self {
        Self::new(self.subtotal, self.discount_amount, shipping_cost, self.tax_amount)
    }
}

pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Frais de port et taxes appliqués à une commande
pub trait ChargePolicy: Send + Sync {
    fn shipping_cost(&self, subtotal: Decimal) -> Decimal;

    /// `taxable` = sous-total après remise
    fn tax_amount(&self, taxable: Decimal) -> Decimal;
}

/// Frais de port fixes et taxe proportionnelle (zéro par défaut)
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatCharges {
    shipping_cost: Decimal,
    tax_rate: Decimal,
}

impl FlatCharges {
    pub fn new(shipping_cost: Decimal, tax_rate: Decimal) -> Self {
        Self { shipping_cost, tax_rate }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.shipping_cost, config.tax_rate)
    }
}

impl ChargePolicy for FlatCharges {
    fn shipping_cost(&self, _subtotal: Decimal) -> Decimal {
        self.shipping_cost
    }

    fn tax_amount(&self, taxable: Decimal) -> Decimal {
        (taxable.max(Decimal::ZERO) * self.tax_rate / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_total_is_derived_from_components() {
        let totals = OrderTotals::new(dec!(1000), dec!(50), dec!(0), dec!(0));
        assert_eq!(totals.total_amount, dec!(950));

        let totals = totals.with_shipping(dec!(12.50));
        assert_eq!(totals.shipping_cost, dec!(12.50));
        assert_eq!(totals.total_amount, dec!(962.50));
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(dec!(19.99), 3), dec!(59.97));
    }

    #[test]
    fn test_default_charges_are_zero() {
        let policy = FlatCharges::default();
        assert_eq!(policy.shipping_cost(dec!(100)), Decimal::ZERO);
        assert_eq!(policy.tax_amount(dec!(100)), Decimal::ZERO);
    }

    #[test]
    fn test_flat_charges_round_tax() {
        let policy = FlatCharges::new(dec!(7.50), dec!(8.25));
        assert_eq!(policy.shipping_cost(dec!(10)), dec!(7.50));
        // 19.99 * 8.25 % = 1.649175
        assert_eq!(policy.tax_amount(dec!(19.99)), dec!(1.65));
    }
}

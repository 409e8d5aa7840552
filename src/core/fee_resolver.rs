//! Marketplace fee resolution
//!
//! A marketplace charges two things for a product: a percentage of the line's
//! gross revenue, on every line, and a flat process fee that a single sale
//! pays at most once per marketplace. `FeeSettlement` carries the set of
//! marketplaces that have already collected their flat fee; it belongs to one
//! settlement and is dropped with it.

use crate::core::traits::Catalog;
use crate::types::{MarketplaceFee, ProductId, SettlementError};
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Fees deducted from one sale line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeDeduction {
    pub percentage_fee: Decimal,
    pub process_fee: Decimal,
}

impl FeeDeduction {
    pub fn total(&self) -> Decimal {
        self.percentage_fee + self.process_fee
    }
}

/// Look up the fee `marketplace` charges for `product`
pub fn resolve_fee<C: Catalog + ?Sized>(
    catalog: &C,
    product: ProductId,
    marketplace: &str,
) -> Option<MarketplaceFee> {
    catalog.marketplace_fee(product, marketplace)
}

/// Per-sale fee state
#[derive(Debug, Default)]
pub struct FeeSettlement {
    charged: HashSet<String>,
}

impl FeeSettlement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the deduction for one line with gross revenue `gross`
    ///
    /// A line without a fee row pays nothing. A line with one always pays the
    /// percentage; it also pays the flat fee if it is the first fee-bearing
    /// line of its marketplace in this sale.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if the percentage fee cannot be computed.
    pub fn settle_line(
        &mut self,
        gross: Decimal,
        fee: Option<&MarketplaceFee>,
    ) -> Result<FeeDeduction, SettlementError> {
        let Some(fee) = fee else {
            return Ok(FeeDeduction::default());
        };

        let percentage_fee = fee
            .percentage_fee(gross)
            .ok_or_else(|| SettlementError::arithmetic_overflow("percentage fee"))?;

        let process_fee = if self.charged.insert(fee.marketplace.clone()) {
            fee.process_fee
        } else {
            Decimal::ZERO
        };

        Ok(FeeDeduction {
            percentage_fee,
            process_fee,
        })
    }

    pub fn has_charged(&self, marketplace: &str) -> bool {
        self.charged.contains(marketplace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn shopee() -> MarketplaceFee {
        MarketplaceFee::new(1, "SHOPEE", Decimal::new(5, 0), Decimal::new(1000, 0))
    }

    #[test]
    fn test_flat_fee_charged_once_per_marketplace() {
        let fee = shopee();
        let mut settlement = FeeSettlement::new();
        let gross = Decimal::new(10000, 0);

        let first = settlement.settle_line(gross, Some(&fee)).unwrap();
        let second = settlement.settle_line(gross, Some(&fee)).unwrap();

        assert_eq!(first.percentage_fee, Decimal::new(500, 0));
        assert_eq!(first.process_fee, Decimal::new(1000, 0));
        assert_eq!(second.percentage_fee, Decimal::new(500, 0));
        assert_eq!(second.process_fee, Decimal::ZERO);

        let net = (gross - first.total()) + (gross - second.total());
        assert_eq!(net, Decimal::new(18000, 0));
    }

    #[test]
    fn test_other_product_same_marketplace_pays_no_second_flat_fee() {
        let mut settlement = FeeSettlement::new();
        let mug = shopee();
        let plate = MarketplaceFee::new(2, "SHOPEE", Decimal::new(2, 0), Decimal::new(500, 0));

        settlement.settle_line(Decimal::new(100, 0), Some(&mug)).unwrap();
        let second = settlement.settle_line(Decimal::new(100, 0), Some(&plate)).unwrap();

        assert_eq!(second.process_fee, Decimal::ZERO);
        assert_eq!(second.percentage_fee, Decimal::new(2, 0));
    }

    #[test]
    fn test_line_without_fee_row_does_not_consume_flat_fee() {
        let mut settlement = FeeSettlement::new();

        let free = settlement.settle_line(Decimal::new(100, 0), None).unwrap();
        assert_eq!(free, FeeDeduction::default());
        assert!(!settlement.has_charged("SHOPEE"));

        let paid = settlement.settle_line(Decimal::new(100, 0), Some(&shopee())).unwrap();
        assert_eq!(paid.process_fee, Decimal::new(1000, 0));
        assert!(settlement.has_charged("SHOPEE"));
    }

    #[rstest]
    #[case(Decimal::new(10000, 0), Decimal::ZERO, Decimal::ZERO)]
    #[case(Decimal::new(10000, 0), Decimal::new(100, 0), Decimal::new(10000, 0))]
    #[case(Decimal::new(333, 0), Decimal::new(25, 1), Decimal::new(8325, 3))]
    fn test_percentage_fee(
        #[case] gross: Decimal,
        #[case] percentage: Decimal,
        #[case] expected: Decimal,
    ) {
        let fee = MarketplaceFee::new(1, "SHOPEE", percentage, Decimal::ZERO);
        let mut settlement = FeeSettlement::new();

        let deduction = settlement.settle_line(gross, Some(&fee)).unwrap();
        assert_eq!(deduction.percentage_fee, expected);
    }
}

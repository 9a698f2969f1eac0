use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;

/// Orders above this subtotal ship free.
pub fn free_shipping_threshold() -> Decimal {
    Decimal::from(500)
}

/// Orders above this subtotal get the bulk discount.
pub fn discount_threshold() -> Decimal {
    Decimal::from(1000)
}

pub fn flat_shipping_charge() -> Decimal {
    Decimal::from(40)
}

pub fn tax_rate() -> Decimal {
    Decimal::new(18, 2)
}

pub fn discount_rate() -> Decimal {
    Decimal::new(10, 2)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub shipping_charge: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn price_breakdown(subtotal: Decimal) -> PriceBreakdown {
    let subtotal = round_money(subtotal);
    let discount_amount = if subtotal > discount_threshold() {
        round_money(subtotal * discount_rate())
    } else {
        Decimal::ZERO
    };
    let shipping_charge = if subtotal > free_shipping_threshold() {
        Decimal::ZERO
    } else {
        flat_shipping_charge()
    };
    let tax_amount = round_money(subtotal * tax_rate());
    let total_amount = round_money(subtotal + shipping_charge + tax_amount - discount_amount);

    PriceBreakdown {
        subtotal,
        shipping_charge,
        tax_amount,
        discount_amount,
        total_amount,
    }
}

pub fn display_price(price: Decimal, discount_price: Option<Decimal>) -> Decimal {
    discount_price.unwrap_or(price)
}

/// Whole-number percentage saved, truncated.
pub fn discount_percentage(price: Decimal, discount_price: Option<Decimal>) -> i32 {
    match discount_price {
        Some(discounted) if price > Decimal::ZERO && discounted < price => {
            let pct = (price - discounted) / price * Decimal::from(100);
            pct.trunc().try_into().unwrap_or(0)
        }
        _ => 0,
    }
}

/// Gateway amounts are integers in the smallest currency unit (paise for INR).
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (round_money(amount) * Decimal::from(100)).trunc().try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn small_order_pays_shipping_and_no_discount() {
        let b = price_breakdown(dec("400"));
        assert_eq!(b.shipping_charge, dec("40"));
        assert_eq!(b.discount_amount, Decimal::ZERO);
        assert_eq!(b.tax_amount, dec("72.00"));
        assert_eq!(b.total_amount, dec("512.00"));
    }

    #[test]
    fn thresholds_are_strictly_greater_than() {
        let at_500 = price_breakdown(dec("500"));
        assert_eq!(at_500.shipping_charge, dec("40"));

        let at_1000 = price_breakdown(dec("1000"));
        assert_eq!(at_1000.shipping_charge, Decimal::ZERO);
        assert_eq!(at_1000.discount_amount, Decimal::ZERO);
    }

    #[test]
    fn large_order_ships_free_with_discount() {
        let b = price_breakdown(dec("2000"));
        assert_eq!(b.shipping_charge, Decimal::ZERO);
        assert_eq!(b.discount_amount, dec("200.00"));
        assert_eq!(b.tax_amount, dec("360.00"));
        assert_eq!(b.total_amount, dec("2160.00"));
    }

    #[test]
    fn rounds_tax_to_two_places() {
        let b = price_breakdown(dec("99.99"));
        assert_eq!(b.tax_amount, dec("18.00"));
        assert_eq!(b.total_amount, dec("157.99"));
    }

    #[test]
    fn display_price_prefers_discount() {
        assert_eq!(display_price(dec("100"), Some(dec("80"))), dec("80"));
        assert_eq!(display_price(dec("100"), None), dec("100"));
    }

    #[test]
    fn discount_percentage_truncates() {
        assert_eq!(discount_percentage(dec("300"), Some(dec("199"))), 33);
        assert_eq!(discount_percentage(dec("300"), None), 0);
        assert_eq!(discount_percentage(Decimal::ZERO, Some(Decimal::ZERO)), 0);
    }

    #[test]
    fn converts_to_paise() {
        assert_eq!(to_minor_units(dec("512.50")), Some(51250));
        assert_eq!(to_minor_units(dec("0.01")), Some(1));
    }
}

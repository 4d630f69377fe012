//! Money amounts as stored in `NUMERIC(14,2)` columns

use rust_decimal::Decimal;

use crate::error::ValidationErrors;

/// Digits kept after the decimal point
pub const MONEY_SCALE: u32 = 2;

/// Smallest amount too large for the column (12 integer digits).
pub fn money_limit() -> Decimal {
    Decimal::from(1_000_000_000_000i64)
}

/// Record an error on `field` when `value` does not fit the column.
/// Trailing zeros do not count towards the scale.
pub fn check_money(field: &'static str, value: Decimal, errors: &mut ValidationErrors) {
    if value.normalize().scale() > MONEY_SCALE {
        errors.add(field, "amount cannot have more than two decimal places");
    }
    if value.abs() >= money_limit() {
        errors.add(field, "amount must be less than 1000000000000");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(0), true)]
    #[case(dec!(0.01), true)]
    #[case(dec!(12.500), true)]
    #[case(dec!(999999999999.99), true)]
    #[case(dec!(0.001), false)]
    #[case(dec!(1000000000000), false)]
    #[case(dec!(100000000000000), false)]
    fn fits_numeric_14_2(#[case] value: Decimal, #[case] ok: bool) {
        let mut errors = ValidationErrors::new();
        check_money("amount", value, &mut errors);
        assert_eq!(errors.is_empty(), ok);
    }
}

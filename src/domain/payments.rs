//! Payment records
//!
//! Payments are bookkeeping only; no gateway is involved. A payment for a
//! listing is what entitles a user to review it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::check_money;
use crate::error::ValidationErrors;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub home_id: Uuid,
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    pub amount: Decimal,
}

impl CreatePaymentRequest {
    pub fn validate(&self) -> Result<Decimal, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.amount <= Decimal::ZERO {
            errors.add("amount", "amount must be greater than zero");
        }
        check_money("amount", self.amount, &mut errors);
        errors.into_result(self.amount)
    }
}

/// Payment with the listing it was made for
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    #[serde(flatten)]
    pub payment: Payment,
    pub home_title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(0), false)]
    #[case(dec!(-10), false)]
    #[case(dec!(0.01), true)]
    #[case(dec!(450000), true)]
    #[case(dec!(0.001), false)]
    #[case(dec!(19.999), false)]
    #[case(dec!(999999999999.99), true)]
    #[case(dec!(100000000000000), false)]
    fn amount_must_be_positive_and_fit(#[case] amount: Decimal, #[case] ok: bool) {
        assert_eq!(CreatePaymentRequest { amount }.validate().is_ok(), ok);
    }
}

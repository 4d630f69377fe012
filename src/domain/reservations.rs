//! Reservations of rental listings
//!
//! Rent is quoted per month; a stay is charged for every started 30-day
//! period.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::listings::{Listing, ListingMode, ListingStatus};
use super::money::{check_money, money_limit};
use crate::error::ValidationErrors;

pub const DAYS_PER_BILLING_PERIOD: i64 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the reservation still holds its dates.
    pub fn holds_dates(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl From<String> for ReservationStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => Self::Pending,
            "confirmed" => Self::Confirmed,
            _ => Self::Cancelled,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub home_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price: Decimal,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.status.holds_dates() && ranges_overlap(self.start_date, self.end_date, start, end)
    }
}

/// Half-open `[start, end)` overlap: a stay may begin the day another ends.
pub fn ranges_overlap(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_start < b_end && b_start < a_end
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReservationRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl CreateReservationRequest {
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.start_date < today {
            errors.add("start_date", "start date cannot be in the past");
        }
        if self.end_date <= self.start_date {
            errors.add("end_date", "end date must be after the start date");
        }
        errors.into_result(())
    }
}

/// Why a listing cannot be reserved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservableError {
    NotActive,
    NotForRent,
    OwnListing,
}

impl std::fmt::Display for ReservableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NotActive => "listing is not available",
            Self::NotForRent => "only rental listings can be reserved",
            Self::OwnListing => "you cannot reserve your own listing",
        })
    }
}

pub fn check_reservable(listing: &Listing, user_id: Uuid) -> Result<(), ReservableError> {
    if listing.status != ListingStatus::Active {
        return Err(ReservableError::NotActive);
    }
    if listing.mode != ListingMode::Rent {
        return Err(ReservableError::NotForRent);
    }
    if listing.is_owned_by(user_id) {
        return Err(ReservableError::OwnListing);
    }
    Ok(())
}

/// Billing periods started between the two dates.
pub fn billing_periods(start: NaiveDate, end: NaiveDate) -> i64 {
    let days = (end - start).num_days().max(0);
    (days + DAYS_PER_BILLING_PERIOD - 1) / DAYS_PER_BILLING_PERIOD
}

/// Total rent for the stay. Fails when the total does not fit a
/// `total_price` column.
pub fn quote(monthly_price: Decimal, start: NaiveDate, end: NaiveDate) -> Result<Decimal, ValidationErrors> {
    let total = monthly_price
        .checked_mul(Decimal::from(billing_periods(start, end)))
        .unwrap_or_else(money_limit);
    let mut errors = ValidationErrors::new();
    check_money("total_price", total, &mut errors);
    errors.into_result(total)
}

/// Who is asking to change a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationActor {
    Owner,
    Guest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateReservationStatusRequest {
    pub status: ReservationStatus,
}

/// Resulting status, or a message explaining the refusal. The owner may
/// confirm a pending reservation or cancel any live one; the guest may
/// only cancel.
pub fn change_status(
    current: ReservationStatus,
    requested: ReservationStatus,
    actor: ReservationActor,
) -> Result<ReservationStatus, &'static str> {
    use ReservationStatus::*;
    match (current, requested, actor) {
        (Cancelled, _, _) => Err("reservation is already cancelled"),
        (Pending, Confirmed, ReservationActor::Owner) => Ok(Confirmed),
        (_, Confirmed, ReservationActor::Guest) => Err("only the owner can confirm a reservation"),
        (Confirmed, Confirmed, _) => Err("reservation is already confirmed"),
        (_, Cancelled, _) => Ok(Cancelled),
        (_, Pending, _) => Err("a reservation cannot be moved back to pending"),
    }
}

/// Reservation with the listing it is for
#[derive(Debug, Clone, Serialize)]
pub struct ReservationResponse {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub home_title: String,
    pub home_photo: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[rstest]
    #[case("2025-01-01", "2025-01-02", 1)]
    #[case("2025-01-01", "2025-01-31", 1)]
    #[case("2025-01-01", "2025-02-01", 2)]
    #[case("2025-01-01", "2025-07-01", 7)]
    fn charges_every_started_period(#[case] start: &str, #[case] end: &str, #[case] periods: i64) {
        assert_eq!(billing_periods(d(start), d(end)), periods);
    }

    #[test]
    fn quote_multiplies_monthly_price() {
        assert_eq!(
            quote(dec!(150000), d("2025-03-01"), d("2025-04-15")).unwrap(),
            dec!(300000)
        );
    }

    #[test]
    fn quote_rejects_totals_too_large_to_store() {
        // 11 periods of 100 billion
        let errors = quote(dec!(100000000000), d("2025-01-01"), d("2025-11-01")).unwrap_err();
        assert!(errors.has("total_price"));
        assert!(quote(dec!(99999999999.99), d("2025-01-01"), d("2025-01-31")).is_ok());
    }

    #[rstest]
    #[case("2025-01-10", "2025-01-20", true)]
    #[case("2025-01-01", "2025-01-05", false)]
    #[case("2025-01-15", "2025-02-01", false)]
    #[case("2025-01-14", "2025-02-01", true)]
    #[case("2024-12-01", "2025-03-01", true)]
    fn overlap_is_half_open(#[case] start: &str, #[case] end: &str, #[case] expected: bool) {
        assert_eq!(
            ranges_overlap(d("2025-01-05"), d("2025-01-15"), d(start), d(end)),
            expected
        );
    }

    #[test]
    fn cancelled_reservations_free_their_dates() {
        let mut reservation = Reservation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            home_id: Uuid::new_v4(),
            start_date: d("2025-01-05"),
            end_date: d("2025-01-15"),
            total_price: dec!(100),
            status: ReservationStatus::Confirmed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(reservation.overlaps(d("2025-01-10"), d("2025-01-12")));
        reservation.status = ReservationStatus::Cancelled;
        assert!(!reservation.overlaps(d("2025-01-10"), d("2025-01-12")));
    }

    #[test]
    fn dates_must_be_ordered_and_upcoming() {
        let today = d("2025-01-10");
        let errors = CreateReservationRequest {
            start_date: d("2025-01-09"),
            end_date: d("2025-01-09"),
        }
        .validate(today)
        .unwrap_err();
        assert!(errors.has("start_date"));
        assert!(errors.has("end_date"));

        assert!(CreateReservationRequest {
            start_date: today,
            end_date: d("2025-02-10"),
        }
        .validate(today)
        .is_ok());
    }

    #[rstest]
    #[case(ReservationStatus::Pending, ReservationStatus::Confirmed, ReservationActor::Owner, Some(ReservationStatus::Confirmed))]
    #[case(ReservationStatus::Pending, ReservationStatus::Confirmed, ReservationActor::Guest, None)]
    #[case(ReservationStatus::Pending, ReservationStatus::Cancelled, ReservationActor::Guest, Some(ReservationStatus::Cancelled))]
    #[case(ReservationStatus::Confirmed, ReservationStatus::Cancelled, ReservationActor::Owner, Some(ReservationStatus::Cancelled))]
    #[case(ReservationStatus::Confirmed, ReservationStatus::Pending, ReservationActor::Owner, None)]
    #[case(ReservationStatus::Cancelled, ReservationStatus::Confirmed, ReservationActor::Owner, None)]
    fn status_changes(
        #[case] current: ReservationStatus,
        #[case] requested: ReservationStatus,
        #[case] actor: ReservationActor,
        #[case] expected: Option<ReservationStatus>,
    ) {
        assert_eq!(change_status(current, requested, actor).ok(), expected);
    }
}

//! Review domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profiles::ProfileSummary;
use crate::error::ValidationErrors;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;
pub const MAX_COMMENT_CHARS: usize = 2000;

/// Review entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub home_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for creating a review
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: i16,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A validated review
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub rating: i16,
    pub comment: Option<String>,
}

impl CreateReviewRequest {
    pub fn validate(self) -> Result<NewReview, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            errors.add(
                "rating",
                format!("rating must be between {} and {}", MIN_RATING, MAX_RATING),
            );
        }

        let comment = self
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if comment
            .as_ref()
            .is_some_and(|c| c.chars().count() > MAX_COMMENT_CHARS)
        {
            errors.add(
                "comment",
                format!("comment must be at most {} characters", MAX_COMMENT_CHARS),
            );
        }

        errors.into_result(NewReview {
            rating: self.rating,
            comment,
        })
    }
}

/// Why a caller may not review a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEligibility {
    Allowed,
    OwnListing,
    NoPayment,
    AlreadyReviewed,
}

impl ReviewEligibility {
    pub fn check(is_owner: bool, has_paid: bool, already_reviewed: bool) -> Self {
        if is_owner {
            Self::OwnListing
        } else if already_reviewed {
            Self::AlreadyReviewed
        } else if !has_paid {
            Self::NoPayment
        } else {
            Self::Allowed
        }
    }
}

/// Response DTO for a review with its author
#[derive(Debug, Clone, Serialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub home_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub reviewer: ProfileSummary,
    pub created_at: DateTime<Utc>,
}

/// Aggregate of a listing's reviews
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReviewSummary {
    pub average_rating: Option<f64>,
    pub review_count: i64,
}

/// Average rating rounded to one decimal place, `None` without reviews.
pub fn summarize(ratings: &[i16]) -> ReviewSummary {
    let count = ratings.len() as i64;
    let average_rating = (count > 0).then(|| {
        let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
        ((sum as f64 / count as f64) * 10.0).round() / 10.0
    });
    ReviewSummary {
        average_rating,
        review_count: count,
    }
}

/// Reviews of a listing plus their aggregate
#[derive(Debug, Clone, Serialize)]
pub struct ListingReviews {
    pub reviews: Vec<ReviewResponse>,
    #[serde(flatten)]
    pub summary: ReviewSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(5, true)]
    #[case(6, false)]
    #[case(-3, false)]
    fn rating_must_be_one_to_five(#[case] rating: i16, #[case] ok: bool) {
        let result = CreateReviewRequest {
            rating,
            comment: None,
        }
        .validate();
        assert_eq!(result.is_ok(), ok);
    }

    #[test]
    fn blank_comment_is_dropped() {
        let review = CreateReviewRequest {
            rating: 4,
            comment: Some("   ".to_string()),
        }
        .validate()
        .unwrap();
        assert_eq!(review.comment, None);
    }

    #[test]
    fn overlong_comment_is_rejected() {
        let errors = CreateReviewRequest {
            rating: 4,
            comment: Some("x".repeat(MAX_COMMENT_CHARS + 1)),
        }
        .validate()
        .unwrap_err();
        assert!(errors.has("comment"));
    }

    #[rstest]
    #[case(true, true, false, ReviewEligibility::OwnListing)]
    #[case(false, false, false, ReviewEligibility::NoPayment)]
    #[case(false, true, true, ReviewEligibility::AlreadyReviewed)]
    #[case(false, true, false, ReviewEligibility::Allowed)]
    fn eligibility(
        #[case] is_owner: bool,
        #[case] has_paid: bool,
        #[case] already_reviewed: bool,
        #[case] expected: ReviewEligibility,
    ) {
        assert_eq!(
            ReviewEligibility::check(is_owner, has_paid, already_reviewed),
            expected
        );
    }

    #[test]
    fn summary_rounds_to_one_decimal() {
        assert_eq!(
            summarize(&[5, 4, 4]),
            ReviewSummary {
                average_rating: Some(4.3),
                review_count: 3
            }
        );
        assert_eq!(summarize(&[]).average_rating, None);
    }
}

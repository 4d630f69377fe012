//! Listing filter engine
//!
//! Browse pages narrow the set of active listings with a conjunction of
//! predicates evaluated in memory.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::listings::{Listing, ListingMode, ListingType};

/// Upper bound of the default price range
pub const DEFAULT_MAX_PRICE: i64 = 10_000_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ModeFilter {
    #[default]
    All,
    Rent,
    Sale,
}

impl ModeFilter {
    fn matches(self, mode: ListingMode) -> bool {
        match self {
            Self::All => true,
            Self::Rent => mode == ListingMode::Rent,
            Self::Sale => mode == ListingMode::Sale,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Building,
    Land,
}

impl TypeFilter {
    fn matches(self, listing_type: ListingType) -> bool {
        match self {
            Self::All => true,
            Self::Building => listing_type == ListingType::Building,
            Self::Land => listing_type == ListingType::Land,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

/// Browse filter. Empty strings are treated the same as absent values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListingFilter {
    pub mode: ModeFilter,
    #[serde(rename = "type")]
    pub listing_type: TypeFilter,
    pub category: Option<String>,
    pub state: Option<String>,
    pub lga: Option<String>,
    /// State the LGA was picked under, when the client sends it
    pub lga_state: Option<String>,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub search: Option<String>,
    pub sort: ListingSort,
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self {
            mode: ModeFilter::All,
            listing_type: TypeFilter::All,
            category: None,
            state: None,
            lga: None,
            lga_state: None,
            min_price: Decimal::ZERO,
            max_price: Decimal::from(DEFAULT_MAX_PRICE),
            search: None,
            sort: ListingSort::Newest,
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ListingFilter {
    /// Narrow to a state. The LGA belongs to the previous state so it is dropped.
    pub fn with_state(mut self, state: Option<String>) -> Self {
        if present(&self.state) != present(&state) {
            self.lga = None;
        }
        self.state = state;
        self
    }

    /// Drop an LGA picked under a different state than the one now
    /// filtered on.
    pub fn normalized(mut self) -> Self {
        match self.lga_state.take() {
            Some(lga_state) => {
                let state = std::mem::replace(&mut self.state, Some(lga_state));
                self.with_state(state)
            }
            None => self,
        }
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        if !self.mode.matches(listing.mode) || !self.listing_type.matches(listing.listing_type) {
            return false;
        }

        // Land carries no category, so the category filter is moot there
        if self.listing_type != TypeFilter::Land {
            if let Some(category) = present(&self.category) {
                if listing.category_name.as_deref() != Some(category) {
                    return false;
                }
            }
        }

        if let Some(state) = present(&self.state) {
            if listing.state != state {
                return false;
            }
        }
        if let Some(lga) = present(&self.lga) {
            if listing.lga != lga {
                return false;
            }
        }

        if listing.price < self.min_price || listing.price > self.max_price {
            return false;
        }

        match present(&self.search) {
            Some(needle) => {
                let needle = needle.to_lowercase();
                [&listing.title, &listing.state, &listing.lga]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }

    /// Matching listings in input order.
    pub fn apply<'a>(&self, listings: &'a [Listing]) -> Vec<&'a Listing> {
        listings.iter().filter(|l| self.matches(l)).collect()
    }

    /// Matching listings ordered by `sort`. Ties keep the newest first.
    pub fn apply_sorted<'a>(&self, listings: &'a [Listing]) -> Vec<&'a Listing> {
        let mut matched = self.apply(listings);
        matched.sort_by(|a, b| match self.sort {
            ListingSort::Newest => b.created_at.cmp(&a.created_at),
            ListingSort::PriceAsc => a
                .price
                .cmp(&b.price)
                .then_with(|| b.created_at.cmp(&a.created_at)),
            ListingSort::PriceDesc => b
                .price
                .cmp(&a.price)
                .then_with(|| b.created_at.cmp(&a.created_at)),
        });
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listings::ListingStatus;
    use chrono::{Duration, Utc};
    use rstest::{fixture, rstest};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[allow(clippy::too_many_arguments)]
    fn listing(
        title: &str,
        mode: ListingMode,
        listing_type: ListingType,
        category: Option<&str>,
        state: &str,
        lga: &str,
        price: Decimal,
        age_days: i64,
    ) -> Listing {
        Listing {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            price,
            mode,
            listing_type,
            category_name: category.map(str::to_string),
            state: state.to_string(),
            lga: lga.to_string(),
            address: None,
            size: None,
            year_built: None,
            features: vec![],
            photo: None,
            images: vec![],
            bedrooms: None,
            livingrooms: None,
            bathrooms: None,
            added_category: category.is_some(),
            added_description: true,
            status: ListingStatus::Active,
            reviewed_by: None,
            rejection_reason: None,
            created_at: Utc::now() - Duration::days(age_days),
            updated_at: Utc::now(),
        }
    }

    #[fixture]
    fn catalogue() -> Vec<Listing> {
        vec![
            listing(
                "Duplex in Lekki",
                ListingMode::Sale,
                ListingType::Building,
                Some("Duplex"),
                "Lagos",
                "Eti-Osa",
                dec!(9500000),
                3,
            ),
            listing(
                "Self-contain near Unilag",
                ListingMode::Rent,
                ListingType::Building,
                Some("Self-contain"),
                "Lagos",
                "Yaba",
                dec!(250000),
                1,
            ),
            listing(
                "Farmland",
                ListingMode::Sale,
                ListingType::Land,
                None,
                "Oyo",
                "Ibadan North",
                dec!(4000000),
                7,
            ),
            listing(
                "Mansion",
                ListingMode::Sale,
                ListingType::Building,
                Some("Detached"),
                "Abuja",
                "Maitama",
                dec!(85000000),
                2,
            ),
        ]
    }

    fn titles(listings: &[&Listing]) -> Vec<String> {
        listings.iter().map(|l| l.title.clone()).collect()
    }

    #[rstest]
    fn default_filter_uses_the_price_ceiling(catalogue: Vec<Listing>) {
        let matched = ListingFilter::default().apply(&catalogue);
        assert_eq!(
            titles(&matched),
            vec!["Duplex in Lekki", "Self-contain near Unilag", "Farmland"]
        );
    }

    #[rstest]
    fn mode_and_type_combine(catalogue: Vec<Listing>) {
        let filter = ListingFilter {
            mode: ModeFilter::Sale,
            listing_type: TypeFilter::Building,
            ..ListingFilter::default()
        };
        assert_eq!(titles(&filter.apply(&catalogue)), vec!["Duplex in Lekki"]);
    }

    #[rstest]
    fn category_is_ignored_for_land(catalogue: Vec<Listing>) {
        let filter = ListingFilter {
            listing_type: TypeFilter::Land,
            category: Some("Duplex".to_string()),
            ..ListingFilter::default()
        };
        assert_eq!(titles(&filter.apply(&catalogue)), vec!["Farmland"]);

        let filter = ListingFilter {
            listing_type: TypeFilter::All,
            category: Some("Duplex".to_string()),
            ..ListingFilter::default()
        };
        assert_eq!(titles(&filter.apply(&catalogue)), vec!["Duplex in Lekki"]);
    }

    #[rstest]
    #[case(dec!(250000), dec!(250000), vec!["Self-contain near Unilag"])]
    #[case(dec!(4000000), dec!(9500000), vec!["Duplex in Lekki", "Farmland"])]
    #[case(dec!(0), dec!(100), vec![])]
    fn price_range_is_inclusive(
        catalogue: Vec<Listing>,
        #[case] min: Decimal,
        #[case] max: Decimal,
        #[case] expected: Vec<&str>,
    ) {
        let filter = ListingFilter {
            min_price: min,
            max_price: max,
            ..ListingFilter::default()
        };
        assert_eq!(titles(&filter.apply(&catalogue)), expected);
    }

    #[rstest]
    #[case("lekki", vec!["Duplex in Lekki"])]
    #[case("LAGOS", vec!["Duplex in Lekki", "Self-contain near Unilag"])]
    #[case("ibadan", vec!["Farmland"])]
    #[case("   ", vec!["Duplex in Lekki", "Self-contain near Unilag", "Farmland"])]
    fn search_is_case_insensitive(
        catalogue: Vec<Listing>,
        #[case] search: &str,
        #[case] expected: Vec<&str>,
    ) {
        let filter = ListingFilter {
            search: Some(search.to_string()),
            ..ListingFilter::default()
        };
        assert_eq!(titles(&filter.apply(&catalogue)), expected);
    }

    #[rstest]
    fn state_and_lga_narrow(catalogue: Vec<Listing>) {
        let filter = ListingFilter {
            state: Some("Lagos".to_string()),
            lga: Some("Yaba".to_string()),
            ..ListingFilter::default()
        };
        assert_eq!(
            titles(&filter.apply(&catalogue)),
            vec!["Self-contain near Unilag"]
        );

        let widened = filter.with_state(Some("Oyo".to_string()));
        assert_eq!(widened.lga, None);
        assert_eq!(titles(&widened.apply(&catalogue)), vec!["Farmland"]);
    }

    #[test]
    fn keeping_the_same_state_keeps_the_lga() {
        let filter = ListingFilter {
            state: Some("Lagos".to_string()),
            lga: Some("Yaba".to_string()),
            ..ListingFilter::default()
        };
        let same = filter.with_state(Some("Lagos".to_string()));
        assert_eq!(same.lga.as_deref(), Some("Yaba"));
    }

    #[rstest]
    fn stale_lga_from_a_query_is_dropped(catalogue: Vec<Listing>) {
        let filter: ListingFilter = serde_json::from_str(
            r#"{"state":"Oyo","lga":"Yaba","lga_state":"Lagos"}"#,
        )
        .unwrap();

        let filter = filter.normalized();
        assert_eq!(filter.state.as_deref(), Some("Oyo"));
        assert_eq!(filter.lga, None);
        assert_eq!(filter.lga_state, None);
        assert_eq!(titles(&filter.apply(&catalogue)), vec!["Farmland"]);
    }

    #[rstest]
    #[case(Some("Lagos"), Some("Yaba"))]
    #[case(None, Some("Yaba"))]
    fn current_lga_survives_normalizing(
        #[case] lga_state: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        let filter = ListingFilter {
            state: Some("Lagos".to_string()),
            lga: Some("Yaba".to_string()),
            lga_state: lga_state.map(str::to_string),
            ..ListingFilter::default()
        }
        .normalized();
        assert_eq!(filter.lga.as_deref(), expected);
    }

    #[rstest]
    #[case(ListingSort::Newest, vec!["Self-contain near Unilag", "Duplex in Lekki", "Farmland"])]
    #[case(ListingSort::PriceAsc, vec!["Self-contain near Unilag", "Farmland", "Duplex in Lekki"])]
    #[case(ListingSort::PriceDesc, vec!["Duplex in Lekki", "Farmland", "Self-contain near Unilag"])]
    fn sorts_matches(
        catalogue: Vec<Listing>,
        #[case] sort: ListingSort,
        #[case] expected: Vec<&str>,
    ) {
        let filter = ListingFilter {
            sort,
            ..ListingFilter::default()
        };
        assert_eq!(titles(&filter.apply_sorted(&catalogue)), expected);
    }

    #[test]
    fn deserializes_partial_query() {
        let filter: ListingFilter =
            serde_json::from_str(r#"{"mode":"Rent","type":"Land","sort":"price_desc"}"#).unwrap();
        assert_eq!(filter.mode, ModeFilter::Rent);
        assert_eq!(filter.listing_type, TypeFilter::Land);
        assert_eq!(filter.max_price, Decimal::from(DEFAULT_MAX_PRICE));
        assert_eq!(filter.sort, ListingSort::PriceDesc);
    }
}

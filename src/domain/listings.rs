//! Listing domain types
//!
//! A listing (stored in the `homes` table) is a building or a plot of land
//! offered for rent or sale. New and edited listings wait in `pending` until
//! an administrator approves them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::check_money;
use super::profiles::ProfileSummary;
use crate::error::ValidationErrors;

/// Minimum number of images a listing must carry.
pub const MIN_IMAGES: usize = 5;
/// Maximum number of images a listing may carry.
pub const MAX_IMAGES: usize = 20;

/// Description stored for land listings submitted without one.
pub const LAND_DEFAULT_DESCRIPTION: &str = "Land property";

/// Whether the property is offered for rent or for sale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ListingMode {
    #[default]
    Rent,
    Sale,
}

impl ListingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rent => "Rent",
            Self::Sale => "Sale",
        }
    }
}

impl From<String> for ListingMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Sale" => Self::Sale,
            _ => Self::Rent,
        }
    }
}

impl std::fmt::Display for ListingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of property
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ListingType {
    #[default]
    Building,
    Land,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Building => "Building",
            Self::Land => "Land",
        }
    }

    pub fn is_land(&self) -> bool {
        matches!(self, Self::Land)
    }
}

impl From<String> for ListingType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Land" => Self::Land,
            _ => Self::Building,
        }
    }
}

impl std::fmt::Display for ListingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation status of a listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    #[default]
    Pending,
    Active,
    Rejected,
    Inactive,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Rejected => "rejected",
            Self::Inactive => "inactive",
        }
    }
}

impl From<String> for ListingStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => Self::Pending,
            "active" => Self::Active,
            "rejected" => Self::Rejected,
            _ => Self::Inactive,
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Building categories offered by the catalogue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    #[serde(rename = "Single-Room")]
    SingleRoom,
    #[serde(rename = "Room-and-Parlour")]
    RoomAndParlour,
    #[serde(rename = "2-Bedroom-Flat")]
    TwoBedroomFlat,
    #[serde(rename = "Self-contain")]
    SelfContain,
    Duplex,
    #[serde(rename = "Storey-building")]
    StoreyBuilding,
    Bungalow,
    Stylish,
    #[serde(rename = "Semi-Detached")]
    SemiDetached,
    Detached,
    Commercial,
    Residential,
    Storage,
    Agriculture,
    Warehouse,
}

impl Category {
    pub const ALL: [Category; 15] = [
        Self::SingleRoom,
        Self::RoomAndParlour,
        Self::TwoBedroomFlat,
        Self::SelfContain,
        Self::Duplex,
        Self::StoreyBuilding,
        Self::Bungalow,
        Self::Stylish,
        Self::SemiDetached,
        Self::Detached,
        Self::Commercial,
        Self::Residential,
        Self::Storage,
        Self::Agriculture,
        Self::Warehouse,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::SingleRoom => "Single-Room",
            Self::RoomAndParlour => "Room-and-Parlour",
            Self::TwoBedroomFlat => "2-Bedroom-Flat",
            Self::SelfContain => "Self-contain",
            Self::Duplex => "Duplex",
            Self::StoreyBuilding => "Storey-building",
            Self::Bungalow => "Bungalow",
            Self::Stylish => "Stylish",
            Self::SemiDetached => "Semi-Detached",
            Self::Detached => "Detached",
            Self::Commercial => "Commercial",
            Self::Residential => "Residential",
            Self::Storage => "Storage",
            Self::Agriculture => "Agriculture",
            Self::Warehouse => "Warehouse",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::SingleRoom => "This is a single room apartment",
            Self::RoomAndParlour => "This is a one bedroom and parlour apartment",
            Self::TwoBedroomFlat => "This is a two bedroom apartment",
            Self::SelfContain => "This is a self-contain",
            Self::Duplex => "This is a duplex",
            Self::StoreyBuilding => "This is a storey Building",
            Self::Bungalow => "This is a bungalow",
            Self::Stylish => "This property is stylish",
            Self::SemiDetached => "This property is semi-detached",
            Self::Detached => "This property is detached",
            Self::Commercial => "This property is for commercial purpose",
            Self::Residential => "This property is for residential purpose",
            Self::Storage => "This property is for storage",
            Self::Agriculture => "This property is for agriculture",
            Self::Warehouse => "This is a warehouse",
        }
    }

    /// Exact, case-sensitive label lookup.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

/// Category entry returned by `GET /categories`
#[derive(Debug, Clone, Serialize)]
pub struct CategoryInfo {
    pub id: usize,
    pub label: &'static str,
    pub description: &'static str,
}

pub fn category_catalogue() -> Vec<CategoryInfo> {
    Category::ALL
        .iter()
        .enumerate()
        .map(|(id, c)| CategoryInfo {
            id,
            label: c.label(),
            description: c.description(),
        })
        .collect()
}

/// Listing entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub mode: ListingMode,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    pub category_name: Option<String>,
    pub state: String,
    pub lga: String,
    pub address: Option<String>,
    pub size: Option<i32>,
    pub year_built: Option<i32>,
    pub features: Vec<String>,
    pub photo: Option<String>,
    pub images: Vec<String>,
    pub bedrooms: Option<String>,
    pub livingrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub added_category: bool,
    pub added_description: bool,
    pub status: ListingStatus,
    pub reviewed_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

/// Request DTO for creating (and fully replacing) a listing
#[derive(Debug, Clone, Deserialize)]
pub struct CreateListingRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub mode: ListingMode,
    #[serde(rename = "type", default)]
    pub listing_type: ListingType,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub lga: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub size: Option<i32>,
    #[serde(default)]
    pub year_built: Option<i32>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub livingrooms: u32,
    #[serde(default)]
    pub bathrooms: u32,
}

/// A validated listing ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub mode: ListingMode,
    pub listing_type: ListingType,
    pub category_name: Option<String>,
    pub state: String,
    pub lga: String,
    pub address: Option<String>,
    pub size: Option<i32>,
    pub year_built: Option<i32>,
    pub features: Vec<String>,
    pub photo: Option<String>,
    pub images: Vec<String>,
    pub bedrooms: Option<String>,
    pub livingrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub added_category: bool,
    pub added_description: bool,
}

/// Validate the image list shared by the wizard and listing submission.
pub fn check_image_count(count: usize, errors: &mut ValidationErrors) {
    if count < MIN_IMAGES {
        errors.add(
            "images",
            format!(
                "at least {} images are required ({} more needed)",
                MIN_IMAGES,
                MIN_IMAGES - count
            ),
        );
    } else if count > MAX_IMAGES {
        errors.add("images", format!("at most {} images are allowed", MAX_IMAGES));
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CreateListingRequest {
    /// Check the submission and normalise the type-dependent fields.
    pub fn validate(self) -> Result<NewListing, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let is_building = !self.listing_type.is_land();

        let title = self.title.trim().to_string();
        if title.is_empty() {
            errors.add("title", "title is required");
        }

        let mut description = self.description.trim().to_string();
        if description.is_empty() {
            if is_building {
                errors.add("description", "description is required");
            } else {
                description = LAND_DEFAULT_DESCRIPTION.to_string();
            }
        }

        if self.price.is_sign_negative() {
            errors.add("price", "price must not be negative");
        }
        check_money("price", self.price, &mut errors);

        let state = self.state.trim().to_string();
        if state.is_empty() {
            errors.add("state", "state is required");
        }
        let lga = self.lga.trim().to_string();
        if lga.is_empty() {
            errors.add("lga", "local government area is required");
        }

        let images: Vec<String> = self
            .images
            .into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        check_image_count(images.len(), &mut errors);

        let category_name = if is_building {
            match non_blank(self.category) {
                Some(label) => match Category::from_label(&label) {
                    Some(category) => Some(category.label().to_string()),
                    None => {
                        errors.add("category", format!("unknown category '{}'", label));
                        None
                    }
                },
                None => {
                    errors.add("category", "buildings need a category");
                    None
                }
            }
        } else {
            None
        };

        let (bedrooms, livingrooms) = if is_building {
            (
                Some(self.bedrooms.to_string()),
                Some(self.livingrooms.to_string()),
            )
        } else {
            (None, None)
        };

        let listing = NewListing {
            title,
            description,
            price: self.price,
            mode: self.mode,
            listing_type: self.listing_type,
            category_name,
            state,
            lga,
            address: non_blank(self.address),
            size: self.size,
            year_built: self.year_built,
            features: self
                .features
                .into_iter()
                .filter_map(|f| non_blank(Some(f)))
                .collect(),
            photo: images.first().cloned(),
            images,
            bedrooms,
            livingrooms,
            bathrooms: Some(self.bathrooms.to_string()),
            added_category: is_building,
            added_description: is_building,
        };

        errors.into_result(listing)
    }
}

/// Listing card shown in search results and dashboards
#[derive(Debug, Clone, Serialize)]
pub struct ListingCard {
    pub id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub mode: ListingMode,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    pub state: String,
    pub lga: String,
    pub photo: Option<String>,
    pub category_name: Option<String>,
    pub status: ListingStatus,
    /// Only ever set on the owner's own non-public listings
    pub rejection_reason: Option<String>,
    /// The caller's favorite id for this listing, if any
    pub favorite_id: Option<Uuid>,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
}

impl ListingCard {
    pub fn from_listing(listing: &Listing, favorite_id: Option<Uuid>) -> Self {
        Self {
            id: listing.id,
            title: listing.title.clone(),
            price: listing.price,
            mode: listing.mode,
            listing_type: listing.listing_type,
            state: listing.state.clone(),
            lga: listing.lga.clone(),
            photo: listing.photo.clone(),
            category_name: listing.category_name.clone(),
            status: listing.status,
            rejection_reason: listing.rejection_reason.clone(),
            favorite_id,
            is_favorite: favorite_id.is_some(),
            created_at: listing.created_at,
        }
    }
}

/// Full listing detail
#[derive(Debug, Clone, Serialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    pub owner: Option<ProfileSummary>,
    pub favorite_id: Option<Uuid>,
    pub favorite_count: i64,
    pub average_rating: Option<f64>,
    pub review_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use rust_decimal_macros::dec;

    fn images(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://cdn.test/homes/{}.png", i)).collect()
    }

    #[fixture]
    fn building() -> CreateListingRequest {
        CreateListingRequest {
            title: "  Two bed flat in Yaba ".to_string(),
            description: "Close to the market".to_string(),
            price: dec!(450000),
            mode: ListingMode::Rent,
            listing_type: ListingType::Building,
            category: Some("2-Bedroom-Flat".to_string()),
            state: "Lagos".to_string(),
            lga: "Yaba".to_string(),
            address: None,
            size: None,
            year_built: None,
            features: vec![],
            images: images(5),
            bedrooms: 2,
            livingrooms: 1,
            bathrooms: 2,
        }
    }

    #[fixture]
    fn land() -> CreateListingRequest {
        CreateListingRequest {
            title: "Plot in Lekki".to_string(),
            description: String::new(),
            price: dec!(12000000),
            mode: ListingMode::Sale,
            listing_type: ListingType::Land,
            category: Some("Duplex".to_string()),
            state: "Lagos".to_string(),
            lga: "Eti-Osa".to_string(),
            address: None,
            size: Some(600),
            year_built: None,
            features: vec![],
            images: images(6),
            bedrooms: 3,
            livingrooms: 2,
            bathrooms: 0,
        }
    }

    #[rstest]
    fn building_keeps_category_and_room_counts(building: CreateListingRequest) {
        let listing = building.validate().expect("valid building");

        assert_eq!(listing.title, "Two bed flat in Yaba");
        assert_eq!(listing.category_name.as_deref(), Some("2-Bedroom-Flat"));
        assert_eq!(listing.bedrooms.as_deref(), Some("2"));
        assert_eq!(listing.livingrooms.as_deref(), Some("1"));
        assert_eq!(listing.bathrooms.as_deref(), Some("2"));
        assert!(listing.added_category);
        assert!(listing.added_description);
        assert_eq!(listing.photo.as_deref(), Some("https://cdn.test/homes/0.png"));
    }

    #[rstest]
    fn land_drops_building_fields_and_defaults_description(land: CreateListingRequest) {
        let listing = land.validate().expect("valid land");

        assert_eq!(listing.category_name, None);
        assert_eq!(listing.bedrooms, None);
        assert_eq!(listing.livingrooms, None);
        assert_eq!(listing.description, LAND_DEFAULT_DESCRIPTION);
        assert!(!listing.added_category);
        assert!(!listing.added_description);
    }

    #[rstest]
    #[case(0)]
    #[case(4)]
    #[case(21)]
    fn image_count_outside_bounds_is_rejected(mut building: CreateListingRequest, #[case] n: usize) {
        building.images = images(n);
        let errors = building.validate().unwrap_err();
        assert!(errors.has("images"));
    }

    #[rstest]
    fn blank_image_urls_do_not_count(mut building: CreateListingRequest) {
        building.images = images(4);
        building.images.push("   ".to_string());
        assert!(building.validate().unwrap_err().has("images"));
    }

    #[rstest]
    fn building_requires_known_category(mut building: CreateListingRequest) {
        building.category = None;
        assert!(building.clone().validate().unwrap_err().has("category"));

        building.category = Some("Castle".to_string());
        assert!(building.validate().unwrap_err().has("category"));
    }

    #[rstest]
    fn reports_every_missing_field(mut building: CreateListingRequest) {
        building.title = " ".to_string();
        building.description = String::new();
        building.state = String::new();
        building.lga = String::new();
        building.price = dec!(-1);

        let errors = building.validate().unwrap_err();
        for field in ["title", "description", "state", "lga", "price"] {
            assert!(errors.has(field), "missing error for {}", field);
        }
    }

    #[rstest]
    #[case(dec!(450000.5), true)]
    #[case(dec!(450000.005), false)]
    #[case(dec!(100000000000000), false)]
    fn price_must_fit_a_money_column(
        mut building: CreateListingRequest,
        #[case] price: Decimal,
        #[case] ok: bool,
    ) {
        building.price = price;
        match building.validate() {
            Ok(listing) => assert!(ok, "accepted {}", listing.price),
            Err(errors) => {
                assert!(!ok);
                assert!(errors.has("price"));
            }
        }
    }

    #[test]
    fn category_labels_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.label()), Some(category));
        }
        assert_eq!(Category::from_label("duplex"), None);
        assert_eq!(category_catalogue().len(), 15);
    }

    #[rstest]
    #[case("pending", ListingStatus::Pending)]
    #[case("active", ListingStatus::Active)]
    #[case("rejected", ListingStatus::Rejected)]
    #[case("inactive", ListingStatus::Inactive)]
    #[case("garbage", ListingStatus::Inactive)]
    fn status_parses_from_column(#[case] raw: &str, #[case] expected: ListingStatus) {
        assert_eq!(ListingStatus::from(raw.to_string()), expected);
    }
}

//! Listing-creation wizard
//!
//! The wizard walks a fixed sequence of steps. Land listings skip the
//! category and room-count steps in both directions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::listings::{
    check_image_count, Category, CreateListingRequest, ListingMode, ListingType, MAX_IMAGES,
};
use super::money::check_money;
use crate::error::ValidationErrors;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WizardStep {
    Type = 0,
    Mode = 1,
    Category = 2,
    State = 3,
    Lga = 4,
    Info = 5,
    Images = 6,
    Description = 7,
    Price = 8,
}

impl WizardStep {
    pub const ALL: [WizardStep; 9] = [
        Self::Type,
        Self::Mode,
        Self::Category,
        Self::State,
        Self::Lga,
        Self::Info,
        Self::Images,
        Self::Description,
        Self::Price,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Whether the step is shown for the given property type.
    pub fn applies_to(self, listing_type: ListingType) -> bool {
        !(listing_type.is_land() && matches!(self, Self::Category | Self::Info))
    }

    /// Following step, `None` on the last one.
    pub fn next(self, listing_type: ListingType) -> Option<Self> {
        match (self, listing_type) {
            (Self::Mode, ListingType::Land) => Some(Self::State),
            (Self::Lga, ListingType::Land) => Some(Self::Images),
            _ => Self::from_index(self.index() + 1),
        }
    }

    /// Preceding step, `None` on the first one.
    pub fn back(self, listing_type: ListingType) -> Option<Self> {
        match (self, listing_type) {
            (Self::Images, ListingType::Land) => Some(Self::Lga),
            (Self::State, ListingType::Land) => Some(Self::Mode),
            (Self::Type, _) => None,
            _ => Self::from_index(self.index() - 1),
        }
    }

    /// A step that does not apply to the type resolves to the nearest
    /// following step that does.
    pub fn normalize(self, listing_type: ListingType) -> Self {
        let mut step = self;
        while !step.applies_to(listing_type) {
            match Self::from_index(step.index() + 1) {
                Some(next) => step = next,
                None => break,
            }
        }
        step
    }

    pub fn is_final(self) -> bool {
        matches!(self, Self::Price)
    }

    pub fn action_label(self) -> &'static str {
        if self.is_final() {
            "Create"
        } else {
            "Next"
        }
    }

    pub fn secondary_action_label(self) -> Option<&'static str> {
        match self {
            Self::Type => None,
            _ => Some("Back"),
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Type => "What type of property is this?",
            Self::Mode => "What is your property listed for?",
            Self::Category => "Which of these best describes your place?",
            Self::State => "What state is your property located?",
            Self::Lga => "What is the local government area of your property?",
            Self::Info => "Share some basics about your place",
            Self::Images => "Add photos of your place (5-20 images)",
            Self::Description => "How would you describe your place?",
            Self::Price => "Now, set your price",
        }
    }
}

/// Steps shown for a property type, in order.
pub fn visible_steps(listing_type: ListingType) -> Vec<WizardStep> {
    WizardStep::ALL
        .into_iter()
        .filter(|s| s.applies_to(listing_type))
        .collect()
}

/// Values collected so far
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListingDraft {
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    pub mode: ListingMode,
    pub category: Option<String>,
    pub state: String,
    pub lga: String,
    pub bedroom_count: u32,
    pub livingroom_count: u32,
    pub bathroom_count: u32,
    pub images: Vec<String>,
    pub title: String,
    pub description: String,
    pub price: Decimal,
}

impl Default for ListingDraft {
    fn default() -> Self {
        Self {
            listing_type: ListingType::Building,
            mode: ListingMode::Rent,
            category: None,
            state: String::new(),
            lga: String::new(),
            bedroom_count: 0,
            livingroom_count: 0,
            bathroom_count: 0,
            images: Vec::new(),
            title: String::new(),
            description: String::new(),
            price: Decimal::ONE,
        }
    }
}

impl ListingDraft {
    /// Pick a state; the LGA belongs to the previous state so it is cleared.
    pub fn set_state(&mut self, state: impl Into<String>) {
        let state = state.into();
        if state != self.state {
            self.lga.clear();
        }
        self.state = state;
    }

    /// Add images, refusing the batch if it would exceed the maximum.
    pub fn add_images(&mut self, urls: Vec<String>) -> Result<(), ValidationErrors> {
        if self.images.len() + urls.len() > MAX_IMAGES {
            let mut errors = ValidationErrors::new();
            errors.add("images", format!("Maximum {} images allowed", MAX_IMAGES));
            return Err(errors);
        }
        self.images.extend(urls);
        Ok(())
    }

    pub fn remove_image(&mut self, index: usize) -> Option<String> {
        (index < self.images.len()).then(|| self.images.remove(index))
    }

    /// Apply one edit. A failed edit leaves the draft unchanged.
    pub fn apply(&mut self, edit: DraftEdit) -> Result<(), ValidationErrors> {
        match edit {
            DraftEdit::SetState { state } => {
                self.set_state(state);
                Ok(())
            }
            DraftEdit::AddImages { urls } => self.add_images(urls),
            DraftEdit::RemoveImage { index } => match self.remove_image(index) {
                Some(_) => Ok(()),
                None => {
                    let mut errors = ValidationErrors::new();
                    errors.add("images", format!("no image at position {}", index));
                    Err(errors)
                }
            },
        }
    }

    /// Errors that block leaving `step` forwards.
    pub fn validate_step(&self, step: WizardStep) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        match step {
            WizardStep::Type | WizardStep::Mode | WizardStep::Info => {}
            WizardStep::Category => {
                if !self.listing_type.is_land() {
                    match self.category.as_deref().map(str::trim) {
                        None | Some("") => errors.add("category", "pick a category"),
                        Some(label) if Category::from_label(label).is_none() => {
                            errors.add("category", format!("unknown category '{}'", label))
                        }
                        Some(_) => {}
                    }
                }
            }
            WizardStep::State => {
                if self.state.trim().is_empty() {
                    errors.add("state", "select a state");
                }
            }
            WizardStep::Lga => {
                if self.lga.trim().is_empty() {
                    errors.add("lga", "select a local government area");
                }
            }
            WizardStep::Images => check_image_count(self.images.len(), &mut errors),
            WizardStep::Description => {
                if self.title.trim().is_empty() {
                    errors.add("title", "title is required");
                }
                if !self.listing_type.is_land() && self.description.trim().is_empty() {
                    errors.add("description", "description is required");
                }
            }
            WizardStep::Price => {
                if self.price.is_sign_negative() {
                    errors.add("price", "price must not be negative");
                }
                check_money("price", self.price, &mut errors);
            }
        }
        errors
    }

    /// Request submitted when the final step is confirmed.
    pub fn into_request(self) -> CreateListingRequest {
        CreateListingRequest {
            title: self.title,
            description: self.description,
            price: self.price,
            mode: self.mode,
            listing_type: self.listing_type,
            category: self.category,
            state: self.state,
            lga: self.lga,
            address: None,
            size: None,
            year_built: None,
            features: Vec::new(),
            images: self.images,
            bedrooms: self.bedroom_count,
            livingrooms: self.livingroom_count,
            bathrooms: self.bathroom_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WizardDirection {
    #[default]
    Next,
    Back,
    /// Re-evaluate the current step without moving
    Stay,
}

/// Change to the draft made on the server, where it carries a rule the
/// plain field values cannot express
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DraftEdit {
    /// Pick a state, clearing the LGA when the state changes
    SetState { state: String },
    AddImages { urls: Vec<String> },
    RemoveImage { index: usize },
}

/// Request body for `POST /listing-wizard`
#[derive(Debug, Clone, Deserialize)]
pub struct WizardRequest {
    pub step: WizardStep,
    #[serde(default)]
    pub direction: WizardDirection,
    #[serde(default)]
    pub draft: ListingDraft,
    /// Applied in order before the move
    #[serde(default)]
    pub edits: Vec<DraftEdit>,
}

/// Wizard view together with the draft it was computed for
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WizardOutcome {
    #[serde(flatten)]
    pub view: WizardView,
    pub draft: ListingDraft,
}

/// Apply the request's edits, then its move. When an edit is refused the
/// wizard stays on the current step and reports why.
pub fn evaluate(req: WizardRequest) -> WizardOutcome {
    let mut draft = req.draft;
    let mut edit_errors = ValidationErrors::new();
    for edit in req.edits {
        if let Err(errors) = draft.apply(edit) {
            edit_errors.merge(errors);
        }
    }

    let direction = if edit_errors.is_empty() {
        req.direction
    } else {
        WizardDirection::Stay
    };
    let mut view = advance(req.step, direction, &draft);
    if !edit_errors.is_empty() {
        view.errors.merge(edit_errors);
        view.blocked = true;
        view.ready_to_submit = false;
    }

    WizardOutcome { view, draft }
}

/// State of the wizard after applying a move
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WizardView {
    pub step: WizardStep,
    pub step_index: usize,
    pub step_count: usize,
    pub title: &'static str,
    pub action_label: &'static str,
    pub secondary_action_label: Option<&'static str>,
    /// True when leaving the current step forwards would be blocked
    pub blocked: bool,
    pub errors: ValidationErrors,
    pub visible_steps: Vec<WizardStep>,
    /// True when the draft is on the last step and passes every check
    pub ready_to_submit: bool,
}

/// Apply a move to the wizard. Moving forwards is refused while the
/// current step has errors; moving back never is.
pub fn advance(step: WizardStep, direction: WizardDirection, draft: &ListingDraft) -> WizardView {
    let listing_type = draft.listing_type;
    let current = step.normalize(listing_type);

    let target = match direction {
        WizardDirection::Stay => current,
        WizardDirection::Back => current.back(listing_type).unwrap_or(current),
        WizardDirection::Next => {
            if draft.validate_step(current).is_empty() {
                current.next(listing_type).unwrap_or(current)
            } else {
                current
            }
        }
    };

    let errors = draft.validate_step(target);
    let steps = visible_steps(listing_type);
    let ready_to_submit = target.is_final()
        && steps.iter().all(|s| draft.validate_step(*s).is_empty());

    WizardView {
        step: target,
        step_index: steps.iter().position(|s| *s == target).unwrap_or(0),
        step_count: steps.len(),
        title: target.title(),
        action_label: target.action_label(),
        secondary_action_label: target.secondary_action_label(),
        blocked: !errors.is_empty(),
        errors,
        visible_steps: steps,
        ready_to_submit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use rust_decimal_macros::dec;
    use WizardStep::*;

    #[fixture]
    fn complete_building() -> ListingDraft {
        ListingDraft {
            category: Some("Bungalow".to_string()),
            state: "Oyo".to_string(),
            lga: "Ibadan North".to_string(),
            images: (0..5).map(|i| format!("img-{}", i)).collect(),
            title: "Bungalow near UI".to_string(),
            description: "Quiet street".to_string(),
            price: dec!(300000),
            ..ListingDraft::default()
        }
    }

    fn walk_forward(listing_type: ListingType) -> Vec<WizardStep> {
        let mut steps = vec![Type];
        let mut step = Type;
        while let Some(next) = step.next(listing_type) {
            steps.push(next);
            step = next;
        }
        steps
    }

    #[test]
    fn building_visits_every_step() {
        assert_eq!(walk_forward(ListingType::Building), WizardStep::ALL.to_vec());
    }

    #[test]
    fn land_skips_category_and_info() {
        let steps = walk_forward(ListingType::Land);
        assert_eq!(steps, vec![Type, Mode, State, Lga, Images, Description, Price]);
        assert_eq!(steps, visible_steps(ListingType::Land));
    }

    #[rstest]
    #[case(ListingType::Land, Images, Some(Lga))]
    #[case(ListingType::Land, State, Some(Mode))]
    #[case(ListingType::Building, Images, Some(Info))]
    #[case(ListingType::Building, State, Some(Category))]
    #[case(ListingType::Building, Type, None)]
    fn back_mirrors_the_skips(
        #[case] listing_type: ListingType,
        #[case] from: WizardStep,
        #[case] expected: Option<WizardStep>,
    ) {
        assert_eq!(from.back(listing_type), expected);
    }

    #[test]
    fn price_is_the_last_step() {
        assert_eq!(Price.next(ListingType::Building), None);
        assert_eq!(Price.action_label(), "Create");
        assert_eq!(Description.action_label(), "Next");
        assert_eq!(Type.secondary_action_label(), None);
        assert_eq!(Mode.secondary_action_label(), Some("Back"));
    }

    #[test]
    fn hidden_steps_normalize_forwards() {
        assert_eq!(Info.normalize(ListingType::Land), Images);
        assert_eq!(Category.normalize(ListingType::Land), State);
        assert_eq!(Category.normalize(ListingType::Building), Category);
    }

    #[rstest]
    fn fewer_than_five_images_blocks_the_images_step(mut complete_building: ListingDraft) {
        complete_building.images.truncate(4);

        let view = advance(Images, WizardDirection::Next, &complete_building);
        assert_eq!(view.step, Images);
        assert!(view.blocked);
        assert!(view.errors.has("images"));
    }

    #[rstest]
    fn five_images_unblock_the_images_step(complete_building: ListingDraft) {
        let view = advance(Images, WizardDirection::Next, &complete_building);
        assert_eq!(view.step, Description);
        assert!(!view.blocked);
    }

    #[rstest]
    fn land_moves_from_mode_to_state(mut complete_building: ListingDraft) {
        complete_building.listing_type = ListingType::Land;

        let view = advance(Mode, WizardDirection::Next, &complete_building);
        assert_eq!(view.step, State);
        assert_eq!(view.step_count, 7);
        assert!(!view.visible_steps.contains(&Category));
    }

    #[rstest]
    fn back_is_never_blocked(mut complete_building: ListingDraft) {
        complete_building.title.clear();
        let view = advance(Description, WizardDirection::Back, &complete_building);
        assert_eq!(view.step, Images);
    }

    #[rstest]
    fn complete_draft_is_ready_on_the_price_step(complete_building: ListingDraft) {
        let view = advance(Description, WizardDirection::Next, &complete_building);
        assert_eq!(view.step, Price);
        assert!(view.ready_to_submit);

        let request = complete_building.into_request();
        assert!(request.validate().is_ok());
    }

    #[rstest]
    fn building_without_category_cannot_leave_category(mut complete_building: ListingDraft) {
        complete_building.category = None;
        let view = advance(Category, WizardDirection::Next, &complete_building);
        assert_eq!(view.step, Category);
        assert!(view.errors.has("category"));
    }

    #[test]
    fn changing_state_clears_lga() {
        let mut draft = ListingDraft {
            state: "Lagos".to_string(),
            lga: "Ikeja".to_string(),
            ..ListingDraft::default()
        };

        draft.set_state("Lagos");
        assert_eq!(draft.lga, "Ikeja");

        draft.set_state("Kano");
        assert!(draft.lga.is_empty());
    }

    #[test]
    fn image_batches_cannot_exceed_twenty() {
        let mut draft = ListingDraft::default();
        draft
            .add_images((0..18).map(|i| i.to_string()).collect())
            .expect("18 fit");

        let err = draft
            .add_images(vec!["a".into(), "b".into(), "c".into()])
            .unwrap_err();
        assert!(err.has("images"));
        assert_eq!(draft.images.len(), 18);

        assert_eq!(draft.remove_image(0).as_deref(), Some("0"));
        assert_eq!(draft.remove_image(99), None);
    }

    fn request(step: WizardStep, draft: ListingDraft, edits: serde_json::Value) -> WizardRequest {
        WizardRequest {
            step,
            direction: WizardDirection::Next,
            draft,
            edits: serde_json::from_value(edits).unwrap(),
        }
    }

    #[rstest]
    fn state_edit_clears_lga_before_the_move(complete_building: ListingDraft) {
        let outcome = evaluate(request(
            State,
            complete_building,
            serde_json::json!([{ "action": "set_state", "state": "Kano" }]),
        ));

        assert_eq!(outcome.draft.state, "Kano");
        assert!(outcome.draft.lga.is_empty());
        assert_eq!(outcome.view.step, Lga);
        assert!(outcome.view.errors.has("lga"));
    }

    #[rstest]
    fn same_state_keeps_lga(complete_building: ListingDraft) {
        let outcome = evaluate(request(
            State,
            complete_building,
            serde_json::json!([{ "action": "set_state", "state": "Oyo" }]),
        ));
        assert_eq!(outcome.draft.lga, "Ibadan North");
    }

    #[rstest]
    fn image_edits_update_the_draft(complete_building: ListingDraft) {
        let outcome = evaluate(request(
            Images,
            complete_building,
            serde_json::json!([
                { "action": "remove_image", "index": 0 },
                { "action": "add_images", "urls": ["img-5", "img-6"] }
            ]),
        ));

        assert_eq!(outcome.draft.images.len(), 6);
        assert_eq!(outcome.draft.images[0], "img-1");
        assert_eq!(outcome.view.step, Description);
    }

    #[rstest]
    fn refused_edit_keeps_the_step(complete_building: ListingDraft) {
        let urls: Vec<String> = (0..16).map(|i| format!("extra-{}", i)).collect();
        let outcome = evaluate(request(
            Images,
            complete_building,
            serde_json::json!([{ "action": "add_images", "urls": urls }]),
        ));

        assert_eq!(outcome.view.step, Images);
        assert!(outcome.view.blocked);
        assert!(outcome.view.errors.has("images"));
        assert_eq!(outcome.draft.images.len(), 5);
    }

    #[test]
    fn draft_defaults_match_a_fresh_form() {
        let draft: ListingDraft = serde_json::from_str("{}").unwrap();
        assert_eq!(draft.mode, ListingMode::Rent);
        assert_eq!(draft.listing_type, ListingType::Building);
        assert_eq!(draft.price, Decimal::ONE);
    }
}

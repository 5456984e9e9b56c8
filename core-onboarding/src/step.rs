//! Wizard steps, their transition table and the per-step validators.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{LocationPermission, UserData};

/// One screen of the onboarding wizard.
///
/// The discriminant is the 1-based position shown to the user and stored
/// in the draft's progress key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Basics = 1,
    Practice = 2,
    Location = 3,
    Preferences = 4,
    Communication = 5,
    Review = 6,
}

/// When `Skip` is offered on a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipRule {
    Never,
    Always,
    /// Only once the user declined to share their location.
    WhenLocationDeclined,
}

/// `(step, next, back, skip rule)`, in wizard order.
const TRANSITIONS: [(WizardStep, Option<WizardStep>, Option<WizardStep>, SkipRule); 6] = [
    (WizardStep::Basics, Some(WizardStep::Practice), None, SkipRule::Never),
    (
        WizardStep::Practice,
        Some(WizardStep::Location),
        Some(WizardStep::Basics),
        SkipRule::Never,
    ),
    (
        WizardStep::Location,
        Some(WizardStep::Preferences),
        Some(WizardStep::Practice),
        SkipRule::WhenLocationDeclined,
    ),
    (
        WizardStep::Preferences,
        Some(WizardStep::Communication),
        Some(WizardStep::Location),
        SkipRule::Always,
    ),
    (
        WizardStep::Communication,
        Some(WizardStep::Review),
        Some(WizardStep::Preferences),
        SkipRule::Always,
    ),
    (WizardStep::Review, None, Some(WizardStep::Communication), SkipRule::Never),
];

impl WizardStep {
    pub const ALL: [WizardStep; 6] = [
        WizardStep::Basics,
        WizardStep::Practice,
        WizardStep::Location,
        WizardStep::Preferences,
        WizardStep::Communication,
        WizardStep::Review,
    ];

    pub const FIRST: WizardStep = WizardStep::Basics;
    pub const TOTAL: u8 = 6;

    pub fn number(self) -> u8 {
        self as u8
    }

    /// Step at 1-based position `number`, if it exists.
    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|step| step.number() == number)
    }

    pub fn title(self) -> &'static str {
        match self {
            WizardStep::Basics => "Basic information",
            WizardStep::Practice => "Practice details",
            WizardStep::Location => "Location",
            WizardStep::Preferences => "Deal preferences",
            WizardStep::Communication => "Communication",
            WizardStep::Review => "Review",
        }
    }

    fn row(self) -> &'static (WizardStep, Option<WizardStep>, Option<WizardStep>, SkipRule) {
        &TRANSITIONS[usize::from(self.number() - 1)]
    }

    pub fn next(self) -> Option<Self> {
        self.row().1
    }

    pub fn previous(self) -> Option<Self> {
        self.row().2
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// Whether `Skip` is available on this step for `data`.
    pub fn is_skippable(self, data: &UserData) -> bool {
        match self.row().3 {
            SkipRule::Never => false,
            SkipRule::Always => true,
            SkipRule::WhenLocationDeclined => {
                data.location_permission == LocationPermission::Declined
            }
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.title())
    }
}

/// A navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Next,
    Back,
    Skip,
    /// "Edit" on a reviewed section: jump straight back to an earlier step.
    JumpTo(WizardStep),
}

impl StepAction {
    pub fn label(&self) -> &'static str {
        match self {
            StepAction::Next => "next",
            StepAction::Back => "back",
            StepAction::Skip => "skip",
            StepAction::JumpTo(_) => "jump",
        }
    }
}

/// Where `action` leads from `from`, or `None` if it is not allowed.
///
/// Validation is not consulted here; `Next` is gated by [`validate_step`]
/// in the wizard.
pub fn transition(from: WizardStep, action: StepAction, data: &UserData) -> Option<WizardStep> {
    match action {
        StepAction::Next => from.next(),
        StepAction::Back => from.previous(),
        StepAction::Skip if from.is_skippable(data) => from.next(),
        StepAction::Skip => None,
        StepAction::JumpTo(target) if target < from => Some(target),
        StepAction::JumpTo(_) => None,
    }
}

/// Outcome of validating one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepValidation {
    pub valid: bool,
    pub message: Option<String>,
}

impl StepValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    fn invalid(message: &str) -> Self {
        Self {
            valid: false,
            message: Some(message.to_string()),
        }
    }
}

/// Check whether `step` may be left with `Next`.
///
/// Pure: the result depends only on the arguments.
pub fn validate_step(step: WizardStep, data: &UserData) -> StepValidation {
    let blank = |value: &str| value.trim().is_empty();

    match step {
        WizardStep::Basics if blank(&data.full_name) => {
            StepValidation::invalid("Please enter your full name.")
        }
        WizardStep::Practice if blank(&data.specialty) => {
            StepValidation::invalid("Please select your specialty.")
        }
        WizardStep::Location if blank(&data.country) => {
            StepValidation::invalid("Please enter your country.")
        }
        WizardStep::Preferences if data.deal_preferences.iter().all(|p| blank(p)) => {
            StepValidation::invalid("Please select at least one deal preference.")
        }
        _ => StepValidation::ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering_round_trip_and_bounds() {
        for step in WizardStep::ALL {
            assert_eq!(WizardStep::from_number(step.number()), Some(step));
        }
        assert_eq!(WizardStep::from_number(0), None);
        assert_eq!(WizardStep::from_number(7), None);
        assert_eq!(WizardStep::TOTAL as usize, WizardStep::ALL.len());
    }

    #[test]
    fn test_linear_order() {
        assert_eq!(WizardStep::Basics.previous(), None);
        assert_eq!(WizardStep::Basics.next(), Some(WizardStep::Practice));
        assert_eq!(WizardStep::Communication.next(), Some(WizardStep::Review));
        assert!(WizardStep::Review.is_terminal());
    }

    #[test]
    fn test_skip_rules() {
        let mut data = UserData::default();
        assert!(!WizardStep::Basics.is_skippable(&data));
        assert!(!WizardStep::Practice.is_skippable(&data));
        assert!(!WizardStep::Location.is_skippable(&data));
        assert!(WizardStep::Preferences.is_skippable(&data));
        assert!(WizardStep::Communication.is_skippable(&data));
        assert!(!WizardStep::Review.is_skippable(&data));

        data.location_permission = LocationPermission::Declined;
        assert!(WizardStep::Location.is_skippable(&data));
        data.location_permission = LocationPermission::Granted;
        assert!(!WizardStep::Location.is_skippable(&data));
    }

    #[test]
    fn test_jump_only_goes_backwards() {
        let data = UserData::default();
        assert_eq!(
            transition(WizardStep::Review, StepAction::JumpTo(WizardStep::Practice), &data),
            Some(WizardStep::Practice)
        );
        assert_eq!(
            transition(WizardStep::Practice, StepAction::JumpTo(WizardStep::Review), &data),
            None
        );
        assert_eq!(
            transition(WizardStep::Review, StepAction::JumpTo(WizardStep::Review), &data),
            None
        );
    }

    #[test]
    fn test_skip_on_preferences_ignores_validation() {
        let data = UserData::default();
        assert!(!validate_step(WizardStep::Preferences, &data).valid);
        assert_eq!(
            transition(WizardStep::Preferences, StepAction::Skip, &data),
            Some(WizardStep::Communication)
        );
    }

    #[test]
    fn test_validators() {
        let mut data = UserData::default();

        let basics = validate_step(WizardStep::Basics, &data);
        assert!(!basics.valid);
        assert_eq!(basics.message.as_deref(), Some("Please enter your full name."));

        data.full_name = "   ".into();
        assert!(!validate_step(WizardStep::Basics, &data).valid);
        data.full_name = "Dr. Sam Lee".into();
        assert!(validate_step(WizardStep::Basics, &data).valid);

        assert!(!validate_step(WizardStep::Practice, &data).valid);
        data.specialty = "Orthodontics".into();
        assert!(validate_step(WizardStep::Practice, &data).valid);

        assert!(!validate_step(WizardStep::Location, &data).valid);
        data.country = "US".into();
        assert!(validate_step(WizardStep::Location, &data).valid);

        assert!(!validate_step(WizardStep::Preferences, &data).valid);
        data.deal_preferences = vec!["acquisition".into()];
        assert!(validate_step(WizardStep::Preferences, &data).valid);

        let empty = UserData::default();
        assert!(validate_step(WizardStep::Communication, &empty).valid);
        assert!(validate_step(WizardStep::Review, &empty).valid);
    }

    #[test]
    fn test_validation_is_pure() {
        let data = UserData::default();
        let first = validate_step(WizardStep::Preferences, &data);
        let second = validate_step(WizardStep::Preferences, &data);
        assert_eq!(first, second);
        assert_eq!(data, UserData::default());
    }
}

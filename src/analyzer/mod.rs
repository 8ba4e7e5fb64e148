pub mod onnx;

use std::fmt;
use std::str::FromStr;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, ConfigError};
use crate::record::{Gender, Race};

pub use onnx::OnnxAttributeAnalyzer;

/// Crops with a side shorter than this are not handed to a model.
pub const MIN_CROP_SIDE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Age,
    Gender,
    Race,
}

impl FromStr for Action {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "age" => Ok(Action::Age),
            "gender" => Ok(Action::Gender),
            "race" => Ok(Action::Race),
            _ => Err(ConfigError::UnknownAction(s.trim().to_string())),
        }
    }
}

/// Which attributes to estimate. Age and gender are always part of the set;
/// race is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Actions {
    race: bool,
}

impl Actions {
    pub fn age_gender() -> Self {
        Self { race: false }
    }

    pub fn with_race() -> Self {
        Self { race: true }
    }

    pub fn from_list(actions: &[Action]) -> Result<Self, ConfigError> {
        if !actions.contains(&Action::Age) {
            return Err(ConfigError::MissingAction("age"));
        }
        if !actions.contains(&Action::Gender) {
            return Err(ConfigError::MissingAction("gender"));
        }
        Ok(Self {
            race: actions.contains(&Action::Race),
        })
    }

    pub fn contains(&self, action: Action) -> bool {
        match action {
            Action::Age | Action::Gender => true,
            Action::Race => self.race,
        }
    }

    pub fn to_list(&self) -> Vec<Action> {
        let mut list = vec![Action::Age, Action::Gender];
        if self.race {
            list.push(Action::Race);
        }
        list
    }
}

impl FromStr for Actions {
    type Err = ConfigError;

    /// Parses a comma separated list such as `age,gender,race`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let list = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Action>, _>>()?;
        Self::from_list(&list)
    }
}

impl fmt::Display for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.race { "age,gender,race" } else { "age,gender" })
    }
}

/// What an attribute model says about one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeEstimate {
    pub age: u32,
    pub gender: Gender,
    pub race: Option<Race>,
}

/// Estimates attributes of a single, already isolated face.
///
/// The crop is in RGB channel order. Implementations do not search for faces
/// inside it. A crop in another channel order is not detected and only
/// degrades the estimate.
pub trait AttributeAnalyzer {
    fn analyze(&mut self, face: &RgbImage, actions: &Actions) -> Result<AttributeEstimate, AnalysisError>;
}

impl<A: AttributeAnalyzer + ?Sized> AttributeAnalyzer for Box<A> {
    fn analyze(&mut self, face: &RgbImage, actions: &Actions) -> Result<AttributeEstimate, AnalysisError> {
        (**self).analyze(face, actions)
    }
}

/// Rejects crops too small for any attribute model.
pub fn validate_crop(face: &RgbImage) -> Result<(), AnalysisError> {
    let (width, height) = face.dimensions();
    if width < MIN_CROP_SIDE || height < MIN_CROP_SIDE {
        return Err(AnalysisError::CropTooSmall {
            width,
            height,
            min: MIN_CROP_SIDE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("age,gender", Actions::age_gender())]
    #[case("gender, age", Actions::age_gender())]
    #[case("age,gender,race", Actions::with_race())]
    #[case("Race,AGE,Gender,", Actions::with_race())]
    fn parses_action_lists(#[case] input: &str, #[case] expected: Actions) {
        assert_eq!(input.parse::<Actions>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_action() {
        assert!(matches!(
            "age,gender,emotion".parse::<Actions>(),
            Err(ConfigError::UnknownAction(a)) if a == "emotion"
        ));
    }

    #[rstest]
    #[case("gender", "age")]
    #[case("age,race", "gender")]
    fn requires_age_and_gender(#[case] input: &str, #[case] missing: &str) {
        assert!(matches!(
            input.parse::<Actions>(),
            Err(ConfigError::MissingAction(m)) if m == missing
        ));
    }

    #[test]
    fn display_round_trips() {
        for actions in [Actions::age_gender(), Actions::with_race()] {
            assert_eq!(actions.to_string().parse::<Actions>().unwrap(), actions);
        }
    }

    #[test]
    fn contains_reflects_race_flag() {
        assert!(Actions::age_gender().contains(Action::Age));
        assert!(!Actions::age_gender().contains(Action::Race));
        assert!(Actions::with_race().contains(Action::Race));
        assert_eq!(Actions::with_race().to_list().len(), 3);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(3, 10)]
    #[case(10, 2)]
    fn small_crops_are_rejected(#[case] width: u32, #[case] height: u32) {
        let err = validate_crop(&RgbImage::new(width, height)).unwrap_err();
        assert!(matches!(err, AnalysisError::CropTooSmall { .. }));
    }

    #[test]
    fn reasonable_crop_is_accepted() {
        assert!(validate_crop(&RgbImage::new(MIN_CROP_SIDE, 40)).is_ok());
    }
}

//! Age, gender and race estimation using ONNX Runtime via `ort`.
//!
//! Two models are supported. The age/gender model follows the InsightFace
//! `genderage` layout; the optional race model is a six-way classifier
//! over `Race::ALL`. Both take RGB input.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;
use log::debug;
use ndarray::Array4;
use ort::session::Session;

use super::{Action, Actions, AttributeAnalyzer, AttributeEstimate};
use crate::error::AnalysisError;
use crate::record::{Gender, Race};

/// Age/gender model input resolution.
const AGE_GENDER_INPUT: u32 = 96;

/// Race model input resolution.
const RACE_INPUT: u32 = 224;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub struct OnnxAttributeAnalyzer {
    age_gender: Session,
    race: Option<Session>,
}

impl OnnxAttributeAnalyzer {
    /// Load the models once; sessions are reused for every face.
    pub fn new(age_gender_model: &Path, race_model: Option<&Path>) -> Result<Self, AnalysisError> {
        let age_gender = load_session(age_gender_model)?;
        let race = race_model.map(load_session).transpose()?;
        Ok(Self { age_gender, race })
    }
}

impl AttributeAnalyzer for OnnxAttributeAnalyzer {
    fn analyze(&mut self, face: &RgbImage, actions: &Actions) -> Result<AttributeEstimate, AnalysisError> {
        let race_session = race_session(actions, self.race.as_mut())?;

        let scores = run(&mut self.age_gender, preprocess_age_gender(face))?;
        let (age, gender) = decode_age_gender(&scores)?;

        let race = match race_session {
            Some(session) => Some(decode_race(&run(session, preprocess_race(face))?)?),
            None => None,
        };

        debug!("estimated age {age}, gender {gender}, race {race:?}");
        Ok(AttributeEstimate { age, gender, race })
    }
}

/// The race session to run for `actions`, if any.
fn race_session<S>(actions: &Actions, race: Option<S>) -> Result<Option<S>, AnalysisError> {
    match (actions.contains(Action::Race), race) {
        (false, _) => Ok(None),
        (true, Some(session)) => Ok(Some(session)),
        (true, None) => Err(AnalysisError::RaceUnavailable),
    }
}

fn load_session(path: &Path) -> Result<Session, AnalysisError> {
    let model_error = |reason: String| AnalysisError::Model {
        path: path.to_path_buf(),
        reason,
    };
    Session::builder()
        .map_err(|e| model_error(e.to_string()))?
        .commit_from_file(path)
        .map_err(|e| model_error(e.to_string()))
}

fn inference(e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::Inference(e.to_string())
}

fn run(session: &mut Session, input: Array4<f32>) -> Result<Vec<f32>, AnalysisError> {
    let input_value = ort::value::Tensor::from_array(input).map_err(inference)?;
    let outputs = session.run(ort::inputs![input_value]).map_err(inference)?;
    if outputs.len() == 0 {
        return Err(AnalysisError::Output("model produced no outputs".into()));
    }
    let scores = outputs[0].try_extract_array::<f32>().map_err(inference)?;
    Ok(scores.iter().copied().collect())
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize to `size × size` and lay out as NCHW float32, channel `c` of each
/// pixel mapped through `normalize(c, value)`.
fn to_tensor(face: &RgbImage, size: u32, normalize: impl Fn(usize, u8) -> f32) -> Array4<f32> {
    let resized = imageops::resize(face, size, size, FilterType::Triangle);
    let s = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, s, s));

    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = normalize(c, pixel[c]);
        }
    }

    tensor
}

/// Raw 0–255 RGB values.
fn preprocess_age_gender(face: &RgbImage) -> Array4<f32> {
    to_tensor(face, AGE_GENDER_INPUT, |_, v| f32::from(v))
}

/// ImageNet mean/std normalized RGB.
fn preprocess_race(face: &RgbImage) -> Array4<f32> {
    to_tensor(face, RACE_INPUT, |c, v| {
        (f32::from(v) / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c]
    })
}

// ---------------------------------------------------------------------------
// Output decoding
// ---------------------------------------------------------------------------

/// `[female, male, age / 100]` → rounded age and the likelier gender.
fn decode_age_gender(scores: &[f32]) -> Result<(u32, Gender), AnalysisError> {
    let &[female, male, age, ..] = scores else {
        return Err(AnalysisError::Output(format!(
            "age/gender model returned {} values, expected 3",
            scores.len()
        )));
    };
    if !age.is_finite() || !female.is_finite() || !male.is_finite() {
        return Err(AnalysisError::Output("age/gender model returned NaN".into()));
    }

    let gender = if male > female { Gender::Man } else { Gender::Woman };
    let age = (age * 100.0).round().max(0.0) as u32;
    Ok((age, gender))
}

/// Highest scoring category; ties go to the earlier one.
fn decode_race(scores: &[f32]) -> Result<Race, AnalysisError> {
    if scores.len() < Race::ALL.len() {
        return Err(AnalysisError::Output(format!(
            "race model returned {} values, expected {}",
            scores.len(),
            Race::ALL.len()
        )));
    }

    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().take(Race::ALL.len()) {
        if !score.is_finite() {
            return Err(AnalysisError::Output("race model returned NaN".into()));
        }
        if score > scores[best] {
            best = i;
        }
    }
    Ok(Race::ALL[best])
}

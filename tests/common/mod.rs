#![allow(dead_code)]

use std::io::Cursor;
use std::path::PathBuf;

use face_analyzer::pipeline::OUTLINE_COLOR;
use face_analyzer::{
    Actions, AnalysisError, AttributeAnalyzer, AttributeEstimate, DetectParams, DetectionError,
    FaceDetector, FaceRegion, Gender, Race,
};
use image::{ImageOutputFormat, Rgb, RgbImage};

const FIXTURE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(format!("{FIXTURE_DIR}/{name}"))
}

/// Image whose top `bright_rows` rows are white over `columns`, black elsewhere.
pub fn banded_image(width: u32, height: u32, bright_rows: u32, columns: &[(u32, u32)]) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let lit = y < bright_rows && columns.iter().any(|&(from, to)| x >= from && x < to);
        if lit { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
    })
}

pub fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageOutputFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

/// Detector returning the same regions for every image.
pub struct FixedDetector {
    pub regions: Vec<FaceRegion>,
    pub calls: usize,
}

impl FixedDetector {
    pub fn new(regions: Vec<FaceRegion>) -> Self {
        Self { regions, calls: 0 }
    }
}

impl FaceDetector for FixedDetector {
    fn detect(&mut self, _image: &RgbImage, params: &DetectParams) -> Result<Vec<FaceRegion>, DetectionError> {
        params.validate()?;
        self.calls += 1;
        Ok(self.regions.clone())
    }
}

/// Deterministic stand-in for an attribute model.
///
/// Age is the crop's mean red value divided by 4, gender is `Man` for crops
/// wider than tall. Crops containing outline pixels or whose top-left pixel
/// matches `fail_on` are rejected.
#[derive(Default)]
pub struct StubAnalyzer {
    pub fail_on: Option<Rgb<u8>>,
    pub seen: Vec<(u32, u32)>,
}

impl AttributeAnalyzer for StubAnalyzer {
    fn analyze(&mut self, face: &RgbImage, actions: &Actions) -> Result<AttributeEstimate, AnalysisError> {
        self.seen.push(face.dimensions());

        if face.pixels().any(|p| *p == OUTLINE_COLOR) {
            return Err(AnalysisError::Output("crop contains annotation pixels".into()));
        }
        if Some(*face.get_pixel(0, 0)) == self.fail_on {
            return Err(AnalysisError::Inference("model rejected the crop".into()));
        }

        let total: u64 = face.pixels().map(|p| u64::from(p[0])).sum();
        let mean = total / (u64::from(face.width()) * u64::from(face.height()));
        Ok(AttributeEstimate {
            age: (mean / 4) as u32,
            gender: if face.width() > face.height() { Gender::Man } else { Gender::Woman },
            race: actions
                .contains(face_analyzer::Action::Race)
                .then_some(Race::White),
        })
    }
}

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::RgbImage;
use log::debug;
use rustface::{Detector, ImageData};

use super::{DetectParams, FaceDetector};
use crate::error::DetectionError;
use crate::region::FaceRegion;

/// Default SeetaFace classifier score a face must reach.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 2.0;

/// rustface refuses minimum face sizes below this.
const SEETA_MIN_FACE_SIZE: u32 = 20;

/// RustFace (SeetaFace funnel cascade) detector implementation
pub struct SeetaDetector {
    model: rustface::Model,
    score_threshold: f64,
}

impl SeetaDetector {
    pub fn from_file(path: &Path, score_threshold: f64) -> Result<Self, DetectionError> {
        if score_threshold.is_nan() || score_threshold <= 0.0 {
            return Err(DetectionError::InvalidParams(format!(
                "score threshold must be positive, got {score_threshold}"
            )));
        }

        let model_error = |reason: String| DetectionError::Model {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| model_error(e.to_string()))?;
        let model = rustface::read_model(BufReader::new(file)).map_err(|e| model_error(e.to_string()))?;

        Ok(Self {
            model,
            score_threshold,
        })
    }

    fn build_detector(&self, params: &DetectParams) -> Box<dyn Detector> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(params.min_face_size.max(SEETA_MIN_FACE_SIZE));
        detector.set_score_thresh(self.score_threshold);
        detector.set_pyramid_scale_factor(pyramid_step(params.scale_factor));
        detector.set_slide_window_step(4, 4);
        detector
    }
}

/// SeetaFace shrinks the image by a factor below 1.0 per pyramid level.
fn pyramid_step(scale_factor: f64) -> f32 {
    ((1.0 / scale_factor) as f32).clamp(0.01, 0.99)
}

impl FaceDetector for SeetaDetector {
    fn detect(&mut self, image: &RgbImage, params: &DetectParams) -> Result<Vec<FaceRegion>, DetectionError> {
        params.validate()?;
        if params.min_neighbors > 0 {
            debug!("SeetaFace merges overlapping windows itself; min_neighbors is not used");
        }

        let gray_image = image::imageops::grayscale(image);
        let (width, height) = gray_image.dimensions();
        let image_data = ImageData::new(gray_image.as_raw(), width, height);

        let mut detector = self.build_detector(params);
        let faces = detector.detect(&image_data);

        Ok(faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                FaceRegion::clamped(
                    i64::from(bbox.x()),
                    i64::from(bbox.y()),
                    i64::from(bbox.width()),
                    i64::from(bbox.height()),
                    width,
                    height,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1.25, 0.8)]
    #[case(2.0, 0.5)]
    #[case(1.001, 0.99)]
    #[case(500.0, 0.01)]
    fn pyramid_step_inverts_scale_factor(#[case] scale_factor: f64, #[case] expected: f32) {
        approx::assert_relative_eq!(pyramid_step(scale_factor), expected, epsilon = 1e-6);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.5)]
    #[case(f64::NAN)]
    fn rejects_non_positive_score_threshold(#[case] threshold: f64) {
        let err = SeetaDetector::from_file(Path::new("/nonexistent/seeta.bin"), threshold)
            .err()
            .unwrap();
        assert!(matches!(err, DetectionError::InvalidParams(_)));
    }

    #[test]
    fn missing_model_is_a_model_error() {
        let err = SeetaDetector::from_file(Path::new("/nonexistent/seeta.bin"), 2.0)
            .err()
            .unwrap();
        assert!(matches!(err, DetectionError::Model { .. }));
    }
}

pub mod cascade;
pub mod grouping;
pub mod haar;
pub mod seeta;

use std::path::Path;

use image::RgbImage;

use crate::error::DetectionError;
use crate::region::FaceRegion;

pub use haar::HaarDetector;
pub use seeta::SeetaDetector;

/// Knobs shared by every detector backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Ratio between successive pyramid scales; larger is faster and
    /// coarser. Must be greater than 1.0.
    pub scale_factor: f64,
    /// How many overlapping raw detections a face needs beyond the first
    /// before it is reported.
    pub min_neighbors: u32,
    /// Smallest face side in pixels; 0 means the model's window size.
    pub min_face_size: u32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.5,
            min_neighbors: 2,
            min_face_size: 0,
        }
    }
}

impl DetectParams {
    pub fn validate(&self) -> Result<(), DetectionError> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(DetectionError::InvalidParams(format!(
                "scale factor must be greater than 1.0, got {}",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

/// Trait for face detector implementations
///
/// Implementations convert the image to grayscale themselves. Regions come
/// back in a backend-defined order that is stable within one call; an empty
/// list means no faces.
pub trait FaceDetector {
    fn detect(&mut self, image: &RgbImage, params: &DetectParams) -> Result<Vec<FaceRegion>, DetectionError>;
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn detect(&mut self, image: &RgbImage, params: &DetectParams) -> Result<Vec<FaceRegion>, DetectionError> {
        (**self).detect(image, params)
    }
}

// Factory function to create detectors by name
pub fn create_detector(name: &str, model_path: &Path) -> Result<Box<dyn FaceDetector>, DetectionError> {
    match name.to_lowercase().as_str() {
        "haar" => Ok(Box::new(HaarDetector::from_file(model_path)?)),
        "seeta" | "rustface" => Ok(Box::new(SeetaDetector::from_file(
            model_path,
            seeta::DEFAULT_SCORE_THRESHOLD,
        )?)),
        _ => Err(DetectionError::UnknownBackend(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1.0)]
    #[case(0.5)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn rejects_bad_scale_factors(#[case] scale_factor: f64) {
        let params = DetectParams {
            scale_factor,
            ..DetectParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn default_params_are_valid() {
        assert!(DetectParams::default().validate().is_ok());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = create_detector("dlib", Path::new("model.bin")).err().unwrap();
        assert!(matches!(err, DetectionError::UnknownBackend(name) if name == "dlib"));
    }
}

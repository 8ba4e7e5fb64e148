use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use log::debug;

use super::cascade::{HaarCascade, IntegralImage};
use super::grouping::{group_candidates, Candidate, GROUP_EPS};
use super::{DetectParams, FaceDetector};
use crate::error::DetectionError;
use crate::region::FaceRegion;

/// Multi-scale sliding-window detector driven by a boosted Haar cascade.
pub struct HaarDetector {
    cascade: HaarCascade,
}

impl HaarDetector {
    pub fn new(cascade: HaarCascade) -> Self {
        Self { cascade }
    }

    /// Load an OpenCV cascade XML file (e.g. `haarcascade_frontalface_default.xml`).
    pub fn from_file(path: &Path) -> Result<Self, DetectionError> {
        let cascade = HaarCascade::load(path)?;
        debug!(
            "Loaded Haar cascade {:?}: {} stages, {}x{} window",
            path,
            cascade.stage_count(),
            cascade.window_size().0,
            cascade.window_size().1
        );
        Ok(Self::new(cascade))
    }

    /// Every window the cascade accepts, across all pyramid scales, before
    /// neighbor grouping.
    pub fn raw_candidates(&self, gray: &GrayImage, params: &DetectParams) -> Result<Vec<Candidate>, DetectionError> {
        params.validate()?;
        let (win_w, win_h) = self.cascade.window_size();
        let (width, height) = gray.dimensions();
        let mut candidates = Vec::new();

        let mut factor = 1.0f64;
        loop {
            let scaled_w = (f64::from(width) / factor).round() as u32;
            let scaled_h = (f64::from(height) / factor).round() as u32;
            if scaled_w < win_w || scaled_h < win_h {
                break;
            }

            let window_w = (f64::from(win_w) * factor).round() as i64;
            let window_h = (f64::from(win_h) * factor).round() as i64;
            let min_size = i64::from(params.min_face_size);

            if window_w >= min_size && window_h >= min_size {
                let integral = if scaled_w == width && scaled_h == height {
                    IntegralImage::new(gray)
                } else {
                    IntegralImage::new(&imageops::resize(gray, scaled_w, scaled_h, FilterType::Triangle))
                };

                let step = if factor > 2.0 { 1 } else { 2 };
                let before = candidates.len();
                for y in (0..=scaled_h - win_h).step_by(step) {
                    for x in (0..=scaled_w - win_w).step_by(step) {
                        if self.cascade.accepts(&integral, x, y) {
                            candidates.push(Candidate {
                                x: (f64::from(x) * factor).round() as i64,
                                y: (f64::from(y) * factor).round() as i64,
                                width: window_w,
                                height: window_h,
                            });
                        }
                    }
                }
                debug!(
                    "scale {:.3}: {}x{} image, {} windows accepted",
                    factor,
                    scaled_w,
                    scaled_h,
                    candidates.len() - before
                );
            }

            factor *= params.scale_factor;
        }

        Ok(candidates)
    }
}

impl FaceDetector for HaarDetector {
    fn detect(&mut self, image: &RgbImage, params: &DetectParams) -> Result<Vec<FaceRegion>, DetectionError> {
        let gray = imageops::grayscale(image);
        let raw = self.raw_candidates(&gray, params)?;
        let grouped = group_candidates(&raw, params.min_neighbors, GROUP_EPS);
        debug!("{} raw windows grouped into {} faces", raw.len(), grouped.len());

        Ok(grouped
            .into_iter()
            .filter_map(|c| {
                FaceRegion::clamped(c.x, c.y, c.width, c.height, image.width(), image.height())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::cascade::{HaarFeature, Stage, TreeNode, WeakClassifier, WeightedRect};
    use image::Rgb;

    /// 12x12 window accepting "bright top half, dark bottom half".
    fn top_bright_cascade() -> HaarCascade {
        let feature = HaarFeature {
            rects: vec![
                WeightedRect {
                    x: 0,
                    y: 0,
                    width: 12,
                    height: 12,
                    weight: -1.0,
                },
                WeightedRect {
                    x: 0,
                    y: 0,
                    width: 12,
                    height: 6,
                    weight: 2.0,
                },
            ],
        };
        let stage = Stage {
            threshold: 0.0,
            classifiers: vec![WeakClassifier {
                nodes: vec![TreeNode {
                    left: 0,
                    right: -1,
                    feature: 0,
                    threshold: 0.1,
                }],
                leaves: vec![-1.0, 1.0],
            }],
        };
        HaarCascade::new(12, 12, vec![stage], vec![feature]).unwrap()
    }

    fn params(scale_factor: f64, min_neighbors: u32) -> DetectParams {
        DetectParams {
            scale_factor,
            min_neighbors,
            min_face_size: 0,
        }
    }

    #[test]
    fn flat_image_has_no_faces() {
        let mut detector = HaarDetector::new(top_bright_cascade());
        let image = RgbImage::from_pixel(60, 60, Rgb([90, 90, 90]));
        assert!(detector.detect(&image, &params(1.5, 2)).unwrap().is_empty());
    }

    #[test]
    fn image_smaller_than_window_has_no_faces() {
        let mut detector = HaarDetector::new(top_bright_cascade());
        let image = RgbImage::new(8, 30);
        assert!(detector.detect(&image, &params(1.2, 0)).unwrap().is_empty());
    }

    #[test]
    fn min_face_size_skips_small_scales() {
        let detector = HaarDetector::new(top_bright_cascade());
        let gray = GrayImage::from_fn(14, 14, |_, y| image::Luma([if y < 7 { 255 } else { 0 }]));
        let mut p = params(1.5, 0);
        assert!(!detector.raw_candidates(&gray, &p).unwrap().is_empty());
        p.min_face_size = 13;
        assert!(detector.raw_candidates(&gray, &p).unwrap().is_empty());
    }

    #[test]
    fn raw_candidates_reports_invalid_params() {
        let detector = HaarDetector::new(top_bright_cascade());
        let gray = GrayImage::new(20, 20);
        assert!(matches!(
            detector.raw_candidates(&gray, &params(0.9, 0)),
            Err(DetectionError::InvalidParams(_))
        ));
    }

    #[test]
    fn rejects_invalid_scale_factor() {
        let mut detector = HaarDetector::new(top_bright_cascade());
        let image = RgbImage::new(20, 20);
        assert!(matches!(
            detector.detect(&image, &params(1.0, 2)),
            Err(DetectionError::InvalidParams(_))
        ));
    }
}

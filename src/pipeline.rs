use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use log::{debug, info, warn};

use crate::analyzer::{validate_crop, AttributeAnalyzer};
use crate::config::PipelineConfig;
use crate::detector::FaceDetector;
use crate::error::{AnalysisError, PipelineError, RegionError};
use crate::image_input::{decode_image, ensure_dimensions, load_image};
use crate::record::FaceRecord;
use crate::region::FaceRegion;

/// Outline color drawn around every analyzed region.
pub const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Outline thickness in pixels, growing inward from the region border.
pub const OUTLINE_THICKNESS: u32 = 2;

/// Why a detected face did not produce a record.
#[derive(Debug, thiserror::Error)]
pub enum FaceError {
    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

#[derive(Debug)]
pub struct FaceFailure {
    /// 1-based position of the region in detector output.
    pub region_index: u32,
    pub error: FaceError,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub records: Vec<FaceRecord>,
    pub failures: Vec<FaceFailure>,
    /// Copy of the input with every valid region outlined.
    pub annotated: RgbImage,
    pub regions_detected: usize,
}

impl PipelineOutput {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Detection followed by per-face attribute analysis.
///
/// Holds the loaded models; each `run` is independent of the previous ones.
pub struct Pipeline<D, A> {
    detector: D,
    analyzer: A,
    config: PipelineConfig,
}

impl<D: FaceDetector, A: AttributeAnalyzer> Pipeline<D, A> {
    pub fn new(detector: D, analyzer: A, config: PipelineConfig) -> Self {
        Self {
            detector,
            analyzer,
            config,
        }
    }

    pub fn run_path(&mut self, path: &Path) -> Result<PipelineOutput, PipelineError> {
        let image = load_image(path)?;
        self.run(&image)
    }

    pub fn run_bytes(&mut self, bytes: &[u8]) -> Result<PipelineOutput, PipelineError> {
        let image = decode_image(bytes)?;
        self.run(&image)
    }

    pub fn run(&mut self, image: &RgbImage) -> Result<PipelineOutput, PipelineError> {
        ensure_dimensions(image)?;

        let regions = self.detector.detect(image, &self.config.detect)?;
        info!("Detected {} face regions", regions.len());

        let mut output = PipelineOutput {
            records: Vec::with_capacity(regions.len()),
            failures: Vec::new(),
            annotated: image.clone(),
            regions_detected: regions.len(),
        };

        for (position, region) in regions.iter().enumerate() {
            let region_index = position as u32 + 1;
            let next_index = output.records.len() as u32 + 1;

            match self.analyze_region(image, &mut output.annotated, region, next_index) {
                Ok(record) => {
                    debug!("Region {region_index} ({region}): {record}");
                    output.records.push(record);
                }
                Err(error) => {
                    warn!("Skipping face region {region_index}: {error}");
                    output.failures.push(FaceFailure {
                        region_index,
                        error,
                    });
                }
            }
        }

        Ok(output)
    }

    fn analyze_region(
        &mut self,
        original: &RgbImage,
        annotated: &mut RgbImage,
        region: &FaceRegion,
        index: u32,
    ) -> Result<FaceRecord, FaceError> {
        region.validate(original.width(), original.height())?;
        outline(annotated, region);

        let crop = image::imageops::crop_imm(original, region.x, region.y, region.width, region.height).to_image();
        validate_crop(&crop)?;

        let estimate = self.analyzer.analyze(&crop, &self.config.actions)?;
        Ok(FaceRecord::new(index, estimate.age, estimate.gender, estimate.race))
    }
}

/// Draws a `OUTLINE_THICKNESS` pixel frame just inside `region`.
fn outline(image: &mut RgbImage, region: &FaceRegion) {
    for inset in 0..OUTLINE_THICKNESS {
        let width = region.width.saturating_sub(2 * inset);
        let height = region.height.saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32).of_size(width, height);
        draw_hollow_rect_mut(image, rect, OUTLINE_COLOR);
    }
}

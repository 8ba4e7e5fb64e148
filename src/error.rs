use std::path::PathBuf;

use thiserror::Error;

use crate::region::FaceRegion;

/// The input could not be interpreted as an image.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read image {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("image dimensions are zero")]
    ZeroDimensions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionErrorKind {
    EmptyArea,
    OutOfBounds { image_width: u32, image_height: u32 },
}

/// A detected region that cannot be cropped from the image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("degenerate face region {region}: {}", describe_region_error(.kind))]
pub struct RegionError {
    pub region: FaceRegion,
    pub kind: RegionErrorKind,
}

fn describe_region_error(kind: &RegionErrorKind) -> String {
    match kind {
        RegionErrorKind::EmptyArea => "zero area".to_string(),
        RegionErrorKind::OutOfBounds {
            image_width,
            image_height,
        } => format!("outside {image_width}x{image_height} image"),
    }
}

/// The attribute model could not produce an estimate for one face.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("face crop {width}x{height} is smaller than {min}x{min}")]
    CropTooSmall { width: u32, height: u32, min: u32 },

    #[error("failed to load attribute model {path:?}: {reason}")]
    Model { path: PathBuf, reason: String },

    #[error("race estimation requested but no race model is loaded")]
    RaceUnavailable,

    #[error("model inference failed: {0}")]
    Inference(String),

    #[error("unexpected model output: {0}")]
    Output(String),
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("invalid detection parameters: {0}")]
    InvalidParams(String),

    #[error("failed to load detector model {path:?}: {reason}")]
    Model { path: PathBuf, reason: String },

    #[error("unknown detector: {0}")]
    UnknownBackend(String),
}

/// Failure of a whole pipeline invocation. Per-face problems are never
/// reported through this type.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Detection(#[from] DetectionError),
}

/// The persisted record store could not be read or written.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store I/O failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed record store: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to replace record store {path:?}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("scale factor must be a finite number greater than 1.0, got {0}")]
    InvalidScaleFactor(f64),

    #[error("unknown action: {0:?} (expected age, gender or race)")]
    UnknownAction(String),

    #[error("actions must include {0}")]
    MissingAction(&'static str),

    #[error("failed to read settings {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

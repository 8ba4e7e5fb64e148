use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analyzer::{Action, Actions};
use crate::detector::DetectParams;
use crate::error::ConfigError;

/// Everything the pipeline needs besides the models themselves.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PipelineConfig {
    pub detect: DetectParams,
    pub actions: Actions,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scale_factor = self.detect.scale_factor;
        if !scale_factor.is_finite() || scale_factor <= 1.0 {
            return Err(ConfigError::InvalidScaleFactor(scale_factor));
        }
        Ok(())
    }
}

/// Settings file read by the command line tool. Every field is optional;
/// command line flags take precedence over values found here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub detector: Option<String>,
    pub cascade: Option<PathBuf>,
    pub seeta_model: Option<PathBuf>,
    pub age_gender_model: Option<PathBuf>,
    pub race_model: Option<PathBuf>,
    pub scale_factor: Option<f64>,
    pub min_neighbors: Option<u32>,
    pub min_face_size: Option<u32>,
    pub actions: Option<Vec<Action>>,
    pub store: Option<PathBuf>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Pipeline configuration from these settings, defaults filling the gaps.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let defaults = DetectParams::default();
        let actions = match &self.actions {
            Some(list) => Actions::from_list(list)?,
            None => Actions::default(),
        };
        let config = PipelineConfig {
            detect: DetectParams {
                scale_factor: self.scale_factor.unwrap_or(defaults.scale_factor),
                min_neighbors: self.min_neighbors.unwrap_or(defaults.min_neighbors),
                min_face_size: self.min_face_size.unwrap_or(defaults.min_face_size),
            },
            actions,
        };
        config.validate()?;
        Ok(config)
    }
}

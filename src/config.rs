//! Engine settings loaded from JSON.
//!
//! Only what a viewer may tune at start-up lives here; physics constants stay
//! compile-time in [`crate::defs`]. Missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defs::{FIELD_OF_VIEW, MAX_VIEW_DISTANCE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub screen_width: usize,
    pub screen_height: usize,
    /// Horizontal field of view, degrees.
    pub fov: f64,
    pub max_view_distance: f64,
    /// Render strips; 0 uses one per rayon worker.
    pub render_workers: usize,
    pub multithreaded: bool,
    /// Let solid walls cut the potentially visible set.
    pub pvs_occlusion: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            screen_width: 640,
            screen_height: 360,
            fov: FIELD_OF_VIEW,
            max_view_distance: MAX_VIEW_DISTANCE,
            render_workers: 0,
            multithreaded: true,
            pvs_occlusion: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let cfg = Self::from_json(&std::fs::read_to_string(path)?)?;
        log::info!("loaded config from {}", path.display());
        Ok(cfg)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.screen_width == 0 || self.screen_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "screen {}x{} is empty",
                self.screen_width, self.screen_height
            )));
        }
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err(ConfigError::Invalid(format!("fov {} outside (0, 180)", self.fov)));
        }
        if self.max_view_distance <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max view distance {} must be positive",
                self.max_view_distance
            )));
        }
        Ok(())
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/

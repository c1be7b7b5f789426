//! Octree build configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("max_capacity must be at least 1")]
    ZeroCapacity,

    #[error("min_cell_size must be finite and positive, got {0}")]
    InvalidCellSize(f32),
}

/// What happens to node bounds when triangles are removed.
///
/// Bounds only ever grow on insertion. Removal either leaves them loose
/// until [`Octree::rebound`](crate::Octree::rebound) is called, or refits the
/// nodes between the removal point and the root straight away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    #[default]
    GrowOnly,
    RefitOnRemoval,
}

/// Octree configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
    /// Triangles a leaf holds before it is split into octants
    pub max_capacity: usize,
    /// Smallest cell edge length that may still be subdivided
    pub min_cell_size: f32,
    /// Bounds maintenance on removal
    pub bounds_policy: BoundsPolicy,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_capacity: 32,
            min_cell_size: 1e-3,
            bounds_policy: BoundsPolicy::GrowOnly,
        }
    }
}

impl OctreeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !(self.min_cell_size.is_finite() && self.min_cell_size > 0.0) {
            return Err(ConfigError::InvalidCellSize(self.min_cell_size));
        }
        Ok(())
    }
}

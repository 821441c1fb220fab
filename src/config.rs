//! Generation parameters
//!
//! Every knob of the pipeline lives here. Defaults: 1024 points on a
//! 1024x1024 canvas, 64 plates, 2 + 4 smoothing passes, 2 shift passes and
//! 5 equalisation passes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};
use crate::geometry::Rect;

/// Terrain generation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    // =========================================================================
    // Canvas
    // =========================================================================

    /// Number of Voronoi sites sampled inside the working rectangle
    pub point_count: usize,

    /// Width of the working rectangle (anchored at the image origin)
    pub working_width: usize,

    /// Height of the working rectangle
    pub working_height: usize,

    // =========================================================================
    // Plates
    // =========================================================================

    /// Total plate count, including the two pole plates
    pub plate_count: usize,

    /// Coefficient applied when a neighbour plate lies ahead of the drift
    pub convergent_coefficient: i32,

    /// Coefficient applied when a neighbour plate lies to either side of the drift
    pub transform_coefficient: i32,

    /// Coefficient applied when a neighbour plate lies behind the drift
    pub divergent_coefficient: i32,

    // =========================================================================
    // Height shaping
    // =========================================================================

    /// Smoothing passes run before the tectonic shift
    pub pre_shift_smoothing: usize,

    /// Smoothing passes run after plate equalisation
    pub post_equalize_smoothing: usize,

    /// Tectonic shift passes
    pub shift_iterations: usize,

    /// Plate equalisation passes
    pub equalize_iterations: usize,

    /// Height moved toward the plate mean per equalisation pass
    pub equalize_step: i32,

    /// Squared site distance above which a neighbour does not contribute
    /// to a cell's initial height
    pub neighbour_distance_limit: i64,

    // =========================================================================
    // Topology
    // =========================================================================

    /// Horizontal band (pixels from the opposite border) searched when
    /// stitching cells across the left/right seam
    pub seam_band: f64,

    /// Draw budget per requested point before sampling gives up
    pub sampling_attempts_per_point: usize,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            point_count: 1024,
            working_width: 1024,
            working_height: 1024,
            plate_count: 64,
            convergent_coefficient: 16,
            transform_coefficient: -2,
            divergent_coefficient: -16,
            pre_shift_smoothing: 2,
            post_equalize_smoothing: 4,
            shift_iterations: 2,
            equalize_iterations: 5,
            equalize_step: 4,
            neighbour_distance_limit: 1000,
            seam_band: 150.0,
            sampling_attempts_per_point: 64,
        }
    }
}

impl TerrainConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: TerrainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| TerrainError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Working rectangle described by this config. Only meaningful once
    /// `validate` has accepted the dimensions.
    pub fn working_rect(&self) -> Rect {
        Rect::new(0, 0, self.working_width as i32, self.working_height as i32)
    }

    /// Reject parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.working_width == 0 || self.working_height == 0 {
            return Err(TerrainError::InvalidConfig(format!(
                "working rectangle {}x{} is empty",
                self.working_width, self.working_height
            )));
        }
        let max_side = i32::MAX as usize;
        if self.working_width > max_side || self.working_height > max_side {
            return Err(TerrainError::InvalidConfig(format!(
                "working rectangle {}x{} exceeds the pixel coordinate range",
                self.working_width, self.working_height
            )));
        }
        if self.point_count == 0 {
            return Err(TerrainError::InvalidConfig("point_count must be positive".into()));
        }
        let area = self
            .working_width
            .checked_mul(self.working_height)
            .ok_or_else(|| {
                TerrainError::InvalidConfig(format!(
                    "working rectangle {}x{} is too large",
                    self.working_width, self.working_height
                ))
            })?;
        if self.point_count > area {
            return Err(TerrainError::InvalidConfig(format!(
                "point_count {} exceeds the {} lattice positions of the working rectangle",
                self.point_count, area
            )));
        }
        if self.plate_count < 2 {
            return Err(TerrainError::InvalidConfig(
                "plate_count must include the two pole plates".into(),
            ));
        }
        if self.plate_count > usize::from(u16::MAX) {
            return Err(TerrainError::InvalidConfig(format!(
                "plate_count {} is too large",
                self.plate_count
            )));
        }
        if self.seam_band < 0.0 {
            return Err(TerrainError::InvalidConfig("seam_band must not be negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let config = TerrainConfig::default();
        assert_eq!(config.point_count, 1024);
        assert_eq!(config.working_rect(), Rect::new(0, 0, 1024, 1024));
        assert_eq!(config.plate_count, 64);
        assert_eq!(config.pre_shift_smoothing, 2);
        assert_eq!(config.post_equalize_smoothing, 4);
        assert_eq!(config.shift_iterations, 2);
        assert_eq!(config.equalize_iterations, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = TerrainConfig::from_json_str(r#"{ "point_count": 200, "plate_count": 8 }"#)
            .expect("valid config");
        assert_eq!(config.point_count, 200);
        assert_eq!(config.plate_count, 8);
        assert_eq!(config.working_width, 1024);
        assert_eq!(config.equalize_step, 4);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = TerrainConfig::default();
        config.plate_count = 1;
        assert!(matches!(config.validate(), Err(TerrainError::InvalidConfig(_))));

        let mut config = TerrainConfig::default();
        config.working_width = 4;
        config.working_height = 4;
        config.point_count = 17;
        assert!(matches!(config.validate(), Err(TerrainError::InvalidConfig(_))));

        assert!(matches!(
            TerrainConfig::from_json_str("{ not json"),
            Err(TerrainError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_canvas() {
        let result = TerrainConfig::from_json_str(
            r#"{ "working_width": 8589934592, "working_height": 8589934592 }"#,
        );
        assert!(matches!(result, Err(TerrainError::InvalidConfig(_))));

        let mut config = TerrainConfig::default();
        config.working_width = i32::MAX as usize + 1;
        config.working_height = 1;
        assert!(matches!(config.validate(), Err(TerrainError::InvalidConfig(_))));

        let mut config = TerrainConfig::default();
        config.working_width = i32::MAX as usize;
        config.working_height = i32::MAX as usize;
        assert!(config.validate().is_ok());
        assert_eq!(config.working_rect().width(), i32::MAX);
    }
}

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Fitting and resolution parameters.
///
/// Passed by value into every solver and resolver call; there is no process-wide config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FittingConfig {
    /// Maximum growth of a region box, as a fraction of its original size.
    pub max_layout_adjustment: f32,
    /// Lower bound for `font_scale`.
    pub min_font_scale: f32,
    /// Translations up to `1 + slack` times the original width are left untouched.
    pub length_ratio_slack: f32,
    pub max_resolution_passes: u32,
    /// Overlaps at or below this fraction of the smaller box's area are ignored.
    pub overlap_epsilon: f32,
    /// Font-scale binary search stops once the window is narrower than this.
    pub scale_tolerance: f32,
    /// Regions whose top edges differ by at most this many units share a reading row.
    pub row_tolerance: f32,
    /// Boxes closer than this many units are recorded as adjacent.
    pub adjacency_threshold: f32,
    /// Boxes may stick out of the page by this many units before being rejected.
    pub bounds_tolerance: f32,
    /// Neighbours that end up closer than this after fitting get a spacing notice.
    pub min_region_gap: f32,
}

impl Default for FittingConfig {
    fn default() -> Self {
        Self {
            max_layout_adjustment: 0.10,
            min_font_scale: 0.70,
            length_ratio_slack: 0.05,
            max_resolution_passes: 5,
            overlap_epsilon: 0.01,
            scale_tolerance: 0.01,
            row_tolerance: 2.0,
            adjacency_threshold: 10.0,
            bounds_tolerance: 0.5,
            min_region_gap: 5.0,
        }
    }
}

impl FittingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "max_layout_adjustment",
            self.max_layout_adjustment,
            0.0,
            1.0,
            "0.0..=1.0",
        )?;
        if !(self.min_font_scale > 0.0 && self.min_font_scale <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "min_font_scale",
                value: self.min_font_scale,
                expected: "0.0 < x <= 1.0",
            });
        }
        check_range(
            "length_ratio_slack",
            self.length_ratio_slack,
            0.0,
            1.0,
            "0.0..=1.0",
        )?;
        check_range(
            "overlap_epsilon",
            self.overlap_epsilon,
            0.0,
            1.0,
            "0.0..=1.0",
        )?;
        if !(self.scale_tolerance > 0.0 && self.scale_tolerance < 0.5) {
            return Err(ConfigError::OutOfRange {
                field: "scale_tolerance",
                value: self.scale_tolerance,
                expected: "0.0 < x < 0.5",
            });
        }
        check_range("row_tolerance", self.row_tolerance, 0.0, f32::MAX, ">= 0")?;
        check_range(
            "adjacency_threshold",
            self.adjacency_threshold,
            0.0,
            f32::MAX,
            ">= 0",
        )?;
        check_range(
            "bounds_tolerance",
            self.bounds_tolerance,
            0.0,
            f32::MAX,
            ">= 0",
        )?;
        check_range(
            "min_region_gap",
            self.min_region_gap,
            0.0,
            f32::MAX,
            ">= 0",
        )?;
        Ok(())
    }

    /// Largest height a region may grow to without being flagged as overflow.
    pub fn height_budget(&self, original_height: f32) -> f32 {
        original_height * (1.0 + self.max_layout_adjustment)
    }

    /// Largest area a non-overflowing region may end up with.
    pub fn area_budget(&self, original_area: f32) -> f32 {
        original_area * (1.0 + self.max_layout_adjustment)
    }
}

fn check_range(
    field: &'static str,
    value: f32,
    min: f32,
    max: f32,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FittingConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.max_layout_adjustment - 0.10).abs() < 1e-6);
        assert!((config.min_font_scale - 0.70).abs() < 1e-6);
        assert!((config.length_ratio_slack - 0.05).abs() < 1e-6);
        assert_eq!(config.max_resolution_passes, 5);
    }

    #[test]
    fn test_zero_min_scale_rejected() {
        let config = FittingConfig {
            min_font_scale: 0.0,
            ..FittingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "min_font_scale",
                ..
            })
        ));
    }

    #[test]
    fn test_nan_adjustment_rejected() {
        let config = FittingConfig {
            max_layout_adjustment: f32::NAN,
            ..FittingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_height_budget() {
        let config = FittingConfig::default();
        assert!((config.height_budget(20.0) - 22.0).abs() < 1e-4);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FittingConfig =
            serde_json::from_str(r#"{"min_font_scale": 0.8}"#).unwrap();
        assert!((config.min_font_scale - 0.8).abs() < 1e-6);
        assert_eq!(config.max_resolution_passes, 5);
    }
}

//! Validator thresholds.

use locus_core::SpatialSize;

use crate::error::CoherenceConfigError;

/// Thresholds used by [`CoherenceValidator`](crate::CoherenceValidator).
#[derive(Clone, Debug, PartialEq)]
pub struct CoherenceConfig {
    /// Pairs closer than this get a distance warning. Default: 0.1.
    pub min_distance: f64,
    /// Connections longer than this get a distance warning. Default: 10.0.
    pub max_distance: f64,
    /// Fraction of the summed mean radii below which two references
    /// overlap. Default: 0.5.
    pub overlap_threshold: f64,
    /// Angle at a third reference above which it blocks the line between
    /// two connected references. Default: 120.
    pub visibility_angle_degrees: f64,
    /// Bounding box assumed for references without a size. Default: 0.3³.
    pub default_size: SpatialSize,
    /// Multiplier applied to the required separation when proposing
    /// corrected positions. Default: 1.5.
    pub correction_factor: f64,
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self {
            min_distance: 0.1,
            max_distance: 10.0,
            overlap_threshold: 0.5,
            visibility_angle_degrees: 120.0,
            default_size: SpatialSize::cube(0.3),
            correction_factor: 1.5,
        }
    }
}

impl CoherenceConfig {
    /// Check every threshold.
    ///
    /// # Errors
    ///
    /// The first out-of-range threshold, as a [`CoherenceConfigError`].
    pub fn validate(&self) -> Result<(), CoherenceConfigError> {
        let positive = [
            ("min_distance", self.min_distance),
            ("max_distance", self.max_distance),
            ("overlap_threshold", self.overlap_threshold),
            ("default_size.width", self.default_size.width),
            ("default_size.height", self.default_size.height),
            ("default_size.depth", self.default_size.depth),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(CoherenceConfigError::NotPositive { field, value });
            }
        }
        if self.min_distance >= self.max_distance {
            return Err(CoherenceConfigError::InvertedDistances {
                min: self.min_distance,
                max: self.max_distance,
            });
        }
        let angle = self.visibility_angle_degrees;
        if !(angle > 0.0 && angle <= 180.0) {
            return Err(CoherenceConfigError::AngleOutOfRange { value: angle });
        }
        if !(self.correction_factor.is_finite() && self.correction_factor >= 1.0) {
            return Err(CoherenceConfigError::CorrectionTooSmall {
                value: self.correction_factor,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(CoherenceConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_nan_threshold() {
        let config = CoherenceConfig {
            overlap_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CoherenceConfigError::NotPositive {
                field: "overlap_threshold",
                ..
            })
        ));
    }

    #[test]
    fn rejects_inverted_distances() {
        let config = CoherenceConfig {
            min_distance: 5.0,
            max_distance: 1.0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(CoherenceConfigError::InvertedDistances { min: 5.0, max: 1.0 })
        );
    }

    #[test]
    fn rejects_bad_angle_and_factor() {
        let angle = CoherenceConfig {
            visibility_angle_degrees: 200.0,
            ..Default::default()
        };
        assert!(matches!(
            angle.validate(),
            Err(CoherenceConfigError::AngleOutOfRange { .. })
        ));
        let factor = CoherenceConfig {
            correction_factor: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            factor.validate(),
            Err(CoherenceConfigError::CorrectionTooSmall { .. })
        ));
    }
}

//! Validator configuration errors.

use thiserror::Error;

/// A [`CoherenceConfig`](crate::CoherenceConfig) threshold is out of range.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CoherenceConfigError {
    /// A threshold that must be a positive finite number is not.
    #[error("{field} must be positive and finite, got {value}")]
    NotPositive {
        /// Offending field.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// The minimum spacing is not below the maximum connection length.
    #[error("min_distance ({min}) must be less than max_distance ({max})")]
    InvertedDistances {
        /// Configured minimum.
        min: f64,
        /// Configured maximum.
        max: f64,
    },
    /// The visibility angle is outside `(0, 180]` degrees.
    #[error("visibility_angle_degrees must be in (0, 180], got {value}")]
    AngleOutOfRange {
        /// Rejected value.
        value: f64,
    },
    /// Corrections that do not push references apart would never converge.
    #[error("correction_factor must be at least 1, got {value}")]
    CorrectionTooSmall {
        /// Rejected value.
        value: f64,
    },
}

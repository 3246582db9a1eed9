//! Error taxonomy for the operational-space controller.
//!
//! Only configuration and input-validation failures are errors. Numerical
//! degradation (singular mass matrix, kinematic singularity) is absorbed by
//! the control law and reported through its diagnostics instead.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by controller construction or the per-tick entry point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OscError {
    /// A gain or limit is outside its admissible range.
    #[error("invalid {name}: {value} ({reason})")]
    InvalidGain {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// A caller-supplied vector has the wrong length.
    #[error("{what}: expected length {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The robot model returned a quantity with the wrong shape.
    #[error(
        "robot model returned {quantity} with shape {rows}x{cols}, expected {expected_rows}x{expected_cols}"
    )]
    ModelShape {
        quantity: &'static str,
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    /// The model has no frame matching the selector.
    #[error("robot model has no frame {frame}")]
    UnknownFrame { frame: String },

    /// An input contains NaN or infinity.
    #[error("{what} contains non-finite values")]
    NonFinite { what: &'static str },

    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias used throughout the workspace.
pub type OscResult<T> = Result<T, OscError>;

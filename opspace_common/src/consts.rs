//! Numeric constants for the operational-space controller.
//!
//! Single source of truth for defaults and thresholds. Imported by all
//! crates.

/// Task-space dimension (position only; orientation is not controlled).
pub const TASK_DIM: usize = 3;

/// Default proportional gain.
pub const DEFAULT_KP: f64 = 1.0;

/// Default task-space velocity limit [m/s].
pub const DEFAULT_VMAX: f64 = 0.5;

/// Null-space proportional gain as a fraction of `kp`.
pub const NULL_SPACE_GAIN_RATIO: f64 = 0.1;

/// Relative singular-value cutoff for the regularized pseudo-inverse.
///
/// Singular values below `cutoff × σ_max` are treated as zero.
pub const SINGULAR_VALUE_CUTOFF: f64 = 0.04;

/// Reciprocal condition number below which a matrix is treated as singular.
pub const CONDITION_EPS: f64 = 1e-12;

/// Identifier reported by the parameter introspection surface.
pub const CONTROLLER_SOURCE: &str = "OSC";

/// Default simulation tick period [s] (1 kHz).
pub const DEFAULT_DT: f64 = 0.001;

/// Default standard gravity [m/s²].
pub const STANDARD_GRAVITY: f64 = 9.80665;

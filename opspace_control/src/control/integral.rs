//! Integral error accumulator.
//!
//! Plain sum of position errors, no time scaling and no windup clamp.
//! Zero `ki` disables the term and leaves the accumulator untouched.

use nalgebra::Vector3;

/// Accumulated task-space position error.
///
/// Outlives a single tick. Callers needing anti-windup reset or overwrite
/// it through the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegralState {
    integrated_error: Vector3<f64>,
}

impl Default for IntegralState {
    fn default() -> Self {
        Self {
            integrated_error: Vector3::zeros(),
        }
    }
}

impl IntegralState {
    /// Resume from a previously saved accumulator.
    pub fn new(initial: Vector3<f64>) -> Self {
        Self {
            integrated_error: initial,
        }
    }

    #[inline]
    pub fn integrated_error(&self) -> &Vector3<f64> {
        &self.integrated_error
    }

    /// Reset the accumulator to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Accumulate `error` and return the integral force `-ki · Σe`.
#[inline]
pub fn integral_compute(state: &mut IntegralState, ki: f64, error: &Vector3<f64>) -> Vector3<f64> {
    if ki == 0.0 {
        return Vector3::zeros();
    }
    state.integrated_error += error;
    -ki * state.integrated_error
}

// ─── Tests ──────────────────────────────────────────────────────────

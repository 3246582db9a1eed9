//! Velocity-limited task-space position control.
//!
//! With a cap `vmax`, the approach velocity `-λ·e` (λ = kp/kv) is
//! saturated per axis while keeping the direction of approach:
//!
//! ```text
//! sat_i   = vmax / (λ·|e_i|)                  (∞ for e_i = 0)
//! idx     = argmin(sat)                        if any sat_i < 1
//! scale_i = kv·vmax·sign(e_idx) / (kp·e_idx)   scale_idx = 1
//! v_app   = clip(sat / scale, 0, 1) ⊙ (-λ · scale ⊙ e)
//! f       = -kv · (dx - v_target - v_app)
//! ```
//!
//! Without a cap the law is purely proportional, `f = -kp·e`.

use nalgebra::Vector3;
use opspace_common::control::ControlParameters;

/// Output of the position stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionTerm {
    /// Task-space force [N].
    pub force: Vector3<f64>,
    /// Clipped approach velocity [m/s] (limited law only).
    pub approach_velocity: Option<Vector3<f64>>,
}

/// Per-axis saturation ratios `vmax / (λ·|e_i|)`.
///
/// An axis with zero error exerts no saturation pressure (∞).
#[inline]
pub fn saturation_ratios(error: &Vector3<f64>, lambda: f64, vmax: f64) -> Vector3<f64> {
    error.map(|e| {
        if e == 0.0 {
            f64::INFINITY
        } else {
            vmax / (lambda * e.abs())
        }
    })
}

/// Clipped approach velocity for position error `error`.
///
/// Each component has magnitude at most `vmax`, and the result is parallel
/// to `-error` whenever any axis saturates.
pub fn approach_velocity(params: &ControlParameters, error: &Vector3<f64>, vmax: f64) -> Vector3<f64> {
    let lambda = params.lambda;
    let sat = saturation_ratios(error, lambda, vmax);

    let scale = if sat.iter().any(|s| *s < 1.0) {
        let idx = sat.imin();
        let e_idx = error[idx];
        let clipped = params.kv * vmax * e_idx.signum();
        let unclipped = params.kp * e_idx;
        let mut scale = Vector3::repeat(clipped / unclipped);
        scale[idx] = 1.0;
        scale
    } else {
        Vector3::repeat(1.0)
    };

    // Clip first: a zero-error axis has sat = ∞ and must contribute 0, not NaN.
    Vector3::from_fn(|i, _| {
        let gain = (sat[i] / scale[i]).clamp(0.0, 1.0);
        gain * (-lambda * scale[i] * error[i])
    })
}

/// Task-space force from position error `error`.
///
/// `dx` is the actual task-space velocity `J·dq`, `target_velocity` the
/// desired one. Both are ignored by the unlimited law.
pub fn position_compute(
    params: &ControlParameters,
    error: &Vector3<f64>,
    dx: &Vector3<f64>,
    target_velocity: &Vector3<f64>,
) -> PositionTerm {
    match params.velocity_limit.vmax() {
        None => PositionTerm {
            force: -params.kp * error,
            approach_velocity: None,
        },
        Some(vmax) => {
            let v_app = approach_velocity(params, error, vmax);
            PositionTerm {
                force: -params.kv * (dx - target_velocity - v_app),
                approach_velocity: Some(v_app),
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

//! Null-space secondary controller.
//!
//! Drives redundant joints toward a rest pose without disturbing the task:
//!
//! ```text
//! q_des   = (rest - q + π) mod 2π - π        masked-in joints, else 0
//! u_null  = M · (nkp · q_des - nkv · dq_des)
//! Jbar    = M⁻¹ · Jᵀ · Mx
//! filter  = I - Jᵀ · Jbarᵀ
//! τ_null  = filter · u_null
//! ```
//!
//! `J · M⁻¹ · filter = 0`, so `τ_null` produces no task-space acceleration.
//! With `M = I` this reduces to `J · filter = 0`.

use std::f64::consts::{PI, TAU};

use nalgebra::{DMatrix, DVector, Matrix3, Matrix3xX};

/// Rest pose and the joints it applies to. Fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RestPose {
    angles: DVector<f64>,
    mask: Vec<bool>,
}

impl RestPose {
    /// Build from per-joint rest angles; `None` excludes the joint.
    pub fn from_angles(angles: &[Option<f64>]) -> Self {
        Self {
            angles: DVector::from_iterator(angles.len(), angles.iter().map(|a| a.unwrap_or(0.0))),
            mask: angles.iter().map(Option::is_some).collect(),
        }
    }

    #[inline]
    pub fn n_joints(&self) -> usize {
        self.mask.len()
    }

    /// True if joint `i` takes part in the objective.
    #[inline]
    pub fn is_controlled(&self, i: usize) -> bool {
        self.mask.get(i).copied().unwrap_or(false)
    }

    /// True if at least one joint has a rest angle.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.mask.iter().any(|m| *m)
    }

    /// Shortest signed displacement from `q` to the rest pose.
    pub fn displacement(&self, q: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(self.n_joints(), |i, _| {
            if self.mask[i] {
                shortest_angle(self.angles[i], q[i])
            } else {
                0.0
            }
        })
    }
}

/// Signed angle from `from` to `to`, wrapped into `[-π, π)`.
#[inline]
pub fn shortest_angle(to: f64, from: f64) -> f64 {
    (to - from + PI).rem_euclid(TAU) - PI
}

/// Held desired joint velocity.
///
/// Only masked-in joints are refreshed each tick; the others keep their
/// last value.
#[derive(Debug, Clone, PartialEq)]
pub struct NullSpaceState {
    dq_des: DVector<f64>,
}

impl NullSpaceState {
    pub fn new(n_joints: usize) -> Self {
        Self {
            dq_des: DVector::zeros(n_joints),
        }
    }

    /// Resume with an explicit held velocity.
    pub fn with_held_velocity(dq_des: DVector<f64>) -> Self {
        Self { dq_des }
    }

    #[inline]
    pub fn held_velocity(&self) -> &DVector<f64> {
        &self.dq_des
    }

    #[inline]
    pub fn reset(&mut self) {
        self.dq_des.fill(0.0);
    }

    /// Copy the measured velocity of every masked-in joint.
    fn hold(&mut self, rest: &RestPose, dq: &DVector<f64>) {
        for i in 0..self.dq_des.len() {
            if rest.is_controlled(i) {
                self.dq_des[i] = dq[i];
            }
        }
    }
}

/// Dynamically consistent null-space filter `I - Jᵀ · (M⁻¹ Jᵀ Mx)ᵀ`.
pub fn null_space_filter(
    mass_inverse: &DMatrix<f64>,
    jacobian: &Matrix3xX<f64>,
    mx: &Matrix3<f64>,
) -> DMatrix<f64> {
    let n = jacobian.ncols();
    let jt = jacobian.transpose();
    let jbar = mass_inverse * &jt * mx;
    DMatrix::identity(n, n) - jt * jbar.transpose()
}

/// Inputs of one null-space evaluation.
#[derive(Debug, Clone, Copy)]
pub struct NullSpaceInput<'a> {
    pub q: &'a DVector<f64>,
    pub dq: &'a DVector<f64>,
    pub mass_matrix: &'a DMatrix<f64>,
    pub mass_inverse: &'a DMatrix<f64>,
    pub jacobian: &'a Matrix3xX<f64>,
    pub mx: &'a Matrix3<f64>,
}

/// Compute the filtered rest-pose torque and refresh the held velocity.
///
/// Returns zero (and leaves `state` untouched) when no joint has a rest
/// angle.
pub fn null_space_compute(
    state: &mut NullSpaceState,
    rest: &RestPose,
    nkp: f64,
    nkv: f64,
    input: &NullSpaceInput<'_>,
) -> DVector<f64> {
    let n = input.q.len();
    if !rest.is_active() {
        return DVector::zeros(n);
    }

    let q_des = rest.displacement(input.q);
    state.hold(rest, input.dq);

    let u_null = input.mass_matrix * (q_des * nkp - &state.dq_des * nkv);
    null_space_filter(input.mass_inverse, input.jacobian, input.mx) * u_null
}

// ─── Tests ──────────────────────────────────────────────────────────

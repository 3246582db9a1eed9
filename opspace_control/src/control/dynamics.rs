//! Dynamics terms that feed the composer.
//!
//! Task-space side: the `dJ/dt · dq` acceleration estimate and the
//! caller's additional force. Joint-space side: momentum, Coriolis and
//! gravity torques. Each term is selected by a [`Compensation`] flag or by
//! the presence of its input, never by a sentinel value.

use nalgebra::{DMatrix, DVector, Vector3};
use opspace_common::control::{Compensation, ControlParameters};

use crate::model::ModelQuery;

/// Task-space acceleration estimate `dJ/dt · dq`.
///
/// Zero when the stage is disabled or the query carries no derivative.
#[inline]
pub fn jacobian_derivative_term(
    params: &ControlParameters,
    query: &ModelQuery,
    dq: &DVector<f64>,
) -> Vector3<f64> {
    match &query.jacobian_derivative {
        Some(dj) if params.uses(Compensation::JACOBIAN_DERIVATIVE) => dj * dq,
        _ => Vector3::zeros(),
    }
}

/// Caller-supplied task-space force, or zero.
#[inline]
pub fn external_force(force: Option<&Vector3<f64>>) -> Vector3<f64> {
    force.copied().unwrap_or_else(Vector3::zeros)
}

/// Joint-space momentum `M · dq`.
#[inline]
pub fn momentum_torque(mass_matrix: &DMatrix<f64>, dq: &DVector<f64>) -> DVector<f64> {
    mass_matrix * dq
}

/// Coriolis/centripetal torque to subtract, if enabled.
#[inline]
pub fn coriolis_torque<'a>(params: &ControlParameters, query: &'a ModelQuery) -> Option<&'a DVector<f64>> {
    query
        .coriolis
        .as_ref()
        .filter(|_| params.uses(Compensation::CORIOLIS))
}

/// Gravity torque to subtract, if enabled.
#[inline]
pub fn gravity_torque<'a>(params: &ControlParameters, query: &'a ModelQuery) -> Option<&'a DVector<f64>> {
    query
        .gravity
        .as_ref()
        .filter(|_| params.uses(Compensation::GRAVITY))
}

// ─── Tests ──────────────────────────────────────────────────────────

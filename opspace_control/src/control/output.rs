//! Control signal composer.
//!
//! Assembles every stage of the law into the joint torque command and the
//! training signal. Also defines [`ControllerState`], the only data that
//! outlives a tick (integral accumulator and held null-space velocity).

use nalgebra::{DVector, Vector3};
use opspace_common::control::{Compensation, ControlParameters, VelocityLimit};

use super::dynamics::{
    coriolis_torque, external_force, gravity_torque, jacobian_derivative_term, momentum_torque,
};
use super::inertia::{InertiaEstimate, estimate_task_inertia};
use super::integral::{IntegralState, integral_compute};
use super::null_space::{NullSpaceInput, NullSpaceState, RestPose, null_space_compute};
use super::velocity::position_compute;
use crate::model::ModelQuery;
use crate::task::{JointState, TaskTarget};

// ─── ControllerState ────────────────────────────────────────────────

/// Mutable controller state carried across ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    /// Integral error accumulator.
    pub integral: IntegralState,
    /// Held desired joint velocity of the null-space objective.
    pub null_space: NullSpaceState,
}

impl ControllerState {
    pub fn new(n_joints: usize, integrated_error: Vector3<f64>) -> Self {
        Self {
            integral: IntegralState::new(integrated_error),
            null_space: NullSpaceState::new(n_joints),
        }
    }

    /// Zero the accumulator and the held velocity.
    #[inline]
    pub fn reset(&mut self) {
        self.integral.reset();
        self.null_space.reset();
    }
}

// ─── Output ─────────────────────────────────────────────────────────

/// Intermediates retained for inspection. Not part of the command.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// Position of the controlled point [m].
    pub pose: Vector3<f64>,
    /// `pose - target` [m].
    pub error: Vector3<f64>,
    /// Task-space velocity `J·dq` [m/s].
    pub task_velocity: Vector3<f64>,
    /// Clipped approach velocity (velocity-limited law only).
    pub approach_velocity: Option<Vector3<f64>>,
    /// Task-space force after all task-space stages.
    pub u_task: Vector3<f64>,
    /// `Mx · u_task`.
    pub u_mx: Vector3<f64>,
    /// Task-space inertia and the path that produced it.
    pub inertia: InertiaEstimate,
    /// Filtered rest-pose torque (null-space stage only).
    pub null_space_torque: Option<DVector<f64>>,
}

/// Result of one control tick.
#[derive(Debug, Clone)]
pub struct ControlOutput {
    /// Joint torque command (N).
    pub torque: DVector<f64>,
    /// Torque before gravity compensation and null-space bias, for an
    /// external adaptation stage.
    pub training_signal: DVector<f64>,
    pub diagnostics: Diagnostics,
}

// ─── Control Output Computation ─────────────────────────────────────

/// Compute the torque command for one tick.
///
/// Inputs must already be validated (lengths, finiteness, model shapes).
///
/// Pipeline:
/// 1. Task-space inertia `Mx` (regularized on singularity)
/// 2. Position force (velocity-limited or proportional)
/// 3. `- dJ/dt · dq`
/// 4. `- ki · Σe`
/// 5. `+ f_ext`
/// 6. `u = Jᵀ · Mx · u_task`
/// 7. `- M · dq` when velocity limiting is off
/// 8. `- c(q, dq)`
/// 9. Snapshot training signal
/// 10. `- g(q)`
/// 11. `+ filter · u_null`
pub fn compute_control_output(
    state: &mut ControllerState,
    params: &ControlParameters,
    rest: &RestPose,
    query: &ModelQuery,
    joints: &JointState,
    target: &TaskTarget,
) -> ControlOutput {
    let j = &query.jacobian;
    let dq = &joints.dq;

    // ── 1. Inertia ──────────────────────────────────────────
    let inertia = estimate_task_inertia(&query.mass_matrix, j);
    let mx = *inertia.mx();

    // ── 2. Position ─────────────────────────────────────────
    let error = query.pose - target.position;
    let task_velocity: Vector3<f64> = j * dq;
    let position = position_compute(params, &error, &task_velocity, &target.velocity);
    let mut u_task = position.force;

    // ── 3. Jacobian derivative ──────────────────────────────
    u_task -= jacobian_derivative_term(params, query, dq);

    // ── 4. Integral ─────────────────────────────────────────
    if params.has_integral() {
        u_task += integral_compute(&mut state.integral, params.ki, &error);
    }

    // ── 5. External force ───────────────────────────────────
    u_task += external_force(target.force.as_ref());

    // ── 6. Inertia weighting ────────────────────────────────
    let u_mx = mx * u_task;
    let mut u = j.transpose() * u_mx;

    // ── 7. Momentum cancellation ────────────────────────────
    if params.velocity_limit == VelocityLimit::Disabled {
        u -= momentum_torque(&query.mass_matrix, dq);
    }

    // ── 8. Coriolis ─────────────────────────────────────────
    if let Some(c) = coriolis_torque(params, query) {
        u -= c;
    }

    // ── 9. Training signal ──────────────────────────────────
    let training_signal = u.clone();

    // ── 10. Gravity ─────────────────────────────────────────
    if let Some(g) = gravity_torque(params, query) {
        u -= g;
    }

    // ── 11. Null space ──────────────────────────────────────
    let null_space_torque = if params.uses(Compensation::NULL_SPACE) && rest.is_active() {
        let input = NullSpaceInput {
            q: &joints.q,
            dq,
            mass_matrix: &query.mass_matrix,
            mass_inverse: &inertia.mass_inverse,
            jacobian: j,
            mx: &mx,
        };
        let tau = null_space_compute(&mut state.null_space, rest, params.nkp, params.nkv, &input);
        u += &tau;
        Some(tau)
    } else {
        None
    };

    ControlOutput {
        torque: u,
        training_signal,
        diagnostics: Diagnostics {
            pose: query.pose,
            error,
            task_velocity,
            approach_velocity: position.approach_velocity,
            u_task,
            u_mx,
            inertia: inertia.estimate,
            null_space_torque,
        },
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

//! Stateful operational-space controller.
//!
//! Owns the model, the resolved parameters and the cross-tick state. Every
//! call validates its inputs and the model's answers before running the
//! control law, so a malformed input is an error, never a wrong torque.

use nalgebra::{DVector, Vector3};
use opspace_common::config::ConfigError;
use opspace_common::control::{ControlParameters, OscConfig};
use opspace_common::error::{OscError, OscResult};
use opspace_common::frame::ReferenceFrame;
use tracing::{debug, error, info};

use crate::control::null_space::RestPose;
use crate::control::output::{ControlOutput, ControllerState, compute_control_output};
use crate::model::{ModelQuery, RobotModel};
use crate::task::{JointState, TaskTarget};

/// Operational-space controller for one arm.
///
/// [`generate`](Self::generate) takes `&mut self`; run one instance per
/// arm.
#[derive(Debug)]
pub struct OperationalSpaceController<M: RobotModel> {
    model: M,
    params: ControlParameters,
    rest: RestPose,
    state: ControllerState,
    /// Inertia path of the previous tick, for transition logging.
    last_well_conditioned: Option<bool>,
}

impl<M: RobotModel> OperationalSpaceController<M> {
    /// Validate `config`, probe `model` once and build the controller.
    pub fn new(model: M, config: &OscConfig) -> OscResult<Self> {
        let params = ControlParameters::resolve(config)?;
        let n = model.n_joints();
        if n == 0 {
            return Err(OscError::Config(ConfigError::ValidationError(
                "robot model has no joints".into(),
            )));
        }

        let rest_angles = model.rest_angles();
        if rest_angles.len() != n {
            return Err(OscError::DimensionMismatch {
                what: "rest angles",
                expected: n,
                actual: rest_angles.len(),
            });
        }
        if rest_angles.iter().flatten().any(|a| !a.is_finite()) {
            return Err(OscError::NonFinite { what: "rest angles" });
        }
        let rest = RestPose::from_angles(&rest_angles);

        // Surface model setup problems here rather than in the loop.
        let probe = JointState::zeros(n);
        if let Err(e) = ModelQuery::collect(
            &model,
            &params,
            ReferenceFrame::EndEffector,
            &Vector3::zeros(),
            &probe,
        ) {
            error!("Robot model probe failed: {e}");
            return Err(e);
        }

        let initial = config
            .initial_integrated_error
            .map(Vector3::from)
            .unwrap_or_else(Vector3::zeros);

        info!(
            "OSC ready: {} joints, kp={} kv={} ki={} limit={:?} flags={:?} rest={}",
            n,
            params.kp,
            params.kv,
            params.ki,
            params.velocity_limit,
            params.compensation,
            if rest.is_active() { "set" } else { "none" },
        );

        Ok(Self {
            model,
            params,
            rest,
            state: ControllerState::new(n, initial),
            last_well_conditioned: None,
        })
    }

    /// Compute the joint torque command for one tick.
    ///
    /// On error the controller state is left unchanged.
    pub fn generate(&mut self, joints: &JointState, target: &TaskTarget) -> OscResult<ControlOutput> {
        let n = self.model.n_joints();
        joints.check(n)?;
        target.check()?;
        if !self.model.has_frame(target.frame) {
            return Err(OscError::UnknownFrame {
                frame: target.frame.to_string(),
            });
        }

        let query = ModelQuery::collect(&self.model, &self.params, target.frame, &target.offset, joints)?;

        let mut next = self.state.clone();
        let output = compute_control_output(&mut next, &self.params, &self.rest, &query, joints, target);
        if output.torque.iter().any(|v| !v.is_finite()) {
            return Err(OscError::NonFinite { what: "torque command" });
        }
        self.state = next;

        let well = output.diagnostics.inertia.is_well_conditioned();
        if self.last_well_conditioned != Some(well) {
            if well {
                debug!("Task-space inertia well-conditioned at q={:?}", joints.q.as_slice());
            } else {
                debug!(
                    "Task-space inertia regularized at q={:?} (singular M or Mx⁻¹)",
                    joints.q.as_slice()
                );
            }
            self.last_well_conditioned = Some(well);
        }

        Ok(output)
    }

    /// Active gains and flags.
    #[inline]
    pub fn params(&self) -> &ControlParameters {
        &self.params
    }

    #[inline]
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Replace the cross-tick state (e.g. resume from a checkpoint).
    pub fn set_state(&mut self, state: ControllerState) -> OscResult<()> {
        let n = self.model.n_joints();
        let held = state.null_space.held_velocity();
        if held.len() != n {
            return Err(OscError::DimensionMismatch {
                what: "held null-space velocity",
                expected: n,
                actual: held.len(),
            });
        }
        if held.iter().any(|v| !v.is_finite()) {
            return Err(OscError::NonFinite {
                what: "held null-space velocity",
            });
        }
        if state.integral.integrated_error().iter().any(|v| !v.is_finite()) {
            return Err(OscError::NonFinite {
                what: "integrated error",
            });
        }
        self.state = state;
        Ok(())
    }

    /// Zero the integral accumulator only (anti-windup hook).
    #[inline]
    pub fn reset_integrated_error(&mut self) {
        self.state.integral.reset();
    }

    /// Zero all cross-tick state.
    pub fn reset(&mut self) {
        self.state.reset();
        self.last_well_conditioned = None;
    }

    #[inline]
    pub fn n_joints(&self) -> usize {
        self.model.n_joints()
    }

    /// Rest pose mask in joint order.
    pub fn null_space_joints(&self) -> Vec<bool> {
        (0..self.n_joints()).map(|i| self.rest.is_controlled(i)).collect()
    }

    /// Held desired joint velocity, for inspection.
    #[inline]
    pub fn held_velocity(&self) -> &DVector<f64> {
        self.state.null_space.held_velocity()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

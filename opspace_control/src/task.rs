//! Per-tick inputs: joint state and task target.

use nalgebra::{DVector, Vector3};
use opspace_common::error::{OscError, OscResult};
use opspace_common::frame::ReferenceFrame;

/// Measured joint state. Updated by the caller every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct JointState {
    /// Joint angles [rad].
    pub q: DVector<f64>,
    /// Joint velocities [rad/s].
    pub dq: DVector<f64>,
}

impl JointState {
    pub fn new(q: DVector<f64>, dq: DVector<f64>) -> Self {
        Self { q, dq }
    }

    /// Arm at rest at the zero configuration.
    pub fn zeros(n_joints: usize) -> Self {
        Self {
            q: DVector::zeros(n_joints),
            dq: DVector::zeros(n_joints),
        }
    }

    /// Build from slices.
    pub fn from_slices(q: &[f64], dq: &[f64]) -> Self {
        Self {
            q: DVector::from_column_slice(q),
            dq: DVector::from_column_slice(dq),
        }
    }

    /// Reject wrong lengths and NaN/Inf.
    pub fn check(&self, n_joints: usize) -> OscResult<()> {
        if self.q.len() != n_joints {
            return Err(OscError::DimensionMismatch {
                what: "joint positions",
                expected: n_joints,
                actual: self.q.len(),
            });
        }
        if self.dq.len() != n_joints {
            return Err(OscError::DimensionMismatch {
                what: "joint velocities",
                expected: n_joints,
                actual: self.dq.len(),
            });
        }
        if self.q.iter().any(|v| !v.is_finite()) {
            return Err(OscError::NonFinite { what: "joint positions" });
        }
        if self.dq.iter().any(|v| !v.is_finite()) {
            return Err(OscError::NonFinite { what: "joint velocities" });
        }
        Ok(())
    }
}

/// Desired task-space state for the controlled point.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTarget {
    /// Desired position [m].
    pub position: Vector3<f64>,
    /// Desired velocity [m/s].
    pub velocity: Vector3<f64>,
    /// Frame carrying the controlled point.
    pub frame: ReferenceFrame,
    /// Controlled point inside `frame` [m].
    pub offset: Vector3<f64>,
    /// Additional task-space force added before inertia weighting [N].
    pub force: Option<Vector3<f64>>,
}

impl TaskTarget {
    /// Hold the end-effector at `position`.
    pub fn new(position: Vector3<f64>) -> Self {
        Self {
            position,
            velocity: Vector3::zeros(),
            frame: ReferenceFrame::EndEffector,
            offset: Vector3::zeros(),
            force: None,
        }
    }

    pub fn with_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.velocity = velocity;
        self
    }

    /// Control a point other than the end-effector origin.
    pub fn in_frame(mut self, frame: ReferenceFrame, offset: Vector3<f64>) -> Self {
        self.frame = frame;
        self.offset = offset;
        self
    }

    pub fn with_force(mut self, force: Vector3<f64>) -> Self {
        self.force = Some(force);
        self
    }

    pub(crate) fn check(&self) -> OscResult<()> {
        let finite = |v: &Vector3<f64>| v.iter().all(|x| x.is_finite());
        if !finite(&self.position) {
            return Err(OscError::NonFinite { what: "target position" });
        }
        if !finite(&self.velocity) {
            return Err(OscError::NonFinite { what: "target velocity" });
        }
        if !finite(&self.offset) {
            return Err(OscError::NonFinite { what: "target offset" });
        }
        if let Some(force) = &self.force {
            if !finite(force) {
                return Err(OscError::NonFinite { what: "task-space force" });
            }
        }
        Ok(())
    }
}

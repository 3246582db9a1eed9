//! Injectable dynamics adaptation.
//!
//! An adaptive module learns unmodeled forces from the controller's
//! training signal and returns a joint-space correction. The controller
//! never calls it; the caller decides whether and how to add the
//! correction to the torque command (see [`apply_correction`]).
//!
//! Any `FnMut(&AdaptationContext) -> DVector<f64>` closure is an adapter;
//! wrap it in [`from_fn`] so the context lifetime is inferred generically.

use nalgebra::{DVector, Vector3};
use opspace_common::error::{OscError, OscResult};

use crate::control::output::ControlOutput;
use crate::task::JointState;

/// Everything an adapter sees for one tick.
#[derive(Debug, Clone, Copy)]
pub struct AdaptationContext<'a> {
    /// Measured joint state.
    pub joints: &'a JointState,
    /// Torque before gravity compensation and null-space bias.
    pub training_signal: &'a DVector<f64>,
    /// Position of the controlled point [m].
    pub pose: &'a Vector3<f64>,
}

impl<'a> AdaptationContext<'a> {
    /// Context for `output`, computed from `joints`.
    pub fn new(joints: &'a JointState, output: &'a ControlOutput) -> Self {
        Self {
            joints,
            training_signal: &output.training_signal,
            pose: &output.diagnostics.pose,
        }
    }
}

/// Learned correction of the control signal.
pub trait DynamicsAdaptation {
    /// Joint-space correction for this tick (length N).
    fn correct(&mut self, ctx: &AdaptationContext<'_>) -> DVector<f64>;
}

impl<F> DynamicsAdaptation for F
where
    F: FnMut(&AdaptationContext<'_>) -> DVector<f64>,
{
    #[inline]
    fn correct(&mut self, ctx: &AdaptationContext<'_>) -> DVector<f64> {
        self(ctx)
    }
}

/// Pin a closure to the adapter signature.
#[inline]
pub fn from_fn<F>(f: F) -> F
where
    F: FnMut(&AdaptationContext<'_>) -> DVector<f64>,
{
    f
}

/// Run `adapter` on `output` and add its correction to the torque command.
///
/// Returns the correction. A correction with the wrong length or with
/// NaN/Inf is rejected and the torque is left unchanged.
pub fn apply_correction<A: DynamicsAdaptation + ?Sized>(
    adapter: &mut A,
    joints: &JointState,
    output: &mut ControlOutput,
) -> OscResult<DVector<f64>> {
    let correction = adapter.correct(&AdaptationContext::new(joints, output));
    let n = output.torque.len();
    if correction.len() != n {
        return Err(OscError::DimensionMismatch {
            what: "adaptation correction",
            expected: n,
            actual: correction.len(),
        });
    }
    if correction.iter().any(|v| !v.is_finite()) {
        return Err(OscError::NonFinite {
            what: "adaptation correction",
        });
    }
    output.torque += &correction;
    Ok(correction)
}

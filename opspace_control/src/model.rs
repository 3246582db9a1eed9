//! Robot model interface consumed by the control law.
//!
//! The model supplies kinematics and rigid-body dynamics; the controller
//! never computes either itself. All methods are pure functions of their
//! arguments and must not fail inside the valid joint range.
//!
//! ## Sign convention
//!
//! [`RobotModel::gravity`] and [`RobotModel::coriolis`] return the
//! generalized forces *exerted on the arm* by gravity and by
//! Coriolis/centripetal effects, so the plant obeys
//! `M(q) q̈ = τ + g(q) + c(q, dq)` and compensation subtracts them.

use nalgebra::{DMatrix, DVector, Matrix3xX, Vector3};
use opspace_common::consts::TASK_DIM;
use opspace_common::control::{Compensation, ControlParameters};
use opspace_common::error::{OscError, OscResult};
use opspace_common::frame::ReferenceFrame;

use crate::task::JointState;

/// Kinematic and dynamic model of a serial manipulator.
pub trait RobotModel {
    /// Number of actuated joints.
    fn n_joints(&self) -> usize;

    /// Preferred joint angles for the null-space objective.
    ///
    /// `None` excludes the joint from the objective.
    fn rest_angles(&self) -> Vec<Option<f64>> {
        vec![None; self.n_joints()]
    }

    /// Whether `frame` names a frame of this model.
    fn has_frame(&self, _frame: ReferenceFrame) -> bool {
        true
    }

    /// Cartesian position of `offset` (expressed in `frame`) [m].
    fn pose(&self, frame: ReferenceFrame, q: &DVector<f64>, offset: &Vector3<f64>) -> Vector3<f64>;

    /// Kinematic Jacobian of the same point.
    ///
    /// At least 3 rows (linear velocity first); any further rows are
    /// orientation and are ignored by the controller.
    fn jacobian(&self, frame: ReferenceFrame, q: &DVector<f64>, offset: &Vector3<f64>)
    -> DMatrix<f64>;

    /// Time derivative of [`RobotModel::jacobian`], same layout.
    ///
    /// Evaluated at the same `offset` point as the pose, not the frame origin.
    fn jacobian_derivative(
        &self,
        frame: ReferenceFrame,
        q: &DVector<f64>,
        dq: &DVector<f64>,
        offset: &Vector3<f64>,
    ) -> DMatrix<f64>;

    /// Joint-space mass matrix (N×N, symmetric).
    fn mass_matrix(&self, q: &DVector<f64>) -> DMatrix<f64>;

    /// Generalized gravity force (N).
    fn gravity(&self, q: &DVector<f64>) -> DVector<f64>;

    /// Generalized Coriolis/centripetal force (N).
    fn coriolis(&self, q: &DVector<f64>, dq: &DVector<f64>) -> DVector<f64>;
}

/// Everything the control law needs from the model for one tick.
///
/// Optional quantities are only queried when their stage is enabled.
#[derive(Debug, Clone)]
pub struct ModelQuery {
    /// Position of the controlled point [m].
    pub pose: Vector3<f64>,
    /// Position rows of the Jacobian (3×N).
    pub jacobian: Matrix3xX<f64>,
    /// Position rows of the Jacobian derivative (3×N).
    pub jacobian_derivative: Option<Matrix3xX<f64>>,
    /// Joint-space mass matrix (N×N).
    pub mass_matrix: DMatrix<f64>,
    /// Generalized gravity force (N).
    pub gravity: Option<DVector<f64>>,
    /// Generalized Coriolis/centripetal force (N).
    pub coriolis: Option<DVector<f64>>,
}

impl ModelQuery {
    /// Query `model` and validate every returned shape.
    ///
    /// A wrongly-shaped or non-finite result is a programming error in the
    /// model and is returned as [`OscError::ModelShape`] /
    /// [`OscError::NonFinite`].
    pub fn collect<M: RobotModel + ?Sized>(
        model: &M,
        params: &ControlParameters,
        frame: ReferenceFrame,
        offset: &Vector3<f64>,
        joints: &JointState,
    ) -> OscResult<Self> {
        let n = model.n_joints();
        let (q, dq) = (&joints.q, &joints.dq);

        let pose = model.pose(frame, q, offset);
        if pose.iter().any(|v| !v.is_finite()) {
            return Err(OscError::NonFinite { what: "model pose" });
        }

        let jacobian = position_rows(&model.jacobian(frame, q, offset), n, "jacobian")?;

        let jacobian_derivative = if params.uses(Compensation::JACOBIAN_DERIVATIVE) {
            let dj = model.jacobian_derivative(frame, q, dq, offset);
            Some(position_rows(&dj, n, "jacobian derivative")?)
        } else {
            None
        };

        let mass_matrix = model.mass_matrix(q);
        check_shape("mass matrix", mass_matrix.nrows(), mass_matrix.ncols(), n, n)?;
        if mass_matrix.iter().any(|v| !v.is_finite()) {
            return Err(OscError::NonFinite { what: "mass matrix" });
        }

        let gravity = if params.uses(Compensation::GRAVITY) {
            Some(check_vector("gravity", model.gravity(q), n)?)
        } else {
            None
        };

        let coriolis = if params.uses(Compensation::CORIOLIS) {
            Some(check_vector("coriolis", model.coriolis(q, dq), n)?)
        } else {
            None
        };

        Ok(Self {
            pose,
            jacobian,
            jacobian_derivative,
            mass_matrix,
            gravity,
            coriolis,
        })
    }

    /// Number of joints the query was taken for.
    #[inline]
    pub fn n_joints(&self) -> usize {
        self.mass_matrix.nrows()
    }
}

fn check_shape(
    quantity: &'static str,
    rows: usize,
    cols: usize,
    expected_rows: usize,
    expected_cols: usize,
) -> OscResult<()> {
    if rows != expected_rows || cols != expected_cols {
        return Err(OscError::ModelShape {
            quantity,
            expected_rows,
            expected_cols,
            rows,
            cols,
        });
    }
    Ok(())
}

fn check_vector(quantity: &'static str, v: DVector<f64>, n: usize) -> OscResult<DVector<f64>> {
    check_shape(quantity, v.nrows(), v.ncols(), n, 1)?;
    if v.iter().any(|x| !x.is_finite()) {
        return Err(OscError::NonFinite { what: quantity });
    }
    Ok(v)
}

/// Slice the linear-velocity rows out of a full kinematic Jacobian.
fn position_rows(
    full: &DMatrix<f64>,
    n: usize,
    quantity: &'static str,
) -> OscResult<Matrix3xX<f64>> {
    if full.nrows() < TASK_DIM || full.ncols() != n {
        return Err(OscError::ModelShape {
            quantity,
            expected_rows: TASK_DIM,
            expected_cols: n,
            rows: full.nrows(),
            cols: full.ncols(),
        });
    }
    if full.iter().any(|v| !v.is_finite()) {
        return Err(OscError::NonFinite { what: quantity });
    }
    Ok(Matrix3xX::from_fn(n, |r, c| full[(r, c)]))
}

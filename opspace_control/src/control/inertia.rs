//! Task-space (operational-space) inertia estimation.
//!
//! ```text
//! M⁻¹      = inverse(M)
//! Mx⁻¹     = J · M⁻¹ · Jᵀ          (3×3)
//! Mx       = inverse(Mx⁻¹)         well-conditioned
//!          = pinv(Mx⁻¹, 0.04)      otherwise
//! ```
//!
//! A singular mass matrix or a kinematic singularity never produces
//! NaN/Inf: the estimate falls back to a pseudo-inverse that zeroes
//! singular values below `0.04 × σ_max` and is tagged
//! [`InertiaEstimate::Regularized`].

use nalgebra::{DMatrix, Matrix3, Matrix3xX};
use opspace_common::consts::{CONDITION_EPS, SINGULAR_VALUE_CUTOFF};

/// Task-space inertia, tagged with the path that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InertiaEstimate {
    /// Exact inverse of `Mx⁻¹`.
    WellConditioned(Matrix3<f64>),
    /// Truncated-SVD pseudo-inverse; precision is degraded.
    Regularized(Matrix3<f64>),
}

impl InertiaEstimate {
    /// The task-space inertia matrix, whichever path produced it.
    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        match self {
            Self::WellConditioned(m) | Self::Regularized(m) => m,
        }
    }

    #[inline]
    pub fn is_well_conditioned(&self) -> bool {
        matches!(self, Self::WellConditioned(_))
    }
}

/// Result of one inertia estimation.
#[derive(Debug, Clone)]
pub struct TaskSpaceInertia {
    /// Joint-space inverse mass matrix (regularized if `M` is singular).
    pub mass_inverse: DMatrix<f64>,
    /// `J · M⁻¹ · Jᵀ`.
    pub task_inverse: Matrix3<f64>,
    /// Task-space inertia `Mx`.
    pub estimate: InertiaEstimate,
}

impl TaskSpaceInertia {
    #[inline]
    pub fn mx(&self) -> &Matrix3<f64> {
        self.estimate.matrix()
    }
}

/// Reciprocal condition number `σ_min / σ_max` (0 for the zero matrix).
fn rcond(singular_values: &[f64]) -> f64 {
    let max = singular_values.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return 0.0;
    }
    let min = singular_values.iter().copied().fold(f64::INFINITY, f64::min);
    min / max
}

/// Pseudo-inverse of a square matrix, dropping singular values below
/// `SINGULAR_VALUE_CUTOFF × σ_max`.
pub fn regularized_inverse(m: &DMatrix<f64>) -> DMatrix<f64> {
    let (rows, cols) = m.shape();
    let svd = m.clone().svd(true, true);
    let max = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    svd.pseudo_inverse(SINGULAR_VALUE_CUTOFF * max)
        .unwrap_or_else(|_| DMatrix::zeros(cols, rows))
}

fn regularized_inverse3(m: &Matrix3<f64>) -> Matrix3<f64> {
    let svd = m.svd(true, true);
    let max = svd.singular_values.max().max(0.0);
    let pinv = svd
        .pseudo_inverse(SINGULAR_VALUE_CUTOFF * max)
        .unwrap_or_else(|_| Matrix3::zeros());
    // Symmetric in exact arithmetic; remove round-off asymmetry.
    (pinv + pinv.transpose()) * 0.5
}

/// Invert `M` if it is numerically invertible.
fn invert_mass_matrix(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if rcond(m.singular_values().as_slice()) <= CONDITION_EPS {
        return None;
    }
    m.clone().try_inverse()
}

/// Compute the task-space inertia for mass matrix `m` and position
/// Jacobian `j`. Never fails.
pub fn estimate_task_inertia(m: &DMatrix<f64>, j: &Matrix3xX<f64>) -> TaskSpaceInertia {
    let (mass_inverse, mass_ok) = match invert_mass_matrix(m) {
        Some(inv) => (inv, true),
        None => (regularized_inverse(m), false),
    };

    let task_inverse: Matrix3<f64> = j * &mass_inverse * j.transpose();

    let exact = if mass_ok && rcond(task_inverse.singular_values().as_slice()) > CONDITION_EPS {
        task_inverse.try_inverse()
    } else {
        None
    };

    let estimate = match exact {
        Some(mx) => InertiaEstimate::WellConditioned(mx),
        None => InertiaEstimate::Regularized(regularized_inverse3(&task_inverse)),
    };

    TaskSpaceInertia {
        mass_inverse,
        task_inverse,
        estimate,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

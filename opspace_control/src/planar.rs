//! N-link planar arm with point masses.
//!
//! Revolute joints about +z, links in the x-y plane, gravity along -y.
//! Each link carries its mass as a point at its distal end, which gives
//! closed-form rigid-body terms:
//!
//! ```text
//! M(q)     =  Σ mᵢ Jᵢᵀ Jᵢ
//! g(q)     =  Σ Jᵢᵀ mᵢ (0, -g, 0)
//! c(q, dq) = -Σ mᵢ Jᵢᵀ J̇ᵢ dq
//! ```
//!
//! where `Jᵢ` is the position Jacobian of mass point `i`.

use nalgebra::{DMatrix, DVector, Matrix3xX, Vector3};
use opspace_common::config::{ConfigError, Validate};
use opspace_common::consts::STANDARD_GRAVITY;
use opspace_common::error::{OscError, OscResult};
use opspace_common::frame::ReferenceFrame;
use serde::{Deserialize, Serialize};

use crate::model::RobotModel;

/// Planar arm description.
///
/// # TOML Example
///
/// ```toml
/// [arm]
/// link_lengths = [0.3, 0.3, 0.2]
/// link_masses = [1.0, 1.0, 0.5]
/// rest_angles = [0.0, 1.2, 0.0]
/// free_joints = [0]      # excluded from the rest-pose objective
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanarArmConfig {
    /// Link lengths [m].
    pub link_lengths: Vec<f64>,
    /// Point mass at the distal end of each link [kg].
    pub link_masses: Vec<f64>,
    /// Rest angle per joint [rad].
    #[serde(default)]
    pub rest_angles: Option<Vec<f64>>,
    /// Joints without a rest angle.
    #[serde(default)]
    pub free_joints: Vec<usize>,
    /// Gravity magnitude [m/s²].
    #[serde(default = "default_gravity")]
    pub gravity: f64,
}

fn default_gravity() -> f64 {
    STANDARD_GRAVITY
}

impl Validate for PlanarArmConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let n = self.link_lengths.len();
        let invalid = |msg: String| Err(ConfigError::ValidationError(format!("arm: {msg}")));

        if n == 0 {
            return invalid("at least one link is required".into());
        }
        if self.link_masses.len() != n {
            return invalid(format!(
                "{} link masses for {} links",
                self.link_masses.len(),
                n
            ));
        }
        if let Some(l) = self.link_lengths.iter().find(|l| !l.is_finite() || **l <= 0.0) {
            return invalid(format!("link length {l} must be finite and > 0"));
        }
        if let Some(m) = self.link_masses.iter().find(|m| !m.is_finite() || **m < 0.0) {
            return invalid(format!("link mass {m} must be finite and >= 0"));
        }
        if let Some(rest) = &self.rest_angles {
            if rest.len() != n {
                return invalid(format!("{} rest angles for {} joints", rest.len(), n));
            }
            if rest.iter().any(|a| !a.is_finite()) {
                return invalid("rest angles must be finite".into());
            }
        }
        if let Some(j) = self.free_joints.iter().find(|j| **j >= n) {
            return invalid(format!("free joint {j} out of range (0..{n})"));
        }
        if !self.gravity.is_finite() || self.gravity < 0.0 {
            return invalid(format!("gravity {} must be finite and >= 0", self.gravity));
        }
        Ok(())
    }
}

/// Planar serial arm implementing [`RobotModel`].
#[derive(Debug, Clone)]
pub struct PlanarArm {
    lengths: Vec<f64>,
    masses: Vec<f64>,
    rest: Vec<Option<f64>>,
    gravity: f64,
}

/// Joint origins `p_0..=p_N` and absolute link angles `θ_0..θ_{N-1}`.
struct Chain {
    origins: Vec<Vector3<f64>>,
    angles: Vec<f64>,
}

#[inline]
fn cross_z(v: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(-v.y, v.x, 0.0)
}

impl PlanarArm {
    /// Build from a validated description.
    pub fn new(config: &PlanarArmConfig) -> OscResult<Self> {
        config.validate()?;
        let n = config.link_lengths.len();
        let mut rest: Vec<Option<f64>> = match &config.rest_angles {
            Some(angles) => angles.iter().copied().map(Some).collect(),
            None => vec![None; n],
        };
        for &j in &config.free_joints {
            rest[j] = None;
        }
        Ok(Self {
            lengths: config.link_lengths.clone(),
            masses: config.link_masses.clone(),
            rest,
            gravity: config.gravity,
        })
    }

    /// Two-link arm without rest angles.
    pub fn two_link(l1: f64, l2: f64, m1: f64, m2: f64) -> Self {
        Self {
            lengths: vec![l1, l2],
            masses: vec![m1, m2],
            rest: vec![None; 2],
            gravity: STANDARD_GRAVITY,
        }
    }

    /// Replace the rest pose. Length must match the joint count.
    pub fn with_rest_angles(mut self, rest: Vec<Option<f64>>) -> OscResult<Self> {
        if rest.len() != self.lengths.len() {
            return Err(OscError::DimensionMismatch {
                what: "rest angles",
                expected: self.lengths.len(),
                actual: rest.len(),
            });
        }
        self.rest = rest;
        Ok(self)
    }

    fn chain(&self, q: &DVector<f64>) -> Chain {
        let n = self.lengths.len();
        let mut origins = Vec::with_capacity(n + 1);
        let mut angles = Vec::with_capacity(n);
        let mut p = Vector3::zeros();
        let mut theta = 0.0;
        origins.push(p);
        for (i, l) in self.lengths.iter().enumerate() {
            theta += q[i];
            p += Vector3::new(l * theta.cos(), l * theta.sin(), 0.0);
            angles.push(theta);
            origins.push(p);
        }
        Chain { origins, angles }
    }

    /// Index of the last joint moving `frame`.
    fn body(&self, frame: ReferenceFrame) -> usize {
        let last = self.lengths.len() - 1;
        match frame {
            ReferenceFrame::EndEffector => last,
            ReferenceFrame::Link(i) | ReferenceFrame::Joint(i) => i.min(last),
        }
    }

    fn point(&self, chain: &Chain, frame: ReferenceFrame, offset: &Vector3<f64>) -> Vector3<f64> {
        let b = self.body(frame);
        let origin = match frame {
            ReferenceFrame::Joint(_) => chain.origins[b],
            _ => chain.origins[b + 1],
        };
        let (s, c) = chain.angles[b].sin_cos();
        origin + Vector3::new(c * offset.x - s * offset.y, s * offset.x + c * offset.y, offset.z)
    }

    /// Velocity of `p`, rigidly attached to body `b`.
    fn point_velocity(chain: &Chain, p: &Vector3<f64>, b: usize, dq: &DVector<f64>) -> Vector3<f64> {
        (0..=b).fold(Vector3::zeros(), |v, j| v + cross_z(&(p - chain.origins[j])) * dq[j])
    }

    fn position_jacobian(&self, chain: &Chain, p: &Vector3<f64>, b: usize) -> Matrix3xX<f64> {
        let mut jac = Matrix3xX::zeros(self.lengths.len());
        for k in 0..=b {
            jac.set_column(k, &cross_z(&(p - chain.origins[k])));
        }
        jac
    }

    fn position_jacobian_derivative(
        &self,
        chain: &Chain,
        p: &Vector3<f64>,
        b: usize,
        dq: &DVector<f64>,
    ) -> Matrix3xX<f64> {
        let v = Self::point_velocity(chain, p, b, dq);
        let mut djac = Matrix3xX::zeros(self.lengths.len());
        for k in 0..=b {
            // Joint k's origin is moved by joints 0..k only.
            let vk = if k == 0 {
                Vector3::zeros()
            } else {
                Self::point_velocity(chain, &chain.origins[k], k - 1, dq)
            };
            djac.set_column(k, &cross_z(&(v - vk)));
        }
        djac
    }

    /// Position Jacobians of every mass point.
    fn mass_jacobians<'a>(&'a self, chain: &'a Chain) -> impl Iterator<Item = (f64, Matrix3xX<f64>)> + 'a {
        self.masses
            .iter()
            .enumerate()
            .filter(|(_, m)| **m > 0.0)
            .map(move |(i, m)| (*m, self.position_jacobian(chain, &chain.origins[i + 1], i)))
    }
}

impl RobotModel for PlanarArm {
    fn n_joints(&self) -> usize {
        self.lengths.len()
    }

    fn rest_angles(&self) -> Vec<Option<f64>> {
        self.rest.clone()
    }

    fn has_frame(&self, frame: ReferenceFrame) -> bool {
        match frame {
            ReferenceFrame::EndEffector => true,
            ReferenceFrame::Link(i) | ReferenceFrame::Joint(i) => i < self.lengths.len(),
        }
    }

    fn pose(&self, frame: ReferenceFrame, q: &DVector<f64>, offset: &Vector3<f64>) -> Vector3<f64> {
        let chain = self.chain(q);
        self.point(&chain, frame, offset)
    }

    fn jacobian(&self, frame: ReferenceFrame, q: &DVector<f64>, offset: &Vector3<f64>) -> DMatrix<f64> {
        let chain = self.chain(q);
        let p = self.point(&chain, frame, offset);
        let b = self.body(frame);
        let linear = self.position_jacobian(&chain, &p, b);

        let n = self.lengths.len();
        let mut full = DMatrix::zeros(6, n);
        full.rows_mut(0, 3).copy_from(&linear);
        for k in 0..=b {
            full[(5, k)] = 1.0;
        }
        full
    }

    fn jacobian_derivative(
        &self,
        frame: ReferenceFrame,
        q: &DVector<f64>,
        dq: &DVector<f64>,
        offset: &Vector3<f64>,
    ) -> DMatrix<f64> {
        let chain = self.chain(q);
        let p = self.point(&chain, frame, offset);
        let linear = self.position_jacobian_derivative(&chain, &p, self.body(frame), dq);

        let mut full = DMatrix::zeros(6, self.lengths.len());
        full.rows_mut(0, 3).copy_from(&linear);
        full
    }

    fn mass_matrix(&self, q: &DVector<f64>) -> DMatrix<f64> {
        let chain = self.chain(q);
        let n = self.lengths.len();
        self.mass_jacobians(&chain)
            .fold(DMatrix::zeros(n, n), |acc, (m, j)| acc + (j.transpose() * &j) * m)
    }

    fn gravity(&self, q: &DVector<f64>) -> DVector<f64> {
        let chain = self.chain(q);
        let n = self.lengths.len();
        self.mass_jacobians(&chain).fold(DVector::zeros(n), |acc, (m, j)| {
            acc + j.transpose() * Vector3::new(0.0, -m * self.gravity, 0.0)
        })
    }

    fn coriolis(&self, q: &DVector<f64>, dq: &DVector<f64>) -> DVector<f64> {
        let chain = self.chain(q);
        let n = self.lengths.len();
        self.masses
            .iter()
            .enumerate()
            .filter(|(_, m)| **m > 0.0)
            .fold(DVector::zeros(n), |acc, (i, m)| {
                let p = chain.origins[i + 1];
                let j = self.position_jacobian(&chain, &p, i);
                let dj = self.position_jacobian_derivative(&chain, &p, i, dq);
                acc - j.transpose() * (dj * dq) * *m
            })
    }
}

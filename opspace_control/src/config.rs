//! Simulator configuration file.
//!
//! One TOML file with four sections: `[shared]`, `[controller]`, `[arm]`
//! and `[run]`. Parsed through [`ConfigLoader`] and checked section by
//! section with [`Validate`].

use std::path::Path;

use nalgebra::{DVector, Vector3};
use serde::{Deserialize, Serialize};

use opspace_common::config::{ConfigError, ConfigLoader, SharedConfig, Validate};
use opspace_common::consts::DEFAULT_DT;
use opspace_common::control::OscConfig;
use opspace_common::frame::ReferenceFrame;

use crate::planar::PlanarArmConfig;
use crate::sim::RunSettings;
use crate::task::{JointState, TaskTarget};

// ─── Run Section ────────────────────────────────────────────────────

/// `[run]` section.
///
/// # TOML Example
///
/// ```toml
/// [run]
/// ticks = 3000
/// dt = 0.001
/// target = [0.35, 0.25, 0.0]
/// frame = "end_effector"
/// initial_q = [0.2, 0.8, 0.4]
/// disturbance = [0.0, 0.5, 0.0]
/// log_interval = 500
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of control ticks.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Tick period [s].
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Task-space target [m].
    pub target: [f64; 3],
    /// Desired task-space velocity [m/s].
    #[serde(default)]
    pub target_velocity: [f64; 3],
    /// Frame carrying the controlled point.
    #[serde(default)]
    pub frame: ReferenceFrame,
    /// Controlled point inside `frame` [m].
    #[serde(default)]
    pub offset: [f64; 3],
    /// Additional task-space force [N].
    #[serde(default)]
    pub ee_force: Option<[f64; 3]>,
    /// Initial joint angles [rad] (default: zeros).
    #[serde(default)]
    pub initial_q: Option<Vec<f64>>,
    /// Constant unmodelled joint torque [Nm].
    #[serde(default)]
    pub disturbance: Option<Vec<f64>>,
    /// Progress log period in ticks (0 = silent).
    #[serde(default = "default_log_interval")]
    pub log_interval: u64,
}

fn default_ticks() -> u64 {
    1_000
}
fn default_dt() -> f64 {
    DEFAULT_DT
}
fn default_log_interval() -> u64 {
    100
}

impl RunConfig {
    fn check(&self, n_joints: usize) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::ValidationError(format!("run: {msg}")));

        if !self.dt.is_finite() || self.dt <= 0.0 {
            return invalid(format!("dt {} must be finite and > 0", self.dt));
        }
        let vectors = [
            ("target", &self.target),
            ("target_velocity", &self.target_velocity),
            ("offset", &self.offset),
        ];
        for (name, v) in vectors {
            if v.iter().any(|x| !x.is_finite()) {
                return invalid(format!("{name} must be finite"));
            }
        }
        if let Some(f) = &self.ee_force {
            if f.iter().any(|x| !x.is_finite()) {
                return invalid("ee_force must be finite".into());
            }
        }
        for (name, v) in [("initial_q", &self.initial_q), ("disturbance", &self.disturbance)] {
            if let Some(v) = v {
                if v.len() != n_joints {
                    return invalid(format!("{name} has {} entries for {n_joints} joints", v.len()));
                }
                if v.iter().any(|x| !x.is_finite()) {
                    return invalid(format!("{name} must be finite"));
                }
            }
        }
        match self.frame {
            ReferenceFrame::EndEffector => {}
            ReferenceFrame::Link(i) | ReferenceFrame::Joint(i) if i < n_joints => {}
            other => return invalid(format!("frame {other} out of range for {n_joints} joints")),
        }
        Ok(())
    }

    /// Task target described by this section.
    pub fn task_target(&self) -> TaskTarget {
        let target = TaskTarget::new(Vector3::from(self.target))
            .with_velocity(Vector3::from(self.target_velocity))
            .in_frame(self.frame, Vector3::from(self.offset));
        match self.ee_force {
            Some(f) => target.with_force(Vector3::from(f)),
            None => target,
        }
    }

    /// Run settings for the simulator.
    pub fn settings(&self) -> RunSettings {
        RunSettings {
            ticks: self.ticks,
            dt: self.dt,
            target: self.task_target(),
            disturbance: self.disturbance.as_deref().map(DVector::from_column_slice),
            log_interval: self.log_interval,
        }
    }

    /// Initial joint state at rest.
    pub fn initial_state(&self, n_joints: usize) -> JointState {
        let q = self
            .initial_q
            .as_deref()
            .map(DVector::from_column_slice)
            .unwrap_or_else(|| DVector::zeros(n_joints));
        JointState::new(q, DVector::zeros(n_joints))
    }
}

// ─── Top Level ──────────────────────────────────────────────────────

/// Complete simulator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub shared: SharedConfig,
    #[serde(default)]
    pub controller: OscConfig,
    pub arm: PlanarArmConfig,
    pub run: RunConfig,
}

impl Validate for SimConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.controller.validate()?;
        self.arm.validate()?;
        self.run.check(self.arm.link_lengths.len())
    }
}

impl SimConfig {
    /// Load and validate a simulator configuration file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load_validated(path)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

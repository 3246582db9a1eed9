//! Closed-loop simulation: controller → (adaptation) → plant.
//!
//! The plant integrates `M(q) q̈ = τ + g(q) + c(q, dq) + d` with
//! semi-implicit Euler, using the same [`RobotModel`] as the controller.
//! `d` is an optional constant joint torque the controller does not know
//! about, the kind of force an adaptation stage is meant to learn.
//!
//! ## Tick
//! 1. `controller.generate(q, dq, target)` (timed)
//! 2. optional adaptation correction added to the command
//! 3. plant step
//! 4. stats update, periodic progress log

use std::time::Instant;

use nalgebra::{DVector, Vector3};
use serde::Serialize;
use tracing::info;

use opspace_common::control::OscConfig;
use opspace_common::error::{OscError, OscResult};

use crate::adaptation::{DynamicsAdaptation, apply_correction};
use crate::control::inertia::regularized_inverse;
use crate::control::output::ControlOutput;
use crate::controller::OperationalSpaceController;
use crate::model::RobotModel;
use crate::task::{JointState, TaskTarget};

// ─── Tick Statistics ────────────────────────────────────────────────

/// O(1) per-tick controller timing statistics.
///
/// Updated every tick with no allocation. Provides min/max/avg/stddev of
/// the controller compute time and counts regularized-inertia ticks.
#[derive(Debug, Clone, Serialize)]
pub struct TickStats {
    /// Total ticks executed.
    pub tick_count: u64,
    /// Last compute time [ns].
    pub last_ns: i64,
    /// Minimum compute time [ns].
    pub min_ns: i64,
    /// Maximum compute time [ns].
    pub max_ns: i64,
    /// Running sum for average computation.
    pub sum_ns: i64,
    /// Running sum of squares for stddev computation.
    pub sum_sq_ns: i128,
    /// Ticks whose task-space inertia took the regularized path.
    pub regularized_ticks: u64,
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TickStats {
    pub const fn new() -> Self {
        Self {
            tick_count: 0,
            last_ns: 0,
            min_ns: i64::MAX,
            max_ns: 0,
            sum_ns: 0,
            sum_sq_ns: 0,
            regularized_ticks: 0,
        }
    }

    /// Record one tick. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, well_conditioned: bool) {
        self.tick_count += 1;
        self.last_ns = duration_ns;
        self.min_ns = self.min_ns.min(duration_ns);
        self.max_ns = self.max_ns.max(duration_ns);
        self.sum_ns += duration_ns;
        self.sum_sq_ns += (duration_ns as i128) * (duration_ns as i128);
        if !well_conditioned {
            self.regularized_ticks += 1;
        }
    }

    /// Average compute time [ns] (0 if no ticks).
    #[inline]
    pub fn avg_ns(&self) -> i64 {
        if self.tick_count == 0 {
            0
        } else {
            self.sum_ns / self.tick_count as i64
        }
    }

    /// Population standard deviation of the compute time [ns].
    pub fn stddev_ns(&self) -> f64 {
        if self.tick_count == 0 {
            return 0.0;
        }
        let n = self.tick_count as f64;
        let mean = self.sum_ns as f64 / n;
        let var = self.sum_sq_ns as f64 / n - mean * mean;
        var.max(0.0).sqrt()
    }
}

// ─── Settings & Report ──────────────────────────────────────────────

/// What to simulate.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Number of control ticks.
    pub ticks: u64,
    /// Tick period [s].
    pub dt: f64,
    /// Task target held for the whole run.
    pub target: TaskTarget,
    /// Constant unmodelled joint torque.
    pub disturbance: Option<DVector<f64>>,
    /// Progress log period in ticks (0 = silent).
    pub log_interval: u64,
}

/// Outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub ticks: u64,
    /// Final position of the controlled point [m].
    pub final_pose: [f64; 3],
    /// Final `|pose - target|` [m].
    pub final_error: f64,
    /// Final joint angles [rad].
    pub final_q: Vec<f64>,
    pub stats: TickStats,
}

// ─── Plant ──────────────────────────────────────────────────────────

/// Advance the plant by `dt` under torque `tau`.
///
/// Semi-implicit Euler: velocity first, then position with the new
/// velocity. A singular mass matrix is solved with the regularized inverse.
pub fn plant_step<M: RobotModel + ?Sized>(
    model: &M,
    joints: &mut JointState,
    tau: &DVector<f64>,
    disturbance: Option<&DVector<f64>>,
    dt: f64,
) {
    let m = model.mass_matrix(&joints.q);
    let mut rhs = tau + model.gravity(&joints.q) + model.coriolis(&joints.q, &joints.dq);
    if let Some(d) = disturbance {
        rhs += d;
    }

    let qdd = match m.clone().lu().solve(&rhs) {
        Some(qdd) if qdd.iter().all(|v| v.is_finite()) => qdd,
        _ => regularized_inverse(&m) * &rhs,
    };

    joints.dq += qdd * dt;
    joints.q += &joints.dq * dt;
}

// ─── Simulation ─────────────────────────────────────────────────────

/// Controller and plant sharing one robot model.
pub struct Simulation<M: RobotModel + Clone> {
    controller: OperationalSpaceController<M>,
    plant: M,
    joints: JointState,
    settings: RunSettings,
    stats: TickStats,
}

impl<M: RobotModel + Clone> Simulation<M> {
    pub fn new(model: M, config: &OscConfig, settings: RunSettings, initial: JointState) -> OscResult<Self> {
        if !settings.dt.is_finite() || settings.dt <= 0.0 {
            return Err(OscError::InvalidGain {
                name: "dt",
                value: settings.dt,
                reason: "must be finite and > 0",
            });
        }
        let n = model.n_joints();
        if let Some(d) = &settings.disturbance {
            if d.len() != n {
                return Err(OscError::DimensionMismatch {
                    what: "disturbance",
                    expected: n,
                    actual: d.len(),
                });
            }
        }
        initial.check(n)?;

        let plant = model.clone();
        let controller = OperationalSpaceController::new(model, config)?;
        Ok(Self {
            controller,
            plant,
            joints: initial,
            settings,
            stats: TickStats::new(),
        })
    }

    /// Run one tick and return the applied command.
    pub fn step(&mut self, adapter: Option<&mut (dyn DynamicsAdaptation + '_)>) -> OscResult<ControlOutput> {
        let start = Instant::now();
        let mut output = self.controller.generate(&self.joints, &self.settings.target)?;
        let elapsed = start.elapsed().as_nanos() as i64;

        if let Some(adapter) = adapter {
            apply_correction(adapter, &self.joints, &mut output)?;
        }

        plant_step(
            &self.plant,
            &mut self.joints,
            &output.torque,
            self.settings.disturbance.as_ref(),
            self.settings.dt,
        );
        self.stats
            .record(elapsed, output.diagnostics.inertia.is_well_conditioned());

        let tick = self.stats.tick_count;
        if self.settings.log_interval > 0 && tick % self.settings.log_interval == 0 {
            let pose = output.diagnostics.pose;
            info!(
                "tick {tick}: |e|={:.4} m pose=[{:.3}, {:.3}, {:.3}] avg={} ns",
                output.diagnostics.error.norm(),
                pose.x,
                pose.y,
                pose.z,
                self.stats.avg_ns(),
            );
        }

        Ok(output)
    }

    /// Run the configured number of ticks.
    pub fn run(&mut self, mut adapter: Option<&mut (dyn DynamicsAdaptation + '_)>) -> OscResult<SimReport> {
        for _ in 0..self.settings.ticks {
            self.step(adapter.as_deref_mut())?;
        }
        Ok(self.report())
    }

    /// Summary of the state reached so far.
    pub fn report(&self) -> SimReport {
        let target = &self.settings.target;
        let pose: Vector3<f64> = self.plant.pose(target.frame, &self.joints.q, &target.offset);
        SimReport {
            ticks: self.stats.tick_count,
            final_pose: pose.into(),
            final_error: (pose - target.position).norm(),
            final_q: self.joints.q.iter().copied().collect(),
            stats: self.stats.clone(),
        }
    }

    #[inline]
    pub fn joints(&self) -> &JointState {
        &self.joints
    }

    #[inline]
    pub fn controller(&self) -> &OperationalSpaceController<M> {
        &self.controller
    }

    #[inline]
    pub fn stats(&self) -> &TickStats {
        &self.stats
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

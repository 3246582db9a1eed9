//! Controller configuration and resolved control parameters.
//!
//! [`OscConfig`] is the serde-facing construction-time configuration.
//! [`ControlParameters`] is the immutable value the control law reads every
//! tick: derived gains are computed once and stage switches are folded
//! into [`Compensation`] flags.
//!
//! Zero disables a component (`ki = 0` → no integral term, `vmax = 0` →
//! no velocity limiting).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, Validate};
use crate::consts::{CONTROLLER_SOURCE, DEFAULT_KP, DEFAULT_VMAX, NULL_SPACE_GAIN_RATIO};
use crate::error::OscError;

bitflags! {
    /// Optional stages of the control law.
    ///
    /// Checked in composition order: Jacobian derivative → Coriolis →
    /// gravity → null space.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Compensation: u8 {
        /// Subtract `dJ/dt · dq` from the task-space force.
        const JACOBIAN_DERIVATIVE = 0x01;
        /// Subtract the Coriolis/centripetal torque.
        const CORIOLIS            = 0x02;
        /// Subtract the gravity torque.
        const GRAVITY             = 0x04;
        /// Add the rest-pose objective through the null-space filter.
        const NULL_SPACE          = 0x08;
    }
}

impl Default for Compensation {
    fn default() -> Self {
        Self::GRAVITY | Self::NULL_SPACE
    }
}

/// Task-space velocity saturation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityLimit {
    /// Pure proportional law with momentum cancellation.
    Disabled,
    /// Approach velocity capped at the given speed [m/s].
    Limited(f64),
}

impl VelocityLimit {
    /// The cap, if any.
    #[inline]
    pub fn vmax(&self) -> Option<f64> {
        match self {
            Self::Disabled => None,
            Self::Limited(v) => Some(*v),
        }
    }
}

/// Construction-time controller configuration.
///
/// # TOML Example
///
/// ```toml
/// [controller]
/// kp = 200.0
/// # kv defaults to sqrt(kp)
/// ki = 0.0
/// vmax = 0.5          # 0.0 disables velocity limiting
/// null_control = true
/// use_gravity = true
/// use_coriolis = false
/// use_jacobian_derivative = false
/// # initial_integrated_error = [0.0, 0.0, 0.0]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OscConfig {
    /// Proportional gain.
    #[serde(default = "default_kp")]
    pub kp: f64,
    /// Derivative gain (`None` → `sqrt(kp)`).
    #[serde(default)]
    pub kv: Option<f64>,
    /// Integral gain (0 = disabled).
    #[serde(default)]
    pub ki: f64,
    /// Task-space velocity cap [m/s] (0 = disabled).
    #[serde(default = "default_vmax")]
    pub vmax: f64,
    /// Drive redundant joints toward the rest pose in the null space.
    #[serde(default = "default_true")]
    pub null_control: bool,
    /// Subtract the gravity torque.
    #[serde(default = "default_true")]
    pub use_gravity: bool,
    /// Subtract the Coriolis/centripetal torque.
    #[serde(default)]
    pub use_coriolis: bool,
    /// Subtract the `dJ/dt · dq` term.
    #[serde(default)]
    pub use_jacobian_derivative: bool,
    /// Resumed integral accumulator state.
    #[serde(default)]
    pub initial_integrated_error: Option<[f64; 3]>,
}

fn default_kp() -> f64 {
    DEFAULT_KP
}
fn default_vmax() -> f64 {
    DEFAULT_VMAX
}
fn default_true() -> bool {
    true
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            kp: DEFAULT_KP,
            kv: None,
            ki: 0.0,
            vmax: DEFAULT_VMAX,
            null_control: true,
            use_gravity: true,
            use_coriolis: false,
            use_jacobian_derivative: false,
            initial_integrated_error: None,
        }
    }
}

impl OscConfig {
    /// Check gain bounds.
    ///
    /// Rejects anything that would produce NaN downstream: non-positive
    /// `kp`/`kv`, negative `ki`/`vmax`, or any non-finite value.
    pub fn check(&self) -> Result<(), OscError> {
        if !self.kp.is_finite() || self.kp <= 0.0 {
            return Err(OscError::InvalidGain {
                name: "kp",
                value: self.kp,
                reason: "must be finite and > 0",
            });
        }
        if let Some(kv) = self.kv {
            if !kv.is_finite() || kv <= 0.0 {
                return Err(OscError::InvalidGain {
                    name: "kv",
                    value: kv,
                    reason: "must be finite and > 0",
                });
            }
        }
        if !self.ki.is_finite() || self.ki < 0.0 {
            return Err(OscError::InvalidGain {
                name: "ki",
                value: self.ki,
                reason: "must be finite and >= 0",
            });
        }
        if !self.vmax.is_finite() || self.vmax < 0.0 {
            return Err(OscError::InvalidGain {
                name: "vmax",
                value: self.vmax,
                reason: "must be finite and >= 0 (0 disables)",
            });
        }
        if let Some(err) = self.initial_integrated_error {
            if err.iter().any(|v| !v.is_finite()) {
                return Err(OscError::NonFinite {
                    what: "initial_integrated_error",
                });
            }
        }
        Ok(())
    }

    /// Stage flags selected by the boolean switches.
    pub fn compensation(&self) -> Compensation {
        let mut flags = Compensation::empty();
        flags.set(Compensation::JACOBIAN_DERIVATIVE, self.use_jacobian_derivative);
        flags.set(Compensation::CORIOLIS, self.use_coriolis);
        flags.set(Compensation::GRAVITY, self.use_gravity);
        flags.set(Compensation::NULL_SPACE, self.null_control);
        flags
    }
}

impl Validate for OscConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.check()
            .map_err(|e| ConfigError::ValidationError(format!("controller: {e}")))
    }
}

/// Immutable, fully-resolved control parameters.
///
/// Doubles as the read-only introspection surface: it serializes to a flat
/// record suitable for logging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlParameters {
    /// Controller identifier.
    pub source: &'static str,
    /// Proportional gain.
    pub kp: f64,
    /// Derivative gain.
    pub kv: f64,
    /// Integral gain (0 = disabled).
    pub ki: f64,
    /// Velocity saturation.
    pub velocity_limit: VelocityLimit,
    /// `kp / kv`.
    pub lambda: f64,
    /// Null-space proportional gain, `0.1 · kp`.
    pub nkp: f64,
    /// Null-space derivative gain, `sqrt(nkp)`.
    pub nkv: f64,
    /// Enabled optional stages.
    pub compensation: Compensation,
}

impl ControlParameters {
    /// Validate `config` and derive all secondary gains.
    pub fn resolve(config: &OscConfig) -> Result<Self, OscError> {
        config.check()?;

        let kp = config.kp;
        let kv = config.kv.unwrap_or_else(|| kp.sqrt());
        let nkp = kp * NULL_SPACE_GAIN_RATIO;
        let velocity_limit = if config.vmax > 0.0 {
            VelocityLimit::Limited(config.vmax)
        } else {
            VelocityLimit::Disabled
        };

        Ok(Self {
            source: CONTROLLER_SOURCE,
            kp,
            kv,
            ki: config.ki,
            velocity_limit,
            lambda: kp / kv,
            nkp,
            nkv: nkp.sqrt(),
            compensation: config.compensation(),
        })
    }

    /// Returns true if the given stage is enabled.
    #[inline]
    pub fn uses(&self, stage: Compensation) -> bool {
        self.compensation.contains(stage)
    }

    /// Returns true if the integral term is active.
    #[inline]
    pub fn has_integral(&self) -> bool {
        self.ki != 0.0
    }
}

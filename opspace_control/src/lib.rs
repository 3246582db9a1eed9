//! # Operational-Space Control Library
//!
//! Computes, once per control tick, the joint torques that drive a
//! manipulator's controlled point toward a task-space target, with
//! velocity limiting, optional dynamics compensation and a null-space
//! rest-pose objective for redundant joints.
//!
//! ## Pipeline
//!
//! 1. **Model query**: pose, Jacobian, mass matrix, gravity, Coriolis
//! 2. **Task-space inertia**: `Mx = (J M⁻¹ Jᵀ)⁻¹`, regularized on singularity
//! 3. **Task force**: velocity-limited position law, `dJ·dq`, integral, external force
//! 4. **Composer**: `Jᵀ Mx f`, momentum/Coriolis/gravity terms, training signal
//! 5. **Null space**: rest-pose torque through the dynamically consistent filter
//!
//! ## Determinism
//!
//! The law performs no I/O and no blocking. The only state that outlives a
//! tick is the integral accumulator and the held null-space velocity, both
//! owned by one [`controller::OperationalSpaceController`].

pub mod adaptation;
pub mod config;
pub mod control;
pub mod controller;
pub mod model;
pub mod planar;
pub mod sim;
pub mod task;

pub use controller::OperationalSpaceController;
pub use model::RobotModel;
pub use task::{JointState, TaskTarget};

//! Control law root.
//!
//! Operational-space control: task-space inertia, velocity-limited position
//! force, integral and dynamics terms, null-space rest-pose objective.
//! Optional stages are switched by [`Compensation`] flags and zero gains.
//!
//! [`Compensation`]: opspace_common::control::Compensation

pub mod dynamics;
pub mod inertia;
pub mod integral;
pub mod null_space;
pub mod output;
pub mod velocity;

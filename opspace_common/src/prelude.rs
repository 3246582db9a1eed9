//! Prelude module for common re-exports.
//!
//! ```rust
//! use opspace_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig, Validate};

// ─── Control Parameters ─────────────────────────────────────────────
pub use crate::control::{Compensation, ControlParameters, OscConfig, VelocityLimit};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{OscError, OscResult};

// ─── Frames & Constants ─────────────────────────────────────────────
pub use crate::consts::TASK_DIM;
pub use crate::frame::ReferenceFrame;

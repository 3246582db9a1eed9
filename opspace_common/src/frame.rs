//! Reference frame selector for the controlled point.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame in which the controlled point (plus its offset) is expressed.
///
/// Link and joint indices are zero-based.
///
/// # TOML Example
///
/// ```toml
/// frame = "end_effector"
/// # or
/// frame = { link = 1 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceFrame {
    /// Tip of the last link.
    #[default]
    EndEffector,
    /// Distal end of link `i`.
    Link(usize),
    /// Origin of joint `i`.
    Joint(usize),
}

impl fmt::Display for ReferenceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndEffector => write!(f, "EE"),
            Self::Link(i) => write!(f, "link{i}"),
            Self::Joint(i) => write!(f, "joint{i}"),
        }
    }
}

//! Operational-Space Control Common Library
//!
//! Shared constants, configuration loading, controller parameter types and
//! the error taxonomy used by every crate in the workspace.
//!
//! # Module Structure
//!
//! - [`config`] - TOML loading traits and shared config fields
//! - [`consts`] - Defaults and numeric thresholds
//! - [`control`] - Controller configuration and resolved parameters
//! - [`error`] - `OscError` and result alias
//! - [`frame`] - Reference frame selector
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use opspace_common::prelude::*;
//!
//! let params = ControlParameters::resolve(&OscConfig::default()).unwrap();
//! assert!(params.uses(Compensation::GRAVITY));
//! ```

pub mod config;
pub mod consts;
pub mod control;
pub mod error;
pub mod frame;
pub mod prelude;

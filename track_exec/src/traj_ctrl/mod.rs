//! # Trajectory control module
//!
//! Trajectory control keeps the robot on the reference path. Each tick it
//! locates the robot's operating point on the path (nearest segment, local
//! goal cut, signed cross-track error), then produces a velocity command
//! from a time-optimal longitudinal profile and a PD-like lateral/heading
//! feedback with an angular feed-forward from the path curvature.
//!
//! Both command channels pass through a [`VelAccLimiter`], so the published
//! velocities respect the configured velocity and acceleration bounds
//! regardless of which control branch produced them. When the heading error
//! grows beyond the rotate threshold, or the remaining path is too short to
//! track, the module stops and turns in place instead of following.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod limiter;
pub mod params;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use limiter::{time_optimal_control, VelAccLimiter};
pub use params::Params;
pub use state::*;

use crate::path::PathError;
use util::params as util_params;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Euclidean search range for the nearest-segment query once the tracker has
/// engaged the path. The first engagement scans the whole path.
pub const NEAREST_SEARCH_RANGE_M: f64 = 1.0;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur during processing of the module.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(#[from] util_params::LoadError),

    /// The tick time step must be positive and finite.
    #[error("Invalid time step: {0}")]
    InvalidDt(f64),

    /// The received path could not be built.
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathError),
}

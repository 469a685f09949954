//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control.
///
/// An instance is an immutable snapshot: the controller reads one snapshot
/// for the whole of a tick, and replacements only take effect between ticks.
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Aim-ahead time used to place the control origin in front of the
    /// robot, in seconds
    pub look_forward: f64,

    /// Arc length window over which path curvature is estimated, in meters
    pub curv_forward: f64,

    /// Gain on the cross-track error
    pub k_dist: f64,

    /// Gain on the heading error
    pub k_ang: f64,

    /// Gain on the angular velocity error
    pub k_avel: f64,

    /// Reference speed for scheduling `k_ang` with the segment speed, 0
    /// disables scheduling
    pub gain_at_vel: f64,

    /// Symmetric clip applied to the cross-track error before the control
    /// law, in meters
    pub dist_lim: f64,

    /// Cross-track distance beyond which tracking aborts, in meters
    pub dist_stop: f64,

    /// Heading error threshold that forces a stop-and-rotate, in radians
    pub rotate_ang: f64,

    /// Maximum linear velocity in meters/second
    pub max_vel: f64,

    /// Maximum angular velocity in radians/second
    pub max_angvel: f64,

    /// Maximum linear acceleration in meters/second^2
    pub max_acc: f64,

    /// Maximum angular acceleration in radians/second^2
    pub max_angacc: f64,

    /// Fraction of `max_acc` used by the time-optimal braking profile
    pub acc_toc_factor: f64,

    /// Fraction of `max_angacc` used by the time-optimal braking profile
    pub angacc_toc_factor: f64,

    /// Stride applied when transforming the path into the robot frame
    pub path_step: usize,

    /// Distance and angle tolerances for declaring the goal reached
    pub goal_tolerance_dist: f64,
    pub goal_tolerance_ang: f64,

    /// Distance and angle tolerances for declaring the robot stopped, these
    /// also trigger the rotate branch near the end of a segment
    pub stop_tolerance_dist: f64,
    pub stop_tolerance_ang: f64,

    /// Path length below which position tracking is bypassed, in meters
    pub no_position_control_dist: f64,

    /// Path length below which the rotate branch is forced, in meters
    pub min_tracking_path: f64,

    /// Permit reverse travel along the path
    pub allow_backward: bool,

    /// Scale the linear velocity so the curvature feed-forward respects
    /// `max_angvel`
    pub limit_vel_by_avel: bool,

    /// Minimum translation for two path poses to form an edge, in meters
    pub epsilon: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Linear braking acceleration for the time-optimal profile.
    pub fn acc_toc(&self) -> f64 {
        self.max_acc * self.acc_toc_factor
    }

    /// Angular braking acceleration for the time-optimal profile.
    pub fn angacc_toc(&self) -> f64 {
        self.max_angacc * self.angacc_toc_factor
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            look_forward: 0.5,
            curv_forward: 0.5,
            k_dist: 1.0,
            k_ang: 1.0,
            k_avel: 0.1,
            gain_at_vel: 0.0,
            dist_lim: 0.5,
            dist_stop: 2.0,
            rotate_ang: std::f64::consts::FRAC_PI_4,
            max_vel: 0.5,
            max_angvel: 1.0,
            max_acc: 1.0,
            max_angacc: 2.0,
            acc_toc_factor: 0.9,
            angacc_toc_factor: 0.9,
            path_step: 1,
            goal_tolerance_dist: 0.2,
            goal_tolerance_ang: 0.1,
            stop_tolerance_dist: 0.1,
            stop_tolerance_ang: 0.05,
            no_position_control_dist: 0.05,
            min_tracking_path: 0.05,
            allow_backward: true,
            limit_vel_by_avel: false,
            epsilon: 0.001,
        }
    }
}

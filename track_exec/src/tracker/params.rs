//! Tracker loop parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the tracker loop.
#[derive(Deserialize, Debug, Clone)]
pub struct TrackerParams {
    /// The robot body frame
    pub frame_robot: String,

    /// The odometry frame
    pub frame_odom: String,

    /// Control rate in timed mode, in hertz
    pub hz: f64,

    /// Drive the controller from odometry messages instead of the timer
    pub use_odom: bool,

    /// Forward-integrate the reported odometry pose by the message latency
    pub predict_odom: bool,

    /// Upper bound on the tick time step and the prediction horizon, in
    /// seconds
    pub max_dt: f64,

    /// Warn when the robot-to-path transform is older than the staleness
    /// bound
    pub check_old_path: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            frame_robot: "base_link".into(),
            frame_odom: "odom".into(),
            hz: 50.0,
            use_odom: false,
            predict_odom: true,
            max_dt: 0.2,
            check_old_path: false,
        }
    }
}

//! # Data Store

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;

use crate::traj_ctrl::TrajCtrl;
use nav_if::msg::TrackingStatus;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    // Trajectory control
    pub traj_ctrl: TrajCtrl,

    /// Most recently published tracking status, used to log transitions
    pub last_status: Option<TrackingStatus>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Record a published status, logging the transition if it changed.
    pub fn record_status(&mut self, status: TrackingStatus) {
        if self.last_status != Some(status) {
            info!("Tracking status: {:?}", status);
            self.last_status = Some(status);
        }
    }
}

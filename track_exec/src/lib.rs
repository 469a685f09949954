//! # Tracker library.
//!
//! This library exposes the tracker's modules so that other crates in the
//! workspace, and the tests, can access the items defined inside the
//! executable crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command server - publishes velocity commands to the base controller
pub mod cmd_server;

/// Global data store for the executable
pub mod data_store;

/// Localisation - planar transforms and the frame buffer
pub mod loc;

/// Navigation client - receives paths, odometry, transforms and overrides
pub mod nav_client;

/// Path representation, normalisation and geometry queries
pub mod path;

/// Telemetry server - publishes status and tracking diagnostics
pub mod tm_server;

/// Tracker loop - drives the controller from the timer or from odometry
pub mod tracker;

/// Trajectory control - the control law and motion limiting
pub mod traj_ctrl;

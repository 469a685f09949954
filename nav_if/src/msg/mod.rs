//! # Message definitions
//!
//! The messages exchanged between the tracker and its peers. Inbound
//! messages (paths, odometry, speed overrides and transforms) are wrapped in
//! the [`NavMsg`] enum so that a single subscriber socket can ingest all of
//! them. Outbound messages (velocity commands, status, tracking diagnostics)
//! are published individually under their own topics.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Topics under which the tracker publishes its outputs.
pub mod topic {
    /// Velocity command stream
    pub const CMD_VEL: &str = "cmd_vel";

    /// Tracking status stream
    pub const STATUS: &str = "status";

    /// Tracking diagnostic stream
    pub const TRACKING: &str = "tracking";
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Common message header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Sequence number of this message
    pub seq: u32,

    /// Time at which the message was generated
    pub stamp: Option<DateTime<Utc>>,

    /// The coordinate frame this message is expressed in
    pub frame_id: String,
}

/// A pose on the 2D plane.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose2DMsg {
    /// Position in meters
    pub position: Vector2<f64>,

    /// Heading (angle to the frame's +X axis) in radians
    pub yaw: f64,
}

/// A pose tagged with a desired linear speed.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseWithVelocityMsg {
    /// The pose itself
    pub pose: Pose2DMsg,

    /// Desired linear speed at this pose in meters/second, or `None` to use
    /// the tracker's configured default. Must be non-negative when present.
    pub velocity: Option<f64>,
}

/// A reference path as an ordered sequence of poses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathMsg {
    pub header: Header,
    pub poses: Vec<Pose2DMsg>,
}

/// A reference path whose poses carry desired linear speeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathWithVelocityMsg {
    pub header: Header,
    pub poses: Vec<PoseWithVelocityMsg>,
}

/// A body-frame twist on the 2D plane.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist2DMsg {
    /// Linear velocity along the body +X axis in meters/second
    pub linear: f64,

    /// Angular velocity about the body +Z axis in radians/second
    pub angular: f64,
}

/// An odometry sample: the robot pose in the odometry frame plus the
/// body-frame twist measured at the same instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdomMsg {
    /// Header, `frame_id` is the odometry frame
    pub header: Header,

    /// The robot body frame
    pub child_frame_id: String,

    /// Pose of `child_frame_id` in `header.frame_id`
    pub pose: Pose2DMsg,

    /// Body-frame twist of the robot
    pub twist: Twist2DMsg,
}

/// A transform between two frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformMsg {
    /// Header, `frame_id` is the parent frame
    pub header: Header,

    /// The child frame
    pub child_frame_id: String,

    /// Pose of `child_frame_id` in `header.frame_id`
    pub transform: Pose2DMsg,
}

/// Overrides the tracker's default linear speed until the next parameter
/// update.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct SpeedMsg {
    /// The new default speed in meters/second, must be finite and
    /// non-negative
    pub speed: f64,
}

/// The velocity command emitted to the base controller.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwistCmd {
    /// Linear velocity demand in meters/second
    pub linear_x: f64,

    /// Angular velocity demand in radians/second
    pub angular_z: f64,
}

/// Tracking status report published once per control tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMsg {
    pub header: Header,

    /// Header of the path currently being tracked
    pub path_header: Option<Header>,

    /// Remaining distance to the end of the path in meters
    pub distance_remains: f64,

    /// Remaining heading error in radians
    pub angle_remains: f64,

    /// Tracker state classification
    pub status: TrackingStatus,
}

/// Diagnostic output giving the operating point on the path: the foot of the
/// perpendicular in the robot frame, with the path tangent as heading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingMsg {
    /// Header, `frame_id` is the robot body frame
    pub header: Header,

    /// Foot point and signed path heading in the robot frame
    pub pose: Pose2DMsg,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Classification of the tracker's state with respect to the current path.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingStatus {
    /// No path is loaded, or the robot's pose on the path cannot be
    /// established
    NoPath,

    /// The robot's cross-track distance exceeds the abort threshold
    FarFromPath,

    /// The robot is actively tracking the path
    Following,

    /// The robot has reached the end of the path within tolerance
    Goal,
}

/// All messages the tracker ingests, tagged for a single subscriber socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NavMsg {
    /// A new reference path
    Path(PathMsg),

    /// A new reference path with per-pose speeds
    PathWithVelocity(PathWithVelocityMsg),

    /// Default speed override
    Speed(SpeedMsg),

    /// Odometry sample
    Odometry(OdomMsg),

    /// Frame transform update
    Transform(TransformMsg),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for TrackingStatus {
    fn default() -> Self {
        TrackingStatus::NoPath
    }
}

impl TwistCmd {
    /// The zero (stop) command.
    pub fn zero() -> Self {
        Self::default()
    }
}

impl Header {
    /// Create a header stamped with the current time.
    pub fn stamped_now(frame_id: &str) -> Self {
        Self {
            seq: 0,
            stamp: Some(Utc::now()),
            frame_id: frame_id.into(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

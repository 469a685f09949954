//! # Tracker loop module
//!
//! Drives the trajectory controller from either a fixed-rate timer or the
//! odometry stream, sourcing the robot-in-path-frame transform for each tick
//! and wrapping the controller's output into the wire messages.
//!
//! Both modes funnel into the same control entry point, they only differ in
//! how the time step and the robot pose are obtained. In odometry mode the
//! reported pose can be forward-integrated by the message latency using the
//! reported body twist, so the controller acts on where the robot is now
//! rather than where it was when the message was stamped.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::Utc;
use log::{error, warn};
use nalgebra::{Isometry2, Vector2};
use std::time::Duration;

// Internal
pub use params::TrackerParams;

use crate::loc::{StampedTransform, TfBuffer};
use crate::path::PathVertex;
use crate::traj_ctrl::TrajCtrl;
use nav_if::msg::{
    Header, NavMsg, OdomMsg, PathMsg, PathWithVelocityMsg, Pose2DMsg, StatusMsg, TrackingMsg,
    TrackingStatus, TransformMsg, TwistCmd,
};
use util::logger::Throttle;
use util::module::State;
use util::time::duration_to_seconds;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Transforms older than this are reported as stale when `check_old_path`
/// is set.
const STALE_TRANSFORM_S: f64 = 0.1;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The tracker loop state.
pub struct Tracker {
    params: TrackerParams,

    /// Buffer of the most recent transforms, fed by odometry and transform
    /// messages
    tf: TfBuffer,

    /// Stamp of the previous odometry message, for the odometry-driven time
    /// step
    prev_odom_stamp: Option<chrono::DateTime<Utc>>,

    /// Throttles for per-tick fault logging
    stale_log: Throttle,
    path_log: Throttle,
}

/// Everything one tick wants published.
pub struct TickOutput {
    /// Velocity command, `None` when actuation must be skipped this tick
    pub cmd: Option<TwistCmd>,

    /// Status report
    pub status: StatusMsg,

    /// Operating point diagnostic
    pub tracking: Option<TrackingMsg>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tracker {
    /// Create a new tracker loop with the given parameters.
    pub fn new(params: TrackerParams) -> Self {
        Self {
            params,
            tf: TfBuffer::default(),
            prev_odom_stamp: None,
            stale_log: Throttle::new(Duration::from_secs(1)),
            path_log: Throttle::new(Duration::from_secs(1)),
        }
    }

    /// True when the loop is driven by odometry rather than the timer.
    pub fn odom_driven(&self) -> bool {
        self.params.use_odom
    }

    /// Timer period for timed mode.
    pub fn cycle_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.params.hz)
    }

    /// Ingest one navigation message, returning a tick output when the
    /// message drove a control tick (odometry messages in odometry mode).
    pub fn handle_msg(&mut self, msg: &NavMsg, traj: &mut TrajCtrl) -> Option<TickOutput> {
        match msg {
            NavMsg::Path(path) => {
                self.ingest_path(path, traj);
                None
            }
            NavMsg::PathWithVelocity(path) => {
                self.ingest_path_with_velocity(path, traj);
                None
            }
            NavMsg::Speed(speed) => {
                traj.set_speed_override(speed.speed);
                None
            }
            NavMsg::Transform(tf) => {
                self.ingest_transform(tf);
                None
            }
            NavMsg::Odometry(odom) => self.handle_odometry(odom, traj),
        }
    }

    /// Run one timed-mode tick at the configured rate.
    pub fn timed_tick(&mut self, traj: &mut TrajCtrl) -> TickOutput {
        let dt = 1.0 / self.params.hz;

        let robot_to_odom = match self
            .tf
            .lookup(&self.params.frame_robot, &self.params.frame_odom)
        {
            Ok(tf) => tf,
            Err(e) => {
                warn!("Transform lookup failed: {}", e);
                return self.no_path_output(traj);
            }
        };

        self.control(robot_to_odom, dt, traj)
    }

    /// Process an odometry message: update the transform buffer and, in
    /// odometry mode, run a control tick from it.
    pub fn handle_odometry(&mut self, odom: &OdomMsg, traj: &mut TrajCtrl) -> Option<TickOutput> {
        if odom.header.frame_id != self.params.frame_odom {
            warn!(
                "frame_odom is invalid. Update from \"{}\" to \"{}\"",
                self.params.frame_odom, odom.header.frame_id
            );
            self.params.frame_odom = odom.header.frame_id.clone();
        }
        if odom.child_frame_id != self.params.frame_robot {
            warn!(
                "frame_robot is invalid. Update from \"{}\" to \"{}\"",
                self.params.frame_robot, odom.child_frame_id
            );
            self.params.frame_robot = odom.child_frame_id.clone();
        }

        let stamp = match odom.header.stamp {
            Some(s) => s,
            None => {
                warn!("Odometry message without a timestamp, ignored");
                return None;
            }
        };

        self.tf.insert(StampedTransform::from_pose(
            odom.pose.position,
            odom.pose.yaw,
            stamp,
            &self.params.frame_odom,
            &self.params.frame_robot,
        ));

        let mut output = None;

        if self.params.use_odom {
            if let Some(prev) = self.prev_odom_stamp {
                let dt = duration_to_seconds(stamp - prev)
                    .unwrap_or(0.0)
                    .min(self.params.max_dt);

                if dt > 0.0 {
                    let mut pose = odom.pose;
                    if self.params.predict_odom {
                        let predict_dt = duration_to_seconds(Utc::now() - stamp)
                            .unwrap_or(0.0)
                            .clamp(0.0, self.params.max_dt);
                        pose = predict_pose(&pose, odom.twist.linear, odom.twist.angular, predict_dt);
                    }

                    let odom_to_robot = StampedTransform::from_pose(
                        pose.position,
                        pose.yaw,
                        stamp,
                        &self.params.frame_odom,
                        &self.params.frame_robot,
                    );

                    output = Some(self.control(odom_to_robot.inverse(), dt, traj));
                }
            }
        }

        self.prev_odom_stamp = Some(stamp);

        output
    }

    /// Shared control entry point for both modes.
    ///
    /// Composes the robot-in-path-frame transform, checks its age, and runs
    /// one controller tick.
    fn control(
        &mut self,
        robot_to_odom: StampedTransform,
        dt: f64,
        traj: &mut TrajCtrl,
    ) -> TickOutput {
        // Without a path there is no path frame to resolve, let the
        // controller report NoPath through its own tick
        let path_frame = match traj.path_header() {
            Some(header) if traj.has_path() => header.frame_id.clone(),
            _ => {
                return self.proc_tick(Isometry2::identity(), dt, traj);
            }
        };

        let odom_to_path = match self.tf.lookup(&self.params.frame_odom, &path_frame) {
            Ok(tf) => tf,
            Err(e) => {
                warn!("Transform lookup failed: {}", e);
                return self.no_path_output(traj);
            }
        };

        let robot_to_path = robot_to_odom.compose(&odom_to_path);

        let delay = duration_to_seconds(Utc::now() - robot_to_path.stamp).unwrap_or(0.0);
        if delay.abs() > STALE_TRANSFORM_S && self.params.check_old_path && self.stale_log.ok() {
            error!("Timestamp of the transform is too old: {:.3} s", delay);
        }

        self.proc_tick(robot_to_path.iso, dt, traj)
    }

    /// Run the controller and wrap its output into wire messages.
    fn proc_tick(&mut self, robot_to_path: Isometry2<f64>, dt: f64, traj: &mut TrajCtrl) -> TickOutput {
        let input = crate::traj_ctrl::InputData { robot_to_path, dt };

        match traj.proc(&input) {
            Ok((out, report)) => TickOutput {
                cmd: Some(out.cmd),
                status: StatusMsg {
                    header: Header::stamped_now(&self.params.frame_robot),
                    path_header: report.path_header.clone(),
                    distance_remains: report.distance_remains,
                    angle_remains: report.angle_remains,
                    status: report.status,
                },
                tracking: out.tracking.map(|pose| TrackingMsg {
                    header: Header::stamped_now(&self.params.frame_robot),
                    pose: Pose2DMsg {
                        position: pose.pos,
                        yaw: pose.yaw,
                    },
                }),
            },
            Err(e) => {
                error!("Controller tick failed: {}", e);
                self.no_path_output(traj)
            }
        }
    }

    /// Ingest a plain path message.
    fn ingest_path(&mut self, msg: &PathMsg, traj: &mut TrajCtrl) {
        let vertices: Vec<PathVertex> = msg.poses.iter().map(PathVertex::from).collect();
        if let Err(e) = traj.set_path(msg.header.clone(), &vertices) {
            if self.path_log.ok() {
                error!("Path rejected: {}", e);
            }
        }
    }

    /// Ingest a path-with-velocity message.
    fn ingest_path_with_velocity(&mut self, msg: &PathWithVelocityMsg, traj: &mut TrajCtrl) {
        let vertices: Vec<PathVertex> = msg.poses.iter().map(PathVertex::from).collect();
        if let Err(e) = traj.set_path(msg.header.clone(), &vertices) {
            if self.path_log.ok() {
                error!("Path rejected: {}", e);
            }
        }
    }

    /// Ingest a transform message into the buffer.
    fn ingest_transform(&mut self, msg: &TransformMsg) {
        let stamp = msg.header.stamp.unwrap_or_else(Utc::now);
        self.tf.insert(StampedTransform::from_pose(
            msg.transform.position,
            msg.transform.yaw,
            stamp,
            &msg.header.frame_id,
            &msg.child_frame_id,
        ));
    }

    /// Output for a tick whose transform could not be resolved: NoPath
    /// status, actuation skipped.
    fn no_path_output(&self, traj: &TrajCtrl) -> TickOutput {
        TickOutput {
            cmd: None,
            status: StatusMsg {
                header: Header::stamped_now(&self.params.frame_robot),
                path_header: traj.path_header().cloned(),
                distance_remains: 0.0,
                angle_remains: 0.0,
                status: TrackingStatus::NoPath,
            },
            tracking: None,
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Forward-integrate a planar pose by a body-frame twist held constant over
/// `dt`.
fn predict_pose(pose: &Pose2DMsg, linear: f64, angular: f64, dt: f64) -> Pose2DMsg {
    let heading = Vector2::new(pose.yaw.cos(), pose.yaw.sin());
    Pose2DMsg {
        position: pose.position + heading * linear * dt,
        yaw: pose.yaw + angular * dt,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

//! Trajectory control module state and tick processing

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use nalgebra::{Isometry2, Point2, Vector2};
use serde::Serialize;
use std::time::Duration;

// Internal
use super::{
    limiter::{time_optimal_control, VelAccLimiter},
    Params, TrajCtrlError, NEAREST_SEARCH_RANGE_M,
};
use crate::path::{Path2D, PathBuilder, PathVertex, Pose2D};
use crate::path::line;
use nav_if::msg::{Header, TrackingStatus, TwistCmd};
use util::logger::Throttle;
use util::maths::wrap_pi;
use util::module::State;
use util::params;
use util::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory control module state.
///
/// Owns the current path, the per-channel limiters and the progress marker
/// along the path. All of it persists across ticks and resets when a new
/// path arrives.
pub struct TrajCtrl {
    params: Params,

    /// Default speed override, replaces the configured maximum velocity
    /// until the next parameter update
    speed_override: Option<f64>,

    /// The path currently being tracked
    path: Path2D,

    /// Header of the path message the current path was built from
    path_header: Option<Header>,

    /// Progress marker: index into the local path below which segments are
    /// no longer considered. Monotonic for the lifetime of a path.
    path_step_done: usize,

    /// Linear velocity limiter
    v_lim: VelAccLimiter,

    /// Angular velocity limiter
    w_lim: VelAccLimiter,

    /// Throttle for the stop-and-rotate notification
    rotate_log: Throttle,
}

/// Input data for one control tick.
pub struct InputData {
    /// Pose of the path frame in the robot frame, i.e. the transform taking
    /// path-frame points into robot-frame points
    pub robot_to_path: Isometry2<f64>,

    /// Time since the previous tick in seconds, must be positive and finite
    pub dt: f64,
}

/// Output command of one control tick.
#[derive(Debug, Clone, Serialize)]
pub struct OutputData {
    /// The velocity command to publish
    pub cmd: TwistCmd,

    /// Operating point diagnostic: the foot of the perpendicular in the
    /// robot frame with the signed path heading. `None` when the tick could
    /// not establish an operating point.
    pub tracking: Option<Pose2D>,
}

/// The status report containing the tracking state and progress quantities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// Header of the path being tracked
    pub path_header: Option<Header>,

    /// Remaining distance to the end of the path in meters
    pub distance_remains: f64,

    /// Remaining heading error in radians
    pub angle_remains: f64,

    /// Tracker state classification
    pub status: TrackingStatus,

    /// Index of the nearest segment endpoint in the local path
    pub nearest_idx: usize,

    /// Index of the local goal in the local path
    pub local_goal_idx: usize,

    /// Progress marker after this tick
    pub path_step_done: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TrajCtrl {
    fn default() -> Self {
        Self {
            params: Params::default(),
            speed_override: None,
            path: Path2D::default(),
            path_header: None,
            path_step_done: 0,
            v_lim: VelAccLimiter::default(),
            w_lim: VelAccLimiter::default(),
            rotate_log: Throttle::new(Duration::from_secs(1)),
        }
    }
}

impl State for TrajCtrl {
    type InitData = std::path::PathBuf;
    type InitError = TrajCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = TrajCtrlError;

    /// Initialise the TrajCtrl module.
    ///
    /// Expected init data is the path to the parameter file.
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), TrajCtrlError> {
        self.params = params::load(init_data)?;

        Ok(())
    }

    /// Perform one control tick.
    ///
    /// Produces the velocity command, the tracking diagnostic and the status
    /// report for the given robot-in-path-frame transform and time step.
    fn proc(&mut self, input: &InputData) -> Result<(OutputData, StatusReport), TrajCtrlError> {
        if !(input.dt.is_finite() && input.dt > 0.0) {
            return Err(TrajCtrlError::InvalidDt(input.dt));
        }

        // The parameters are cloned so the whole tick observes one snapshot
        let params = self.params.clone();
        let dt = input.dt;
        let max_vel = self.speed_override.unwrap_or(params.max_vel);

        let mut report = StatusReport {
            path_header: self.path_header.clone(),
            path_step_done: self.path_step_done,
            ..StatusReport::default()
        };

        // No path to track
        if self.path.is_empty() || self.path_header.is_none() {
            return Ok((self.stop_output(), report));
        }

        // Transform the path into the robot frame, applying the configured
        // stride
        let trans = &input.robot_to_path;
        let trans_yaw = trans.rotation.angle();
        let step = params.path_step.max(1);
        let mut local_poses = Vec::with_capacity(self.path.len() / step + 1);
        let mut i = 0;
        while i < self.path.len() {
            let pose = &self.path[i];
            local_poses.push(Pose2D::new(
                (trans * Point2::from(pose.pos)).coords,
                trans_yaw + pose.yaw,
                pose.velocity,
            ));
            i += step;
        }
        let lpath = Path2D::from_poses(local_poses);

        // The full path length is used rather than the local one so the
        // stride does not bias the short-path thresholds
        let path_length = self.path.length();

        // The control origin is placed ahead of the robot by the expected
        // travel over the look-forward horizon
        let predicted_yaw = self.w_lim.get() * params.look_forward / 2.0;
        let origin = Vector2::new(predicted_yaw.cos(), predicted_yaw.sin())
            * self.v_lim.get()
            * params.look_forward;

        // Cut the tracked range at the local goal
        let i_local_goal =
            lpath.find_local_goal(self.path_step_done, lpath.len(), params.allow_backward);
        report.local_goal_idx = i_local_goal;

        // Find the nearest segment. After first engagement the search is
        // restricted so a self-crossing path cannot tear the operating point
        // forward.
        let max_search_range = if self.path_step_done > 0 {
            NEAREST_SEARCH_RANGE_M
        } else {
            0.0
        };
        let nearest = lpath.find_nearest(
            self.path_step_done,
            i_local_goal,
            &origin,
            max_search_range,
            params.epsilon,
        );

        let i_nearest = match nearest {
            Some(i) => i,
            // No segment remains in the tracked range: only an in-place
            // rotation toward the commanded terminal yaw is left
            None if i_local_goal <= self.path_step_done + 1 => i_local_goal - 1,
            None => {
                debug!("No nearest segment found, dropping to NO_PATH");
                return Ok((self.stop_output(), report));
            }
        };
        report.nearest_idx = i_nearest;

        // Operating point on the nearest segment
        let i_prev = i_nearest.saturating_sub(1);
        let pose_prev = lpath[i_prev];
        let pose_near = lpath[i_nearest];
        let vec = pose_near.pos - pose_prev.pos;
        let in_place_turning = vec.norm_squared() == 0.0;

        let foot = if in_place_turning {
            pose_near.pos
        } else {
            line::projection(&pose_prev.pos, &pose_near.pos, &origin)
        };

        let v_seg = pose_near.velocity.unwrap_or(max_vel);

        let mut remain_local = lpath.remained_distance(0, i_nearest, i_local_goal, &foot);
        let mut remain = lpath.remained_distance(0, i_nearest, lpath.len(), &foot);
        if path_length < params.no_position_control_dist {
            remain = 0.0;
            remain_local = 0.0;
        }

        // Signed cross-track error at the control origin
        let dist_err = if in_place_turning {
            0.0
        } else {
            line::line_distance(&pose_prev.pos, &pose_near.pos, &origin)
        };

        // Heading error relative to the segment, flipping the travel
        // direction when the pose heading opposes the edge direction
        let mut angle = -vec[1].atan2(vec[0]);
        let angle_pose = if params.allow_backward {
            pose_near.yaw
        } else {
            -angle
        };
        let mut sign_vel = 1.0;
        if (-angle).cos() * angle_pose.cos() + (-angle).sin() * angle_pose.sin() < 0.0 {
            sign_vel = -1.0;
            angle += std::f64::consts::PI;
        }
        let mut angle = wrap_pi(angle);

        let curv = lpath.curvature(i_nearest, i_local_goal, &foot, params.curv_forward);

        report.distance_remains = remain;
        report.angle_remains = angle;

        debug!(
            "nearest: {}, local goal: {}, done: {}, size: {}, remain: {:.3}, remain_local: {:.3}",
            i_nearest,
            i_local_goal,
            self.path_step_done,
            lpath.len(),
            remain,
            remain_local
        );

        let mut arrive_local_goal = false;

        // Stop and rotate in place, or follow the path. The rotate guard
        // must stay as a cosine comparison to keep its wrap-around
        // behaviour.
        let large_angle_error =
            params.rotate_ang.abs() < std::f64::consts::PI
                && params.rotate_ang.cos() > angle.cos();

        if large_angle_error
            || remain_local.abs() < params.stop_tolerance_dist
            || path_length < params.min_tracking_path
            || in_place_turning
        {
            if large_angle_error && self.rotate_log.ok() {
                info!("Stop and rotate due to large angular error: {:.3}", angle);
            }

            if path_length < params.min_tracking_path
                || remain_local.abs() < params.stop_tolerance_dist
                || in_place_turning
            {
                // Align to the commanded yaw at the local goal
                angle = wrap_pi(-lpath[i_local_goal - 1].yaw);
                report.angle_remains = angle;
                if i_local_goal != lpath.len() {
                    arrive_local_goal = true;
                }
            }

            self.v_lim.set(0.0, v_seg, params.max_acc, dt);
            self.w_lim.set(
                time_optimal_control(angle + self.w_lim.get() * dt * 1.5, params.angacc_toc()),
                params.max_angvel,
                params.max_angacc,
                dt,
            );

            if path_length < params.stop_tolerance_dist || in_place_turning {
                report.distance_remains = 0.0;
            }
        } else {
            // At the edges of the path the cross-track error degenerates to
            // the endpoint distance
            let mut dist_from_path = dist_err;
            if i_nearest == 0 || i_nearest + 1 >= lpath.len() {
                dist_from_path = -(pose_near.pos - origin).norm();
            }

            if dist_from_path.abs() > params.dist_stop {
                report.status = TrackingStatus::FarFromPath;
                // The path and the limiter state are kept so tracking can
                // resume if the robot comes back
                return Ok((
                    OutputData {
                        cmd: TwistCmd::zero(),
                        tracking: None,
                    },
                    report,
                ));
            }

            // Path following control
            let dist_err_clip = dist_err.clamp(-params.dist_lim, params.dist_lim);

            self.v_lim.set(
                time_optimal_control(-remain_local * sign_vel, params.acc_toc()),
                v_seg,
                params.max_acc,
                dt,
            );

            let mut wref = self.v_lim.get().abs() * curv;

            if params.limit_vel_by_avel && wref.abs() > params.max_angvel {
                self.v_lim.set(
                    self.v_lim.get().signum() * (params.max_angvel / curv).abs(),
                    v_seg,
                    params.max_acc,
                    dt,
                );
                wref = wref.signum() * params.max_angvel;
            }

            let k_ang = if params.gain_at_vel == 0.0 {
                params.k_ang
            } else {
                params.k_ang * v_seg / params.gain_at_vel
            };

            self.w_lim.increment(
                dt * (-dist_err_clip * params.k_dist
                    - angle * k_ang
                    - (self.w_lim.get() - wref) * params.k_avel),
                params.max_angvel,
                params.max_angacc,
                dt,
            );

            debug!(
                "distance residual {:.3}, angular residual {:.3}, v: {:.3}, w: {:.3}, curv: {:.3}",
                dist_err_clip,
                angle,
                self.v_lim.get(),
                self.w_lim.get(),
                curv
            );
        }

        // Arrival latching: once stopped within tolerance both channels hold
        // exactly zero
        if report.distance_remains.abs() < params.stop_tolerance_dist
            && report.angle_remains.abs() < params.stop_tolerance_ang
        {
            self.v_lim.clear();
            self.w_lim.clear();
        }

        let cmd = TwistCmd {
            linear_x: self.v_lim.get(),
            angular_z: self.w_lim.get(),
        };

        report.status = TrackingStatus::Following;
        if report.distance_remains.abs() < params.goal_tolerance_dist
            && report.angle_remains.abs() < params.goal_tolerance_ang
            && i_local_goal == lpath.len()
        {
            report.status = TrackingStatus::Goal;
        }

        let tracking = Pose2D::new(foot, -angle, None);

        // Advance the progress marker, it never decreases for a given path
        if arrive_local_goal {
            self.path_step_done = i_local_goal;
        } else {
            self.path_step_done = self.path_step_done.max(i_nearest.saturating_sub(1));
        }
        report.path_step_done = self.path_step_done;

        Ok((
            OutputData {
                cmd,
                tracking: Some(tracking),
            },
            report,
        ))
    }
}

impl TrajCtrl {
    /// Create a new instance with the given parameters.
    pub fn new(params: Params) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Load a new path, fully replacing the previous one.
    ///
    /// The vertex sequence is normalised by the path builder. A rejected
    /// sequence clears the current path, the tracker then reports `NoPath`
    /// until a valid path arrives.
    pub fn set_path(&mut self, header: Header, vertices: &[PathVertex]) -> Result<(), TrajCtrlError> {
        self.path_header = Some(header);
        self.path_step_done = 0;
        self.v_lim.clear();
        self.w_lim.clear();

        match PathBuilder::new(self.params.epsilon).build(vertices) {
            Ok(path) => {
                info!(
                    "New path: {} poses, {:.2} m",
                    path.len(),
                    path.length()
                );
                self.path = path;
                Ok(())
            }
            Err(e) => {
                self.path = Path2D::default();
                Err(e.into())
            }
        }
    }

    /// Drop the current path.
    pub fn clear_path(&mut self) {
        self.path = Path2D::default();
        self.path_header = None;
        self.path_step_done = 0;
        self.v_lim.clear();
        self.w_lim.clear();
    }

    /// True if a non-empty path is loaded.
    pub fn has_path(&self) -> bool {
        !self.path.is_empty()
    }

    /// Replace the parameter snapshot. Takes effect on the next tick and
    /// cancels any speed override.
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
        self.speed_override = None;
    }

    /// Override the default linear speed until the next parameter update.
    ///
    /// Invalid overrides are rejected and the previous value is retained.
    pub fn set_speed_override(&mut self, speed: f64) {
        if speed.is_finite() && speed >= 0.0 {
            self.speed_override = Some(speed);
        } else {
            warn!("Ignoring invalid speed override: {}", speed);
        }
    }

    /// Current progress marker along the path.
    pub fn path_step_done(&self) -> usize {
        self.path_step_done
    }

    /// Header of the path currently loaded, if any.
    pub fn path_header(&self) -> Option<&Header> {
        self.path_header.as_ref()
    }

    /// Stop output: zero command, cleared limiters, no operating point.
    fn stop_output(&mut self) -> OutputData {
        self.v_lim.clear();
        self.w_lim.clear();
        OutputData {
            cmd: TwistCmd::zero(),
            tracking: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    /// Tick period used by the closed-loop tests, 50 Hz.
    const DT: f64 = 0.02;

    /// Unicycle model integrating the controller output.
    struct Robot {
        x: f64,
        y: f64,
        yaw: f64,
    }

    impl Robot {
        fn new(x: f64, y: f64, yaw: f64) -> Self {
            Self { x, y, yaw }
        }

        /// Transform taking path-frame (world) points into the robot frame.
        fn robot_to_path(&self) -> Isometry2<f64> {
            Isometry2::new(Vector2::new(self.x, self.y), self.yaw).inverse()
        }

        fn step(&mut self, cmd: &TwistCmd) {
            self.x += cmd.linear_x * self.yaw.cos() * DT;
            self.y += cmd.linear_x * self.yaw.sin() * DT;
            self.yaw = wrap_pi(self.yaw + cmd.angular_z * DT);
        }
    }

    /// Gains and tolerances shared by the scenario tests.
    ///
    /// The look-forward aim point is disabled so the terminal approach is
    /// exact: the tolerances below are measured at the robot itself.
    fn test_params() -> Params {
        Params {
            look_forward: 0.0,
            curv_forward: 0.5,
            k_dist: 4.5,
            k_ang: 3.0,
            k_avel: 4.0,
            gain_at_vel: 0.0,
            dist_lim: 0.5,
            dist_stop: 2.0,
            rotate_ang: FRAC_PI_4,
            max_vel: 1.0,
            max_angvel: 2.0,
            max_acc: 2.0,
            max_angacc: 4.0,
            acc_toc_factor: 0.9,
            angacc_toc_factor: 0.9,
            path_step: 1,
            goal_tolerance_dist: 0.005,
            goal_tolerance_ang: 0.005,
            stop_tolerance_dist: 0.002,
            stop_tolerance_ang: 0.002,
            no_position_control_dist: 0.05,
            min_tracking_path: 0.05,
            allow_backward: true,
            limit_vel_by_avel: false,
            epsilon: 0.001,
        }
    }

    fn header() -> Header {
        Header {
            seq: 0,
            stamp: None,
            frame_id: "odom".into(),
        }
    }

    /// Straight run of vertices from `from` to `to` at roughly `sep`
    /// spacing, all with the given heading and speed tag.
    fn line_vertices(
        from: Vector2<f64>,
        to: Vector2<f64>,
        yaw: f64,
        sep: f64,
        velocity: Option<f64>,
    ) -> Vec<PathVertex> {
        let diff = to - from;
        let n = (diff.norm() / sep).ceil() as usize;
        (0..=n)
            .map(|i| PathVertex::new(from + diff * (i as f64 / n as f64), yaw, velocity))
            .collect()
    }

    fn tick(ctrl: &mut TrajCtrl, robot: &Robot) -> (OutputData, StatusReport) {
        ctrl.proc(&InputData {
            robot_to_path: robot.robot_to_path(),
            dt: DT,
        })
        .unwrap()
    }

    #[test]
    fn test_empty_path_outputs_zero() {
        let mut ctrl = TrajCtrl::new(test_params());
        let robot = Robot::new(0.0, 0.0, 0.0);

        let (out, report) = tick(&mut ctrl, &robot);
        assert_eq!(report.status, TrackingStatus::NoPath);
        assert_eq!(out.cmd, TwistCmd::zero());
        assert!(out.tracking.is_none());
    }

    #[test]
    fn test_path_replacement_resets_state() {
        let mut ctrl = TrajCtrl::new(test_params());
        ctrl.set_path(
            header(),
            &line_vertices(Vector2::zeros(), Vector2::new(2.0, 0.0), 0.0, 0.05, None),
        )
        .unwrap();
        let mut robot = Robot::new(0.0, 0.0, 0.0);

        // Drive a while so the limiters hold speed and progress has advanced
        for _ in 0..50 {
            let (out, _) = tick(&mut ctrl, &robot);
            robot.step(&out.cmd);
        }
        assert!(ctrl.path_step_done() > 0);

        // An empty replacement clears everything and reports NoPath with
        // zero output
        ctrl.set_path(header(), &[]).unwrap();
        assert_eq!(ctrl.path_step_done(), 0);
        let (out, report) = tick(&mut ctrl, &robot);
        assert_eq!(report.status, TrackingStatus::NoPath);
        assert_eq!(out.cmd, TwistCmd::zero());
    }

    #[test]
    fn test_invalid_dt_rejected() {
        let mut ctrl = TrajCtrl::new(test_params());
        let result = ctrl.proc(&InputData {
            robot_to_path: Isometry2::identity(),
            dt: 0.0,
        });
        assert!(matches!(result, Err(TrajCtrlError::InvalidDt(_))));
    }

    #[test]
    fn test_straight_line_convergence() {
        let params = test_params();
        let mut ctrl = TrajCtrl::new(params.clone());
        ctrl.set_path(
            header(),
            &line_vertices(
                Vector2::zeros(),
                Vector2::new(2.0, 0.0),
                0.0,
                0.05,
                Some(1.0),
            ),
        )
        .unwrap();
        let mut robot = Robot::new(0.0, 0.1, 0.0);

        let mut prev_cmd = TwistCmd::zero();
        let mut prev_done = 0;
        let mut seen_following = false;
        let mut goal_tick = None;

        for t in 0..200 {
            let (out, report) = tick(&mut ctrl, &robot);

            // Velocity envelope holds on every tick
            assert!(out.cmd.linear_x.abs() <= params.max_vel + 1e-9);
            assert!(out.cmd.angular_z.abs() <= params.max_angvel + 1e-9);

            // Acceleration envelope holds except at the arrival latch, which
            // snaps both channels to exactly zero
            if out.cmd != TwistCmd::zero() {
                assert!(
                    (out.cmd.linear_x - prev_cmd.linear_x).abs() <= params.max_acc * DT + 1e-9
                );
                assert!(
                    (out.cmd.angular_z - prev_cmd.angular_z).abs()
                        <= params.max_angacc * DT + 1e-9
                );
            }

            // Progress along the path never rewinds
            assert!(report.path_step_done >= prev_done);
            prev_done = report.path_step_done;

            match report.status {
                TrackingStatus::Following => seen_following = true,
                TrackingStatus::Goal => {
                    assert!(seen_following, "GOAL before any FOLLOWING");
                    goal_tick = Some(t);
                }
                other => panic!("unexpected status {:?} at tick {}", other, t),
            }

            prev_cmd = out.cmd;
            robot.step(&out.cmd);
        }

        assert!(goal_tick.is_some(), "goal not reached within 4 s");

        // Settled at the goal: both limiters hold exactly zero and the
        // residuals stay inside tolerance
        for _ in 0..10 {
            let (out, report) = tick(&mut ctrl, &robot);
            assert_eq!(out.cmd.linear_x, 0.0);
            assert_eq!(out.cmd.angular_z, 0.0);
            assert_eq!(report.status, TrackingStatus::Goal);
            assert!(report.distance_remains.abs() < 0.005);
            assert!(report.angle_remains.abs() < 0.005);
            robot.step(&out.cmd);
        }

        assert!((robot.x - 2.0).abs() < 0.02, "x = {}", robot.x);
        assert!(robot.y.abs() < 0.1, "y = {}", robot.y);
    }

    #[test]
    fn test_determinism() {
        let make = || {
            let mut ctrl = TrajCtrl::new(test_params());
            ctrl.set_path(
                header(),
                &line_vertices(Vector2::zeros(), Vector2::new(2.0, 0.0), 0.0, 0.05, None),
            )
            .unwrap();
            ctrl
        };

        let mut a = make();
        let mut b = make();
        let mut robot_a = Robot::new(0.0, 0.1, 0.0);
        let mut robot_b = Robot::new(0.0, 0.1, 0.0);

        for _ in 0..100 {
            let (out_a, rep_a) = tick(&mut a, &robot_a);
            let (out_b, rep_b) = tick(&mut b, &robot_b);
            assert_eq!(out_a.cmd, out_b.cmd);
            assert_eq!(rep_a.path_step_done, rep_b.path_step_done);
            robot_a.step(&out_a.cmd);
            robot_b.step(&out_b.cmd);
        }
    }

    #[test]
    fn test_stop_and_rotate_at_start() {
        let mut ctrl = TrajCtrl::new(test_params());
        ctrl.set_path(
            header(),
            &line_vertices(Vector2::zeros(), Vector2::new(1.0, 0.0), 0.0, 0.05, None),
        )
        .unwrap();
        let mut robot = Robot::new(0.0, 0.0, FRAC_PI_2);

        let mut entered_follow = false;
        let mut reached_goal = false;

        for _ in 0..400 {
            let (out, report) = tick(&mut ctrl, &robot);

            if !entered_follow {
                if robot.yaw > FRAC_PI_4 + 0.05 {
                    // Rotate branch: no forward motion, turning clockwise
                    // toward the path heading
                    assert_eq!(out.cmd.linear_x, 0.0);
                    assert!(out.cmd.angular_z <= 0.0);
                } else if out.cmd.linear_x > 0.0 {
                    entered_follow = true;
                }
            }

            robot.step(&out.cmd);

            if report.status == TrackingStatus::Goal {
                reached_goal = true;
                break;
            }
        }

        assert!(entered_follow, "follow branch never engaged");
        assert!(reached_goal, "goal not reached");
        assert!((robot.x - 1.0).abs() < 0.02);
        assert!(robot.yaw.abs() < 0.05);
    }

    #[test]
    fn test_in_place_rotation_marker() {
        let mut ctrl = TrajCtrl::new(test_params());

        // Two legs joined by a commanded in-place rotation at (1, 0)
        let mut vertices =
            line_vertices(Vector2::zeros(), Vector2::new(1.0, 0.0), 0.0, 0.05, None);
        vertices.push(PathVertex::new(Vector2::new(1.0, 0.0), FRAC_PI_2, None));
        vertices.extend(line_vertices(
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 1.0),
            FRAC_PI_2,
            0.05,
            None,
        ));
        ctrl.set_path(header(), &vertices).unwrap();

        let mut robot = Robot::new(0.0, 0.0, 0.0);

        let mut reached_corner_aligned = false;
        let mut rotated = false;
        let mut reached_goal = false;

        for _ in 0..800 {
            let (out, report) = tick(&mut ctrl, &robot);
            robot.step(&out.cmd);

            let corner_dist =
                ((robot.x - 1.0).powi(2) + robot.y.powi(2)).sqrt();

            // The robot must come essentially to rest at the corner before
            // its heading leaves the first leg's direction
            if !rotated && corner_dist < 0.01 && robot.yaw.abs() < 0.1 {
                reached_corner_aligned = true;
            }
            if reached_corner_aligned && robot.yaw > FRAC_PI_2 - 0.1 {
                rotated = true;
            }

            if report.status == TrackingStatus::Goal {
                reached_goal = true;
                break;
            }
        }

        assert!(reached_corner_aligned, "never stopped at the corner");
        assert!(rotated, "never rotated in place at the corner");
        assert!(reached_goal, "goal not reached");
        assert!((robot.x - 1.0).abs() < 0.02, "x = {}", robot.x);
        assert!((robot.y - 1.0).abs() < 0.02, "y = {}", robot.y);
        assert!((robot.yaw - FRAC_PI_2).abs() < 0.05, "yaw = {}", robot.yaw);
    }

    #[test]
    fn test_far_from_path_aborts_actuation() {
        let mut params = test_params();
        params.dist_stop = 0.5;
        let mut ctrl = TrajCtrl::new(params);
        ctrl.set_path(
            header(),
            &line_vertices(Vector2::zeros(), Vector2::new(5.0, 0.0), 0.0, 0.05, None),
        )
        .unwrap();

        let robot = Robot::new(2.0, 0.6, 0.0);
        let (out, report) = tick(&mut ctrl, &robot);
        assert_eq!(report.status, TrackingStatus::FarFromPath);
        assert_eq!(out.cmd, TwistCmd::zero());
        assert!(out.tracking.is_none());

        // The path is retained so tracking resumes once the robot is back
        assert!(ctrl.has_path());
        let robot = Robot::new(2.0, 0.1, 0.0);
        let (out, report) = tick(&mut ctrl, &robot);
        assert_eq!(report.status, TrackingStatus::Following);
        assert!(out.cmd.linear_x > 0.0);
    }

    #[test]
    fn test_reverse_travel() {
        let mut ctrl = TrajCtrl::new(test_params());
        ctrl.set_path(
            header(),
            &line_vertices(Vector2::zeros(), Vector2::new(-2.0, 0.0), 0.0, 0.05, None),
        )
        .unwrap();
        let mut robot = Robot::new(0.0, 0.0, 0.0);

        let mut reached_goal = false;
        for t in 0..400 {
            let (out, report) = tick(&mut ctrl, &robot);

            // Reverse travel: the command is negative while under way
            if t > 0 && report.status == TrackingStatus::Following && !reached_goal {
                assert!(out.cmd.linear_x <= 0.0);
            }

            robot.step(&out.cmd);
            if report.status == TrackingStatus::Goal {
                reached_goal = true;
                break;
            }
        }

        assert!(reached_goal, "goal not reached in reverse");
        assert!((robot.x + 2.0).abs() < 0.02, "x = {}", robot.x);
    }

    #[test]
    fn test_reverse_path_without_backward_rotates_first() {
        let mut params = test_params();
        params.allow_backward = false;
        let mut ctrl = TrajCtrl::new(params);
        ctrl.set_path(
            header(),
            &line_vertices(Vector2::zeros(), Vector2::new(-2.0, 0.0), 0.0, 0.05, None),
        )
        .unwrap();
        let mut robot = Robot::new(0.0, 0.0, 0.0);

        // With backward travel forbidden the initial heading error is pi, so
        // the rotate branch engages and no forward command is produced while
        // the robot is still far out of alignment
        for _ in 0..20 {
            let (out, _) = tick(&mut ctrl, &robot);
            assert_eq!(out.cmd.linear_x, 0.0);
            robot.step(&out.cmd);
        }
        assert!(robot.yaw.abs() > 0.0, "robot never started turning");
    }

    #[test]
    fn test_curvature_limited_speed() {
        let mut params = test_params();
        params.max_angvel = 0.5;
        params.limit_vel_by_avel = true;
        let mut ctrl = TrajCtrl::new(params);

        // Half circle of radius 0.5 starting at the origin heading +X
        let r = 0.5;
        let mut vertices = Vec::new();
        let mut phi = -FRAC_PI_2;
        while phi <= FRAC_PI_2 {
            vertices.push(PathVertex::new(
                Vector2::new(r * phi.cos(), 0.5 + r * phi.sin()),
                phi + FRAC_PI_2,
                None,
            ));
            phi += 0.05;
        }
        ctrl.set_path(header(), &vertices).unwrap();

        let mut robot = Robot::new(0.0, 0.0, 0.0);

        for t in 0..200 {
            let (out, report) = tick(&mut ctrl, &robot);
            robot.step(&out.cmd);

            assert!(
                report.status == TrackingStatus::Following
                    || report.status == TrackingStatus::Goal,
                "status {:?} at tick {}",
                report.status,
                t
            );

            // After the spin-up transient the curvature limit caps the speed
            // at max_angvel / curvature = 0.25 m/s
            if t >= 50 {
                assert!(
                    out.cmd.linear_x.abs() <= 0.25 + 1e-6,
                    "v = {} at tick {}",
                    out.cmd.linear_x,
                    t
                );
            }
        }

        // The robot actually went around the arc rather than stalling
        assert!(robot.yaw > 0.5, "yaw = {}", robot.yaw);
    }

    #[test]
    fn test_single_pose_path_rotates_to_yaw() {
        let mut ctrl = TrajCtrl::new(test_params());
        ctrl.set_path(
            header(),
            &[PathVertex::new(Vector2::zeros(), FRAC_PI_2, None)],
        )
        .unwrap();
        let mut robot = Robot::new(0.0, 0.0, 0.0);

        let mut reached_goal = false;
        for _ in 0..200 {
            let (out, report) = tick(&mut ctrl, &robot);

            // A zero-length path never commands translation
            assert_eq!(out.cmd.linear_x, 0.0);

            robot.step(&out.cmd);
            if report.status == TrackingStatus::Goal {
                reached_goal = true;
                break;
            }
        }

        assert!(reached_goal, "goal not reached");
        assert!((robot.yaw - FRAC_PI_2).abs() < 0.01, "yaw = {}", robot.yaw);

        // Once the goal is latched the output is exactly zero
        let (out, report) = tick(&mut ctrl, &robot);
        assert_eq!(report.status, TrackingStatus::Goal);
        assert_eq!(out.cmd, TwistCmd::zero());
    }

    #[test]
    fn test_speed_override() {
        let mut ctrl = TrajCtrl::new(test_params());
        ctrl.set_path(
            header(),
            &line_vertices(Vector2::zeros(), Vector2::new(3.0, 0.0), 0.0, 0.05, None),
        )
        .unwrap();
        ctrl.set_speed_override(0.3);

        let mut robot = Robot::new(0.0, 0.0, 0.0);
        for _ in 0..100 {
            let (out, _) = tick(&mut ctrl, &robot);
            assert!(out.cmd.linear_x.abs() <= 0.3 + 1e-9);
            robot.step(&out.cmd);
        }

        // A parameter update cancels the override
        ctrl.set_params(test_params());
        let mut exceeded = false;
        for _ in 0..100 {
            let (out, _) = tick(&mut ctrl, &robot);
            robot.step(&out.cmd);
            if out.cmd.linear_x > 0.3 + 1e-9 {
                exceeded = true;
                break;
            }
        }
        assert!(exceeded, "speed never rose above the cancelled override");

        // Invalid overrides are ignored
        ctrl.set_speed_override(-1.0);
        let (out, _) = tick(&mut ctrl, &robot);
        assert!(out.cmd.linear_x.abs() <= test_params().max_vel + 1e-9);
    }

    #[test]
    fn test_path_step_downsampling() {
        let mut params = test_params();
        params.path_step = 5;
        let mut ctrl = TrajCtrl::new(params);
        ctrl.set_path(
            header(),
            &line_vertices(Vector2::zeros(), Vector2::new(2.0, 0.0), 0.0, 0.05, None),
        )
        .unwrap();
        let mut robot = Robot::new(0.0, 0.05, 0.0);

        let mut reached_goal = false;
        for _ in 0..300 {
            let (out, report) = tick(&mut ctrl, &robot);
            robot.step(&out.cmd);
            if report.status == TrackingStatus::Goal {
                reached_goal = true;
                break;
            }
        }

        assert!(reached_goal, "goal not reached with downsampled path");
        assert!((robot.x - 2.0).abs() < 0.02);
    }
}

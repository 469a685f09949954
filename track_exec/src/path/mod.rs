//! # Path representation and geometry
//!
//! A [`Path2D`] is an ordered polyline of poses on the plane, each optionally
//! tagged with a desired linear speed. Consecutive poses either form a
//! translation edge of at least the builder's epsilon length, or coincide in
//! position, in which case the later pose is an in-place rotation marker
//! commanding the robot to turn on the spot.
//!
//! The geometry queries here locate the controller's operating point on the
//! path: the nearest segment, the local-goal cut, the remaining arc length
//! and the look-ahead curvature. All queries work over half-open index
//! ranges, are stateless, and cost O(N) in the worst case.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod builder;
pub mod line;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
pub use builder::{PathBuilder, PathError, PathVertex};
use util::maths::wrap_pi;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Arc windows shorter than this produce no curvature estimate.
const CURV_WINDOW_MIN_M: f64 = 0.05;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A pose on the path.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    /// Position in meters
    pub pos: Vector2<f64>,

    /// Heading in radians, always in (-pi, pi]
    pub yaw: f64,

    /// Desired linear speed at this pose, `None` to use the configured
    /// default
    pub velocity: Option<f64>,
}

/// An ordered polyline of poses with optional per-vertex speed.
///
/// Immutable once built, see [`PathBuilder`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Path2D {
    poses: Vec<Pose2D>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose2D {
    /// Create a new pose, normalising the heading.
    pub fn new(pos: Vector2<f64>, yaw: f64, velocity: Option<f64>) -> Self {
        Self {
            pos,
            yaw: wrap_pi(yaw),
            velocity,
        }
    }
}

impl Path2D {
    /// Build a path directly from a pose sequence.
    ///
    /// The caller is responsible for the polyline invariants, external input
    /// must go through [`PathBuilder`] instead.
    pub fn from_poses(poses: Vec<Pose2D>) -> Self {
        Self { poses }
    }

    /// Number of poses in the path.
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Iterate over the poses in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Pose2D> {
        self.poses.iter()
    }

    /// Total arc length of the path in meters.
    ///
    /// Rotation markers coincide with their predecessor and contribute
    /// nothing.
    pub fn length(&self) -> f64 {
        let mut length = 0.0;
        for i in 1..self.poses.len() {
            length += (self.poses[i].pos - self.poses[i - 1].pos).norm();
        }
        length
    }

    /// Find the local goal: the earliest index in `(begin, end]` at which the
    /// direction of travel would reverse, or at which an in-place rotation is
    /// commanded. Returns `end` if the whole range can be tracked in one go.
    ///
    /// With `allow_backward` the reversal test compares consecutive edges,
    /// so a switchback path is cut at the apex. Without it every edge is
    /// compared against the starting edge's direction.
    pub fn find_local_goal(&self, begin: usize, end: usize, allow_backward: bool) -> usize {
        let mut dir_ref: Option<Vector2<f64>> = None;

        for i in (begin + 1)..end {
            let inc = self.poses[i].pos - self.poses[i - 1].pos;

            // A rotation marker is a first-class cut: the robot must stop
            // and turn before continuing
            if inc.norm_squared() == 0.0 {
                return i;
            }

            if let Some(dir) = dir_ref {
                if dir.dot(&inc) < 0.0 {
                    return i;
                }
            }

            if allow_backward || dir_ref.is_none() {
                dir_ref = Some(inc);
            }
        }

        end
    }

    /// Find the segment of `[begin, end)` nearest to `origin`, returning the
    /// index of the segment endpoint, or `None` if the range holds no
    /// segment.
    ///
    /// A positive `max_search_range` restricts the search to segments whose
    /// nearer endpoint lies within that distance of `origin`. Segments
    /// shorter than `epsilon` are treated as points (rotation markers). Ties
    /// resolve to the lowest index.
    pub fn find_nearest(
        &self,
        begin: usize,
        end: usize,
        origin: &Vector2<f64>,
        max_search_range: f64,
        epsilon: f64,
    ) -> Option<usize> {
        let mut nearest: Option<usize> = None;
        let mut min_dist = f64::MAX;

        for i in (begin + 1)..end {
            let a = self.poses[i - 1].pos;
            let b = self.poses[i].pos;

            if max_search_range > 0.0 {
                let endpoint_dist = (a - origin).norm().min((b - origin).norm());
                if endpoint_dist > max_search_range {
                    continue;
                }
            }

            let dist = if (b - a).norm() < epsilon {
                (origin - b).norm()
            } else {
                line::line_strip_distance(&a, &b, origin)
            };

            if dist < min_dist {
                min_dist = dist;
                nearest = Some(i);
            }
        }

        nearest
    }

    /// Remaining distance from `foot` to the end of the range `[begin, end)`,
    /// where `foot` lies on the segment ending at `i_nearest`.
    ///
    /// On the final segment of the range the result is signed: negative once
    /// the foot has passed the segment end, so that the longitudinal profile
    /// commands a reversal back onto the goal.
    pub fn remained_distance(
        &self,
        begin: usize,
        i_nearest: usize,
        end: usize,
        foot: &Vector2<f64>,
    ) -> f64 {
        let mut remain = (self.poses[i_nearest].pos - foot).norm();

        if i_nearest + 1 >= end {
            if end < 2 || end - 2 < begin {
                return 0.0;
            }

            let last = self.poses[end - 1].pos;
            let last_pre = self.poses[end - 2].pos;
            let vec_path = last - last_pre;
            let vec_remain = last - foot;
            if vec_path.dot(&vec_remain) >= 0.0 {
                return remain;
            }
            return -remain;
        }

        for i in i_nearest..(end - 1) {
            remain += (self.poses[i].pos - self.poses[i + 1].pos).norm();
        }

        remain
    }

    /// Discrete curvature of the path over the look-ahead window starting at
    /// `foot` on the segment ending at `i_nearest`.
    ///
    /// Walks forward accumulating arc length until `look_ahead` is reached or
    /// the local goal bounds the window, then fits a circle through three
    /// representative points of the window. Returns 0 when the window is too
    /// short to carry a meaningful estimate.
    pub fn curvature(
        &self,
        i_nearest: usize,
        i_local_goal: usize,
        foot: &Vector2<f64>,
        look_ahead: f64,
    ) -> f64 {
        let mut window: Vec<Vector2<f64>> = vec![*foot];
        let mut arc = 0.0;
        let mut prev = *foot;

        for i in i_nearest..i_local_goal {
            if arc >= look_ahead {
                break;
            }

            let p = self.poses[i].pos;
            let step = (p - prev).norm();
            if step > 0.0 {
                arc += step;
                window.push(p);
                prev = p;
            }
        }

        if arc < CURV_WINDOW_MIN_M {
            return 0.0;
        }

        let mid = &window[window.len() / 2];
        let last = &window[window.len() - 1];
        line::curv3p(foot, mid, last)
    }
}

impl std::ops::Index<usize> for Path2D {
    type Output = Pose2D;

    fn index(&self, index: usize) -> &Self::Output {
        &self.poses[index]
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

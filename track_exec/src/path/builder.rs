//! # Path builder
//!
//! Normalises an incoming pose sequence into a well-formed [`Path2D`]. The
//! builder guarantees the polyline invariants the geometry queries rely on:
//! translation edges are at least epsilon long, coincident input poses
//! collapse into a single in-place rotation marker, and two markers never
//! appear back to back.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use thiserror::Error;

// Internal
use super::{Path2D, Pose2D};
use nav_if::msg::{Pose2DMsg, PoseWithVelocityMsg};
use util::maths::wrap_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single input vertex to the builder: a pose plus an optional desired
/// speed. Both wire shapes (plain poses and poses with velocity) convert into
/// this.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PathVertex {
    /// Position in meters
    pub pos: Vector2<f64>,

    /// Heading in radians
    pub yaw: f64,

    /// Desired linear speed in meters/second, `None` for the configured
    /// default
    pub velocity: Option<f64>,
}

/// Builds [`Path2D`] instances from raw vertex sequences.
#[derive(Debug, Clone)]
pub struct PathBuilder {
    /// Minimum translation distance for two poses to form an edge
    epsilon: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while building a path.
#[derive(Debug, Error)]
pub enum PathError {
    /// Per-vertex speeds describe a magnitude and must not be negative.
    #[error("Path velocity must be non-negative, got {velocity} at vertex {index}")]
    NegativeVelocity { index: usize, velocity: f64 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathVertex {
    pub fn new(pos: Vector2<f64>, yaw: f64, velocity: Option<f64>) -> Self {
        Self { pos, yaw, velocity }
    }
}

impl From<&Pose2DMsg> for PathVertex {
    fn from(msg: &Pose2DMsg) -> Self {
        Self::new(msg.position, msg.yaw, None)
    }
}

impl From<&PoseWithVelocityMsg> for PathVertex {
    fn from(msg: &PoseWithVelocityMsg) -> Self {
        Self::new(msg.pose.position, msg.pose.yaw, msg.velocity)
    }
}

impl PathBuilder {
    /// Create a builder with the given minimum translation distance.
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// Normalise a vertex sequence into a path.
    ///
    /// An empty input produces an empty path. A vertex whose speed is
    /// negative rejects the whole sequence. Non-finite speeds are treated as
    /// unset.
    pub fn build(&self, vertices: &[PathVertex]) -> Result<Path2D, PathError> {
        for (index, vertex) in vertices.iter().enumerate() {
            if let Some(velocity) = vertex.velocity {
                if velocity.is_finite() && velocity < 0.0 {
                    return Err(PathError::NegativeVelocity { index, velocity });
                }
            }
        }

        let first = match vertices.first() {
            Some(v) => v,
            None => return Ok(Path2D::default()),
        };

        let mut poses = vec![Self::to_pose(first)];
        let mut pending_turn: Option<Pose2D> = None;

        for next in &vertices[1..] {
            // The reference point is the last pushed pose, a pending marker
            // shares its position
            let last = *poses.last().expect("poses holds at least the first vertex");

            if (next.pos - last.pos).norm_squared() >= self.epsilon * self.epsilon {
                if let Some(turn) = pending_turn.take() {
                    poses.push(turn);
                }
                poses.push(Self::to_pose(next));
            } else {
                let turn = Pose2D::new(last.pos, next.yaw, Self::finite_velocity(next));
                // A marker that commands no heading change carries no
                // information, drop it
                pending_turn = if wrap_pi(turn.yaw - last.yaw) != 0.0 {
                    Some(turn)
                } else {
                    None
                };
            }
        }

        if let Some(turn) = pending_turn {
            poses.push(turn);
        }

        Ok(Path2D::from_poses(poses))
    }

    fn to_pose(vertex: &PathVertex) -> Pose2D {
        Pose2D::new(vertex.pos, vertex.yaw, Self::finite_velocity(vertex))
    }

    fn finite_velocity(vertex: &PathVertex) -> Option<f64> {
        vertex.velocity.filter(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

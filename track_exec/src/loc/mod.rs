//! # Localisation module
//!
//! Frame bookkeeping for the tracker: stamped planar transforms and a small
//! buffer answering "pose of frame A in frame B" lookups. The buffer holds
//! the most recent transform per frame pair, fed by odometry samples and
//! explicit transform messages, and resolves direct, inverse and identity
//! lookups. Chained lookups across more than one pair are not supported.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{DateTime, Utc};
use nalgebra::{Isometry2, Vector2};
use std::collections::HashMap;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A planar rigid transform mapping points in the child frame into the
/// parent frame, stamped with its validity time.
#[derive(Debug, Clone)]
pub struct StampedTransform {
    /// The transform itself
    pub iso: Isometry2<f64>,

    /// Time at which the transform was observed
    pub stamp: DateTime<Utc>,

    /// The frame the transform maps into
    pub parent: String,

    /// The frame the transform maps from
    pub child: String,
}

/// Buffer of the most recent transform per frame pair.
#[derive(Debug, Default)]
pub struct TfBuffer {
    transforms: HashMap<(String, String), StampedTransform>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by transform lookups.
#[derive(Debug, Error)]
pub enum TfError {
    #[error("No transform from \"{source_frame}\" to \"{target}\" is known")]
    NotFound {
        target: String,
        source_frame: String,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StampedTransform {
    /// Build a stamped transform from a planar pose of `child` in `parent`.
    pub fn from_pose(
        position: Vector2<f64>,
        yaw: f64,
        stamp: DateTime<Utc>,
        parent: &str,
        child: &str,
    ) -> Self {
        Self {
            iso: Isometry2::new(position, yaw),
            stamp,
            parent: parent.into(),
            child: child.into(),
        }
    }

    /// The inverse transform, mapping parent-frame points into the child
    /// frame.
    pub fn inverse(&self) -> Self {
        Self {
            iso: self.iso.inverse(),
            stamp: self.stamp,
            parent: self.child.clone(),
            child: self.parent.clone(),
        }
    }

    /// Compose with another transform, `self * other` maps points from
    /// `other.child` into `self.parent`.
    ///
    /// The stamp of `self` is retained, it is the fresher end of the chain in
    /// the tracker's usage.
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            iso: self.iso * other.iso,
            stamp: self.stamp,
            parent: self.parent.clone(),
            child: other.child.clone(),
        }
    }
}

impl TfBuffer {
    /// Store a transform, replacing any previous one for the same frame
    /// pair.
    pub fn insert(&mut self, tf: StampedTransform) {
        self.transforms
            .insert((tf.parent.clone(), tf.child.clone()), tf);
    }

    /// Look up the pose of `source` in `target`.
    ///
    /// Resolves the identity, the directly stored pair, or the inverse of a
    /// stored pair.
    pub fn lookup(&self, target: &str, source: &str) -> Result<StampedTransform, TfError> {
        if target == source {
            return Ok(StampedTransform::from_pose(
                Vector2::zeros(),
                0.0,
                Utc::now(),
                target,
                source,
            ));
        }

        if let Some(tf) = self
            .transforms
            .get(&(target.to_string(), source.to_string()))
        {
            return Ok(tf.clone());
        }

        if let Some(tf) = self
            .transforms
            .get(&(source.to_string(), target.to_string()))
        {
            return Ok(tf.inverse());
        }

        Err(TfError::NotFound {
            target: target.into(),
            source_frame: source.into(),
        })
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Point2;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_lookup_direct_and_inverse() {
        let mut buffer = TfBuffer::default();
        buffer.insert(StampedTransform::from_pose(
            Vector2::new(1.0, 0.0),
            FRAC_PI_2,
            Utc::now(),
            "odom",
            "base_link",
        ));

        // A point at the robot origin lands at the robot's position in odom
        let tf = buffer.lookup("odom", "base_link").unwrap();
        let p = tf.iso * Point2::new(0.0, 0.0);
        assert!((p.coords - Vector2::new(1.0, 0.0)).norm() < 1e-12);

        // The inverse lookup maps it back
        let tf = buffer.lookup("base_link", "odom").unwrap();
        let p = tf.iso * Point2::new(1.0, 0.0);
        assert!(p.coords.norm() < 1e-12);
    }

    #[test]
    fn test_lookup_identity() {
        let buffer = TfBuffer::default();
        let tf = buffer.lookup("odom", "odom").unwrap();
        let p = tf.iso * Point2::new(0.3, -0.4);
        assert!((p.coords - Vector2::new(0.3, -0.4)).norm() < 1e-12);
    }

    #[test]
    fn test_lookup_unknown_pair() {
        let buffer = TfBuffer::default();
        assert!(matches!(
            buffer.lookup("map", "base_link"),
            Err(TfError::NotFound { .. })
        ));
    }

    #[test]
    fn test_insert_replaces() {
        let mut buffer = TfBuffer::default();
        buffer.insert(StampedTransform::from_pose(
            Vector2::new(1.0, 0.0),
            0.0,
            Utc::now(),
            "odom",
            "base_link",
        ));
        buffer.insert(StampedTransform::from_pose(
            Vector2::new(2.0, 0.0),
            0.0,
            Utc::now(),
            "odom",
            "base_link",
        ));

        let tf = buffer.lookup("odom", "base_link").unwrap();
        let p = tf.iso * Point2::new(0.0, 0.0);
        assert!((p.coords - Vector2::new(2.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_compose() {
        // odom <- path is a pure translation, base <- odom a pure rotation
        let odom_path = StampedTransform::from_pose(
            Vector2::new(1.0, 0.0),
            0.0,
            Utc::now(),
            "odom",
            "path",
        );
        let base_odom = StampedTransform::from_pose(
            Vector2::new(0.0, 0.0),
            FRAC_PI_2,
            Utc::now(),
            "base_link",
            "odom",
        );

        let base_path = base_odom.compose(&odom_path);
        assert_eq!(base_path.parent, "base_link");
        assert_eq!(base_path.child, "path");

        let p = base_path.iso * Point2::new(0.0, 0.0);
        assert!((p.coords - Vector2::new(0.0, 1.0)).norm() < 1e-12);
    }
}

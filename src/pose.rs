// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Pose type, an end-effector pose tagged with its reference frame.
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::exception::{MotionException, MotionResult};
use crate::utils::{array_to_isometry, is_homogeneous_transformation};

/// Position and orientation of an end effector, expressed in a named reference frame.
///
/// Poses are immutable once constructed. Operations which combine two poses require both to be
/// expressed in the same frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Pose {
    frame_id: String,
    isometry: Isometry3<f64>,
}

impl Pose {
    /// Creates a new Pose from a position and an orientation.
    /// # Arguments
    /// * `frame_id` - Reference frame the pose is expressed in.
    /// * `position` - Position in \[m\].
    /// * `orientation` - Orientation as unit quaternion.
    pub fn new<S: Into<String>>(
        frame_id: S,
        position: Vector3<f64>,
        orientation: UnitQuaternion<f64>,
    ) -> Self {
        Pose {
            frame_id: frame_id.into(),
            isometry: Isometry3::from_parts(Translation3::from(position), orientation),
        }
    }

    /// Creates a new Pose from an isometry.
    pub fn from_isometry<S: Into<String>>(frame_id: S, isometry: Isometry3<f64>) -> Self {
        Pose {
            frame_id: frame_id.into(),
            isometry,
        }
    }

    /// Creates a new Pose from a 4x4 homogeneous transformation in column-major format.
    /// # Errors
    /// * [`InvalidTrajectory`](`crate::exception::MotionException::InvalidTrajectory`) if the
    /// array is not a valid homogeneous transformation.
    pub fn from_homogeneous<S: Into<String>>(
        frame_id: S,
        transform: &[f64; 16],
    ) -> MotionResult<Self> {
        if !is_homogeneous_transformation(transform) {
            return Err(MotionException::InvalidTrajectory {
                message: format!("not a homogeneous transformation: {:?}", transform),
            });
        }
        Ok(Pose::from_isometry(frame_id, array_to_isometry(transform)))
    }

    /// Reference frame of this pose.
    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    /// Pose as isometry, without frame.
    pub fn isometry(&self) -> &Isometry3<f64> {
        &self.isometry
    }

    /// Position in \[m\].
    pub fn position(&self) -> Vector3<f64> {
        self.isometry.translation.vector
    }

    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.isometry.rotation
    }

    /// Checks that this pose is expressed in `frame_id`.
    /// # Errors
    /// * [`FrameMismatch`](`crate::exception::MotionException::FrameMismatch`) otherwise.
    pub fn expect_frame(&self, frame_id: &str) -> MotionResult<()> {
        if self.frame_id != frame_id {
            return Err(MotionException::FrameMismatch {
                expected: frame_id.to_string(),
                actual: self.frame_id.clone(),
            });
        }
        Ok(())
    }

    /// Euclidean distance between the positions of two poses in \[m\].
    pub fn translation_distance(&self, other: &Pose) -> f64 {
        (other.position() - self.position()).norm()
    }

    /// Angle of the rotation between the orientations of two poses in \[rad\], in \[0, π\].
    pub fn rotation_distance(&self, other: &Pose) -> f64 {
        self.isometry.rotation.angle_to(&other.isometry.rotation)
    }

    /// Interpolates between this pose (`fraction` = 0) and `other` (`fraction` = 1).
    ///
    /// The position is interpolated linearly, the orientation along the shortest arc. Unlike
    /// [`UnitQuaternion::slerp`] this is also defined for rotations of exactly 180°.
    /// The result keeps the frame of `self`.
    pub fn interpolate(&self, other: &Pose, fraction: f64) -> Pose {
        let position = self.position() + (other.position() - self.position()) * fraction;
        let delta = self.isometry.rotation.rotation_to(&other.isometry.rotation);
        let orientation =
            UnitQuaternion::from_scaled_axis(delta.scaled_axis() * fraction) * self.orientation();
        Pose::new(self.frame_id.clone(), position, orientation)
    }

    /// Returns a copy of this pose moved by `offset` \[m\], keeping the orientation.
    pub fn translated(&self, offset: &Vector3<f64>) -> Pose {
        Pose::new(
            self.frame_id.clone(),
            self.position() + offset,
            self.orientation(),
        )
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let p = self.position();
        let q = self.orientation();
        write!(
            f,
            "[{}] p=({:.4}, {:.4}, {:.4}) q=({:.4}, {:.4}, {:.4}, {:.4})",
            self.frame_id, p.x, p.y, p.z, q.i, q.j, q.k, q.w
        )
    }
}

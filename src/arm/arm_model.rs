// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the ArmModel trait.
use std::sync::Arc;

use nalgebra::Isometry3;

use crate::arm::ArmId;
use crate::utils::Joints;

/// Kinematic model of an arm, consumed as a black box.
///
/// Poses are expressed in the base frame of the model. Both calls are blocking and may take tens
/// of milliseconds. A failed inverse kinematics query is not an error, it simply has no solution.
#[cfg_attr(test, mockall::automock)]
pub trait ArmModel {
    /// Computes the end-effector pose for the given joint configuration.
    fn forward_kinematics(&self, arm: ArmId, joints: &Joints) -> Isometry3<f64>;

    /// Computes a joint configuration reaching `pose`.
    /// # Arguments
    /// * `pose` - Desired end-effector pose.
    /// * `seed` - Configuration the solver starts from and tries to stay close to.
    /// * `collision_aware` - If true, only collision-free solutions are returned.
    /// # Return
    /// The solution or None if the pose cannot be reached.
    fn inverse_kinematics(
        &self,
        arm: ArmId,
        pose: &Isometry3<f64>,
        seed: &Joints,
        collision_aware: bool,
    ) -> Option<Joints>;
}

impl<T: ArmModel + ?Sized> ArmModel for &T {
    fn forward_kinematics(&self, arm: ArmId, joints: &Joints) -> Isometry3<f64> {
        (**self).forward_kinematics(arm, joints)
    }

    fn inverse_kinematics(
        &self,
        arm: ArmId,
        pose: &Isometry3<f64>,
        seed: &Joints,
        collision_aware: bool,
    ) -> Option<Joints> {
        (**self).inverse_kinematics(arm, pose, seed, collision_aware)
    }
}

impl<T: ArmModel + ?Sized> ArmModel for Arc<T> {
    fn forward_kinematics(&self, arm: ArmId, joints: &Joints) -> Isometry3<f64> {
        (**self).forward_kinematics(arm, joints)
    }

    fn inverse_kinematics(
        &self,
        arm: ArmId,
        pose: &Isometry3<f64>,
        seed: &Joints,
        collision_aware: bool,
    ) -> Option<Joints> {
        (**self).inverse_kinematics(arm, pose, seed, collision_aware)
    }
}

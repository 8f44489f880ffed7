// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the ArmFeedback trait.
use std::sync::Arc;

use nalgebra::Vector3;

use crate::arm::ArmId;
use crate::utils::Joints;

/// Read access to the latest state of an arm.
///
/// All accessors return copies and None as long as nothing has been received for the arm.
#[cfg_attr(test, mockall::automock)]
pub trait ArmFeedback {
    /// Latest measured joint angles in \[rad\].
    fn joint_angles(&self, arm: ArmId) -> Option<Joints>;

    /// Latest joint equilibrium point in \[rad\], i.e. the commanded target of the
    /// impedance controller.
    fn jep(&self, arm: ArmId) -> Option<Joints>;

    /// Latest wrist force in the wrist frame in \[N\], without bias compensation.
    /// # Arguments
    /// * `filtered` - true for the filtered reading, false for the raw one.
    fn wrist_force(&self, arm: ArmId, filtered: bool) -> Option<Vector3<f64>>;
}

impl<T: ArmFeedback + ?Sized> ArmFeedback for &T {
    fn joint_angles(&self, arm: ArmId) -> Option<Joints> {
        (**self).joint_angles(arm)
    }

    fn jep(&self, arm: ArmId) -> Option<Joints> {
        (**self).jep(arm)
    }

    fn wrist_force(&self, arm: ArmId, filtered: bool) -> Option<Vector3<f64>> {
        (**self).wrist_force(arm, filtered)
    }
}

impl<T: ArmFeedback + ?Sized> ArmFeedback for Arc<T> {
    fn joint_angles(&self, arm: ArmId) -> Option<Joints> {
        (**self).joint_angles(arm)
    }

    fn jep(&self, arm: ArmId) -> Option<Joints> {
        (**self).jep(arm)
    }

    fn wrist_force(&self, arm: ArmId, filtered: bool) -> Option<Vector3<f64>> {
        (**self).wrist_force(arm, filtered)
    }
}

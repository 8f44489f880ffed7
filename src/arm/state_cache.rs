// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the ArmStateCache type.
use std::sync::{Mutex, MutexGuard, PoisonError};

use nalgebra::Vector3;

use crate::arm::feedback::ArmFeedback;
use crate::arm::ArmId;
use crate::utils::Joints;

#[derive(Debug, Copy, Clone, Default)]
struct ArmReadings {
    joint_angles: Option<Joints>,
    jep: Option<Joints>,
    force: Option<Vector3<f64>>,
    raw_force: Option<Vector3<f64>>,
}

#[derive(Debug, Default)]
struct Readings {
    left: ArmReadings,
    right: ArmReadings,
    motor_power_on: bool,
}

impl Readings {
    fn arm(&mut self, arm: ArmId) -> &mut ArmReadings {
        match arm {
            ArmId::Left => &mut self.left,
            ArmId::Right => &mut self.right,
        }
    }
}

/// Latest sensor readings of both arms.
///
/// Written by a single listener (e.g. the thread receiving state messages) and read by planners
/// and dispatchers. One mutex guards all readings and is held only for the duration of a single
/// copy. Share it between threads with an [`Arc`](`std::sync::Arc`).
#[derive(Debug, Default)]
pub struct ArmStateCache {
    readings: Mutex<Readings>,
}

impl ArmStateCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        ArmStateCache::default()
    }

    // A writer that panicked while holding the lock leaves whole values behind, so the readings
    // stay usable.
    fn lock(&self) -> MutexGuard<Readings> {
        self.readings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update_joint_angles(&self, arm: ArmId, joint_angles: Joints) {
        self.lock().arm(arm).joint_angles = Some(joint_angles);
    }

    pub fn update_jep(&self, arm: ArmId, jep: Joints) {
        self.lock().arm(arm).jep = Some(jep);
    }

    /// Stores a filtered wrist force reading in \[N\].
    pub fn update_force(&self, arm: ArmId, force: Vector3<f64>) {
        self.lock().arm(arm).force = Some(force);
    }

    /// Stores an unfiltered wrist force reading in \[N\].
    pub fn update_raw_force(&self, arm: ArmId, force: Vector3<f64>) {
        self.lock().arm(arm).raw_force = Some(force);
    }

    pub fn update_motor_power(&self, on: bool) {
        self.lock().motor_power_on = on;
    }

    pub fn is_motor_power_on(&self) -> bool {
        self.lock().motor_power_on
    }
}

impl ArmFeedback for ArmStateCache {
    fn joint_angles(&self, arm: ArmId) -> Option<Joints> {
        self.lock().arm(arm).joint_angles
    }

    fn jep(&self, arm: ArmId) -> Option<Joints> {
        self.lock().arm(arm).jep
    }

    fn wrist_force(&self, arm: ArmId, filtered: bool) -> Option<Vector3<f64>> {
        let mut readings = self.lock();
        let arm = readings.arm(arm);
        if filtered {
            arm.force
        } else {
            arm.raw_force
        }
    }
}

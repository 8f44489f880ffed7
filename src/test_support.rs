// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Test doubles for the arm capabilities.
use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

use crate::arm::arm_model::ArmModel;
use crate::arm::motion_sink::{MotionSink, TimedJointPoint};
use crate::arm::ArmId;
use crate::utils::Joints;

/// A kinematic toy arm with closed form FK and IK.
///
/// Joints 1-3 are the end-effector position, joints 4-6 its orientation as scaled axis and
/// joint 7 is an elbow which does not move the end effector.
pub(crate) struct ToyArm {
    /// Positions further away from the origin have no solution.
    pub reach: f64,
    /// Axis aligned box (min, max) with no collision-free solution.
    pub obstacle: Option<(Vector3<f64>, Vector3<f64>)>,
    /// Solutions with a larger x coordinate have the elbow flipped by π.
    pub flip_above_x: Option<f64>,
    ik_calls: AtomicUsize,
}

impl ToyArm {
    pub fn new(reach: f64) -> Self {
        ToyArm {
            reach,
            obstacle: None,
            flip_above_x: None,
            ik_calls: AtomicUsize::new(0),
        }
    }

    pub fn ik_calls(&self) -> usize {
        self.ik_calls.load(Ordering::SeqCst)
    }

    fn in_obstacle(&self, p: &Vector3<f64>) -> bool {
        match &self.obstacle {
            Some((min, max)) => (0..3).all(|i| p[i] >= min[i] && p[i] <= max[i]),
            None => false,
        }
    }
}

impl ArmModel for ToyArm {
    fn forward_kinematics(&self, _arm: ArmId, joints: &Joints) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(joints[0], joints[1], joints[2]),
            UnitQuaternion::from_scaled_axis(Vector3::new(joints[3], joints[4], joints[5])),
        )
    }

    fn inverse_kinematics(
        &self,
        _arm: ArmId,
        pose: &Isometry3<f64>,
        _seed: &Joints,
        collision_aware: bool,
    ) -> Option<Joints> {
        self.ik_calls.fetch_add(1, Ordering::SeqCst);
        let p = pose.translation.vector;
        if p.norm() > self.reach {
            return None;
        }
        if collision_aware && self.in_obstacle(&p) {
            return None;
        }
        let axis = pose.rotation.scaled_axis();
        let elbow = match self.flip_above_x {
            Some(x) if p.x > x => PI,
            _ => 0.,
        };
        Some([p.x, p.y, p.z, axis.x, axis.y, axis.z, elbow])
    }
}

/// Records everything sent to it.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub configurations: Vec<Joints>,
    pub trajectories: Vec<Vec<TimedJointPoint>>,
    pub timeouts: Vec<Duration>,
    /// Value returned by `wait_for_completion`.
    pub completes: bool,
}

impl RecordingSink {
    pub fn completing() -> Self {
        RecordingSink {
            completes: true,
            ..Default::default()
        }
    }
}

impl MotionSink for RecordingSink {
    fn emit_configuration(&mut self, _arm: ArmId, joints: &Joints) {
        self.configurations.push(*joints);
    }

    fn emit_timed_trajectory(&mut self, _arm: ArmId, points: &[TimedJointPoint]) {
        self.trajectories.push(points.to_vec());
    }

    fn wait_for_completion(&mut self, _arm: ArmId, timeout: Duration) -> bool {
        self.timeouts.push(timeout);
        self.completes
    }
}

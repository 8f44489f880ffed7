// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains functions for biasing inverse kinematics seeds towards a preferred posture.
use nalgebra::Isometry3;
use tracing::debug;

use crate::arm::arm_model::ArmModel;
use crate::arm::ArmId;
use crate::config::BiasLimits;
use crate::utils::{Joints, Vector7};

/// Length of the push applied between two iterations of [`run_biased_ik`] in \[rad\].
pub const BIASED_IK_STEP: f64 = 0.1;
/// Default number of iterations of [`run_biased_ik`].
pub const BIASED_IK_ITERATIONS: usize = 6;

/// Pushes a joint configuration along a preferred direction.
///
/// # Arguments
/// * `q` - Configuration to push.
/// * `joints_bias` - Direction of the push, does not need to be normalized.
/// * `bias_radius` - Length of the push in \[rad\].
/// * `limits` - Bounds the result is clamped to.
/// # Return
/// `q + bias_radius * joints_bias / |joints_bias|` clamped to `limits`, or `q` unchanged if the
/// radius or the direction is zero.
pub fn bias_guess(q: &Joints, joints_bias: &Joints, bias_radius: f64, limits: &BiasLimits) -> Joints {
    let direction = Vector7::from_row_slice(joints_bias);
    let norm = direction.norm();
    if bias_radius == 0. || norm == 0. {
        return *q;
    }
    let pushed = Vector7::from_row_slice(q) + direction * (bias_radius / norm);
    let mut out = [0.; 7];
    for (i, value) in out.iter_mut().enumerate() {
        *value = pushed[i].max(limits.lower[i]).min(limits.upper[i]);
    }
    out
}

/// Runs collision-aware inverse kinematics repeatedly, pushing each solution along `joints_bias`
/// before using it as the next seed.
///
/// The first query is seeded with all zeros. Repeating the query walks the solver towards
/// solutions in the preferred direction.
/// # Return
/// The last solution found or None if no query succeeded.
pub fn run_biased_ik<M: ArmModel + ?Sized>(
    model: &M,
    arm: ArmId,
    pose: &Isometry3<f64>,
    joints_bias: &Joints,
    iterations: usize,
    limits: &BiasLimits,
) -> Option<Joints> {
    let mut seed = [0.; 7];
    let mut solution = None;
    for i in 0..iterations {
        if let Some(q) = model.inverse_kinematics(arm, pose, &seed, true) {
            seed = q;
            solution = Some(q);
        } else {
            debug!(%arm, iteration = i, "biased IK query without solution");
        }
        if i + 1 < iterations {
            seed = bias_guess(&seed, joints_bias, BIASED_IK_STEP, limits);
        }
    }
    solution
}

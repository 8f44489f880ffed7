// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the MotionSink trait and the TimedJointPoint type.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::arm::ArmId;
use crate::utils::Joints;

/// One point of a timed joint trajectory.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct TimedJointPoint {
    /// Joint positions in \[rad\].
    pub positions: Joints,
    /// Joint velocities in \[rad/s\].
    pub velocities: Joints,
    /// Time at which the point should be reached, relative to the start of the trajectory.
    pub time_from_start: Duration,
}

/// Receives joint commands for execution.
///
/// Commands are one-way. Whether they succeeded can only be inferred from later state updates
/// or, for whole trajectories, from [`wait_for_completion`](`Self::wait_for_completion`).
#[cfg_attr(test, mockall::automock)]
pub trait MotionSink {
    /// Sends a single joint equilibrium point.
    fn emit_configuration(&mut self, arm: ArmId, joints: &Joints);

    /// Sends a whole timed trajectory in one go. A new trajectory replaces a running one.
    fn emit_timed_trajectory(&mut self, arm: ArmId, points: &[TimedJointPoint]);

    /// Blocks until the last trajectory has been executed or `timeout` elapsed.
    /// # Return
    /// true if the trajectory finished in time.
    fn wait_for_completion(&mut self, arm: ArmId, timeout: Duration) -> bool;
}

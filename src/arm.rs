// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the capabilities an arm has to provide to the planner and the dispatcher.
//!
//! Kinematics, state feedback and command output are supplied by the host environment.
//! They are modelled as three independent traits:
//! * [`ArmModel`](`crate::arm::arm_model::ArmModel`) - forward and inverse kinematics.
//! * [`ArmFeedback`](`crate::arm::feedback::ArmFeedback`) - latest joint angles, equilibrium
//! points and wrist forces.
//! * [`MotionSink`](`crate::arm::motion_sink::MotionSink`) - one-way joint commands.
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod arm_model;
pub mod feedback;
pub mod motion_sink;
pub mod state_cache;

/// Identifies one of the two arms of a robot.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ArmId {
    Left,
    Right,
}

impl fmt::Display for ArmId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArmId::Left => {
                write!(f, "left")
            }
            ArmId::Right => {
                write!(f, "right")
            }
        }
    }
}

// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the per-step result types of the path planner.
use std::fmt::{Display, Formatter, Result};

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::utils::Joints;

/// Classification of one step of a checked path. Lower is better.
#[derive(Serialize_repr, Deserialize_repr, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
#[derive(FromPrimitive, ToPrimitive)]
pub enum StepStatus {
    /// A consistent, collision-free solution was found.
    Ok = 0,
    /// Only solutions in collision were found.
    Collision = 1,
    /// The solution jumps too far away from the previous step.
    Inconsistent = 2,
    /// No solution exists, even ignoring collisions.
    OutOfReach = 3,
    /// Not checked because too many previous steps were invalid.
    Aborted = 4,
}

impl StepStatus {
    pub fn is_ok(self) -> bool {
        self == StepStatus::Ok
    }

    /// Integer code of the status as reported to callers using numeric error codes.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Status for a numeric error code, None for unknown codes.
    pub fn from_code(code: i32) -> Option<StepStatus> {
        StepStatus::from_i32(code)
    }
}

impl Display for StepStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            StepStatus::Ok => write!(f, "ok"),
            StepStatus::Collision => write!(f, "in collision"),
            StepStatus::Inconsistent => write!(f, "inconsistent"),
            StepStatus::OutOfReach => write!(f, "out of reach"),
            StepStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// One resolved pose of a checked path.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct TrajectoryStep {
    /// Position of the step in the sampled path.
    pub index: usize,
    /// Joint configuration, all zeros if the step has no solution.
    pub joints: Joints,
    pub status: StepStatus,
}

/// Result of checking a Cartesian path: one step per sampled pose, in path order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PathCheck {
    pub steps: Vec<TrajectoryStep>,
}

impl PathCheck {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// True if every step is [`Ok`](`StepStatus::Ok`).
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|step| step.status.is_ok())
    }

    /// Worst status of all steps, [`Ok`](`StepStatus::Ok`) for an empty path.
    pub fn worst_status(&self) -> StepStatus {
        self.steps
            .iter()
            .map(|step| step.status)
            .max()
            .unwrap_or(StepStatus::Ok)
    }

    /// Joint configurations of all steps.
    pub fn trajectory(&self) -> Vec<Joints> {
        self.steps.iter().map(|step| step.joints).collect()
    }

    pub fn statuses(&self) -> Vec<StepStatus> {
        self.steps.iter().map(|step| step.status).collect()
    }
}

// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains exception and Result definitions
use crate::arm::ArmId;
use thiserror::Error;

/// Represents all kind of errors which can occur while planning or dispatching arm motions.
///
/// Per-step planning results ([`StepStatus`](`crate::StepStatus`)) and dispatch reasons
/// ([`ReasonCode`](`crate::ReasonCode`)) are values, not errors. Only conditions which make it
/// impossible to produce such a value end up here.
#[derive(Error, Debug)]
pub enum MotionException {
    /// InvalidSpacing is returned by the path sampler if no step count was given and neither
    /// spacing is positive.
    #[error("Invalid spacing: pos_spacing {pos_spacing} and rot_spacing {rot_spacing} are both <= 0")]
    InvalidSpacing {
        /// Requested maximum translation between two samples in \[m\].
        pos_spacing: f64,
        /// Requested maximum rotation between two samples in \[rad\].
        rot_spacing: f64,
    },

    /// FrameMismatch is returned if a pose is not expressed in the expected reference frame.
    #[error("Pose is expressed in frame {actual:?}, expected {expected:?}")]
    FrameMismatch { expected: String, actual: String },

    /// InvalidTrajectory is returned for empty or malformed joint trajectories.
    #[error("{message:?}")]
    InvalidTrajectory { message: String },

    /// NoStateReceived is returned if the state cache has not seen a reading for the arm yet.
    #[error("No state received yet for the {arm} arm")]
    NoStateReceived { arm: ArmId },

    /// NoIkSolution is returned if a single-pose move found no inverse kinematics solution.
    #[error("{message:?}")]
    NoIkSolution { message: String },

    /// RealTimeException is returned if the real-time priority cannot be set
    #[error("{message:?}")]
    RealTimeException { message: String },

    /// ConfigException is returned if a configuration cannot be read or parsed.
    #[error("{message:?}")]
    ConfigException { message: String },
}

/// creates an InvalidTrajectory exception from a static string slice
pub(crate) fn create_trajectory_exception(message: &'static str) -> MotionException {
    MotionException::InvalidTrajectory {
        message: message.to_string(),
    }
}

/// Result type which can have MotionException as Error
pub type MotionResult<T> = Result<T, MotionException>;

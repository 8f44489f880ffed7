// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! # arm-motion-rs
//! arm-motion-rs plans and executes Cartesian motions of impedance controlled robot arms which
//! are commanded through joint equilibrium points (JEPs).
//!
//! **ALWAYS HAVE THE USER STOP BUTTON AT
//! HAND WHILE CONTROLLING THE ROBOT!**
//!
//! ## Design
//! Motions run through three stages:
//! * [sampler](`crate::planner::sampler`) - interpolates poses along a straight line between a
//! start and an end pose.
//! * [path_check](`crate::planner::path_check`) - resolves every sampled pose to a joint
//! configuration with inverse kinematics, checks for collisions and jumps in joint space and
//! retries from alternate start configurations.
//! * [dispatch](`crate::dispatch`) - sends the configurations to the arm, either one equilibrium
//! point per time quantum or as one timed trajectory.
//!
//! The library does not talk to the robot itself. Kinematics, state feedback and the motion
//! interface are supplied through the [`ArmModel`], [`ArmFeedback`] and [`MotionSink`] traits.
//! The [`ArmController`] combines all of them for one arm.
//!
//! # Example:
//! A path is checked with a [`PathChecker`]:
//!```no_run
//! # use arm_motion::{ArmId, ArmModel, MotionResult, PathChecker, PlannerConfig, Pose};
//! # use nalgebra::{UnitQuaternion, Vector3};
//! # fn check<M: ArmModel>(model: &M, current: [f64; 7]) -> MotionResult<()> {
//! let config = PlannerConfig::default();
//! let start = Pose::new("base_link", Vector3::new(0.5, -0.2, 0.), UnitQuaternion::identity());
//! let end = Pose::new("base_link", Vector3::new(0.8, -0.2, 0.), UnitQuaternion::identity());
//! let path = PathChecker::new(model, ArmId::Right, &config.path, &config.bias_limits)
//!     .with_alternate_start_angles(&config.alternate_start_angles)
//!     .check_cartesian_path(&start, &end, &current)?;
//! if path.is_success() {
//!     println!("{} steps", path.len());
//! } else {
//!     println!("worst step: {}", path.worst_status());
//! }
//! # Ok(())
//! # }
//! ```
//! A [`PathCheck`] contains one [`TrajectoryStep`] per sampled pose. The path can be executed if
//! every step has the status [`StepStatus::Ok`].
pub mod arm;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod exception;
pub mod planner;
pub mod pose;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use arm::arm_model::ArmModel;
pub use arm::feedback::ArmFeedback;
pub use arm::motion_sink::{MotionSink, TimedJointPoint};
pub use arm::state_cache::ArmStateCache;
pub use arm::ArmId;
pub use config::*;
pub use controller::{ArmController, MoveOutcome};
pub use dispatch::clock::{Clock, SimulatedClock, SystemClock};
pub use dispatch::reason::{ReasonCode, StoppingPredicate};
pub use dispatch::timed_trajectory::{normalize_trajectory, trajectory_times_and_vels};
pub use dispatch::Dispatcher;
pub use exception::{MotionException, MotionResult};
pub use planner::path_check::PathChecker;
pub use planner::sampler::sample_cartesian_path;
pub use planner::step_status::{PathCheck, StepStatus, TrajectoryStep};
pub use pose::Pose;
pub use utils::*;

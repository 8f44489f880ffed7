// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the configuration types of the planner and the dispatcher.
//!
//! All types implement [`Default`] with the values used on the real robot and can be read from
//! JSON. Missing fields fall back to their default, so a configuration file only has to name the
//! values it changes:
//! ```
//! use arm_motion::PlannerConfig;
//! let config = PlannerConfig::from_json_str(r#"{"dispatch": {"time_quantum": 0.01}}"#).unwrap();
//! assert_eq!(config.dispatch.time_quantum, 0.01);
//! assert_eq!(config.base_frame, "base_link");
//! ```
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::exception::{MotionException, MotionResult};
use crate::utils::Joints;

/// Converts seconds to a Duration. Negative values and NaN become zero, values too large for a
/// Duration saturate at [`Duration::MAX`].
pub(crate) fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.)).unwrap_or(Duration::MAX)
}

/// Used to decide whether to enforce realtime mode for a dispatch loop thread.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub enum RealtimeConfig {
    Enforce,
    Ignore,
}

/// Parameters for checking a Cartesian path with inverse kinematics.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CartesianPathOptions {
    /// Maximum end-effector translation between two samples in \[m\].
    pub pos_spacing: f64,
    /// Maximum end-effector rotation between two samples in \[rad\].
    pub rot_spacing: f64,
    /// Number of samples including both end points. 0 derives it from the spacings.
    pub num_steps: usize,
    /// Maximum per-joint change between two samples before they count as inconsistent in \[rad\].
    pub consistent_angle: f64,
    /// If false, collisions are ignored.
    pub collision_aware: bool,
    /// Collisions are checked at every n-th sample and at the last one. 0 is treated as 1.
    pub collision_check_resolution: usize,
    /// Number of invalid samples after which the remaining ones are not checked anymore.
    /// None checks all samples.
    pub steps_before_abort: Option<usize>,
    /// Solve the end of the path first and work backwards.
    pub start_from_end: bool,
    /// Number of configured alternate start angles to try if the first attempt fails.
    pub use_additional_start_angles: usize,
    /// Preferred direction in joint space the IK seed is pushed towards.
    pub joints_bias: Option<Joints>,
    /// Length of the push along `joints_bias` in \[rad\]. 0 disables biasing.
    pub bias_radius: f64,
}

impl Default for CartesianPathOptions {
    fn default() -> Self {
        CartesianPathOptions {
            pos_spacing: 0.01,
            rot_spacing: 0.1,
            num_steps: 0,
            consistent_angle: PI / 9.,
            collision_aware: true,
            collision_check_resolution: 1,
            steps_before_abort: None,
            start_from_end: false,
            use_additional_start_angles: 0,
            joints_bias: None,
            bias_radius: 0.,
        }
    }
}

/// Joint bounds a biased IK seed is clamped to in \[rad\].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BiasLimits {
    pub lower: Joints,
    pub upper: Joints,
}

impl Default for BiasLimits {
    fn default() -> Self {
        // continuous joints are effectively unbounded
        BiasLimits {
            lower: [-2.27, -0.54, -3.9, -2.34, -1e6, -2.15, -1e6],
            upper: [0.69, 1.33, 0.79, 0.0, 1e6, 0.0, 1e6],
        }
    }
}

/// Timing parameters of the dispatch loops. All times in \[s\].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Time between two commanded equilibrium points.
    pub time_quantum: f64,
    /// Number of stopping-predicate polls per time quantum.
    pub poll_divisions: u32,
    /// Hard ceiling for the angular speed of joint moves in \[rad/s\].
    pub max_angular_speed: f64,
    /// Pause after a completed joint move.
    pub settle_time: f64,
    /// Offset of the first point of a timed trajectory.
    pub trajectory_start_delay: f64,
    /// Time a blocking trajectory dispatch waits beyond the trajectory duration.
    pub completion_timeout_margin: f64,
    /// Lower bound for the duration of a trajectory segment.
    pub min_segment_time: f64,
    /// Indices of joints without limits, normalized towards the previous trajectory point.
    pub continuous_joints: Vec<usize>,
    pub realtime_config: RealtimeConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            time_quantum: 0.025,
            poll_divisions: 5,
            max_angular_speed: FRAC_PI_2,
            settle_time: 0.025,
            trajectory_start_delay: 0.05,
            completion_timeout_margin: 5.,
            min_segment_time: 0.01,
            continuous_joints: vec![4, 6],
            realtime_config: RealtimeConfig::Ignore,
        }
    }
}

impl DispatchConfig {
    pub fn time_quantum(&self) -> Duration {
        seconds(self.time_quantum)
    }

    /// Sleep interval while waiting for the next tick.
    pub fn poll_interval(&self) -> Duration {
        self.time_quantum() / self.poll_divisions.max(1)
    }
}

/// Parameters of force-guarded moves.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ForceStopConfig {
    /// Force opposing the motion at which a move stops in \[N\].
    pub force_threshold: f64,
    /// Force magnitude at which a move stops regardless of direction in \[N\].
    pub max_force: f64,
    /// Number of readings averaged for the force bias.
    pub bias_samples: usize,
    /// Time between two bias readings in \[s\].
    pub bias_interval: f64,
    /// Pause between biasing and moving in \[s\].
    pub pre_move_pause: f64,
}

impl Default for ForceStopConfig {
    fn default() -> Self {
        ForceStopConfig {
            force_threshold: 3.,
            max_force: 45.,
            bias_samples: 20,
            bias_interval: 0.02,
            pre_move_pause: 0.5,
        }
    }
}

/// Parameters of Cartesian moves executed as interpolated IK trajectories.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CartesianMoveConfig {
    /// Goal position tolerance in \[m\].
    pub pos_threshold: f64,
    /// Goal orientation tolerance in \[rad\].
    pub rot_threshold: f64,
    /// Maximum time to wait for the trajectory in \[s\].
    pub timeout: f64,
    /// Time to wait after the trajectory finished before checking the goal in \[s\].
    pub settling_time: f64,
    /// Translation between two interpolated poses in \[m\].
    pub step_size: f64,
    /// Rotation between two interpolated poses in \[rad\].
    pub rot_spacing: f64,
    /// Consistency threshold used for interpolated IK moves in \[rad\].
    pub consistent_angle: f64,
    /// Maximum joint velocity in \[rad/s\].
    pub max_joint_vel: f64,
}

impl Default for CartesianMoveConfig {
    fn default() -> Self {
        CartesianMoveConfig {
            pos_threshold: 0.02,
            rot_threshold: 0.1,
            timeout: 30.,
            settling_time: 0.25,
            step_size: 0.005,
            rot_spacing: 0.1,
            consistent_angle: PI / 4.,
            max_joint_vel: 0.15,
        }
    }
}

/// Complete configuration of an [`ArmController`](`crate::ArmController`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PlannerConfig {
    /// Frame all poses handed to the planner have to be expressed in.
    pub base_frame: String,
    pub path: CartesianPathOptions,
    pub bias_limits: BiasLimits,
    /// Pre-chosen seeds tried if planning from the current configuration fails.
    pub alternate_start_angles: Vec<Joints>,
    pub dispatch: DispatchConfig,
    pub force_stop: ForceStopConfig,
    pub cartesian_move: CartesianMoveConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            base_frame: "base_link".to_string(),
            path: CartesianPathOptions::default(),
            bias_limits: BiasLimits::default(),
            alternate_start_angles: Vec::new(),
            dispatch: DispatchConfig::default(),
            force_stop: ForceStopConfig::default(),
            cartesian_move: CartesianMoveConfig::default(),
        }
    }
}

impl PlannerConfig {
    /// Parses a configuration from JSON.
    /// # Errors
    /// * [`ConfigException`](`crate::exception::MotionException::ConfigException`) if the JSON is
    /// malformed or has wrongly typed fields.
    pub fn from_json_str(json: &str) -> MotionResult<Self> {
        serde_json::from_str(json).map_err(|e| MotionException::ConfigException {
            message: e.to_string(),
        })
    }

    /// Reads a configuration from a JSON file.
    /// # Errors
    /// * [`ConfigException`](`crate::exception::MotionException::ConfigException`) if the file
    /// cannot be read or parsed.
    pub fn from_file<S: AsRef<Path>>(path: S) -> MotionResult<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| MotionException::ConfigException {
                message: format!("{}: {}", path.as_ref().display(), e),
            })?;
        PlannerConfig::from_json_str(&content)
    }

    pub fn to_json_string(&self) -> MotionResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MotionException::ConfigException {
            message: e.to_string(),
        })
    }
}

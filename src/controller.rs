// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the ArmController type which combines planning and dispatching for one arm.
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::{error, info};

use crate::arm::arm_model::ArmModel;
use crate::arm::feedback::ArmFeedback;
use crate::arm::motion_sink::MotionSink;
use crate::arm::ArmId;
use crate::config::{seconds, CartesianPathOptions, PlannerConfig};
use crate::dispatch::clock::Clock;
use crate::dispatch::reason::{ReasonCode, StoppingPredicate};
use crate::dispatch::Dispatcher;
use crate::exception::{create_trajectory_exception, MotionException, MotionResult};
use crate::planner::bias::{run_biased_ik, BIASED_IK_ITERATIONS};
use crate::planner::path_check::PathChecker;
use crate::pose::Pose;
use crate::utils::{max_joint_delta, Joints};

/// Result of [`move_cartesian_ik`](`ArmController::move_cartesian_ik`).
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The interpolated path has at least one step which is not
    /// [`Ok`](`crate::planner::step_status::StepStatus::Ok`).
    NoSolution,
    /// The trajectory was sent and the move did not wait for it.
    SentGoal,
    /// The trajectory did not finish in time.
    TimedOut,
    /// The end effector is within the goal tolerances.
    Success,
    /// The trajectory finished but the end effector is not within the goal tolerances.
    Failed,
}

impl Display for MoveOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MoveOutcome::NoSolution => "no solution",
            MoveOutcome::SentGoal => "sent goal",
            MoveOutcome::TimedOut => "timed out",
            MoveOutcome::Success => "success",
            MoveOutcome::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Wrist force reading without bias, rotated into the base frame if requested.
fn compensated_wrist_force<M: ArmModel + ?Sized, F: ArmFeedback + ?Sized>(
    model: &M,
    feedback: &F,
    arm: ArmId,
    force_bias: &Vector3<f64>,
    filtered: bool,
    base_frame: bool,
) -> MotionResult<Vector3<f64>> {
    let reading = feedback
        .wrist_force(arm, filtered)
        .ok_or(MotionException::NoStateReceived { arm })?;
    let force = reading - force_bias;
    if !base_frame {
        return Ok(force);
    }
    let joint_angles = feedback
        .joint_angles(arm)
        .ok_or(MotionException::NoStateReceived { arm })?;
    Ok(model.forward_kinematics(arm, &joint_angles).rotation * force)
}

/// Plans and executes motions of one arm.
///
/// The controller reads the arm state through an [`ArmFeedback`], solves kinematics with an
/// [`ArmModel`] and sends equilibrium points and trajectories to a [`MotionSink`]. All poses
/// handed to it have to be expressed in the configured base frame.
///
/// # Example
/// ```no_run
/// # use arm_motion::{ArmController, ArmId, ArmModel, ArmFeedback, MotionSink, SystemClock};
/// # use arm_motion::{MotionResult, PlannerConfig, Pose};
/// # use nalgebra::Vector3;
/// # fn plan<M: ArmModel, F: ArmFeedback, S: MotionSink>(model: M, feedback: F, sink: S) -> MotionResult<()> {
/// let config = PlannerConfig::from_file("planner.json")?;
/// let mut controller = ArmController::new(ArmId::Right, model, feedback, sink, SystemClock, config);
/// let goal = controller.current_pose()?.translated(&Vector3::new(0.1, 0., 0.));
/// let outcome = controller.move_cartesian_ik(&goal, true, true, None, 0.)?;
/// println!("{}", outcome);
/// # Ok(())
/// # }
/// ```
pub struct ArmController<M: ArmModel, F: ArmFeedback, S: MotionSink, C: Clock> {
    arm: ArmId,
    model: M,
    feedback: F,
    sink: S,
    clock: C,
    config: PlannerConfig,
    force_bias: Vector3<f64>,
}

impl<M: ArmModel, F: ArmFeedback, S: MotionSink, C: Clock> ArmController<M, F, S, C> {
    /// Creates a new ArmController with zero force bias.
    pub fn new(arm: ArmId, model: M, feedback: F, sink: S, clock: C, config: PlannerConfig) -> Self {
        ArmController {
            arm,
            model,
            feedback,
            sink,
            clock,
            config,
            force_bias: Vector3::zeros(),
        }
    }

    pub fn arm(&self) -> ArmId {
        self.arm
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Force bias subtracted from wrist force readings in \[N\].
    pub fn force_bias(&self) -> Vector3<f64> {
        self.force_bias
    }

    /// Latest measured joint angles.
    /// # Errors
    /// * [`NoStateReceived`](`MotionException::NoStateReceived`) if no angles were received yet.
    pub fn current_joint_angles(&self) -> MotionResult<Joints> {
        self.feedback
            .joint_angles(self.arm)
            .ok_or(MotionException::NoStateReceived { arm: self.arm })
    }

    /// Latest joint equilibrium point.
    /// # Errors
    /// * [`NoStateReceived`](`MotionException::NoStateReceived`) if no JEP was received yet.
    pub fn current_jep(&self) -> MotionResult<Joints> {
        self.feedback
            .jep(self.arm)
            .ok_or(MotionException::NoStateReceived { arm: self.arm })
    }

    /// Pose of the end effector in the base frame, computed from the measured joint angles.
    pub fn current_pose(&self) -> MotionResult<Pose> {
        let joint_angles = self.current_joint_angles()?;
        Ok(Pose::from_isometry(
            self.config.base_frame.as_str(),
            self.model.forward_kinematics(self.arm, &joint_angles),
        ))
    }

    /// Wrist force with the force bias subtracted in \[N\].
    /// # Arguments
    /// * `filtered` - Use the filtered instead of the raw reading.
    /// * `base_frame` - Rotate the force from the wrist frame into the base frame.
    /// # Errors
    /// * [`NoStateReceived`](`MotionException::NoStateReceived`) if no force or, for
    /// `base_frame`, no joint angles were received yet.
    pub fn wrist_force(&self, filtered: bool, base_frame: bool) -> MotionResult<Vector3<f64>> {
        compensated_wrist_force(
            &self.model,
            &self.feedback,
            self.arm,
            &self.force_bias,
            filtered,
            base_frame,
        )
    }

    /// Averages the filtered wrist force over the configured number of samples and stores it as
    /// force bias.
    /// # Return
    /// The new force bias.
    pub fn bias_wrist_force(&mut self) -> MotionResult<Vector3<f64>> {
        let samples = self.config.force_stop.bias_samples.max(1);
        let interval = seconds(self.config.force_stop.bias_interval);
        info!(arm = %self.arm, samples, "biasing wrist force");
        let mut sum = Vector3::zeros();
        for _ in 0..samples {
            sum += self
                .feedback
                .wrist_force(self.arm, true)
                .ok_or(MotionException::NoStateReceived { arm: self.arm })?;
            self.clock.sleep(interval);
        }
        self.force_bias = sum / samples as f64;
        info!(arm = %self.arm, bias = ?self.force_bias, "wrist force biased");
        Ok(self.force_bias)
    }

    /// Moves the joint equilibrium point linearly to `target`, see
    /// [`Dispatcher::go_jep`](`crate::dispatch::Dispatcher::go_jep`).
    pub fn go_jep(
        &mut self,
        target: &Joints,
        max_speed: f64,
        stop: StoppingPredicate,
    ) -> MotionResult<ReasonCode> {
        let jep = self.current_jep()?;
        Dispatcher::new(self.arm, &mut self.sink, &self.clock, &self.config.dispatch)?
            .go_jep(&jep, target, max_speed, stop)
    }

    /// Solves IK for `target` once and blends to the solution in joint space. The angular speed
    /// is chosen so that the move takes as long as a straight line at `linear_speed` \[m/s\].
    /// # Arguments
    /// * `q_guess` - Seed of the IK query, the measured joint angles if None.
    /// # Return
    /// [`IkFailure`](`ReasonCode::IkFailure`) if `target` has no solution, otherwise see
    /// [`go_jep`](`Self::go_jep`).
    pub fn go_cep(
        &mut self,
        target: &Pose,
        linear_speed: f64,
        stop: StoppingPredicate,
        q_guess: Option<Joints>,
    ) -> MotionResult<ReasonCode> {
        target.expect_frame(&self.config.base_frame)?;
        let q_start = self.current_joint_angles()?;
        let seed = q_guess.unwrap_or(q_start);
        let q_end = match self
            .model
            .inverse_kinematics(self.arm, target.isometry(), &seed, false)
        {
            Some(q) => q,
            None => {
                info!(arm = %self.arm, "no IK solution for {}", target);
                return Ok(ReasonCode::IkFailure);
            }
        };
        let p_start = self.model.forward_kinematics(self.arm, &q_start).translation.vector;
        let distance = (target.position() - p_start).norm();
        let max_change = max_joint_delta(&q_start, &q_end);
        let angular_speed = if distance > 0. && max_change > 0. {
            max_change * linear_speed / distance
        } else {
            self.config.dispatch.max_angular_speed
        };
        self.go_jep(&q_end, angular_speed, stop)
    }

    /// Moves the end effector along a straight line to `target`, see
    /// [`Dispatcher::go_cep_interpolate`](`crate::dispatch::Dispatcher::go_cep_interpolate`).
    pub fn go_cep_interpolate(
        &mut self,
        target: &Pose,
        linear_speed: f64,
        stop: StoppingPredicate,
    ) -> MotionResult<ReasonCode> {
        target.expect_frame(&self.config.base_frame)?;
        let jep = self.current_jep()?;
        Dispatcher::new(self.arm, &mut self.sink, &self.clock, &self.config.dispatch)?
            .go_cep_interpolate(&self.model, &jep, target, linear_speed, stop)
    }

    /// Moves the end effector by `displacement` until it makes contact.
    ///
    /// The move stops once the wrist force in the base frame, projected on the direction opposite
    /// to the motion, exceeds the force threshold, or once its magnitude exceeds the configured
    /// maximum force.
    /// # Arguments
    /// * `displacement` - Translation in the base frame in \[m\].
    /// * `force_threshold` - in \[N\], the configured threshold if None.
    /// * `linear_speed` - in \[m/s\].
    /// * `bias` - Bias the wrist force before moving.
    /// # Return
    /// [`Stopped`](`ReasonCode::Stopped`) on contact, otherwise see
    /// [`go_cep_interpolate`](`Self::go_cep_interpolate`).
    /// # Errors
    /// * [`NoStateReceived`](`MotionException::NoStateReceived`) if no wrist force or joint
    /// angles are available, before or during the move. A move losing its force reading is
    /// stopped.
    pub fn move_till_hit(
        &mut self,
        displacement: &Vector3<f64>,
        force_threshold: Option<f64>,
        linear_speed: f64,
        bias: bool,
    ) -> MotionResult<ReasonCode> {
        let length = displacement.norm();
        if !(length > 0.) {
            return Err(create_trajectory_exception("displacement must not be zero"));
        }
        let direction = displacement / length;
        let jep = self.current_jep()?;
        let cep = self.model.forward_kinematics(self.arm, &jep);
        if bias {
            self.bias_wrist_force()?;
        }
        self.clock.sleep(seconds(self.config.force_stop.pre_move_pause));
        self.wrist_force(true, true)?;
        let force_threshold = force_threshold.unwrap_or(self.config.force_stop.force_threshold);
        let target = Pose::new(
            self.config.base_frame.as_str(),
            cep.translation.vector + displacement,
            cep.rotation,
        );

        let model = &self.model;
        let feedback = &self.feedback;
        let force_bias = self.force_bias;
        let arm = self.arm;
        let max_force = self.config.force_stop.max_force;
        let mut sensor_error = None;
        let mut stop = || {
            match compensated_wrist_force(model, feedback, arm, &force_bias, true, true) {
                Ok(force) => {
                    let opposing = -force.dot(&direction);
                    opposing > force_threshold || force.norm() > max_force
                }
                Err(e) => {
                    sensor_error = Some(e);
                    true
                }
            }
        };
        let reason = Dispatcher::new(self.arm, &mut self.sink, &self.clock, &self.config.dispatch)?
            .go_cep_interpolate(model, &jep, &target, linear_speed, &mut stop)?;
        if let Some(e) = sensor_error {
            error!(arm = %self.arm, "lost wrist force reading, move stopped");
            return Err(e);
        }
        info!(arm = %self.arm, %reason, "move till hit finished");
        Ok(reason)
    }

    /// Checks the straight line path from `start_pose` to `end_pose` and sends it as trajectory
    /// if every step is [`Ok`](`crate::planner::step_status::StepStatus::Ok`).
    /// # Arguments
    /// * `start_pose` - Start of the path, the current pose if None.
    /// * `options` - Path check options.
    /// * `max_joint_vel` - in \[rad/s\].
    /// # Return
    /// true if the trajectory was sent.
    pub fn command_interpolated_ik(
        &mut self,
        end_pose: &Pose,
        start_pose: Option<&Pose>,
        options: &CartesianPathOptions,
        max_joint_vel: f64,
    ) -> MotionResult<bool> {
        end_pose.expect_frame(&self.config.base_frame)?;
        let current = self.current_joint_angles()?;
        let start_pose = match start_pose {
            Some(pose) => pose.clone(),
            None => self.current_pose()?,
        };
        start_pose.expect_frame(&self.config.base_frame)?;

        let path = PathChecker::new(&self.model, self.arm, options, &self.config.bias_limits)
            .with_alternate_start_angles(&self.config.alternate_start_angles)
            .check_cartesian_path(&start_pose, end_pose, &current)?;
        if !path.is_success() {
            info!(
                arm = %self.arm,
                worst = %path.worst_status(),
                "can't execute an interpolated IK trajectory to {}",
                end_pose
            );
            return Ok(false);
        }
        Dispatcher::new(self.arm, &mut self.sink, &self.clock, &self.config.dispatch)?
            .dispatch_trajectory(&current, &path.trajectory(), max_joint_vel, false)?;
        Ok(true)
    }

    /// Moves to `goal_pose` along a straight line checked with interpolated IK, using the
    /// Cartesian move configuration.
    /// # Arguments
    /// * `collision_aware` - Reject paths with collisions.
    /// * `blocking` - Wait for the trajectory and check whether the goal was reached.
    /// * `joints_bias` - Preferred direction of the IK solutions in joint space.
    /// * `bias_radius` - Length of the bias push in \[rad\].
    pub fn move_cartesian_ik(
        &mut self,
        goal_pose: &Pose,
        collision_aware: bool,
        blocking: bool,
        joints_bias: Option<Joints>,
        bias_radius: f64,
    ) -> MotionResult<MoveOutcome> {
        let move_config = self.config.cartesian_move.clone();
        let options = CartesianPathOptions {
            pos_spacing: move_config.step_size,
            rot_spacing: move_config.rot_spacing,
            num_steps: 0,
            consistent_angle: move_config.consistent_angle,
            collision_aware,
            joints_bias,
            bias_radius,
            ..self.config.path.clone()
        };
        let outcome = if !self.command_interpolated_ik(
            goal_pose,
            None,
            &options,
            move_config.max_joint_vel,
        )? {
            MoveOutcome::NoSolution
        } else if !blocking {
            MoveOutcome::SentGoal
        } else if !self
            .sink
            .wait_for_completion(self.arm, seconds(move_config.timeout))
        {
            MoveOutcome::TimedOut
        } else {
            self.clock.sleep(seconds(move_config.settling_time));
            if self.check_cartesian_really_done(
                goal_pose,
                move_config.pos_threshold,
                move_config.rot_threshold,
            )? {
                MoveOutcome::Success
            } else {
                MoveOutcome::Failed
            }
        };
        info!(arm = %self.arm, %outcome, "Cartesian IK move finished");
        Ok(outcome)
    }

    /// Checks whether the end effector is within `pos_threshold` \[m\] and `rot_threshold`
    /// \[rad\] of `goal_pose`.
    pub fn check_cartesian_really_done(
        &self,
        goal_pose: &Pose,
        pos_threshold: f64,
        rot_threshold: f64,
    ) -> MotionResult<bool> {
        goal_pose.expect_frame(&self.config.base_frame)?;
        let current = self.current_pose()?;
        Ok(current.translation_distance(goal_pose) <= pos_threshold
            && current.rotation_distance(goal_pose) <= rot_threshold)
    }

    /// Sends a joint trajectory starting at the measured joint angles, see
    /// [`Dispatcher::dispatch_trajectory`](`crate::dispatch::Dispatcher::dispatch_trajectory`).
    pub fn command_joint_trajectory(
        &mut self,
        trajectory: &[Joints],
        max_joint_vel: f64,
        blocking: bool,
    ) -> MotionResult<ReasonCode> {
        let current = self.current_joint_angles()?;
        Dispatcher::new(self.arm, &mut self.sink, &self.clock, &self.config.dispatch)?
            .dispatch_trajectory(&current, trajectory, max_joint_vel, blocking)
    }

    /// Solves `pose` with biased IK and moves to the solution in joint space.
    /// # Errors
    /// * [`NoIkSolution`](`MotionException::NoIkSolution`) if no solution was found.
    pub fn move_arm_pose_biased(
        &mut self,
        pose: &Pose,
        joints_bias: &Joints,
        max_joint_vel: f64,
        blocking: bool,
    ) -> MotionResult<ReasonCode> {
        pose.expect_frame(&self.config.base_frame)?;
        match run_biased_ik(
            &self.model,
            self.arm,
            pose.isometry(),
            joints_bias,
            BIASED_IK_ITERATIONS,
            &self.config.bias_limits,
        ) {
            Some(solution) => self.command_joint_trajectory(&[solution], max_joint_vel, blocking),
            None => {
                error!(arm = %self.arm, "no IK solution found for goal pose {}", pose);
                Err(MotionException::NoIkSolution {
                    message: format!("no IK solution found for goal pose {}", pose),
                })
            }
        }
    }
}

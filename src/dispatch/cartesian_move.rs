// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the straight line Cartesian blend.
use tracing::{debug, info, warn};

use crate::arm::arm_model::ArmModel;
use crate::arm::motion_sink::MotionSink;
use crate::dispatch::clock::Clock;
use crate::dispatch::reason::{ReasonCode, StoppingPredicate};
use crate::dispatch::Dispatcher;
use crate::exception::{create_trajectory_exception, MotionResult};
use crate::pose::Pose;
use crate::utils::Joints;

/// Rotations below this angle in \[rad\] do not need a tick of their own.
const ROTATION_TOLERANCE: f64 = 1e-9;

impl<'a, S: MotionSink + ?Sized, C: Clock + ?Sized> Dispatcher<'a, S, C> {
    /// Moves the end effector along a straight line to `target`.
    ///
    /// The start pose is the forward kinematics of `current`. Every tick advances the position by
    /// `linear_speed` times the time quantum and the orientation by the same fraction of the
    /// total rotation; the last tick lands exactly on `target`. Each pose is solved with the
    /// solution of the previous tick as seed and the result is emitted as equilibrium point.
    ///
    /// # Arguments
    /// * `model` - Kinematic model of the arm.
    /// * `current` - Current joint equilibrium point in \[rad\].
    /// * `target` - Target pose of the end effector.
    /// * `linear_speed` - Speed of the end effector in \[m/s\].
    /// * `stop` - Polled before the move and while waiting for each tick.
    /// # Return
    /// [`Reached`](`ReasonCode::Reached`), [`Stopped`](`ReasonCode::Stopped`) or
    /// [`IkFailure`](`ReasonCode::IkFailure`) if an intermediate pose could not be solved.
    /// # Errors
    /// * [`InvalidTrajectory`](`crate::exception::MotionException::InvalidTrajectory`) if
    /// `linear_speed` is not positive.
    pub fn go_cep_interpolate<M: ArmModel + ?Sized>(
        &mut self,
        model: &M,
        current: &Joints,
        target: &Pose,
        linear_speed: f64,
        stop: StoppingPredicate,
    ) -> MotionResult<ReasonCode> {
        if !(linear_speed > 0.) {
            return Err(create_trajectory_exception(
                "linear speed of a Cartesian move has to be positive",
            ));
        }
        let start = Pose::from_isometry(
            target.frame_id(),
            model.forward_kinematics(self.arm, current),
        );
        let step_length = linear_speed * self.config.time_quantum;
        let distance = start.translation_distance(target);
        let mut steps = (distance / step_length - 1e-9).ceil().max(0.) as usize;
        if steps == 0 && start.rotation_distance(target) > ROTATION_TOLERANCE {
            steps = 1;
        }
        debug!(arm = %self.arm, steps, distance, "Cartesian move from {}", start);

        if stop() {
            return Ok(ReasonCode::Stopped);
        }
        if steps == 0 {
            return Ok(ReasonCode::Reached);
        }

        let step = if distance > 0. {
            (target.position() - start.position()) * (step_length / distance)
        } else {
            target.position() - start.position()
        };
        let mut seed = *current;
        let mut ticker = self.ticker();
        for k in 1..=steps {
            let pose = if k == steps {
                target.clone()
            } else {
                let orientation = start
                    .interpolate(target, k as f64 / steps as f64)
                    .orientation();
                Pose::new(
                    target.frame_id(),
                    start.position() + step * k as f64,
                    orientation,
                )
            };
            match model.inverse_kinematics(self.arm, pose.isometry(), &seed, false) {
                Some(jep) => {
                    self.sink.emit_configuration(self.arm, &jep);
                    seed = jep;
                }
                None => {
                    warn!(arm = %self.arm, step = k, steps, "no IK solution for {}", pose);
                    return Ok(ReasonCode::IkFailure);
                }
            }
            if !ticker.wait(stop) {
                info!(arm = %self.arm, step = k, steps, "Cartesian move stopped");
                return Ok(ReasonCode::Stopped);
            }
        }
        Ok(ReasonCode::Reached)
    }
}

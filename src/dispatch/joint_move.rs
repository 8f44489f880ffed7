// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the linear joint space blend.
use tracing::{debug, info, warn};

use crate::arm::motion_sink::MotionSink;
use crate::config::seconds;
use crate::dispatch::clock::Clock;
use crate::dispatch::reason::{ReasonCode, StoppingPredicate};
use crate::dispatch::Dispatcher;
use crate::exception::{create_trajectory_exception, MotionResult};
use crate::utils::{max_joint_delta, Joints, Vector7};

impl<'a, S: MotionSink + ?Sized, C: Clock + ?Sized> Dispatcher<'a, S, C> {
    /// Moves the joint equilibrium point linearly from `current` to `target`.
    ///
    /// One intermediate configuration is emitted per time quantum. The number of steps is chosen
    /// so that no joint moves faster than `max_speed`, the last emitted configuration is `target`.
    /// After a completed move the dispatcher pauses for the settle time.
    ///
    /// # Arguments
    /// * `current` - Current joint equilibrium point in \[rad\].
    /// * `target` - Target joint equilibrium point in \[rad\].
    /// * `max_speed` - Maximum angular speed in \[rad/s\]. Values above the configured ceiling
    /// are clamped to it.
    /// * `stop` - Polled before the move and while waiting for each tick.
    /// # Return
    /// [`Reached`](`ReasonCode::Reached`) or [`Stopped`](`ReasonCode::Stopped`).
    /// # Errors
    /// * [`InvalidTrajectory`](`crate::exception::MotionException::InvalidTrajectory`) if
    /// `max_speed` is not positive.
    pub fn go_jep(
        &mut self,
        current: &Joints,
        target: &Joints,
        max_speed: f64,
        stop: StoppingPredicate,
    ) -> MotionResult<ReasonCode> {
        if !(max_speed > 0.) {
            return Err(create_trajectory_exception(
                "angular speed of a joint move has to be positive",
            ));
        }
        let speed = if max_speed > self.config.max_angular_speed {
            warn!(
                arm = %self.arm,
                requested = max_speed,
                ceiling = self.config.max_angular_speed,
                "clamping angular speed"
            );
            self.config.max_angular_speed
        } else {
            max_speed
        };

        let max_change = max_joint_delta(current, target);
        let mut steps = (max_change / speed / self.config.time_quantum).round() as usize;
        if steps == 0 && max_change > 0. {
            steps = 1;
        }
        debug!(arm = %self.arm, steps, max_change, speed, "joint move");

        if stop() {
            return Ok(ReasonCode::Stopped);
        }
        if steps == 0 {
            return Ok(ReasonCode::Reached);
        }

        let start = Vector7::from_row_slice(current);
        let step = (Vector7::from_row_slice(target) - start) / steps as f64;
        let mut ticker = self.ticker();
        for k in 1..=steps {
            let jep = if k == steps {
                *target
            } else {
                let mut jep = [0.; 7];
                jep.copy_from_slice((start + step * k as f64).as_slice());
                jep
            };
            self.sink.emit_configuration(self.arm, &jep);
            if !ticker.wait(stop) {
                info!(arm = %self.arm, step = k, steps, "joint move stopped");
                return Ok(ReasonCode::Stopped);
            }
        }
        self.clock.sleep(seconds(self.config.settle_time));
        Ok(ReasonCode::Reached)
    }
}

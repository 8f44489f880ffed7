// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the velocity-profiled dispatcher.
//!
//! The [`Dispatcher`] sends joint configurations to a [`MotionSink`] in one of three ways:
//! * [`go_jep`](`Dispatcher::go_jep`) - blends linearly in joint space, one equilibrium point per
//! time quantum.
//! * [`go_cep_interpolate`](`Dispatcher::go_cep_interpolate`) - moves the end effector along a
//! straight line, solving IK at every time quantum.
//! * [`dispatch_trajectory`](`Dispatcher::dispatch_trajectory`) - sends a whole timed trajectory
//! at once.
//!
//! The tick loops keep their deadlines aligned to the start of the motion: the deadline of every
//! tick is the previous deadline plus one time quantum, so processing jitter does not accumulate.
use std::cmp::min;
use std::time::{Duration, Instant};

use crate::arm::motion_sink::MotionSink;
use crate::arm::ArmId;
use crate::config::DispatchConfig;
use crate::dispatch::clock::Clock;
use crate::dispatch::control_tools::apply_realtime_config;
use crate::exception::{MotionException, MotionResult};

pub mod cartesian_move;
pub mod clock;
pub mod control_tools;
pub mod joint_move;
pub mod reason;
pub mod timed_trajectory;

/// Sends motions of one arm to a [`MotionSink`].
pub struct Dispatcher<'a, S: MotionSink + ?Sized, C: Clock + ?Sized> {
    arm: ArmId,
    sink: &'a mut S,
    clock: &'a C,
    config: &'a DispatchConfig,
}

impl<'a, S: MotionSink + ?Sized, C: Clock + ?Sized> Dispatcher<'a, S, C> {
    /// Creates a new Dispatcher and applies the realtime configuration to the calling thread.
    /// # Errors
    /// * [`RealTimeException`](`crate::exception::MotionException::RealTimeException`) if realtime
    /// mode is enforced but cannot be applied.
    /// * [`ConfigException`](`crate::exception::MotionException::ConfigException`) if the time
    /// quantum is too large to schedule a tick.
    pub fn new(
        arm: ArmId,
        sink: &'a mut S,
        clock: &'a C,
        config: &'a DispatchConfig,
    ) -> MotionResult<Self> {
        if clock.now().checked_add(config.time_quantum()).is_none() {
            return Err(MotionException::ConfigException {
                message: format!("time quantum of {} s is out of range", config.time_quantum),
            });
        }
        apply_realtime_config(config.realtime_config)?;
        Ok(Dispatcher {
            arm,
            sink,
            clock,
            config,
        })
    }

    pub fn arm(&self) -> ArmId {
        self.arm
    }

    fn ticker(&self) -> Ticker<'a, C> {
        Ticker::new(self.clock, self.config)
    }
}

/// Deadline keeping for the tick loops.
struct Ticker<'c, C: Clock + ?Sized> {
    clock: &'c C,
    quantum: Duration,
    poll_interval: Duration,
    deadline: Instant,
}

impl<'c, C: Clock + ?Sized> Ticker<'c, C> {
    fn new(clock: &'c C, config: &DispatchConfig) -> Self {
        let quantum = config.time_quantum();
        Ticker {
            clock,
            quantum,
            poll_interval: config.poll_interval(),
            deadline: clock.now() + quantum,
        }
    }

    /// Waits for the current deadline while polling `stop`, then moves the deadline one quantum
    /// further.
    /// # Return
    /// false if `stop` fired.
    fn wait(&mut self, stop: &mut dyn FnMut() -> bool) -> bool {
        loop {
            if stop() {
                return false;
            }
            let now = self.clock.now();
            if now >= self.deadline {
                break;
            }
            self.clock
                .sleep(min(self.poll_interval, self.deadline - now));
        }
        self.deadline += self.quantum;
        true
    }
}

// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains functions to time a joint trajectory and to send it in one go.
use std::iter::once;
use std::time::Duration;

use tracing::{info, warn};

use crate::arm::motion_sink::{MotionSink, TimedJointPoint};
use crate::config::seconds;
use crate::dispatch::clock::Clock;
use crate::dispatch::reason::ReasonCode;
use crate::dispatch::Dispatcher;
use crate::exception::{create_trajectory_exception, MotionResult};
use crate::utils::{unwrap_angle_near, Joints, NUM_JOINTS};

/// Computes time stamps and joint velocities for a trajectory.
///
/// Every segment takes as long as its slowest joint needs at the joint's maximum velocity, but at
/// least `min_segment_time`. The velocity at an intermediate point is the mean of the velocities
/// of the two adjacent segments, or zero for joints which reverse their direction there. The
/// first and the last point have zero velocity.
///
/// # Arguments
/// * `trajectory` - Joint configurations in \[rad\].
/// * `max_joint_vels` - Maximum velocity of each joint in \[rad/s\].
/// * `min_segment_time` - Lower bound for the duration of a segment in \[s\].
/// # Return
/// Time stamps in \[s\] relative to the first point, starting at 0, and one velocity vector in
/// \[rad/s\] per point.
/// # Errors
/// * [`InvalidTrajectory`](`crate::exception::MotionException::InvalidTrajectory`) if the
/// trajectory is empty, contains a non-finite angle or a maximum velocity is not positive.
pub fn trajectory_times_and_vels(
    trajectory: &[Joints],
    max_joint_vels: &Joints,
    min_segment_time: f64,
) -> MotionResult<(Vec<f64>, Vec<Joints>)> {
    if trajectory.is_empty() {
        return Err(create_trajectory_exception("trajectory is empty"));
    }
    if max_joint_vels.iter().any(|vel| !(*vel > 0.)) {
        return Err(create_trajectory_exception(
            "maximum joint velocities have to be positive",
        ));
    }
    if trajectory.iter().flatten().any(|angle| !angle.is_finite()) {
        return Err(create_trajectory_exception("joint angles have to be finite"));
    }

    let mut times = vec![0.];
    let mut segment_vels: Vec<Joints> = Vec::with_capacity(trajectory.len() - 1);
    for pair in trajectory.windows(2) {
        let mut segment_time = min_segment_time.max(0.);
        for j in 0..NUM_JOINTS {
            segment_time = segment_time.max((pair[1][j] - pair[0][j]).abs() / max_joint_vels[j]);
        }
        let mut vel = [0.; NUM_JOINTS];
        if segment_time > 0. {
            for j in 0..NUM_JOINTS {
                vel[j] = (pair[1][j] - pair[0][j]) / segment_time;
            }
        }
        segment_vels.push(vel);
        let last = times[times.len() - 1];
        times.push(last + segment_time);
    }

    let mut vels = vec![[0.; NUM_JOINTS]; trajectory.len()];
    for i in 1..trajectory.len().saturating_sub(1) {
        let before = &segment_vels[i - 1];
        let after = &segment_vels[i];
        for j in 0..NUM_JOINTS {
            vels[i][j] = if before[j] * after[j] < 0. {
                0.
            } else {
                (before[j] + after[j]) / 2.
            };
        }
    }
    Ok((times, vels))
}

/// Shifts the continuous joints of every point by multiples of 2π so that they stay within π of
/// the previous point, starting from `reference`.
pub fn normalize_trajectory(
    trajectory: &[Joints],
    reference: &Joints,
    continuous_joints: &[usize],
) -> Vec<Joints> {
    let mut previous = *reference;
    trajectory
        .iter()
        .map(|point| {
            let mut out = *point;
            for &j in continuous_joints.iter().filter(|j| **j < NUM_JOINTS) {
                out[j] = unwrap_angle_near(point[j], previous[j]);
            }
            previous = out;
            out
        })
        .collect()
}

impl<'a, S: MotionSink + ?Sized, C: Clock + ?Sized> Dispatcher<'a, S, C> {
    /// Sends a joint trajectory to the sink in one call.
    ///
    /// The continuous joints are normalized towards `current`, `current` is prepended as first
    /// point and the points are timed with [`trajectory_times_and_vels`]. The first point is due
    /// after the configured start delay.
    ///
    /// # Arguments
    /// * `current` - Current joint angles in \[rad\].
    /// * `trajectory` - Joint configurations to pass through in \[rad\].
    /// * `max_joint_vel` - Maximum velocity of every joint in \[rad/s\].
    /// * `blocking` - If true, waits until the sink reports completion or the last time stamp
    /// plus the completion timeout margin has passed.
    /// # Return
    /// [`Sent`](`ReasonCode::Sent`) if not blocking, otherwise [`Reached`](`ReasonCode::Reached`)
    /// or [`Timeout`](`ReasonCode::Timeout`).
    /// # Errors
    /// * [`InvalidTrajectory`](`crate::exception::MotionException::InvalidTrajectory`) if the
    /// trajectory is empty, `max_joint_vel` is not positive or the trajectory takes longer than a
    /// [`Duration`] can hold.
    pub fn dispatch_trajectory(
        &mut self,
        current: &Joints,
        trajectory: &[Joints],
        max_joint_vel: f64,
        blocking: bool,
    ) -> MotionResult<ReasonCode> {
        if trajectory.is_empty() {
            return Err(create_trajectory_exception("trajectory is empty"));
        }
        let normalized = normalize_trajectory(trajectory, current, &self.config.continuous_joints);
        let points: Vec<Joints> = once(*current).chain(normalized).collect();
        let (times, vels) = trajectory_times_and_vels(
            &points,
            &[max_joint_vel; NUM_JOINTS],
            self.config.min_segment_time,
        )?;
        let duration = times[times.len() - 1];
        let end_time = self.config.trajectory_start_delay.max(0.) + duration;
        if Duration::try_from_secs_f64(end_time).is_err() {
            return Err(create_trajectory_exception("trajectory duration is out of range"));
        }

        let timed: Vec<TimedJointPoint> = points
            .iter()
            .zip(vels.iter())
            .zip(times.iter())
            .map(|((positions, velocities), time)| TimedJointPoint {
                positions: *positions,
                velocities: *velocities,
                time_from_start: seconds(self.config.trajectory_start_delay + time),
            })
            .collect();
        self.sink.emit_timed_trajectory(self.arm, &timed);
        info!(
            arm = %self.arm,
            points = timed.len(),
            duration,
            "sent joint trajectory"
        );

        if !blocking {
            return Ok(ReasonCode::Sent);
        }
        let timeout = seconds(duration + self.config.completion_timeout_margin);
        if self.sink.wait_for_completion(self.arm, timeout) {
            Ok(ReasonCode::Reached)
        } else {
            warn!(arm = %self.arm, ?timeout, "joint trajectory timed out");
            Ok(ReasonCode::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::arm::motion_sink::MockMotionSink;
    use crate::arm::ArmId;
    use crate::config::DispatchConfig;
    use crate::dispatch::clock::SimulatedClock;
    use crate::dispatch::reason::ReasonCode;
    use crate::dispatch::timed_trajectory::{normalize_trajectory, trajectory_times_and_vels};
    use crate::dispatch::Dispatcher;
    use crate::exception::MotionException;
    use crate::test_support::RecordingSink;
    use std::f64::consts::PI;
    use std::time::Duration;

    fn slice_compare(a: &[f64], b: &[f64], thresh: f64) {
        for i in 0..a.len() {
            assert!((a[i] - b[i]).abs() < thresh, "{:?} != {:?}", a, b);
        }
    }

    fn joints(first: f64, second: f64) -> [f64; 7] {
        [first, second, 0., 0., 0., 0., 0.]
    }

    #[test]
    fn times_follow_slowest_joint() {
        let trajectory = [joints(0., 0.), joints(0.2, 0.1), joints(0.4, 0.4)];
        let (times, vels) =
            trajectory_times_and_vels(&trajectory, &[0.2; 7], 0.01).unwrap();
        slice_compare(&times, &[0., 1., 2.5], 1e-12);
        assert_eq!(vels[0], [0.; 7]);
        assert_eq!(vels[2], [0.; 7]);
        // mean of 0.2 and 0.2 / 1.5 for joint 1, 0.1 and 0.2 for joint 2
        slice_compare(
            &vels[1],
            &joints((0.2 + 0.2 / 1.5) / 2., (0.1 + 0.2) / 2.),
            1e-12,
        );
    }

    #[test]
    fn reversal_has_zero_velocity() {
        let trajectory = [joints(0., 0.), joints(0.2, 0.2), joints(0., 0.4)];
        let (_, vels) = trajectory_times_and_vels(&trajectory, &[0.2; 7], 0.01).unwrap();
        slice_compare(&vels[1], &joints(0., 0.2), 1e-12);
    }

    #[test]
    fn repeated_points_take_min_segment_time() {
        let trajectory = [joints(0.1, 0.), joints(0.1, 0.)];
        let (times, vels) = trajectory_times_and_vels(&trajectory, &[0.2; 7], 0.01).unwrap();
        slice_compare(&times, &[0., 0.01], 1e-12);
        assert_eq!(vels, vec![[0.; 7]; 2]);

        let (times, vels) = trajectory_times_and_vels(&[joints(0.1, 0.)], &[0.2; 7], 0.).unwrap();
        assert_eq!(times, vec![0.]);
        assert_eq!(vels.len(), 1);
    }

    #[test]
    fn invalid_timing_input() {
        assert!(matches!(
            trajectory_times_and_vels(&[], &[0.2; 7], 0.01),
            Err(MotionException::InvalidTrajectory { .. })
        ));
        let mut vels = [0.2; 7];
        vels[3] = 0.;
        assert!(matches!(
            trajectory_times_and_vels(&[[0.; 7]; 2], &vels, 0.01),
            Err(MotionException::InvalidTrajectory { .. })
        ));
        assert!(matches!(
            trajectory_times_and_vels(&[[0.; 7], joints(f64::INFINITY, 0.)], &[0.2; 7], 0.01),
            Err(MotionException::InvalidTrajectory { .. })
        ));
        assert!(matches!(
            trajectory_times_and_vels(&[joints(0., f64::NAN)], &[0.2; 7], 0.01),
            Err(MotionException::InvalidTrajectory { .. })
        ));
    }

    #[test]
    fn far_away_angles_are_unwrapped() {
        let mut far = [0.; 7];
        far[4] = 1e17;
        far[6] = -12345.6;
        let normalized = normalize_trajectory(&[far], &[0.; 7], &[4, 6]);
        assert!(normalized[0][4].abs() <= PI + 1e-9, "{}", normalized[0][4]);
        assert!(normalized[0][6].abs() <= PI + 1e-9, "{}", normalized[0][6]);
        let turns = (normalized[0][6] + 12345.6) / (2. * PI);
        assert!((turns - turns.round()).abs() < 1e-6);
    }

    #[test]
    fn continuous_joints_are_unwrapped() {
        let mut reference = [0.; 7];
        reference[4] = 3.;
        let mut first = [0.; 7];
        first[4] = -3.;
        first[3] = -3.;
        let mut second = first;
        second[4] = -2.5;
        let normalized = normalize_trajectory(&[first, second], &reference, &[4, 6, 9]);
        assert!((normalized[0][4] - (2. * PI - 3.)).abs() < 1e-12);
        assert!((normalized[1][4] - (2. * PI - 2.5)).abs() < 1e-12);
        // limited joints are left alone
        assert_eq!(normalized[0][3], -3.);
    }

    #[test]
    fn non_blocking_dispatch() {
        let mut sink = RecordingSink::default();
        let clock = SimulatedClock::new();
        let config = DispatchConfig::default();
        let current = joints(0.1, 0.);
        let reason = Dispatcher::new(ArmId::Right, &mut sink, &clock, &config)
            .unwrap()
            .dispatch_trajectory(&current, &[joints(0.3, 0.), joints(0.5, 0.1)], 0.2, false)
            .unwrap();
        assert_eq!(reason, ReasonCode::Sent);
        assert!(sink.timeouts.is_empty());
        assert_eq!(sink.trajectories.len(), 1);
        let points = &sink.trajectories[0];
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].positions, current);
        assert_eq!(points[0].velocities, [0.; 7]);
        assert_eq!(points[2].velocities, [0.; 7]);
        assert_eq!(points[0].time_from_start, Duration::from_millis(50));
        assert!(
            (points[2].time_from_start.as_secs_f64() - 2.05).abs() < 1e-6,
            "{:?}",
            points[2].time_from_start
        );
        for pair in points.windows(2) {
            assert!(pair[0].time_from_start < pair[1].time_from_start);
        }
    }

    #[test]
    fn blocking_dispatch() {
        let mut sink = RecordingSink::completing();
        let clock = SimulatedClock::new();
        let config = DispatchConfig::default();
        let reason = Dispatcher::new(ArmId::Left, &mut sink, &clock, &config)
            .unwrap()
            .dispatch_trajectory(&[0.; 7], &[joints(0.2, 0.)], 0.2, true)
            .unwrap();
        assert_eq!(reason, ReasonCode::Reached);
        // one second of motion and the completion margin
        assert_eq!(sink.timeouts.len(), 1);
        assert!((sink.timeouts[0].as_secs_f64() - 6.).abs() < 1e-6);

        let mut sink = MockMotionSink::new();
        sink.expect_emit_timed_trajectory()
            .times(1)
            .withf(|arm, points| *arm == ArmId::Left && points.len() == 2)
            .return_const(());
        sink.expect_wait_for_completion()
            .times(1)
            .return_const(false);
        let reason = Dispatcher::new(ArmId::Left, &mut sink, &clock, &config)
            .unwrap()
            .dispatch_trajectory(&[0.; 7], &[joints(0.2, 0.)], 0.2, true)
            .unwrap();
        assert_eq!(reason, ReasonCode::Timeout);
    }

    #[test]
    fn too_slow_trajectory_is_rejected() {
        let mut sink = MockMotionSink::new();
        sink.expect_emit_timed_trajectory().never();
        sink.expect_wait_for_completion().never();
        let clock = SimulatedClock::new();
        let config = DispatchConfig::default();
        let result = Dispatcher::new(ArmId::Right, &mut sink, &clock, &config)
            .unwrap()
            .dispatch_trajectory(&[0.; 7], &[[1.; 7]], 1e-300, true);
        assert!(matches!(
            result,
            Err(MotionException::InvalidTrajectory { .. })
        ));
    }

    #[test]
    fn empty_trajectory() {
        let mut sink = MockMotionSink::new();
        sink.expect_emit_timed_trajectory().never();
        let clock = SimulatedClock::new();
        let config = DispatchConfig::default();
        let result = Dispatcher::new(ArmId::Left, &mut sink, &clock, &config)
            .unwrap()
            .dispatch_trajectory(&[0.; 7], &[], 0.2, true);
        assert!(matches!(
            result,
            Err(MotionException::InvalidTrajectory { .. })
        ));
    }
}

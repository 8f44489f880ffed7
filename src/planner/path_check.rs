// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the PathChecker type which resolves a Cartesian path to joint configurations.
use tracing::{debug, info};

use crate::arm::arm_model::ArmModel;
use crate::arm::ArmId;
use crate::config::{BiasLimits, CartesianPathOptions};
use crate::exception::MotionResult;
use crate::planner::bias::bias_guess;
use crate::planner::sampler::sample_cartesian_path;
use crate::planner::step_status::{PathCheck, StepStatus, TrajectoryStep};
use crate::pose::Pose;
use crate::utils::{is_consistent, Joints};

/// Checks Cartesian paths for reachable, collision-free and consistent IK solutions.
///
/// Every sampled pose is first solved ignoring collisions. If that succeeds and collisions are
/// checked at this step, the pose is solved again collision-aware, seeded with the first solution.
/// The resulting configuration is compared against the one of the previous step to detect jumps
/// in joint space. Each solution seeds the next step.
///
/// If an attempt contains a step which is not [`Ok`](`StepStatus::Ok`), the whole path is checked
/// again starting from the next alternate seed, until one attempt succeeds or all seeds are used.
pub struct PathChecker<'a, M: ArmModel + ?Sized> {
    model: &'a M,
    arm: ArmId,
    options: &'a CartesianPathOptions,
    limits: &'a BiasLimits,
    alternate_start_angles: &'a [Joints],
}

impl<'a, M: ArmModel + ?Sized> PathChecker<'a, M> {
    /// Creates a new PathChecker without alternate start angles.
    /// # Arguments
    /// * `model` - Kinematic model used to solve the poses.
    /// * `arm` - Arm to plan for.
    /// * `options` - See [`CartesianPathOptions`].
    /// * `limits` - Bounds for biased seeds.
    pub fn new(
        model: &'a M,
        arm: ArmId,
        options: &'a CartesianPathOptions,
        limits: &'a BiasLimits,
    ) -> Self {
        PathChecker {
            model,
            arm,
            options,
            limits,
            alternate_start_angles: &[],
        }
    }

    /// Sets the pre-chosen seeds used when an attempt fails. Only the first
    /// `options.use_additional_start_angles` of them are tried.
    pub fn with_alternate_start_angles(mut self, alternate_start_angles: &'a [Joints]) -> Self {
        self.alternate_start_angles = alternate_start_angles;
        self
    }

    /// Interpolates between `start_pose` and `end_pose` and checks the resulting path.
    ///
    /// # Arguments
    /// * `start_pose` - First pose of the path.
    /// * `end_pose` - Last pose of the path, in the frame of `start_pose`.
    /// * `start_angles` - Configuration the solutions should stay close to.
    /// # Return
    /// One step per sampled pose, in path order.
    /// # Errors
    /// * [`InvalidSpacing`](`crate::exception::MotionException::InvalidSpacing`) if the options
    /// neither give a step count nor a positive spacing.
    /// * [`FrameMismatch`](`crate::exception::MotionException::FrameMismatch`) if the poses are
    /// expressed in different frames.
    pub fn check_cartesian_path(
        &self,
        start_pose: &Pose,
        end_pose: &Pose,
        start_angles: &Joints,
    ) -> MotionResult<PathCheck> {
        let poses = sample_cartesian_path(
            start_pose,
            end_pose,
            self.options.pos_spacing,
            self.options.rot_spacing,
            self.options.num_steps,
        )?;
        Ok(self.check_poses(&poses, start_angles))
    }

    /// Checks an already sampled path.
    /// # Return
    /// One step per pose, in the order of `poses`.
    pub fn check_poses(&self, poses: &[Pose], start_angles: &Joints) -> PathCheck {
        let mut ordered: Vec<&Pose> = poses.iter().collect();
        if self.options.start_from_end {
            ordered.reverse();
        }

        let additional = self
            .options
            .use_additional_start_angles
            .min(self.alternate_start_angles.len());
        let seeds = std::iter::once(start_angles)
            .chain(self.alternate_start_angles[..additional].iter());

        let mut steps = Vec::new();
        for (attempt, seed) in seeds.enumerate() {
            steps = self.attempt(&ordered, seed);
            if steps.iter().all(|step| step.status.is_ok()) {
                break;
            }
            info!(
                arm = %self.arm,
                attempt,
                remaining = additional - attempt,
                "path check attempt failed"
            );
        }

        if self.options.start_from_end {
            steps.reverse();
        }
        for (index, step) in steps.iter_mut().enumerate() {
            step.index = index;
        }
        PathCheck { steps }
    }

    fn bias(&self, q: &Joints) -> Joints {
        match &self.options.joints_bias {
            Some(joints_bias) => bias_guess(q, joints_bias, self.options.bias_radius, self.limits),
            None => *q,
        }
    }

    fn attempt(&self, poses: &[&Pose], start_angles: &Joints) -> Vec<TrajectoryStep> {
        let num_poses = poses.len();
        let stride = self.options.collision_check_resolution.max(1);
        let mut seed = self.bias(start_angles);
        let mut steps: Vec<TrajectoryStep> = Vec::with_capacity(num_poses);
        let mut invalid_steps = 0;

        for (index, pose) in poses.iter().enumerate() {
            let target = pose.isometry();
            let step = match self
                .model
                .inverse_kinematics(self.arm, target, &seed, false)
            {
                None => {
                    debug!(arm = %self.arm, index, "no IK solution, even ignoring collisions");
                    TrajectoryStep {
                        index,
                        joints: [0.; 7],
                        status: StepStatus::OutOfReach,
                    }
                }
                Some(colliding_solution) => {
                    let check_collisions = self.options.collision_aware
                        && (index % stride == 0 || index == num_poses - 1);
                    let (solution, collision_free) = if check_collisions {
                        match self.model.inverse_kinematics(
                            self.arm,
                            target,
                            &colliding_solution,
                            true,
                        ) {
                            Some(solution) => (solution, true),
                            None => {
                                debug!(arm = %self.arm, index, "no collision-free IK solution");
                                (colliding_solution, false)
                            }
                        }
                    } else {
                        (colliding_solution, true)
                    };

                    let consistent = match steps.last() {
                        Some(previous) if previous.status != StepStatus::OutOfReach => {
                            is_consistent(&previous.joints, &solution, self.options.consistent_angle)
                        }
                        _ => true,
                    };
                    let status = if !consistent {
                        debug!(arm = %self.arm, index, "IK solution inconsistent with previous step");
                        StepStatus::Inconsistent
                    } else if collision_free {
                        StepStatus::Ok
                    } else {
                        StepStatus::Collision
                    };
                    seed = self.bias(&solution);
                    TrajectoryStep {
                        index,
                        joints: solution,
                        status,
                    }
                }
            };
            let status = step.status;
            steps.push(step);

            if !status.is_ok() {
                invalid_steps += 1;
                if let Some(steps_before_abort) = self.options.steps_before_abort {
                    if invalid_steps >= steps_before_abort.max(1) {
                        info!(
                            arm = %self.arm,
                            index,
                            invalid_steps,
                            "aborting path check due to too many invalid steps"
                        );
                        steps.extend((index + 1..num_poses).map(|index| TrajectoryStep {
                            index,
                            joints: [0.; 7],
                            status: StepStatus::Aborted,
                        }));
                        break;
                    }
                }
            }
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use crate::arm::arm_model::MockArmModel;
    use crate::arm::ArmId;
    use crate::config::{BiasLimits, CartesianPathOptions};
    use crate::planner::path_check::PathChecker;
    use crate::planner::sampler::sample_cartesian_path;
    use crate::planner::step_status::StepStatus;
    use crate::pose::Pose;
    use crate::test_support::ToyArm;
    use nalgebra::{UnitQuaternion, Vector3};
    use std::f64::consts::PI;
    use std::sync::{Arc, Mutex};

    fn x_pose(x: f64) -> Pose {
        Pose::new("base_link", Vector3::new(x, 0., 0.), UnitQuaternion::identity())
    }

    fn check(arm: &ToyArm, options: &CartesianPathOptions) -> Vec<StepStatus> {
        let limits = BiasLimits::default();
        PathChecker::new(arm, ArmId::Right, options, &limits)
            .check_cartesian_path(&x_pose(0.), &x_pose(0.3), &[0.; 7])
            .unwrap()
            .statuses()
    }

    #[test]
    fn reachable_path_is_ok() {
        let arm = ToyArm::new(1.);
        let options = CartesianPathOptions::default();
        let limits = BiasLimits::default();
        let checker = PathChecker::new(&arm, ArmId::Right, &options, &limits);
        let result = checker
            .check_cartesian_path(&x_pose(0.), &x_pose(0.3), &[0.; 7])
            .unwrap();
        let sampled = sample_cartesian_path(&x_pose(0.), &x_pose(0.3), 0.01, 0.1, 0).unwrap();
        assert_eq!(result.len(), sampled.len());
        assert!(result.is_success());
        for (i, step) in result.steps.iter().enumerate() {
            assert_eq!(step.index, i);
            assert!((step.joints[0] - sampled[i].position().x).abs() < 1e-9);
        }
        // one collision-unaware and one collision-aware query per step
        assert_eq!(arm.ik_calls(), 2 * 31);
    }

    #[test]
    fn out_of_reach_steps() {
        let arm = ToyArm::new(0.195);
        let statuses = check(&arm, &CartesianPathOptions::default());
        assert_eq!(statuses.len(), 31);
        assert!(statuses[..20].iter().all(|s| *s == StepStatus::Ok));
        assert!(statuses[20..].iter().all(|s| *s == StepStatus::OutOfReach));
    }

    #[test]
    fn collisions_only_at_checked_steps() {
        let mut arm = ToyArm::new(1.);
        arm.obstacle = Some((Vector3::new(0.095, -1., -1.), Vector3::new(0.155, 1., 1.)));
        let statuses = check(&arm, &CartesianPathOptions::default());
        for (i, status) in statuses.iter().enumerate() {
            let expected = if (10..=15).contains(&i) {
                StepStatus::Collision
            } else {
                StepStatus::Ok
            };
            assert_eq!(*status, expected, "step {}", i);
        }

        let options = CartesianPathOptions {
            collision_check_resolution: 10,
            ..Default::default()
        };
        let statuses = check(&arm, &options);
        assert_eq!(statuses[10], StepStatus::Collision);
        assert!(statuses
            .iter()
            .enumerate()
            .all(|(i, s)| i == 10 || *s == StepStatus::Ok));

        let options = CartesianPathOptions {
            collision_aware: false,
            ..Default::default()
        };
        assert!(check(&arm, &options).iter().all(|s| *s == StepStatus::Ok));
    }

    #[test]
    fn jump_is_inconsistent() {
        let mut arm = ToyArm::new(1.);
        arm.flip_above_x = Some(0.155);
        let statuses = check(&arm, &CartesianPathOptions::default());
        for (i, status) in statuses.iter().enumerate() {
            let expected = if i == 16 {
                StepStatus::Inconsistent
            } else {
                StepStatus::Ok
            };
            assert_eq!(*status, expected, "step {}", i);
        }

        let options = CartesianPathOptions {
            consistent_angle: 1.1 * PI,
            ..Default::default()
        };
        assert!(check(&arm, &options).iter().all(|s| *s == StepStatus::Ok));
    }

    #[test]
    fn abort_after_invalid_steps() {
        let arm = ToyArm::new(0.195);
        let options = CartesianPathOptions {
            steps_before_abort: Some(2),
            ..Default::default()
        };
        let limits = BiasLimits::default();
        let result = PathChecker::new(&arm, ArmId::Right, &options, &limits)
            .check_cartesian_path(&x_pose(0.), &x_pose(0.3), &[0.; 7])
            .unwrap();
        let statuses = result.statuses();
        assert_eq!(statuses.len(), 31);
        assert!(statuses[..20].iter().all(|s| *s == StepStatus::Ok));
        assert_eq!(statuses[20], StepStatus::OutOfReach);
        assert_eq!(statuses[21], StepStatus::OutOfReach);
        assert!(statuses[22..].iter().all(|s| *s == StepStatus::Aborted));
        assert!(result.steps[22..].iter().all(|s| s.joints == [0.; 7]));
        // 20 ok steps with two queries each, then two failed queries
        assert_eq!(arm.ik_calls(), 42);
    }

    #[test]
    fn abort_bounds_consecutive_invalid_steps() {
        let arm = ToyArm::new(0.195);
        for k in 0..5 {
            let options = CartesianPathOptions {
                steps_before_abort: Some(k),
                ..Default::default()
            };
            let statuses = check(&arm, &options);
            let invalid_before_abort = statuses
                .iter()
                .take_while(|s| **s != StepStatus::Aborted)
                .filter(|s| !s.is_ok())
                .count();
            assert_eq!(invalid_before_abort, k.max(1));
            assert_eq!(*statuses.last().unwrap(), StepStatus::Aborted);
        }
    }

    #[test]
    fn start_from_end() {
        let arm = ToyArm::new(1.);
        let limits = BiasLimits::default();
        let forward_options = CartesianPathOptions::default();
        let backward_options = CartesianPathOptions {
            start_from_end: true,
            ..Default::default()
        };
        let forward = PathChecker::new(&arm, ArmId::Left, &forward_options, &limits)
            .check_cartesian_path(&x_pose(0.), &x_pose(0.3), &[0.; 7])
            .unwrap();
        let backward = PathChecker::new(&arm, ArmId::Left, &backward_options, &limits)
            .check_cartesian_path(&x_pose(0.), &x_pose(0.3), &[0.; 7])
            .unwrap();
        assert_eq!(forward, backward);

        // the round trip in reverse gives the same configurations in reverse order
        let round_trip = PathChecker::new(&arm, ArmId::Left, &backward_options, &limits)
            .check_cartesian_path(&x_pose(0.3), &x_pose(0.), &[0.; 7])
            .unwrap();
        let mut reversed = round_trip.trajectory();
        reversed.reverse();
        for (a, b) in reversed.iter().zip(forward.trajectory().iter()) {
            for j in 0..7 {
                assert!((a[j] - b[j]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn start_from_end_aborts_at_end() {
        let arm = ToyArm::new(0.195);
        let options = CartesianPathOptions {
            start_from_end: true,
            steps_before_abort: Some(1),
            ..Default::default()
        };
        let statuses = check(&arm, &options);
        assert_eq!(statuses[30], StepStatus::OutOfReach);
        assert!(statuses[..30].iter().all(|s| *s == StepStatus::Aborted));
    }

    #[test]
    fn retries_with_alternate_start_angles() {
        let mut model = MockArmModel::new();
        // only solvable when seeded close to the second alternate
        model
            .expect_inverse_kinematics()
            .returning(|_, _, seed, _| if seed[0] > 0.5 { Some([1.; 7]) } else { None });
        let limits = BiasLimits::default();
        let alternates = [[0.; 7], [1.; 7], [2.; 7]];

        let options = CartesianPathOptions {
            num_steps: 5,
            ..Default::default()
        };
        let result = PathChecker::new(&model, ArmId::Right, &options, &limits)
            .with_alternate_start_angles(&alternates)
            .check_cartesian_path(&x_pose(0.), &x_pose(0.3), &[0.; 7])
            .unwrap();
        assert_eq!(result.len(), 5);
        assert!(result.statuses().iter().all(|s| *s == StepStatus::OutOfReach));

        let options = CartesianPathOptions {
            num_steps: 5,
            use_additional_start_angles: 2,
            ..Default::default()
        };
        let result = PathChecker::new(&model, ArmId::Right, &options, &limits)
            .with_alternate_start_angles(&alternates)
            .check_cartesian_path(&x_pose(0.), &x_pose(0.3), &[0.; 7])
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.trajectory(), vec![[1.; 7]; 5]);
    }

    /// Solutions jump far away after x = 0.2, with no solution at x = 0.15 if `gap` is set.
    fn jumping_model(gap: bool) -> MockArmModel {
        let mut model = MockArmModel::new();
        model
            .expect_inverse_kinematics()
            .returning(move |_, pose, _, _| {
                let x = pose.translation.vector.x;
                if gap && (x - 0.15).abs() < 1e-6 {
                    None
                } else if x > 0.2 {
                    Some([3.; 7])
                } else {
                    Some([0.; 7])
                }
            });
        model
    }

    #[test]
    fn no_consistency_check_after_out_of_reach() {
        let limits = BiasLimits::default();
        let options = CartesianPathOptions {
            num_steps: 5,
            ..Default::default()
        };
        let model = jumping_model(true);
        let statuses = PathChecker::new(&model, ArmId::Right, &options, &limits)
            .check_cartesian_path(&x_pose(0.), &x_pose(0.3), &[0.; 7])
            .unwrap()
            .statuses();
        assert_eq!(
            statuses,
            vec![
                StepStatus::Ok,
                StepStatus::Ok,
                StepStatus::OutOfReach,
                StepStatus::Ok,
                StepStatus::Ok
            ]
        );

        let model = jumping_model(false);
        let statuses = PathChecker::new(&model, ArmId::Right, &options, &limits)
            .check_cartesian_path(&x_pose(0.), &x_pose(0.3), &[0.; 7])
            .unwrap()
            .statuses();
        assert_eq!(statuses[3], StepStatus::Inconsistent);
        assert_eq!(statuses[4], StepStatus::Ok);
    }

    #[test]
    fn seeds_are_pushed_along_joints_bias() {
        let seeds = Arc::new(Mutex::new(Vec::new()));
        let recorded = seeds.clone();
        let mut model = MockArmModel::new();
        model
            .expect_inverse_kinematics()
            .returning(move |_, _, seed, _| {
                recorded.lock().unwrap().push(*seed);
                Some(*seed)
            });
        let limits = BiasLimits::default();
        let options = CartesianPathOptions {
            num_steps: 3,
            collision_aware: false,
            joints_bias: Some([2., 0., 0., 0., 0., 0., 0.]),
            bias_radius: 0.1,
            ..Default::default()
        };
        let result = PathChecker::new(&model, ArmId::Right, &options, &limits)
            .check_cartesian_path(&x_pose(0.), &x_pose(0.3), &[0.; 7])
            .unwrap();
        assert!(result.is_success());
        let seeds = seeds.lock().unwrap().clone();
        assert_eq!(seeds.len(), 3);
        for (i, seed) in seeds.iter().enumerate() {
            assert!((seed[0] - 0.1 * (i + 1) as f64).abs() < 1e-12, "{:?}", seed);
            assert_eq!(seed[1..], [0.; 6]);
        }

        let options = CartesianPathOptions {
            joints_bias: None,
            ..options
        };
        let result = PathChecker::new(&model, ArmId::Right, &options, &limits)
            .check_cartesian_path(&x_pose(0.), &x_pose(0.3), &[0.; 7])
            .unwrap();
        assert_eq!(result.trajectory(), vec![[0.; 7]; 3]);
    }

    #[test]
    fn retries_stop_after_last_seed() {
        let mut model = MockArmModel::new();
        model
            .expect_inverse_kinematics()
            .times(3 * 4)
            .returning(|_, _, _, _| None);
        let limits = BiasLimits::default();
        let alternates = [[0.; 7], [1.; 7]];
        let options = CartesianPathOptions {
            num_steps: 4,
            use_additional_start_angles: 5,
            ..Default::default()
        };
        let result = PathChecker::new(&model, ArmId::Right, &options, &limits)
            .with_alternate_start_angles(&alternates)
            .check_cartesian_path(&x_pose(0.), &x_pose(0.3), &[0.; 7])
            .unwrap();
        assert_eq!(result.worst_status(), StepStatus::OutOfReach);
    }
}

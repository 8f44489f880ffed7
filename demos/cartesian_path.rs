// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

use arm_motion::{
    ArmController, ArmId, ArmModel, ArmStateCache, Joints, MotionResult, MotionSink,
    PathChecker, PlannerConfig, SimulatedClock, TimedJointPoint,
};
use clap::Parser;
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Checks a straight line Cartesian path on a simulated arm and executes it.
///
/// The simulated arm is a gantry with a spherical wrist: the first three joints are the position
/// of the end effector, the next three its orientation. Poses further than `reach` away from the
/// origin are unreachable.
#[derive(Parser, Debug)]
#[clap(name = "cartesian_path")]
struct CommandLineArguments {
    /// Displacement of the end effector along x in [m]
    #[clap(long, default_value_t = 0.3)]
    pub dx: f64,
    /// Displacement of the end effector along y in [m]
    #[clap(long, default_value_t = 0.)]
    pub dy: f64,
    /// Displacement of the end effector along z in [m]
    #[clap(long, default_value_t = 0.)]
    pub dz: f64,
    /// Reach of the simulated arm in [m]
    #[clap(long, default_value_t = 0.8)]
    pub reach: f64,
    /// Optional JSON planner configuration
    #[clap(long)]
    pub config: Option<String>,
}

struct GantryArm {
    reach: f64,
}

impl ArmModel for GantryArm {
    fn forward_kinematics(&self, _arm: ArmId, joints: &Joints) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(joints[0], joints[1], joints[2]),
            UnitQuaternion::from_scaled_axis(Vector3::new(joints[3], joints[4], joints[5])),
        )
    }

    fn inverse_kinematics(
        &self,
        _arm: ArmId,
        pose: &Isometry3<f64>,
        seed: &Joints,
        _collision_aware: bool,
    ) -> Option<Joints> {
        let p = pose.translation.vector;
        if p.norm() > self.reach {
            return None;
        }
        let axis = pose.rotation.scaled_axis();
        Some([p.x, p.y, p.z, axis.x, axis.y, axis.z, seed[6]])
    }
}

/// Executes trajectories instantly by writing them to the state cache.
struct SimulatedSink {
    cache: Arc<ArmStateCache>,
    last: Option<Joints>,
}

impl MotionSink for SimulatedSink {
    fn emit_configuration(&mut self, arm: ArmId, joints: &Joints) {
        self.cache.update_jep(arm, *joints);
        self.cache.update_joint_angles(arm, *joints);
    }

    fn emit_timed_trajectory(&mut self, arm: ArmId, points: &[TimedJointPoint]) {
        for point in points {
            info!(
                %arm,
                t = point.time_from_start.as_secs_f64(),
                "q = {:.3?}",
                point.positions
            );
        }
        self.last = points.last().map(|point| point.positions);
    }

    fn wait_for_completion(&mut self, arm: ArmId, _timeout: Duration) -> bool {
        match self.last.take() {
            Some(last) => {
                self.cache.update_joint_angles(arm, last);
                self.cache.update_jep(arm, last);
                true
            }
            None => false,
        }
    }
}

fn main() -> MotionResult<()> {
    tracing_subscriber::fmt::init();
    let args = CommandLineArguments::parse();
    let config = match &args.config {
        Some(path) => PlannerConfig::from_file(path)?,
        None => PlannerConfig::default(),
    };
    let model = GantryArm { reach: args.reach };
    let cache = Arc::new(ArmStateCache::new());
    let home = [0.3, -0.2, 0.1, 0., 0., 0., 0.];
    cache.update_joint_angles(ArmId::Right, home);
    cache.update_jep(ArmId::Right, home);

    let start = arm_motion::Pose::from_isometry(
        config.base_frame.as_str(),
        model.forward_kinematics(ArmId::Right, &home),
    );
    let end = start.translated(&Vector3::new(args.dx, args.dy, args.dz));
    let path = PathChecker::new(&model, ArmId::Right, &config.path, &config.bias_limits)
        .with_alternate_start_angles(&config.alternate_start_angles)
        .check_cartesian_path(&start, &end, &home)?;
    for step in &path.steps {
        println!("{:3} {:13} {:.3?}", step.index, step.status.to_string(), step.joints);
    }
    if !path.is_success() {
        println!("path from {} to {} is blocked: {}", start, end, path.worst_status());
        return Ok(());
    }

    let sink = SimulatedSink {
        cache: cache.clone(),
        last: None,
    };
    let mut controller =
        ArmController::new(ArmId::Right, model, cache, sink, SimulatedClock::new(), config);
    let outcome = controller.move_cartesian_ik(&end, true, true, None, 0.)?;
    println!("move: {}", outcome);
    let reason = controller.go_cep_interpolate(&start, 0.1, &mut || false)?;
    println!("back to start: {} after {:?}", reason, controller.clock().elapsed());
    Ok(())
}

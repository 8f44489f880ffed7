// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Cartesian path sampler.
use crate::exception::{MotionException, MotionResult};
use crate::pose::Pose;

/// Tolerance applied before rounding the number of intervals up, so that distances which are an
/// exact multiple of the spacing do not gain an extra interval through floating point noise.
const INTERVAL_ROUNDING_TOLERANCE: f64 = 1e-9;

/// Interpolates poses between `start` and `end`, both included.
///
/// Positions are interpolated linearly, orientations along the shortest arc.
///
/// # Arguments
/// * `start` - First pose of the path.
/// * `end` - Last pose of the path. Has to be expressed in the frame of `start`.
/// * `pos_spacing` - Maximum translation between two consecutive poses in \[m\].
/// * `rot_spacing` - Maximum rotation between two consecutive poses in \[rad\].
/// * `num_steps` - Number of poses to produce. Values of 1 are raised to 2. If 0, the number of
/// poses is derived from the spacings: `ceil(max(translation / pos_spacing, rotation / rot_spacing)) + 1`.
/// A spacing which is not positive does not contribute to this maximum.
///
/// # Errors
/// * [`InvalidSpacing`](`crate::exception::MotionException::InvalidSpacing`) if `num_steps` is 0
/// and neither spacing is positive.
/// * [`FrameMismatch`](`crate::exception::MotionException::FrameMismatch`) if the poses are
/// expressed in different frames.
pub fn sample_cartesian_path(
    start: &Pose,
    end: &Pose,
    pos_spacing: f64,
    rot_spacing: f64,
    num_steps: usize,
) -> MotionResult<Vec<Pose>> {
    end.expect_frame(start.frame_id())?;
    let num_poses = if num_steps > 0 {
        num_steps.max(2)
    } else {
        if pos_spacing <= 0. && rot_spacing <= 0. {
            return Err(MotionException::InvalidSpacing {
                pos_spacing,
                rot_spacing,
            });
        }
        let mut ratio: f64 = 0.;
        if pos_spacing > 0. {
            ratio = ratio.max(start.translation_distance(end) / pos_spacing);
        }
        if rot_spacing > 0. {
            ratio = ratio.max(start.rotation_distance(end) / rot_spacing);
        }
        let intervals = ((ratio - INTERVAL_ROUNDING_TOLERANCE).ceil() as usize).max(1);
        intervals + 1
    };

    let last = num_poses - 1;
    Ok((0..num_poses)
        .map(|i| match i {
            0 => start.clone(),
            i if i == last => end.clone(),
            i => start.interpolate(end, i as f64 / last as f64),
        })
        .collect())
}

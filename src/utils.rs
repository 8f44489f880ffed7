// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! contains useful type definitions and conversion functions.
use nalgebra::{Isometry3, Matrix4, Rotation3, SVector, UnitQuaternion, Vector3};
use std::f64::consts::PI;

/// Number of joints of a supported arm.
pub const NUM_JOINTS: usize = 7;
/// Joint configuration in \[rad\].
pub type Joints = [f64; NUM_JOINTS];
/// A Vector with 7 entries
pub type Vector7 = SVector<f64, NUM_JOINTS>;

/// converts a 4x4 column-major homogenous matrix to an Isometry
///
/// The rotational part is taken as is, check it with [`is_homogeneous_transformation`] first.
pub fn array_to_isometry(array: &[f64; 16]) -> Isometry3<f64> {
    let rot = Rotation3::from_matrix_unchecked(
        Matrix4::from_column_slice(array)
            .remove_column(3)
            .remove_row(3),
    );
    Isometry3::from_parts(
        Vector3::new(array[12], array[13], array[14]).into(),
        UnitQuaternion::from_rotation_matrix(&rot),
    )
}

/// Determines whether the given array represents a valid homogeneous transformation matrix.
/// transform is represented as a 4x4 matrix in column-major format
#[allow(clippy::float_cmp)]
pub fn is_homogeneous_transformation(transform: &[f64; 16]) -> bool {
    const ORTHONORMAL_THRESHOLD: f64 = 1e-5;
    if transform[3] != 0.0 || transform[7] != 0.0 || transform[11] != 0.0 || transform[15] != 1.0 {
        return false;
    }
    let matrix = Matrix4::from_column_slice(transform);
    for j in 0..3 {
        let column_norm = matrix.fixed_view::<3, 1>(0, j).norm();
        let row_norm = matrix.fixed_view::<1, 3>(j, 0).norm();
        if (column_norm - 1.).abs() > ORTHONORMAL_THRESHOLD
            || (row_norm - 1.).abs() > ORTHONORMAL_THRESHOLD
        {
            return false;
        }
    }
    true
}

/// Largest absolute per-joint difference between two configurations.
pub fn max_joint_delta(a: &Joints, b: &Joints) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0., f64::max)
}

/// Two configurations are consistent if no joint moves more than `threshold` between them.
pub fn is_consistent(a: &Joints, b: &Joints, threshold: f64) -> bool {
    max_joint_delta(a, b) <= threshold
}

/// Shifts `angle` by multiples of 2π so that it lies within π of `reference`.
///
/// Used for continuous joints whose IK solutions may wrap around.
pub fn unwrap_angle_near(angle: f64, reference: f64) -> f64 {
    if !angle.is_finite() || !reference.is_finite() {
        return angle;
    }
    let delta = angle - reference;
    if delta.abs() <= PI {
        return angle;
    }
    reference + (delta + PI).rem_euclid(2. * PI) - PI
}

#[cfg(test)]
mod test {
    use crate::utils::{
        array_to_isometry, is_consistent, is_homogeneous_transformation, max_joint_delta,
        unwrap_angle_near,
    };
    use std::f64::consts::PI;

    fn float_compare(a: f64, b: f64, thresh: f64) {
        assert!((a - b).abs() < thresh, "{} != {}", a, b);
    }

    #[test]
    fn isometry_from_flipped_end_effector() {
        // end effector pointing down, 0.3 m in front of and 0.48 m above the base
        let y = [
            1.0, 0.0, 0.0, 0.0, //
            0.0, -1.0, 0.0, 0.0, //
            0.0, 0.0, -1.0, 0.0, //
            0.30689056659844144, 0.0, 0.4868820527992277, 1.0,
        ];
        assert!(is_homogeneous_transformation(&y));
        let isometry = array_to_isometry(&y);
        float_compare(isometry.translation.vector.x, 0.30689056659844144, 1e-12);
        float_compare(isometry.translation.vector.z, 0.4868820527992277, 1e-12);
        float_compare(isometry.rotation.angle(), PI, 1e-9);
    }

    #[test]
    fn rejects_non_homogeneous() {
        let mut y = [0.; 16];
        y[0] = 1.;
        y[5] = 1.;
        y[10] = 2.;
        y[15] = 1.;
        assert!(!is_homogeneous_transformation(&y));
        y[10] = 1.;
        assert!(is_homogeneous_transformation(&y));
        y[3] = 0.5;
        assert!(!is_homogeneous_transformation(&y));
    }

    #[test]
    fn joint_deltas() {
        let a = [0., 0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let b = [0., 0.1, -0.2, 0.3, 0.4, 0.5, 0.6];
        float_compare(max_joint_delta(&a, &b), 0.4, 1e-12);
        assert!(is_consistent(&a, &b, 0.5));
        assert!(!is_consistent(&a, &b, 0.3));
        float_compare(max_joint_delta(&a, &a), 0., 1e-12);
    }

    #[test]
    fn unwraps_towards_reference() {
        float_compare(unwrap_angle_near(3. * PI / 2., 0.), -PI / 2., 1e-12);
        float_compare(unwrap_angle_near(-3. * PI / 2., 0.), PI / 2., 1e-12);
        float_compare(unwrap_angle_near(0.1, 4. * PI), 4. * PI + 0.1, 1e-12);
        float_compare(unwrap_angle_near(0.2, 0.1), 0.2, 1e-12);
    }

    #[test]
    fn unwraps_huge_angles() {
        for angle in [1e17, -1e17, 1e300, 2e6 * PI + 0.3] {
            let out = unwrap_angle_near(angle, 1.);
            assert!((out - 1.).abs() <= PI + 1e-9, "{} -> {}", angle, out);
        }
        float_compare(unwrap_angle_near(2e6 * PI + 0.3, 0.), 0.3, 1e-6);
        assert!(unwrap_angle_near(f64::INFINITY, 0.).is_infinite());
    }
}

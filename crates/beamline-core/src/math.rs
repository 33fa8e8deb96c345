//! Small geometry helpers over raw tuples.
//!
//! Volumes store translation and rotation as plain `(f64, f64, f64)` triples;
//! matrices and rotated vectors are derived on demand, never cached.

/// A translation or rotation triple. Rotations are in degrees.
pub type Vec3 = (f64, f64, f64);

/// An RGBA color with components in `[0, 1]`.
pub type Color = (f64, f64, f64, f64);

/// A 3x3 row-major rotation matrix.
pub type Mat3 = [[f64; 3]; 3];

/// Derive the rotation matrix for a volume rotation triple: the X rotation
/// is applied first, then Y, then Z. Angles are in degrees.
pub fn rotation_matrix(rotation: Vec3) -> Mat3 {
    let rx = about_x(rotation.0.to_radians());
    let ry = about_y(rotation.1.to_radians());
    let rz = about_z(rotation.2.to_radians());
    mat_mul(rz, mat_mul(ry, rx))
}

/// Rotate a vector about the Y axis by `angle_deg` degrees.
pub fn rotate_about_y(v: Vec3, angle_deg: f64) -> Vec3 {
    let (s, c) = angle_deg.to_radians().sin_cos();
    (c * v.0 + s * v.2, v.1, -s * v.0 + c * v.2)
}

fn about_x(a: f64) -> Mat3 {
    let (s, c) = a.sin_cos();
    [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]]
}

fn about_y(a: f64) -> Mat3 {
    let (s, c) = a.sin_cos();
    [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]]
}

fn about_z(a: f64) -> Mat3 {
    let (s, c) = a.sin_cos();
    [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]]
}

fn mat_mul(a: Mat3, b: Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn assert_vec3_eq(a: Vec3, b: Vec3) {
        assert!((a.0 - b.0).abs() < EPS, "x: {} vs {}", a.0, b.0);
        assert!((a.1 - b.1).abs() < EPS, "y: {} vs {}", a.1, b.1);
        assert!((a.2 - b.2).abs() < EPS, "z: {} vs {}", a.2, b.2);
    }

    #[test]
    fn rotate_about_y_quarter_turn() {
        // +x rotates into -z after 90 degrees (right-handed about +y).
        assert_vec3_eq(rotate_about_y((1.0, 0.0, 0.0), 90.0), (0.0, 0.0, -1.0));
        assert_vec3_eq(rotate_about_y((0.0, 0.0, 1.0), 90.0), (1.0, 0.0, 0.0));
    }

    #[test]
    fn rotate_about_y_zero_is_identity() {
        assert_vec3_eq(rotate_about_y((3.0, -2.0, 7.5), 0.0), (3.0, -2.0, 7.5));
    }

    #[test]
    fn rotate_about_y_full_turn_is_identity() {
        assert_vec3_eq(rotate_about_y((1.0, 2.0, 3.0), 360.0), (1.0, 2.0, 3.0));
    }

    #[test]
    fn rotation_matrix_identity_for_zero_rotation() {
        let m = rotation_matrix((0.0, 0.0, 0.0));
        for (i, row) in m.iter().enumerate() {
            for (j, &cell) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((cell - expected).abs() < EPS);
            }
        }
    }

    #[test]
    fn rotation_matrix_applies_x_first() {
        // Rotating (0, 1, 0) by 90 about X gives (0, 0, 1); a subsequent 90
        // about Y carries that into (1, 0, 0).
        let m = rotation_matrix((90.0, 90.0, 0.0));
        let v = (0.0, 1.0, 0.0);
        let out = (
            m[0][0] * v.0 + m[0][1] * v.1 + m[0][2] * v.2,
            m[1][0] * v.0 + m[1][1] * v.1 + m[1][2] * v.2,
            m[2][0] * v.0 + m[2][1] * v.1 + m[2][2] * v.2,
        );
        assert_vec3_eq(out, (1.0, 0.0, 0.0));
    }
}

//! Coordinate conversion from the host's Z-up space to the Y-up output space.

use glam::{DMat4, DQuat, DVec3};

/// Quarter turn about X taking host +Z onto output +Y.
///
/// Applied to geometry before export, and appended to camera matrices
/// because host cameras look down their local -Z with +Y up in a Z-up world.
pub const ROT_X_PI2: DMat4 = DMat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, -1.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
]);

/// Convert a host (Z-up) vector to output (Y-up) axes.
pub fn to_y_up(v: [f64; 3]) -> [f64; 3] {
    [v[0], v[2], -v[1]]
}

/// Build a matrix from host row-major storage (`rows[row][col]`).
pub fn matrix_from_rows(rows: &[[f64; 4]; 4]) -> DMat4 {
    DMat4::from_cols_array_2d(rows).transpose()
}

/// Export a host-space matrix as 16 floats in output column-major order,
/// swapping axes so the result is expressed in Y-up space.
pub fn export_matrix(m: &DMat4) -> [f64; 16] {
    // glam indexes columns: m.col(c)[r] == host m[r][c]
    let e = |r: usize, c: usize| m.col(c)[r];
    [
        e(0, 0), e(2, 0), -e(1, 0), e(3, 0),
        e(0, 2), e(2, 2), e(2, 1), e(3, 1),
        -e(0, 1), e(1, 2), e(1, 1), e(3, 2),
        e(0, 3), e(2, 3), -e(1, 3), e(3, 3),
    ]
}

/// Convert a host-space quaternion to output axes, as `[x, y, z, w]`.
pub fn export_quat(q: DQuat) -> [f64; 4] {
    [q.x, q.z, -q.y, q.w]
}

/// Decompose a host matrix into (translation, rotation, scale).
pub fn decompose(m: &DMat4) -> (DVec3, DQuat, DVec3) {
    let (scale, rotation, translation) = m.to_scale_rotation_translation();
    (translation, rotation, scale)
}

/// Matrix placing a directional light so that its position, seen from the
/// origin, points along the light's direction.
///
/// The output format derives a directional light's vector from the light's
/// translation relative to the scene origin, so the rotation is turned into
/// a translation at the same distance from the origin.
pub fn directional_light_matrix(world: &DMat4) -> DMat4 {
    let (location, rotation, _) = decompose(world);
    let direction = rotation * DVec3::new(0.0, 0.0, -1.0);
    DMat4::from_translation(-direction * location.length())
}

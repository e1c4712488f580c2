//! Math type aliases and helper functions.
//!
//! Projection helpers here produce matrices in the OpenGL clip convention
//! (+Y up, depth in `[-1, 1]`). Backends with a different convention expose
//! a clip matrix that callers apply after the projection (`clip * projection`).

pub use nalgebra;

/// 2D vector (f32).
pub type Vec2 = nalgebra::Vector2<f32>;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4D vector (f32).
pub type Vec4 = nalgebra::Vector4<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Right-handed perspective projection with depth range `[-1, 1]`.
pub fn perspective_gl(yfov: f32, aspect: f32, znear: f32, zfar: f32) -> Mat4 {
    let f = 1.0 / (yfov / 2.0).tan();
    let nf = 1.0 / (znear - zfar);
    #[rustfmt::skip]
    let result = Mat4::new(
        f / aspect, 0.0, 0.0,                     0.0,
        0.0,        f,   0.0,                     0.0,
        0.0,        0.0, (zfar + znear) * nf,     2.0 * zfar * znear * nf,
        0.0,        0.0, -1.0,                    0.0,
    );
    result
}

/// Right-handed orthographic projection with depth range `[-1, 1]`.
pub fn orthographic_gl(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let rml = right - left;
    let tmb = top - bottom;
    let fmn = far - near;
    #[rustfmt::skip]
    let result = Mat4::new(
        2.0 / rml, 0.0,       0.0,        -(right + left) / rml,
        0.0,       2.0 / tmb, 0.0,        -(top + bottom) / tmb,
        0.0,       0.0,       -2.0 / fmn, -(far + near) / fmn,
        0.0,       0.0,       0.0,        1.0,
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(m: &Mat4, p: Vec4) -> Vec4 {
        let clip = m * p;
        clip / clip.w
    }

    #[test]
    fn test_perspective_maps_near_and_far() {
        let proj = perspective_gl(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let near = project(&proj, Vec4::new(0.0, 0.0, -0.1, 1.0));
        let far = project(&proj, Vec4::new(0.0, 0.0, -100.0, 1.0));
        assert!((near.z + 1.0).abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_orthographic_maps_box_to_cube() {
        let proj = orthographic_gl(-2.0, 2.0, -1.0, 1.0, 0.0, 10.0);
        let corner = proj * Vec4::new(2.0, 1.0, -10.0, 1.0);
        assert!((corner.x - 1.0).abs() < 1e-6);
        assert!((corner.y - 1.0).abs() < 1e-6);
        assert!((corner.z - 1.0).abs() < 1e-6);
    }
}

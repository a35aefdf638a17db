//! Perspective camera and the frustum slice the particle field lives in.
//!
//! The camera sits on the +Z axis looking at the origin. It never moves; only
//! its aspect ratio changes on resize.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::config::CameraSettings;

// ============================================================================
// Camera
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub fov_degrees: f32,
    pub distance: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
}

impl Camera {
    pub fn new(settings: &CameraSettings, aspect: f32) -> Self {
        Self {
            fov_degrees: settings.fov_degrees,
            distance: settings.distance,
            near: settings.near,
            far: settings.far,
            aspect,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, self.distance)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), Vec3::ZERO, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Visible extent of the plane through the origin.
    pub fn frustum(&self) -> CameraFrustum {
        CameraFrustum::from_perspective(self.fov_degrees, self.aspect, self.distance)
    }

    pub fn to_uniforms(&self) -> CameraUniforms {
        let p = self.position();
        CameraUniforms {
            view_proj: self.view_projection_matrix().to_cols_array_2d(),
            position: [p.x, p.y, p.z, 1.0],
            near: self.near,
            far: self.far,
            _pad: [0.0; 2],
        }
    }
}

/// GPU-ready camera values.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct CameraUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// World-space eye position (vec4, w unused).
    pub position: [f32; 4],
    pub near: f32,
    pub far: f32,
    pub _pad: [f32; 2],
}

// ============================================================================
// Frustum
// ============================================================================

/// Width and height of the view frustum at a given distance from the camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraFrustum {
    pub width: f32,
    pub height: f32,
}

impl CameraFrustum {
    /// `height = distance * tan(fov / 2) * 2`, `width = height * aspect`.
    pub fn from_perspective(fov_degrees: f32, aspect: f32, distance: f32) -> Self {
        let height = distance * (fov_degrees.to_radians() / 2.0).tan() * 2.0;
        Self {
            width: height * aspect,
            height,
        }
    }

    pub fn half_width(&self) -> f32 {
        self.width / 2.0
    }

    pub fn half_height(&self) -> f32 {
        self.height / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frustum_height_at_default_distance() {
        let frustum = CameraFrustum::from_perspective(45.0, 2.0, 6.0);
        let expected = 6.0 * (22.5f32).to_radians().tan() * 2.0;
        assert!((frustum.height - expected).abs() < 1e-5);
        assert!((frustum.width - expected * 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_frustum_scales_with_aspect_only_in_width() {
        let a = CameraFrustum::from_perspective(45.0, 1.0, 6.0);
        let b = CameraFrustum::from_perspective(45.0, 1.5, 6.0);
        assert_eq!(a.height, b.height);
        assert!((b.width - a.width * 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_origin_is_in_front_of_camera() {
        let camera = Camera::new(&CameraSettings::default(), 16.0 / 9.0);
        let in_view = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!(in_view.z < 0.0);
        assert!((in_view.z + 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_origin_lies_between_clip_planes() {
        let camera = Camera::new(&CameraSettings::default(), 1.0);
        let clip = camera.view_projection_matrix() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc_z = clip.z / clip.w;
        assert!(ndc_z > 0.0 && ndc_z < 1.0);
    }

    #[test]
    fn test_uniform_size() {
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 96);
    }
}

//! Orbiting camera
//!
//! Left-handed, depth range [0, 1]. The camera sits `distance` units behind
//! `center` along its rotated +Z axis and always looks at the center.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3, Vec4};

/// Closest the camera may get to its orbit center
pub const MIN_ORBIT_DISTANCE: f32 = 0.1;

/// Initial camera parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub center: Vec3,
    pub distance: f32,
    pub near: f32,
    pub far: f32,
    pub fov_y_degrees: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            distance: 5.0,
            near: 0.1,
            far: 100.0,
            fov_y_degrees: 60.0,
        }
    }
}

/// Camera orbiting a fixed point
#[derive(Debug, Clone)]
pub struct Camera {
    pub center: Vec3,
    distance: f32,
    rotation: Quat,
    pub near: f32,
    pub far: f32,
    pub fov_y_degrees: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(&CameraConfig::default())
    }
}

impl Camera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            center: config.center,
            distance: config.distance.max(MIN_ORBIT_DISTANCE),
            rotation: Quat::IDENTITY,
            near: config.near,
            far: config.far,
            fov_y_degrees: config.fov_y_degrees,
        }
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Rotate around the world Y axis
    pub fn rotate(&mut self, yaw_degrees: f32) {
        let yaw = Quat::from_axis_angle(Vec3::Y, yaw_degrees.to_radians());
        self.rotation = (yaw * self.rotation).normalize();
    }

    /// Move towards (negative) or away from (positive) the center
    pub fn zoom(&mut self, amount: f32) {
        self.distance = (self.distance + amount).max(MIN_ORBIT_DISTANCE);
    }

    pub fn compute_position(&self) -> Vec3 {
        self.center - self.rotation * Vec3::Z * self.distance
    }

    /// Get the view matrix
    pub fn compute_view_matrix(&self) -> Mat4 {
        Mat4::look_at_lh(self.compute_position(), self.center, self.rotation * Vec3::Y)
    }

    /// Get the projection matrix
    pub fn compute_projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_lh(self.fov_y_degrees.to_radians(), aspect, self.near, self.far)
    }

    /// Build camera uniform data for shaders
    pub fn uniform_data(&self, aspect: f32) -> CameraUniformData {
        let view = self.compute_view_matrix();
        let proj = self.compute_projection_matrix(aspect);
        let view_proj = proj * view;

        CameraUniformData {
            view,
            proj,
            view_proj,
            inv_view: view.inverse(),
            inv_proj: proj.inverse(),
            inv_view_proj: view_proj.inverse(),
            position: self.compute_position().extend(1.0),
            near_far: Vec4::new(self.near, self.far, 0.0, 0.0),
        }
    }
}

/// Camera uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniformData {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    pub inv_view: Mat4,
    pub inv_proj: Mat4,
    pub inv_view_proj: Mat4,
    pub position: Vec4,
    pub near_far: Vec4,
}

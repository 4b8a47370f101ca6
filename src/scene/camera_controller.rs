//! Keyboard camera control
//!
//! - W / Up: zoom in
//! - S / Down: zoom out
//! - Escape: quit
//!
//! The orbit auto-rotates around the Y axis unless disabled.

use super::Camera;
use winit::keyboard::KeyCode;

/// Input state for camera controllers
#[derive(Debug, Clone, Default)]
pub struct CameraInput {
    pub zoom_in: bool,
    pub zoom_out: bool,
    pub quit_requested: bool,
}

impl CameraInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a key press or release; returns false for keys with no binding
    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) -> bool {
        match key {
            KeyCode::KeyW | KeyCode::ArrowUp => self.zoom_in = pressed,
            KeyCode::KeyS | KeyCode::ArrowDown => self.zoom_out = pressed,
            KeyCode::Escape => self.quit_requested |= pressed,
            _ => return false,
        }
        true
    }
}

/// Camera behaviour settings
#[derive(Debug, Clone, PartialEq)]
pub struct ControlConfig {
    pub auto_rotate: bool,
    /// Degrees per second
    pub rotate_speed: f32,
    /// Units per second
    pub zoom_speed: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            auto_rotate: true,
            rotate_speed: 30.0,
            zoom_speed: 2.0,
        }
    }
}

/// Abstract camera controller trait
pub trait CameraController {
    /// Update the camera based on input and delta time
    fn update(&mut self, camera: &mut Camera, input: &CameraInput, dt: f32);

    /// Get the controller name for debugging
    fn name(&self) -> &'static str;
}

/// Keyboard zoom plus optional constant yaw
pub struct OrbitController {
    config: ControlConfig,
}

impl OrbitController {
    pub fn new(config: ControlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::new(ControlConfig::default())
    }
}

impl CameraController for OrbitController {
    fn update(&mut self, camera: &mut Camera, input: &CameraInput, dt: f32) {
        let step = self.config.zoom_speed * dt;
        if input.zoom_in {
            camera.zoom(-step);
        }
        if input.zoom_out {
            camera.zoom(step);
        }

        if self.config.auto_rotate {
            camera.rotate(self.config.rotate_speed * dt);
        }
    }

    fn name(&self) -> &'static str {
        "Orbit"
    }
}

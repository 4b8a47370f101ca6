//! Metallic Reflections - a render graph-based deferred renderer
//!
//! Loads a glTF model and an equirectangular HDR environment, then renders the
//! model as polished metal in an orbiting view:
//! - Render graph system for declarative pass ordering and target allocation
//! - Environment preprocessing: equirect to cube, box mips, GGX prefilter
//! - Deferred pipeline: G-buffer, image-based lighting, screen-space
//!   reflections, ACES tonemapping, copy to the swapchain
//! - A recording backend so the whole frame runs without a GPU

pub mod args;
pub mod backend;
pub mod environment;
pub mod error;
pub mod pipeline;
pub mod render_graph;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod window;

pub use backend::wgpu_backend::WgpuBackend;
pub use environment::{EnvironmentConfig, EnvironmentMap};
pub use error::{RenderError, RenderResult};
pub use renderer::Renderer;
pub use scene::{CameraConfig, ControlConfig};

/// Configuration for the renderer and its window
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window width
    pub width: u32,
    /// Window height
    pub height: u32,
    pub camera: CameraConfig,
    pub controls: ControlConfig,
    pub environment: EnvironmentConfig,
    /// Linear scale applied before tonemapping
    pub exposure: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            camera: CameraConfig::default(),
            controls: ControlConfig::default(),
            environment: EnvironmentConfig::default(),
            exposure: 1.0,
        }
    }
}

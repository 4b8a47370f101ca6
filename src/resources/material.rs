//! Material definitions for metallic rendering

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Metallic material properties
///
/// Every surface is treated as a metal; the base color is the specular
/// reflectance. Texture maps are not sampled, so the map flags stay false.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGB
    pub base_color: Vec3,
    /// Perceptual roughness in [0, 1]
    pub roughness: f32,
    pub has_base_color_map: bool,
    pub has_roughness_map: bool,
    pub has_normal_map: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: Vec3::ONE,
            roughness: 0.5,
            has_base_color_map: false,
            has_roughness_map: false,
            has_normal_map: false,
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_base_color(mut self, color: Vec3) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    /// Create a uniform data struct for GPU
    pub fn uniform_data(&self) -> MaterialUniformData {
        MaterialUniformData {
            base_color: self.base_color.to_array(),
            has_base_color_map: self.has_base_color_map as u32,
            roughness: self.roughness,
            has_roughness_map: self.has_roughness_map as u32,
            has_normal_map: self.has_normal_map as u32,
            pad: 0.0,
        }
    }
}

/// Material uniform data for GPU, 32 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialUniformData {
    pub base_color: [f32; 3],
    pub has_base_color_map: u32,
    pub roughness: f32,
    pub has_roughness_map: u32,
    pub has_normal_map: u32,
    pub pad: f32,
}

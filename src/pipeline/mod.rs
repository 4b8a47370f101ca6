//! Deferred rendering pipeline
//!
//! The frame is a render graph of five passes:
//! 1. G-Buffer pass - geometry into two RGBA32F targets plus depth
//! 2. Lighting pass - fullscreen image-based lighting from the prefiltered cube
//! 3. SSR pass - compute screen-space reflections over the lit image
//! 4. Tonemapping - ACES into the sRGB SDR target
//! 5. Present pass - copy of the SDR target into the swapchain image

pub mod gbuffer_pass;
pub mod lighting_pass;
pub mod postprocess;
pub mod present_pass;
pub mod ssr_pass;

pub use gbuffer_pass::{GBufferPass, GBufferTargets};
pub use lighting_pass::LightingPass;
pub use postprocess::TonemappingPass;
pub use present_pass::PresentPass;
pub use ssr_pass::SsrPass;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{RenderError, RenderResult};
use crate::render_graph::{GraphError, PassId, PassType, RenderGraph, RenderPass, ResourceId};
use crate::scene::CameraUniformData;
use bytemuck::{Pod, Zeroable};

/// WGSL mirror of [`CameraUniformData`]
pub const CAMERA_UNIFORMS: &str = r#"
struct CameraUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    inv_view: mat4x4<f32>,
    inv_proj: mat4x4<f32>,
    inv_view_proj: mat4x4<f32>,
    position: vec4<f32>,
    near_far: vec4<f32>,
}
"#;

/// Tonemapping constants
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TonemapUniformData {
    pub exposure: f32,
    pub _padding: [f32; 3],
}

/// Long-lived objects shared by the passes
pub struct FrameResources {
    pub camera_buffer: BufferHandle,
    pub tonemap_buffer: BufferHandle,
    pub point_sampler: SamplerHandle,
    pub linear_sampler: SamplerHandle,
    /// Cube view over the prefiltered environment chain
    pub environment_view: TextureViewHandle,
}

impl FrameResources {
    pub fn create(
        backend: &mut dyn GraphicsBackend,
        environment_view: TextureViewHandle,
        exposure: f32,
    ) -> RenderResult<Self> {
        let point_sampler = backend
            .create_sampler(&SamplerDescriptor::point_clamp())
            .map_err(RenderError::resource("point sampler"))?;
        let linear_sampler = backend
            .create_sampler(&SamplerDescriptor::trilinear_clamp())
            .map_err(RenderError::resource("trilinear sampler"))?;

        let camera_buffer = backend
            .create_buffer(&BufferDescriptor {
                label: Some("Camera Uniforms".into()),
                size: std::mem::size_of::<CameraUniformData>() as u64,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            })
            .map_err(RenderError::resource("Camera Uniforms"))?;

        let tonemap = TonemapUniformData {
            exposure,
            _padding: [0.0; 3],
        };
        let tonemap_buffer = match backend.create_buffer_init(
            &BufferDescriptor {
                label: Some("Tonemap Uniforms".into()),
                size: std::mem::size_of::<TonemapUniformData>() as u64,
                usage: BufferUsage::UNIFORM,
            },
            bytemuck::bytes_of(&tonemap),
        ) {
            Ok(buffer) => buffer,
            Err(source) => {
                backend.destroy_buffer(camera_buffer);
                return Err(RenderError::ResourceCreation {
                    resource: "Tonemap Uniforms".into(),
                    source,
                });
            }
        };

        Ok(Self {
            camera_buffer,
            tonemap_buffer,
            point_sampler,
            linear_sampler,
            environment_view,
        })
    }

    /// Stage this frame's camera constants
    pub fn upload_camera(&self, backend: &mut dyn GraphicsBackend, camera: &CameraUniformData) {
        backend.write_buffer(self.camera_buffer, bytemuck::bytes_of(camera));
    }

    pub fn destroy(self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_buffer(self.camera_buffer);
        backend.destroy_buffer(self.tonemap_buffer);
    }
}

/// Graph resources of the frame, in pass order
#[derive(Debug, Clone, Copy)]
pub struct FrameTargets {
    pub gbuffer: GBufferTargets,
    pub hdr: ResourceId,
    pub ssr: ResourceId,
    pub sdr: ResourceId,
    pub swapchain: ResourceId,
}

fn output<P: RenderPass + 'static, T>(
    graph: &RenderGraph,
    id: PassId,
    get: impl FnOnce(&P) -> Option<T>,
) -> Result<T, GraphError> {
    graph
        .pass::<P>(id)
        .and_then(get)
        .ok_or_else(|| {
            let name = graph.get_pass(id).map(|p| p.name().to_string()).unwrap_or_default();
            GraphError::MissingOutput(name)
        })
}

/// Build the frame graph at a fixed output resolution
pub fn build_frame_graph(
    width: u32,
    height: u32,
    swapchain_format: TextureFormat,
) -> Result<(RenderGraph, FrameTargets), GraphError> {
    let mut graph = RenderGraph::new();

    let swapchain = graph.register_external("swapchain");

    let gbuffer_id = graph.add_pass(GBufferPass::new(), PassType::Graphics, width, height);
    let gbuffer = output(&graph, gbuffer_id, GBufferPass::targets)?;

    let lighting_id = graph.add_pass(LightingPass::new(gbuffer), PassType::Graphics, width, height);
    let hdr = output(&graph, lighting_id, LightingPass::hdr_output)?;

    let ssr_id = graph.add_pass(SsrPass::new(gbuffer, hdr), PassType::Compute, width, height);
    let ssr = output(&graph, ssr_id, SsrPass::output)?;

    let sdr_format = swapchain_format.add_srgb_suffix();
    let tonemap_id = graph.add_pass(
        TonemappingPass::new(ssr, sdr_format),
        PassType::Graphics,
        width,
        height,
    );
    let sdr = output(&graph, tonemap_id, TonemappingPass::output)?;

    graph.add_pass(PresentPass::new(sdr, swapchain), PassType::Transfer, width, height);

    Ok((
        graph,
        FrameTargets {
            gbuffer,
            hdr,
            ssr,
            sdr,
            swapchain,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_order() {
        let (graph, _) = build_frame_graph(64, 32, TextureFormat::Bgra8Unorm).unwrap();
        let compiled = graph.compile().unwrap();

        let names: Vec<&str> = compiled
            .pass_order
            .iter()
            .filter_map(|&id| graph.get_pass(id))
            .map(|p| p.name())
            .collect();
        assert_eq!(
            names,
            vec![
                "G-Buffer Pass",
                "Lighting Pass",
                "SSR Pass",
                "Tonemapping",
                "Present Pass"
            ]
        );
    }

    #[test]
    fn test_targets_are_distinct() {
        let (_, targets) = build_frame_graph(64, 32, TextureFormat::Bgra8Unorm).unwrap();
        let mut ids = vec![
            targets.gbuffer.gbuffer0,
            targets.gbuffer.gbuffer1,
            targets.gbuffer.depth,
            targets.hdr,
            targets.ssr,
            targets.sdr,
            targets.swapchain,
        ];
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 7);
    }

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(std::mem::size_of::<CameraUniformData>(), 416);
        assert_eq!(std::mem::size_of::<TonemapUniformData>(), 16);
    }
}

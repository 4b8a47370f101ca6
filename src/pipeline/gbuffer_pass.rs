//! G-Buffer generation pass for deferred rendering
//!
//! Renders every scene mesh to two render targets (MRT):
//! - gbuffer0: world-space normal (xyz) and roughness (w)
//! - gbuffer1: linear base color (rgb)
//! - Depth buffer, cleared to 1.0 and tested with `Less`

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::CAMERA_UNIFORMS;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use crate::scene::GpuScene;
use std::any::Any;

/// Resources written by the G-buffer pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBufferTargets {
    pub gbuffer0: ResourceId,
    pub gbuffer1: ResourceId,
    pub depth: ResourceId,
}

/// G-Buffer generation pass for deferred rendering
pub struct GBufferPass {
    /// Normal + roughness (RGBA32F)
    gbuffer0: Option<ResourceId>,
    /// Base color (RGBA32F)
    gbuffer1: Option<ResourceId>,
    /// Depth buffer (D32F)
    depth: Option<ResourceId>,
    pipeline: Option<RenderPipelineHandle>,
    camera_bind_group: Option<BindGroupHandle>,
}

impl GBufferPass {
    pub fn new() -> Self {
        Self {
            gbuffer0: None,
            gbuffer1: None,
            depth: None,
            pipeline: None,
            camera_bind_group: None,
        }
    }

    /// All three targets, once the pass has been set up
    pub fn targets(&self) -> Option<GBufferTargets> {
        Some(GBufferTargets {
            gbuffer0: self.gbuffer0?,
            gbuffer1: self.gbuffer1?,
            depth: self.depth?,
        })
    }
}

impl Default for GBufferPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for GBufferPass {
    fn name(&self) -> &str {
        "G-Buffer Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        let gbuffer0 = ctx.frame_target(
            "gbuffer_normal_roughness",
            TextureFormat::Rgba32Float,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        );
        self.gbuffer0 = Some(gbuffer0);
        ctx.write(gbuffer0, ResourceUsage::RenderTarget);

        let gbuffer1 = ctx.frame_target(
            "gbuffer_base_color",
            TextureFormat::Rgba32Float,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        );
        self.gbuffer1 = Some(gbuffer1);
        ctx.write(gbuffer1, ResourceUsage::RenderTarget);

        let depth = ctx.frame_target(
            "gbuffer_depth",
            TextureFormat::Depth32Float,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        );
        self.depth = Some(depth);
        ctx.write(depth, ResourceUsage::DepthStencilWrite);
    }

    fn prepare(&mut self, ctx: &mut PassPrepareContext) -> BackendResult<()> {
        let camera_layout = ctx.backend.create_bind_group_layout(&[BindGroupLayoutEntry::new(
            0,
            ShaderStageFlags::VERTEX_FRAGMENT,
            BindingType::UniformBuffer,
        )])?;

        self.camera_bind_group = Some(ctx.backend.create_bind_group(
            camera_layout,
            &[(0, BindGroupEntry::Buffer(ctx.frame.camera_buffer))],
        )?);

        self.pipeline = Some(ctx.backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("G-Buffer Pipeline".into()),
            shader: gbuffer_shader(),
            vertex_entry: "vs_main".into(),
            fragment_entry: "fs_main".into(),
            vertex_streams: GpuScene::vertex_streams(),
            bind_group_layouts: vec![camera_layout, ctx.scene.object_layout()],
            cull_mode: CullMode::Back,
            depth_format: Some(TextureFormat::Depth32Float),
            color_targets: vec![TextureFormat::Rgba32Float, TextureFormat::Rgba32Float],
        })?);

        Ok(())
    }

    fn execute(&self, ctx: &mut PassExecuteContext) {
        let Some(targets) = self.targets() else {
            return;
        };
        let (Some(gbuffer0_view), Some(gbuffer1_view), Some(depth_view)) = (
            ctx.resources.view(targets.gbuffer0),
            ctx.resources.view(targets.gbuffer1),
            ctx.resources.view(targets.depth),
        ) else {
            return;
        };

        let backend = &mut *ctx.backend;

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("G-Buffer Pass".into()),
            color_attachments: vec![
                // Location 0: normal + roughness
                ColorAttachment {
                    view: gbuffer0_view,
                    clear: [0.0; 4],
                },
                // Location 1: base color
                ColorAttachment {
                    view: gbuffer1_view,
                    clear: [0.0; 4],
                },
            ],
            depth_attachment: Some(DepthAttachment {
                view: depth_view,
                clear: 1.0,
            }),
        });

        backend.set_viewport(ctx.width as f32, ctx.height as f32);

        if let (Some(pipeline), Some(camera_bind_group)) = (self.pipeline, self.camera_bind_group) {
            backend.set_render_pipeline(pipeline);
            backend.set_bind_group(0, camera_bind_group);

            for mesh in ctx.scene.meshes() {
                backend.set_vertex_buffer(0, mesh.position_buffer);
                backend.set_vertex_buffer(1, mesh.normal_buffer);
                backend.set_vertex_buffer(2, mesh.uv_buffer);
                backend.set_vertex_buffer(3, mesh.tangent_buffer);
                backend.set_index_buffer(mesh.index_buffer);
                backend.set_bind_group(1, mesh.bind_group);
                backend.draw_indexed(0..mesh.index_count, 0..1);
            }
        }

        backend.end_render_pass();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Full G-buffer module: camera block plus the pass body
pub fn gbuffer_shader() -> String {
    format!("{CAMERA_UNIFORMS}{GBUFFER_SHADER}")
}

/// G-Buffer generation shader
pub const GBUFFER_SHADER: &str = r#"
struct ObjectUniforms {
    world: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
}

struct MaterialUniforms {
    base_color: vec3<f32>,
    has_base_color_map: u32,
    roughness: f32,
    has_roughness_map: u32,
    has_normal_map: u32,
    _padding: f32,
}

struct VertexInput {
    @location(0) position: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

struct GBufferOutput {
    @location(0) normal_roughness: vec4<f32>,
    @location(1) base_color: vec4<f32>,
}

@group(0) @binding(0) var<uniform> camera: CameraUniforms;
@group(1) @binding(0) var<uniform> object: ObjectUniforms;
@group(1) @binding(1) var<uniform> material: MaterialUniforms;

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    let world_pos = object.world * vec4<f32>(input.position.xyz, 1.0);
    output.clip_position = camera.view_proj * world_pos;
    output.world_normal = (object.normal_matrix * vec4<f32>(input.normal.xyz, 0.0)).xyz;
    output.uv = input.uv;
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> GBufferOutput {
    var output: GBufferOutput;

    // Zero-filled normals from the importer fall back to +Y
    let len = length(input.world_normal);
    let normal = select(vec3<f32>(0.0, 1.0, 0.0), input.world_normal / len, len > 1e-6);

    output.normal_roughness = vec4<f32>(normal, material.roughness);
    output.base_color = vec4<f32>(material.base_color, 1.0);
    return output;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::{PassType, RenderGraph};

    #[test]
    fn test_setup_declares_three_targets() {
        let mut graph = RenderGraph::new();
        let id = graph.add_pass(GBufferPass::new(), PassType::Graphics, 320, 200);

        let targets = graph.pass::<GBufferPass>(id).and_then(GBufferPass::targets).unwrap();
        let node = graph.get_pass_node(id).unwrap();
        assert!(node.access.writes_resource(targets.gbuffer0));
        assert!(node.access.writes_resource(targets.gbuffer1));
        assert!(node.access.writes_resource(targets.depth));
        assert!(node.access.reads.is_empty());

        let depth = graph
            .resources()
            .iter()
            .find_map(|r| match r {
                VirtualResource::Texture(t) if t.id == targets.depth => Some(t.desc.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(depth.format, TextureFormat::Depth32Float);
        assert_eq!((depth.width, depth.height), (320, 200));
    }
}

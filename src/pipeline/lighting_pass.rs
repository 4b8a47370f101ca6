//! Deferred lighting pass
//!
//! Fullscreen triangle that lights every G-buffer texel with the prefiltered
//! environment. Surfaces are treated as metals: the reflected radiance is
//! fetched at LOD `roughness * (mips - 1)` and tinted by a Schlick Fresnel term
//! with the base color as F0. Background texels show the environment itself.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::postprocess::FULLSCREEN_VERTEX_SHADER;
use crate::pipeline::{GBufferTargets, CAMERA_UNIFORMS};
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use std::any::Any;

/// Deferred lighting pass
pub struct LightingPass {
    gbuffer: GBufferTargets,
    /// HDR output texture
    hdr_output: Option<ResourceId>,
    pipeline: Option<RenderPipelineHandle>,
    bind_group: Option<BindGroupHandle>,
}

impl LightingPass {
    pub fn new(gbuffer: GBufferTargets) -> Self {
        Self {
            gbuffer,
            hdr_output: None,
            pipeline: None,
            bind_group: None,
        }
    }

    pub fn hdr_output(&self) -> Option<ResourceId> {
        self.hdr_output
    }
}

fn missing(what: &str) -> BackendError {
    BackendError::BindGroupCreationFailed(format!("{what} was not allocated"))
}

impl RenderPass for LightingPass {
    fn name(&self) -> &str {
        "Lighting Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read(self.gbuffer.gbuffer0, ResourceUsage::TextureRead);
        ctx.read(self.gbuffer.gbuffer1, ResourceUsage::TextureRead);
        ctx.read(self.gbuffer.depth, ResourceUsage::TextureRead);

        let hdr_output = ctx.frame_target(
            "hdr_color",
            TextureFormat::Rgba32Float,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        );
        self.hdr_output = Some(hdr_output);
        ctx.write(hdr_output, ResourceUsage::RenderTarget);
    }

    fn prepare(&mut self, ctx: &mut PassPrepareContext) -> BackendResult<()> {
        let gbuffer_texture = || BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: false },
            view_dimension: TextureViewDimension::D2,
        };

        let layout = ctx.backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::new(0, ShaderStageFlags::FRAGMENT, BindingType::UniformBuffer),
            BindGroupLayoutEntry::new(1, ShaderStageFlags::FRAGMENT, gbuffer_texture()),
            BindGroupLayoutEntry::new(2, ShaderStageFlags::FRAGMENT, gbuffer_texture()),
            BindGroupLayoutEntry::new(
                3,
                ShaderStageFlags::FRAGMENT,
                BindingType::Texture {
                    sample_type: TextureSampleType::Depth,
                    view_dimension: TextureViewDimension::D2,
                },
            ),
            BindGroupLayoutEntry::new(
                4,
                ShaderStageFlags::FRAGMENT,
                BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: TextureViewDimension::Cube,
                },
            ),
            BindGroupLayoutEntry::new(5, ShaderStageFlags::FRAGMENT, BindingType::Sampler { filtering: false }),
            BindGroupLayoutEntry::new(6, ShaderStageFlags::FRAGMENT, BindingType::Sampler { filtering: true }),
        ])?;

        let gbuffer0 = ctx.resources.view(self.gbuffer.gbuffer0).ok_or_else(|| missing("gbuffer0"))?;
        let gbuffer1 = ctx.resources.view(self.gbuffer.gbuffer1).ok_or_else(|| missing("gbuffer1"))?;
        let depth = ctx.resources.view(self.gbuffer.depth).ok_or_else(|| missing("depth"))?;

        self.bind_group = Some(ctx.backend.create_bind_group(
            layout,
            &[
                (0, BindGroupEntry::Buffer(ctx.frame.camera_buffer)),
                (1, BindGroupEntry::Texture(gbuffer0)),
                (2, BindGroupEntry::Texture(gbuffer1)),
                (3, BindGroupEntry::Texture(depth)),
                (4, BindGroupEntry::Texture(ctx.frame.environment_view)),
                (5, BindGroupEntry::Sampler(ctx.frame.point_sampler)),
                (6, BindGroupEntry::Sampler(ctx.frame.linear_sampler)),
            ],
        )?);

        self.pipeline = Some(ctx.backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Lighting Pipeline".into()),
            shader: lighting_shader(),
            vertex_entry: "vs_main".into(),
            fragment_entry: "fs_main".into(),
            vertex_streams: Vec::new(),
            bind_group_layouts: vec![layout],
            cull_mode: CullMode::None,
            depth_format: None,
            color_targets: vec![TextureFormat::Rgba32Float],
        })?);

        Ok(())
    }

    fn execute(&self, ctx: &mut PassExecuteContext) {
        let Some(hdr_view) = self.hdr_output.and_then(|id| ctx.resources.view(id)) else {
            return;
        };
        let backend = &mut *ctx.backend;

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Lighting Pass".into()),
            color_attachments: vec![ColorAttachment {
                view: hdr_view,
                clear: [0.0, 0.0, 0.0, 1.0],
            }],
            depth_attachment: None,
        });

        backend.set_viewport(ctx.width as f32, ctx.height as f32);

        if let (Some(pipeline), Some(bind_group)) = (self.pipeline, self.bind_group) {
            backend.set_render_pipeline(pipeline);
            backend.set_bind_group(0, bind_group);
            backend.draw(0..3, 0..1);
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

pub fn lighting_shader() -> String {
    format!("{CAMERA_UNIFORMS}{FULLSCREEN_VERTEX_SHADER}{LIGHTING_SHADER}")
}

/// Image-based lighting fragment stage
pub const LIGHTING_SHADER: &str = r#"
@group(0) @binding(0) var<uniform> camera: CameraUniforms;
@group(0) @binding(1) var gbuffer0: texture_2d<f32>;
@group(0) @binding(2) var gbuffer1: texture_2d<f32>;
@group(0) @binding(3) var gbuffer_depth: texture_depth_2d;
@group(0) @binding(4) var environment: texture_cube<f32>;
@group(0) @binding(5) var point_sampler: sampler;
@group(0) @binding(6) var trilinear_sampler: sampler;

fn fresnel_schlick(f0: vec3<f32>, cos_theta: f32) -> vec3<f32> {
    return f0 + (vec3<f32>(1.0) - f0) * pow(1.0 - cos_theta, 5.0);
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let depth = textureLoad(gbuffer_depth, vec2<i32>(input.position.xy), 0);

    let ndc = vec2<f32>(input.uv.x * 2.0 - 1.0, 1.0 - input.uv.y * 2.0);
    let world_h = camera.inv_view_proj * vec4<f32>(ndc, depth, 1.0);
    let world_pos = world_h.xyz / world_h.w;
    let view_dir = normalize(world_pos - camera.position.xyz);

    if (depth >= 1.0) {
        return vec4<f32>(textureSampleLevel(environment, trilinear_sampler, view_dir, 0.0).rgb, 1.0);
    }

    let normal_roughness = textureSampleLevel(gbuffer0, point_sampler, input.uv, 0.0);
    let base_color = textureSampleLevel(gbuffer1, point_sampler, input.uv, 0.0).rgb;

    let n = normalize(normal_roughness.xyz);
    let roughness = normal_roughness.w;
    let r = reflect(view_dir, n);
    let n_dot_v = max(dot(n, -view_dir), 0.0);

    let max_lod = f32(textureNumLevels(environment) - 1u);
    let radiance = textureSampleLevel(environment, trilinear_sampler, r, roughness * max_lod).rgb;

    return vec4<f32>(radiance * fresnel_schlick(base_color, n_dot_v), 1.0);
}
"#;

//! Screen-space reflections
//!
//! Compute pass over the lit image. Each pixel marches its view-space
//! reflection ray against the depth buffer; on a hit the lit color at the hit
//! point, tinted by the base color, replaces the environment reflection. Rough
//! surfaces, rays toward the camera and misses keep the lighting result.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::{GBufferTargets, CAMERA_UNIFORMS};
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use std::any::Any;

/// Workgroup edge of the SSR shader
pub const SSR_WORKGROUP_SIZE: u32 = 8;

/// Screen-space reflection compute pass
pub struct SsrPass {
    gbuffer: GBufferTargets,
    hdr_input: ResourceId,
    output: Option<ResourceId>,
    pipeline: Option<ComputePipelineHandle>,
    bind_group: Option<BindGroupHandle>,
}

impl SsrPass {
    pub fn new(gbuffer: GBufferTargets, hdr_input: ResourceId) -> Self {
        Self {
            gbuffer,
            hdr_input,
            output: None,
            pipeline: None,
            bind_group: None,
        }
    }

    pub fn output(&self) -> Option<ResourceId> {
        self.output
    }

    /// Workgroups covering a `width`x`height` image
    pub fn dispatch_size(width: u32, height: u32) -> (u32, u32, u32) {
        (
            width.div_ceil(SSR_WORKGROUP_SIZE),
            height.div_ceil(SSR_WORKGROUP_SIZE),
            1,
        )
    }
}

impl RenderPass for SsrPass {
    fn name(&self) -> &str {
        "SSR Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read(self.gbuffer.depth, ResourceUsage::TextureRead);
        ctx.read(self.gbuffer.gbuffer0, ResourceUsage::TextureRead);
        ctx.read(self.gbuffer.gbuffer1, ResourceUsage::TextureRead);
        ctx.read(self.hdr_input, ResourceUsage::TextureRead);

        let output = ctx.frame_target(
            "ssr_color",
            TextureFormat::Rgba32Float,
            TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
        );
        self.output = Some(output);
        ctx.write(output, ResourceUsage::StorageWrite);
    }

    fn prepare(&mut self, ctx: &mut PassPrepareContext) -> BackendResult<()> {
        let float_texture = || BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: false },
            view_dimension: TextureViewDimension::D2,
        };

        let layout = ctx.backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::new(0, ShaderStageFlags::COMPUTE, BindingType::UniformBuffer),
            BindGroupLayoutEntry::new(
                1,
                ShaderStageFlags::COMPUTE,
                BindingType::Texture {
                    sample_type: TextureSampleType::Depth,
                    view_dimension: TextureViewDimension::D2,
                },
            ),
            BindGroupLayoutEntry::new(2, ShaderStageFlags::COMPUTE, float_texture()),
            BindGroupLayoutEntry::new(3, ShaderStageFlags::COMPUTE, float_texture()),
            BindGroupLayoutEntry::new(4, ShaderStageFlags::COMPUTE, float_texture()),
            BindGroupLayoutEntry::new(
                5,
                ShaderStageFlags::COMPUTE,
                BindingType::StorageTexture {
                    format: TextureFormat::Rgba32Float,
                    view_dimension: TextureViewDimension::D2,
                },
            ),
        ])?;

        let view = |id: ResourceId, what: &str| {
            ctx.resources
                .view(id)
                .ok_or_else(|| BackendError::BindGroupCreationFailed(format!("{what} was not allocated")))
        };
        let depth = view(self.gbuffer.depth, "depth")?;
        let gbuffer0 = view(self.gbuffer.gbuffer0, "gbuffer0")?;
        let gbuffer1 = view(self.gbuffer.gbuffer1, "gbuffer1")?;
        let hdr = view(self.hdr_input, "hdr_color")?;
        let output = self
            .output
            .ok_or_else(|| BackendError::BindGroupCreationFailed("ssr_color was not declared".into()))?;
        let output = view(output, "ssr_color")?;

        self.bind_group = Some(ctx.backend.create_bind_group(
            layout,
            &[
                (0, BindGroupEntry::Buffer(ctx.frame.camera_buffer)),
                (1, BindGroupEntry::Texture(depth)),
                (2, BindGroupEntry::Texture(gbuffer0)),
                (3, BindGroupEntry::Texture(gbuffer1)),
                (4, BindGroupEntry::Texture(hdr)),
                (5, BindGroupEntry::StorageTexture(output)),
            ],
        )?);

        self.pipeline = Some(ctx.backend.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("SSR Pipeline".into()),
            shader: ssr_shader(),
            entry_point: "cs_main".into(),
            bind_group_layouts: vec![layout],
        })?);

        Ok(())
    }

    fn execute(&self, ctx: &mut PassExecuteContext) {
        let (Some(pipeline), Some(bind_group)) = (self.pipeline, self.bind_group) else {
            return;
        };
        let (x, y, z) = Self::dispatch_size(ctx.width, ctx.height);

        let backend = &mut *ctx.backend;
        backend.begin_compute_pass(Some("SSR Pass"));
        backend.set_compute_pipeline(pipeline);
        backend.set_bind_group(0, bind_group);
        backend.dispatch_compute(x, y, z);
        backend.end_compute_pass();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn ssr_shader() -> String {
    format!("{CAMERA_UNIFORMS}{SSR_SHADER}")
}

pub const SSR_SHADER: &str = r#"
const MAX_STEPS: u32 = 64u;
const MAX_DISTANCE: f32 = 16.0;
const THICKNESS: f32 = 0.25;
const MAX_ROUGHNESS: f32 = 0.6;

@group(0) @binding(0) var<uniform> camera: CameraUniforms;
@group(0) @binding(1) var gbuffer_depth: texture_depth_2d;
@group(0) @binding(2) var gbuffer0: texture_2d<f32>;
@group(0) @binding(3) var gbuffer1: texture_2d<f32>;
@group(0) @binding(4) var hdr_color: texture_2d<f32>;
@group(0) @binding(5) var ssr_output: texture_storage_2d<rgba32float, write>;

fn view_position(uv: vec2<f32>, depth: f32) -> vec3<f32> {
    let ndc = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth, 1.0);
    let view_h = camera.inv_proj * ndc;
    return view_h.xyz / view_h.w;
}

@compute @workgroup_size(8, 8, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    let dims = textureDimensions(ssr_output);
    if (id.x >= dims.x || id.y >= dims.y) {
        return;
    }

    let pixel = vec2<i32>(id.xy);
    let color = textureLoad(hdr_color, pixel, 0);
    let depth = textureLoad(gbuffer_depth, pixel, 0);
    let normal_roughness = textureLoad(gbuffer0, pixel, 0);
    let roughness = normal_roughness.w;

    if (depth >= 1.0 || roughness > MAX_ROUGHNESS) {
        textureStore(ssr_output, pixel, color);
        return;
    }

    let size = vec2<f32>(dims);
    let uv = (vec2<f32>(id.xy) + 0.5) / size;
    let origin = view_position(uv, depth);
    let n = normalize((camera.view * vec4<f32>(normal_roughness.xyz, 0.0)).xyz);
    let dir = normalize(reflect(normalize(origin), n));

    // View space looks down +Z; rays toward the camera leave the depth buffer
    if (dir.z <= 0.0) {
        textureStore(ssr_output, pixel, color);
        return;
    }

    let step_len = MAX_DISTANCE / f32(MAX_STEPS);
    var p = origin + n * 0.01;
    var hit_uv = vec2<f32>(-1.0, -1.0);
    for (var i = 0u; i < MAX_STEPS; i = i + 1u) {
        p = p + dir * step_len;
        let clip = camera.proj * vec4<f32>(p, 1.0);
        if (clip.w <= 0.0) {
            break;
        }
        let ndc = clip.xyz / clip.w;
        let sample_uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
        if (any(sample_uv < vec2<f32>(0.0)) || any(sample_uv > vec2<f32>(1.0))) {
            break;
        }

        let sample_pixel = min(vec2<i32>(sample_uv * size), vec2<i32>(dims) - vec2<i32>(1, 1));
        let scene_depth = textureLoad(gbuffer_depth, sample_pixel, 0);
        let delta = p.z - view_position(sample_uv, scene_depth).z;
        if (delta > 0.0 && delta < THICKNESS) {
            hit_uv = sample_uv;
            break;
        }
    }

    if (hit_uv.x < 0.0) {
        textureStore(ssr_output, pixel, color);
        return;
    }

    let hit_pixel = min(vec2<i32>(hit_uv * size), vec2<i32>(dims) - vec2<i32>(1, 1));
    let reflected = textureLoad(hdr_color, hit_pixel, 0).rgb;
    let base_color = textureLoad(gbuffer1, pixel, 0).rgb;

    let edge = min(min(hit_uv.x, 1.0 - hit_uv.x), min(hit_uv.y, 1.0 - hit_uv.y));
    let weight = smoothstep(0.0, 0.1, edge) * (1.0 - roughness / MAX_ROUGHNESS);

    textureStore(ssr_output, pixel, vec4<f32>(mix(color.rgb, reflected * base_color, weight), 1.0));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_covers_partial_tiles() {
        assert_eq!(SsrPass::dispatch_size(1280, 720), (160, 90, 1));
        assert_eq!(SsrPass::dispatch_size(1281, 1), (161, 1, 1));
    }
}

//! Tonemapping post-processing
//!
//! Exposure-scaled ACES fit from the SSR output into the SDR target. The SDR
//! target has an sRGB format, so the hardware applies the transfer curve.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::postprocess::FULLSCREEN_VERTEX_SHADER;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use std::any::Any;

/// Tonemapping post-processing pass
pub struct TonemappingPass {
    input: ResourceId,
    format: TextureFormat,
    output: Option<ResourceId>,
    pipeline: Option<RenderPipelineHandle>,
    bind_group: Option<BindGroupHandle>,
}

impl TonemappingPass {
    /// `format` is the SDR target format, normally the swapchain's sRGB twin
    pub fn new(input: ResourceId, format: TextureFormat) -> Self {
        Self {
            input,
            format,
            output: None,
            pipeline: None,
            bind_group: None,
        }
    }

    pub fn output(&self) -> Option<ResourceId> {
        self.output
    }
}

impl RenderPass for TonemappingPass {
    fn name(&self) -> &str {
        "Tonemapping"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read(self.input, ResourceUsage::TextureRead);

        let output = ctx.frame_target(
            "sdr_color",
            self.format,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
        );
        self.output = Some(output);
        ctx.write(output, ResourceUsage::RenderTarget);
    }

    fn prepare(&mut self, ctx: &mut PassPrepareContext) -> BackendResult<()> {
        let layout = ctx.backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::new(
                0,
                ShaderStageFlags::FRAGMENT,
                BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: false },
                    view_dimension: TextureViewDimension::D2,
                },
            ),
            BindGroupLayoutEntry::new(1, ShaderStageFlags::FRAGMENT, BindingType::Sampler { filtering: false }),
            BindGroupLayoutEntry::new(2, ShaderStageFlags::FRAGMENT, BindingType::UniformBuffer),
        ])?;

        let input = ctx.resources.view(self.input).ok_or_else(|| {
            BackendError::BindGroupCreationFailed("tonemap input was not allocated".into())
        })?;

        self.bind_group = Some(ctx.backend.create_bind_group(
            layout,
            &[
                (0, BindGroupEntry::Texture(input)),
                (1, BindGroupEntry::Sampler(ctx.frame.point_sampler)),
                (2, BindGroupEntry::Buffer(ctx.frame.tonemap_buffer)),
            ],
        )?);

        self.pipeline = Some(ctx.backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Tonemapping Pipeline".into()),
            shader: tonemapping_shader(),
            vertex_entry: "vs_main".into(),
            fragment_entry: "fs_main".into(),
            vertex_streams: Vec::new(),
            bind_group_layouts: vec![layout],
            cull_mode: CullMode::None,
            depth_format: None,
            color_targets: vec![self.format],
        })?);

        Ok(())
    }

    fn execute(&self, ctx: &mut PassExecuteContext) {
        let Some(output_view) = self.output.and_then(|id| ctx.resources.view(id)) else {
            return;
        };
        let backend = &mut *ctx.backend;

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Tonemapping".into()),
            color_attachments: vec![ColorAttachment {
                view: output_view,
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

pub fn tonemapping_shader() -> String {
    format!("{FULLSCREEN_VERTEX_SHADER}{TONEMAPPING_SHADER}")
}

pub const TONEMAPPING_SHADER: &str = r#"
struct TonemapParams {
    exposure: f32,
    _padding0: f32,
    _padding1: f32,
    _padding2: f32,
}

@group(0) @binding(0) var hdr_texture: texture_2d<f32>;
@group(0) @binding(1) var hdr_sampler: sampler;
@group(0) @binding(2) var<uniform> params: TonemapParams;

fn aces_tonemap(color: vec3<f32>) -> vec3<f32> {
    let a = 2.51;
    let b = 0.03;
    let c = 2.43;
    let d = 0.59;
    let e = 0.14;
    return saturate((color * (a * color + b)) / (color * (c * color + d) + e));
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(hdr_texture, hdr_sampler, input.uv, 0.0).rgb * params.exposure;
    return vec4<f32>(aces_tonemap(color), 1.0);
}
"#;

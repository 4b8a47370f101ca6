//! Pass recording for the wgpu backend
//!
//! A wgpu pass borrows its encoder and every resource it touches, which the
//! `&mut self` trait methods cannot express. Commands are therefore collected
//! into an [`OpenPass`] and replayed into a real pass when it closes.

use super::Slots;
use crate::backend::traits::*;
use std::ops::Range;

pub(super) enum RenderCommand {
    Pipeline(RenderPipelineHandle),
    BindGroup(u32, BindGroupHandle),
    VertexBuffer(u32, BufferHandle),
    IndexBuffer(BufferHandle),
    Viewport(f32, f32),
    Draw(Range<u32>, Range<u32>),
    DrawIndexed(Range<u32>, Range<u32>),
}

pub(super) enum ComputeCommand {
    Pipeline(ComputePipelineHandle),
    BindGroup(u32, BindGroupHandle),
    Dispatch(u32, u32, u32),
}

/// The pass currently being recorded
pub(super) enum OpenPass {
    Render {
        desc: RenderPassDescriptor,
        commands: Vec<RenderCommand>,
    },
    Compute {
        label: Option<String>,
        commands: Vec<ComputeCommand>,
    },
}

/// Objects a replayed pass may reference
pub(super) struct PassResources<'a> {
    pub buffers: &'a Slots<wgpu::Buffer>,
    pub views: &'a Slots<wgpu::TextureView>,
    pub bind_groups: &'a Slots<wgpu::BindGroup>,
    pub render_pipelines: &'a Slots<wgpu::RenderPipeline>,
    pub compute_pipelines: &'a Slots<wgpu::ComputePipeline>,
}

pub(super) fn replay_render(
    encoder: &mut wgpu::CommandEncoder,
    res: &PassResources,
    desc: &RenderPassDescriptor,
    commands: &[RenderCommand],
) {
    let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = desc
        .color_attachments
        .iter()
        .map(|attachment| {
            res.views.get(attachment.view.0).map(|view| wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(super::convert::clear_color(attachment.clear)),
                    store: wgpu::StoreOp::Store,
                },
            })
        })
        .collect();

    let depth_stencil_attachment = desc.depth_attachment.as_ref().and_then(|attachment| {
        let view = res.views.get(attachment.view.0)?;
        Some(wgpu::RenderPassDepthStencilAttachment {
            view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(attachment.clear),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        })
    });

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: desc.label.as_deref(),
        color_attachments: &color_attachments,
        depth_stencil_attachment,
        timestamp_writes: None,
        occlusion_query_set: None,
    });

    for command in commands {
        match command {
            RenderCommand::Pipeline(handle) => {
                if let Some(pipeline) = res.render_pipelines.get(handle.0) {
                    pass.set_pipeline(pipeline);
                }
            }
            RenderCommand::BindGroup(index, handle) => {
                if let Some(group) = res.bind_groups.get(handle.0) {
                    pass.set_bind_group(*index, group, &[]);
                }
            }
            RenderCommand::VertexBuffer(slot, handle) => {
                if let Some(buffer) = res.buffers.get(handle.0) {
                    pass.set_vertex_buffer(*slot, buffer.slice(..));
                }
            }
            RenderCommand::IndexBuffer(handle) => {
                if let Some(buffer) = res.buffers.get(handle.0) {
                    pass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint32);
                }
            }
            RenderCommand::Viewport(width, height) => pass.set_viewport(0.0, 0.0, *width, *height, 0.0, 1.0),
            RenderCommand::Draw(vertices, instances) => pass.draw(vertices.clone(), instances.clone()),
            RenderCommand::DrawIndexed(indices, instances) => {
                pass.draw_indexed(indices.clone(), 0, instances.clone())
            }
        }
    }
}

pub(super) fn replay_compute(
    encoder: &mut wgpu::CommandEncoder,
    res: &PassResources,
    label: Option<&str>,
    commands: &[ComputeCommand],
) {
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label,
        timestamp_writes: None,
    });

    for command in commands {
        match command {
            ComputeCommand::Pipeline(handle) => {
                if let Some(pipeline) = res.compute_pipelines.get(handle.0) {
                    pass.set_pipeline(pipeline);
                }
            }
            ComputeCommand::BindGroup(index, handle) => {
                if let Some(group) = res.bind_groups.get(handle.0) {
                    pass.set_bind_group(*index, group, &[]);
                }
            }
            ComputeCommand::Dispatch(x, y, z) => pass.dispatch_workgroups(*x, *y, *z),
        }
    }
}

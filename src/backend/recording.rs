//! GPU-less backend that records every call
//!
//! Used by the test suite to drive scene building, environment preprocessing
//! and whole frames without a device. Handles are allocated from a single
//! counter, so they are unique across resource kinds.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    BeginFrame,
    EndFrame,
    Submit,
    CreateBuffer { label: Option<String>, size: u64 },
    WriteBuffer { buffer: BufferHandle, data: Vec<u8> },
    CreateTexture { handle: TextureHandle, label: Option<String> },
    CreateTextureView { texture: TextureHandle, label: Option<String> },
    WriteTexture { texture: TextureHandle, width: u32, height: u32, len: usize },
    CreateSampler { label: Option<String> },
    CreateBindGroupLayout,
    CreateBindGroup,
    CreateRenderPipeline { label: Option<String> },
    CreateComputePipeline { label: Option<String> },
    BeginRenderPass { label: Option<String>, color_views: Vec<TextureViewHandle> },
    EndRenderPass,
    BeginComputePass { label: Option<String> },
    EndComputePass,
    CopyTextureToTexture {
        src: TextureCopyLocation,
        dst: TextureCopyLocation,
        width: u32,
        height: u32,
        layers: u32,
    },
    SetRenderPipeline(RenderPipelineHandle),
    SetComputePipeline(ComputePipelineHandle),
    SetBindGroup { index: u32, bind_group: BindGroupHandle },
    SetVertexBuffer { slot: u32, buffer: BufferHandle },
    SetIndexBuffer(BufferHandle),
    SetViewport { width: f32, height: f32 },
    Draw { vertices: Range<u32>, instances: Range<u32> },
    DrawIndexed { indices: Range<u32>, instances: Range<u32> },
    Dispatch { x: u32, y: u32, z: u32 },
    DestroyBuffer(BufferHandle),
    DestroyTexture(TextureHandle),
}

/// Backend that records calls instead of talking to a GPU
pub struct RecordingBackend {
    width: u32,
    height: u32,
    swapchain_format: TextureFormat,
    next_id: u64,
    calls: Vec<RecordedCall>,
    textures: HashMap<TextureHandle, TextureDescriptor>,
    live_buffers: HashSet<BufferHandle>,
    fail_buffer_label: Option<String>,
    fail_texture_label: Option<String>,
    fail_pipeline_label: Option<String>,
    in_frame: bool,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            swapchain_format: TextureFormat::Bgra8Unorm,
            next_id: 1,
            calls: Vec::new(),
            textures: HashMap::new(),
            live_buffers: HashSet::new(),
            fail_buffer_label: None,
            fail_texture_label: None,
            fail_pipeline_label: None,
            in_frame: false,
        }
    }

    /// Make the next buffer whose label starts with `label` fail to allocate
    pub fn fail_buffer_creation(&mut self, label: &str) {
        self.fail_buffer_label = Some(label.to_string());
    }

    /// Make the next texture whose label starts with `label` fail to allocate
    pub fn fail_texture_creation(&mut self, label: &str) {
        self.fail_texture_label = Some(label.to_string());
    }

    /// Make the next pipeline whose label starts with `label` fail to compile
    pub fn fail_pipeline_creation(&mut self, label: &str) {
        self.fail_pipeline_label = Some(label.to_string());
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<RecordedCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of presented frames
    pub fn present_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, RecordedCall::EndFrame))
            .count()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture)
    }

    /// Descriptor of the live texture carrying `label`
    pub fn texture_by_label(&self, label: &str) -> Option<(TextureHandle, &TextureDescriptor)> {
        self.textures
            .iter()
            .find(|(_, desc)| desc.label.as_deref() == Some(label))
            .map(|(handle, desc)| (*handle, desc))
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn should_fail(filter: &mut Option<String>, label: Option<&str>) -> bool {
        match (filter.as_deref(), label) {
            (Some(prefix), Some(label)) if label.starts_with(prefix) => {
                *filter = None;
                true
            }
            _ => false,
        }
    }

    fn record(&mut self, call: RecordedCall) {
        log::trace!("{:?}", call);
        self.calls.push(call);
    }
}

impl GraphicsBackend for RecordingBackend {
    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        if self.in_frame {
            return Err(BackendError::AcquireImageFailed("frame already in flight".into()));
        }
        self.in_frame = true;
        self.record(RecordedCall::BeginFrame);

        Ok(FrameContext {
            swapchain_texture: TextureHandle(self.allocate()),
            swapchain_view: TextureViewHandle(self.allocate()),
            width: self.width,
            height: self.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if !self.in_frame {
            return Err(BackendError::AcquireImageFailed("end_frame without begin_frame".into()));
        }
        self.in_frame = false;
        self.record(RecordedCall::EndFrame);
        Ok(())
    }

    fn submit(&mut self) {
        self.record(RecordedCall::Submit);
    }

    fn swapchain_format(&self) -> TextureFormat {
        self.swapchain_format
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        if Self::should_fail(&mut self.fail_buffer_label, desc.label.as_deref()) {
            return Err(BackendError::OutOfMemory);
        }
        let handle = BufferHandle(self.allocate());
        self.live_buffers.insert(handle);
        self.record(RecordedCall::CreateBuffer {
            label: desc.label.clone(),
            size: desc.size,
        });
        Ok(handle)
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let desc = BufferDescriptor {
            size: data.len() as u64,
            ..desc.clone()
        };
        self.create_buffer(&desc)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) {
        self.record(RecordedCall::WriteBuffer {
            buffer,
            data: data.to_vec(),
        });
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if Self::should_fail(&mut self.fail_texture_label, desc.label.as_deref()) {
            return Err(BackendError::OutOfMemory);
        }
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?}: zero-sized texture",
                desc.label
            )));
        }
        let handle = TextureHandle(self.allocate());
        self.textures.insert(handle, desc.clone());
        self.record(RecordedCall::CreateTexture {
            handle,
            label: desc.label.clone(),
        });
        Ok(handle)
    }

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        desc: &TextureViewDescriptor,
    ) -> BackendResult<TextureViewHandle> {
        if !self.textures.contains_key(&texture) {
            return Err(BackendError::TextureCreationFailed("Texture not found".into()));
        }
        let handle = TextureViewHandle(self.allocate());
        self.record(RecordedCall::CreateTextureView {
            texture,
            label: desc.label.clone(),
        });
        Ok(handle)
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32) {
        self.record(RecordedCall::WriteTexture {
            texture,
            width,
            height,
            len: data.len(),
        });
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let handle = SamplerHandle(self.allocate());
        self.record(RecordedCall::CreateSampler {
            label: desc.label.clone(),
        });
        Ok(handle)
    }

    fn create_bind_group_layout(
        &mut self,
        _entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let handle = BindGroupLayoutHandle(self.allocate());
        self.record(RecordedCall::CreateBindGroupLayout);
        Ok(handle)
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        _entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let handle = BindGroupHandle(self.allocate());
        self.record(RecordedCall::CreateBindGroup);
        Ok(handle)
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        if Self::should_fail(&mut self.fail_pipeline_label, desc.label.as_deref()) {
            return Err(BackendError::PipelineCreationFailed(format!("{:?}", desc.label)));
        }
        let handle = RenderPipelineHandle(self.allocate());
        self.record(RecordedCall::CreateRenderPipeline {
            label: desc.label.clone(),
        });
        Ok(handle)
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<ComputePipelineHandle> {
        if Self::should_fail(&mut self.fail_pipeline_label, desc.label.as_deref()) {
            return Err(BackendError::PipelineCreationFailed(format!("{:?}", desc.label)));
        }
        let handle = ComputePipelineHandle(self.allocate());
        self.record(RecordedCall::CreateComputePipeline {
            label: desc.label.clone(),
        });
        Ok(handle)
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.record(RecordedCall::BeginRenderPass {
            label: desc.label.clone(),
            color_views: desc.color_attachments.iter().map(|a| a.view).collect(),
        });
    }

    fn end_render_pass(&mut self) {
        self.record(RecordedCall::EndRenderPass);
    }

    fn begin_compute_pass(&mut self, label: Option<&str>) {
        self.record(RecordedCall::BeginComputePass {
            label: label.map(|s| s.to_string()),
        });
    }

    fn end_compute_pass(&mut self) {
        self.record(RecordedCall::EndComputePass);
    }

    fn copy_texture_to_texture(
        &mut self,
        src: TextureCopyLocation,
        dst: TextureCopyLocation,
        width: u32,
        height: u32,
        layers: u32,
    ) {
        self.record(RecordedCall::CopyTextureToTexture {
            src,
            dst,
            width,
            height,
            layers,
        });
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record(RecordedCall::SetRenderPipeline(pipeline));
    }

    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineHandle) {
        self.record(RecordedCall::SetComputePipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.record(RecordedCall::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        self.record(RecordedCall::SetVertexBuffer { slot, buffer });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle) {
        self.record(RecordedCall::SetIndexBuffer(buffer));
    }

    fn set_viewport(&mut self, width: f32, height: f32) {
        self.record(RecordedCall::SetViewport { width, height });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.record(RecordedCall::Draw { vertices, instances });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, instances: Range<u32>) {
        self.record(RecordedCall::DrawIndexed { indices, instances });
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        self.record(RecordedCall::Dispatch { x, y, z });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.live_buffers.remove(&buffer);
        self.record(RecordedCall::DestroyBuffer(buffer));
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.record(RecordedCall::DestroyTexture(texture));
    }
}

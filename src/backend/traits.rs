//! Core backend abstraction traits
//!
//! The renderer only talks to the GPU through [`GraphicsBackend`]. The trait is
//! object safe so passes can record against `&mut dyn GraphicsBackend`, which
//! lets the whole frame run on [`RecordingBackend`](super::recording::RecordingBackend)
//! in tests.

use crate::backend::types::*;
use std::ops::Range;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to acquire next image: {0}")]
    AcquireImageFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create sampler: {0}")]
    SamplerCreationFailed(String),
    #[error("Failed to create bind group: {0}")]
    BindGroupCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Out of memory")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a texture view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewHandle(pub(crate) u64);

/// Handle to a sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerHandle(pub(crate) u64);

/// Handle to a render pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPipelineHandle(pub(crate) u64);

/// Handle to a compute pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputePipelineHandle(pub(crate) u64);

/// Handle to a bind group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupHandle(pub(crate) u64);

/// Handle to a bind group layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutHandle(pub(crate) u64);

/// Resource bound at one slot of a bind group
#[derive(Debug, Clone, Copy)]
pub enum BindGroupEntry {
    /// Whole uniform buffer
    Buffer(BufferHandle),
    Texture(TextureViewHandle),
    Sampler(SamplerHandle),
    StorageTexture(TextureViewHandle),
}

/// Bind group layout entry
#[derive(Debug, Clone)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStageFlags,
    pub ty: BindingType,
}

impl BindGroupLayoutEntry {
    pub fn new(binding: u32, visibility: ShaderStageFlags, ty: BindingType) -> Self {
        Self {
            binding,
            visibility,
            ty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderStageFlags(u32);

impl ShaderStageFlags {
    pub const VERTEX: Self = Self(1 << 0);
    pub const FRAGMENT: Self = Self(1 << 1);
    pub const COMPUTE: Self = Self(1 << 2);
    pub const VERTEX_FRAGMENT: Self = Self((1 << 0) | (1 << 1));

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// Binding type
#[derive(Debug, Clone)]
pub enum BindingType {
    UniformBuffer,
    Texture {
        sample_type: TextureSampleType,
        view_dimension: TextureViewDimension,
    },
    /// Write-only storage texture
    StorageTexture {
        format: TextureFormat,
        view_dimension: TextureViewDimension,
    },
    Sampler { filtering: bool },
}

impl BindingType {
    /// Filterable float 2D texture
    pub fn float_texture_2d() -> Self {
        BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: true },
            view_dimension: TextureViewDimension::D2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSampleType {
    Float { filterable: bool },
    Depth,
}

/// Triangle-list render pipeline with clockwise front faces
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor {
    pub label: Option<String>,
    /// WGSL module containing both entry points
    pub shader: String,
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub vertex_streams: Vec<VertexStream>,
    pub bind_group_layouts: Vec<BindGroupLayoutHandle>,
    pub cull_mode: CullMode,
    /// Depth-tested (`Less`) and depth-written when set
    pub depth_format: Option<TextureFormat>,
    pub color_targets: Vec<TextureFormat>,
}

/// Compute pipeline descriptor
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor {
    pub label: Option<String>,
    pub shader: String,
    pub entry_point: String,
    pub bind_group_layouts: Vec<BindGroupLayoutHandle>,
}

/// Color target of a render pass; cleared on load, stored on end
#[derive(Debug, Clone)]
pub struct ColorAttachment {
    pub view: TextureViewHandle,
    pub clear: [f32; 4],
}

/// Depth target of a render pass; cleared on load, stored on end
#[derive(Debug, Clone)]
pub struct DepthAttachment {
    pub view: TextureViewHandle,
    pub clear: f32,
}

/// Render pass descriptor
#[derive(Debug, Clone)]
pub struct RenderPassDescriptor {
    pub label: Option<String>,
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_attachment: Option<DepthAttachment>,
}

/// Frame context returned when beginning a frame
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Acquired swapchain image, valid as a copy destination until `end_frame`
    pub swapchain_texture: TextureHandle,
    pub swapchain_view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
}

/// Device seen by the renderer
///
/// Creation calls return handles; recording calls are buffered into the
/// current pass and run in order on `submit` or `end_frame`. Index buffers
/// always hold `u32` indices.
pub trait GraphicsBackend {
    /// Surface extent, clamped to the device's texture limit
    fn surface_size(&self) -> (u32, u32);

    /// Acquire the next swapchain image and open the frame's command encoder
    fn begin_frame(&mut self) -> BackendResult<FrameContext>;

    /// Submit recorded work and present the acquired image
    fn end_frame(&mut self) -> BackendResult<()>;

    /// Submit recorded work outside of a frame (startup preprocessing)
    fn submit(&mut self);

    fn swapchain_format(&self) -> TextureFormat;

    // Resources

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    /// Create a buffer holding `data`; `desc.size` is ignored
    fn create_buffer_init(&mut self, desc: &BufferDescriptor, data: &[u8]) -> BackendResult<BufferHandle>;

    /// Overwrite a buffer from its start through the queue's staging memory
    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]);

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        desc: &TextureViewDescriptor,
    ) -> BackendResult<TextureViewHandle>;

    /// Write tightly packed texels into mip 0, layer 0 of a texture
    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32);

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle>;

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn destroy_texture(&mut self, texture: TextureHandle);

    // Pipelines

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle>;

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle>;

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle>;

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<ComputePipelineHandle>;

    // Recording

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor);

    fn end_render_pass(&mut self);

    fn begin_compute_pass(&mut self, label: Option<&str>);

    fn end_compute_pass(&mut self);

    /// Copy `width`x`height` texels of the first `layers` array slices
    fn copy_texture_to_texture(
        &mut self,
        src: TextureCopyLocation,
        dst: TextureCopyLocation,
        width: u32,
        height: u32,
        layers: u32,
    );

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle);

    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineHandle);

    /// Bind into whichever pass is open
    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle);

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle);

    fn set_index_buffer(&mut self, buffer: BufferHandle);

    /// Full-depth viewport anchored at the origin
    fn set_viewport(&mut self, width: f32, height: f32);

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);

    fn draw_indexed(&mut self, indices: Range<u32>, instances: Range<u32>);

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32);
}

//! wgpu backend implementation
//!
//! Handles index into per-kind slot maps. Passes are buffered (see
//! [`commands`]) and encoded into one command encoder that is submitted by
//! [`GraphicsBackend::submit`] or at the end of the frame. Creation calls run
//! inside wgpu error scopes, so validation and out-of-memory failures come
//! back as [`BackendError`]s.

mod commands;
mod convert;

use crate::backend::traits::*;
use crate::backend::types::*;
use commands::{ComputeCommand, OpenPass, PassResources, RenderCommand};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Objects of one kind, keyed by the id inside their handle
pub(crate) struct Slots<T> {
    items: HashMap<u64, T>,
    next_id: u64,
}

impl<T> Slots<T> {
    fn new() -> Self {
        Self {
            items: HashMap::new(),
            next_id: 1,
        }
    }

    fn insert(&mut self, item: T) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, item);
        id
    }

    pub(crate) fn get(&self, id: u64) -> Option<&T> {
        self.items.get(&id)
    }

    fn remove(&mut self, id: u64) -> Option<T> {
        self.items.remove(&id)
    }
}

fn copy_location(texture: &wgpu::Texture, mip_level: u32) -> wgpu::ImageCopyTexture<'_> {
    wgpu::ImageCopyTexture {
        texture,
        mip_level,
        origin: wgpu::Origin3d::ZERO,
        aspect: wgpu::TextureAspect::All,
    }
}

/// Swapchain image acquired by `begin_frame`
struct AcquiredImage {
    surface_texture: wgpu::SurfaceTexture,
    texture_id: u64,
    view_id: u64,
}

pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    acquired: Option<AcquiredImage>,

    buffers: Slots<wgpu::Buffer>,
    textures: Slots<wgpu::Texture>,
    views: Slots<wgpu::TextureView>,
    samplers: Slots<wgpu::Sampler>,
    layouts: Slots<wgpu::BindGroupLayout>,
    bind_groups: Slots<wgpu::BindGroup>,
    render_pipelines: Slots<wgpu::RenderPipeline>,
    compute_pipelines: Slots<wgpu::ComputePipeline>,

    encoder: Option<wgpu::CommandEncoder>,
    open_pass: Option<OpenPass>,
}

impl WgpuBackend {
    /// Create the backend for `window`, blocking on adapter and device requests
    pub fn new(window: Arc<winit::window::Window>) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(window))
    }

    pub async fn new_async(window: Arc<winit::window::Window>) -> BackendResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let info = adapter.get_info();
        log::info!("Selected GPU: {} ({:?} backend)", info.name, info.backend);

        // RGBA32F targets and the environment cubes are sampled with filtering
        if !adapter.features().contains(wgpu::Features::FLOAT32_FILTERABLE) {
            return Err(BackendError::DeviceCreationFailed(
                "adapter does not support filtering of 32-bit float textures".into(),
            ));
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Metallic Reflections Device"),
                    required_features: wgpu::Features::FLOAT32_FILTERABLE,
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);

        // The presented image is a byte copy of an sRGB render target, so the
        // swapchain itself must be the matching non-sRGB 8-bit format
        let format = [wgpu::TextureFormat::Rgba8Unorm, wgpu::TextureFormat::Bgra8Unorm]
            .into_iter()
            .find(|f| caps.formats.contains(f))
            .ok_or_else(|| BackendError::SurfaceCreationFailed("no 8-bit UNORM surface format available".into()))?;

        if !caps.usages.contains(wgpu::TextureUsages::COPY_DST) {
            return Err(BackendError::SurfaceCreationFailed(
                "surface textures cannot be copy destinations".into(),
            ));
        }

        let present_mode = if caps.present_modes.contains(&wgpu::PresentMode::Immediate) {
            wgpu::PresentMode::Immediate
        } else {
            log::warn!("Tearing not supported, presenting with vsync");
            wgpu::PresentMode::Fifo
        };

        let size = window.inner_size();
        let max_size = device.limits().max_texture_dimension_2d;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
            format,
            width: size.width.clamp(1, max_size),
            height: size.height.clamp(1, max_size),
            present_mode,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);
        log::info!(
            "Surface configured: {}x{} {:?} {:?}",
            surface_config.width,
            surface_config.height,
            surface_config.format,
            surface_config.present_mode
        );

        Ok(Self {
            surface,
            device,
            queue,
            surface_config,
            acquired: None,
            buffers: Slots::new(),
            textures: Slots::new(),
            views: Slots::new(),
            samplers: Slots::new(),
            layouts: Slots::new(),
            bind_groups: Slots::new(),
            render_pipelines: Slots::new(),
            compute_pipelines: Slots::new(),
            encoder: None,
            open_pass: None,
        })
    }

    /// Run `create` inside validation and out-of-memory error scopes
    fn scoped<T>(device: &wgpu::Device, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(device);
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());

        match validation.or(out_of_memory) {
            Some(error) => Err(error.to_string()),
            None => Ok(value),
        }
    }

    fn describe(label: Option<&str>, error: String) -> String {
        format!("{}: {}", label.unwrap_or("unlabelled"), error)
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            })
        })
    }

    /// Texture behind `handle`, including the acquired swapchain image
    fn texture(&self, handle: TextureHandle) -> Option<&wgpu::Texture> {
        match &self.acquired {
            Some(image) if image.texture_id == handle.0 => Some(&image.surface_texture.texture),
            _ => self.textures.get(handle.0),
        }
    }

    fn acquire(&mut self) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        match self.surface.get_current_texture() {
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.surface_config);
                self.surface.get_current_texture()
            }
            other => other,
        }
    }

    fn record_render(&mut self, command: RenderCommand) {
        if let Some(OpenPass::Render { commands, .. }) = &mut self.open_pass {
            commands.push(command);
        }
    }

    fn record_compute(&mut self, command: ComputeCommand) {
        if let Some(OpenPass::Compute { commands, .. }) = &mut self.open_pass {
            commands.push(command);
        }
    }

    fn close_pass(&mut self) {
        let Some(pass) = self.open_pass.take() else {
            return;
        };

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            })
        });
        let resources = PassResources {
            buffers: &self.buffers,
            views: &self.views,
            bind_groups: &self.bind_groups,
            render_pipelines: &self.render_pipelines,
            compute_pipelines: &self.compute_pipelines,
        };

        match pass {
            OpenPass::Render { desc, commands } => commands::replay_render(encoder, &resources, &desc, &commands),
            OpenPass::Compute { label, commands } => {
                commands::replay_compute(encoder, &resources, label.as_deref(), &commands)
            }
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        let surface_texture = self.acquire().map_err(|e| match e {
            wgpu::SurfaceError::Lost => BackendError::SurfaceLost,
            wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
            _ => BackendError::AcquireImageFailed(e.to_string()),
        })?;

        // The image gets ids from the regular slots so handles never collide
        let texture_id = self.textures.next_id;
        self.textures.next_id += 1;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let view_id = self.views.insert(view);

        self.acquired = Some(AcquiredImage {
            surface_texture,
            texture_id,
            view_id,
        });
        self.encoder();

        Ok(FrameContext {
            swapchain_texture: TextureHandle(texture_id),
            swapchain_view: TextureViewHandle(view_id),
            width: self.surface_config.width,
            height: self.surface_config.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.submit();

        let image = self
            .acquired
            .take()
            .ok_or_else(|| BackendError::AcquireImageFailed("end_frame without begin_frame".into()))?;
        self.views.remove(image.view_id);
        image.surface_texture.present();
        Ok(())
    }

    fn submit(&mut self) {
        self.close_pass();
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn swapchain_format(&self) -> TextureFormat {
        convert::known_format(self.surface_config.format).unwrap_or(TextureFormat::Rgba8Unorm)
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let buffer = Self::scoped(&self.device, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: desc.label.as_deref(),
                size: desc.size,
                usage: convert::buffer_usages(desc.usage),
                mapped_at_creation: false,
            })
        })
        .map_err(|e| BackendError::BufferCreationFailed(Self::describe(desc.label.as_deref(), e)))?;

        log::debug!("Created buffer {:?} ({} bytes)", desc.label, desc.size);
        Ok(BufferHandle(self.buffers.insert(buffer)))
    }

    fn create_buffer_init(&mut self, desc: &BufferDescriptor, data: &[u8]) -> BackendResult<BufferHandle> {
        let buffer = Self::scoped(&self.device, |device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: desc.label.as_deref(),
                contents: data,
                usage: convert::buffer_usages(desc.usage),
            })
        })
        .map_err(|e| BackendError::BufferCreationFailed(Self::describe(desc.label.as_deref(), e)))?;

        log::debug!("Created buffer {:?} ({} bytes, initialised)", desc.label, data.len());
        Ok(BufferHandle(self.buffers.insert(buffer)))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) {
        if let Some(buffer) = self.buffers.get(buffer.0) {
            self.queue.write_buffer(buffer, 0, data);
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let texture = Self::scoped(&self.device, |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: desc.label.as_deref(),
                size: wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: desc.layers,
                },
                mip_level_count: desc.mip_levels,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: convert::texture_format(desc.format),
                usage: convert::texture_usages(desc.usage),
                view_formats: &[],
            })
        })
        .map_err(|e| BackendError::TextureCreationFailed(Self::describe(desc.label.as_deref(), e)))?;

        log::debug!(
            "Created texture {:?} {}x{}x{} ({} mips, {:?})",
            desc.label,
            desc.width,
            desc.height,
            desc.layers,
            desc.mip_levels,
            desc.format
        );
        Ok(TextureHandle(self.textures.insert(texture)))
    }

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        desc: &TextureViewDescriptor,
    ) -> BackendResult<TextureViewHandle> {
        let texture = self
            .textures
            .get(texture.0)
            .ok_or_else(|| BackendError::TextureCreationFailed("Texture not found".into()))?;

        let view = Self::scoped(&self.device, |_| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                label: desc.label.as_deref(),
                format: None,
                dimension: desc.dimension.map(convert::view_dimension),
                aspect: wgpu::TextureAspect::All,
                base_mip_level: desc.base_mip_level,
                mip_level_count: desc.mip_level_count,
                base_array_layer: 0,
                array_layer_count: desc.array_layer_count,
            })
        })
        .map_err(|e| BackendError::TextureCreationFailed(Self::describe(desc.label.as_deref(), e)))?;

        Ok(TextureViewHandle(self.views.insert(view)))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32) {
        let Some(texture) = self.textures.get(texture.0) else {
            return;
        };
        let Some(format) = convert::known_format(texture.format()) else {
            log::warn!("write_texture: unsupported format {:?}", texture.format());
            return;
        };

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * format.bytes_per_pixel()),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let filter = convert::filter_mode(desc.filter);
        let sampler = Self::scoped(&self.device, |device| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: desc.label.as_deref(),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: filter,
                ..Default::default()
            })
        })
        .map_err(|e| BackendError::SamplerCreationFailed(Self::describe(desc.label.as_deref(), e)))?;

        Ok(SamplerHandle(self.samplers.insert(sampler)))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(buffer.0) {
            buffer.destroy();
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(texture) = self.textures.remove(texture.0) {
            texture.destroy();
        }
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = entries
            .iter()
            .map(|entry| wgpu::BindGroupLayoutEntry {
                binding: entry.binding,
                visibility: convert::shader_stages(entry.visibility),
                ty: convert::binding_type(&entry.ty),
                count: None,
            })
            .collect();

        let layout = Self::scoped(&self.device, |device| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries: &entries,
            })
        })
        .map_err(BackendError::BindGroupCreationFailed)?;

        Ok(BindGroupLayoutHandle(self.layouts.insert(layout)))
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let layout = self
            .layouts
            .get(layout.0)
            .ok_or_else(|| BackendError::BindGroupCreationFailed("Layout not found".into()))?;

        let entries = entries
            .iter()
            .map(|&(binding, entry)| {
                let resource = match entry {
                    BindGroupEntry::Buffer(buffer) => self.buffers.get(buffer.0)?.as_entire_binding(),
                    BindGroupEntry::Texture(view) | BindGroupEntry::StorageTexture(view) => {
                        wgpu::BindingResource::TextureView(self.views.get(view.0)?)
                    }
                    BindGroupEntry::Sampler(sampler) => wgpu::BindingResource::Sampler(self.samplers.get(sampler.0)?),
                };
                Some(wgpu::BindGroupEntry { binding, resource })
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| BackendError::BindGroupCreationFailed("Bound resource not found".into()))?;

        let bind_group = Self::scoped(&self.device, |device| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: None,
                layout,
                entries: &entries,
            })
        })
        .map_err(BackendError::BindGroupCreationFailed)?;

        Ok(BindGroupHandle(self.bind_groups.insert(bind_group)))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        let layouts: Vec<&wgpu::BindGroupLayout> = desc
            .bind_group_layouts
            .iter()
            .filter_map(|handle| self.layouts.get(handle.0))
            .collect();

        // One attribute per buffer; the arrays must outlive the layouts
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = desc
            .vertex_streams
            .iter()
            .map(|stream| {
                [wgpu::VertexAttribute {
                    format: convert::vertex_format(stream.format),
                    offset: 0,
                    shader_location: stream.location,
                }]
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = desc
            .vertex_streams
            .iter()
            .zip(&attributes)
            .map(|(stream, attributes)| wgpu::VertexBufferLayout {
                array_stride: stream.stride(),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_targets
            .iter()
            .map(|&format| Some(convert::texture_format(format).into()))
            .collect();

        let depth_stencil = desc.depth_format.map(|format| wgpu::DepthStencilState {
            format: convert::texture_format(format),
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = Self::scoped(&self.device, |device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: desc.label.as_deref(),
                source: wgpu::ShaderSource::Wgsl(desc.shader.as_str().into()),
            });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: desc.label.as_deref(),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: desc.label.as_deref(),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: &desc.vertex_entry,
                    buffers: &vertex_buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: &desc.fragment_entry,
                    targets: &targets,
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Cw,
                    cull_mode: convert::cull_face(desc.cull_mode),
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        })
        .map_err(|e| BackendError::PipelineCreationFailed(Self::describe(desc.label.as_deref(), e)))?;

        Ok(RenderPipelineHandle(self.render_pipelines.insert(pipeline)))
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<ComputePipelineHandle> {
        let layouts: Vec<&wgpu::BindGroupLayout> = desc
            .bind_group_layouts
            .iter()
            .filter_map(|handle| self.layouts.get(handle.0))
            .collect();

        let pipeline = Self::scoped(&self.device, |device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: desc.label.as_deref(),
                source: wgpu::ShaderSource::Wgsl(desc.shader.as_str().into()),
            });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: desc.label.as_deref(),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: desc.label.as_deref(),
                layout: Some(&layout),
                module: &module,
                entry_point: &desc.entry_point,
                compilation_options: Default::default(),
            })
        })
        .map_err(|e| BackendError::PipelineCreationFailed(Self::describe(desc.label.as_deref(), e)))?;

        Ok(ComputePipelineHandle(self.compute_pipelines.insert(pipeline)))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.close_pass();
        self.open_pass = Some(OpenPass::Render {
            desc: desc.clone(),
            commands: Vec::new(),
        });
    }

    fn end_render_pass(&mut self) {
        self.close_pass();
    }

    fn begin_compute_pass(&mut self, label: Option<&str>) {
        self.close_pass();
        self.open_pass = Some(OpenPass::Compute {
            label: label.map(String::from),
            commands: Vec::new(),
        });
    }

    fn end_compute_pass(&mut self) {
        self.close_pass();
    }

    fn copy_texture_to_texture(
        &mut self,
        src: TextureCopyLocation,
        dst: TextureCopyLocation,
        width: u32,
        height: u32,
        layers: u32,
    ) {
        self.close_pass();
        let mut encoder = self.encoder.take().unwrap_or_else(|| {
            self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            })
        });

        if let (Some(src_texture), Some(dst_texture)) = (self.texture(src.texture), self.texture(dst.texture)) {
            encoder.copy_texture_to_texture(
                copy_location(src_texture, src.mip_level),
                copy_location(dst_texture, dst.mip_level),
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: layers,
                },
            );
        } else {
            log::warn!("copy_texture_to_texture: unknown texture handle");
        }

        self.encoder = Some(encoder);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record_render(RenderCommand::Pipeline(pipeline));
    }

    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineHandle) {
        self.record_compute(ComputeCommand::Pipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        match &mut self.open_pass {
            Some(OpenPass::Render { commands, .. }) => commands.push(RenderCommand::BindGroup(index, bind_group)),
            Some(OpenPass::Compute { commands, .. }) => commands.push(ComputeCommand::BindGroup(index, bind_group)),
            None => {}
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        self.record_render(RenderCommand::VertexBuffer(slot, buffer));
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle) {
        self.record_render(RenderCommand::IndexBuffer(buffer));
    }

    fn set_viewport(&mut self, width: f32, height: f32) {
        self.record_render(RenderCommand::Viewport(width, height));
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.record_render(RenderCommand::Draw(vertices, instances));
    }

    fn draw_indexed(&mut self, indices: Range<u32>, instances: Range<u32>) {
        self.record_render(RenderCommand::DrawIndexed(indices, instances));
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        self.record_compute(ComputeCommand::Dispatch(x, y, z));
    }
}

//! Environment map preprocessing
//!
//! Turns an equirectangular HDR image into a prefiltered cubemap for
//! image-based specular lighting. Runs once at startup:
//!
//! 1. reproject the equirect image into mip 0 of the unfiltered cube;
//! 2. box-filter the remaining unfiltered mips;
//! 3. copy mip 0 unchanged into the prefiltered cube;
//! 4. GGX-prefilter mips 1..N-1, roughness `m / (N - 1)`.

pub mod shaders;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{RenderError, RenderResult};
use crate::resources::{GpuTexture, HdrImage};
use bytemuck::{Pod, Zeroable};

/// Compute workgroup edge shared by every environment shader
pub const WORKGROUP_SIZE: u32 = 8;

/// Preprocessing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Edge length of cube mip 0 in texels
    pub base_size: u32,
    /// GGX samples per prefiltered texel
    pub sample_count: u32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            base_size: 1024,
            sample_count: 1024,
        }
    }
}

/// Number of mips in a full chain for a `size` edge
pub fn mip_count(size: u32) -> u32 {
    if size == 0 {
        return 1;
    }
    u32::BITS - size.leading_zeros()
}

/// Edge length of mip `mip`, never below one texel
pub fn mip_size(size: u32, mip: u32) -> u32 {
    size.checked_shr(mip).unwrap_or(0).max(1)
}

/// Workgroup counts covering all six faces of a `size` mip
pub fn dispatch_size(size: u32) -> (u32, u32, u32) {
    let groups = size.div_ceil(WORKGROUP_SIZE);
    (groups, groups, 6)
}

/// Per-dispatch constants of the prefilter shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct PrefilterParams {
    pub mip: u32,
    pub mip_count: u32,
    pub base_size: u32,
    pub sample_count: u32,
}

/// Preprocessed environment, ready for the lighting pass
pub struct EnvironmentMap {
    unfiltered: TextureHandle,
    prefiltered: TextureHandle,
    prefiltered_view: TextureViewHandle,
    size: u32,
    mip_count: u32,
}

/// Everything created during preprocessing, released on failure
#[derive(Default)]
struct Allocations {
    textures: Vec<TextureHandle>,
    buffers: Vec<BufferHandle>,
}

impl Allocations {
    fn release(self, backend: &mut dyn GraphicsBackend) {
        for texture in self.textures {
            backend.destroy_texture(texture);
        }
        for buffer in self.buffers {
            backend.destroy_buffer(buffer);
        }
    }
}

impl EnvironmentMap {
    /// Upload `image` and build both cubemaps
    pub fn preprocess(
        backend: &mut dyn GraphicsBackend,
        image: &HdrImage,
        config: &EnvironmentConfig,
    ) -> RenderResult<Self> {
        let mut allocations = Allocations::default();
        match Self::run(backend, image, config, &mut allocations) {
            Ok(map) => Ok(map),
            Err(err) => {
                allocations.release(backend);
                Err(err)
            }
        }
    }

    fn run(
        backend: &mut dyn GraphicsBackend,
        image: &HdrImage,
        config: &EnvironmentConfig,
        allocations: &mut Allocations,
    ) -> RenderResult<Self> {
        let size = config.base_size.max(1);
        let mip_count = mip_count(size);

        log::info!(
            "Preprocessing environment {} ({}x{}) into {}x{} cube, {} mips",
            image.name,
            image.width,
            image.height,
            size,
            size,
            mip_count
        );

        let source = GpuTexture::create(backend, image)?;
        allocations.textures.push(source.handle);

        let unfiltered = create_cube(
            backend,
            "Unfiltered Environment",
            size,
            mip_count,
            TextureUsage::TEXTURE_BINDING | TextureUsage::STORAGE_BINDING | TextureUsage::COPY_SRC,
        )?;
        allocations.textures.push(unfiltered);

        let prefiltered = create_cube(
            backend,
            "Prefiltered Environment",
            size,
            mip_count,
            TextureUsage::TEXTURE_BINDING | TextureUsage::STORAGE_BINDING | TextureUsage::COPY_DST,
        )?;
        allocations.textures.push(prefiltered);

        let sampler = backend
            .create_sampler(&SamplerDescriptor::trilinear_clamp())
            .map_err(RenderError::resource("environment sampler"))?;

        equirect_to_cube(backend, &source, unfiltered, sampler, size)?;
        downsample(backend, unfiltered, size, mip_count)?;

        backend.copy_texture_to_texture(
            TextureCopyLocation::base(unfiltered),
            TextureCopyLocation::base(prefiltered),
            size,
            size,
            6,
        );
        backend.submit();

        prefilter(backend, unfiltered, prefiltered, sampler, size, mip_count, config, allocations)?;

        // Everything reading the source has been submitted
        allocations.textures.retain(|&t| t != source.handle);
        backend.destroy_texture(source.handle);

        let prefiltered_view = backend
            .create_texture_view(prefiltered, &TextureViewDescriptor::cube("Prefiltered Environment Cube"))
            .map_err(RenderError::resource("Prefiltered Environment Cube"))?;

        Ok(Self {
            unfiltered,
            prefiltered,
            prefiltered_view,
            size,
            mip_count,
        })
    }

    /// Cube view over the whole prefiltered chain
    pub fn prefiltered_view(&self) -> TextureViewHandle {
        self.prefiltered_view
    }

    pub fn prefiltered(&self) -> TextureHandle {
        self.prefiltered
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn mip_count(&self) -> u32 {
        self.mip_count
    }

    pub fn destroy(self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_texture(self.unfiltered);
        backend.destroy_texture(self.prefiltered);
    }
}

fn create_cube(
    backend: &mut dyn GraphicsBackend,
    label: &str,
    size: u32,
    mip_count: u32,
    usage: TextureUsage,
) -> RenderResult<TextureHandle> {
    backend
        .create_texture(&TextureDescriptor::cube(
            label,
            size,
            mip_count,
            TextureFormat::Rgba32Float,
            usage,
        ))
        .map_err(RenderError::resource(label))
}

fn storage_cube_binding(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry::new(
        binding,
        ShaderStageFlags::COMPUTE,
        BindingType::StorageTexture {
            format: TextureFormat::Rgba32Float,
            view_dimension: TextureViewDimension::D2Array,
        },
    )
}

fn mip_view(
    backend: &mut dyn GraphicsBackend,
    texture: TextureHandle,
    label: String,
    mip: u32,
) -> RenderResult<TextureViewHandle> {
    backend
        .create_texture_view(texture, &TextureViewDescriptor::cube_mip_as_array(&label, mip))
        .map_err(RenderError::resource(label))
}

fn compute_pipeline(
    backend: &mut dyn GraphicsBackend,
    label: &str,
    shader: String,
    layout: BindGroupLayoutHandle,
) -> RenderResult<ComputePipelineHandle> {
    backend
        .create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some(label.to_string()),
            shader,
            entry_point: "cs_main".to_string(),
            bind_group_layouts: vec![layout],
        })
        .map_err(RenderError::resource(label))
}

fn dispatch(
    backend: &mut dyn GraphicsBackend,
    label: &str,
    pipeline: ComputePipelineHandle,
    bind_group: BindGroupHandle,
    size: u32,
) {
    let (x, y, z) = dispatch_size(size);
    backend.begin_compute_pass(Some(label));
    backend.set_compute_pipeline(pipeline);
    backend.set_bind_group(0, bind_group);
    backend.dispatch_compute(x, y, z);
    backend.end_compute_pass();
}

fn equirect_to_cube(
    backend: &mut dyn GraphicsBackend,
    source: &GpuTexture,
    unfiltered: TextureHandle,
    sampler: SamplerHandle,
    size: u32,
) -> RenderResult<()> {
    let layout = backend
        .create_bind_group_layout(&[
            BindGroupLayoutEntry::new(0, ShaderStageFlags::COMPUTE, BindingType::float_texture_2d()),
            BindGroupLayoutEntry::new(1, ShaderStageFlags::COMPUTE, BindingType::Sampler { filtering: true }),
            storage_cube_binding(2),
        ])
        .map_err(RenderError::resource("equirect bind group layout"))?;
    let pipeline = compute_pipeline(backend, "Equirect To Cube", shaders::equirect_to_cube_shader(), layout)?;

    let target = mip_view(backend, unfiltered, "Unfiltered Mip 0".to_string(), 0)?;
    let bind_group = backend
        .create_bind_group(
            layout,
            &[
                (0, BindGroupEntry::Texture(source.view)),
                (1, BindGroupEntry::Sampler(sampler)),
                (2, BindGroupEntry::StorageTexture(target)),
            ],
        )
        .map_err(RenderError::resource("equirect bind group"))?;

    dispatch(backend, "Equirect To Cube", pipeline, bind_group, size);
    Ok(())
}

fn downsample(
    backend: &mut dyn GraphicsBackend,
    unfiltered: TextureHandle,
    size: u32,
    mip_count: u32,
) -> RenderResult<()> {
    let layout = backend
        .create_bind_group_layout(&[
            BindGroupLayoutEntry::new(
                0,
                ShaderStageFlags::COMPUTE,
                BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: false },
                    view_dimension: TextureViewDimension::D2Array,
                },
            ),
            storage_cube_binding(1),
        ])
        .map_err(RenderError::resource("downsample bind group layout"))?;
    let pipeline = compute_pipeline(
        backend,
        "Environment Downsample",
        shaders::DOWNSAMPLE_SHADER.to_string(),
        layout,
    )?;

    for mip in 1..mip_count {
        let src = mip_view(backend, unfiltered, format!("Unfiltered Mip {}", mip - 1), mip - 1)?;
        let dst = mip_view(backend, unfiltered, format!("Unfiltered Mip {}", mip), mip)?;
        let bind_group = backend
            .create_bind_group(
                layout,
                &[
                    (0, BindGroupEntry::Texture(src)),
                    (1, BindGroupEntry::StorageTexture(dst)),
                ],
            )
            .map_err(RenderError::resource(format!("downsample bind group {}", mip)))?;

        dispatch(backend, "Environment Downsample", pipeline, bind_group, mip_size(size, mip));
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn prefilter(
    backend: &mut dyn GraphicsBackend,
    unfiltered: TextureHandle,
    prefiltered: TextureHandle,
    sampler: SamplerHandle,
    size: u32,
    mip_count: u32,
    config: &EnvironmentConfig,
    allocations: &mut Allocations,
) -> RenderResult<()> {
    let params_buffer = backend
        .create_buffer(&BufferDescriptor {
            label: Some("Prefilter Params".to_string()),
            size: std::mem::size_of::<PrefilterParams>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })
        .map_err(RenderError::resource("Prefilter Params"))?;
    allocations.buffers.push(params_buffer);

    let layout = backend
        .create_bind_group_layout(&[
            BindGroupLayoutEntry::new(0, ShaderStageFlags::COMPUTE, BindingType::UniformBuffer),
            BindGroupLayoutEntry::new(
                1,
                ShaderStageFlags::COMPUTE,
                BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: TextureViewDimension::Cube,
                },
            ),
            BindGroupLayoutEntry::new(2, ShaderStageFlags::COMPUTE, BindingType::Sampler { filtering: true }),
            storage_cube_binding(3),
        ])
        .map_err(RenderError::resource("prefilter bind group layout"))?;
    let pipeline = compute_pipeline(backend, "Environment Prefilter", shaders::prefilter_shader(), layout)?;

    let source_cube = backend
        .create_texture_view(unfiltered, &TextureViewDescriptor::cube("Unfiltered Environment Cube"))
        .map_err(RenderError::resource("Unfiltered Environment Cube"))?;

    for mip in 1..mip_count {
        let params = PrefilterParams {
            mip,
            mip_count,
            base_size: size,
            sample_count: config.sample_count.max(1),
        };
        backend.write_buffer(params_buffer, bytemuck::bytes_of(&params));

        let dst = mip_view(backend, prefiltered, format!("Prefiltered Mip {}", mip), mip)?;
        let bind_group = backend
            .create_bind_group(
                layout,
                &[
                    (0, BindGroupEntry::Buffer(params_buffer)),
                    (1, BindGroupEntry::Texture(source_cube)),
                    (2, BindGroupEntry::Sampler(sampler)),
                    (3, BindGroupEntry::StorageTexture(dst)),
                ],
            )
            .map_err(RenderError::resource(format!("prefilter bind group {}", mip)))?;

        dispatch(backend, "Environment Prefilter", pipeline, bind_group, mip_size(size, mip));
        // Staged writes land at the next submit; one dispatch per submit
        backend.submit();
    }

    allocations.buffers.retain(|&b| b != params_buffer);
    backend.destroy_buffer(params_buffer);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RecordedCall, RecordingBackend};

    fn sky() -> HdrImage {
        HdrImage::from_pixels(2, 1, vec![[1.0, 0.5, 0.25, 1.0], [0.0, 0.0, 1.0, 1.0]], "sky").unwrap()
    }

    fn small_config() -> EnvironmentConfig {
        EnvironmentConfig {
            base_size: 16,
            sample_count: 8,
        }
    }

    #[test]
    fn test_mip_math() {
        assert_eq!(mip_count(1024), 11);
        assert_eq!(mip_count(1), 1);
        assert_eq!(mip_count(1000), 10);
        assert_eq!(mip_size(1024, 3), 128);
        assert_eq!(mip_size(1024, 10), 1);
        assert_eq!(mip_size(4, 40), 1);
        assert_eq!(dispatch_size(1024), (128, 128, 6));
        assert_eq!(dispatch_size(4), (1, 1, 6));
    }

    #[test]
    fn test_dispatch_per_mip() {
        let mut backend = RecordingBackend::new(4, 4);
        let map = EnvironmentMap::preprocess(&mut backend, &sky(), &small_config()).unwrap();
        assert_eq!(map.mip_count(), 5);

        let dispatches: Vec<u32> = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Dispatch { x, .. } => Some(*x),
                _ => None,
            })
            .collect();
        // Reprojection, 4 downsamples, 4 prefilters
        assert_eq!(dispatches, vec![2, 1, 1, 1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_source_is_released() {
        let mut backend = RecordingBackend::new(4, 4);
        let map = EnvironmentMap::preprocess(&mut backend, &sky(), &small_config()).unwrap();
        assert!(backend.texture_by_label("sky").is_none());
        assert_eq!(backend.live_texture_count(), 2);
        assert_eq!(backend.live_buffer_count(), 0);

        map.destroy(&mut backend);
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_failure_releases_everything() {
        let mut backend = RecordingBackend::new(4, 4);
        backend.fail_texture_creation("Prefiltered");
        let result = EnvironmentMap::preprocess(&mut backend, &sky(), &small_config());

        match result {
            Err(RenderError::ResourceCreation { resource, .. }) => {
                assert_eq!(resource, "Prefiltered Environment")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("preprocessing should fail"),
        }
        assert_eq!(backend.live_texture_count(), 0);
    }
}

//! Translation from backend descriptors to wgpu types

use crate::backend::traits::*;
use crate::backend::types::*;

pub(super) fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

/// Inverse of [`texture_format`] for the formats the renderer knows
pub(super) fn known_format(format: wgpu::TextureFormat) -> Option<TextureFormat> {
    [
        TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Bgra8Unorm,
        TextureFormat::Bgra8UnormSrgb,
        TextureFormat::Rgba32Float,
        TextureFormat::Depth32Float,
    ]
    .into_iter()
    .find(|&known| texture_format(known) == format)
}

pub(super) fn texture_usages(usage: TextureUsage) -> wgpu::TextureUsages {
    [
        (TextureUsage::COPY_SRC, wgpu::TextureUsages::COPY_SRC),
        (TextureUsage::COPY_DST, wgpu::TextureUsages::COPY_DST),
        (TextureUsage::TEXTURE_BINDING, wgpu::TextureUsages::TEXTURE_BINDING),
        (TextureUsage::STORAGE_BINDING, wgpu::TextureUsages::STORAGE_BINDING),
        (TextureUsage::RENDER_ATTACHMENT, wgpu::TextureUsages::RENDER_ATTACHMENT),
    ]
    .into_iter()
    .filter(|(flag, _)| usage.contains(*flag))
    .fold(wgpu::TextureUsages::empty(), |acc, (_, usages)| acc | usages)
}

pub(super) fn buffer_usages(usage: BufferUsage) -> wgpu::BufferUsages {
    [
        (BufferUsage::COPY_DST, wgpu::BufferUsages::COPY_DST),
        (BufferUsage::INDEX, wgpu::BufferUsages::INDEX),
        (BufferUsage::VERTEX, wgpu::BufferUsages::VERTEX),
        (BufferUsage::UNIFORM, wgpu::BufferUsages::UNIFORM),
    ]
    .into_iter()
    .filter(|(flag, _)| usage.contains(*flag))
    .fold(wgpu::BufferUsages::empty(), |acc, (_, usages)| acc | usages)
}

pub(super) fn shader_stages(flags: ShaderStageFlags) -> wgpu::ShaderStages {
    [
        (ShaderStageFlags::VERTEX, wgpu::ShaderStages::VERTEX),
        (ShaderStageFlags::FRAGMENT, wgpu::ShaderStages::FRAGMENT),
        (ShaderStageFlags::COMPUTE, wgpu::ShaderStages::COMPUTE),
    ]
    .into_iter()
    .filter(|(flag, _)| flags.contains(*flag))
    .fold(wgpu::ShaderStages::empty(), |acc, (_, stages)| acc | stages)
}

pub(super) fn view_dimension(dimension: TextureViewDimension) -> wgpu::TextureViewDimension {
    match dimension {
        TextureViewDimension::D2 => wgpu::TextureViewDimension::D2,
        TextureViewDimension::D2Array => wgpu::TextureViewDimension::D2Array,
        TextureViewDimension::Cube => wgpu::TextureViewDimension::Cube,
    }
}

pub(super) fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

pub(super) fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

pub(super) fn cull_face(mode: CullMode) -> Option<wgpu::Face> {
    match mode {
        CullMode::None => None,
        CullMode::Back => Some(wgpu::Face::Back),
    }
}

pub(super) fn binding_type(ty: &BindingType) -> wgpu::BindingType {
    match ty {
        BindingType::UniformBuffer => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        BindingType::Texture {
            sample_type,
            view_dimension: dimension,
        } => wgpu::BindingType::Texture {
            sample_type: match sample_type {
                TextureSampleType::Float { filterable } => wgpu::TextureSampleType::Float {
                    filterable: *filterable,
                },
                TextureSampleType::Depth => wgpu::TextureSampleType::Depth,
            },
            view_dimension: view_dimension(*dimension),
            multisampled: false,
        },
        BindingType::StorageTexture {
            format,
            view_dimension: dimension,
        } => wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: texture_format(*format),
            view_dimension: view_dimension(*dimension),
        },
        BindingType::Sampler { filtering: true } => {
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
        }
        BindingType::Sampler { filtering: false } => {
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering)
        }
    }
}

pub(super) fn clear_color(color: [f32; 4]) -> wgpu::Color {
    let [r, g, b, a] = color.map(f64::from);
    wgpu::Color { r, g, b, a }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_format_round_trips() {
        for format in [
            TextureFormat::Rgba8Unorm,
            TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba32Float,
            TextureFormat::Depth32Float,
        ] {
            assert_eq!(known_format(texture_format(format)), Some(format));
        }
        assert_eq!(known_format(wgpu::TextureFormat::R8Unorm), None);
    }

    #[test]
    fn test_usage_flags_combine() {
        let usages = texture_usages(TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC);
        assert_eq!(
            usages,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC
        );
        assert_eq!(
            shader_stages(ShaderStageFlags::VERTEX_FRAGMENT),
            wgpu::ShaderStages::VERTEX_FRAGMENT
        );
    }
}

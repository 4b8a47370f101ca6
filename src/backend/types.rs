//! Descriptor types shared by every backend
//!
//! These cover exactly what the frame and the environment preprocessor ask
//! of a device: float and 8-bit color targets, one depth format, 2D textures
//! and cubemaps, single-attribute vertex streams and clamped samplers.

use crate::backend::traits::TextureHandle;

/// Texel formats the renderer allocates or presents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba32Float,
    Depth32Float,
}

impl TextureFormat {
    /// sRGB twin of an 8-bit format; copy-compatible with the original
    pub fn add_srgb_suffix(&self) -> Self {
        match self {
            TextureFormat::Rgba8Unorm => TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => TextureFormat::Bgra8UnormSrgb,
            other => *other,
        }
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba32Float => 16,
            _ => 4,
        }
    }
}

/// Texture usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureUsage(u32);

impl TextureUsage {
    pub const COPY_SRC: Self = Self(1 << 0);
    pub const COPY_DST: Self = Self(1 << 1);
    pub const TEXTURE_BINDING: Self = Self(1 << 2);
    pub const STORAGE_BINDING: Self = Self(1 << 3);
    pub const RENDER_ATTACHMENT: Self = Self(1 << 4);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for TextureUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUsage(u32);

impl BufferUsage {
    pub const COPY_DST: Self = Self(1 << 0);
    pub const INDEX: Self = Self(1 << 1);
    pub const VERTEX: Self = Self(1 << 2);
    pub const UNIFORM: Self = Self(1 << 3);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Shape of a texture allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    /// Plain 2D texture, `layers` is 1
    D2,
    /// Cubemap, `layers` is 6
    Cube,
}

#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub mip_levels: u32,
    pub kind: TextureKind,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            layers: 1,
            mip_levels: 1,
            kind: TextureKind::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        }
    }
}

impl TextureDescriptor {
    /// Cubemap with a full set of six faces
    pub fn cube(label: &str, size: u32, mip_levels: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: Some(label.to_string()),
            width: size,
            height: size,
            layers: 6,
            mip_levels,
            kind: TextureKind::Cube,
            format,
            usage,
        }
    }
}

/// How a view interprets its texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureViewDimension {
    D2,
    D2Array,
    Cube,
}

/// Subresource selection for a texture view
#[derive(Debug, Clone, Default)]
pub struct TextureViewDescriptor {
    pub label: Option<String>,
    /// `None` derives the dimension from the texture
    pub dimension: Option<TextureViewDimension>,
    pub base_mip_level: u32,
    /// `None` covers every remaining mip
    pub mip_level_count: Option<u32>,
    /// `None` covers every layer
    pub array_layer_count: Option<u32>,
}

impl TextureViewDescriptor {
    /// All six faces of a single mip, as a 2D array (storage writes)
    pub fn cube_mip_as_array(label: &str, mip: u32) -> Self {
        Self {
            label: Some(label.to_string()),
            dimension: Some(TextureViewDimension::D2Array),
            base_mip_level: mip,
            mip_level_count: Some(1),
            array_layer_count: Some(6),
        }
    }

    /// Whole mip chain sampled as a cube
    pub fn cube(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            dimension: Some(TextureViewDimension::Cube),
            ..Default::default()
        }
    }
}

/// Source or destination of a texture copy: a mip level, from layer 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopyLocation {
    pub texture: TextureHandle,
    pub mip_level: u32,
}

impl TextureCopyLocation {
    pub fn base(texture: TextureHandle) -> Self {
        Self { texture, mip_level: 0 }
    }
}

#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x4,
}

impl VertexFormat {
    pub fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// A tightly packed per-vertex buffer feeding one shader location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexStream {
    pub location: u32,
    pub format: VertexFormat,
}

impl VertexStream {
    pub fn new(location: u32, format: VertexFormat) -> Self {
        Self { location, format }
    }

    pub fn stride(&self) -> u64 {
        self.format.size()
    }
}

/// Faces dropped by the rasterizer; front faces are always clockwise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Back,
}

/// Sampler filtering, applied to magnification, minification and mips alike
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Edge-clamped sampler
#[derive(Debug, Clone)]
pub struct SamplerDescriptor {
    pub label: Option<String>,
    pub filter: FilterMode,
}

impl SamplerDescriptor {
    pub fn point_clamp() -> Self {
        Self {
            label: Some("Point Clamp Sampler".into()),
            filter: FilterMode::Nearest,
        }
    }

    pub fn trilinear_clamp() -> Self {
        Self {
            label: Some("Trilinear Clamp Sampler".into()),
            filter: FilterMode::Linear,
        }
    }
}

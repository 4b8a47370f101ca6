//! Virtual resources for the render graph

use crate::backend::types::*;

/// Unique identifier for a render graph resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

/// Virtual texture resource in the render graph
#[derive(Debug, Clone)]
pub struct VirtualTexture {
    pub id: ResourceId,
    pub desc: TextureDescriptor,
    pub name: String,
}

/// Resource type enumeration
#[derive(Debug, Clone)]
pub enum VirtualResource {
    Texture(VirtualTexture),
    /// External resource (like swapchain image)
    External { id: ResourceId, name: String },
}

impl VirtualResource {
    pub fn id(&self) -> ResourceId {
        match self {
            VirtualResource::Texture(t) => t.id,
            VirtualResource::External { id, .. } => *id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            VirtualResource::Texture(t) => &t.name,
            VirtualResource::External { name, .. } => name,
        }
    }
}

/// How a pass uses a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceUsage {
    /// Read as a texture (sampled)
    TextureRead,
    /// Write as a render target
    RenderTarget,
    /// Write as storage texture
    StorageWrite,
    /// Depth attachment
    DepthStencilWrite,
    /// Source or destination of a texture copy
    CopySrc,
    CopyDst,
}

/// Resource access declaration for a pass
#[derive(Debug, Clone)]
pub struct ResourceAccess {
    pub resource: ResourceId,
    pub usage: ResourceUsage,
}

impl ResourceAccess {
    pub fn is_read(&self) -> bool {
        matches!(self.usage, ResourceUsage::TextureRead | ResourceUsage::CopySrc)
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self.usage,
            ResourceUsage::RenderTarget
                | ResourceUsage::StorageWrite
                | ResourceUsage::DepthStencilWrite
                | ResourceUsage::CopyDst
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_usages_classify() {
        let src = ResourceAccess {
            resource: ResourceId(0),
            usage: ResourceUsage::CopySrc,
        };
        let dst = ResourceAccess {
            resource: ResourceId(0),
            usage: ResourceUsage::CopyDst,
        };
        assert!(src.is_read() && !src.is_write());
        assert!(dst.is_write() && !dst.is_read());
    }
}

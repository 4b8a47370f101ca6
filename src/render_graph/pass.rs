//! Passes and the contexts they see in each graph phase
//!
//! A pass declares its targets and dependencies once in `setup`, builds its
//! pipelines and bind groups in `prepare` after the targets exist, and records
//! commands in `execute` every frame.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::FrameResources;
use crate::render_graph::resource::*;
use crate::scene::GpuScene;
use std::any::Any;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) u32);

/// Resources a pass declared it reads and writes
#[derive(Debug, Default)]
pub struct PassAccess {
    pub reads: Vec<ResourceAccess>,
    pub writes: Vec<ResourceAccess>,
}

impl PassAccess {
    pub fn reads_resource(&self, resource: ResourceId) -> bool {
        self.reads.iter().any(|a| a.resource == resource)
    }

    pub fn writes_resource(&self, resource: ResourceId) -> bool {
        self.writes.iter().any(|a| a.resource == resource)
    }

    /// Every declared access, reads first
    pub fn all(&self) -> impl Iterator<Item = &ResourceAccess> {
        self.reads.iter().chain(&self.writes)
    }
}

/// Handed to [`RenderPass::setup`]
pub struct PassSetupContext<'a> {
    pub(crate) resources: &'a mut Vec<VirtualResource>,
    pub(crate) next_resource_id: &'a mut u32,
    pub(crate) access: &'a mut PassAccess,
    pub(crate) extent: (u32, u32),
}

impl PassSetupContext<'_> {
    /// Declare a single-mip texture covering the whole frame
    pub fn frame_target(&mut self, name: &str, format: TextureFormat, usage: TextureUsage) -> ResourceId {
        let id = ResourceId(*self.next_resource_id);
        *self.next_resource_id += 1;

        let (width, height) = self.extent;
        self.resources.push(VirtualResource::Texture(VirtualTexture {
            id,
            name: name.to_string(),
            desc: TextureDescriptor {
                label: Some(name.to_string()),
                width,
                height,
                format,
                usage,
                ..Default::default()
            },
        }));

        id
    }

    pub fn read(&mut self, resource: ResourceId, usage: ResourceUsage) {
        self.access.reads.push(ResourceAccess { resource, usage });
    }

    pub fn write(&mut self, resource: ResourceId, usage: ResourceUsage) {
        self.access.writes.push(ResourceAccess { resource, usage });
    }

    /// Frame size in pixels, never zero
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }
}

/// GPU objects backing the graph's resources, external ones included
pub struct ResourceTable<'a> {
    pub(crate) views: &'a HashMap<ResourceId, TextureViewHandle>,
    pub(crate) textures: &'a HashMap<ResourceId, TextureHandle>,
}

impl ResourceTable<'_> {
    pub fn view(&self, resource: ResourceId) -> Option<TextureViewHandle> {
        self.views.get(&resource).copied()
    }

    pub fn texture(&self, resource: ResourceId) -> Option<TextureHandle> {
        self.textures.get(&resource).copied()
    }
}

/// Handed to [`RenderPass::prepare`]
pub struct PassPrepareContext<'a> {
    pub backend: &'a mut dyn GraphicsBackend,
    pub frame: &'a FrameResources,
    pub scene: &'a GpuScene,
    pub resources: ResourceTable<'a>,
}

/// Handed to [`RenderPass::execute`]
pub struct PassExecuteContext<'a> {
    pub backend: &'a mut dyn GraphicsBackend,
    pub scene: &'a GpuScene,
    pub width: u32,
    pub height: u32,
    pub resources: ResourceTable<'a>,
}

pub trait RenderPass: Send + Sync {
    fn name(&self) -> &str;

    /// Declare targets and the resources this pass depends on
    fn setup(&mut self, ctx: &mut PassSetupContext);

    /// Create pipelines and bind groups; runs once, after allocation
    fn prepare(&mut self, _ctx: &mut PassPrepareContext) -> BackendResult<()> {
        Ok(())
    }

    /// Record this pass's commands for one frame
    fn execute(&self, ctx: &mut PassExecuteContext);

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Queue work a pass records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassType {
    Graphics,
    Compute,
    /// Texture copies only
    Transfer,
}

/// Bookkeeping the graph keeps for each added pass
#[derive(Debug)]
pub struct PassNode {
    pub id: PassId,
    pub name: String,
    pub pass_type: PassType,
    pub access: PassAccess,
}

//! Render graph executor

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{RenderError, RenderResult};
use crate::pipeline::FrameResources;
use crate::render_graph::graph::*;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use crate::scene::GpuScene;
use std::collections::HashMap;

/// Executor for running the compiled render graph
pub struct RenderGraphExecutor {
    /// Allocated textures mapped by resource ID
    allocated_textures: HashMap<ResourceId, TextureHandle>,
    allocated_texture_views: HashMap<ResourceId, TextureViewHandle>,

    /// External textures and views (like swapchain), refreshed every frame
    external_textures: HashMap<ResourceId, TextureHandle>,
    external_views: HashMap<ResourceId, TextureViewHandle>,
}

impl RenderGraphExecutor {
    pub fn new() -> Self {
        Self {
            allocated_textures: HashMap::new(),
            allocated_texture_views: HashMap::new(),
            external_textures: HashMap::new(),
            external_views: HashMap::new(),
        }
    }

    /// Set an external texture (e.g., swapchain image)
    pub fn set_external(&mut self, resource: ResourceId, texture: TextureHandle, view: TextureViewHandle) {
        self.external_textures.insert(resource, texture);
        self.external_views.insert(resource, view);
    }

    /// Allocated texture behind a resource
    pub fn texture(&self, resource: ResourceId) -> Option<TextureHandle> {
        self.allocated_textures.get(&resource).copied()
    }

    /// Allocate every virtual texture of the graph, with a default view each
    pub fn allocate_resources(
        &mut self,
        graph: &RenderGraph,
        backend: &mut dyn GraphicsBackend,
    ) -> RenderResult<()> {
        for resource in graph.resources() {
            let VirtualResource::Texture(tex) = resource else {
                // External resources are set via set_external
                continue;
            };
            if self.allocated_textures.contains_key(&tex.id) {
                continue;
            }

            let handle = backend
                .create_texture(&tex.desc)
                .map_err(|source| RenderError::ResourceCreation {
                    resource: tex.name.clone(),
                    source,
                })?;
            self.allocated_textures.insert(tex.id, handle);

            let view = backend
                .create_texture_view(
                    handle,
                    &TextureViewDescriptor {
                        label: Some(tex.name.clone()),
                        ..Default::default()
                    },
                )
                .map_err(|source| RenderError::ResourceCreation {
                    resource: tex.name.clone(),
                    source,
                })?;
            self.allocated_texture_views.insert(tex.id, view);
        }

        log::debug!("Allocated {} graph textures", self.allocated_textures.len());
        Ok(())
    }

    /// Let every pass create its pipelines and bind groups
    pub fn prepare(
        &self,
        graph: &mut RenderGraph,
        backend: &mut dyn GraphicsBackend,
        frame: &FrameResources,
        scene: &GpuScene,
    ) -> RenderResult<()> {
        for pass in graph.passes_mut() {
            let mut ctx = PassPrepareContext {
                backend: &mut *backend,
                frame,
                scene,
                resources: ResourceTable {
                    views: &self.allocated_texture_views,
                    textures: &self.allocated_textures,
                },
            };

            pass.prepare(&mut ctx)
                .map_err(|source| RenderError::ResourceCreation {
                    resource: pass.name().to_string(),
                    source,
                })?;
        }

        Ok(())
    }

    /// Execute the render graph
    pub fn execute(
        &self,
        graph: &RenderGraph,
        compiled: &CompiledGraph,
        backend: &mut dyn GraphicsBackend,
        scene: &GpuScene,
        width: u32,
        height: u32,
    ) {
        // Build resource maps
        let mut texture_views: HashMap<ResourceId, TextureViewHandle> = self.allocated_texture_views.clone();
        texture_views.extend(self.external_views.iter().map(|(&k, &v)| (k, v)));

        let mut textures: HashMap<ResourceId, TextureHandle> = self.allocated_textures.clone();
        textures.extend(self.external_textures.iter().map(|(&k, &v)| (k, v)));

        // Execute passes in order
        for &pass_id in &compiled.pass_order {
            if let Some(pass) = graph.get_pass(pass_id) {
                let mut ctx = PassExecuteContext {
                    backend: &mut *backend,
                    scene,
                    width,
                    height,
                    resources: ResourceTable {
                        views: &texture_views,
                        textures: &textures,
                    },
                };

                pass.execute(&mut ctx);
            }
        }
    }

    /// Clean up allocated resources
    pub fn cleanup(&mut self, backend: &mut dyn GraphicsBackend) {
        for (_, handle) in self.allocated_textures.drain() {
            backend.destroy_texture(handle);
        }
        self.allocated_texture_views.clear();

        self.external_textures.clear();
        self.external_views.clear();
    }
}

impl Default for RenderGraphExecutor {
    fn default() -> Self {
        Self::new()
    }
}

//! Copy of the SDR image into the acquired swapchain texture

use crate::backend::types::*;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use std::any::Any;

/// Transfer pass ending the frame
pub struct PresentPass {
    sdr: ResourceId,
    swapchain: ResourceId,
    sdr_size: (u32, u32),
}

impl PresentPass {
    pub fn new(sdr: ResourceId, swapchain: ResourceId) -> Self {
        Self {
            sdr,
            swapchain,
            sdr_size: (0, 0),
        }
    }

    /// Copied region; never larger than either side
    pub fn copy_extent(&self, frame_width: u32, frame_height: u32) -> (u32, u32) {
        (
            self.sdr_size.0.min(frame_width),
            self.sdr_size.1.min(frame_height),
        )
    }
}

impl RenderPass for PresentPass {
    fn name(&self) -> &str {
        "Present Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        self.sdr_size = ctx.extent();
        ctx.read(self.sdr, ResourceUsage::CopySrc);
        ctx.write(self.swapchain, ResourceUsage::CopyDst);
    }

    fn execute(&self, ctx: &mut PassExecuteContext) {
        let (Some(src), Some(dst)) = (
            ctx.resources.texture(self.sdr),
            ctx.resources.texture(self.swapchain),
        ) else {
            log::warn!("Present pass skipped: SDR or swapchain texture missing");
            return;
        };

        let (width, height) = self.copy_extent(ctx.width, ctx.height);
        if width == 0 || height == 0 {
            return;
        }

        ctx.backend.copy_texture_to_texture(
            TextureCopyLocation::base(src),
            TextureCopyLocation::base(dst),
            width,
            height,
            1,
        );
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::{PassType, RenderGraph};

    #[test]
    fn test_copy_is_clamped_to_both_sides() {
        let mut graph = RenderGraph::new();
        let swapchain = graph.register_external("swapchain");
        let sdr = graph.register_external("sdr");
        let id = graph.add_pass(PresentPass::new(sdr, swapchain), PassType::Transfer, 800, 600);

        let pass = graph.pass::<PresentPass>(id).unwrap();
        assert_eq!(pass.copy_extent(800, 600), (800, 600));
        assert_eq!(pass.copy_extent(1024, 480), (800, 480));

        let node = graph.get_pass_node(id).unwrap();
        assert!(node.access.reads_resource(sdr));
        assert!(node.access.writes_resource(swapchain));
    }
}

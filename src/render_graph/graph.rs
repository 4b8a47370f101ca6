//! Render graph definition and compilation

use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// Graph compilation error
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("render graph has a dependency cycle involving pass '{0}'")]
    Cycle(String),
    #[error("pass '{0}' did not declare its outputs during setup")]
    MissingOutput(String),
}

/// The main render graph structure
pub struct RenderGraph {
    passes: Vec<Box<dyn RenderPass>>,
    pass_nodes: Vec<PassNode>,
    resources: Vec<VirtualResource>,
    next_pass_id: u32,
    next_resource_id: u32,

    /// External resources (like swapchain)
    external_resources: HashMap<String, ResourceId>,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            pass_nodes: Vec::new(),
            resources: Vec::new(),
            next_pass_id: 0,
            next_resource_id: 0,
            external_resources: HashMap::new(),
        }
    }

    /// Register an external resource (like swapchain image)
    pub fn register_external(&mut self, name: &str) -> ResourceId {
        let id = ResourceId(self.next_resource_id);
        self.next_resource_id += 1;
        self.resources.push(VirtualResource::External {
            id,
            name: name.to_string(),
        });
        self.external_resources.insert(name.to_string(), id);
        id
    }

    /// Get external resource by name
    pub fn get_external(&self, name: &str) -> Option<ResourceId> {
        self.external_resources.get(name).copied()
    }

    /// Add a render pass to the graph
    pub fn add_pass<P: RenderPass + 'static>(
        &mut self,
        pass: P,
        pass_type: PassType,
        screen_width: u32,
        screen_height: u32,
    ) -> PassId {
        let id = PassId(self.next_pass_id);
        self.next_pass_id += 1;

        let name = pass.name().to_string();
        let mut boxed_pass = Box::new(pass);

        let mut access = PassAccess::default();
        boxed_pass.setup(&mut PassSetupContext {
            resources: &mut self.resources,
            next_resource_id: &mut self.next_resource_id,
            access: &mut access,
            extent: (screen_width.max(1), screen_height.max(1)),
        });

        log::debug!(
            "Added pass '{}' ({} reads, {} writes)",
            name,
            access.reads.len(),
            access.writes.len()
        );

        self.passes.push(boxed_pass);
        self.pass_nodes.push(PassNode {
            id,
            name,
            pass_type,
            access,
        });

        id
    }

    /// Compile the graph - topological sort and resource lifetimes
    ///
    /// Among passes that are ready at the same time, the one added first runs
    /// first, so the order is stable across runs.
    pub fn compile(&self) -> Result<CompiledGraph, GraphError> {
        let mut dependencies: HashMap<PassId, HashSet<PassId>> = self
            .pass_nodes
            .iter()
            .map(|node| (node.id, HashSet::new()))
            .collect();

        for node in &self.pass_nodes {
            for other in &self.pass_nodes {
                if node.id == other.id {
                    continue;
                }

                // Read-after-write
                let reads_output = node.access.reads.iter().any(|a| other.access.writes_resource(a.resource));
                // Write-after-write keeps insertion order
                let shares_output = other.id < node.id
                    && node.access.writes.iter().any(|a| other.access.writes_resource(a.resource));

                if reads_output || shares_output {
                    if let Some(deps) = dependencies.get_mut(&node.id) {
                        deps.insert(other.id);
                    }
                }
            }
        }

        // Kahn's algorithm with an ordered ready set
        let mut in_degree: HashMap<PassId, usize> = dependencies
            .iter()
            .map(|(id, deps)| (*id, deps.len()))
            .collect();

        let mut ready: BTreeSet<PassId> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut sorted_passes = Vec::with_capacity(self.pass_nodes.len());

        while let Some(pass_id) = ready.pop_first() {
            sorted_passes.push(pass_id);

            for node in &self.pass_nodes {
                if dependencies[&node.id].contains(&pass_id) {
                    if let Some(degree) = in_degree.get_mut(&node.id) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(node.id);
                        }
                    }
                }
            }
        }

        if sorted_passes.len() != self.pass_nodes.len() {
            let stuck = self
                .pass_nodes
                .iter()
                .find(|n| !sorted_passes.contains(&n.id))
                .map(|n| n.name.clone())
                .unwrap_or_default();
            return Err(GraphError::Cycle(stuck));
        }

        // Determine resource lifetimes
        let mut resource_lifetimes: HashMap<ResourceId, ResourceLifetime> = HashMap::new();

        for (order, &pass_id) in sorted_passes.iter().enumerate() {
            let Some(node) = self.get_pass_node(pass_id) else {
                continue;
            };

            for access in node.access.all() {
                let lifetime = resource_lifetimes
                    .entry(access.resource)
                    .or_insert(ResourceLifetime {
                        first_use: order,
                        last_use: order,
                    });
                lifetime.last_use = order;
            }
        }

        Ok(CompiledGraph {
            pass_order: sorted_passes,
            resource_lifetimes,
        })
    }

    /// Get all passes
    pub fn passes(&self) -> &[Box<dyn RenderPass>] {
        &self.passes
    }

    /// Get mutable passes
    pub fn passes_mut(&mut self) -> &mut [Box<dyn RenderPass>] {
        &mut self.passes
    }

    /// Get pass nodes (metadata)
    pub fn pass_nodes(&self) -> &[PassNode] {
        &self.pass_nodes
    }

    /// Get all resources
    pub fn resources(&self) -> &[VirtualResource] {
        &self.resources
    }

    /// Get pass by ID
    pub fn get_pass(&self, id: PassId) -> Option<&dyn RenderPass> {
        let index = self.pass_nodes.iter().position(|n| n.id == id)?;
        Some(self.passes[index].as_ref())
    }

    /// Get a pass as its concrete type, e.g. to read the resources it created
    pub fn pass<P: RenderPass + 'static>(&self, id: PassId) -> Option<&P> {
        self.get_pass(id)?.as_any().downcast_ref::<P>()
    }

    /// Get pass node by ID
    pub fn get_pass_node(&self, id: PassId) -> Option<&PassNode> {
        self.pass_nodes.iter().find(|n| n.id == id)
    }
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Resource lifetime in terms of pass execution order
#[derive(Debug, Clone, Copy)]
pub struct ResourceLifetime {
    pub first_use: usize,
    pub last_use: usize,
}

/// Compiled render graph with execution order and resource lifetimes
#[derive(Debug)]
pub struct CompiledGraph {
    pub pass_order: Vec<PassId>,
    pub resource_lifetimes: HashMap<ResourceId, ResourceLifetime>,
}

impl CompiledGraph {
    /// Check if a resource is alive at a given execution step
    pub fn is_resource_alive(&self, resource: ResourceId, step: usize) -> bool {
        if let Some(lifetime) = self.resource_lifetimes.get(&resource) {
            step >= lifetime.first_use && step <= lifetime.last_use
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::*;

    /// Pass that writes `output` (created on setup) and reads `inputs`
    struct TestPass {
        name: String,
        inputs: Vec<ResourceId>,
        writes: Vec<ResourceId>,
        output: Option<ResourceId>,
    }

    impl TestPass {
        fn new(name: &str, inputs: Vec<ResourceId>) -> Self {
            Self {
                name: name.to_string(),
                inputs,
                writes: Vec::new(),
                output: None,
            }
        }
    }

    impl RenderPass for TestPass {
        fn name(&self) -> &str {
            &self.name
        }

        fn setup(&mut self, ctx: &mut PassSetupContext) {
            for &input in &self.inputs {
                ctx.read(input, ResourceUsage::TextureRead);
            }
            for &target in &self.writes {
                ctx.write(target, ResourceUsage::RenderTarget);
            }
            let output = ctx.frame_target(&self.name, TextureFormat::Rgba32Float, TextureUsage::RENDER_ATTACHMENT);
            ctx.write(output, ResourceUsage::RenderTarget);
            self.output = Some(output);
        }

        fn execute(&self, _ctx: &mut PassExecuteContext) {}

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    fn output_of(graph: &RenderGraph, id: PassId) -> ResourceId {
        graph.pass::<TestPass>(id).and_then(|p| p.output).unwrap()
    }

    #[test]
    fn test_independent_passes_keep_insertion_order() {
        let mut graph = RenderGraph::new();
        let a = graph.add_pass(TestPass::new("a", vec![]), PassType::Graphics, 4, 4);
        let b = graph.add_pass(TestPass::new("b", vec![]), PassType::Graphics, 4, 4);
        let c = graph.add_pass(TestPass::new("c", vec![]), PassType::Compute, 4, 4);

        for _ in 0..8 {
            assert_eq!(graph.compile().unwrap().pass_order, vec![a, b, c]);
        }
    }

    #[test]
    fn test_reader_runs_after_writer() {
        let mut graph = RenderGraph::new();
        let first = graph.add_pass(TestPass::new("first", vec![]), PassType::Graphics, 4, 4);
        let unrelated = graph.add_pass(TestPass::new("unrelated", vec![]), PassType::Graphics, 4, 4);
        let first_output = output_of(&graph, first);
        let second = graph.add_pass(
            TestPass::new("second", vec![first_output]),
            PassType::Graphics,
            4,
            4,
        );

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.pass_order, vec![first, unrelated, second]);
        assert!(compiled.is_resource_alive(first_output, 2));
    }

    #[test]
    fn test_frame_targets_never_have_zero_extent() {
        let mut graph = RenderGraph::new();
        let id = graph.add_pass(TestPass::new("minimised", vec![]), PassType::Graphics, 0, 0);
        let output = output_of(&graph, id);

        let desc = graph
            .resources()
            .iter()
            .find_map(|r| match r {
                VirtualResource::Texture(t) if t.id == output => Some(&t.desc),
                _ => None,
            })
            .unwrap();
        assert_eq!((desc.width, desc.height, desc.mip_levels), (1, 1, 1));
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut graph = RenderGraph::new();
        let shared = graph.register_external("shared");
        let a = graph.add_pass(TestPass::new("a", vec![shared]), PassType::Graphics, 4, 4);
        let a_output = output_of(&graph, a);

        let mut b = TestPass::new("b", vec![a_output]);
        b.writes.push(shared);
        graph.add_pass(b, PassType::Graphics, 4, 4);

        assert!(matches!(graph.compile(), Err(GraphError::Cycle(_))));
    }
}

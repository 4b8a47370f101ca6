//! Main renderer orchestrator
//!
//! Owns the backend and everything created on it. Construction runs the
//! startup work (environment preprocessing, scene upload, graph allocation and
//! pass preparation); afterwards each call to [`Renderer::render_frame`]
//! uploads the camera, executes the compiled graph and presents.

use crate::backend::traits::*;
use crate::environment::EnvironmentMap;
use crate::error::{RenderError, RenderResult};
use crate::pipeline::{build_frame_graph, FrameResources, FrameTargets};
use crate::render_graph::{CompiledGraph, RenderGraph, RenderGraphExecutor};
use crate::resources::HdrImage;
use crate::scene::{Camera, CameraController, CameraInput, GpuScene, OrbitController, Scene};
use crate::RendererConfig;
use winit::keyboard::KeyCode;

/// The renderer, generic over the device it records to
pub struct Renderer<B: GraphicsBackend> {
    backend: B,
    graph: RenderGraph,
    compiled: CompiledGraph,
    executor: RenderGraphExecutor,
    targets: FrameTargets,
    frame: FrameResources,
    scene: GpuScene,
    environment: EnvironmentMap,
    camera: Camera,
    controller: Box<dyn CameraController>,
    input: CameraInput,
    width: u32,
    height: u32,
    frame_count: u64,
}

/// Everything startup creates on the backend
struct Startup {
    environment: EnvironmentMap,
    scene: GpuScene,
    frame: FrameResources,
    graph: RenderGraph,
    compiled: CompiledGraph,
    executor: RenderGraphExecutor,
    targets: FrameTargets,
}

/// Run the startup steps in order; a failing step releases what the earlier
/// ones created
fn start(
    backend: &mut dyn GraphicsBackend,
    scene: &Scene,
    environment: &HdrImage,
    config: &RendererConfig,
    width: u32,
    height: u32,
) -> RenderResult<Startup> {
    let environment = EnvironmentMap::preprocess(backend, environment, &config.environment)?;
    let gpu_scene = match GpuScene::build(scene, backend) {
        Ok(gpu_scene) => gpu_scene,
        Err(e) => {
            environment.destroy(backend);
            return Err(e);
        }
    };
    let frame = match FrameResources::create(backend, environment.prefiltered_view(), config.exposure) {
        Ok(frame) => frame,
        Err(e) => {
            gpu_scene.destroy(backend);
            environment.destroy(backend);
            return Err(e);
        }
    };

    let mut executor = RenderGraphExecutor::new();
    let graph = build_graph(backend, &mut executor, &frame, &gpu_scene, width, height);
    match graph {
        Ok((graph, compiled, targets)) => Ok(Startup {
            environment,
            scene: gpu_scene,
            frame,
            graph,
            compiled,
            executor,
            targets,
        }),
        Err(e) => {
            executor.cleanup(backend);
            frame.destroy(backend);
            gpu_scene.destroy(backend);
            environment.destroy(backend);
            Err(e)
        }
    }
}

fn build_graph(
    backend: &mut dyn GraphicsBackend,
    executor: &mut RenderGraphExecutor,
    frame: &FrameResources,
    scene: &GpuScene,
    width: u32,
    height: u32,
) -> RenderResult<(RenderGraph, CompiledGraph, FrameTargets)> {
    let (mut graph, targets) = build_frame_graph(width, height, backend.swapchain_format())?;
    let compiled = graph.compile()?;

    executor.allocate_resources(&graph, backend)?;
    executor.prepare(&mut graph, backend, frame, scene)?;

    Ok((graph, compiled, targets))
}

impl<B: GraphicsBackend> Renderer<B> {
    /// Run every startup step against `backend`
    pub fn new(
        mut backend: B,
        scene: &Scene,
        environment: &HdrImage,
        config: &RendererConfig,
    ) -> RenderResult<Self> {
        let (width, height) = backend.surface_size();
        let width = width.max(1);
        let height = height.max(1);

        let startup = start(&mut backend, scene, environment, config, width, height)?;

        log::info!(
            "Renderer ready: {}x{}, {} passes, {} meshes",
            width,
            height,
            startup.compiled.pass_order.len(),
            startup.scene.meshes().len()
        );

        Ok(Self {
            backend,
            graph: startup.graph,
            compiled: startup.compiled,
            executor: startup.executor,
            targets: startup.targets,
            frame: startup.frame,
            scene: startup.scene,
            environment: startup.environment,
            camera: Camera::new(&config.camera),
            controller: Box::new(OrbitController::new(config.controls.clone())),
            input: CameraInput::new(),
            width,
            height,
            frame_count: 0,
        })
    }

    /// Forward a key event; returns false for unbound keys
    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) -> bool {
        self.input.handle_key(key, pressed)
    }

    pub fn quit_requested(&self) -> bool {
        self.input.quit_requested
    }

    /// Advance the camera by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        self.controller.update(&mut self.camera, &self.input, dt);
    }

    /// Record, submit and present one frame
    pub fn render_frame(&mut self) -> RenderResult<()> {
        let frame_ctx = self.backend.begin_frame().map_err(RenderError::Presentation)?;
        self.executor.set_external(
            self.targets.swapchain,
            frame_ctx.swapchain_texture,
            frame_ctx.swapchain_view,
        );

        let aspect = self.width as f32 / self.height as f32;
        self.frame
            .upload_camera(&mut self.backend, &self.camera.uniform_data(aspect));

        self.executor.execute(
            &self.graph,
            &self.compiled,
            &mut self.backend,
            &self.scene,
            frame_ctx.width,
            frame_ctx.height,
        );

        self.backend.end_frame().map_err(RenderError::Presentation)?;
        self.frame_count += 1;
        Ok(())
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn targets(&self) -> &FrameTargets {
        &self.targets
    }

    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    pub fn compiled(&self) -> &CompiledGraph {
        &self.compiled
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Release everything created at startup and hand the backend back
    pub fn into_backend(mut self) -> B {
        self.executor.cleanup(&mut self.backend);
        self.frame.destroy(&mut self.backend);
        self.scene.destroy(&mut self.backend);
        self.environment.destroy(&mut self.backend);
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RecordedCall, RecordingBackend};
    use crate::environment::EnvironmentConfig;
    use crate::resources::CpuMesh;
    use rstest::rstest;

    fn config() -> RendererConfig {
        RendererConfig {
            width: 32,
            height: 16,
            environment: EnvironmentConfig {
                base_size: 8,
                sample_count: 4,
            },
            ..Default::default()
        }
    }

    fn renderer() -> Renderer<RecordingBackend> {
        let scene = Scene {
            meshes: vec![CpuMesh::plane(2.0, 2.0, 1)],
        };
        Renderer::new(RecordingBackend::new(32, 16), &scene, &sky(), &config()).unwrap()
    }

    #[test]
    fn test_camera_is_uploaded_every_frame() {
        let mut renderer = renderer();
        let camera_buffer = renderer.frame.camera_buffer;
        renderer.backend_mut().take_calls();

        renderer.update(0.5);
        renderer.render_frame().unwrap();

        let calls = renderer.backend().calls();
        let write = calls
            .iter()
            .position(|c| matches!(c, RecordedCall::WriteBuffer { buffer, .. } if *buffer == camera_buffer))
            .unwrap();
        let first_pass = calls
            .iter()
            .position(|c| matches!(c, RecordedCall::BeginRenderPass { .. }))
            .unwrap();
        assert!(write < first_pass);
        assert_eq!(renderer.frame_count(), 1);
    }

    #[test]
    fn test_escape_requests_quit() {
        let mut renderer = renderer();
        assert!(!renderer.quit_requested());
        assert!(renderer.handle_key(KeyCode::Escape, true));
        assert!(!renderer.handle_key(KeyCode::KeyQ, true));
        assert!(renderer.quit_requested());
    }

    fn sky() -> HdrImage {
        HdrImage::from_pixels(2, 1, vec![[1.0; 4], [0.5; 4]], "sky").unwrap()
    }

    /// Each case fails a different startup step after the environment,
    /// scene and frame resources already exist
    #[rstest]
    #[case::frame_uniforms("Tonemap Uniforms")]
    #[case::graph_target("ssr_color")]
    #[case::pass_pipeline("Tonemapping Pipeline")]
    fn test_failed_startup_releases_everything(#[case] label: &str) {
        let mut backend = RecordingBackend::new(32, 16);
        match label {
            "ssr_color" => backend.fail_texture_creation(label),
            "Tonemapping Pipeline" => backend.fail_pipeline_creation(label),
            _ => backend.fail_buffer_creation(label),
        }
        let scene = Scene {
            meshes: vec![CpuMesh::plane(2.0, 2.0, 1)],
        };

        let result = start(&mut backend, &scene, &sky(), &config(), 32, 16);
        assert!(result.is_err());
        assert!(backend.texture_by_label("Prefiltered Environment").is_none());
        assert!(backend.texture_by_label("gbuffer_depth").is_none());
        assert_eq!(backend.live_buffer_count(), 0);
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_into_backend_releases_resources() {
        let mut renderer = renderer();
        renderer.render_frame().unwrap();
        let backend = renderer.into_backend();
        assert_eq!(backend.live_buffer_count(), 0);
        assert_eq!(backend.live_texture_count(), 0);
    }
}

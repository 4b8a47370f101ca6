//! Window and event loop using winit

use crate::backend::wgpu_backend::WgpuBackend;
use crate::error::{RenderError, RenderResult};
use crate::renderer::Renderer;
use crate::resources::HdrImage;
use crate::scene::Scene;
use crate::RendererConfig;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::WindowBuilder,
};

pub const WINDOW_TITLE: &str = "Metallic Reflections";

/// Open the window and render until it is closed or Escape is pressed
///
/// The window is fixed-size; graph targets are allocated once for the
/// initial surface.
pub fn run(scene: Scene, environment: HdrImage, config: RendererConfig) -> RenderResult<()> {
    let event_loop = EventLoop::new().map_err(|e| RenderError::Window(e.to_string()))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(false)
            .build(&event_loop)
            .map_err(|e| RenderError::Window(e.to_string()))?,
    );

    let backend =
        WgpuBackend::new(Arc::clone(&window)).map_err(|e| RenderError::DeviceCreation(e.to_string()))?;
    let mut renderer = Renderer::new(backend, &scene, &environment, &config)?;
    // Everything lives on the device now
    drop(environment);
    drop(scene);

    let mut result = Ok(());
    let mut last_frame = Instant::now();

    event_loop
        .run(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(code),
                                state,
                                ..
                            },
                        ..
                    } => {
                        renderer.handle_key(code, state == ElementState::Pressed);
                        if renderer.quit_requested() {
                            elwt.exit();
                        }
                    }
                    _ => {}
                },
                Event::AboutToWait => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;

                    renderer.update(dt);
                    if let Err(err) = renderer.render_frame() {
                        result = Err(err);
                        elwt.exit();
                    }
                }
                _ => {}
            }
        })
        .map_err(|e| RenderError::Window(e.to_string()))?;

    if result.is_ok() {
        log::info!("Exiting after {} frames", renderer.frame_count());
    }
    result
}

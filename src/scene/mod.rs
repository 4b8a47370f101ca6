//! Scene management
//!
//! Importing, flattening and uploading the model, plus the orbiting camera.

mod camera;
mod camera_controller;
mod gltf_import;
mod gpu_scene;
pub mod import;
mod loader;

pub use camera::*;
pub use camera_controller::*;
pub use gltf_import::import_gltf;
pub use gpu_scene::*;
pub use loader::*;

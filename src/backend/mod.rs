//! Backend abstraction layer
//!
//! Provides the device trait, shared descriptor types, the wgpu implementation
//! and a GPU-less recording implementation.

pub mod recording;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use recording::{RecordedCall, RecordingBackend};
pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;

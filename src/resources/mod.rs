//! Resource management
//!
//! CPU meshes, materials and HDR images.

mod mesh;
mod material;
mod texture;

pub use mesh::*;
pub use material::*;
pub use texture::*;

//! CPU-side mesh data

use crate::resources::Material;
use glam::{Mat4, Vec2, Vec3, Vec4};

/// A flattened mesh with its world transform baked in
///
/// Attributes are stored as separate streams so each uploads into its own
/// vertex buffer.
#[derive(Debug, Clone)]
pub struct CpuMesh {
    pub name: String,
    /// w = 1
    pub positions: Vec<Vec4>,
    /// w = 0
    pub normals: Vec<Vec4>,
    pub uvs: Vec<Vec2>,
    /// w = 0
    pub tangents: Vec<Vec4>,
    /// Triangle list
    pub indices: Vec<u32>,
    pub world: Mat4,
    /// Inverse transpose of `world`
    pub normal_matrix: Mat4,
    pub material: Material,
}

impl CpuMesh {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            tangents: Vec::new(),
            indices: Vec::new(),
            world: Mat4::IDENTITY,
            normal_matrix: Mat4::IDENTITY,
            material: Material::default(),
        }
    }

    /// Bake a world transform and its normal matrix
    pub fn with_world(mut self, world: Mat4) -> Self {
        self.world = world;
        self.normal_matrix = world.inverse().transpose();
        self
    }

    /// Calculate vertex count
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Calculate index count
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Calculate triangle count
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Streams have equal length, indices form whole in-range triangles
    pub fn is_valid(&self) -> bool {
        let n = self.positions.len();
        self.normals.len() == n
            && self.uvs.len() == n
            && self.tangents.len() == n
            && self.indices.len() % 3 == 0
            && self.indices.iter().all(|&i| (i as usize) < n)
    }

    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    pub fn uv_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.uvs)
    }

    pub fn tangent_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.tangents)
    }

    /// Get index data as bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Create a plane on the XZ axis, facing +Y, clockwise front faces
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        let mut mesh = CpuMesh::new("plane");
        let subdivisions = subdivisions.max(1);

        let half_width = width / 2.0;
        let half_depth = depth / 2.0;
        let step_x = width / subdivisions as f32;
        let step_z = depth / subdivisions as f32;

        for z in 0..=subdivisions {
            for x in 0..=subdivisions {
                let px = -half_width + x as f32 * step_x;
                let pz = -half_depth + z as f32 * step_z;

                mesh.positions.push(Vec4::new(px, 0.0, pz, 1.0));
                mesh.normals.push(Vec3::Y.extend(0.0));
                mesh.uvs.push(Vec2::new(
                    x as f32 / subdivisions as f32,
                    z as f32 / subdivisions as f32,
                ));
                mesh.tangents.push(Vec3::X.extend(0.0));
            }
        }

        for z in 0..subdivisions {
            for x in 0..subdivisions {
                let current = z * (subdivisions + 1) + x;
                let next = current + subdivisions + 1;

                mesh.indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_is_valid() {
        let plane = CpuMesh::plane(2.0, 2.0, 1);
        assert!(plane.is_valid());
        assert_eq!(plane.vertex_count(), 4);
        assert_eq!(plane.triangle_count(), 2);
        assert_eq!(plane.position_bytes().len(), 4 * 16);
        assert_eq!(plane.uv_bytes().len(), 4 * 8);
    }

    #[test]
    fn test_out_of_range_index_is_invalid() {
        let mut plane = CpuMesh::plane(1.0, 1.0, 1);
        plane.indices[5] = 4;
        assert!(!plane.is_valid());
    }

    #[test]
    fn test_world_bakes_normal_matrix() {
        let world = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let mesh = CpuMesh::new("scaled").with_world(world);
        let n = mesh.normal_matrix.transform_vector3(Vec3::X);
        assert!((n - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-6);
    }
}

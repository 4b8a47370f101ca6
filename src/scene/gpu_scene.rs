//! Device-side copy of a flattened scene

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{RenderError, RenderResult};
use crate::resources::CpuMesh;
use crate::scene::Scene;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Per-object transform uniform
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniformData {
    pub world: Mat4,
    pub normal_matrix: Mat4,
}

/// GPU resources for one mesh
#[derive(Debug, Clone)]
pub struct GpuMesh {
    pub name: String,
    pub position_buffer: BufferHandle,
    pub normal_buffer: BufferHandle,
    pub uv_buffer: BufferHandle,
    pub tangent_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub transform_buffer: BufferHandle,
    pub material_buffer: BufferHandle,
    /// Transform at binding 0, material at binding 1
    pub bind_group: BindGroupHandle,
    pub index_count: u32,
}

impl GpuMesh {
    fn buffers(&self) -> [BufferHandle; 7] {
        [
            self.position_buffer,
            self.normal_buffer,
            self.uv_buffer,
            self.tangent_buffer,
            self.index_buffer,
            self.transform_buffer,
            self.material_buffer,
        ]
    }
}

/// Uploaded scene, one [`GpuMesh`] per scene mesh
pub struct GpuScene {
    meshes: Vec<GpuMesh>,
    object_layout: BindGroupLayoutHandle,
}

impl GpuScene {
    /// Upload every mesh; on failure nothing created here stays alive
    pub fn build(scene: &Scene, backend: &mut dyn GraphicsBackend) -> RenderResult<Self> {
        let object_layout = backend
            .create_bind_group_layout(&Self::object_layout_entries())
            .map_err(RenderError::resource("object bind group layout"))?;

        let mut gpu_scene = Self {
            meshes: Vec::with_capacity(scene.meshes.len()),
            object_layout,
        };
        let mut created: Vec<BufferHandle> = Vec::new();

        for (index, mesh) in scene.meshes.iter().enumerate() {
            if mesh.indices.is_empty() {
                log::warn!("Skipping mesh {} ({}): no triangles", index, mesh.name);
                continue;
            }

            match gpu_scene.upload_mesh(backend, index, mesh, &mut created) {
                Ok(gpu_mesh) => gpu_scene.meshes.push(gpu_mesh),
                Err(err) => {
                    for buffer in created {
                        backend.destroy_buffer(buffer);
                    }
                    return Err(err);
                }
            }
        }

        log::info!(
            "Uploaded {} meshes ({} buffers)",
            gpu_scene.meshes.len(),
            gpu_scene.meshes.len() * 7
        );

        Ok(gpu_scene)
    }

    fn upload_mesh(
        &self,
        backend: &mut dyn GraphicsBackend,
        index: usize,
        mesh: &CpuMesh,
        created: &mut Vec<BufferHandle>,
    ) -> RenderResult<GpuMesh> {
        let mut upload = |attribute: &str, usage: BufferUsage, data: &[u8]| {
            let label = format!("Mesh {} ({}) {}", index, mesh.name, attribute);
            let buffer = backend
                .create_buffer_init(
                    &BufferDescriptor {
                        label: Some(label.clone()),
                        size: data.len() as u64,
                        usage,
                    },
                    data,
                )
                .map_err(RenderError::resource(label))?;
            created.push(buffer);
            Ok::<_, RenderError>(buffer)
        };

        let position_buffer = upload("Positions", BufferUsage::VERTEX, mesh.position_bytes())?;
        let normal_buffer = upload("Normals", BufferUsage::VERTEX, mesh.normal_bytes())?;
        let uv_buffer = upload("UVs", BufferUsage::VERTEX, mesh.uv_bytes())?;
        let tangent_buffer = upload("Tangents", BufferUsage::VERTEX, mesh.tangent_bytes())?;
        let index_buffer = upload("Indices", BufferUsage::INDEX, mesh.index_bytes())?;

        let transform = ObjectUniformData {
            world: mesh.world,
            normal_matrix: mesh.normal_matrix,
        };
        let transform_buffer = upload(
            "Transform",
            BufferUsage::UNIFORM,
            bytemuck::bytes_of(&transform),
        )?;
        let material_buffer = upload(
            "Material",
            BufferUsage::UNIFORM,
            bytemuck::bytes_of(&mesh.material.uniform_data()),
        )?;

        let bind_group = backend
            .create_bind_group(
                self.object_layout,
                &[
                    (0, BindGroupEntry::Buffer(transform_buffer)),
                    (1, BindGroupEntry::Buffer(material_buffer)),
                ],
            )
            .map_err(RenderError::resource(format!("Mesh {} ({}) Bind Group", index, mesh.name)))?;

        Ok(GpuMesh {
            name: mesh.name.clone(),
            position_buffer,
            normal_buffer,
            uv_buffer,
            tangent_buffer,
            index_buffer,
            transform_buffer,
            material_buffer,
            bind_group,
            index_count: mesh.indices.len() as u32,
        })
    }

    fn object_layout_entries() -> [BindGroupLayoutEntry; 2] {
        [
            BindGroupLayoutEntry::new(0, ShaderStageFlags::VERTEX, BindingType::UniformBuffer),
            BindGroupLayoutEntry::new(1, ShaderStageFlags::FRAGMENT, BindingType::UniformBuffer),
        ]
    }

    /// Position, normal, UV and tangent streams at slots 0..3
    pub fn vertex_streams() -> Vec<VertexStream> {
        vec![
            VertexStream::new(0, VertexFormat::Float32x4),
            VertexStream::new(1, VertexFormat::Float32x4),
            VertexStream::new(2, VertexFormat::Float32x2),
            VertexStream::new(3, VertexFormat::Float32x4),
        ]
    }

    pub fn meshes(&self) -> &[GpuMesh] {
        &self.meshes
    }

    pub fn object_layout(&self) -> BindGroupLayoutHandle {
        self.object_layout
    }

    /// Release every buffer
    pub fn destroy(self, backend: &mut dyn GraphicsBackend) {
        for mesh in &self.meshes {
            for buffer in mesh.buffers() {
                backend.destroy_buffer(buffer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;

    fn two_planes() -> Scene {
        Scene {
            meshes: vec![CpuMesh::plane(1.0, 1.0, 1), CpuMesh::plane(2.0, 2.0, 2)],
        }
    }

    #[test]
    fn test_seven_buffers_per_mesh() {
        let mut backend = RecordingBackend::new(4, 4);
        let gpu_scene = GpuScene::build(&two_planes(), &mut backend).unwrap();

        assert_eq!(gpu_scene.meshes().len(), 2);
        assert_eq!(backend.live_buffer_count(), 14);
        assert_eq!(gpu_scene.meshes()[1].index_count, 24);

        gpu_scene.destroy(&mut backend);
        assert_eq!(backend.live_buffer_count(), 0);
    }

    #[test]
    fn test_vertex_strides() {
        let strides: Vec<u64> = GpuScene::vertex_streams().iter().map(VertexStream::stride).collect();
        assert_eq!(strides, vec![16, 16, 8, 16]);
        assert_eq!(std::mem::size_of::<ObjectUniformData>(), 128);
    }

    #[test]
    fn test_empty_mesh_is_skipped() {
        let mut backend = RecordingBackend::new(4, 4);
        let scene = Scene {
            meshes: vec![CpuMesh::new("empty"), CpuMesh::plane(1.0, 1.0, 1)],
        };
        let gpu_scene = GpuScene::build(&scene, &mut backend).unwrap();
        assert_eq!(gpu_scene.meshes().len(), 1);
    }
}

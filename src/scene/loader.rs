//! Scene loading and hierarchy flattening

use crate::resources::{CpuMesh, Material};
use crate::scene::gltf_import::import_gltf;
use crate::scene::import::*;
use glam::{Mat4, Vec2, Vec4};
use std::collections::VecDeque;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading a scene
#[derive(Error, Debug)]
pub enum SceneLoadError {
    #[error("import failed: {0}")]
    Import(String),
    #[error("imported scene is incomplete")]
    Incomplete,
    #[error("imported scene has no root node")]
    MissingRoot,
}

/// Flat list of meshes ready for upload, in breadth-first node order
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub meshes: Vec<CpuMesh>,
}

impl Scene {
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(CpuMesh::triangle_count).sum()
    }
}

/// Import a model file and flatten it
pub fn load_scene(path: impl AsRef<Path>) -> Result<Scene, SceneLoadError> {
    let path = path.as_ref();
    let imported = import_gltf(path)?;
    let scene = flatten(&imported)?;

    log::info!(
        "Loaded scene {}: {} meshes, {} triangles",
        path.display(),
        scene.meshes.len(),
        scene.triangle_count()
    );

    Ok(scene)
}

/// Walk the node tree breadth-first and bake world transforms onto meshes
pub fn flatten(imported: &ImportedScene) -> Result<Scene, SceneLoadError> {
    if imported.incomplete {
        return Err(SceneLoadError::Incomplete);
    }
    let root = imported.root.ok_or(SceneLoadError::MissingRoot)?;

    let mut scene = Scene::default();
    let mut visited = vec![false; imported.nodes.len()];
    let mut worklist: VecDeque<(NodeIndex, Mat4)> = VecDeque::from([(root, Mat4::IDENTITY)]);

    while let Some((index, parent_world)) = worklist.pop_front() {
        let node = imported
            .node(index)
            .ok_or_else(|| SceneLoadError::Import(format!("node {} does not exist", index.0)))?;
        if std::mem::replace(&mut visited[index.0], true) {
            return Err(SceneLoadError::Import(format!("node {} is reachable twice", index.0)));
        }

        let world = parent_world * node.transform;

        for &mesh_index in &node.meshes {
            let mesh = imported
                .meshes
                .get(mesh_index)
                .ok_or_else(|| SceneLoadError::Import(format!("mesh {} does not exist", mesh_index)))?;
            let material = mesh
                .material
                .and_then(|m| imported.materials.get(m))
                .map(build_material)
                .unwrap_or_default();

            let name = mesh
                .name
                .clone()
                .unwrap_or_else(|| format!("mesh{}", scene.meshes.len()));
            let mut cpu_mesh = copy_mesh(&name, mesh).with_world(world);
            if !cpu_mesh.is_valid() {
                return Err(SceneLoadError::Import(format!(
                    "mesh {} has mismatched vertex attributes or indices",
                    name
                )));
            }
            cpu_mesh.material = material;
            scene.meshes.push(cpu_mesh);
        }

        worklist.extend(node.children.iter().map(|&child| (child, world)));
    }

    Ok(scene)
}

fn build_material(imported: &ImportedMaterial) -> Material {
    let mut material = Material::new(imported.name.as_deref().unwrap_or("material"));
    if let Some(base_color) = imported.base_color {
        material = material.with_base_color(base_color);
    }
    if let Some(roughness) = imported.roughness {
        material = material.with_roughness(roughness);
    }
    material
}

fn copy_mesh(name: &str, mesh: &ImportedMesh) -> CpuMesh {
    let count = mesh.positions.len();
    let mut cpu_mesh = CpuMesh::new(name);

    cpu_mesh.positions = mesh.positions.iter().map(|p| p.extend(1.0)).collect();
    cpu_mesh.normals = match &mesh.normals {
        Some(normals) => normals.iter().map(|n| n.extend(0.0)).collect(),
        None => vec![Vec4::ZERO; count],
    };
    cpu_mesh.uvs = mesh.uvs.clone().unwrap_or_else(|| vec![Vec2::ZERO; count]);
    cpu_mesh.tangents = match &mesh.tangents {
        Some(tangents) => tangents.iter().map(|t| t.extend(0.0)).collect(),
        None => vec![Vec4::ZERO; count],
    };
    cpu_mesh.indices = mesh.faces.iter().flatten().copied().collect();

    cpu_mesh
}

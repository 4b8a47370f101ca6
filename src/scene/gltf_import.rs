//! glTF 2.0 importer
//!
//! Reads `.gltf`/`.glb` through the `gltf` crate and produces an
//! [`ImportedScene`]. The importer converts to the renderer's conventions:
//!
//! - left-handed coordinates (Z negated, node matrices conjugated);
//! - clockwise triangle winding;
//! - triangle lists only, strips and fans are expanded;
//! - smooth normals and tangents are generated when the file lacks them.

use crate::scene::import::*;
use crate::scene::SceneLoadError;
use glam::{Mat4, Vec2, Vec3, Vec4};
use gltf::mesh::Mode;
use std::path::Path;

/// Mirror across the XY plane; its own inverse
const FLIP_Z: Mat4 = Mat4::from_cols(Vec4::X, Vec4::Y, Vec4::NEG_Z, Vec4::W);

fn flip_z(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.y, -v.z)
}

/// Import a glTF file into a scene arena
pub fn import_gltf(path: &Path) -> Result<ImportedScene, SceneLoadError> {
    let (document, buffers, _images) =
        gltf::import(path).map_err(|e| SceneLoadError::Import(e.to_string()))?;

    let mut scene = ImportedScene::default();

    for material in document.materials() {
        let pbr = material.pbr_metallic_roughness();
        let [r, g, b, _] = pbr.base_color_factor();
        scene.materials.push(ImportedMaterial {
            name: material.name().map(String::from),
            base_color: Some(Vec3::new(r, g, b)),
            roughness: Some(pbr.roughness_factor()),
        });
    }

    // glTF mesh index -> imported mesh indices, one per kept primitive
    let mut mesh_index_map: Vec<Vec<usize>> = Vec::new();
    for mesh in document.meshes() {
        let mut flat_indices = Vec::new();

        for (prim_idx, primitive) in mesh.primitives().enumerate() {
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));

            let Some(positions) = reader.read_positions() else {
                log::warn!(
                    "Skipping primitive {} of mesh {}: no positions",
                    prim_idx,
                    mesh.index()
                );
                continue;
            };
            let positions: Vec<Vec3> = positions.map(|p| flip_z(Vec3::from(p))).collect();

            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            let Some(faces) = triangulate(primitive.mode(), &indices) else {
                log::debug!(
                    "Dropping {:?} primitive {} of mesh {}",
                    primitive.mode(),
                    prim_idx,
                    mesh.index()
                );
                continue;
            };
            // Mirroring reverses orientation; swap two corners to restore it
            let faces: Vec<[u32; 3]> = faces
                .into_iter()
                .filter(|f| f.iter().all(|&i| (i as usize) < positions.len()))
                .map(|[a, b, c]| [a, c, b])
                .collect();

            let uvs: Option<Vec<Vec2>> = reader
                .read_tex_coords(0)
                .map(|uvs| uvs.into_f32().map(Vec2::from).collect());

            let normals: Vec<Vec3> = match reader.read_normals() {
                Some(normals) => normals.map(|n| flip_z(Vec3::from(n))).collect(),
                None => generate_smooth_normals(&positions, &faces),
            };

            let read_tangents: Option<Vec<Vec3>> = reader
                .read_tangents()
                .map(|tangents| tangents.map(|[x, y, z, _]| flip_z(Vec3::new(x, y, z))).collect());

            let vertex_count = positions.len();
            let counts = [
                ("NORMAL", Some(normals.len())),
                ("TEXCOORD_0", uvs.as_ref().map(Vec::len)),
                ("TANGENT", read_tangents.as_ref().map(Vec::len)),
            ];
            for (attribute, count) in counts {
                if let Some(count) = count.filter(|&count| count != vertex_count) {
                    return Err(SceneLoadError::Import(format!(
                        "primitive {} of mesh {} has {} {} values for {} positions",
                        prim_idx,
                        mesh.index(),
                        count,
                        attribute,
                        vertex_count
                    )));
                }
            }

            let tangents = match (read_tangents, &uvs) {
                (Some(tangents), _) => Some(tangents),
                (None, Some(uvs)) => Some(generate_tangents(&positions, &normals, uvs, &faces)),
                (None, None) => None,
            };

            let name = mesh.name().map(|name| {
                if mesh.primitives().count() > 1 {
                    format!("{name}_prim{prim_idx}")
                } else {
                    name.to_string()
                }
            });

            flat_indices.push(scene.meshes.len());
            scene.meshes.push(ImportedMesh {
                name,
                positions,
                normals: Some(normals),
                uvs,
                tangents,
                faces,
                material: primitive.material().index(),
            });
        }

        mesh_index_map.push(flat_indices);
    }

    for node in document.nodes() {
        let local = Mat4::from_cols_array_2d(&node.transform().matrix());
        scene.nodes.push(ImportedNode {
            name: node.name().map(String::from),
            transform: FLIP_Z * local * FLIP_Z,
            meshes: node
                .mesh()
                .map(|m| mesh_index_map[m.index()].clone())
                .unwrap_or_default(),
            children: node.children().map(|c| NodeIndex(c.index())).collect(),
        });
    }

    if let Some(default_scene) = document.default_scene().or_else(|| document.scenes().next()) {
        let mut root = ImportedNode::new(Mat4::IDENTITY);
        root.name = Some("root".into());
        root.children = default_scene.nodes().map(|n| NodeIndex(n.index())).collect();
        scene.root = Some(scene.add_node(root));
    }

    scene.incomplete = scene.meshes.is_empty();

    log::info!(
        "Imported {}: {} nodes, {} meshes, {} materials",
        path.display(),
        scene.nodes.len(),
        scene.meshes.len(),
        scene.materials.len()
    );

    Ok(scene)
}

/// Expand an index stream into triangles; `None` for non-triangle topologies
fn triangulate(mode: Mode, indices: &[u32]) -> Option<Vec<[u32; 3]>> {
    let faces = match mode {
        Mode::Triangles => indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect(),
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, w)| {
                if i % 2 == 0 {
                    [w[0], w[1], w[2]]
                } else {
                    [w[1], w[0], w[2]]
                }
            })
            .collect(),
        Mode::TriangleFan => indices
            .windows(2)
            .skip(1)
            .map(|w| [indices[0], w[0], w[1]])
            .collect(),
        Mode::Points | Mode::Lines | Mode::LineLoop | Mode::LineStrip => return None,
    };
    Some(faces)
}

//! Common utilities for integration tests.
//!
//! Writes small glTF models to a scratch directory and provides helpers for
//! inspecting what the recording backend saw.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use metallic_reflections::backend::{RecordedCall, RecordingBackend};
use metallic_reflections::resources::{CpuMesh, HdrImage};
use metallic_reflections::scene::Scene;
use metallic_reflections::{EnvironmentConfig, RendererConfig};

// ============================================================================
// Scratch Directory
// ============================================================================

/// Directory under the system temp dir, removed on drop.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "metallic-reflections-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&path).expect("Failed to create scratch dir");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, file: &str) -> PathBuf {
        self.path.join(file)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

// ============================================================================
// glTF Models
// ============================================================================

/// Unit quad in the XZ plane: 4 vertices, 2 triangles.
pub const QUAD_POSITIONS: [[f32; 3]; 4] = [
    [-0.5, 0.0, -0.5],
    [0.5, 0.0, -0.5],
    [0.5, 0.0, 0.5],
    [-0.5, 0.0, 0.5],
];

/// Counter-clockwise seen from +Y, as glTF expects.
pub const QUAD_INDICES: [u32; 6] = [0, 2, 1, 0, 3, 2];

/// Gold-ish material written into every model.
pub const QUAD_BASE_COLOR: Vec3 = Vec3::new(1.0, 0.8, 0.3);
pub const QUAD_ROUGHNESS: f32 = 0.2;

/// A node in a test model; `mesh` attaches the quad.
pub struct TestNode {
    pub matrix: Mat4,
    pub mesh: bool,
    pub children: Vec<usize>,
}

impl TestNode {
    pub fn leaf(matrix: Mat4) -> Self {
        Self {
            matrix,
            mesh: true,
            children: Vec::new(),
        }
    }

    pub fn group(matrix: Mat4, children: Vec<usize>) -> Self {
        Self {
            matrix,
            mesh: false,
            children,
        }
    }
}

fn json_floats(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| format!("{v:?}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Write `<name>.gltf` + `<name>.bin` holding the quad under `nodes`.
///
/// `roots` are the scene's root nodes. Returns the `.gltf` path.
pub fn write_model(dir: &ScratchDir, name: &str, nodes: &[TestNode], roots: &[usize]) -> PathBuf {
    let mut bin: Vec<u8> = Vec::new();
    for p in QUAD_POSITIONS {
        bin.extend(bytemuck::cast_slice(&p));
    }
    for _ in QUAD_POSITIONS {
        bin.extend(bytemuck::cast_slice(&[0.0f32, 1.0, 0.0]));
    }
    bin.extend(bytemuck::cast_slice(&QUAD_INDICES));
    std::fs::write(dir.join(&format!("{name}.bin")), &bin).expect("Failed to write buffer");

    let nodes_json = nodes
        .iter()
        .map(|node| {
            let mut fields = vec![format!("\"matrix\":[{}]", json_floats(&node.matrix.to_cols_array()))];
            if node.mesh {
                fields.push("\"mesh\":0".to_string());
            }
            if !node.children.is_empty() {
                let children: Vec<String> = node.children.iter().map(usize::to_string).collect();
                fields.push(format!("\"children\":[{}]", children.join(",")));
            }
            format!("{{{}}}", fields.join(","))
        })
        .collect::<Vec<_>>()
        .join(",");
    let roots_json: Vec<String> = roots.iter().map(usize::to_string).collect();

    let gltf = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [{roots}] }}],
  "nodes": [{nodes}],
  "meshes": [{{
    "name": "quad",
    "primitives": [{{ "attributes": {{ "POSITION": 0, "NORMAL": 1 }}, "indices": 2, "material": 0 }}]
  }}],
  "materials": [{{
    "name": "gold",
    "pbrMetallicRoughness": {{ "baseColorFactor": [{r:?}, {g:?}, {b:?}, 1.0], "roughnessFactor": {roughness:?} }}
  }}],
  "buffers": [{{ "uri": "{name}.bin", "byteLength": {len} }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 48, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 48, "byteLength": 48, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 96, "byteLength": 24, "target": 34963 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3",
       "min": [-0.5, 0.0, -0.5], "max": [0.5, 0.0, 0.5] }},
    {{ "bufferView": 1, "componentType": 5126, "count": 4, "type": "VEC3" }},
    {{ "bufferView": 2, "componentType": 5125, "count": 6, "type": "SCALAR" }}
  ]
}}"#,
        roots = roots_json.join(","),
        nodes = nodes_json,
        r = QUAD_BASE_COLOR.x,
        g = QUAD_BASE_COLOR.y,
        b = QUAD_BASE_COLOR.z,
        roughness = QUAD_ROUGHNESS,
        name = name,
        len = bin.len(),
    );

    let path = dir.join(&format!("{name}.gltf"));
    std::fs::write(&path, gltf).expect("Failed to write model");
    path
}

/// Write a single-node quad whose `NORMAL` and `TEXCOORD_0` streams hold
/// `normal_count` and `uv_count` entries.
pub fn write_quad_with_streams(dir: &ScratchDir, name: &str, normal_count: usize, uv_count: usize) -> PathBuf {
    let mut bin: Vec<u8> = Vec::new();
    for p in QUAD_POSITIONS {
        bin.extend(bytemuck::cast_slice(&p));
    }
    let normals_offset = bin.len();
    for _ in 0..normal_count {
        bin.extend(bytemuck::cast_slice(&[0.0f32, 1.0, 0.0]));
    }
    let uvs_offset = bin.len();
    for i in 0..uv_count {
        bin.extend(bytemuck::cast_slice(&[(i % 2) as f32, (i / 2) as f32]));
    }
    let indices_offset = bin.len();
    bin.extend(bytemuck::cast_slice(&QUAD_INDICES));
    std::fs::write(dir.join(&format!("{name}.bin")), &bin).expect("Failed to write buffer");

    let gltf = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "mesh": 0 }}],
  "meshes": [{{
    "name": "quad",
    "primitives": [{{ "attributes": {{ "POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 2 }}, "indices": 3 }}]
  }}],
  "buffers": [{{ "uri": "{name}.bin", "byteLength": {len} }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 48, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": {normals_offset}, "byteLength": {normals_len}, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": {uvs_offset}, "byteLength": {uvs_len}, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": {indices_offset}, "byteLength": 24, "target": 34963 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3",
       "min": [-0.5, 0.0, -0.5], "max": [0.5, 0.0, 0.5] }},
    {{ "bufferView": 1, "componentType": 5126, "count": {normal_count}, "type": "VEC3" }},
    {{ "bufferView": 2, "componentType": 5126, "count": {uv_count}, "type": "VEC2" }},
    {{ "bufferView": 3, "componentType": 5125, "count": 6, "type": "SCALAR" }}
  ]
}}"#,
        name = name,
        len = bin.len(),
        normals_offset = normals_offset,
        normals_len = normal_count * 12,
        uvs_offset = uvs_offset,
        uvs_len = uv_count * 8,
        indices_offset = indices_offset,
        normal_count = normal_count,
        uv_count = uv_count,
    );

    let path = dir.join(&format!("{name}.gltf"));
    std::fs::write(&path, gltf).expect("Failed to write model");
    path
}

/// Mirror across XY; maps glTF space to the renderer's left-handed space.
pub fn flip_z() -> Mat4 {
    Mat4::from_scale(Vec3::new(1.0, 1.0, -1.0))
}

/// Element-wise comparison with tolerance.
pub fn mat_approx_eq(a: Mat4, b: Mat4) -> bool {
    a.abs_diff_eq(b, 1e-5)
}

// ============================================================================
// Renderer Fixtures
// ============================================================================

/// The 2x1 environment used by end-to-end tests.
pub fn tiny_environment() -> HdrImage {
    HdrImage::from_pixels(
        2,
        1,
        vec![[4.0, 3.0, 2.0, 1.0], [0.1, 0.2, 0.3, 1.0]],
        "tiny_sky",
    )
    .expect("Failed to build environment image")
}

/// One quad mesh, already flattened.
pub fn quad_scene() -> Scene {
    Scene {
        meshes: vec![CpuMesh::plane(1.0, 1.0, 1)],
    }
}

/// Small configuration that keeps the recorded call list short.
pub fn small_config(width: u32, height: u32) -> RendererConfig {
    RendererConfig {
        width,
        height,
        environment: EnvironmentConfig {
            base_size: 16,
            sample_count: 8,
        },
        ..Default::default()
    }
}

// ============================================================================
// Recording Inspection
// ============================================================================

/// Labels of render and compute passes, plus "copy" for texture copies.
pub fn pass_labels(calls: &[RecordedCall]) -> Vec<String> {
    calls
        .iter()
        .filter_map(|call| match call {
            RecordedCall::BeginRenderPass { label, .. } | RecordedCall::BeginComputePass { label } => {
                Some(label.clone().unwrap_or_default())
            }
            RecordedCall::CopyTextureToTexture { .. } => Some("copy".to_string()),
            _ => None,
        })
        .collect()
}

/// Calls recorded between the n-th `BeginFrame` and its `EndFrame`.
pub fn frame_calls(backend: &RecordingBackend, frame: usize) -> Vec<RecordedCall> {
    backend
        .calls()
        .iter()
        .skip_while({
            let mut seen = 0;
            move |call| {
                if matches!(call, RecordedCall::BeginFrame) {
                    seen += 1;
                }
                seen <= frame
            }
        })
        .take_while(|call| !matches!(call, RecordedCall::EndFrame))
        .cloned()
        .collect()
}

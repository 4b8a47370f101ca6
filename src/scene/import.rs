//! Imported scene arena
//!
//! Importer output before flattening: nodes, meshes and materials addressed by
//! integer handles. Geometry is already left-handed with clockwise front faces.

use glam::{Mat4, Vec2, Vec3};
use std::collections::HashMap;

/// Handle of a node inside [`ImportedScene::nodes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(pub usize);

#[derive(Debug, Clone)]
pub struct ImportedNode {
    pub name: Option<String>,
    /// Local transform relative to the parent
    pub transform: Mat4,
    /// Indices into [`ImportedScene::meshes`]
    pub meshes: Vec<usize>,
    pub children: Vec<NodeIndex>,
}

impl ImportedNode {
    pub fn new(transform: Mat4) -> Self {
        Self {
            name: None,
            transform,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportedMesh {
    pub name: Option<String>,
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub uvs: Option<Vec<Vec2>>,
    pub tangents: Option<Vec<Vec3>>,
    pub faces: Vec<[u32; 3]>,
    /// Index into [`ImportedScene::materials`]
    pub material: Option<usize>,
}

/// Material keys found by the importer; `None` keeps the default
#[derive(Debug, Clone, Default)]
pub struct ImportedMaterial {
    pub name: Option<String>,
    pub base_color: Option<Vec3>,
    pub roughness: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportedScene {
    pub nodes: Vec<ImportedNode>,
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
    pub root: Option<NodeIndex>,
    /// Set when the importer could not produce usable geometry
    pub incomplete: bool,
}

impl ImportedScene {
    pub fn node(&self, index: NodeIndex) -> Option<&ImportedNode> {
        self.nodes.get(index.0)
    }

    pub fn add_node(&mut self, node: ImportedNode) -> NodeIndex {
        self.nodes.push(node);
        NodeIndex(self.nodes.len() - 1)
    }
}

/// Faces only contribute to a shared normal within this angle
pub const SMOOTH_NORMAL_MAX_ANGLE_DEGREES: f32 = 80.0;

fn face_normal(positions: &[Vec3], face: &[u32; 3]) -> Vec3 {
    let [a, b, c] = face.map(|i| positions[i as usize]);
    (b - a).cross(c - a).normalize_or_zero()
}

/// Smooth vertex normals for a mesh that has none
///
/// Each vertex first takes the average of its own faces. Vertices sharing a
/// position then average with each other when their normals are less than
/// [`SMOOTH_NORMAL_MAX_ANGLE_DEGREES`] apart, so hard edges survive.
pub fn generate_smooth_normals(positions: &[Vec3], faces: &[[u32; 3]]) -> Vec<Vec3> {
    let mut own = vec![Vec3::ZERO; positions.len()];
    for face in faces {
        let n = face_normal(positions, face);
        for &i in face {
            own[i as usize] += n;
        }
    }
    for n in &mut own {
        *n = n.normalize_or_zero();
    }

    let mut by_position: HashMap<[u32; 3], Vec<usize>> = HashMap::new();
    for (i, p) in positions.iter().enumerate() {
        by_position
            .entry(p.to_array().map(f32::to_bits))
            .or_default()
            .push(i);
    }

    let min_cos = SMOOTH_NORMAL_MAX_ANGLE_DEGREES.to_radians().cos();
    let mut smoothed = own.clone();
    for group in by_position.values().filter(|g| g.len() > 1) {
        for &i in group {
            let sum: Vec3 = group
                .iter()
                .map(|&j| own[j])
                .filter(|n| n.dot(own[i]) > min_cos)
                .sum();
            smoothed[i] = sum.normalize_or_zero();
        }
    }

    smoothed
}

/// Per-vertex tangents from UV derivatives, orthonormalised against the normal
pub fn generate_tangents(
    positions: &[Vec3],
    normals: &[Vec3],
    uvs: &[Vec2],
    faces: &[[u32; 3]],
) -> Vec<Vec3> {
    let mut accumulated = vec![Vec3::ZERO; positions.len()];

    for face in faces {
        let [i0, i1, i2] = face.map(|i| i as usize);
        let e1 = positions[i1] - positions[i0];
        let e2 = positions[i2] - positions[i0];
        let d1 = uvs[i1] - uvs[i0];
        let d2 = uvs[i2] - uvs[i0];

        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let tangent = (e1 * d2.y - e2 * d1.y) / det;
        for i in [i0, i1, i2] {
            accumulated[i] += tangent;
        }
    }

    accumulated
        .iter()
        .zip(normals)
        .map(|(&t, &n)| {
            let t = (t - n * n.dot(t)).normalize_or_zero();
            if t == Vec3::ZERO && n != Vec3::ZERO {
                n.any_orthonormal_vector()
            } else {
                t
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two faces of a cube edge meeting at 90 degrees, vertices duplicated
    fn hard_edge() -> (Vec<Vec3>, Vec<[u32; 3]>) {
        let positions = vec![
            // top face (+Y)
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            // side face (-X)
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        (positions, vec![[0, 1, 2], [3, 4, 5]])
    }

    #[test]
    fn test_hard_edge_is_kept() {
        let (positions, faces) = hard_edge();
        let normals = generate_smooth_normals(&positions, &faces);
        assert!((normals[0] - Vec3::Y).length() < 1e-6);
        assert!((normals[3] + Vec3::X).length() < 1e-6);
    }

    #[test]
    fn test_shallow_crease_is_smoothed() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(-1.0, -0.2, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let faces = vec![[0, 1, 2], [3, 4, 5]];
        let normals = generate_smooth_normals(&positions, &faces);
        assert!((normals[0] - normals[3]).length() < 1e-6);
        assert!(normals[0].y > 0.9);
    }

    #[test]
    fn test_tangent_follows_u() {
        let positions = vec![Vec3::ZERO, Vec3::Z, Vec3::X];
        let normals = vec![Vec3::Y; 3];
        let uvs = vec![Vec2::new(0.0, 0.0), Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0)];
        let tangents = generate_tangents(&positions, &normals, &uvs, &[[0, 1, 2]]);
        for t in tangents {
            assert!((t - Vec3::X).length() < 1e-6);
        }
    }
}

//! Scene loading tests
//!
//! Loads glTF files written on the fly and checks the flattened result.
//!
//! # Test Categories
//!
//! - **Attributes**: streams have one entry per vertex, index lists hold triangles
//! - **Hierarchy**: world transforms compose parent before child
//! - **Materials**: glTF PBR factors reach the mesh material
//! - **Failures**: unreadable files surface as import errors
//! - **Upload**: GPU scene failures name the buffer and release everything

mod common;

use common::*;
use glam::{Mat4, Quat, Vec3};
use metallic_reflections::backend::RecordingBackend;
use metallic_reflections::scene::{load_scene, GpuScene, SceneLoadError};
use metallic_reflections::RenderError;
use rstest::rstest;

// ============================================================================
// Attributes
// ============================================================================

/// Test that a single node with a single mesh loads every attribute stream.
///
/// Verifies:
/// - One mesh comes out
/// - Positions, normals, UVs and tangents all have N entries
/// - The index count is a multiple of 3 and indices stay in range
#[test]
fn test_single_mesh_attribute_streams() {
    let dir = ScratchDir::new("single-mesh");
    let path = write_model(&dir, "quad", &[TestNode::leaf(Mat4::IDENTITY)], &[0]);

    let scene = load_scene(&path).expect("Failed to load scene");
    assert_eq!(scene.meshes.len(), 1);

    let mesh = &scene.meshes[0];
    let n = QUAD_POSITIONS.len();
    assert_eq!(mesh.positions.len(), n);
    assert_eq!(mesh.normals.len(), n);
    assert_eq!(mesh.uvs.len(), n);
    assert_eq!(mesh.tangents.len(), n);
    assert_eq!(mesh.indices.len() % 3, 0);
    assert_eq!(mesh.indices.len(), QUAD_INDICES.len());
    assert!(mesh.is_valid());
    assert_eq!(mesh.name, "quad");
}

/// Test that positions are mirrored into left-handed space with w = 1.
#[test]
fn test_positions_are_left_handed() {
    let dir = ScratchDir::new("left-handed");
    let path = write_model(&dir, "quad", &[TestNode::leaf(Mat4::IDENTITY)], &[0]);

    let mesh = &load_scene(&path).unwrap().meshes[0];
    for (loaded, source) in mesh.positions.iter().zip(QUAD_POSITIONS) {
        assert_eq!(loaded.truncate(), Vec3::new(source[0], source[1], -source[2]));
        assert_eq!(loaded.w, 1.0);
    }
    for normal in &mesh.normals {
        assert_eq!(*normal, Vec3::Y.extend(0.0));
    }
}

/// Test that mirroring keeps the quad facing +Y under clockwise culling.
///
/// Verifies:
/// - Every triangle winds clockwise seen from above in left-handed space
#[test]
fn test_winding_is_clockwise_after_import() {
    let dir = ScratchDir::new("winding");
    let path = write_model(&dir, "quad", &[TestNode::leaf(Mat4::IDENTITY)], &[0]);

    let mesh = &load_scene(&path).unwrap().meshes[0];
    for tri in mesh.indices.chunks_exact(3) {
        let a = mesh.positions[tri[0] as usize].truncate();
        let b = mesh.positions[tri[1] as usize].truncate();
        let c = mesh.positions[tri[2] as usize].truncate();
        // Left-handed: clockwise seen from +Y means the cross product points up
        let face_normal = (b - a).cross(c - a);
        assert!(face_normal.y > 0.0, "triangle {:?} faces {:?}", tri, face_normal);
    }
}

// ============================================================================
// Hierarchy
// ============================================================================

/// Test that a lone node's world transform is its converted local transform.
#[rstest]
#[case::identity("identity", Mat4::IDENTITY)]
#[case::translated("translated", Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)))]
#[case::rotated("rotated", Mat4::from_rotation_y(0.7))]
#[case::scaled("scaled", Mat4::from_scale(Vec3::new(2.0, 1.0, 0.5)))]
fn test_single_node_world_equals_local(#[case] name: &str, #[case] local: Mat4) {
    let dir = ScratchDir::new(&format!("single-node-{}", name));
    let path = write_model(&dir, "quad", &[TestNode::leaf(local)], &[0]);

    let mesh = &load_scene(&path).unwrap().meshes[0];
    let expected = flip_z() * local * flip_z();
    assert!(
        mat_approx_eq(mesh.world, expected),
        "world {:?} != {:?}",
        mesh.world,
        expected
    );
}

/// Test that a two-level hierarchy multiplies parent before child.
///
/// Verifies:
/// - child world == parent local * child local
/// - the reversed product is not produced
#[test]
fn test_two_level_hierarchy_composes_parent_first() {
    let parent = Mat4::from_rotation_translation(
        Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        Vec3::new(1.0, 2.0, 3.0),
    );
    let child = Mat4::from_translation(Vec3::new(4.0, 0.0, 0.0));

    let dir = ScratchDir::new("two-level");
    let path = write_model(
        &dir,
        "nested",
        &[TestNode::group(parent, vec![1]), TestNode::leaf(child)],
        &[0],
    );

    let mesh = &load_scene(&path).unwrap().meshes[0];
    let expected = flip_z() * parent * child * flip_z();
    let reversed = flip_z() * child * parent * flip_z();

    assert!(mat_approx_eq(mesh.world, expected));
    assert!(!mat_approx_eq(mesh.world, reversed));
    // Parent rotation carries the child offset onto -Z before mirroring
    assert!((mesh.world.w_axis.truncate() - Vec3::new(1.0, 2.0, 1.0)).length() < 1e-4);
}

/// Test that every scene root contributes its meshes.
#[test]
fn test_multiple_roots() {
    let dir = ScratchDir::new("multi-root");
    let path = write_model(
        &dir,
        "pair",
        &[
            TestNode::leaf(Mat4::from_translation(Vec3::X)),
            TestNode::leaf(Mat4::from_translation(Vec3::NEG_X)),
        ],
        &[0, 1],
    );

    let scene = load_scene(&path).unwrap();
    assert_eq!(scene.meshes.len(), 2);
    assert_eq!(scene.meshes[0].world.w_axis.x, 1.0);
    assert_eq!(scene.meshes[1].world.w_axis.x, -1.0);
    assert_eq!(scene.triangle_count(), 4);
}

// ============================================================================
// Materials
// ============================================================================

/// Test that glTF PBR factors become the mesh material.
#[test]
fn test_material_factors() {
    let dir = ScratchDir::new("material");
    let path = write_model(&dir, "quad", &[TestNode::leaf(Mat4::IDENTITY)], &[0]);

    let material = &load_scene(&path).unwrap().meshes[0].material;
    assert!((material.base_color - QUAD_BASE_COLOR).length() < 1e-6);
    assert!((material.roughness - QUAD_ROUGHNESS).abs() < 1e-6);
    assert_eq!(material.name, "gold");
}

// ============================================================================
// Failures
// ============================================================================

/// Test that unreadable files report an import failure.
#[rstest]
#[case::missing("missing.gltf", None)]
#[case::not_gltf("garbage.gltf", Some("this is not json"))]
fn test_unreadable_model(#[case] file: &str, #[case] contents: Option<&str>) {
    let dir = ScratchDir::new(&format!("unreadable-{}", file));
    let path = dir.join(file);
    if let Some(contents) = contents {
        std::fs::write(&path, contents).unwrap();
    }

    assert!(matches!(load_scene(&path), Err(SceneLoadError::Import(_))));
}

/// Test that attribute streams shorter than the positions are rejected.
///
/// Verifies:
/// - No panic while generating tangents from short UVs
/// - No mesh with mismatched streams reaches the scene
/// - The error names the offending attribute
#[rstest]
#[case::short_uvs("short-uvs", 4, 3, "TEXCOORD_0")]
#[case::short_normals("short-normals", 3, 4, "NORMAL")]
fn test_short_attribute_stream(
    #[case] name: &str,
    #[case] normal_count: usize,
    #[case] uv_count: usize,
    #[case] attribute: &str,
) {
    let dir = ScratchDir::new(name);
    let path = write_quad_with_streams(&dir, name, normal_count, uv_count);

    match load_scene(&path) {
        Err(SceneLoadError::Import(message)) => assert!(message.contains(attribute), "{message}"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(scene) => panic!("loaded {} meshes from a malformed model", scene.meshes.len()),
    }
}

/// Test that full-length streams from the same writer still load.
#[test]
fn test_full_attribute_streams_load() {
    let dir = ScratchDir::new("full-streams");
    let path = write_quad_with_streams(&dir, "full-streams", 4, 4);

    let scene = load_scene(&path).expect("Failed to load model");
    assert_eq!(scene.meshes.len(), 1);
    assert!(scene.meshes[0].is_valid());
}

// ============================================================================
// Upload
// ============================================================================

/// Test that a failed vertex buffer names the mesh and attribute.
///
/// Verifies:
/// - The error names the buffer that failed
/// - No buffers created before the failure stay alive
#[rstest]
#[case::positions("Positions")]
#[case::normals("Normals")]
#[case::indices("Indices")]
fn test_gpu_scene_failure_names_buffer(#[case] attribute: &str) {
    let dir = ScratchDir::new(&format!("upload-{}", attribute));
    let path = write_model(&dir, "quad", &[TestNode::leaf(Mat4::IDENTITY)], &[0]);
    let scene = load_scene(&path).unwrap();

    let label = format!("Mesh 0 (quad) {}", attribute);
    let mut backend = RecordingBackend::new(64, 64);
    backend.fail_buffer_creation(&label);

    let err = GpuScene::build(&scene, &mut backend).err().expect("upload should fail");
    match &err {
        RenderError::ResourceCreation { resource, .. } => assert_eq!(resource, &label),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains(&label));
    assert_eq!(backend.live_buffer_count(), 0);
}

/// Test that a successful upload creates seven buffers per mesh.
#[test]
fn test_gpu_scene_buffers_per_mesh() {
    let dir = ScratchDir::new("upload-ok");
    let path = write_model(&dir, "quad", &[TestNode::leaf(Mat4::IDENTITY)], &[0]);
    let scene = load_scene(&path).unwrap();

    let mut backend = RecordingBackend::new(64, 64);
    let gpu_scene = GpuScene::build(&scene, &mut backend).unwrap();
    assert_eq!(gpu_scene.meshes().len(), 1);
    assert_eq!(gpu_scene.meshes()[0].index_count, 6);
    assert_eq!(backend.live_buffer_count(), 7);

    gpu_scene.destroy(&mut backend);
    assert_eq!(backend.live_buffer_count(), 0);
}

//! Environment preprocessing tests
//!
//! Drives [`EnvironmentMap::preprocess`] on the recording backend and checks
//! the recorded command stream.
//!
//! # Test Categories
//!
//! - **Mip Chain**: mip counts and sizes for common cube edges
//! - **Mip 0**: copied unchanged, never prefiltered
//! - **Prefilter Constants**: each dispatch sees its own parameters
//! - **Resources**: cube layout and cleanup

mod common;

use common::*;
use metallic_reflections::backend::{RecordedCall, RecordingBackend, TextureUsage};
use metallic_reflections::environment::{mip_count, mip_size, PrefilterParams};
use metallic_reflections::{EnvironmentConfig, EnvironmentMap};
use rstest::rstest;

const PREFILTER_PASS: &str = "Environment Prefilter";

fn preprocess(base_size: u32) -> (RecordingBackend, EnvironmentMap) {
    let mut backend = RecordingBackend::new(8, 8);
    let config = EnvironmentConfig {
        base_size,
        sample_count: 4,
    };
    let map = EnvironmentMap::preprocess(&mut backend, &tiny_environment(), &config)
        .expect("Failed to preprocess environment");
    (backend, map)
}

fn is_pass(call: &RecordedCall, name: &str) -> bool {
    matches!(call, RecordedCall::BeginComputePass { label: Some(label) } if label == name)
}

// ============================================================================
// Mip Chain
// ============================================================================

/// Test the mip chain length for common cube edges.
#[rstest]
#[case::default_size(1024, 11)]
#[case::small(16, 5)]
#[case::non_power_of_two(1000, 10)]
#[case::single_texel(1, 1)]
fn test_mip_count(#[case] size: u32, #[case] expected: u32) {
    assert_eq!(mip_count(size), expected);
    assert_eq!(mip_size(size, expected - 1), 1);
}

/// Test that the created cubes carry the full chain and six layers.
#[test]
fn test_cube_layout() {
    let (backend, map) = preprocess(32);
    assert_eq!(map.size(), 32);
    assert_eq!(map.mip_count(), 6);

    for label in ["Unfiltered Environment", "Prefiltered Environment"] {
        let (_, desc) = backend.texture_by_label(label).expect("cube not created");
        assert_eq!((desc.width, desc.height, desc.layers), (32, 32, 6));
        assert_eq!(desc.mip_levels, 6);
        assert!(desc.usage.contains(TextureUsage::STORAGE_BINDING));
    }
}

// ============================================================================
// Mip 0
// ============================================================================

/// Test that mip 0 is copied whole and prefiltering starts at mip 1.
///
/// Verifies:
/// - One full-size, six-layer copy from the unfiltered to the prefiltered cube
/// - The copy comes before any prefilter dispatch
/// - Prefilter dispatch count is mips - 1
#[rstest]
#[case::small(16)]
#[case::medium(64)]
fn test_mip0_is_copied_not_prefiltered(#[case] size: u32) {
    let (backend, map) = preprocess(size);
    let calls = backend.calls();

    let copies: Vec<(usize, &RecordedCall)> = calls
        .iter()
        .enumerate()
        .filter(|(_, call)| matches!(call, RecordedCall::CopyTextureToTexture { .. }))
        .collect();
    assert_eq!(copies.len(), 1);

    let (copy_index, copy) = copies[0];
    let (unfiltered, _) = backend.texture_by_label("Unfiltered Environment").unwrap();
    match copy {
        RecordedCall::CopyTextureToTexture {
            src,
            dst,
            width,
            height,
            layers,
        } => {
            assert_eq!(src.texture, unfiltered);
            assert_eq!(dst.texture, map.prefiltered());
            assert_eq!((src.mip_level, dst.mip_level), (0, 0));
            assert_eq!((*width, *height, *layers), (size, size, 6));
        }
        _ => unreachable!(),
    }

    let prefilter_passes: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, call)| is_pass(call, PREFILTER_PASS))
        .map(|(index, _)| index)
        .collect();
    assert_eq!(prefilter_passes.len() as u32, map.mip_count() - 1);
    assert!(prefilter_passes.iter().all(|&index| index > copy_index));
}

// ============================================================================
// Prefilter Constants
// ============================================================================

/// Test that every prefilter dispatch is submitted with its own parameters.
///
/// Verifies:
/// - Each dispatch is preceded by a parameter write for that mip
/// - A submit follows each dispatch before the next write
/// - Mips run 1..N in order, with the dispatch sized for that mip
#[test]
fn test_prefilter_params_are_submitted_per_dispatch() {
    let size = 32;
    let (backend, map) = preprocess(size);
    let calls = backend.calls();

    let start = calls
        .iter()
        .position(|call| is_pass(call, PREFILTER_PASS))
        .expect("no prefilter pass");
    // The first parameter write precedes the first prefilter pass
    let first_write = calls[..start]
        .iter()
        .rposition(|call| matches!(call, RecordedCall::WriteBuffer { .. }))
        .expect("no parameter write");

    let mut expected_mip = 1;
    let mut pending: Option<PrefilterParams> = None;
    let mut dispatched = false;

    for call in &calls[first_write..] {
        match call {
            RecordedCall::WriteBuffer { data, .. } => {
                assert!(pending.is_none(), "parameters overwritten before submit");
                pending = Some(bytemuck::pod_read_unaligned::<PrefilterParams>(data));
            }
            RecordedCall::Dispatch { x, y, z } => {
                let params = pending.expect("dispatch without parameters");
                assert_eq!(params.mip, expected_mip);
                assert_eq!(params.mip_count, map.mip_count());
                assert_eq!(params.base_size, size);
                let groups = mip_size(size, params.mip).div_ceil(8);
                assert_eq!((*x, *y, *z), (groups, groups, 6));
                dispatched = true;
            }
            RecordedCall::Submit if dispatched => {
                pending = None;
                dispatched = false;
                expected_mip += 1;
            }
            _ => {}
        }
    }

    assert_eq!(expected_mip, map.mip_count());
    assert!(pending.is_none());
}

/// Test that sample counts of zero are clamped to one.
#[test]
fn test_zero_sample_count_is_clamped() {
    let mut backend = RecordingBackend::new(8, 8);
    let config = EnvironmentConfig {
        base_size: 4,
        sample_count: 0,
    };
    EnvironmentMap::preprocess(&mut backend, &tiny_environment(), &config).unwrap();

    let counts: Vec<u32> = backend
        .calls()
        .iter()
        .filter_map(|call| match call {
            RecordedCall::WriteBuffer { data, .. } => {
                Some(bytemuck::pod_read_unaligned::<PrefilterParams>(data).sample_count)
            }
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![1, 1]);
}

// ============================================================================
// Resources
// ============================================================================

/// Test that the lighting pass gets a cube view over the prefiltered chain.
#[test]
fn test_prefiltered_view_is_cube() {
    let (backend, map) = preprocess(16);
    let view_created = backend.calls().iter().any(|call| {
        matches!(
            call,
            RecordedCall::CreateTextureView { texture, label: Some(label) }
                if *texture == map.prefiltered() && label == "Prefiltered Environment Cube"
        )
    });
    assert!(view_created);
}

/// Test that a failed cube allocation releases everything created before it.
#[rstest]
#[case::fails_on_unfiltered("Unfiltered Environment")]
#[case::fails_on_prefiltered("Prefiltered Environment")]
fn test_failure_leaves_nothing_alive(#[case] label: &str) {
    let mut backend = RecordingBackend::new(8, 8);
    backend.fail_texture_creation(label);

    let result = EnvironmentMap::preprocess(&mut backend, &tiny_environment(), &EnvironmentConfig::default());
    let err = result.err().expect("preprocessing should fail");
    assert!(err.to_string().contains(label));
    assert_eq!(backend.live_texture_count(), 0);
    assert_eq!(backend.live_buffer_count(), 0);
}

//! Clipping Tests
//!
//! Tests for:
//! - `[global][local]` buffer layout and view-space projection
//! - Plane counts with union / intersection semantics
//! - The `from_cache` contract
//! - Local clipping disabled falls back to the global planes

use glam::{Mat4, Vec3};
use myth_gl::clipping::{Clipping, Plane};
use myth_gl::resources::{Camera, Material};
use myth_gl::uniforms::{UniformValue, UniformValues};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn assert_floats(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(approx(*a, *e), "index {i}: {a} != {e} ({actual:?})");
    }
}

/// Camera looking down -Z from (0, 0, 5).
fn camera_at(z: f32) -> Camera {
    Camera::new(Mat4::from_translation(Vec3::new(0.0, 0.0, -z)), Mat4::IDENTITY, 100.0)
}

fn global_planes() -> [Plane; 2] {
    [Plane::new(Vec3::X, 0.0), Plane::new(Vec3::Y, 1.0)]
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn two_global_one_local_gives_twelve_floats() {
    let camera = camera_at(5.0);
    let mut clipping = Clipping::new();
    assert!(clipping.init(&global_planes(), true, &camera));

    let mut material = Material::basic();
    material.clipping_planes = vec![Plane::new(Vec3::Z, -1.0)];

    let mut cache = None;
    clipping.set_state(&material, &camera, &mut cache, false);

    assert_eq!(clipping.num_planes(), 3);
    assert_eq!(clipping.num_intersection(), 0);
    assert_floats(
        clipping.uniform(),
        &[
            1.0, 0.0, 0.0, 0.0, // global X plane
            0.0, 1.0, 0.0, 1.0, // global Y plane
            0.0, 0.0, 1.0, 4.0, // local Z plane, moved 5 units away
        ],
    );
    assert_eq!(cache.as_deref().map(<[f32]>::len), Some(12));
}

#[test]
fn global_prefix_matches_global_buffer() {
    let camera = camera_at(5.0);
    let mut clipping = Clipping::new();
    clipping.init(&global_planes(), true, &camera);
    let global: Vec<f32> = clipping.uniform().to_vec();
    assert_eq!(global.len(), 8);

    let mut material = Material::basic();
    material.clipping_planes = vec![Plane::new(Vec3::Z, 0.0), Plane::new(Vec3::NEG_Z, 2.0)];
    let mut cache = None;
    clipping.set_state(&material, &camera, &mut cache, false);

    assert_eq!(clipping.uniform().len(), 16);
    assert_floats(&clipping.uniform()[..8], &global);
}

#[test]
fn no_planes_anywhere_disables_clipping() {
    let camera = camera_at(5.0);
    let mut clipping = Clipping::new();
    assert!(!clipping.init(&[], false, &camera));
    assert_eq!(clipping.num_planes(), 0);
    assert!(clipping.uniform().is_empty());
}

#[test]
fn clearing_planes_keeps_clipping_enabled_for_one_frame() {
    let camera = camera_at(5.0);
    let mut clipping = Clipping::new();
    assert!(clipping.init(&global_planes(), false, &camera));
    // The previous frame had planes; state still has to be cleared.
    assert!(clipping.init(&[], false, &camera));
    assert!(!clipping.init(&[], false, &camera));
}

// ============================================================================
// Counts
// ============================================================================

#[test]
fn intersection_counts_only_local_planes() {
    let camera = camera_at(5.0);
    let mut clipping = Clipping::new();
    clipping.init(&global_planes(), true, &camera);

    let mut material = Material::basic();
    material.clipping_planes = vec![Plane::new(Vec3::Z, 0.0), Plane::new(Vec3::X, 3.0)];
    material.clip_intersection = true;

    let mut cache = None;
    clipping.set_state(&material, &camera, &mut cache, false);
    assert_eq!(clipping.num_planes(), 4);
    assert_eq!(clipping.num_intersection(), 2);
    assert_eq!(clipping.plane_counts(&material), (4, 2));
}

#[test]
fn local_planes_ignored_without_local_clipping() {
    let camera = camera_at(5.0);
    let mut clipping = Clipping::new();
    clipping.init(&global_planes(), false, &camera);

    let mut material = Material::basic();
    material.clipping_planes = vec![Plane::new(Vec3::Z, 0.0)];

    let mut cache = None;
    clipping.set_state(&material, &camera, &mut cache, false);
    assert_eq!(clipping.num_planes(), 2);
    assert_eq!(clipping.uniform().len(), 8);
    assert!(cache.is_none());
}

// ============================================================================
// Cache contract
// ============================================================================

#[test]
fn from_cache_skips_reprojection() {
    let near = camera_at(5.0);
    let far = camera_at(10.0);
    let mut clipping = Clipping::new();
    clipping.init(&[], true, &near);

    let mut material = Material::basic();
    material.clipping_planes = vec![Plane::new(Vec3::Z, -1.0)];
    let mut cache = None;
    clipping.set_state(&material, &near, &mut cache, false);
    assert_floats(clipping.uniform(), &[0.0, 0.0, 1.0, 4.0]);

    // Trusted cache: the camera move is not seen.
    clipping.set_state(&material, &far, &mut cache, true);
    assert_floats(clipping.uniform(), &[0.0, 0.0, 1.0, 4.0]);

    clipping.set_state(&material, &far, &mut cache, false);
    assert_floats(clipping.uniform(), &[0.0, 0.0, 1.0, 9.0]);
}

#[test]
fn from_cache_with_wrong_size_reprojects() {
    let camera = camera_at(5.0);
    let mut clipping = Clipping::new();
    clipping.init(&[], true, &camera);

    let mut material = Material::basic();
    material.clipping_planes = vec![Plane::new(Vec3::Z, -1.0)];
    let mut cache = None;
    clipping.set_state(&material, &camera, &mut cache, false);

    material.clipping_planes.push(Plane::new(Vec3::X, 0.0));
    clipping.set_state(&material, &camera, &mut cache, true);
    assert_eq!(clipping.uniform().len(), 8);
    assert_eq!(clipping.num_planes(), 2);
}

#[test]
fn write_uniform_reuses_entry() {
    let camera = camera_at(5.0);
    let mut clipping = Clipping::new();
    clipping.init(&global_planes(), false, &camera);

    let mut values = UniformValues::new();
    clipping.write_uniform(&mut values);
    clipping.write_uniform(&mut values);
    assert_eq!(values.len(), 1);

    let entry = values.get("clippingPlanes").map(|u| &u.value);
    let Some(UniformValue::Floats(data)) = entry else {
        panic!("clippingPlanes is not a float buffer: {entry:?}");
    };
    assert_eq!(data.len(), 8);
}

//! Render List Tests
//!
//! Tests for:
//! - Opaque / transparent classification
//! - Sort order properties over generated item sets
//! - Pool reuse across frames

use myth_gl::render_list::{RenderItem, RenderList};
use myth_gl::resources::{MaterialId, ObjectId};

/// Small deterministic generator (64-bit LCG).
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

fn generate(seed: u64, count: usize) -> Vec<RenderItem> {
    let mut rng = Lcg(seed);
    (0..count)
        .map(|i| RenderItem {
            object: i,
            object_id: ObjectId(rng.below(16)),
            material_slot: 0,
            material_id: MaterialId(rng.below(6)),
            program: rng.below(4) as u32,
            render_order: rng.below(3) as i32 - 1,
            z: rng.below(1000) as f32 / 10.0,
            group: None,
            transparent: rng.below(3) == 0,
        })
        .collect()
}

fn sorted_list(items: &[RenderItem]) -> RenderList {
    let mut list = RenderList::new();
    list.init();
    for item in items {
        list.push(*item);
    }
    list.sort();
    list
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn items_split_by_transparency() {
    let items = generate(7, 64);
    let list = sorted_list(&items);

    let transparent = items.iter().filter(|i| i.transparent).count();
    assert_eq!(list.transparent().count(), transparent);
    assert_eq!(list.opaque().count(), items.len() - transparent);
    assert!(list.opaque().all(|i| !i.transparent));
    assert!(list.transparent().all(|i| i.transparent));
    assert_eq!(list.len(), items.len());
}

#[test]
fn iter_yields_opaque_before_transparent() {
    let list = sorted_list(&generate(11, 40));
    let flags: Vec<bool> = list.iter().map(|i| i.transparent).collect();
    let first_transparent = flags.iter().position(|t| *t).unwrap_or(flags.len());
    assert!(flags[first_transparent..].iter().all(|t| *t));
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn opaque_order_holds_for_generated_sets() {
    for seed in 1..20 {
        let list = sorted_list(&generate(seed, 50));
        let opaque: Vec<&RenderItem> = list.opaque().collect();
        for pair in opaque.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let key_a = (a.render_order, a.program, a.material_id);
            let key_b = (b.render_order, b.program, b.material_id);
            assert!(key_a <= key_b, "seed {seed}: {a:?} before {b:?}");
            if key_a == key_b {
                assert!(a.z <= b.z, "seed {seed}: nearer first");
                if a.z == b.z {
                    assert!(a.object_id <= b.object_id);
                }
            }
        }
    }
}

#[test]
fn transparent_order_holds_for_generated_sets() {
    for seed in 1..20 {
        let list = sorted_list(&generate(seed, 50));
        let transparent: Vec<&RenderItem> = list.transparent().collect();
        for pair in transparent.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(a.render_order <= b.render_order, "seed {seed}");
            if a.render_order == b.render_order {
                assert!(a.z >= b.z, "seed {seed}: farther first");
                if a.z == b.z {
                    assert!(a.object_id <= b.object_id);
                }
            }
        }
    }
}

#[test]
fn program_is_ignored_for_transparent_items() {
    let base = RenderItem {
        object: 0,
        object_id: ObjectId(1),
        material_slot: 0,
        material_id: MaterialId(1),
        program: 9,
        render_order: 0,
        z: 1.0,
        group: None,
        transparent: true,
    };
    let far = RenderItem {
        object: 1,
        object_id: ObjectId(2),
        program: 0,
        z: 5.0,
        ..base
    };
    let list = sorted_list(&[base, far]);
    let order: Vec<usize> = list.transparent().map(|i| i.object).collect();
    assert_eq!(order, vec![1, 0]);
}

#[test]
fn equal_keys_keep_push_order() {
    let item = RenderItem {
        object: 0,
        object_id: ObjectId(3),
        material_slot: 0,
        material_id: MaterialId(1),
        program: 0,
        render_order: 0,
        z: 2.0,
        group: None,
        transparent: false,
    };
    let items: Vec<RenderItem> = (0..8).map(|slot| RenderItem { material_slot: slot, ..item }).collect();
    let list = sorted_list(&items);
    let slots: Vec<usize> = list.opaque().map(|i| i.material_slot).collect();
    assert_eq!(slots, (0..8).collect::<Vec<_>>());
}

// ============================================================================
// Pooling
// ============================================================================

#[test]
fn pool_is_reused_across_frames() {
    let mut list = RenderList::new();
    list.init();
    for item in generate(3, 32) {
        list.push(item);
    }
    assert_eq!(list.pool_size(), 32);

    list.init();
    assert!(list.is_empty());
    for item in generate(4, 10) {
        list.push(item);
    }
    list.sort();
    assert_eq!(list.len(), 10);
    assert_eq!(list.pool_size(), 32);
    assert_eq!(list.iter().count(), 10);
}

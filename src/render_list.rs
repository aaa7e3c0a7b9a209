//! Render List
//!
//! Per-frame draw items, classified into an opaque and a transparent queue.
//!
//! Items live in a pool that only grows: [`RenderList::init`] rewinds a
//! cursor, [`RenderList::push`] overwrites the slot under it. The two queues
//! hold pool indices, so sorting never moves an item.
//!
//! | Queue        | Order                                                       |
//! |--------------|-------------------------------------------------------------|
//! | Opaque       | render order ↑, program ↑, material ↑, depth ↑, object ↑    |
//! | Transparent  | render order ↑, depth ↓, object ↑                           |
//!
//! Ties left after the object id (several groups of one object) fall back to
//! push order.

use std::cmp::Ordering;

use crate::resources::{GeometryGroup, MaterialId, ObjectId};

/// One pending draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    /// Index of the object in the scene's object list.
    pub object: usize,
    pub object_id: ObjectId,
    /// Index into the object's material slots.
    pub material_slot: usize,
    pub material_id: MaterialId,
    /// Serial of the resolved program.
    pub program: u32,
    pub render_order: i32,
    /// Projected depth; larger is farther.
    pub z: f32,
    pub group: Option<GeometryGroup>,
    pub transparent: bool,
}

#[inline]
fn opaque_order(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.render_order
        .cmp(&b.render_order)
        .then(a.program.cmp(&b.program))
        .then(a.material_id.cmp(&b.material_id))
        .then(a.z.total_cmp(&b.z))
        .then(a.object_id.cmp(&b.object_id))
}

#[inline]
fn transparent_order(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.render_order
        .cmp(&b.render_order)
        .then(b.z.total_cmp(&a.z))
        .then(a.object_id.cmp(&b.object_id))
}

#[derive(Debug, Default)]
pub struct RenderList {
    items: Vec<RenderItem>,
    cursor: usize,
    opaque: Vec<usize>,
    transparent: Vec<usize>,
}

impl RenderList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a frame. Keeps the pool and queue allocations.
    #[inline]
    pub fn init(&mut self) {
        self.cursor = 0;
        self.opaque.clear();
        self.transparent.clear();
    }

    /// Records `item` in the queue its `transparent` flag selects.
    pub fn push(&mut self, item: RenderItem) {
        let index = self.cursor;
        if let Some(slot) = self.items.get_mut(index) {
            *slot = item;
        } else {
            self.items.push(item);
        }
        self.cursor += 1;

        if item.transparent {
            self.transparent.push(index);
        } else {
            self.opaque.push(index);
        }
    }

    pub fn sort(&mut self) {
        let items = &self.items;
        self.opaque
            .sort_unstable_by(|&a, &b| opaque_order(&items[a], &items[b]).then(a.cmp(&b)));
        self.transparent
            .sort_unstable_by(|&a, &b| transparent_order(&items[a], &items[b]).then(a.cmp(&b)));
    }

    pub fn opaque(&self) -> impl Iterator<Item = &RenderItem> {
        self.opaque.iter().map(|&i| &self.items[i])
    }

    pub fn transparent(&self) -> impl Iterator<Item = &RenderItem> {
        self.transparent.iter().map(|&i| &self.items[i])
    }

    /// Opaque items followed by transparent items.
    pub fn iter(&self) -> impl Iterator<Item = &RenderItem> {
        self.opaque().chain(self.transparent())
    }

    /// Items pushed since the last [`Self::init`].
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursor
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Size of the item pool (the high-water mark across frames).
    #[inline]
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.items.len()
    }
}

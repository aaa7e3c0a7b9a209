//! Geometry: vertex attributes already resident in driver buffers, an
//! optional index buffer, draw range and material groups.

use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use wgpu::IndexFormat;

use crate::driver::{AttributeLayout, BufferId, ComponentType};

static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u64);

/// One vertex attribute stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub buffer: BufferId,
    /// Components per vertex (1–4).
    pub item_size: u32,
    /// Number of items in the stream.
    pub count: u32,
    pub component: ComponentType,
    pub normalized: bool,
    pub stride: u32,
    pub offset: u32,
    /// Instancing divisor; 0 for per-vertex data.
    pub divisor: u32,
}

impl VertexAttribute {
    /// Tightly packed float attribute.
    #[must_use]
    pub fn floats(buffer: BufferId, item_size: u32, count: u32) -> Self {
        Self {
            buffer,
            item_size,
            count,
            component: ComponentType::Float,
            normalized: false,
            stride: 0,
            offset: 0,
            divisor: 0,
        }
    }

    #[must_use]
    pub fn instanced(mut self, divisor: u32) -> Self {
        self.divisor = divisor;
        self
    }

    #[must_use]
    pub fn layout(&self) -> AttributeLayout {
        AttributeLayout {
            size: self.item_size,
            component: self.component,
            normalized: self.normalized,
            stride: self.stride,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBuffer {
    pub buffer: BufferId,
    pub format: IndexFormat,
    pub count: u32,
}

impl IndexBuffer {
    #[must_use]
    pub fn bytes_per_index(&self) -> u64 {
        match self.format {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// A sub-range of the geometry drawn with one material slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryGroup {
    pub start: u32,
    pub count: u32,
    pub material_index: usize,
}

/// Range of vertices (or indices) to draw. `count: None` means "to the end".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawRange {
    pub start: u32,
    pub count: Option<u32>,
}

#[derive(Debug)]
pub struct Geometry {
    id: GeometryId,
    pub attributes: FxHashMap<String, VertexAttribute>,
    pub index: Option<IndexBuffer>,
    pub groups: Vec<GeometryGroup>,
    pub draw_range: DrawRange,
    pub morph_positions: Vec<VertexAttribute>,
    pub morph_normals: Vec<VertexAttribute>,
    /// Instanced draw count; `None` for non-instanced geometry.
    pub instance_count: Option<u32>,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

impl Geometry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: GeometryId(NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed)),
            attributes: FxHashMap::default(),
            index: None,
            groups: Vec::new(),
            draw_range: DrawRange::default(),
            morph_positions: Vec::new(),
            morph_normals: Vec::new(),
            instance_count: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> GeometryId {
        self.id
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, attribute: VertexAttribute) -> Self {
        self.attributes.insert(name.to_owned(), attribute);
        self
    }

    #[must_use]
    pub fn with_index(mut self, index: IndexBuffer) -> Self {
        self.index = Some(index);
        self
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.get(name)
    }

    pub fn add_group(&mut self, start: u32, count: u32, material_index: usize) {
        self.groups.push(GeometryGroup {
            start,
            count,
            material_index,
        });
    }

    /// Number of elements a full draw covers: index count when indexed,
    /// otherwise the `position` count.
    #[must_use]
    pub fn element_count(&self) -> u32 {
        match &self.index {
            Some(index) => index.count,
            None => self.attributes.get("position").map_or(0, |p| p.count),
        }
    }

    #[inline]
    #[must_use]
    pub fn has_vertex_colors(&self) -> bool {
        self.attributes.contains_key("color")
    }
}

//! Uniform Registry
//!
//! Turns the flat list of active uniforms a linked program reports into a
//! setter tree, and uploads values through it.
//!
//! The tree is stored as an arena: every node lives in one `Vec` and refers
//! to its children by [`NodeIndex`]. Struct containers keep their children
//! both in declaration order (`seq`, replayed on upload) and in a map keyed
//! by [`UniformId`] (used while building). The shape never changes after the
//! registry is built.
//!
//! ```text
//! "diffuse"                     root ─┬─ Leaf diffuse (singular)
//! "boneMatrices[0]"                   ├─ Leaf boneMatrices (pure array)
//! "pointLights[0].color"              └─ Struct pointLights
//! "pointLights[0].distance"                 └─ Struct 0
//!                                               ├─ Leaf color
//!                                               └─ Leaf distance
//! ```

pub mod path;
pub mod scratch;
pub mod setters;
pub mod texture_units;
pub mod value;

pub use path::{UniformId, UniformPath, UploadStrategy};
pub use scratch::ScratchPool;
pub use setters::{UniformLeaf, UniformType};
pub use texture_units::TextureUnits;
pub use value::{Uniform, UniformValue, UniformValues};

use log::trace;
use rustc_hash::FxHashMap;

use crate::driver::{ActiveUniform, GlDriver, ProgramId};
use crate::errors::{RenderError, Result};
use crate::resources::TextureBinder;
use crate::state::GpuState;

/// Everything a leaf setter needs to issue its upload.
pub struct UploadContext<'a> {
    pub driver: &'a mut dyn GlDriver,
    pub state: &'a mut GpuState,
    pub textures: &'a mut dyn TextureBinder,
    pub units: &'a mut TextureUnits,
    pub scratch: &'a mut ScratchPool,
}

// ─── Nodes ────────────────────────────────────────────────────────────────────

/// Index of a node in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(u32);

/// A struct container: children in declaration order plus an id index.
#[derive(Debug, Clone, Default)]
pub struct StructNode {
    seq: Vec<NodeIndex>,
    map: FxHashMap<UniformId, NodeIndex>,
}

impl StructNode {
    /// Children in declaration order.
    #[must_use]
    pub fn children(&self) -> &[NodeIndex] {
        &self.seq
    }

    #[must_use]
    pub fn child(&self, id: &UniformId) -> Option<NodeIndex> {
        self.map.get(id).copied()
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Leaf(UniformLeaf),
    Struct(StructNode),
}

#[derive(Debug, Clone)]
pub struct UniformNode {
    pub id: UniformId,
    pub kind: NodeKind,
}

// ─── UniformRegistry ──────────────────────────────────────────────────────────

/// Setter tree for one linked program.
#[derive(Debug, Clone, Default)]
pub struct UniformRegistry {
    nodes: Vec<UniformNode>,
    seq: Vec<NodeIndex>,
    map: FxHashMap<String, NodeIndex>,
}

impl UniformRegistry {
    /// Empty registry (used for programs that failed to link).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Queries the driver for the program's active uniforms and builds the tree.
    pub fn new(driver: &dyn GlDriver, program: ProgramId) -> Result<Self> {
        Self::from_active(&driver.active_uniforms(program))
    }

    /// Builds the tree from a reflection result.
    pub fn from_active(active: &[ActiveUniform]) -> Result<Self> {
        let mut registry = Self::default();
        for info in active {
            registry.add(info)?;
        }
        Ok(registry)
    }

    fn add(&mut self, info: &ActiveUniform) -> Result<()> {
        let kind = UniformType::from_code(info.type_code).ok_or_else(|| RenderError::UnknownUniformType {
            name: info.name.clone(),
            code: info.type_code,
        })?;
        let parsed = path::parse(&info.name)?;

        let mut parent: Option<NodeIndex> = None;
        for id in parsed.containers {
            let existing = match parent {
                None => match &id {
                    UniformId::Name(name) => self.map.get(name).copied(),
                    UniformId::Index(_) => None,
                },
                Some(p) => self.struct_node(p).and_then(|s| s.child(&id)),
            };
            let next = match existing {
                Some(index) if self.struct_node(index).is_some() => index,
                Some(_) => return Err(RenderError::MalformedUniformName(info.name.clone())),
                None => self.push(parent, id, NodeKind::Struct(StructNode::default()))?,
            };
            parent = Some(next);
        }

        let leaf = UniformLeaf {
            location: info.location,
            kind,
            size: info.size.max(1),
            strategy: parsed.strategy,
        };
        self.push(parent, parsed.leaf, NodeKind::Leaf(leaf))?;
        Ok(())
    }

    fn push(&mut self, parent: Option<NodeIndex>, id: UniformId, kind: NodeKind) -> Result<NodeIndex> {
        let index = NodeIndex(self.nodes.len() as u32);
        match parent {
            None => {
                let UniformId::Name(name) = &id else {
                    return Err(RenderError::MalformedUniformName(id.to_string()));
                };
                self.map.insert(name.clone(), index);
                self.seq.push(index);
            }
            Some(p) => {
                if let Some(NodeKind::Struct(s)) = self.nodes.get_mut(p.0 as usize).map(|n| &mut n.kind) {
                    s.map.insert(id.clone(), index);
                    s.seq.push(index);
                }
            }
        }
        self.nodes.push(UniformNode { id, kind });
        Ok(index)
    }

    fn struct_node(&self, index: NodeIndex) -> Option<&StructNode> {
        match &self.nodes.get(index.0 as usize)?.kind {
            NodeKind::Struct(s) => Some(s),
            NodeKind::Leaf(_) => None,
        }
    }

    // ─── Inspection ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn node(&self, index: NodeIndex) -> Option<&UniformNode> {
        self.nodes.get(index.0 as usize)
    }

    /// Top-level node by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<NodeIndex> {
        self.map.get(name).copied()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Top-level nodes in declaration order.
    #[must_use]
    pub fn sequence(&self) -> &[NodeIndex] {
        &self.seq
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level nodes whose name has an entry in `values`, in declaration
    /// order. Materials cache this list per program.
    #[must_use]
    pub fn seq_with_values(&self, values: &UniformValues) -> Vec<NodeIndex> {
        self.seq
            .iter()
            .copied()
            .filter(|i| match self.node(*i).map(|n| &n.id) {
                Some(UniformId::Name(name)) => values.contains(name),
                _ => false,
            })
            .collect()
    }

    // ─── Upload ──────────────────────────────────────────────────────────────

    /// Uploads `value` to the top-level uniform `name`. Names the program
    /// does not use are ignored.
    pub fn set_value(&self, ctx: &mut UploadContext<'_>, name: &str, value: &UniformValue) {
        if let Some(index) = self.lookup(name) {
            self.upload_node(ctx, index, value);
        }
    }

    /// Uploads a float block to the top-level leaf `name` without building a
    /// [`UniformValue`]. Per-draw data (bone matrices, morph influences) goes
    /// through here so nothing is allocated per draw.
    pub fn set_floats(&self, ctx: &mut UploadContext<'_>, name: &str, values: &[f32]) {
        if let Some(UniformNode {
            kind: NodeKind::Leaf(leaf),
            ..
        }) = self.lookup(name).and_then(|i| self.node(i))
        {
            leaf.upload_floats(ctx, values);
        }
    }

    /// Uploads every value whose name the program uses, in declaration order.
    pub fn upload(&self, ctx: &mut UploadContext<'_>, values: &UniformValues) {
        self.upload_sequence(ctx, &self.seq, values);
    }

    /// Replays `seq` (from [`Self::seq_with_values`]) against `values`.
    /// Entries flagged `needs_update: Some(false)` are skipped.
    pub fn upload_sequence(&self, ctx: &mut UploadContext<'_>, seq: &[NodeIndex], values: &UniformValues) {
        for &index in seq {
            let Some(UniformNode {
                id: UniformId::Name(name),
                ..
            }) = self.node(index)
            else {
                continue;
            };
            if let Some(uniform) = values.get(name)
                && uniform.should_upload()
            {
                self.upload_node(ctx, index, &uniform.value);
            }
        }
    }

    fn upload_node(&self, ctx: &mut UploadContext<'_>, index: NodeIndex, value: &UniformValue) {
        let Some(node) = self.node(index) else {
            return;
        };
        match &node.kind {
            NodeKind::Leaf(leaf) => leaf.upload(ctx, value),
            NodeKind::Struct(s) => {
                for &child in &s.seq {
                    let Some(child_node) = self.node(child) else {
                        continue;
                    };
                    let member = match &child_node.id {
                        UniformId::Name(name) => value.member(name),
                        UniformId::Index(i) => value.element(*i),
                    };
                    match member {
                        Some(v) => self.upload_node(ctx, child, v),
                        None => trace!("No value for uniform member '{}'", child_node.id),
                    }
                }
            }
        }
    }
}

//! Renderable objects, cameras and scenes handed to the renderer.
//!
//! Transforms arrive pre-computed: the scene graph that produces
//! `world_matrix` lives outside this crate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Vec3};
use smallvec::SmallVec;

use super::geometry::Geometry;
use super::material::Material;
use crate::driver::DrawMode;
use crate::lights::SceneLights;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Primitive kind of a renderable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectKind {
    #[default]
    Mesh,
    Line,
    LineSegments,
    LineLoop,
    Points,
}

impl ObjectKind {
    #[must_use]
    pub const fn draw_mode(self) -> DrawMode {
        match self {
            Self::Mesh => DrawMode::Triangles,
            Self::Line => DrawMode::LineStrip,
            Self::LineSegments => DrawMode::Lines,
            Self::LineLoop => DrawMode::LineLoop,
            Self::Points => DrawMode::Points,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_line(self) -> bool {
        matches!(self, Self::Line | Self::LineSegments | Self::LineLoop)
    }
}

/// Bone palette of a skinned object. Matrices are final (bone world ×
/// inverse bind), computed by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    pub bone_matrices: Vec<Mat4>,
    pub bind_matrix: Mat4,
    pub bind_matrix_inverse: Mat4,
}

impl Skeleton {
    #[must_use]
    pub fn new(bone_matrices: Vec<Mat4>) -> Self {
        Self {
            bone_matrices,
            bind_matrix: Mat4::IDENTITY,
            bind_matrix_inverse: Mat4::IDENTITY,
        }
    }

    #[inline]
    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.bone_matrices.len()
    }
}

/// One drawable object.
#[derive(Debug)]
pub struct RenderObject {
    id: ObjectId,
    pub kind: ObjectKind,
    pub world_matrix: Mat4,
    pub geometry: Arc<Geometry>,
    /// One material, or one per geometry group.
    pub materials: SmallVec<[Arc<Material>; 1]>,
    pub render_order: i32,
    pub visible: bool,
    pub receive_shadow: bool,
    pub skeleton: Option<Skeleton>,
    pub morph_influences: Vec<f32>,
}

impl RenderObject {
    #[must_use]
    pub fn new(kind: ObjectKind, geometry: Arc<Geometry>, material: Arc<Material>) -> Self {
        let mut materials = SmallVec::new();
        materials.push(material);
        Self {
            id: ObjectId::next(),
            kind,
            world_matrix: Mat4::IDENTITY,
            geometry,
            materials,
            render_order: 0,
            visible: true,
            receive_shadow: false,
            skeleton: None,
            morph_influences: Vec::new(),
        }
    }

    #[must_use]
    pub fn mesh(geometry: Arc<Geometry>, material: Arc<Material>) -> Self {
        Self::new(ObjectKind::Mesh, geometry, material)
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[must_use]
    pub fn with_transform(mut self, world_matrix: Mat4) -> Self {
        self.world_matrix = world_matrix;
        self
    }

    /// World-space translation of the object.
    #[inline]
    #[must_use]
    pub fn world_position(&self) -> Vec3 {
        self.world_matrix.w_axis.truncate()
    }
}

// ─── Camera ───────────────────────────────────────────────────────────────────

static NEXT_CAMERA_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    id: u64,
    /// World → view.
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    /// World-space eye position.
    pub position: Vec3,
    pub far: f32,
}

impl Camera {
    #[must_use]
    pub fn new(view_matrix: Mat4, projection_matrix: Mat4, far: f32) -> Self {
        let position = view_matrix.inverse().w_axis.truncate();
        Self {
            id: NEXT_CAMERA_ID.fetch_add(1, Ordering::Relaxed),
            view_matrix,
            projection_matrix,
            position,
            far,
        }
    }

    /// Right-handed perspective camera looking from `eye` at `target`.
    #[must_use]
    pub fn perspective(fov_y_radians: f32, aspect: f32, near: f32, far: f32, eye: Vec3, target: Vec3) -> Self {
        Self::new(
            Mat4::look_at_rh(eye, target, Vec3::Y),
            Mat4::perspective_rh_gl(fov_y_radians, aspect, near, far),
            far,
        )
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Re-aims the camera; keeps its identity.
    pub fn set_view(&mut self, view_matrix: Mat4) {
        self.view_matrix = view_matrix;
        self.position = view_matrix.inverse().w_axis.truncate();
    }
}

// ─── Scene ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fog {
    Linear { color: Vec3, near: f32, far: f32 },
    Exp2 { color: Vec3, density: f32 },
}

impl Fog {
    #[must_use]
    pub fn color(&self) -> Vec3 {
        match self {
            Self::Linear { color, .. } | Self::Exp2 { color, .. } => *color,
        }
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    pub objects: Vec<RenderObject>,
    pub lights: SceneLights,
    pub fog: Option<Fog>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: RenderObject) -> ObjectId {
        let id = object.id();
        self.objects.push(object);
        id
    }
}

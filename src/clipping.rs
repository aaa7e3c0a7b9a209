//! Clipping Plane Projector
//!
//! Transforms clip planes into view space and composes the buffer behind the
//! `clippingPlanes` uniform.
//!
//! Planes are packed as 4 floats each (`normal.xyz`, `constant`). The
//! composed per-material buffer is `[global planes][local planes]`; the global
//! prefix is always copied from the already projected global buffer.
//!
//! `num_intersection` counts the local planes with AND semantics when the
//! material sets `clip_intersection`. The shader receives
//! `UNION_CLIPPING_PLANES = num_planes - num_intersection` so it knows where
//! OR-planes end, which is why both counts are part of the program key.
//!
//! # Cache contract
//!
//! [`Clipping::set_state`] with `from_cache = true` trusts the material's
//! cached local planes and skips re-projecting them. The caller must pass
//! `false` whenever the camera view matrix, the global plane set or the
//! material's local planes changed since the buffer was built.

use glam::{Mat3, Mat4, Vec3};

use crate::resources::{Camera, Material};
use crate::uniforms::{Uniform, UniformValue, UniformValues};

// ─── Plane ────────────────────────────────────────────────────────────────────

/// Plane `dot(normal, p) + constant = 0`. Points with a negative distance are
/// clipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub constant: f32,
}

impl Plane {
    #[must_use]
    pub const fn new(normal: Vec3, constant: f32) -> Self {
        Self { normal, constant }
    }

    /// Plane through `point` with the given (normalized) `normal`.
    #[must_use]
    pub fn from_normal_and_point(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal,
            constant: -point.dot(normal),
        }
    }

    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.constant
    }

    #[inline]
    #[must_use]
    pub fn coplanar_point(&self) -> Vec3 {
        self.normal * -self.constant
    }

    /// Transforms the plane by `matrix`. `normal_matrix` must be the inverse
    /// transpose of the upper 3×3 of `matrix`.
    #[must_use]
    pub fn apply_matrix4(&self, matrix: &Mat4, normal_matrix: &Mat3) -> Self {
        let reference = matrix.transform_point3(self.coplanar_point());
        let normal = (*normal_matrix * self.normal).normalize();
        Self {
            normal,
            constant: -reference.dot(normal),
        }
    }
}

/// Inverse transpose of the upper 3×3 of `matrix`.
#[must_use]
pub fn normal_matrix(matrix: &Mat4) -> Mat3 {
    Mat3::from_mat4(*matrix).inverse().transpose()
}

/// Writes `planes`, transformed by `view`, into `dst` starting at float
/// `offset`. `dst` grows to exactly `offset + 4 × planes.len()`; its capacity
/// never shrinks.
///
/// With `skip_transform` only the length is adjusted and the floats already
/// in `dst` are kept.
pub fn project_planes(planes: &[Plane], view: &Mat4, dst: &mut Vec<f32>, offset: usize, skip_transform: bool) {
    let flat_size = offset + planes.len() * 4;
    dst.resize(flat_size, 0.0);
    if skip_transform {
        return;
    }
    let view_normal = normal_matrix(view);
    for (plane, out) in planes.iter().zip(dst[offset..].chunks_exact_mut(4)) {
        let p = plane.apply_matrix4(view, &view_normal);
        out[..3].copy_from_slice(&p.normal.to_array());
        out[3] = p.constant;
    }
}

// ─── Clipping ─────────────────────────────────────────────────────────────────

/// Which buffer currently backs the uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Stale,
    Global,
    Material,
}

/// Per-context clipping state.
#[derive(Debug)]
pub struct Clipping {
    global: Vec<f32>,
    num_global_planes: usize,
    local_clipping_enabled: bool,
    rendering_shadows: bool,

    uniform: Vec<f32>,
    source: Source,
    needs_update: bool,

    num_planes: usize,
    num_intersection: usize,
}

impl Default for Clipping {
    fn default() -> Self {
        Self::new()
    }
}

impl Clipping {
    #[must_use]
    pub fn new() -> Self {
        Self {
            global: Vec::new(),
            num_global_planes: 0,
            local_clipping_enabled: false,
            rendering_shadows: false,
            uniform: Vec::new(),
            source: Source::Stale,
            needs_update: false,
            num_planes: 0,
            num_intersection: 0,
        }
    }

    /// Starts a frame: projects the global planes for `camera`. Returns whether
    /// clipping is in play this frame (or was in the previous one, so state
    /// still has to be cleared).
    pub fn init(&mut self, planes: &[Plane], local_clipping_enabled: bool, camera: &Camera) -> bool {
        let enabled = !planes.is_empty()
            || local_clipping_enabled
            || self.num_global_planes != 0
            || self.local_clipping_enabled;

        self.local_clipping_enabled = local_clipping_enabled;
        project_planes(planes, &camera.view_matrix, &mut self.global, 0, false);
        self.num_global_planes = planes.len();
        self.num_planes = planes.len();
        self.num_intersection = 0;

        if planes.is_empty() {
            self.source = Source::Stale;
        } else {
            self.uniform.clone_from(&self.global);
            self.source = Source::Global;
            self.needs_update = true;
        }
        enabled
    }

    /// Enters a shadow pass: global planes do not apply.
    pub fn begin_shadows(&mut self) {
        self.rendering_shadows = true;
        self.num_planes = 0;
        self.num_intersection = 0;
    }

    pub fn end_shadows(&mut self) {
        self.rendering_shadows = false;
        self.reset_global_state();
    }

    /// Plane counts [`Self::set_state`] would produce for `material`, without
    /// projecting anything.
    #[must_use]
    pub fn plane_counts(&self, material: &Material) -> (usize, usize) {
        let local = &material.clipping_planes;
        if self.uses_global_only(material) {
            let n = if self.rendering_shadows { 0 } else { self.num_global_planes };
            return (n, 0);
        }
        let n_global = if self.rendering_shadows { 0 } else { self.num_global_planes };
        let intersection = if material.clip_intersection { local.len() } else { 0 };
        (local.len() + n_global, intersection)
    }

    fn uses_global_only(&self, material: &Material) -> bool {
        !self.local_clipping_enabled
            || material.clipping_planes.is_empty()
            || (self.rendering_shadows && !material.clip_shadows)
    }

    /// Composes the uniform buffer for `material`.
    ///
    /// `cache` is the material's cached buffer (`[global][local]`), owned by
    /// its property bag. See the module docs for the `from_cache` contract.
    pub fn set_state(&mut self, material: &Material, camera: &Camera, cache: &mut Option<Vec<f32>>, from_cache: bool) {
        if self.uses_global_only(material) {
            if self.rendering_shadows {
                self.uniform.clear();
                self.source = Source::Stale;
                self.needs_update = false;
                self.num_planes = 0;
                self.num_intersection = 0;
            } else {
                self.reset_global_state();
            }
            return;
        }

        let planes = &material.clipping_planes;
        let n_global = if self.rendering_shadows { 0 } else { self.num_global_planes };
        let l_global = n_global * 4;
        let dst = cache.get_or_insert_with(Vec::new);

        let cached = from_cache && dst.len() == l_global + planes.len() * 4;
        project_planes(planes, &camera.view_matrix, dst, l_global, cached);
        dst[..l_global].copy_from_slice(&self.global[..l_global]);

        self.uniform.clone_from(dst);
        self.source = Source::Material;
        self.needs_update = true;
        self.num_intersection = if material.clip_intersection { planes.len() } else { 0 };
        self.num_planes = planes.len() + n_global;
    }

    fn reset_global_state(&mut self) {
        if self.source != Source::Global {
            self.uniform.clone_from(&self.global);
            self.source = Source::Global;
            self.needs_update = self.num_global_planes > 0;
        }
        self.num_planes = self.num_global_planes;
        self.num_intersection = 0;
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn num_planes(&self) -> usize {
        self.num_planes
    }

    #[inline]
    #[must_use]
    pub fn num_intersection(&self) -> usize {
        self.num_intersection
    }

    #[inline]
    #[must_use]
    pub fn num_global_planes(&self) -> usize {
        self.num_global_planes
    }

    #[inline]
    #[must_use]
    pub fn local_clipping_enabled(&self) -> bool {
        self.local_clipping_enabled
    }

    /// Current contents of the `clippingPlanes` uniform.
    #[inline]
    #[must_use]
    pub fn uniform(&self) -> &[f32] {
        &self.uniform
    }

    #[inline]
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Writes the `clippingPlanes` entry into `values`, reusing its buffer.
    pub fn write_uniform(&self, values: &mut UniformValues) {
        let needs_update = Some(self.needs_update);
        match values.get_mut("clippingPlanes") {
            Some(Uniform {
                value: UniformValue::Floats(buf),
                needs_update: flag,
            }) => {
                buf.clone_from(&self.uniform);
                *flag = needs_update;
            }
            _ => values.insert(
                "clippingPlanes",
                Uniform {
                    value: UniformValue::Floats(self.uniform.clone()),
                    needs_update,
                },
            ),
        }
    }
}

//! Material Properties
//!
//! Renderer-side state kept per material, keyed by [`MaterialId`]:
//!
//! - the resolved [`ProgramHandle`]s, one per object variant, with the
//!   [`ProgramFingerprint`] each was resolved for,
//! - the cached `[global][local]` clipping plane buffer,
//! - the material's uniform values and, per program, the upload sequence
//!   filtered against it.
//!
//! Materials themselves stay plain value bags; nothing here is visible to
//! them.

use rustc_hash::FxHashMap;

use crate::pipeline::{ProgramHandle, fx_hash_key};
use crate::resources::{Material, MaterialId, RenderObject};
use crate::uniforms::{NodeIndex, UniformValues};

/// Cheap stand-in for the program cache key.
///
/// While the fingerprint of a draw matches the one stored with the material,
/// the cached program is reused without building the key string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramFingerprint {
    pub material_version: u64,
    pub environment: u64,
    pub clipping: (usize, usize),
    /// Object-side inputs: bone count, morph streams, shadow receiving.
    pub object_variant: u64,
}

impl ProgramFingerprint {
    #[must_use]
    pub fn new(
        material: &Material,
        object: &RenderObject,
        environment: u64,
        clipping: (usize, usize),
    ) -> Self {
        let bones = match &object.skeleton {
            Some(skeleton) if material.skinning => skeleton.bone_count(),
            _ => 0,
        };
        let geometry = &object.geometry;
        Self {
            material_version: material.version(),
            environment,
            clipping,
            object_variant: fx_hash_key(&(
                bones,
                geometry.morph_positions.is_empty(),
                geometry.morph_normals.is_empty(),
                object.receive_shadow,
            )),
        }
    }
}

/// Program resolved for one object variant of a material, with the upload
/// order of the material uniforms through it.
#[derive(Debug)]
pub struct ProgramSlot {
    pub fingerprint: ProgramFingerprint,
    pub handle: ProgramHandle,
    pub sequence: Vec<NodeIndex>,
    /// Size of the uniform bag `sequence` was built from; `None` until built.
    pub sequence_len: Option<usize>,
}

impl ProgramSlot {
    #[must_use]
    pub fn new(fingerprint: ProgramFingerprint, handle: ProgramHandle) -> Self {
        Self {
            fingerprint,
            handle,
            sequence: Vec::new(),
            sequence_len: None,
        }
    }

    /// Whether `sequence` must be rebuilt before uploading a bag of `len`
    /// uniforms.
    #[inline]
    #[must_use]
    pub fn sequence_is_stale(&self, len: usize) -> bool {
        self.sequence_len != Some(len)
    }
}

/// Everything the renderer remembers about one material.
///
/// A material shared by objects that need different programs (shadow
/// receivers and non-receivers, skeletons of different sizes, morphed and
/// static geometry) holds one [`ProgramSlot`] per object variant, so the
/// variants never evict each other.
#[derive(Debug, Default)]
pub struct MaterialState {
    /// Slots keyed by [`ProgramFingerprint::object_variant`].
    pub programs: FxHashMap<u64, ProgramSlot>,
    /// Variant resolved most recently.
    pub current: Option<u64>,

    /// `[global][local]` plane buffer built by the clipping projector.
    pub clipping_cache: Option<Vec<f32>>,
    /// `(frame, material version)` the clipping cache was built for.
    pub clipping_stamp: Option<(u64, u64)>,

    pub uniforms: UniformValues,
}

impl MaterialState {
    /// Cached program able to serve `fingerprint`, if any.
    #[inline]
    #[must_use]
    pub fn program_matching(&self, fingerprint: &ProgramFingerprint) -> Option<ProgramHandle> {
        self.programs
            .get(&fingerprint.object_variant)
            .filter(|slot| slot.fingerprint == *fingerprint)
            .map(|slot| slot.handle)
    }

    /// Program of the variant resolved most recently.
    #[must_use]
    pub fn program(&self) -> Option<ProgramHandle> {
        self.programs.get(&self.current?).map(|slot| slot.handle)
    }

    /// Every program handle held by this material.
    pub fn handles(&self) -> impl Iterator<Item = ProgramHandle> + '_ {
        self.programs.values().map(|slot| slot.handle)
    }
}

#[derive(Debug, Default)]
pub struct MaterialProperties {
    map: FxHashMap<MaterialId, MaterialState>,
}

impl MaterialProperties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: MaterialId) -> Option<&MaterialState> {
        self.map.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut MaterialState> {
        self.map.get_mut(&id)
    }

    /// The state of `id`, created empty on first use.
    pub fn entry(&mut self, id: MaterialId) -> &mut MaterialState {
        self.map.entry(id).or_default()
    }

    pub fn remove(&mut self, id: MaterialId) -> Option<MaterialState> {
        self.map.remove(&id)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, id: MaterialId) -> bool {
        self.map.contains_key(&id)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::resources::Geometry;

    #[test]
    fn test_fingerprint_tracks_material_version() {
        let mut material = Material::phong();
        let object = RenderObject::mesh(Arc::new(Geometry::new()), Arc::new(Material::basic()));

        let before = ProgramFingerprint::new(&material, &object, 7, (0, 0));
        assert_eq!(before, ProgramFingerprint::new(&material, &object, 7, (0, 0)));

        material.needs_update();
        let after = ProgramFingerprint::new(&material, &object, 7, (0, 0));
        assert_ne!(before, after);
        assert_ne!(after, ProgramFingerprint::new(&material, &object, 7, (1, 0)));
    }

    #[test]
    fn test_object_variants_keep_separate_slots() {
        let material = Material::lambert();
        let receiver = RenderObject::mesh(Arc::new(Geometry::new()), Arc::new(Material::basic()));
        let mut plain = RenderObject::mesh(Arc::new(Geometry::new()), Arc::new(Material::basic()));
        plain.receive_shadow = !receiver.receive_shadow;

        let a = ProgramFingerprint::new(&material, &receiver, 7, (0, 0));
        let b = ProgramFingerprint::new(&material, &plain, 7, (0, 0));
        assert_ne!(a.object_variant, b.object_variant);

        let mut handles = slotmap::SlotMap::<ProgramHandle, ()>::with_key();
        let (ha, hb) = (handles.insert(()), handles.insert(()));

        let mut state = MaterialState::default();
        state.programs.insert(a.object_variant, ProgramSlot::new(a, ha));
        state.programs.insert(b.object_variant, ProgramSlot::new(b, hb));
        state.current = Some(b.object_variant);

        assert_eq!(state.program_matching(&a), Some(ha));
        assert_eq!(state.program_matching(&b), Some(hb));
        assert_eq!(state.program(), Some(hb));
        assert_eq!(state.handles().count(), 2);

        let moved = ProgramFingerprint::new(&material, &receiver, 8, (0, 0));
        assert_eq!(state.program_matching(&moved), None);
    }

    #[test]
    fn test_entry_creates_once() {
        let mut properties = MaterialProperties::new();
        let id = Material::basic().id();
        properties.entry(id).clipping_stamp = Some((1, 0));
        assert_eq!(properties.entry(id).clipping_stamp, Some((1, 0)));
        assert_eq!(properties.len(), 1);
        assert!(properties.get(id).is_some_and(|s| s.program().is_none()));
        assert!(properties.remove(id).is_some());
        assert!(properties.is_empty());
    }
}

//! Program Parameters
//!
//! [`ProgramParameters`] is the feature fingerprint of one draw: every flag
//! and count that changes generated shader source. Its [`Display`] form is
//! the program cache key. Uniform *data* (colors, factors, intensities) is
//! never part of it, so materials that differ only in values share a program.
//!
//! Inputs come from three places:
//!
//! | Source                | Examples                                            |
//! |-----------------------|-----------------------------------------------------|
//! | Material              | maps, vertex colors, side, alpha test, defines      |
//! | Object / geometry     | skinning bone budget, morph targets                 |
//! | [`FrameEnvironment`]  | light counts, fog, tone mapping, output encoding    |
//!
//! plus the active clipping plane counts and the driver capabilities.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bitflags::bitflags;
use log::warn;

use super::ShaderTemplate;
use super::chunks::{ChunkResolver, TemplateContext};
use crate::driver::{DriverCapabilities, Extensions, Precision};
use crate::lights::LightCounts;
use crate::resources::{
    Combine, CustomShader, DepthPacking, Encoding, EnvMapMode, Fog, Material, MaterialKind, MaterialMaps, RenderObject,
    Side, Skeleton, VertexColors,
};
use crate::settings::{RendererSettings, ShadowMapKind, ShadowMapSettings, ToneMapping};

/// Compute a `u64` hash of any `Hash`-able value using `FxHasher`.
#[inline]
pub fn fx_hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

// ─── Map features ─────────────────────────────────────────────────────────────

bitflags! {
    /// Which texture maps a material supplies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MapFeatures: u32 {
        const MAP              = 1 << 0;
        const ALPHA_MAP        = 1 << 1;
        const LIGHT_MAP        = 1 << 2;
        const AO_MAP           = 1 << 3;
        const EMISSIVE_MAP     = 1 << 4;
        const BUMP_MAP         = 1 << 5;
        const NORMAL_MAP       = 1 << 6;
        const DISPLACEMENT_MAP = 1 << 7;
        const SPECULAR_MAP     = 1 << 8;
        const ROUGHNESS_MAP    = 1 << 9;
        const METALNESS_MAP    = 1 << 10;
        const ENV_MAP          = 1 << 11;
    }
}

impl MapFeatures {
    #[must_use]
    pub fn from_maps(maps: &MaterialMaps) -> Self {
        let mut features = Self::empty();
        for (present, flag) in [
            (maps.map.is_some(), Self::MAP),
            (maps.alpha_map.is_some(), Self::ALPHA_MAP),
            (maps.light_map.is_some(), Self::LIGHT_MAP),
            (maps.ao_map.is_some(), Self::AO_MAP),
            (maps.emissive_map.is_some(), Self::EMISSIVE_MAP),
            (maps.bump_map.is_some(), Self::BUMP_MAP),
            (maps.normal_map.is_some(), Self::NORMAL_MAP),
            (maps.displacement_map.is_some(), Self::DISPLACEMENT_MAP),
            (maps.specular_map.is_some(), Self::SPECULAR_MAP),
            (maps.roughness_map.is_some(), Self::ROUGHNESS_MAP),
            (maps.metalness_map.is_some(), Self::METALNESS_MAP),
            (maps.env_map.is_some(), Self::ENV_MAP),
        ] {
            features.set(flag, present);
        }
        features
    }

    /// Any map that samples with the shared `vUv` coordinates.
    #[must_use]
    pub fn uses_uv(self) -> bool {
        self.intersects(
            Self::MAP
                | Self::ALPHA_MAP
                | Self::BUMP_MAP
                | Self::NORMAL_MAP
                | Self::DISPLACEMENT_MAP
                | Self::SPECULAR_MAP
                | Self::EMISSIVE_MAP
                | Self::ROUGHNESS_MAP
                | Self::METALNESS_MAP,
        )
    }

    /// Maps sampled with the secondary `uv2` coordinates.
    #[must_use]
    pub fn uses_uv2(self) -> bool {
        self.intersects(Self::LIGHT_MAP | Self::AO_MAP)
    }
}

// ─── Frame environment ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FogKind {
    Linear,
    Exp2,
}

impl From<&Fog> for FogKind {
    fn from(fog: &Fog) -> Self {
        match fog {
            Fog::Linear { .. } => Self::Linear,
            Fog::Exp2 { .. } => Self::Exp2,
        }
    }
}

/// Per-frame inputs shared by every program of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameEnvironment {
    pub lights: LightCounts,
    pub fog: Option<FogKind>,
    pub precision: Precision,
    pub tone_mapping: ToneMapping,
    pub output_encoding: Encoding,
    pub gamma_factor: f32,
    pub physically_correct_lights: bool,
    pub shadow_map: ShadowMapSettings,
    pub logarithmic_depth_buffer: bool,
}

impl FrameEnvironment {
    #[must_use]
    pub fn new(settings: &RendererSettings, lights: LightCounts, fog: Option<&Fog>) -> Self {
        Self {
            lights,
            fog: fog.map(FogKind::from),
            precision: settings.precision,
            tone_mapping: settings.tone_mapping,
            output_encoding: settings.output_encoding,
            gamma_factor: settings.gamma_factor,
            physically_correct_lights: settings.physically_correct_lights,
            shadow_map: settings.shadow_map,
            logarithmic_depth_buffer: settings.logarithmic_depth_buffer,
        }
    }

    /// Cheap fingerprint; equal environments hash equal.
    #[must_use]
    pub fn hash(&self) -> u64 {
        fx_hash_key(&(
            self.lights,
            self.fog,
            self.precision,
            self.tone_mapping,
            self.output_encoding,
            self.gamma_factor.to_bits(),
            self.physically_correct_lights,
            self.shadow_map,
            self.logarithmic_depth_buffer,
        ))
    }
}

// ─── Bones ────────────────────────────────────────────────────────────────────

/// Number of bone matrices the vertex stage can hold for `skeleton`, or 0 when
/// the skeleton does not fit the uniform budget (the object then renders
/// without skinning).
#[must_use]
pub fn allocate_bones(skeleton: Option<&Skeleton>, capabilities: &DriverCapabilities) -> u32 {
    let Some(skeleton) = skeleton else {
        return 0;
    };
    // 20 vectors are reserved for the standard matrices and friends.
    let available = capabilities.max_vertex_uniforms.saturating_sub(20) / 4;
    let bones = skeleton.bone_count() as u32;
    if bones > available {
        warn!("Skeleton has {bones} bones, this driver supports {available}; rendering without skinning");
        return 0;
    }
    bones
}

// ─── ProgramParameters ────────────────────────────────────────────────────────

/// Every input that changes the generated source of a program.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramParameters {
    pub template: ShaderTemplate,
    pub shader_name: String,
    pub custom: Option<Arc<CustomShader>>,
    pub custom_hash: u64,

    pub precision: Precision,
    pub vertex_textures: bool,
    /// Extensions the generated source enables.
    pub extensions: Extensions,

    pub maps: MapFeatures,
    pub map_encoding: Encoding,
    pub emissive_map_encoding: Encoding,
    pub env_map_encoding: Encoding,
    pub output_encoding: Encoding,
    pub env_map_mode: EnvMapMode,
    pub combine: Combine,

    pub vertex_colors: VertexColors,
    pub flat_shading: bool,
    pub fog: Option<FogKind>,
    pub skinning: bool,
    pub max_bones: u32,
    pub morph_targets: bool,
    pub morph_normals: bool,
    pub double_sided: bool,
    pub flip_sided: bool,

    pub lights: LightCounts,
    pub num_clipping_planes: u32,
    pub num_clip_intersection: u32,
    pub shadow_map_enabled: bool,
    pub shadow_map_kind: ShadowMapKind,
    pub tone_mapping: ToneMapping,
    pub physically_correct_lights: bool,

    pub premultiplied_alpha: bool,
    pub alpha_test: bool,
    pub dithering: bool,
    pub gamma_factor: f32,
    pub size_attenuation: bool,
    pub depth_packing: DepthPacking,
    pub logarithmic_depth_buffer: bool,

    pub index0_attribute_name: Option<String>,
    pub defines: BTreeMap<String, String>,
}

impl ProgramParameters {
    /// Fingerprints `material` drawn on `object` in `env`.
    ///
    /// `clipping` is `(num_planes, num_intersection)` as reported by
    /// [`Clipping::plane_counts`](crate::clipping::Clipping::plane_counts).
    #[must_use]
    pub fn new(
        material: &Material,
        object: &RenderObject,
        env: &FrameEnvironment,
        clipping: (usize, usize),
        capabilities: &DriverCapabilities,
    ) -> Self {
        let kind = &material.kind;
        let maps = &material.maps;
        let geometry = &object.geometry;
        let vertex_textures = capabilities.vertex_textures();

        let mut features = MapFeatures::from_maps(maps);
        if !vertex_textures {
            features.remove(MapFeatures::DISPLACEMENT_MAP);
        }

        let max_bones = if material.skinning {
            allocate_bones(object.skeleton.as_ref(), capabilities)
        } else {
            0
        };
        let morph_targets = material.morph_targets && !geometry.morph_positions.is_empty();
        let morph_normals = morph_targets && material.morph_normals && !geometry.morph_normals.is_empty();

        let precision = capabilities.max_precision(material.precision.unwrap_or(env.precision));

        let mut extensions = Extensions::empty();
        if material.flat_shading || features.intersects(MapFeatures::NORMAL_MAP | MapFeatures::BUMP_MAP) {
            extensions |= Extensions::STANDARD_DERIVATIVES;
        }
        if env.logarithmic_depth_buffer {
            extensions |= Extensions::FRAG_DEPTH;
        }
        if features.contains(MapFeatures::ENV_MAP) {
            extensions |= Extensions::SHADER_TEXTURE_LOD;
        }
        extensions &= capabilities.extensions;

        let (custom, custom_hash) = match kind {
            MaterialKind::Custom(shader) => (Some(Arc::clone(shader)), ChunkResolver::source_hash(shader)),
            _ => (None, 0),
        };
        let shader_name = match kind {
            MaterialKind::Custom(shader) => shader.name.clone(),
            _ => kind.template().name().to_owned(),
        };

        let encoding = |t: &Option<crate::resources::TextureRef>| t.map_or(Encoding::Linear, |t| t.encoding);

        Self {
            template: kind.template(),
            shader_name,
            custom,
            custom_hash,
            precision,
            vertex_textures,
            extensions,
            maps: features,
            map_encoding: encoding(&maps.map),
            emissive_map_encoding: encoding(&maps.emissive_map),
            env_map_encoding: encoding(&maps.env_map),
            output_encoding: env.output_encoding,
            env_map_mode: material.env_map_mode,
            combine: material.combine,
            vertex_colors: material.vertex_colors,
            flat_shading: material.flat_shading,
            fog: if material.fog { env.fog } else { None },
            skinning: max_bones > 0,
            max_bones,
            morph_targets,
            morph_normals,
            double_sided: material.side == Side::Double,
            flip_sided: material.side == Side::Back,
            lights: if kind.is_lit() { env.lights } else { LightCounts::default() },
            num_clipping_planes: clipping.0 as u32,
            num_clip_intersection: clipping.1 as u32,
            shadow_map_enabled: env.shadow_map.enabled && object.receive_shadow,
            shadow_map_kind: env.shadow_map.kind,
            tone_mapping: if material.tone_mapped { env.tone_mapping } else { ToneMapping::None },
            physically_correct_lights: env.physically_correct_lights,
            premultiplied_alpha: material.premultiplied_alpha,
            alpha_test: material.alpha_test > 0.0,
            dithering: material.dithering,
            gamma_factor: env.gamma_factor,
            size_attenuation: matches!(kind, MaterialKind::Points { size_attenuation: true }),
            depth_packing: match kind {
                MaterialKind::Depth { packing } => *packing,
                _ => DepthPacking::Basic,
            },
            logarithmic_depth_buffer: env.logarithmic_depth_buffer,
            index0_attribute_name: material.index0_attribute_name.clone(),
            defines: material.defines.clone(),
        }
    }

    /// The program cache key.
    #[must_use]
    pub fn cache_key(&self) -> String {
        self.to_string()
    }

    /// Counts handed to the template engine.
    #[must_use]
    pub fn template_context(&self) -> TemplateContext {
        let num_morph_targets = match (self.morph_targets, self.morph_normals) {
            (false, _) => 0,
            (true, false) => 8,
            (true, true) => 4,
        };
        TemplateContext {
            num_dir_lights: self.lights.directional,
            num_point_lights: self.lights.point,
            num_spot_lights: self.lights.spot,
            num_hemi_lights: self.lights.hemisphere,
            num_clipping_planes: self.num_clipping_planes,
            union_clipping_planes: self.num_clipping_planes - self.num_clip_intersection,
            num_morph_targets,
            num_morph_normals: if self.morph_normals { 4 } else { 0 },
        }
    }
}

impl fmt::Display for ProgramParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.custom {
            Some(_) => write!(f, "custom:{:016x}", self.custom_hash)?,
            None => f.write_str(self.template.name())?,
        }
        for (name, value) in &self.defines {
            write!(f, ";{name}={value}")?;
        }
        write!(
            f,
            "|{:?}|{}|{:x}|{:x}",
            self.precision, self.vertex_textures, self.extensions.bits(), self.maps.bits()
        )?;
        write!(
            f,
            "|{}{}{}{}",
            self.map_encoding.tag(),
            self.emissive_map_encoding.tag(),
            self.env_map_encoding.tag(),
            self.output_encoding.tag()
        )?;
        write!(
            f,
            "|{:?}|{:?}|{:?}|{}|{:?}",
            self.env_map_mode, self.combine, self.vertex_colors, self.flat_shading, self.fog
        )?;
        write!(
            f,
            "|{}|{}|{}|{}|{}|{}",
            self.skinning, self.max_bones, self.morph_targets, self.morph_normals, self.double_sided, self.flip_sided
        )?;
        let l = &self.lights;
        write!(
            f,
            "|{},{},{},{}|{},{}",
            l.directional, l.point, l.spot, l.hemisphere, self.num_clipping_planes, self.num_clip_intersection
        )?;
        write!(
            f,
            "|{}|{:?}|{:?}|{}",
            self.shadow_map_enabled, self.shadow_map_kind, self.tone_mapping, self.physically_correct_lights
        )?;
        write!(
            f,
            "|{}|{}|{}|{}|{}|{:?}|{}",
            self.premultiplied_alpha,
            self.alpha_test,
            self.dithering,
            self.gamma_factor,
            self.size_attenuation,
            self.depth_packing,
            self.logarithmic_depth_buffer
        )?;
        if let Some(name) = &self.index0_attribute_name {
            write!(f, "|index0={name}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    use crate::resources::Geometry;

    fn env() -> FrameEnvironment {
        FrameEnvironment::new(&RendererSettings::default(), LightCounts::default(), None)
    }

    fn params(material: Material) -> ProgramParameters {
        let object = RenderObject::mesh(Arc::new(Geometry::new()), Arc::new(Material::basic()));
        ProgramParameters::new(&material, &object, &env(), (0, 0), &DriverCapabilities::default())
    }

    #[test]
    fn test_uniform_values_do_not_change_key() {
        let a = params(Material::phong().with_color(Vec3::X));
        let mut m = Material::phong().with_color(Vec3::Y);
        m.shininess = 3.0;
        m.opacity = 0.5;
        let b = params(m);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_feature_flags_change_key() {
        let a = params(Material::phong());
        let mut m = Material::phong();
        m.flat_shading = true;
        let b = params(m);
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_lights_only_count_for_lit_kinds() {
        let lights = LightCounts {
            directional: 2,
            ..LightCounts::default()
        };
        let env = FrameEnvironment::new(&RendererSettings::default(), lights, None);
        let object = RenderObject::mesh(Arc::new(Geometry::new()), Arc::new(Material::basic()));
        let caps = DriverCapabilities::default();

        let basic = ProgramParameters::new(&Material::basic(), &object, &env, (0, 0), &caps);
        let lambert = ProgramParameters::new(&Material::lambert(), &object, &env, (0, 0), &caps);
        assert_eq!(basic.lights.directional, 0);
        assert_eq!(lambert.lights.directional, 2);
    }

    #[test]
    fn test_bone_overflow_disables_skinning() {
        let caps = DriverCapabilities {
            max_vertex_uniforms: 128,
            ..DriverCapabilities::default()
        };
        let small = Skeleton::new(vec![Mat4::IDENTITY; 20]);
        let large = Skeleton::new(vec![Mat4::IDENTITY; 40]);
        assert_eq!(allocate_bones(Some(&small), &caps), 20);
        assert_eq!(allocate_bones(Some(&large), &caps), 0);
        assert_eq!(allocate_bones(None, &caps), 0);
    }

    #[test]
    fn test_clipping_split_reaches_template() {
        let object = RenderObject::mesh(Arc::new(Geometry::new()), Arc::new(Material::basic()));
        let p = ProgramParameters::new(&Material::basic(), &object, &env(), (3, 1), &DriverCapabilities::default());
        let ctx = p.template_context();
        assert_eq!(ctx.num_clipping_planes, 3);
        assert_eq!(ctx.union_clipping_planes, 2);
    }
}

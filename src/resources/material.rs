//! Materials
//!
//! A [`Material`] is a flag/value bag: uniform-valued properties (colors,
//! scalars, textures), render-state flags consumed by
//! [`GpuState::set_material`](crate::state::GpuState::set_material), and
//! feature flags that select shader variants.
//!
//! The material kind is an explicit enum, [`MaterialKind`]; each kind maps to
//! a shader template through a fixed table ([`MaterialKind::template`]).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat3, Vec2, Vec3};
use wgpu::{BlendState, CompareFunction, StencilOperation};

use super::texture::TextureRef;
use crate::clipping::Plane;
use crate::driver::Precision;
use crate::pipeline::ShaderTemplate;
use crate::uniforms::{UniformValue, UniformValues};

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique material identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u64);

impl MaterialId {
    fn next() -> Self {
        Self(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// ─── Enums ────────────────────────────────────────────────────────────────────

/// Which faces of a triangle are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

/// Blending preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Blending {
    None,
    #[default]
    Normal,
    Additive,
    Subtractive,
    Multiply,
    /// Uses [`Material::blend_state`].
    Custom,
}

/// Per-vertex color source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexColors {
    #[default]
    None,
    Rgb,
    Rgba,
}

/// Output packing of the depth material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthPacking {
    #[default]
    Basic,
    Rgba,
}

/// How the environment map is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnvMapMode {
    #[default]
    Reflection,
    Refraction,
}

/// How the environment sample combines with the surface color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Combine {
    #[default]
    Multiply,
    Mix,
    Add,
}

// ─── Kinds ────────────────────────────────────────────────────────────────────

/// User-authored shader pair. Both sources are templates and may include
/// library chunks (`{$ include "common" $}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomShader {
    pub name: String,
    pub vertex: String,
    pub fragment: String,
    /// Receive scene light uniforms and light-count defines.
    pub lights: bool,
}

/// Material kind and its kind-specific feature flags.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialKind {
    Basic,
    Lambert,
    Phong,
    Standard,
    Points { size_attenuation: bool },
    LineBasic,
    LineDashed,
    Depth { packing: DepthPacking },
    Normal,
    Custom(Arc<CustomShader>),
}

/// Kind → template lookup, indexed by [`MaterialKind::index`].
const TEMPLATES: [ShaderTemplate; 10] = [
    ShaderTemplate::Basic,
    ShaderTemplate::Lambert,
    ShaderTemplate::Phong,
    ShaderTemplate::Standard,
    ShaderTemplate::Points,
    ShaderTemplate::Basic,
    ShaderTemplate::Dashed,
    ShaderTemplate::Depth,
    ShaderTemplate::Normal,
    ShaderTemplate::Custom,
];

impl MaterialKind {
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Basic => 0,
            Self::Lambert => 1,
            Self::Phong => 2,
            Self::Standard => 3,
            Self::Points { .. } => 4,
            Self::LineBasic => 5,
            Self::LineDashed => 6,
            Self::Depth { .. } => 7,
            Self::Normal => 8,
            Self::Custom(_) => 9,
        }
    }

    #[inline]
    #[must_use]
    pub const fn template(&self) -> ShaderTemplate {
        TEMPLATES[self.index()]
    }

    /// Kinds that consume scene lights.
    #[must_use]
    pub fn is_lit(&self) -> bool {
        match self {
            Self::Lambert | Self::Phong | Self::Standard => true,
            Self::Custom(shader) => shader.lights,
            _ => false,
        }
    }
}

// ─── Maps & stencil ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialMaps {
    pub map: Option<TextureRef>,
    pub alpha_map: Option<TextureRef>,
    pub light_map: Option<TextureRef>,
    pub ao_map: Option<TextureRef>,
    pub emissive_map: Option<TextureRef>,
    pub bump_map: Option<TextureRef>,
    pub normal_map: Option<TextureRef>,
    pub displacement_map: Option<TextureRef>,
    pub specular_map: Option<TextureRef>,
    pub roughness_map: Option<TextureRef>,
    pub metalness_map: Option<TextureRef>,
    pub env_map: Option<TextureRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilSettings {
    /// Enables the stencil test and the settings below.
    pub write: bool,
    pub func: CompareFunction,
    pub reference: i32,
    pub func_mask: u32,
    pub write_mask: u32,
    pub fail: StencilOperation,
    pub depth_fail: StencilOperation,
    pub pass: StencilOperation,
}

impl Default for StencilSettings {
    fn default() -> Self {
        Self {
            write: false,
            func: CompareFunction::Always,
            reference: 0,
            func_mask: 0xFF,
            write_mask: 0xFF,
            fail: StencilOperation::Keep,
            depth_fail: StencilOperation::Keep,
            pass: StencilOperation::Keep,
        }
    }
}

// ─── Material ─────────────────────────────────────────────────────────────────

/// Flag/value bag describing how a surface is shaded.
///
/// Cloning yields a new material with a fresh [`MaterialId`].
/// Call [`Material::needs_update`] after changing a feature flag so the
/// renderer re-resolves the program; uniform-valued properties can be changed
/// freely.
#[derive(Debug)]
pub struct Material {
    id: MaterialId,
    version: u64,
    pub name: String,
    pub kind: MaterialKind,
    pub visible: bool,

    // Uniform data
    pub color: Vec3,
    pub opacity: f32,
    pub emissive: Vec3,
    pub emissive_intensity: f32,
    pub specular: Vec3,
    pub shininess: f32,
    pub roughness: f32,
    pub metalness: f32,
    pub reflectivity: f32,
    pub refraction_ratio: f32,
    pub env_map_intensity: f32,
    pub light_map_intensity: f32,
    pub ao_map_intensity: f32,
    pub bump_scale: f32,
    pub normal_scale: Vec2,
    pub displacement_scale: f32,
    pub displacement_bias: f32,
    /// Fragments with alpha below this are discarded; 0 disables the test.
    pub alpha_test: f32,
    pub size: f32,
    pub line_width: f32,
    pub dash_size: f32,
    pub gap_size: f32,
    pub dash_scale: f32,
    pub uv_transform: Mat3,
    pub maps: MaterialMaps,
    pub env_map_mode: EnvMapMode,
    pub combine: Combine,

    // Render state
    pub side: Side,
    pub transparent: bool,
    pub blending: Blending,
    pub blend_state: BlendState,
    pub premultiplied_alpha: bool,
    pub depth_func: CompareFunction,
    pub depth_test: bool,
    pub depth_write: bool,
    pub color_write: bool,
    pub stencil: StencilSettings,
    pub polygon_offset: bool,
    pub polygon_offset_factor: f32,
    pub polygon_offset_units: f32,

    // Feature flags
    pub vertex_colors: VertexColors,
    pub flat_shading: bool,
    pub fog: bool,
    pub skinning: bool,
    pub morph_targets: bool,
    pub morph_normals: bool,
    pub dithering: bool,
    pub tone_mapped: bool,
    pub precision: Option<Precision>,
    pub clipping_planes: Vec<Plane>,
    pub clip_intersection: bool,
    pub clip_shadows: bool,
    pub defines: BTreeMap<String, String>,
    pub index0_attribute_name: Option<String>,

    /// Extra uniforms uploaded alongside the built-in ones.
    pub uniforms: UniformValues,
}

impl Clone for Material {
    fn clone(&self) -> Self {
        Self {
            id: MaterialId::next(),
            version: 0,
            name: self.name.clone(),
            kind: self.kind.clone(),
            visible: self.visible,
            color: self.color,
            opacity: self.opacity,
            emissive: self.emissive,
            emissive_intensity: self.emissive_intensity,
            specular: self.specular,
            shininess: self.shininess,
            roughness: self.roughness,
            metalness: self.metalness,
            reflectivity: self.reflectivity,
            refraction_ratio: self.refraction_ratio,
            env_map_intensity: self.env_map_intensity,
            light_map_intensity: self.light_map_intensity,
            ao_map_intensity: self.ao_map_intensity,
            bump_scale: self.bump_scale,
            normal_scale: self.normal_scale,
            displacement_scale: self.displacement_scale,
            displacement_bias: self.displacement_bias,
            alpha_test: self.alpha_test,
            size: self.size,
            line_width: self.line_width,
            dash_size: self.dash_size,
            gap_size: self.gap_size,
            dash_scale: self.dash_scale,
            uv_transform: self.uv_transform,
            maps: self.maps.clone(),
            env_map_mode: self.env_map_mode,
            combine: self.combine,
            side: self.side,
            transparent: self.transparent,
            blending: self.blending,
            blend_state: self.blend_state,
            premultiplied_alpha: self.premultiplied_alpha,
            depth_func: self.depth_func,
            depth_test: self.depth_test,
            depth_write: self.depth_write,
            color_write: self.color_write,
            stencil: self.stencil,
            polygon_offset: self.polygon_offset,
            polygon_offset_factor: self.polygon_offset_factor,
            polygon_offset_units: self.polygon_offset_units,
            vertex_colors: self.vertex_colors,
            flat_shading: self.flat_shading,
            fog: self.fog,
            skinning: self.skinning,
            morph_targets: self.morph_targets,
            morph_normals: self.morph_normals,
            dithering: self.dithering,
            tone_mapped: self.tone_mapped,
            precision: self.precision,
            clipping_planes: self.clipping_planes.clone(),
            clip_intersection: self.clip_intersection,
            clip_shadows: self.clip_shadows,
            defines: self.defines.clone(),
            index0_attribute_name: self.index0_attribute_name.clone(),
            uniforms: self.uniforms.clone(),
        }
    }
}

impl Material {
    #[must_use]
    pub fn new(kind: MaterialKind) -> Self {
        let fog = !matches!(kind, MaterialKind::Depth { .. } | MaterialKind::Normal | MaterialKind::Custom(_));
        Self {
            id: MaterialId::next(),
            version: 0,
            name: String::new(),
            kind,
            visible: true,
            color: Vec3::ONE,
            opacity: 1.0,
            emissive: Vec3::ZERO,
            emissive_intensity: 1.0,
            specular: Vec3::splat(0.066_666_67),
            shininess: 30.0,
            roughness: 1.0,
            metalness: 0.0,
            reflectivity: 1.0,
            refraction_ratio: 0.98,
            env_map_intensity: 1.0,
            light_map_intensity: 1.0,
            ao_map_intensity: 1.0,
            bump_scale: 1.0,
            normal_scale: Vec2::ONE,
            displacement_scale: 1.0,
            displacement_bias: 0.0,
            alpha_test: 0.0,
            size: 1.0,
            line_width: 1.0,
            dash_size: 3.0,
            gap_size: 1.0,
            dash_scale: 1.0,
            uv_transform: Mat3::IDENTITY,
            maps: MaterialMaps::default(),
            env_map_mode: EnvMapMode::default(),
            combine: Combine::default(),
            side: Side::Front,
            transparent: false,
            blending: Blending::Normal,
            blend_state: BlendState::ALPHA_BLENDING,
            premultiplied_alpha: false,
            depth_func: CompareFunction::LessEqual,
            depth_test: true,
            depth_write: true,
            color_write: true,
            stencil: StencilSettings::default(),
            polygon_offset: false,
            polygon_offset_factor: 0.0,
            polygon_offset_units: 0.0,
            vertex_colors: VertexColors::None,
            flat_shading: false,
            fog,
            skinning: false,
            morph_targets: false,
            morph_normals: false,
            dithering: false,
            tone_mapped: true,
            precision: None,
            clipping_planes: Vec::new(),
            clip_intersection: false,
            clip_shadows: false,
            defines: BTreeMap::new(),
            index0_attribute_name: None,
            uniforms: UniformValues::new(),
        }
    }

    #[must_use]
    pub fn basic() -> Self {
        Self::new(MaterialKind::Basic)
    }

    #[must_use]
    pub fn lambert() -> Self {
        Self::new(MaterialKind::Lambert)
    }

    #[must_use]
    pub fn phong() -> Self {
        Self::new(MaterialKind::Phong)
    }

    #[must_use]
    pub fn standard() -> Self {
        Self::new(MaterialKind::Standard)
    }

    #[must_use]
    pub fn custom(shader: CustomShader) -> Self {
        Self::new(MaterialKind::Custom(Arc::new(shader)))
    }

    #[must_use]
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> MaterialId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Marks feature flags as changed; the program is re-resolved on the next
    /// draw.
    pub fn needs_update(&mut self) {
        self.version += 1;
    }

    /// Writes the kind's built-in uniforms into `out`, followed by
    /// [`Material::uniforms`].
    pub fn write_uniforms(&self, out: &mut UniformValues) {
        let maps = &self.maps;
        let tex = |t: &Option<TextureRef>| UniformValue::Texture(*t);

        out.set("opacity", self.opacity);

        match &self.kind {
            MaterialKind::Depth { .. } | MaterialKind::Normal => {
                out.set("displacementMap", tex(&maps.displacement_map));
                out.set("displacementScale", self.displacement_scale);
                out.set("displacementBias", self.displacement_bias);
                if matches!(self.kind, MaterialKind::Normal) {
                    out.set("normalMap", tex(&maps.normal_map));
                    out.set("normalScale", self.normal_scale);
                    out.set("bumpMap", tex(&maps.bump_map));
                    out.set("bumpScale", self.bump_scale);
                }
            }
            MaterialKind::Points { .. } => {
                out.set("diffuse", self.color);
                out.set("size", self.size);
                out.set("scale", 1.0_f32);
                out.set("map", tex(&maps.map));
                out.set("alphaMap", tex(&maps.alpha_map));
                out.set("uvTransform", self.uv_transform);
            }
            MaterialKind::LineBasic | MaterialKind::LineDashed => {
                out.set("diffuse", self.color);
                if matches!(self.kind, MaterialKind::LineDashed) {
                    out.set("dashSize", self.dash_size);
                    out.set("totalSize", self.dash_size + self.gap_size);
                    out.set("scale", self.dash_scale);
                }
            }
            _ => {
                out.set("diffuse", self.color);
                out.set("map", tex(&maps.map));
                out.set("uvTransform", self.uv_transform);
                out.set("alphaMap", tex(&maps.alpha_map));
                out.set("lightMap", tex(&maps.light_map));
                out.set("lightMapIntensity", self.light_map_intensity);
                out.set("aoMap", tex(&maps.ao_map));
                out.set("aoMapIntensity", self.ao_map_intensity);
                out.set("envMap", tex(&maps.env_map));
                out.set("flipEnvMap", -1.0_f32);
                out.set("reflectivity", self.reflectivity);
                out.set("refractionRatio", self.refraction_ratio);
                out.set("specularMap", tex(&maps.specular_map));
            }
        }

        if self.kind.is_lit() {
            out.set("emissive", self.emissive * self.emissive_intensity);
            out.set("emissiveMap", tex(&maps.emissive_map));
            out.set("bumpMap", tex(&maps.bump_map));
            out.set("bumpScale", self.bump_scale);
            out.set("normalMap", tex(&maps.normal_map));
            out.set("normalScale", self.normal_scale);
            out.set("displacementMap", tex(&maps.displacement_map));
            out.set("displacementScale", self.displacement_scale);
            out.set("displacementBias", self.displacement_bias);
        }

        match &self.kind {
            MaterialKind::Phong => {
                out.set("specular", self.specular);
                out.set("shininess", self.shininess.max(1e-4));
            }
            MaterialKind::Standard => {
                out.set("roughness", self.roughness);
                out.set("metalness", self.metalness);
                out.set("roughnessMap", tex(&maps.roughness_map));
                out.set("metalnessMap", tex(&maps.metalness_map));
                out.set("envMapIntensity", self.env_map_intensity);
            }
            _ => {}
        }

        if self.alpha_test > 0.0 {
            out.set("alphaTest", self.alpha_test);
        }

        out.extend_from(&self.uniforms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_gets_fresh_id() {
        let a = Material::basic();
        let b = a.clone();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_template_table() {
        assert_eq!(MaterialKind::LineBasic.template(), ShaderTemplate::Basic);
        assert_eq!(
            MaterialKind::Depth {
                packing: DepthPacking::Rgba
            }
            .template(),
            ShaderTemplate::Depth
        );
        assert!(MaterialKind::Phong.is_lit());
        assert!(!MaterialKind::Basic.is_lit());
    }

    #[test]
    fn test_phong_uniforms() {
        let mut m = Material::phong();
        m.shininess = 50.0;
        let mut values = UniformValues::new();
        m.write_uniforms(&mut values);
        assert_eq!(values.get("shininess").map(|u| &u.value), Some(&UniformValue::Float(50.0)));
        assert!(values.contains("emissive"));
        assert!(!values.contains("roughness"));
    }
}

//! Renderer Settings
//!
//! Configuration consumed by the [`Renderer`](crate::renderer::Renderer).
//! Settings that change generated shader source (tone mapping, output
//! encoding, shadow map kind, logarithmic depth, ...) feed the per-frame
//! [`FrameEnvironment`](crate::pipeline::FrameEnvironment) and therefore the
//! program cache key; the rest only affect the frame loop.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_gl::settings::{RendererSettings, ToneMapping};
//!
//! let settings = RendererSettings {
//!     tone_mapping: ToneMapping::AcesFilmic,
//!     local_clipping_enabled: true,
//!     ..Default::default()
//! };
//! ```

use glam::Vec4;

use crate::clipping::Plane;
use crate::driver::Precision;
use crate::resources::Encoding;

// ---------------------------------------------------------------------------
// Tone mapping & shadows
// ---------------------------------------------------------------------------

/// Tone mapping operator applied at the end of lit fragment shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToneMapping {
    #[default]
    None,
    Linear,
    Reinhard,
    Uncharted2,
    Cineon,
    AcesFilmic,
}

impl ToneMapping {
    /// Name of the GLSL operator function, `None` when disabled.
    #[must_use]
    pub const fn function_name(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Linear => Some("Linear"),
            Self::Reinhard => Some("Reinhard"),
            Self::Uncharted2 => Some("Uncharted2"),
            Self::Cineon => Some("OptimizedCineon"),
            Self::AcesFilmic => Some("ACESFilmic"),
        }
    }
}

/// Shadow map filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadowMapKind {
    Basic,
    #[default]
    Pcf,
    PcfSoft,
    Vsm,
}

impl ShadowMapKind {
    #[must_use]
    pub const fn define(self) -> &'static str {
        match self {
            Self::Basic => "SHADOWMAP_TYPE_BASIC",
            Self::Pcf => "SHADOWMAP_TYPE_PCF",
            Self::PcfSoft => "SHADOWMAP_TYPE_PCF_SOFT",
            Self::Vsm => "SHADOWMAP_TYPE_VSM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShadowMapSettings {
    pub enabled: bool,
    pub kind: ShadowMapKind,
}

// ---------------------------------------------------------------------------
// RendererSettings
// ---------------------------------------------------------------------------

/// Configuration of one renderer.
///
/// # Fields
///
/// | Field                        | Description                                      | Default        |
/// |------------------------------|--------------------------------------------------|----------------|
/// | `precision`                  | Requested shader float precision                 | `High`         |
/// | `sort_objects`               | Sort render lists before drawing                 | `true`         |
/// | `auto_clear`                 | Clear color/depth/stencil at frame start         | `true`         |
/// | `clear_color`                | Framebuffer clear color (RGBA)                   | (0, 0, 0, 1)   |
/// | `local_clipping_enabled`     | Honor per-material clipping planes               | `false`        |
/// | `clipping_planes`            | Global (scene-wide) clipping planes, world space | empty          |
/// | `tone_mapping`               | Tone mapping operator                            | `None`         |
/// | `tone_mapping_exposure`      | Exposure uniform                                 | `1.0`          |
/// | `tone_mapping_white_point`   | White point uniform (Uncharted2)                 | `1.0`          |
/// | `output_encoding`            | Encoding of the render target                    | `Linear`       |
/// | `gamma_factor`               | Gamma used by the `Gamma` encoding               | `2.0`          |
/// | `physically_correct_lights`  | Inverse-square light falloff                     | `false`        |
/// | `shadow_map`                 | Shadow receiving configuration                   | disabled, PCF  |
/// | `logarithmic_depth_buffer`   | Logarithmic depth in generated shaders           | `false`        |
/// | `check_shader_errors`        | Query compile/link status after linking          | `true`         |
/// | `front_face_cw`              | Clockwise front faces convention                 | `false`        |
#[derive(Debug, Clone, PartialEq)]
pub struct RendererSettings {
    // === Program generation ===
    pub precision: Precision,
    pub tone_mapping: ToneMapping,
    pub output_encoding: Encoding,
    pub gamma_factor: f32,
    pub physically_correct_lights: bool,
    pub shadow_map: ShadowMapSettings,
    pub logarithmic_depth_buffer: bool,

    /// When `false`, link status is trusted and logs are not queried.
    pub check_shader_errors: bool,

    // === Frame loop ===
    pub sort_objects: bool,
    pub auto_clear: bool,
    pub clear_color: Vec4,
    pub front_face_cw: bool,

    // === Uniform data ===
    pub tone_mapping_exposure: f32,
    pub tone_mapping_white_point: f32,

    // === Clipping ===
    pub local_clipping_enabled: bool,
    pub clipping_planes: Vec<Plane>,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            precision: Precision::High,
            tone_mapping: ToneMapping::None,
            output_encoding: Encoding::Linear,
            gamma_factor: 2.0,
            physically_correct_lights: false,
            shadow_map: ShadowMapSettings::default(),
            logarithmic_depth_buffer: false,
            check_shader_errors: true,
            sort_objects: true,
            auto_clear: true,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            front_face_cw: false,
            tone_mapping_exposure: 1.0,
            tone_mapping_white_point: 1.0,
            local_clipping_enabled: false,
            clipping_planes: Vec::new(),
        }
    }
}

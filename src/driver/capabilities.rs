//! Driver Capabilities
//!
//! Describes what the driver context supports: shader precision per stage,
//! optional extensions, and numeric limits. Consumed at program-compile time
//! to pick source branches and defines, and by the texture-unit allocator and
//! bone budget.

use bitflags::bitflags;
use log::warn;

// ─── Precision ────────────────────────────────────────────────────────────────

/// Floating-point precision qualifier emitted in the shader prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Precision {
    Low,
    Medium,
    #[default]
    High,
}

impl Precision {
    /// GLSL qualifier keyword.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "lowp",
            Self::Medium => "mediump",
            Self::High => "highp",
        }
    }
}

/// Which precisions one shader stage supports for floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecisionSupport {
    pub high: bool,
    pub medium: bool,
}

impl PrecisionSupport {
    pub const ALL: Self = Self {
        high: true,
        medium: true,
    };

    #[inline]
    #[must_use]
    pub fn supports(self, precision: Precision) -> bool {
        match precision {
            Precision::High => self.high,
            Precision::Medium => self.medium,
            Precision::Low => true,
        }
    }
}

// ─── Extensions ───────────────────────────────────────────────────────────────

bitflags! {
    /// Optional driver extensions the shader generator may rely on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Extensions: u32 {
        const STANDARD_DERIVATIVES       = 1 << 0;
        const FRAG_DEPTH                 = 1 << 1;
        const DRAW_BUFFERS               = 1 << 2;
        const SHADER_TEXTURE_LOD         = 1 << 3;
        const TEXTURE_FILTER_ANISOTROPIC = 1 << 4;
        const INSTANCED_ARRAYS           = 1 << 5;
        const ELEMENT_INDEX_UINT         = 1 << 6;
        const VERTEX_ARRAY_OBJECT        = 1 << 7;
    }
}

// ─── DriverCapabilities ───────────────────────────────────────────────────────

/// Static description of a driver context.
///
/// # Fields
///
/// | Field                  | Description                                 | Default |
/// |------------------------|---------------------------------------------|---------|
/// | `vertex_precision`     | Float precisions available to vertex code   | all     |
/// | `fragment_precision`   | Float precisions available to fragment code | all     |
/// | `extensions`           | Available optional extensions               | all     |
/// | `max_textures`         | Fragment texture image units                | 16      |
/// | `max_vertex_textures`  | Vertex texture image units                  | 16      |
/// | `max_attributes`       | Vertex attribute slots                      | 16      |
/// | `max_vertex_uniforms`  | Vertex uniform vectors                      | 1024    |
/// | `max_varyings`         | Varying vectors                             | 15      |
/// | `max_fragment_uniforms`| Fragment uniform vectors                    | 1024    |
/// | `max_anisotropy`       | Anisotropic filtering ceiling               | 16.0    |
#[derive(Debug, Clone, PartialEq)]
pub struct DriverCapabilities {
    pub vertex_precision: PrecisionSupport,
    pub fragment_precision: PrecisionSupport,
    pub extensions: Extensions,
    pub max_textures: u32,
    pub max_vertex_textures: u32,
    pub max_attributes: u32,
    pub max_vertex_uniforms: u32,
    pub max_varyings: u32,
    pub max_fragment_uniforms: u32,
    pub max_anisotropy: f32,
}

impl Default for DriverCapabilities {
    fn default() -> Self {
        Self {
            vertex_precision: PrecisionSupport::ALL,
            fragment_precision: PrecisionSupport::ALL,
            extensions: Extensions::all(),
            max_textures: 16,
            max_vertex_textures: 16,
            max_attributes: 16,
            max_vertex_uniforms: 1024,
            max_varyings: 15,
            max_fragment_uniforms: 1024,
            max_anisotropy: 16.0,
        }
    }
}

impl DriverCapabilities {
    /// Best precision not exceeding `requested` that both stages support.
    #[must_use]
    pub fn max_precision(&self, requested: Precision) -> Precision {
        let both = |p| self.vertex_precision.supports(p) && self.fragment_precision.supports(p);

        let resolved = [Precision::High, Precision::Medium]
            .into_iter()
            .filter(|p| *p <= requested)
            .find(|p| both(*p))
            .unwrap_or(Precision::Low);

        if resolved != requested {
            warn!(
                "{} not supported, using {} instead",
                requested.as_str(),
                resolved.as_str()
            );
        }
        resolved
    }

    /// Whether vertex shaders may sample textures (needed for displacement
    /// and float bone textures).
    #[inline]
    #[must_use]
    pub fn vertex_textures(&self) -> bool {
        self.max_vertex_textures > 0
    }

    #[inline]
    #[must_use]
    pub fn has(&self, extension: Extensions) -> bool {
        self.extensions.contains(extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_falls_back_to_medium() {
        let caps = DriverCapabilities {
            fragment_precision: PrecisionSupport {
                high: false,
                medium: true,
            },
            ..Default::default()
        };
        assert_eq!(caps.max_precision(Precision::High), Precision::Medium);
        assert_eq!(caps.max_precision(Precision::Medium), Precision::Medium);
    }

    #[test]
    fn test_precision_lowp_is_always_available() {
        let caps = DriverCapabilities {
            vertex_precision: PrecisionSupport {
                high: false,
                medium: false,
            },
            ..Default::default()
        };
        assert_eq!(caps.max_precision(Precision::High), Precision::Low);
        assert_eq!(caps.max_precision(Precision::Low), Precision::Low);
    }
}

//! Program Pipeline
//!
//! Everything between a material's feature flags and a linked, reflected
//! driver program:
//!
//! - [`chunks`]: the template environment that expands named chunks and
//!   unrolls per-light / per-plane loops.
//! - [`parameters`]: the feature fingerprint of a draw and its cache key.
//! - [`program`]: prefix assembly, compile/link and diagnostics.
//! - [`cache`]: the reference-counted program cache.

pub mod cache;
pub mod chunks;
pub mod parameters;
pub mod program;

pub use cache::{ProgramCache, ProgramHandle};
pub use chunks::{ChunkResolver, TemplateContext};
pub use parameters::{FogKind, FrameEnvironment, MapFeatures, ProgramParameters, allocate_bones, fx_hash_key};
pub use program::{Program, ProgramDiagnostics};

/// Built-in shader template pair. Each variant maps to `<name>.vert` and
/// `<name>.frag` in the embedded template library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderTemplate {
    Basic,
    Lambert,
    Phong,
    Standard,
    Points,
    Dashed,
    Depth,
    Normal,
    /// Sources supplied by a [`CustomShader`](crate::resources::CustomShader).
    Custom,
}

impl ShaderTemplate {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Lambert => "lambert",
            Self::Phong => "phong",
            Self::Standard => "standard",
            Self::Points => "points",
            Self::Dashed => "dashed",
            Self::Depth => "depth",
            Self::Normal => "normal",
            Self::Custom => "custom",
        }
    }
}

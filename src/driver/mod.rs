//! Driver Contract
//!
//! The binder talks to a single stateful, immediate-mode graphics driver
//! context through the [`GlDriver`] trait. Every method maps to one driver
//! call; the binder never batches or reorders calls on the driver's behalf, so
//! an implementation can forward each method verbatim.
//!
//! Handles ([`ProgramId`], [`ShaderId`], [`TextureId`], [`BufferId`],
//! [`UniformLocation`]) are opaque driver-issued integers.
//!
//! The GPU state vocabulary reuses the `wgpu` enums (`CompareFunction`,
//! `BlendFactor`, `BlendOperation`, `StencilOperation`, `FrontFace`,
//! `IndexFormat`) so callers already working with `wgpu` descriptors can
//! share the same values.

pub mod capabilities;
pub mod recording;
mod reflect;

pub use capabilities::{DriverCapabilities, Extensions, Precision, PrecisionSupport};
pub use recording::{DriverCall, RecordingDriver};

use glam::Vec4;
use wgpu::{BlendFactor, BlendOperation, CompareFunction, FrontFace, IndexFormat, StencilOperation};

// ─── Handles ──────────────────────────────────────────────────────────────────

/// Driver-side program object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Driver-side shader object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

/// Driver-side texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Driver-side buffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Location of one active uniform inside a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

// ─── Enums ────────────────────────────────────────────────────────────────────

/// Toggleable driver capabilities tracked by the state engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    CullFace,
    DepthTest,
    StencilTest,
    PolygonOffsetFill,
    ScissorTest,
}

impl Capability {
    /// Number of tracked capabilities.
    pub const COUNT: usize = 6;

    /// Dense index used by the state snapshot.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Which faces the rasterizer discards when culling is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullFace {
    Back,
    Front,
    FrontAndBack,
}

/// Pipeline stage of a shader object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Binding point of a texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    CubeMap,
    Texture2DArray,
    Texture3D,
}

/// Binding point of a buffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

/// Primitive assembly mode of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
}

/// Scalar component type of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComponentType {
    #[default]
    Float,
    UnsignedByte,
    Byte,
    UnsignedShort,
    Short,
    UnsignedInt,
}

/// Integer rectangle used by viewport and scissor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Layout passed to [`GlDriver::vertex_attrib_pointer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeLayout {
    pub size: u32,
    pub component: ComponentType,
    pub normalized: bool,
    pub stride: u32,
    pub offset: u32,
}

/// One active uniform as reported by driver reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    /// Full path, e.g. `pointLights[0].color` or `boneMatrices[0]`.
    pub name: String,
    /// Raw driver type code (see [`crate::uniforms::UniformType`]).
    pub type_code: u32,
    /// Array length, 1 for non-arrays.
    pub size: u32,
    pub location: UniformLocation,
}

/// One active vertex attribute as reported by driver reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAttribute {
    pub name: String,
    pub type_code: u32,
    pub location: u32,
}

// ─── Driver Trait ─────────────────────────────────────────────────────────────

/// Immediate-mode graphics driver context.
///
/// All methods are synchronous round trips on the render thread. Query methods
/// (`*_status`, `*_info_log`, `active_*`) take `&self`.
pub trait GlDriver {
    // ── Fixed-function state ────────────────────────────────────────────────
    fn enable(&mut self, capability: Capability);
    fn disable(&mut self, capability: Capability);
    fn blend_equation_separate(&mut self, color: BlendOperation, alpha: BlendOperation);
    fn blend_func_separate(
        &mut self,
        src_color: BlendFactor,
        dst_color: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );
    fn color_mask(&mut self, write: bool);
    fn depth_mask(&mut self, write: bool);
    fn depth_func(&mut self, func: CompareFunction);
    fn stencil_mask(&mut self, mask: u32);
    fn stencil_func(&mut self, func: CompareFunction, reference: i32, mask: u32);
    fn stencil_op(&mut self, fail: StencilOperation, depth_fail: StencilOperation, pass: StencilOperation);
    fn clear_color(&mut self, color: Vec4);
    fn clear_depth(&mut self, depth: f32);
    fn clear_stencil(&mut self, stencil: i32);
    fn clear(&mut self, color: bool, depth: bool, stencil: bool);
    fn cull_face(&mut self, face: CullFace);
    fn front_face(&mut self, winding: FrontFace);
    fn line_width(&mut self, width: f32);
    fn polygon_offset(&mut self, factor: f32, units: f32);
    fn scissor(&mut self, rect: Rect);
    fn viewport(&mut self, rect: Rect);

    // ── Textures ────────────────────────────────────────────────────────────
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>);
    fn create_texture(&mut self) -> TextureId;
    /// Uploads tightly packed RGBA8 pixels to the texture bound on the active
    /// unit. `face` selects the cube face for [`TextureTarget::CubeMap`].
    fn tex_image_2d(&mut self, target: TextureTarget, face: u32, width: u32, height: u32, rgba: &[u8]);

    // ── Vertex input ────────────────────────────────────────────────────────
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);
    fn enable_vertex_attrib_array(&mut self, location: u32);
    fn disable_vertex_attrib_array(&mut self, location: u32);
    fn vertex_attrib_divisor(&mut self, location: u32, divisor: u32);
    fn vertex_attrib_pointer(&mut self, location: u32, layout: &AttributeLayout);

    // ── Shaders & programs ──────────────────────────────────────────────────
    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId;
    fn shader_source(&mut self, shader: ShaderId, source: &str);
    fn compile_shader(&mut self, shader: ShaderId);
    fn shader_compile_status(&self, shader: ShaderId) -> bool;
    fn shader_info_log(&self, shader: ShaderId) -> String;
    fn delete_shader(&mut self, shader: ShaderId);
    fn create_program(&mut self) -> ProgramId;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);
    fn bind_attrib_location(&mut self, program: ProgramId, location: u32, name: &str);
    fn link_program(&mut self, program: ProgramId);
    fn program_link_status(&self, program: ProgramId) -> bool;
    fn program_info_log(&self, program: ProgramId) -> String;
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: Option<ProgramId>);
    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveUniform>;
    fn active_attributes(&self, program: ProgramId) -> Vec<ActiveAttribute>;

    // ── Uniform upload ──────────────────────────────────────────────────────
    fn uniform_1f(&mut self, location: UniformLocation, value: f32);
    fn uniform_1fv(&mut self, location: UniformLocation, data: &[f32]);
    fn uniform_2fv(&mut self, location: UniformLocation, data: &[f32]);
    fn uniform_3fv(&mut self, location: UniformLocation, data: &[f32]);
    fn uniform_4fv(&mut self, location: UniformLocation, data: &[f32]);
    fn uniform_1i(&mut self, location: UniformLocation, value: i32);
    fn uniform_1iv(&mut self, location: UniformLocation, data: &[i32]);
    fn uniform_2iv(&mut self, location: UniformLocation, data: &[i32]);
    fn uniform_3iv(&mut self, location: UniformLocation, data: &[i32]);
    fn uniform_4iv(&mut self, location: UniformLocation, data: &[i32]);
    fn uniform_matrix_2fv(&mut self, location: UniformLocation, data: &[f32]);
    fn uniform_matrix_3fv(&mut self, location: UniformLocation, data: &[f32]);
    fn uniform_matrix_4fv(&mut self, location: UniformLocation, data: &[f32]);

    // ── Draw ────────────────────────────────────────────────────────────────
    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32, instances: u32);
    fn draw_elements(&mut self, mode: DrawMode, count: u32, format: IndexFormat, offset: u64, instances: u32);
}

// ─── Type Codes ───────────────────────────────────────────────────────────────

/// Raw type codes reported by [`GlDriver::active_uniforms`] and
/// [`GlDriver::active_attributes`].
pub mod type_code {
    pub const FLOAT: u32 = 0x1406;
    pub const FLOAT_VEC2: u32 = 0x8B50;
    pub const FLOAT_VEC3: u32 = 0x8B51;
    pub const FLOAT_VEC4: u32 = 0x8B52;
    pub const INT: u32 = 0x1404;
    pub const INT_VEC2: u32 = 0x8B53;
    pub const INT_VEC3: u32 = 0x8B54;
    pub const INT_VEC4: u32 = 0x8B55;
    pub const BOOL: u32 = 0x8B56;
    pub const BOOL_VEC2: u32 = 0x8B57;
    pub const BOOL_VEC3: u32 = 0x8B58;
    pub const BOOL_VEC4: u32 = 0x8B59;
    pub const FLOAT_MAT2: u32 = 0x8B5A;
    pub const FLOAT_MAT3: u32 = 0x8B5B;
    pub const FLOAT_MAT4: u32 = 0x8B5C;
    pub const SAMPLER_2D: u32 = 0x8B5E;
    pub const SAMPLER_3D: u32 = 0x8B5F;
    pub const SAMPLER_CUBE: u32 = 0x8B60;
    pub const SAMPLER_2D_SHADOW: u32 = 0x8B62;
    pub const SAMPLER_2D_ARRAY: u32 = 0x8DC1;

    /// Maps a GLSL type keyword to its code.
    #[must_use]
    pub fn from_glsl(name: &str) -> Option<u32> {
        Some(match name {
            "float" => FLOAT,
            "vec2" => FLOAT_VEC2,
            "vec3" => FLOAT_VEC3,
            "vec4" => FLOAT_VEC4,
            "int" => INT,
            "ivec2" => INT_VEC2,
            "ivec3" => INT_VEC3,
            "ivec4" => INT_VEC4,
            "bool" => BOOL,
            "bvec2" => BOOL_VEC2,
            "bvec3" => BOOL_VEC3,
            "bvec4" => BOOL_VEC4,
            "mat2" => FLOAT_MAT2,
            "mat3" => FLOAT_MAT3,
            "mat4" => FLOAT_MAT4,
            "sampler2D" => SAMPLER_2D,
            "sampler3D" => SAMPLER_3D,
            "samplerCube" => SAMPLER_CUBE,
            "sampler2DShadow" => SAMPLER_2D_SHADOW,
            "sampler2DArray" => SAMPLER_2D_ARRAY,
            _ => return None,
        })
    }
}

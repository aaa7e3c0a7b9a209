//! Leaf setters.
//!
//! A leaf's upload call is chosen once, from its declared type, when the
//! registry is built. Singular leaves upload one value; pure-array leaves
//! flatten their value into a scratch block of exactly `size × components`
//! elements and upload it in a single call.

use bytemuck::cast_slice;
use log::warn;

use super::UploadContext;
use super::path::UploadStrategy;
use super::value::UniformValue;
use crate::driver::{TextureTarget, UniformLocation, type_code};
use crate::resources::TextureRef;

// ─── UniformType ──────────────────────────────────────────────────────────────

/// Declared base type of a uniform leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    Bool,
    BVec2,
    BVec3,
    BVec4,
    Sampler2D,
    Sampler2DShadow,
    Sampler3D,
    Sampler2DArray,
    SamplerCube,
}

impl UniformType {
    /// Maps a driver type code; `None` for types with no setter.
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            type_code::FLOAT => Self::Float,
            type_code::FLOAT_VEC2 => Self::Vec2,
            type_code::FLOAT_VEC3 => Self::Vec3,
            type_code::FLOAT_VEC4 => Self::Vec4,
            type_code::FLOAT_MAT2 => Self::Mat2,
            type_code::FLOAT_MAT3 => Self::Mat3,
            type_code::FLOAT_MAT4 => Self::Mat4,
            type_code::INT => Self::Int,
            type_code::INT_VEC2 => Self::IVec2,
            type_code::INT_VEC3 => Self::IVec3,
            type_code::INT_VEC4 => Self::IVec4,
            type_code::BOOL => Self::Bool,
            type_code::BOOL_VEC2 => Self::BVec2,
            type_code::BOOL_VEC3 => Self::BVec3,
            type_code::BOOL_VEC4 => Self::BVec4,
            type_code::SAMPLER_2D => Self::Sampler2D,
            type_code::SAMPLER_2D_SHADOW => Self::Sampler2DShadow,
            type_code::SAMPLER_3D => Self::Sampler3D,
            type_code::SAMPLER_2D_ARRAY => Self::Sampler2DArray,
            type_code::SAMPLER_CUBE => Self::SamplerCube,
            _ => return None,
        })
    }

    /// Scalar components per element.
    #[must_use]
    pub const fn components(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Bool => 1,
            Self::Vec2 | Self::IVec2 | Self::BVec2 => 2,
            Self::Vec3 | Self::IVec3 | Self::BVec3 => 3,
            Self::Vec4 | Self::IVec4 | Self::BVec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
            Self::Sampler2D | Self::Sampler2DShadow | Self::Sampler3D | Self::Sampler2DArray | Self::SamplerCube => 1,
        }
    }

    /// Binding target for sampler types.
    #[must_use]
    pub const fn texture_target(self) -> Option<TextureTarget> {
        match self {
            Self::Sampler2D | Self::Sampler2DShadow => Some(TextureTarget::Texture2D),
            Self::Sampler3D => Some(TextureTarget::Texture3D),
            Self::Sampler2DArray => Some(TextureTarget::Texture2DArray),
            Self::SamplerCube => Some(TextureTarget::CubeMap),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int | Self::IVec2 | Self::IVec3 | Self::IVec4 | Self::Bool | Self::BVec2 | Self::BVec3 | Self::BVec4
        )
    }
}

// ─── UniformLeaf ──────────────────────────────────────────────────────────────

/// A leaf of the setter tree, bound to one location and one upload call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLeaf {
    pub location: UniformLocation,
    pub kind: UniformType,
    /// Declared array length, 1 for singular leaves.
    pub size: u32,
    pub strategy: UploadStrategy,
}

impl UniformLeaf {
    pub(crate) fn upload(&self, ctx: &mut UploadContext<'_>, value: &UniformValue) {
        match self.strategy {
            UploadStrategy::Singular => self.upload_singular(ctx, value),
            UploadStrategy::PureArray => self.upload_array(ctx, value),
        }
    }

    fn mismatch(&self, value: &UniformValue) {
        self.mismatch_named(value.variant_name());
    }

    fn mismatch_named(&self, got: &str) {
        warn!(
            "Uniform at {:?} expects {:?} ({:?}), got {got}",
            self.location, self.kind, self.strategy
        );
    }

    /// Uploads `source` as the leaf's whole float block: `size × components`
    /// elements, zero-filled past the end of `source`.
    pub(crate) fn upload_floats(&self, ctx: &mut UploadContext<'_>, source: &[f32]) {
        if self.kind.is_integer() || self.kind.texture_target().is_some() {
            return self.mismatch_named("float slice");
        }
        let n = self.size as usize * self.kind.components();
        copy_block(ctx.scratch.floats(n), source);
        send_floats(ctx, self.kind, self.location, n);
    }

    fn upload_singular(&self, ctx: &mut UploadContext<'_>, value: &UniformValue) {
        use UniformType as T;
        use UniformValue as V;

        let loc = self.location;
        let driver = &mut *ctx.driver;
        match (self.kind, value) {
            (T::Float, V::Float(v)) => driver.uniform_1f(loc, *v),
            (T::Vec2, V::Vec2(v)) => driver.uniform_2fv(loc, &v.to_array()),
            (T::Vec3, V::Vec3(v)) => driver.uniform_3fv(loc, &v.to_array()),
            (T::Vec4, V::Vec4(v)) => driver.uniform_4fv(loc, &v.to_array()),
            (T::Vec2, V::Floats(v)) if v.len() == 2 => driver.uniform_2fv(loc, v),
            (T::Vec3, V::Floats(v)) if v.len() == 3 => driver.uniform_3fv(loc, v),
            (T::Vec4, V::Floats(v)) if v.len() == 4 => driver.uniform_4fv(loc, v),
            (T::Mat2, V::Mat2(m)) => driver.uniform_matrix_2fv(loc, &m.to_cols_array()),
            (T::Mat3, V::Mat3(m)) => driver.uniform_matrix_3fv(loc, &m.to_cols_array()),
            (T::Mat4, V::Mat4(m)) => driver.uniform_matrix_4fv(loc, &m.to_cols_array()),
            (T::Int | T::Bool, V::Int(v)) => driver.uniform_1i(loc, *v),
            (T::Int | T::Bool, V::Bool(v)) => driver.uniform_1i(loc, i32::from(*v)),
            (T::IVec2 | T::BVec2, V::IVec2(v)) => driver.uniform_2iv(loc, &v.to_array()),
            (T::IVec3 | T::BVec3, V::IVec3(v)) => driver.uniform_3iv(loc, &v.to_array()),
            (T::IVec4 | T::BVec4, V::IVec4(v)) => driver.uniform_4iv(loc, &v.to_array()),
            (kind, V::Texture(texture)) => match kind.texture_target() {
                Some(target) => {
                    let unit = ctx.units.allocate();
                    ctx.driver.uniform_1i(loc, unit as i32);
                    ctx.textures
                        .bind(&mut *ctx.driver, &mut *ctx.state, texture.as_ref(), unit, target);
                }
                None => self.mismatch(value),
            },
            _ => self.mismatch(value),
        }
    }

    fn upload_array(&self, ctx: &mut UploadContext<'_>, value: &UniformValue) {
        if let Some(target) = self.kind.texture_target() {
            self.upload_sampler_array(ctx, value, target);
            return;
        }

        let n = self.size as usize * self.kind.components();
        if self.kind.is_integer() {
            let source: &[i32] = match value {
                UniformValue::Ints(v) => v,
                _ => return self.mismatch(value),
            };
            let block = ctx.scratch.ints(n);
            copy_block(block, source);
            send_ints(ctx, self.kind, self.location, n);
            return;
        }

        let block = ctx.scratch.floats(n);
        let filled = match value {
            UniformValue::Floats(v) => copy_block(block, v),
            UniformValue::Vec2s(v) => copy_block(block, cast_slice(v)),
            UniformValue::Vec3s(v) => copy_block(block, cast_slice(v)),
            UniformValue::Vec4s(v) => copy_block(block, cast_slice(v)),
            UniformValue::Mat3s(v) => copy_block(block, cast_slice(v)),
            UniformValue::Mat4s(v) => copy_block(block, cast_slice(v)),
            UniformValue::List(items) => flatten_list(block, items, self.kind.components()),
            _ => false,
        };
        if !filled {
            return self.mismatch(value);
        }
        send_floats(ctx, self.kind, self.location, n);
    }

    /// Allocates one unit per declared element, uploads the unit block and
    /// binds `textures[i]` (or the placeholder) to each unit.
    fn upload_sampler_array(&self, ctx: &mut UploadContext<'_>, value: &UniformValue, target: TextureTarget) {
        let UniformValue::Textures(textures) = value else {
            return self.mismatch(value);
        };
        let block = ctx.scratch.ints(self.size as usize);
        for slot in block.iter_mut() {
            *slot = ctx.units.allocate() as i32;
        }
        ctx.driver.uniform_1iv(self.location, block);

        for (i, unit) in block.iter().enumerate() {
            let texture: Option<&TextureRef> = textures.get(i).and_then(Option::as_ref);
            ctx.textures
                .bind(&mut *ctx.driver, &mut *ctx.state, texture, *unit as u32, target);
        }
    }
}

/// Copies `source` into `block`, zero-filling any tail. Extra source
/// elements are dropped.
fn copy_block<T: Copy + Default>(block: &mut [T], source: &[T]) -> bool {
    let n = block.len().min(source.len());
    block[..n].copy_from_slice(&source[..n]);
    block[n..].fill(T::default());
    true
}

fn flatten_list(block: &mut [f32], items: &[UniformValue], components: usize) -> bool {
    block.fill(0.0);
    for (chunk, item) in block.chunks_mut(components).zip(items) {
        let ok = match item {
            UniformValue::Float(v) => copy_block(chunk, &[*v]),
            UniformValue::Vec2(v) => copy_block(chunk, &v.to_array()),
            UniformValue::Vec3(v) => copy_block(chunk, &v.to_array()),
            UniformValue::Vec4(v) => copy_block(chunk, &v.to_array()),
            UniformValue::Mat3(m) => copy_block(chunk, &m.to_cols_array()),
            UniformValue::Mat4(m) => copy_block(chunk, &m.to_cols_array()),
            _ => false,
        };
        if !ok {
            return false;
        }
    }
    true
}

fn send_floats(ctx: &mut UploadContext<'_>, kind: UniformType, loc: UniformLocation, n: usize) {
    let block = ctx.scratch.floats(n);
    let driver = &mut *ctx.driver;
    match kind {
        UniformType::Vec2 => driver.uniform_2fv(loc, block),
        UniformType::Vec3 => driver.uniform_3fv(loc, block),
        UniformType::Vec4 => driver.uniform_4fv(loc, block),
        UniformType::Mat2 => driver.uniform_matrix_2fv(loc, block),
        UniformType::Mat3 => driver.uniform_matrix_3fv(loc, block),
        UniformType::Mat4 => driver.uniform_matrix_4fv(loc, block),
        _ => driver.uniform_1fv(loc, block),
    }
}

fn send_ints(ctx: &mut UploadContext<'_>, kind: UniformType, loc: UniformLocation, n: usize) {
    let block = ctx.scratch.ints(n);
    let driver = &mut *ctx.driver;
    match kind {
        UniformType::IVec2 | UniformType::BVec2 => driver.uniform_2iv(loc, block),
        UniformType::IVec3 | UniformType::BVec3 => driver.uniform_3iv(loc, block),
        UniformType::IVec4 | UniformType::BVec4 => driver.uniform_4iv(loc, block),
        _ => driver.uniform_1iv(loc, block),
    }
}

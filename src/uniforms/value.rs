//! Uniform values as supplied by materials, lights and the renderer.

use std::borrow::Cow;

use glam::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::resources::TextureRef;

/// A value that can be uploaded through a [`UniformRegistry`](super::UniformRegistry).
///
/// Scalar and vector variants match singular leaves, the plural variants
/// (`Floats`, `Vec3s`, `Mat4s`, ...) match pure-array leaves. `List` and
/// `Struct` feed struct containers: `List` is indexed by array position,
/// `Struct` by member name.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    IVec2(IVec2),
    IVec3(IVec3),
    IVec4(IVec4),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
    Texture(Option<TextureRef>),

    Floats(Vec<f32>),
    Ints(Vec<i32>),
    Vec2s(Vec<Vec2>),
    Vec3s(Vec<Vec3>),
    Vec4s(Vec<Vec4>),
    Mat3s(Vec<Mat3>),
    Mat4s(Vec<Mat4>),
    Textures(Vec<Option<TextureRef>>),

    List(Vec<UniformValue>),
    Struct(Vec<(Cow<'static, str>, UniformValue)>),
}

impl UniformValue {
    /// Member of a `Struct` value.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&UniformValue> {
        match self {
            Self::Struct(members) => members.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Element of a `List` value.
    #[must_use]
    pub fn element(&self, index: u32) -> Option<&UniformValue> {
        match self {
            Self::List(items) => items.get(index as usize),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "Float",
            Self::Int(_) => "Int",
            Self::Bool(_) => "Bool",
            Self::Vec2(_) => "Vec2",
            Self::Vec3(_) => "Vec3",
            Self::Vec4(_) => "Vec4",
            Self::IVec2(_) => "IVec2",
            Self::IVec3(_) => "IVec3",
            Self::IVec4(_) => "IVec4",
            Self::Mat2(_) => "Mat2",
            Self::Mat3(_) => "Mat3",
            Self::Mat4(_) => "Mat4",
            Self::Texture(_) => "Texture",
            Self::Floats(_) => "Floats",
            Self::Ints(_) => "Ints",
            Self::Vec2s(_) => "Vec2s",
            Self::Vec3s(_) => "Vec3s",
            Self::Vec4s(_) => "Vec4s",
            Self::Mat3s(_) => "Mat3s",
            Self::Mat4s(_) => "Mat4s",
            Self::Textures(_) => "Textures",
            Self::List(_) => "List",
            Self::Struct(_) => "Struct",
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                #[inline]
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    f32 => Float,
    i32 => Int,
    bool => Bool,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat3 => Mat3,
    Mat4 => Mat4,
    Vec<f32> => Floats,
    Vec<Vec3> => Vec3s,
    Vec<Mat4> => Mat4s,
}

impl From<TextureRef> for UniformValue {
    #[inline]
    fn from(t: TextureRef) -> Self {
        Self::Texture(Some(t))
    }
}

/// A value plus optional dirty tracking.
///
/// `needs_update: None` uploads every time; `Some(false)` skips the upload;
/// `Some(true)` uploads.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniform {
    pub value: UniformValue,
    pub needs_update: Option<bool>,
}

impl Uniform {
    #[must_use]
    pub fn new(value: impl Into<UniformValue>) -> Self {
        Self {
            value: value.into(),
            needs_update: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn should_upload(&self) -> bool {
        self.needs_update != Some(false)
    }
}

/// Named uniform bag (material uniforms, per-frame uniforms).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformValues {
    map: FxHashMap<String, Uniform>,
}

impl UniformValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value of `name`, keeping its dirty flag; inserts if new.
    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        match self.map.get_mut(name) {
            Some(u) => u.value = value,
            None => {
                self.map.insert(name.to_owned(), Uniform::new(value));
            }
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, uniform: Uniform) {
        self.map.insert(name.into(), uniform);
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Uniform> {
        self.map.get(name)
    }

    #[inline]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Uniform> {
        self.map.get_mut(name)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Uniform)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
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

    /// Copies every entry of `other` over `self`.
    pub fn extend_from(&mut self, other: &UniformValues) {
        for (k, v) in &other.map {
            match self.map.get_mut(k) {
                Some(slot) => v.clone_into(slot),
                None => {
                    self.map.insert(k.clone(), v.clone());
                }
            }
        }
    }
}

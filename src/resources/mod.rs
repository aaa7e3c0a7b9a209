//! Collaborator types consumed by the binder.
//!
//! - [`Material`]: feature flags, render state and uniform-valued properties
//! - [`Geometry`]: driver-resident vertex streams, index buffer, groups
//! - [`RenderObject`], [`Camera`], [`Scene`]: what a frame draws and from where
//! - [`TextureRef`], [`TextureBinder`]: textures and how samplers bind them

pub mod geometry;
pub mod material;
pub mod object;
pub mod texture;

pub use geometry::{DrawRange, Geometry, GeometryGroup, GeometryId, IndexBuffer, VertexAttribute};
pub use material::{
    Blending, Combine, CustomShader, DepthPacking, EnvMapMode, Material, MaterialId, MaterialKind,
    MaterialMaps, Side, StencilSettings, VertexColors,
};
pub use object::{Camera, Fog, ObjectId, ObjectKind, RenderObject, Scene, Skeleton};
pub use texture::{DirectTextureBinder, Encoding, TextureBinder, TextureRef};

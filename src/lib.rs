//! GPU pipeline binder for a scene-graph renderer driving an immediate-mode
//! graphics driver.
//!
//! Per draw the binder resolves a program for the material's feature
//! fingerprint, applies material state through a diffing state snapshot,
//! uploads uniforms through the program's reflected setter tree, enables the
//! vertex attributes the program needs and disables the ones a previous draw
//! left behind.
//!
//! | Module        | Role                                                     |
//! |---------------|----------------------------------------------------------|
//! | [`driver`]    | Driver contract, handles, capabilities, recording driver |
//! | [`state`]     | State diff engine                                        |
//! | [`pipeline`]  | Chunk resolver, program parameters, programs, cache      |
//! | [`uniforms`]  | Uniform registry and values                              |
//! | [`clipping`]  | Clip plane projector                                     |
//! | [`render_list`] | Draw item classification and ordering                  |
//! | [`renderer`]  | Frame loop                                               |
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use myth_gl::driver::{BufferId, DriverCapabilities, RecordingDriver};
//! use myth_gl::resources::{Camera, Geometry, Material, RenderObject, Scene, VertexAttribute};
//! use myth_gl::{Renderer, RendererSettings};
//!
//! # fn main() -> myth_gl::errors::Result<()> {
//! let mut renderer = Renderer::new(
//!     RecordingDriver::new(),
//!     DriverCapabilities::default(),
//!     RendererSettings::default(),
//! )?;
//!
//! let geometry = Geometry::new().with_attribute("position", VertexAttribute::floats(BufferId(1), 3, 3));
//! let mut scene = Scene::new();
//! scene.add(RenderObject::mesh(Arc::new(geometry), Arc::new(Material::basic())));
//!
//! let camera = Camera::perspective(1.0, 1.0, 0.1, 100.0, glam::Vec3::Z * 5.0, glam::Vec3::ZERO);
//! renderer.render(&scene, &camera)?;
//! assert_eq!(renderer.info().calls, 1);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod clipping;
pub mod context;
pub mod driver;
pub mod errors;
pub mod info;
pub mod lights;
pub mod pipeline;
pub mod properties;
pub mod render_list;
pub mod renderer;
pub mod resources;
pub mod settings;
pub mod state;
pub mod uniforms;

pub use context::RenderContext;
pub use errors::{RenderError, Result};
pub use info::RenderInfo;
pub use renderer::Renderer;
pub use settings::RendererSettings;

//! Rendering Context
//!
//! The [`RenderContext`] owns every per-context singleton of the binder:
//!
//! | Field          | Role                                                  |
//! |----------------|-------------------------------------------------------|
//! | `state`        | Driver state snapshot, diffed by every setter         |
//! | `programs`     | Reference-counted program cache                       |
//! | `chunks`       | Template environment and chunk library                |
//! | `properties`   | Per-material program refs, clipping cache, uniforms   |
//! | `clipping`     | Clip plane projector                                  |
//! | `lights`       | View-space light uniforms for the current frame       |
//! | `render_list`  | Pooled draw items                                     |
//! | `units`        | Per-draw texture unit allocator                       |
//! | `scratch`      | Uniform scratch buffers, keyed by size                |
//! | `textures`     | Texture binder invoked by sampler uniforms            |
//!
//! A second rendering context needs a second `RenderContext`; nothing here
//! is shared between contexts.

use crate::clipping::Clipping;
use crate::driver::{DriverCapabilities, GlDriver};
use crate::errors::Result;
use crate::lights::LightsState;
use crate::pipeline::{ChunkResolver, ProgramCache};
use crate::properties::MaterialProperties;
use crate::render_list::RenderList;
use crate::resources::{DirectTextureBinder, TextureBinder};
use crate::state::GpuState;
use crate::uniforms::{ScratchPool, TextureUnits, UploadContext};

pub struct RenderContext {
    pub capabilities: DriverCapabilities,
    pub state: GpuState,
    pub programs: ProgramCache,
    pub chunks: ChunkResolver,
    pub properties: MaterialProperties,
    pub clipping: Clipping,
    pub lights: LightsState,
    pub render_list: RenderList,
    pub units: TextureUnits,
    pub scratch: ScratchPool,
    pub textures: Box<dyn TextureBinder>,
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("capabilities", &self.capabilities)
            .field("programs", &self.programs.len())
            .field("materials", &self.properties.len())
            .field("render_items", &self.render_list.len())
            .finish_non_exhaustive()
    }
}

impl RenderContext {
    /// Creates a context with the default [`DirectTextureBinder`].
    pub fn new(capabilities: DriverCapabilities) -> Result<Self> {
        Self::with_texture_binder(capabilities, Box::new(DirectTextureBinder::new()))
    }

    pub fn with_texture_binder(capabilities: DriverCapabilities, textures: Box<dyn TextureBinder>) -> Result<Self> {
        let max_textures = capabilities.max_textures;
        Ok(Self {
            capabilities,
            state: GpuState::new(max_textures),
            programs: ProgramCache::new(),
            chunks: ChunkResolver::new()?,
            properties: MaterialProperties::new(),
            clipping: Clipping::new(),
            lights: LightsState::new(),
            render_list: RenderList::new(),
            units: TextureUnits::new(max_textures),
            scratch: ScratchPool::new(),
            textures,
        })
    }

    /// Borrows the pieces a uniform upload needs.
    pub fn upload_context<'a>(&'a mut self, driver: &'a mut dyn GlDriver) -> UploadContext<'a> {
        UploadContext {
            driver,
            state: &mut self.state,
            textures: self.textures.as_mut(),
            units: &mut self.units,
            scratch: &mut self.scratch,
        }
    }

    /// Forgets every driver object and cached driver state. Called when the
    /// driver context is lost: programs, textures and bindings are gone with
    /// it, so nothing is deleted through the driver.
    pub fn reset(&mut self) {
        self.state.reset();
        self.programs.clear();
        self.properties.clear();
        self.textures.reset();
        self.units.reset();
    }
}

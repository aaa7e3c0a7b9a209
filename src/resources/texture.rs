//! Textures as seen by the binder: a driver handle plus the metadata the
//! shader generator needs, and the [`TextureBinder`] collaborator that
//! sampler leaves delegate the actual bind to.

use rustc_hash::FxHashMap;

use crate::driver::{GlDriver, TextureId, TextureTarget};
use crate::state::GpuState;

/// Color encoding of texel data or of the output target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Linear,
    Srgb,
    Gamma,
    Rgbe,
    RgbM7,
    RgbM16,
    RgbD,
}

impl Encoding {
    /// `(function component, argument)` used to build encode/decode
    /// functions in the generated prefix.
    #[must_use]
    pub const fn components(self) -> (&'static str, &'static str) {
        match self {
            Self::Linear => ("Linear", "( value )"),
            Self::Srgb => ("sRGB", "( value )"),
            Self::Gamma => ("Gamma", "( value, float( GAMMA_FACTOR ) )"),
            Self::Rgbe => ("RGBE", "( value )"),
            Self::RgbM7 => ("RGBM", "( value, 7.0 )"),
            Self::RgbM16 => ("RGBM", "( value, 16.0 )"),
            Self::RgbD => ("RGBD", "( value, 256.0 )"),
        }
    }

    /// Stable tag for program cache keys.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

/// A texture already resident on the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRef {
    pub id: TextureId,
    pub target: TextureTarget,
    pub encoding: Encoding,
}

impl TextureRef {
    #[must_use]
    pub const fn new(id: TextureId, target: TextureTarget) -> Self {
        Self {
            id,
            target,
            encoding: Encoding::Linear,
        }
    }

    #[must_use]
    pub const fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Binds textures for sampler uniforms.
///
/// Called with the texture (or `None` when the material supplies none) and
/// the texture unit allocated for the sampler. Implementations must leave a
/// valid texture bound on `unit` either way.
pub trait TextureBinder {
    fn bind(
        &mut self,
        driver: &mut dyn GlDriver,
        state: &mut GpuState,
        texture: Option<&TextureRef>,
        unit: u32,
        target: TextureTarget,
    );

    /// Forgets every driver object owned by the binder (context loss).
    fn reset(&mut self) {}
}

/// Binds handles as-is and substitutes a lazily created 1×1 white texture per
/// target when no texture is supplied.
#[derive(Debug, Default)]
pub struct DirectTextureBinder {
    placeholders: FxHashMap<TextureTarget, TextureId>,
}

const WHITE: [u8; 4] = [255, 255, 255, 255];

impl DirectTextureBinder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn placeholder(&mut self, driver: &mut dyn GlDriver, state: &mut GpuState, target: TextureTarget) -> TextureId {
        if let Some(id) = self.placeholders.get(&target) {
            return *id;
        }
        let id = driver.create_texture();
        state.bind_texture(driver, target, Some(id));
        let faces = if target == TextureTarget::CubeMap { 6 } else { 1 };
        for face in 0..faces {
            driver.tex_image_2d(target, face, 1, 1, &WHITE);
        }
        self.placeholders.insert(target, id);
        id
    }
}

impl TextureBinder for DirectTextureBinder {
    fn bind(
        &mut self,
        driver: &mut dyn GlDriver,
        state: &mut GpuState,
        texture: Option<&TextureRef>,
        unit: u32,
        target: TextureTarget,
    ) {
        state.active_texture(driver, unit);
        let id = match texture {
            Some(t) => t.id,
            None => self.placeholder(driver, state, target),
        };
        state.bind_texture(driver, target, Some(id));
    }

    fn reset(&mut self) {
        self.placeholders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverCall, RecordingDriver};

    #[test]
    fn test_placeholder_is_created_once() {
        let mut driver = RecordingDriver::new();
        let mut state = GpuState::new(16);
        let mut binder = DirectTextureBinder::new();

        binder.bind(&mut driver, &mut state, None, 0, TextureTarget::Texture2D);
        binder.bind(&mut driver, &mut state, None, 1, TextureTarget::Texture2D);

        assert_eq!(driver.count(|c| matches!(c, DriverCall::CreateTexture(_))), 1);
        let first = driver.bound_texture(0).unwrap();
        let second = driver.bound_texture(1).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cube_placeholder_fills_six_faces() {
        let mut driver = RecordingDriver::new();
        let mut state = GpuState::new(16);
        let mut binder = DirectTextureBinder::new();
        binder.bind(&mut driver, &mut state, None, 0, TextureTarget::CubeMap);
        assert_eq!(driver.count(|c| matches!(c, DriverCall::TexImage2D { .. })), 6);
    }
}

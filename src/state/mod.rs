//! GPU State Diff Engine
//!
//! [`GpuState`] is the snapshot of every piece of fixed-function state the
//! binder touches. Each setter compares the requested value against the cached
//! one, forwards the driver call only on change, and then records the new
//! value, so issuing the same value N times costs a single driver call.
//!
//! Every cached field is an `Option`: `None` means "unknown". A fresh snapshot
//! and one that went through [`GpuState::reset`] (context loss) therefore
//! forward the next call of every setter unconditionally.
//!
//! # Layout
//!
//! - [`buffers`]: color / depth / stencil masks, functions and clear values
//! - [`attributes`]: vertex attribute enable bitsets and divisors
//! - this module: capabilities, blending, culling, program, textures, rects

pub mod attributes;
pub mod buffers;

pub use attributes::{AttributeState, MAX_TRACKED_ATTRIBUTES};
pub use buffers::{ColorBuffer, DepthBuffer, StencilBuffer, StencilFunc, StencilOps};

use glam::Vec4;
use rustc_hash::FxHashMap;
use wgpu::{BlendComponent, BlendFactor, BlendOperation, BlendState, CompareFunction, FrontFace};

use crate::driver::{Capability, CullFace, GlDriver, ProgramId, Rect, TextureId, TextureTarget};
use crate::resources::{Blending, Material, Side};

// ─── Blending Presets ─────────────────────────────────────────────────────────

const fn component(src: BlendFactor, dst: BlendFactor) -> BlendComponent {
    BlendComponent {
        src_factor: src,
        dst_factor: dst,
        operation: BlendOperation::Add,
    }
}

/// Resolves a blending preset into equation and factors.
///
/// Returns `None` for [`Blending::None`]; [`Blending::Custom`] passes `custom`
/// through untouched.
#[must_use]
pub fn blend_state_for(blending: Blending, custom: BlendState, premultiplied_alpha: bool) -> Option<BlendState> {
    use BlendFactor::{One, OneMinusSrc, OneMinusSrcAlpha, Src, SrcAlpha, Zero};

    let (color, alpha) = match (blending, premultiplied_alpha) {
        (Blending::None, _) => return None,
        (Blending::Custom, _) => return Some(custom),
        (Blending::Normal, true) => (component(One, OneMinusSrcAlpha), component(One, OneMinusSrcAlpha)),
        (Blending::Normal, false) => (component(SrcAlpha, OneMinusSrcAlpha), component(One, OneMinusSrcAlpha)),
        (Blending::Additive, true) => (component(One, One), component(One, One)),
        (Blending::Additive, false) => (component(SrcAlpha, One), component(SrcAlpha, One)),
        (Blending::Subtractive, true) => (component(Zero, Zero), component(OneMinusSrc, OneMinusSrcAlpha)),
        (Blending::Subtractive, false) => (component(Zero, OneMinusSrc), component(Zero, OneMinusSrc)),
        (Blending::Multiply, true) => (component(Zero, Src), component(Zero, SrcAlpha)),
        (Blending::Multiply, false) => (component(Zero, Src), component(Zero, Src)),
    };
    Some(BlendState { color, alpha })
}

// ─── GpuState ─────────────────────────────────────────────────────────────────

/// Snapshot of driver state for one rendering context.
#[derive(Debug)]
pub struct GpuState {
    pub color: ColorBuffer,
    pub depth: DepthBuffer,
    pub stencil: StencilBuffer,
    pub attributes: AttributeState,

    capabilities: [Option<bool>; Capability::COUNT],
    program: Option<ProgramId>,

    blend_equation: Option<(BlendOperation, BlendOperation)>,
    blend_func: Option<(BlendFactor, BlendFactor, BlendFactor, BlendFactor)>,

    flip_sided: Option<bool>,
    cull_face: Option<CullFace>,
    line_width: Option<f32>,
    polygon_offset: Option<(f32, f32)>,

    scissor: Option<Rect>,
    viewport: Option<Rect>,

    max_textures: u32,
    active_unit: Option<u32>,
    bound_textures: FxHashMap<u32, (TextureTarget, Option<TextureId>)>,
}

impl GpuState {
    #[must_use]
    pub fn new(max_textures: u32) -> Self {
        Self {
            color: ColorBuffer::default(),
            depth: DepthBuffer::default(),
            stencil: StencilBuffer::default(),
            attributes: AttributeState::new(),
            capabilities: [None; Capability::COUNT],
            program: None,
            blend_equation: None,
            blend_func: None,
            flip_sided: None,
            cull_face: None,
            line_width: None,
            polygon_offset: None,
            scissor: None,
            viewport: None,
            max_textures,
            active_unit: None,
            bound_textures: FxHashMap::default(),
        }
    }

    /// Applies the context defaults: clear values, depth test with
    /// `LessEqual`, CCW front faces, back-face culling and no blending.
    pub fn init_defaults(&mut self, driver: &mut dyn GlDriver) {
        self.color.set_clear(driver, Vec4::new(0.0, 0.0, 0.0, 1.0), false);
        self.depth.set_clear(driver, 1.0);
        self.stencil.set_clear(driver, 0);

        self.enable(driver, Capability::DepthTest);
        self.depth.set_func(driver, CompareFunction::LessEqual);

        self.set_flip_sided(driver, false);
        self.set_cull_face(driver, Some(CullFace::Back));
        self.set_blending(driver, Blending::None, BlendState::REPLACE, false);
    }

    // ─── Capabilities ────────────────────────────────────────────────────────

    pub fn enable(&mut self, driver: &mut dyn GlDriver, capability: Capability) {
        let slot = &mut self.capabilities[capability.index()];
        if *slot != Some(true) {
            driver.enable(capability);
            *slot = Some(true);
        }
    }

    pub fn disable(&mut self, driver: &mut dyn GlDriver, capability: Capability) {
        let slot = &mut self.capabilities[capability.index()];
        if *slot != Some(false) {
            driver.disable(capability);
            *slot = Some(false);
        }
    }

    #[inline]
    pub fn toggle(&mut self, driver: &mut dyn GlDriver, capability: Capability, on: bool) {
        if on {
            self.enable(driver, capability);
        } else {
            self.disable(driver, capability);
        }
    }

    /// Cached enable state, `None` when unknown.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self, capability: Capability) -> Option<bool> {
        self.capabilities[capability.index()]
    }

    pub fn set_depth_test(&mut self, driver: &mut dyn GlDriver, on: bool) {
        self.toggle(driver, Capability::DepthTest, on);
    }

    pub fn set_stencil_test(&mut self, driver: &mut dyn GlDriver, on: bool) {
        if !self.stencil.locked {
            self.toggle(driver, Capability::StencilTest, on);
        }
    }

    pub fn set_scissor_test(&mut self, driver: &mut dyn GlDriver, on: bool) {
        self.toggle(driver, Capability::ScissorTest, on);
    }

    // ─── Program ─────────────────────────────────────────────────────────────

    /// Binds `program`; returns `true` if a driver call was issued.
    pub fn use_program(&mut self, driver: &mut dyn GlDriver, program: ProgramId) -> bool {
        if self.program == Some(program) {
            return false;
        }
        driver.use_program(Some(program));
        self.program = Some(program);
        true
    }

    /// Forgets `program` if it is the cached binding (after deletion).
    pub fn forget_program(&mut self, program: ProgramId) {
        if self.program == Some(program) {
            self.program = None;
        }
    }

    #[inline]
    #[must_use]
    pub fn current_program(&self) -> Option<ProgramId> {
        self.program
    }

    // ─── Blending ────────────────────────────────────────────────────────────

    pub fn set_blending(
        &mut self,
        driver: &mut dyn GlDriver,
        blending: Blending,
        custom: BlendState,
        premultiplied_alpha: bool,
    ) {
        let Some(state) = blend_state_for(blending, custom, premultiplied_alpha) else {
            self.disable(driver, Capability::Blend);
            return;
        };
        self.enable(driver, Capability::Blend);

        let equation = (state.color.operation, state.alpha.operation);
        if self.blend_equation != Some(equation) {
            driver.blend_equation_separate(equation.0, equation.1);
            self.blend_equation = Some(equation);
        }

        let func = (
            state.color.src_factor,
            state.color.dst_factor,
            state.alpha.src_factor,
            state.alpha.dst_factor,
        );
        if self.blend_func != Some(func) {
            driver.blend_func_separate(func.0, func.1, func.2, func.3);
            self.blend_func = Some(func);
        }
    }

    // ─── Rasterizer ──────────────────────────────────────────────────────────

    /// Derives every per-material state change: culling, winding, blending,
    /// depth, color mask, stencil and polygon offset.
    ///
    /// `front_face_cw` is the caller's winding convention (e.g. a mirrored
    /// transform); it is XOR'd with back-side rendering.
    pub fn set_material(&mut self, driver: &mut dyn GlDriver, material: &Material, front_face_cw: bool) {
        self.toggle(driver, Capability::CullFace, material.side != Side::Double);

        let flip_sided = (material.side == Side::Back) != front_face_cw;
        self.set_flip_sided(driver, flip_sided);

        if material.blending == Blending::Normal && !material.transparent {
            self.set_blending(driver, Blending::None, material.blend_state, false);
        } else {
            self.set_blending(
                driver,
                material.blending,
                material.blend_state,
                material.premultiplied_alpha,
            );
        }

        self.depth.set_func(driver, material.depth_func);
        self.set_depth_test(driver, material.depth_test);
        self.depth.set_mask(driver, material.depth_write);
        self.color.set_mask(driver, material.color_write);

        let stencil = &material.stencil;
        self.set_stencil_test(driver, stencil.write);
        if stencil.write {
            self.stencil.set_mask(driver, stencil.write_mask);
            self.stencil.set_func(
                driver,
                StencilFunc {
                    func: stencil.func,
                    reference: stencil.reference,
                    mask: stencil.func_mask,
                },
            );
            self.stencil.set_op(
                driver,
                StencilOps {
                    fail: stencil.fail,
                    depth_fail: stencil.depth_fail,
                    pass: stencil.pass,
                },
            );
        }

        self.set_polygon_offset(
            driver,
            material.polygon_offset,
            material.polygon_offset_factor,
            material.polygon_offset_units,
        );
    }

    pub fn set_flip_sided(&mut self, driver: &mut dyn GlDriver, flip_sided: bool) {
        if self.flip_sided != Some(flip_sided) {
            driver.front_face(if flip_sided { FrontFace::Cw } else { FrontFace::Ccw });
            self.flip_sided = Some(flip_sided);
        }
    }

    /// `None` disables culling.
    pub fn set_cull_face(&mut self, driver: &mut dyn GlDriver, face: Option<CullFace>) {
        let Some(face) = face else {
            self.disable(driver, Capability::CullFace);
            return;
        };
        self.enable(driver, Capability::CullFace);
        if self.cull_face != Some(face) {
            driver.cull_face(face);
            self.cull_face = Some(face);
        }
    }

    pub fn set_line_width(&mut self, driver: &mut dyn GlDriver, width: f32) {
        if self.line_width != Some(width) {
            driver.line_width(width);
            self.line_width = Some(width);
        }
    }

    pub fn set_polygon_offset(&mut self, driver: &mut dyn GlDriver, on: bool, factor: f32, units: f32) {
        if !on {
            self.disable(driver, Capability::PolygonOffsetFill);
            return;
        }
        self.enable(driver, Capability::PolygonOffsetFill);
        if self.polygon_offset != Some((factor, units)) {
            driver.polygon_offset(factor, units);
            self.polygon_offset = Some((factor, units));
        }
    }

    pub fn scissor(&mut self, driver: &mut dyn GlDriver, rect: Rect) {
        if self.scissor != Some(rect) {
            driver.scissor(rect);
            self.scissor = Some(rect);
        }
    }

    pub fn viewport(&mut self, driver: &mut dyn GlDriver, rect: Rect) {
        if self.viewport != Some(rect) {
            driver.viewport(rect);
            self.viewport = Some(rect);
        }
    }

    // ─── Textures ────────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn max_textures(&self) -> u32 {
        self.max_textures
    }

    pub fn active_texture(&mut self, driver: &mut dyn GlDriver, unit: u32) {
        if self.active_unit != Some(unit) {
            driver.active_texture(unit);
            self.active_unit = Some(unit);
        }
    }

    /// Binds `texture` on the active unit (unit 0 if none was selected yet).
    /// Skipped when the unit already holds the same `(target, texture)`.
    pub fn bind_texture(&mut self, driver: &mut dyn GlDriver, target: TextureTarget, texture: Option<TextureId>) {
        let unit = match self.active_unit {
            Some(unit) => unit,
            None => {
                self.active_texture(driver, 0);
                0
            }
        };

        if self.bound_textures.get(&unit) != Some(&(target, texture)) {
            driver.bind_texture(target, texture);
            self.bound_textures.insert(unit, (target, texture));
        }
    }

    /// Forgets every unit holding `texture` (after deletion).
    pub fn forget_texture(&mut self, texture: TextureId) {
        self.bound_textures.retain(|_, (_, bound)| *bound != Some(texture));
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Invalidates the whole snapshot. Every setter forwards its next call.
    pub fn reset(&mut self) {
        *self = Self::new(self.max_textures);
    }
}

//! Color, depth and stencil buffer state.
//!
//! Each record caches the last value sent to the driver. A locked buffer
//! ignores mask changes until it is unlocked, which lets a caller pin the
//! write masks across a sequence of materials (e.g. a stencil-only pass).
//!
//! Test toggles (`DEPTH_TEST`, `STENCIL_TEST`) live on [`GpuState`](super::GpuState)
//! because they share the capability cache.

use glam::Vec4;
use wgpu::{CompareFunction, StencilOperation};

use crate::driver::GlDriver;

// ─── Color ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ColorBuffer {
    locked: bool,
    mask: Option<bool>,
    clear: Option<Vec4>,
}

impl ColorBuffer {
    pub fn set_mask(&mut self, driver: &mut dyn GlDriver, write: bool) {
        if self.mask != Some(write) && !self.locked {
            driver.color_mask(write);
            self.mask = Some(write);
        }
    }

    #[inline]
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Sets the clear color; with `premultiplied_alpha` the RGB channels are
    /// scaled by alpha before being sent.
    pub fn set_clear(&mut self, driver: &mut dyn GlDriver, color: Vec4, premultiplied_alpha: bool) {
        let color = if premultiplied_alpha {
            (color.truncate() * color.w).extend(color.w)
        } else {
            color
        };
        if self.clear != Some(color) {
            driver.clear_color(color);
            self.clear = Some(color);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ─── Depth ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct DepthBuffer {
    locked: bool,
    mask: Option<bool>,
    func: Option<CompareFunction>,
    clear: Option<f32>,
}

impl DepthBuffer {
    pub fn set_mask(&mut self, driver: &mut dyn GlDriver, write: bool) {
        if self.mask != Some(write) && !self.locked {
            driver.depth_mask(write);
            self.mask = Some(write);
        }
    }

    pub fn set_func(&mut self, driver: &mut dyn GlDriver, func: CompareFunction) {
        if self.func != Some(func) {
            driver.depth_func(func);
            self.func = Some(func);
        }
    }

    #[inline]
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn set_clear(&mut self, driver: &mut dyn GlDriver, depth: f32) {
        if self.clear != Some(depth) {
            driver.clear_depth(depth);
            self.clear = Some(depth);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ─── Stencil ──────────────────────────────────────────────────────────────────

/// Stencil comparison: function, reference value and read mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilFunc {
    pub func: CompareFunction,
    pub reference: i32,
    pub mask: u32,
}

/// Stencil operations for fail / depth-fail / pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilOps {
    pub fail: StencilOperation,
    pub depth_fail: StencilOperation,
    pub pass: StencilOperation,
}

#[derive(Debug, Default)]
pub struct StencilBuffer {
    pub(super) locked: bool,
    mask: Option<u32>,
    func: Option<StencilFunc>,
    op: Option<StencilOps>,
    clear: Option<i32>,
}

impl StencilBuffer {
    pub fn set_mask(&mut self, driver: &mut dyn GlDriver, mask: u32) {
        if self.mask != Some(mask) && !self.locked {
            driver.stencil_mask(mask);
            self.mask = Some(mask);
        }
    }

    pub fn set_func(&mut self, driver: &mut dyn GlDriver, func: StencilFunc) {
        if self.func != Some(func) {
            driver.stencil_func(func.func, func.reference, func.mask);
            self.func = Some(func);
        }
    }

    pub fn set_op(&mut self, driver: &mut dyn GlDriver, ops: StencilOps) {
        if self.op != Some(ops) {
            driver.stencil_op(ops.fail, ops.depth_fail, ops.pass);
            self.op = Some(ops);
        }
    }

    #[inline]
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn set_clear(&mut self, driver: &mut dyn GlDriver, stencil: i32) {
        if self.clear != Some(stencil) {
            driver.clear_stencil(stencil);
            self.clear = Some(stencil);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

//! Scratch buffers for flattening array uniforms.
//!
//! One buffer per exact element count, created on first use and reused for
//! the lifetime of the context. Buffers never shrink or grow, so a steady
//! frame performs no allocation here.

use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct ScratchPool {
    floats: FxHashMap<usize, Vec<f32>>,
    ints: FxHashMap<usize, Vec<i32>>,
}

impl ScratchPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Float buffer of exactly `len` elements. Contents are whatever the last
    /// user left behind.
    pub fn floats(&mut self, len: usize) -> &mut [f32] {
        self.floats.entry(len).or_insert_with(|| vec![0.0; len])
    }

    /// Integer buffer of exactly `len` elements.
    pub fn ints(&mut self, len: usize) -> &mut [i32] {
        self.ints.entry(len).or_insert_with(|| vec![0; len])
    }

    /// Number of distinct buffers allocated so far.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.floats.len() + self.ints.len()
    }
}

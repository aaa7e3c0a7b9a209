//! Per-draw texture unit allocator.

use log::warn;

#[derive(Debug)]
pub struct TextureUnits {
    used: u32,
    max: u32,
}

impl TextureUnits {
    #[must_use]
    pub fn new(max: u32) -> Self {
        Self { used: 0, max }
    }

    /// Hands out the next unit. Past the driver limit the unit is still
    /// returned (the driver will reject the bind) and a warning is logged.
    pub fn allocate(&mut self) -> u32 {
        let unit = self.used;
        if unit >= self.max {
            warn!(
                "Trying to use {} texture units while this driver supports only {}",
                unit + 1,
                self.max
            );
        }
        self.used += 1;
        unit
    }

    #[inline]
    pub fn reset(&mut self) {
        self.used = 0;
    }

    #[inline]
    #[must_use]
    pub fn used(&self) -> u32 {
        self.used
    }
}

//! Vertex attribute enable tracking.
//!
//! Two bitsets drive attribute hygiene: `requested` collects the locations the
//! current draw needs, `enabled` mirrors what is enabled on the driver. After
//! the draw's attributes are set up, [`AttributeState::disable_unused`] turns
//! off everything left enabled by an earlier draw.

use log::warn;

use crate::driver::GlDriver;

/// Highest number of attribute locations tracked.
pub const MAX_TRACKED_ATTRIBUTES: u32 = 64;

#[derive(Debug)]
pub struct AttributeState {
    requested: u64,
    enabled: u64,
    /// Locations whose enabled bit is known to match the driver.
    known: u64,
    divisors: [Option<u32>; MAX_TRACKED_ATTRIBUTES as usize],
}

impl Default for AttributeState {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            requested: 0,
            enabled: 0,
            known: 0,
            divisors: [None; MAX_TRACKED_ATTRIBUTES as usize],
        }
    }

    /// Starts a new draw: nothing is requested yet.
    #[inline]
    pub fn init(&mut self) {
        self.requested = 0;
    }

    pub fn enable(&mut self, driver: &mut dyn GlDriver, location: u32) {
        self.enable_with_divisor(driver, location, 0);
    }

    pub fn enable_with_divisor(&mut self, driver: &mut dyn GlDriver, location: u32, divisor: u32) {
        if location >= MAX_TRACKED_ATTRIBUTES {
            warn!("Attribute location {location} exceeds the tracked range, ignoring");
            return;
        }
        let bit = 1u64 << location;
        self.requested |= bit;

        if self.enabled & bit == 0 || self.known & bit == 0 {
            driver.enable_vertex_attrib_array(location);
            self.enabled |= bit;
            self.known |= bit;
        }

        let slot = &mut self.divisors[location as usize];
        if *slot != Some(divisor) {
            driver.vertex_attrib_divisor(location, divisor);
            *slot = Some(divisor);
        }
    }

    /// Disables every attribute enabled by a previous draw and not requested
    /// since the last [`Self::init`].
    pub fn disable_unused(&mut self, driver: &mut dyn GlDriver) {
        let mut stale = self.enabled & !self.requested;
        while stale != 0 {
            let location = stale.trailing_zeros();
            driver.disable_vertex_attrib_array(location);
            stale &= stale - 1;
        }
        self.enabled &= self.requested;
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self, location: u32) -> bool {
        location < MAX_TRACKED_ATTRIBUTES && self.enabled & (1 << location) != 0
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverCall, RecordingDriver};

    #[test]
    fn test_disable_unused_only_touches_stale_locations() {
        let mut driver = RecordingDriver::new();
        let mut attrs = AttributeState::new();

        attrs.init();
        attrs.enable(&mut driver, 0);
        attrs.enable(&mut driver, 1);
        attrs.disable_unused(&mut driver);

        attrs.init();
        attrs.enable(&mut driver, 0);
        attrs.enable(&mut driver, 2);
        driver.clear_calls();
        attrs.disable_unused(&mut driver);

        assert_eq!(driver.calls(), &[DriverCall::DisableAttribArray(1)]);
        assert_eq!(driver.enabled_attributes(), vec![0, 2]);
    }

    #[test]
    fn test_repeated_enable_is_forwarded_once() {
        let mut driver = RecordingDriver::new();
        let mut attrs = AttributeState::new();
        for _ in 0..3 {
            attrs.init();
            attrs.enable(&mut driver, 4);
            attrs.disable_unused(&mut driver);
        }
        assert_eq!(driver.count(|c| matches!(c, DriverCall::EnableAttribArray(4))), 1);
        assert_eq!(driver.count(|c| matches!(c, DriverCall::AttribDivisor(4, 0))), 1);
    }
}

//! Program Cache
//!
//! Deduplicates programs by [`ProgramParameters::cache_key`]. Keys are
//! interned once with `lasso`; entries live in a `slotmap` so a released
//! [`ProgramHandle`] can never alias a newer program.
//!
//! Each entry is reference counted: [`ProgramCache::acquire`] bumps the count
//! of an existing entry or builds a new program, [`ProgramCache::release`]
//! drops it and deletes the driver program when the count reaches zero.
//!
//! The key interner only grows. Keys of released programs and keys left over
//! after [`ProgramCache::clear`] stay interned, so memory is bounded by the
//! number of distinct programs ever built, not by the number alive.

use lasso::{Rodeo, Spur};
use log::debug;
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use super::chunks::ChunkResolver;
use super::parameters::ProgramParameters;
use super::program::Program;
use crate::driver::GlDriver;
use crate::errors::{RenderError, Result};

new_key_type! {
    /// Stable handle to a cached [`Program`].
    pub struct ProgramHandle;
}

#[derive(Debug)]
struct CacheEntry {
    program: Program,
    key: Spur,
    used_times: u32,
}

#[derive(Debug, Default)]
pub struct ProgramCache {
    entries: SlotMap<ProgramHandle, CacheEntry>,
    keys: Rodeo,
    lookup: FxHashMap<Spur, ProgramHandle>,
    next_serial: u32,
}

impl ProgramCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the program for `params`, building it on a cache miss.
    ///
    /// A program that failed to compile or link is cached like any other so
    /// the failure is not retried every frame.
    pub fn acquire(
        &mut self,
        driver: &mut dyn GlDriver,
        resolver: &mut ChunkResolver,
        params: &ProgramParameters,
        check_errors: bool,
    ) -> Result<ProgramHandle> {
        let key = params.cache_key();
        if let Some(spur) = self.keys.get(&key)
            && let Some(&handle) = self.lookup.get(&spur)
            && let Some(entry) = self.entries.get_mut(handle)
        {
            entry.used_times += 1;
            return Ok(handle);
        }

        let serial = self.next_serial;
        let program = Program::new(driver, resolver, params, serial, check_errors)?;
        self.next_serial += 1;

        let spur = self.keys.get_or_intern(key);
        let handle = self.entries.insert(CacheEntry {
            program,
            key: spur,
            used_times: 1,
        });
        self.lookup.insert(spur, handle);
        Ok(handle)
    }

    /// Drops one reference; deletes the driver program at zero.
    pub fn release(&mut self, driver: &mut dyn GlDriver, handle: ProgramHandle) -> Result<()> {
        let entry = self.entries.get_mut(handle).ok_or(RenderError::InvalidProgramHandle)?;
        entry.used_times -= 1;
        if entry.used_times > 0 {
            return Ok(());
        }

        if let Some(entry) = self.entries.remove(handle) {
            self.lookup.remove(&entry.key);
            debug!("Program '{}' no longer used", entry.program.name());
            entry.program.destroy(driver);
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn get(&self, handle: ProgramHandle) -> Option<&Program> {
        self.entries.get(handle).map(|e| &e.program)
    }

    /// Current reference count of a live entry.
    #[must_use]
    pub fn used_times(&self, handle: ProgramHandle) -> Option<u32> {
        self.entries.get(handle).map(|e| e.used_times)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct keys interned since creation, live or not.
    #[inline]
    #[must_use]
    pub fn interned_keys(&self) -> usize {
        self.keys.len()
    }

    pub fn programs(&self) -> impl Iterator<Item = &Program> {
        self.entries.values().map(|e| &e.program)
    }

    /// Forgets every program without touching the driver. Used after context
    /// loss, when the driver objects are already gone.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lookup.clear();
    }
}

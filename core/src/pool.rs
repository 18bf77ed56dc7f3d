//! Generational pool with ABA-safe 32-bit handles.
//!
//! [`GenerationalPool`] stores objects in a dense slot array and hands out
//! [`GenHandle`]s: a `{ index: u16, generation: u16 }` pair. Freeing a slot
//! bumps its generation, so any handle still held by a client stops
//! resolving on the next lookup, even after the slot is reused.
//!
//! Each slot carries a *hot* value (the data touched on every lookup) and
//! an optional *cold* value (names, descriptors, rarely used metadata). Cold
//! data defaults to `()`.
//!
//! # Example
//!
//! ```
//! use verglas_core::pool::{GenHandle, GenerationalPool};
//!
//! let mut pool: GenerationalPool<u64, &str> = GenerationalPool::new();
//!
//! let first = pool.allocate_with_cold(7, "seven");
//! assert_eq!(first, GenHandle::new(0, 0));
//! assert_eq!(pool.get(first), Some(&7));
//! assert_eq!(pool.get_cold(first), Some(&"seven"));
//!
//! assert!(pool.free(first));
//! assert!(!pool.free(first));
//!
//! // The slot is reused with a new generation; the stale handle stays dead.
//! let second = pool.allocate_with_cold(8, "eight");
//! assert_eq!(second.index, first.index);
//! assert_ne!(second.generation, first.generation);
//! assert_eq!(pool.get(first), None);
//! ```
//!
//! # Generation wrap
//!
//! Generations are 16 bits wide and wrap. A stale handle held across 65536
//! reuses of the same slot validates again; callers must not rely on
//! uniqueness beyond that horizon.

use std::fmt;

use crate::report_error;

/// A `{index, generation}` pair referencing a slot of a [`GenerationalPool`].
///
/// `index == 0xFFFF` is the invalid sentinel whatever the generation.
/// Packed LSB-first: the index occupies the low 16 bits of [`to_bits`](Self::to_bits).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(C)]
pub struct GenHandle {
    pub index: u16,
    pub generation: u16,
}

static_assertions::assert_eq_size!(GenHandle, u32);

impl GenHandle {
    pub const INVALID_INDEX: u16 = 0xFFFF;
    pub const INVALID: Self = Self {
        index: Self::INVALID_INDEX,
        generation: 0,
    };

    pub const fn new(index: u16, generation: u16) -> Self {
        Self { index, generation }
    }

    pub const fn is_valid(self) -> bool {
        self.index != Self::INVALID_INDEX
    }

    pub const fn to_bits(self) -> u32 {
        self.index as u32 | ((self.generation as u32) << 16)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self {
            index: bits as u16,
            generation: (bits >> 16) as u16,
        }
    }
}

impl Default for GenHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for GenHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "GenHandle({}v{})", self.index, self.generation)
        } else {
            write!(f, "GenHandle(invalid)")
        }
    }
}

#[derive(Debug)]
struct Slot<H, C> {
    generation: u16,
    hot: Option<H>,
    cold: Option<C>,
}

/// Typed slot storage addressed by [`GenHandle`]s.
///
/// Allocation and release are O(1) (amortized when growing). The slot array
/// starts at [`INITIAL_CAPACITY`](Self::INITIAL_CAPACITY) and doubles up to
/// [`MAX_CAPACITY`](Self::MAX_CAPACITY) slots.
pub struct GenerationalPool<H, C = ()> {
    slots: Vec<Slot<H, C>>,
    free_list: Vec<u16>,
    live: usize,
    quarantined: usize,
}

impl<H, C> GenerationalPool<H, C> {
    pub const INITIAL_CAPACITY: usize = 32;
    pub const MAX_CAPACITY: usize = GenHandle::INVALID_INDEX as usize;

    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            quarantined: 0,
        }
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots currently backed by storage.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of retired slots waiting for [`recycle`](Self::recycle).
    pub fn quarantined(&self) -> usize {
        self.quarantined
    }

    /// Store a value with its cold data. Returns [`GenHandle::INVALID`] when
    /// the pool cannot grow any further.
    pub fn allocate_with_cold(&mut self, hot: H, cold: C) -> GenHandle {
        if self.free_list.is_empty() && !self.grow() {
            report_error!(
                "generational pool exhausted ({} slots)",
                Self::MAX_CAPACITY
            );
            return GenHandle::INVALID;
        }
        let Some(index) = self.free_list.pop() else {
            return GenHandle::INVALID;
        };
        let slot = &mut self.slots[index as usize];
        slot.hot = Some(hot);
        slot.cold = Some(cold);
        self.live += 1;
        GenHandle::new(index, slot.generation)
    }

    fn grow(&mut self) -> bool {
        let old = self.slots.len();
        if old >= Self::MAX_CAPACITY {
            return false;
        }
        let new = if old == 0 {
            Self::INITIAL_CAPACITY
        } else {
            (old * 2).min(Self::MAX_CAPACITY)
        };
        self.slots.reserve_exact(new - old);
        for _ in old..new {
            self.slots.push(Slot {
                generation: 0,
                hot: None,
                cold: None,
            });
        }
        // Pushed in reverse so the lowest index pops first.
        self.free_list.extend((old..new).rev().map(|i| i as u16));
        true
    }

    fn slot(&self, handle: GenHandle) -> Option<&Slot<H, C>> {
        if !handle.is_valid() {
            return None;
        }
        let Some(slot) = self.slots.get(handle.index as usize) else {
            report_error!(
                "handle index {} is out of bounds (capacity {})",
                handle.index,
                self.slots.len()
            );
            return None;
        };
        (slot.generation == handle.generation && slot.hot.is_some()).then_some(slot)
    }

    fn slot_mut(&mut self, handle: GenHandle) -> Option<&mut Slot<H, C>> {
        if !handle.is_valid() {
            return None;
        }
        let capacity = self.slots.len();
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            report_error!(
                "handle index {} is out of bounds (capacity {})",
                handle.index,
                capacity
            );
            return None;
        };
        (slot.generation == handle.generation && slot.hot.is_some()).then_some(slot)
    }

    /// Whether `handle` refers to a live slot.
    pub fn contains(&self, handle: GenHandle) -> bool {
        self.slot(handle).is_some()
    }

    pub fn get(&self, handle: GenHandle) -> Option<&H> {
        self.slot(handle).and_then(|slot| slot.hot.as_ref())
    }

    pub fn get_mut(&mut self, handle: GenHandle) -> Option<&mut H> {
        self.slot_mut(handle).and_then(|slot| slot.hot.as_mut())
    }

    pub fn get_cold(&self, handle: GenHandle) -> Option<&C> {
        self.slot(handle).and_then(|slot| slot.cold.as_ref())
    }

    pub fn get_cold_mut(&mut self, handle: GenHandle) -> Option<&mut C> {
        self.slot_mut(handle).and_then(|slot| slot.cold.as_mut())
    }

    /// Hot and cold data of a live slot.
    pub fn get_all(&self, handle: GenHandle) -> Option<(&H, &C)> {
        let slot = self.slot(handle)?;
        Some((slot.hot.as_ref()?, slot.cold.as_ref()?))
    }

    /// Release a slot and hand back its contents.
    pub fn take(&mut self, handle: GenHandle) -> Option<(H, C)> {
        let contents = self.invalidate(handle)?;
        self.free_list.push(handle.index);
        Some(contents)
    }

    /// Release a slot. Returns whether the handle was live.
    pub fn free(&mut self, handle: GenHandle) -> bool {
        self.take(handle).is_some()
    }

    /// Invalidate a handle without making its index available again.
    ///
    /// Lookups through `handle` fail immediately, but the slot index stays
    /// quarantined until [`recycle`](Self::recycle) is called with it. Used
    /// for resources the GPU may still be reading.
    pub fn retire(&mut self, handle: GenHandle) -> Option<(H, C)> {
        let contents = self.invalidate(handle)?;
        self.quarantined += 1;
        Some(contents)
    }

    /// Return a retired index to the free list.
    pub fn recycle(&mut self, index: u16) {
        debug_assert!(
            self.slots
                .get(index as usize)
                .is_some_and(|slot| slot.hot.is_none()),
            "recycling a live or unknown slot"
        );
        self.quarantined = self.quarantined.saturating_sub(1);
        self.free_list.push(index);
    }

    fn invalidate(&mut self, handle: GenHandle) -> Option<(H, C)> {
        let slot = self.slot_mut(handle)?;
        let hot = slot.hot.take()?;
        let cold = slot.cold.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;
        Some((hot, cold))
    }

    /// Iterate over live slots.
    pub fn iter(&self) -> impl Iterator<Item = (GenHandle, &H)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.hot
                .as_ref()
                .map(|hot| (GenHandle::new(index as u16, slot.generation), hot))
        })
    }

    /// Remove every live slot, returning the contents.
    pub fn drain(&mut self) -> Vec<(GenHandle, H, C)> {
        let handles: Vec<GenHandle> = self.iter().map(|(handle, _)| handle).collect();
        handles
            .into_iter()
            .filter_map(|handle| self.take(handle).map(|(hot, cold)| (handle, hot, cold)))
            .collect()
    }
}

impl<H, C: Default> GenerationalPool<H, C> {
    /// Store a value with default cold data.
    pub fn allocate(&mut self, hot: H) -> GenHandle {
        self.allocate_with_cold(hot, C::default())
    }
}

impl<H, C> Default for GenerationalPool<H, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H, C> fmt::Debug for GenerationalPool<H, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationalPool")
            .field("live", &self.live)
            .field("capacity", &self.slots.len())
            .field("quarantined", &self.quarantined)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticCatcher;

    #[test]
    fn test_first_handle_is_zero() {
        let catcher = DiagnosticCatcher::new();
        let mut pool: GenerationalPool<u32> = GenerationalPool::new();
        let handle = pool.allocate(42);
        assert_eq!(handle.index, 0);
        assert_eq!(handle.generation, 0);
        catcher.expect_none();
    }

    #[test]
    fn test_sequential_indices() {
        let mut pool: GenerationalPool<u32> = GenerationalPool::new();
        for i in 0..10u16 {
            assert_eq!(pool.allocate(i as u32), GenHandle::new(i, 0));
        }
        assert_eq!(pool.len(), 10);
    }

    #[test]
    fn test_free_twice() {
        let mut pool: GenerationalPool<u32> = GenerationalPool::new();
        let handle = pool.allocate(1);
        assert!(!pool.free(GenHandle::INVALID));
        assert!(pool.free(handle));
        assert!(!pool.free(handle));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_aba_protection() {
        let mut pool: GenerationalPool<&str> = GenerationalPool::new();
        let old = pool.allocate("old");
        pool.free(old);
        let new = pool.allocate("new");
        assert_eq!(old.index, new.index);
        assert_ne!(old.generation, new.generation);
        assert_eq!(pool.get(old), None);
        assert_eq!(pool.get(new), Some(&"new"));
    }

    #[test]
    fn test_invalid_handle_is_silent() {
        let catcher = DiagnosticCatcher::new();
        let pool: GenerationalPool<u32> = GenerationalPool::new();
        assert_eq!(pool.get(GenHandle::new(0xFFFF, 0)), None);
        assert_eq!(pool.get(GenHandle::new(0xFFFF, 12)), None);
        catcher.expect_none();
    }

    #[test]
    fn test_out_of_bounds_reports_once() {
        let catcher = DiagnosticCatcher::new();
        let mut pool: GenerationalPool<u32> = GenerationalPool::new();
        pool.allocate(0);
        assert_eq!(pool.get(GenHandle::new(1000, 0)), None);
        catcher.expect_count(1);
    }

    #[test]
    fn test_growth_doubles() {
        let mut pool: GenerationalPool<usize> = GenerationalPool::new();
        for i in 0..33 {
            pool.allocate(i);
        }
        assert_eq!(pool.capacity(), 64);
        let handles: Vec<_> = pool.iter().map(|(h, _)| h).collect();
        assert_eq!(handles.len(), 33);
        for (handle, value) in pool.iter() {
            assert_eq!(handle.index as usize, *value);
        }
    }

    #[test]
    fn test_exhaustion() {
        let catcher = DiagnosticCatcher::new();
        let mut pool: GenerationalPool<()> = GenerationalPool::new();
        for _ in 0..GenerationalPool::<()>::MAX_CAPACITY {
            assert!(pool.allocate(()).is_valid());
        }
        catcher.expect_none();
        assert_eq!(pool.allocate(()), GenHandle::INVALID);
        catcher.expect_count(1);
    }

    #[test]
    fn test_generation_wraps() {
        let mut pool: GenerationalPool<u8> = GenerationalPool::new();
        let first = pool.allocate(0);
        pool.free(first);
        for _ in 0..u16::MAX {
            let h = pool.allocate(0);
            pool.free(h);
        }
        // After 2^16 reuses the stale handle aliases again.
        let aliased = pool.allocate(1);
        assert_eq!(aliased, first);
        assert_eq!(pool.get(first), Some(&1));
    }

    #[test]
    fn test_cold_data() {
        let mut pool: GenerationalPool<u32, String> = GenerationalPool::new();
        let handle = pool.allocate_with_cold(5, "five".to_string());
        pool.get_cold_mut(handle).unwrap().push('!');
        assert_eq!(pool.get_all(handle), Some((&5, &"five!".to_string())));
        let (hot, cold) = pool.take(handle).unwrap();
        assert_eq!(hot, 5);
        assert_eq!(cold, "five!");
        assert_eq!(pool.get_cold(handle), None);
    }

    #[test]
    fn test_retire_quarantines_index() {
        let mut pool: GenerationalPool<u32> = GenerationalPool::new();
        let retired = pool.allocate(1);
        assert_eq!(pool.retire(retired), Some((1, ())));
        assert_eq!(pool.get(retired), None);
        assert!(!pool.free(retired));
        assert_eq!(pool.quarantined(), 1);

        let next = pool.allocate(2);
        assert_ne!(next.index, retired.index);

        pool.recycle(retired.index);
        assert_eq!(pool.quarantined(), 0);
        let reused = pool.allocate(3);
        assert_eq!(reused.index, retired.index);
        assert_eq!(reused.generation, retired.generation + 1);
    }

    #[test]
    fn test_handle_bits() {
        let handle = GenHandle::new(0x1234, 0xABCD);
        assert_eq!(handle.to_bits(), 0xABCD_1234);
        assert_eq!(GenHandle::from_bits(0xABCD_1234), handle);
        assert!(!GenHandle::default().is_valid());
        assert_eq!(format!("{:?}", GenHandle::INVALID), "GenHandle(invalid)");
    }

    #[test]
    fn test_drain() {
        let mut pool: GenerationalPool<u32> = GenerationalPool::new();
        pool.allocate(1);
        let b = pool.allocate(2);
        pool.allocate(3);
        pool.free(b);
        let drained = pool.drain();
        assert_eq!(drained.len(), 2);
        assert!(pool.is_empty());
    }
}

//! Per-frame timestamp slots.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

/// Timestamp slots available to one frame.
pub const TIMESTAMPS_PER_FRAME: u32 = 1024;

/// Timestamp slots of one frame context.
///
/// Indices are handed out with an atomic bump so any command list of the
/// frame can reserve one. Ticks are read back lazily once the frame has
/// executed and cached until the context is reused.
#[derive(Debug, Default)]
pub(crate) struct TimestampRing {
    next: AtomicU32,
    resolved: Mutex<Option<Vec<u64>>>,
}

impl TimestampRing {
    /// Reserve the next slot, `None` when the frame is out of slots.
    pub fn reserve(&self) -> Option<u32> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        (index < TIMESTAMPS_PER_FRAME).then_some(index)
    }

    /// Slots reserved so far.
    pub fn recorded(&self) -> u32 {
        self.next.load(Ordering::Acquire).min(TIMESTAMPS_PER_FRAME)
    }

    pub fn reset(&self) {
        self.next.store(0, Ordering::Release);
        *self.resolved.lock() = None;
    }

    /// Cached ticks, reading them with `read` on first use.
    pub fn resolve<E>(
        &self,
        read: impl FnOnce(u32) -> Result<Vec<u64>, E>,
    ) -> Result<Vec<u64>, E> {
        let mut resolved = self.resolved.lock();
        if let Some(ticks) = resolved.as_ref() {
            return Ok(ticks.clone());
        }
        let ticks = read(self.recorded())?;
        *resolved = Some(ticks.clone());
        Ok(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_until_full() {
        let ring = TimestampRing::default();
        for expected in 0..TIMESTAMPS_PER_FRAME {
            assert_eq!(ring.reserve(), Some(expected));
        }
        assert_eq!(ring.reserve(), None);
        assert_eq!(ring.recorded(), TIMESTAMPS_PER_FRAME);

        ring.reset();
        assert_eq!(ring.reserve(), Some(0));
    }

    #[test]
    fn test_resolve_reads_once() {
        let ring = TimestampRing::default();
        ring.reserve();
        ring.reserve();

        let mut reads = 0;
        let first = ring.resolve::<()>(|count| {
            reads += 1;
            Ok((0..count as u64).map(|i| i * 10).collect())
        });
        assert_eq!(first, Ok(vec![0, 10]));

        let second = ring.resolve::<()>(|_| {
            reads += 1;
            Ok(Vec::new())
        });
        assert_eq!(second, Ok(vec![0, 10]));
        assert_eq!(reads, 1);
    }
}

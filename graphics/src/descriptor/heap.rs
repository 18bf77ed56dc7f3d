//! Process-wide descriptor heaps.
//!
//! Each heap is a fixed range of slots handed out by a linear allocator.
//! The fast path is a single atomic bump. Released ranges go through a
//! free list that only hands them out again once the frame that released
//! them has executed on the GPU.

use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapKind {
    CbvSrvUav,
    Sampler,
    RenderTargetView,
    DepthStencilView,
}

impl HeapKind {
    pub fn capacity(self) -> u32 {
        match self {
            Self::CbvSrvUav => 1 << 16,
            Self::Sampler => 1024,
            Self::RenderTargetView => 2048,
            Self::DepthStencilView => 256,
        }
    }

    pub fn is_shader_visible(self) -> bool {
        matches!(self, Self::CbvSrvUav | Self::Sampler)
    }
}

#[derive(Debug, Default)]
struct FreeList {
    ready: Vec<Range<u32>>,
    /// Ranges released during a frame that has not executed yet.
    pending: Vec<(u64, Range<u32>)>,
}

/// Linear slot allocator with a frame-deferred free list.
#[derive(Debug)]
pub struct DescriptorHeap {
    kind: HeapKind,
    capacity: u32,
    next: AtomicU32,
    free: Mutex<FreeList>,
}

impl DescriptorHeap {
    pub fn new(kind: HeapKind) -> Self {
        Self::with_capacity(kind, kind.capacity())
    }

    pub fn with_capacity(kind: HeapKind, capacity: u32) -> Self {
        Self {
            kind,
            capacity,
            next: AtomicU32::new(0),
            free: Mutex::new(FreeList::default()),
        }
    }

    pub fn kind(&self) -> HeapKind {
        self.kind
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots handed out by the linear allocator so far, freed ones included.
    pub fn high_water_mark(&self) -> u32 {
        self.next.load(Ordering::Acquire).min(self.capacity)
    }

    /// Reserve `count` contiguous slots. Returns the first slot.
    pub fn allocate(&self, count: u32) -> Option<u32> {
        if count == 0 {
            return Some(0);
        }

        {
            let mut free = self.free.lock();
            if let Some(pos) = free.ready.iter().position(|r| r.len() as u32 >= count) {
                let range = free.ready[pos].clone();
                if range.len() as u32 == count {
                    free.ready.swap_remove(pos);
                } else {
                    free.ready[pos] = range.start + count..range.end;
                }
                return Some(range.start);
            }
        }

        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let end = current.checked_add(count)?;
            if end > self.capacity {
                return None;
            }
            match self.next.compare_exchange_weak(
                current,
                end,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(current),
                Err(actual) => current = actual,
            }
        }
    }

    /// Release `count` slots starting at `start`, reusable once `frame_id` has executed.
    pub fn free(&self, start: u32, count: u32, frame_id: u64) {
        if count == 0 {
            return;
        }
        self.free.lock().pending.push((frame_id, start..start + count));
    }

    /// Move ranges released up to `completed_frame` to the ready list.
    pub fn retire(&self, completed_frame: u64) {
        let mut free = self.free.lock();
        let FreeList { ready, pending } = &mut *free;
        pending.retain(|(frame_id, range)| {
            if *frame_id <= completed_frame {
                ready.push(range.clone());
                false
            } else {
                true
            }
        });
    }

    pub fn pending_count(&self) -> usize {
        self.free.lock().pending.len()
    }
}

/// The four heaps of a graphics context.
#[derive(Debug)]
pub struct DescriptorHeaps {
    pub cbv_srv_uav: DescriptorHeap,
    pub sampler: DescriptorHeap,
    pub rtv: DescriptorHeap,
    pub dsv: DescriptorHeap,
}

impl DescriptorHeaps {
    pub fn new() -> Self {
        Self {
            cbv_srv_uav: DescriptorHeap::new(HeapKind::CbvSrvUav),
            sampler: DescriptorHeap::new(HeapKind::Sampler),
            rtv: DescriptorHeap::new(HeapKind::RenderTargetView),
            dsv: DescriptorHeap::new(HeapKind::DepthStencilView),
        }
    }

    pub fn heap(&self, kind: HeapKind) -> &DescriptorHeap {
        match kind {
            HeapKind::CbvSrvUav => &self.cbv_srv_uav,
            HeapKind::Sampler => &self.sampler,
            HeapKind::RenderTargetView => &self.rtv,
            HeapKind::DepthStencilView => &self.dsv,
        }
    }

    pub fn retire(&self, completed_frame: u64) {
        self.cbv_srv_uav.retire(completed_frame);
        self.sampler.retire(completed_frame);
        self.rtv.retire(completed_frame);
        self.dsv.retire(completed_frame);
    }
}

impl Default for DescriptorHeaps {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_capacities() {
        let heaps = DescriptorHeaps::new();
        assert_eq!(heaps.cbv_srv_uav.capacity(), 65536);
        assert_eq!(heaps.sampler.capacity(), 1024);
        assert_eq!(heaps.rtv.capacity(), 2048);
        assert_eq!(heaps.dsv.capacity(), 256);
        assert!(!HeapKind::RenderTargetView.is_shader_visible());
    }

    #[test]
    fn test_linear_allocation_and_exhaustion() {
        let heap = DescriptorHeap::with_capacity(HeapKind::Sampler, 8);
        assert_eq!(heap.allocate(3), Some(0));
        assert_eq!(heap.allocate(3), Some(3));
        assert_eq!(heap.allocate(3), None);
        assert_eq!(heap.allocate(2), Some(6));
        assert_eq!(heap.high_water_mark(), 8);
    }

    #[test]
    fn test_freed_slots_wait_for_frame() {
        let heap = DescriptorHeap::with_capacity(HeapKind::CbvSrvUav, 4);
        let start = heap.allocate(4).unwrap();
        heap.free(start, 4, 7);

        assert_eq!(heap.allocate(2), None);
        heap.retire(6);
        assert_eq!(heap.allocate(2), None);

        heap.retire(7);
        assert_eq!(heap.pending_count(), 0);
        assert_eq!(heap.allocate(2), Some(0));
        assert_eq!(heap.allocate(2), Some(2));
        assert_eq!(heap.allocate(1), None);
    }

    #[test]
    fn test_concurrent_allocation_is_disjoint() {
        let heap = Arc::new(DescriptorHeap::with_capacity(HeapKind::CbvSrvUav, 4096));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let heap = Arc::clone(&heap);
                std::thread::spawn(move || {
                    (0..64).filter_map(|_| heap.allocate(4)).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut starts: Vec<u32> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();
        starts.sort_unstable();
        assert_eq!(starts.len(), 512);
        assert!(starts.windows(2).all(|w| w[1] - w[0] == 4));
    }
}

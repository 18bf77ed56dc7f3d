//! The ring of frame contexts.
//!
//! Frame `f` records into context `f % N`. A context is prepared lazily the
//! first time frame `f` touches it: the CPU waits until the frame that last
//! used the context has executed, then recycles its command lists and
//! timestamp slots. Together with the wait at the end of every frame this
//! keeps the CPU at most `N` frames ahead of the GPU.

mod timestamps;

pub use timestamps::TIMESTAMPS_PER_FRAME;
pub(crate) use timestamps::TimestampRing;

use parking_lot::{Mutex, MutexGuard};

use crate::command::{Command, QueueType};

/// Command lists of one queue class inside one frame context.
#[derive(Debug, Default)]
pub(crate) struct AllocationSet {
    /// Cleared lists ready for recording.
    available: Vec<Vec<Command>>,
    /// Closed lists waiting for `end_frame`.
    recorded: Vec<Vec<Command>>,
    /// Submitted lists the GPU may still be executing.
    in_flight: Vec<Vec<Command>>,
}

impl AllocationSet {
    pub fn acquire(&mut self) -> Vec<Command> {
        self.available.pop().unwrap_or_default()
    }

    pub fn close(&mut self, list: Vec<Command>) {
        self.recorded.push(list);
    }

    pub fn recorded(&self) -> &[Vec<Command>] {
        &self.recorded
    }

    /// Mark every recorded list as submitted.
    pub fn mark_submitted(&mut self) {
        self.in_flight.append(&mut self.recorded);
    }

    /// Make executed lists available again.
    pub fn recycle(&mut self) {
        for mut list in self.in_flight.drain(..) {
            list.clear();
            self.available.push(list);
        }
    }

    pub fn list_count(&self) -> usize {
        self.available.len() + self.recorded.len() + self.in_flight.len()
    }
}

/// One slot of the frame ring.
#[derive(Debug)]
pub(crate) struct FrameContext {
    pub index: usize,
    /// The frame this context was last prepared for, 0 before first use.
    frame_id: Mutex<u64>,
    sets: [Mutex<AllocationSet>; 3],
    pub timestamps: TimestampRing,
}

impl FrameContext {
    fn new(index: usize) -> Self {
        Self {
            index,
            frame_id: Mutex::new(0),
            sets: Default::default(),
            timestamps: TimestampRing::default(),
        }
    }

    pub fn frame_id(&self) -> u64 {
        *self.frame_id.lock()
    }

    /// Make the context ready to record `frame_id`.
    ///
    /// `wait` blocks until a frame has executed, `reset` recycles the
    /// backend state of the context. Both only run on the first call for
    /// a given frame.
    pub fn prepare<E>(
        &self,
        frame_id: u64,
        wait: impl FnOnce(u64) -> Result<(), E>,
        reset: impl FnOnce(usize) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut current = self.frame_id.lock();
        if *current == frame_id {
            return Ok(());
        }
        if *current != 0 {
            wait(*current)?;
        }
        reset(self.index)?;
        for set in &self.sets {
            set.lock().recycle();
        }
        self.timestamps.reset();
        log::debug!(
            "Frame context {} rotated from frame {} to {}",
            self.index,
            *current,
            frame_id
        );
        *current = frame_id;
        Ok(())
    }

    pub fn lock_set(&self, queue: QueueType) -> MutexGuard<'_, AllocationSet> {
        self.sets[queue.slot()].lock()
    }

    /// Lock a set without blocking, `None` while a list is being recorded.
    pub fn try_lock_set(&self, queue: QueueType) -> Option<MutexGuard<'_, AllocationSet>> {
        self.sets[queue.slot()].try_lock()
    }
}

/// The fixed ring of frame contexts.
#[derive(Debug)]
pub(crate) struct FrameRing {
    contexts: Vec<FrameContext>,
}

impl FrameRing {
    pub fn new(count: usize) -> Self {
        Self {
            contexts: (0..count).map(FrameContext::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn index_of(&self, frame_id: u64) -> usize {
        (frame_id % self.contexts.len() as u64) as usize
    }

    pub fn context_for(&self, frame_id: u64) -> &FrameContext {
        &self.contexts[self.index_of(frame_id)]
    }
}

//! The queue thread of the software executor.
//!
//! Submissions are lowered to owned [`Op`]s on the caller's thread and sent
//! to a dedicated thread that runs them in order and then signals the
//! frame fence. The thread holds its own references to every buffer and
//! image it touches, so objects released by the registry stay alive until
//! the work that uses them has run.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use super::SoftwareImage;
use crate::error::GraphicsError;
use crate::types::{Extent3d, TextureMemoryFootprint};

/// Linear memory shared between a buffer handle and queued work.
pub(crate) type Memory = Arc<Mutex<Vec<u8>>>;

/// One unit of work the queue thread runs.
#[derive(Debug)]
pub(crate) enum Op {
    CopyBuffer {
        src: Memory,
        src_offset: u64,
        dst: Memory,
        dst_offset: u64,
        size: u64,
    },
    BufferToTexture {
        buffer: Memory,
        footprint: TextureMemoryFootprint,
        image: Arc<SoftwareImage>,
        sub_resource: usize,
    },
    TextureToBuffer {
        image: Arc<SoftwareImage>,
        sub_resource: usize,
        buffer: Memory,
        footprint: TextureMemoryFootprint,
    },
    TextureToTexture {
        src: Arc<SoftwareImage>,
        src_sub_resource: usize,
        dst: Arc<SoftwareImage>,
        dst_sub_resource: usize,
        extent: Extent3d,
    },
    Clear {
        image: Arc<SoftwareImage>,
        sub_resource: usize,
        texel: Vec<u8>,
    },
    Timestamp {
        frame_index: usize,
        index: u32,
    },
    Present {
        image: u32,
    },
}

/// Everything one frame submitted.
#[derive(Debug)]
pub(crate) struct Job {
    pub ops: Vec<Op>,
    pub signal_value: u64,
}

/// The frame fence: a monotonic counter the queue thread advances.
#[derive(Debug, Default)]
pub(crate) struct Fence {
    completed: Mutex<u64>,
    signalled: Condvar,
}

impl Fence {
    pub fn value(&self) -> u64 {
        *self.completed.lock()
    }

    pub fn signal(&self, value: u64) {
        let mut completed = self.completed.lock();
        *completed = (*completed).max(value);
        self.signalled.notify_all();
    }

    pub fn wait(&self, value: u64) {
        let mut completed = self.completed.lock();
        while *completed < value {
            self.signalled.wait(&mut completed);
        }
    }
}

/// Lets tests stall the queue thread between jobs.
#[derive(Debug, Default)]
pub struct QueueGate {
    held: Mutex<bool>,
    changed: Condvar,
}

impl QueueGate {
    /// Stop the queue before its next job.
    pub fn hold(&self) {
        *self.held.lock() = true;
    }

    pub fn release(&self) {
        *self.held.lock() = false;
        self.changed.notify_all();
    }

    pub fn is_held(&self) -> bool {
        *self.held.lock()
    }

    fn pass(&self) {
        let mut held = self.held.lock();
        while *held {
            self.changed.wait(&mut held);
        }
    }
}

/// State shared between the backend and its queue thread.
#[derive(Debug)]
pub(crate) struct QueueShared {
    pub fence: Fence,
    pub gate: Arc<QueueGate>,
    pub epoch: Instant,
    pub timestamps: Mutex<Vec<Vec<u64>>>,
    pub presented: Mutex<Vec<u32>>,
}

pub(crate) fn spawn(
    shared: Arc<QueueShared>,
    jobs: Receiver<Job>,
) -> Result<JoinHandle<()>, GraphicsError> {
    std::thread::Builder::new()
        .name("verglas-software-queue".into())
        .spawn(move || {
            verglas_core::set_thread_name!("verglas-software-queue");
            for job in jobs {
                shared.gate.pass();
                run(&shared, job);
            }
            log::debug!("Software queue thread exiting");
        })
        .map_err(|e| GraphicsError::InitializationFailed(format!("queue thread: {e}")))
}

fn run(shared: &QueueShared, job: Job) {
    verglas_core::profile_scope!("software_queue_job");
    for op in job.ops {
        execute(shared, op);
    }
    shared.fence.signal(job.signal_value);
    log::trace!("Software queue signalled {}", job.signal_value);
}

fn execute(shared: &QueueShared, op: Op) {
    match op {
        Op::CopyBuffer {
            src,
            src_offset,
            dst,
            dst_offset,
            size,
        } => {
            let (src_offset, dst_offset, size) =
                (src_offset as usize, dst_offset as usize, size as usize);
            if Arc::ptr_eq(&src, &dst) {
                src.lock()
                    .copy_within(src_offset..src_offset + size, dst_offset);
            } else {
                let src = src.lock();
                dst.lock()[dst_offset..dst_offset + size]
                    .copy_from_slice(&src[src_offset..src_offset + size]);
            }
        }
        Op::BufferToTexture {
            buffer,
            footprint,
            image,
            sub_resource,
        } => {
            let buffer = buffer.lock();
            image.write_rows(sub_resource, &footprint, &buffer);
        }
        Op::TextureToBuffer {
            image,
            sub_resource,
            buffer,
            footprint,
        } => {
            let mut buffer = buffer.lock();
            image.read_rows(sub_resource, &footprint, &mut buffer);
        }
        Op::TextureToTexture {
            src,
            src_sub_resource,
            dst,
            dst_sub_resource,
            extent,
        } => SoftwareImage::copy(&src, src_sub_resource, &dst, dst_sub_resource, extent),
        Op::Clear {
            image,
            sub_resource,
            texel,
        } => image.clear(sub_resource, &texel),
        Op::Timestamp { frame_index, index } => {
            let ticks = shared.epoch.elapsed().as_nanos() as u64;
            if let Some(slot) = shared
                .timestamps
                .lock()
                .get_mut(frame_index)
                .and_then(|frame| frame.get_mut(index as usize))
            {
                *slot = ticks;
            }
        }
        Op::Present { image } => shared.presented.lock().push(image),
    }
}

/// Sending half of the queue, joined on drop.
#[derive(Debug)]
pub(crate) struct QueueThread {
    sender: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl QueueThread {
    pub fn new(sender: Sender<Job>, handle: JoinHandle<()>) -> Self {
        Self {
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    pub fn send(&self, job: Job) -> Result<(), GraphicsError> {
        self.sender
            .as_ref()
            .ok_or(GraphicsError::DeviceLost)?
            .send(job)
            .map_err(|_| GraphicsError::DeviceLost)
    }
}

impl Drop for QueueThread {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("Software queue thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_signal_is_monotonic() {
        let fence = Fence::default();
        fence.signal(3);
        fence.signal(2);
        assert_eq!(fence.value(), 3);
        fence.wait(3);
    }

    #[test]
    fn test_gate_blocks_until_released() {
        let gate = Arc::new(QueueGate::default());
        gate.hold();
        assert!(gate.is_held());

        let passed = Arc::new(Mutex::new(false));
        let worker = {
            let gate = gate.clone();
            let passed = passed.clone();
            std::thread::spawn(move || {
                gate.pass();
                *passed.lock() = true;
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!*passed.lock());

        gate.release();
        worker.join().unwrap();
        assert!(*passed.lock());
    }
}

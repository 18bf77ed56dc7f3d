//! The frame fence as a timeline semaphore.

use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk;

use crate::error::GraphicsError;

use super::conversion::convert_result;

/// Timeline semaphore signalled with each frame's id.
#[derive(Debug)]
pub(super) struct FrameTimeline {
    pub semaphore: vk::Semaphore,
    /// Highest value handed to a queue submission.
    submitted: AtomicU64,
}

impl FrameTimeline {
    pub fn new(device: &ash::Device) -> Result<Self, GraphicsError> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
        let semaphore = unsafe { device.create_semaphore(&create_info, None) }.map_err(|e| {
            GraphicsError::InitializationFailed(format!("Failed to create frame fence: {:?}", e))
        })?;
        Ok(Self {
            semaphore,
            submitted: AtomicU64::new(0),
        })
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Acquire)
    }

    pub fn mark_submitted(&self, value: u64) {
        self.submitted.fetch_max(value, Ordering::AcqRel);
    }

    /// Last value the GPU signalled. A lost device reads as "nothing new".
    pub fn completed(&self, device: &ash::Device) -> u64 {
        match unsafe { device.get_semaphore_counter_value(self.semaphore) } {
            Ok(value) => value,
            Err(e) => {
                log::error!("Failed to read frame fence: {:?}", e);
                0
            }
        }
    }

    pub fn wait(&self, device: &ash::Device, value: u64) -> Result<(), GraphicsError> {
        if value > self.submitted() {
            return Err(GraphicsError::Internal(format!(
                "waiting for fence value {value} that was never submitted"
            )));
        }
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        unsafe { device.wait_semaphores(&wait_info, u64::MAX) }
            .map_err(|e| convert_result("wait for frame fence", e))
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe { device.destroy_semaphore(self.semaphore, None) };
    }
}

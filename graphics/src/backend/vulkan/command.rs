//! Per-frame-context command pools and timestamp query pools.

use ash::vk;

use crate::error::GraphicsError;
use crate::frame::TIMESTAMPS_PER_FRAME;

use super::conversion::convert_result;

/// Command recording state owned by one frame context.
///
/// Only touched again after the frame fence proved the previous use of the
/// context has executed, so resetting the whole pool is safe.
#[derive(Debug)]
pub(super) struct FrameResources {
    pub pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    /// `None` when the queue family cannot write timestamps.
    pub queries: Option<vk::QueryPool>,
}

impl FrameResources {
    pub fn new(
        device: &ash::Device,
        queue_family_index: u32,
        timestamps: bool,
    ) -> Result<Self, GraphicsError> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let pool = unsafe { device.create_command_pool(&pool_info, None) }.map_err(|e| {
            GraphicsError::InitializationFailed(format!("Failed to create command pool: {:?}", e))
        })?;

        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = match unsafe { device.allocate_command_buffers(&allocate_info) } {
            Ok(buffers) => buffers[0],
            Err(e) => {
                unsafe { device.destroy_command_pool(pool, None) };
                return Err(convert_result("allocate command buffer", e));
            }
        };

        let queries = if timestamps {
            let query_info = vk::QueryPoolCreateInfo::default()
                .query_type(vk::QueryType::TIMESTAMP)
                .query_count(TIMESTAMPS_PER_FRAME);
            match unsafe { device.create_query_pool(&query_info, None) } {
                Ok(pool) => Some(pool),
                Err(e) => {
                    log::warn!("No timestamp query pool: {:?}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            pool,
            command_buffer,
            queries,
        })
    }

    pub fn reset(&self, device: &ash::Device) -> Result<(), GraphicsError> {
        unsafe { device.reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty()) }
            .map_err(|e| convert_result("reset command pool", e))
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            if let Some(queries) = self.queries {
                device.destroy_query_pool(queries, None);
            }
            device.destroy_command_pool(self.pool, None);
        }
    }
}

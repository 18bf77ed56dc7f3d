//! GPU memory allocator integration using gpu-allocator.

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};

use crate::error::GraphicsError;
use crate::types::MemoryPlacement;

pub fn create_allocator(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
) -> Result<Allocator, GraphicsError> {
    Allocator::new(&AllocatorCreateDesc {
        instance: instance.clone(),
        device,
        physical_device,
        debug_settings: Default::default(),
        buffer_device_address: false,
        allocation_sizes: gpu_allocator::AllocationSizes::default(),
    })
    .map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create memory allocator: {}", e))
    })
}

/// Heap a placement allocates from. Host visible heaps come back mapped.
pub fn memory_location(placement: MemoryPlacement) -> MemoryLocation {
    match placement {
        MemoryPlacement::GpuOnly => MemoryLocation::GpuOnly,
        MemoryPlacement::StageOnce | MemoryPlacement::StageEveryFrame => MemoryLocation::CpuToGpu,
        MemoryPlacement::Readback => MemoryLocation::GpuToCpu,
    }
}

pub fn allocation_error(what: &str, error: gpu_allocator::AllocationError) -> GraphicsError {
    match error {
        gpu_allocator::AllocationError::OutOfMemory => GraphicsError::OutOfMemory,
        other => GraphicsError::ResourceCreationFailed(format!("{what}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_heaps() {
        assert_eq!(memory_location(MemoryPlacement::GpuOnly), MemoryLocation::GpuOnly);
        assert_eq!(
            memory_location(MemoryPlacement::StageEveryFrame),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(memory_location(MemoryPlacement::Readback), MemoryLocation::GpuToCpu);
    }
}

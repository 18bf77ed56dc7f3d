//! Buffer types and descriptors.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::handles::BufferHandle;

/// Where a resource's memory lives and how the CPU may touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryPlacement {
    /// Device local. Never mapped; filled through staging copies.
    #[default]
    GpuOnly,
    /// Host visible, written once and read by the GPU (upload heap).
    StageOnce,
    /// Host visible, rewritten every frame.
    StageEveryFrame,
    /// Host visible, written by the GPU and read back by the CPU.
    Readback,
}

impl MemoryPlacement {
    pub fn is_cpu_visible(self) -> bool {
        !matches!(self, Self::GpuOnly)
    }

    /// Whether CPU writes through a mapping reach the GPU.
    pub fn is_upload(self) -> bool {
        matches!(self, Self::StageOnce | Self::StageEveryFrame)
    }
}

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Source of a copy.
        const TRANSFER_SRC = 1 << 0;
        /// Destination of a copy.
        const TRANSFER_DST = 1 << 1;
        /// Bound as a constant (uniform) buffer.
        const CONSTANT = 1 << 2;
        /// Read-only storage buffer.
        const READ = 1 << 3;
        /// Read-write storage buffer.
        const WRITE = 1 << 4;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
        const INDEX = 1 << 5;
        const VERTEX = 1 << 6;
        const INDIRECT = 1 << 7;
        const ACCELERATION_STRUCTURE = 1 << 8;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

impl BufferUsage {
    /// Usages a buffer in `placement` may not combine with.
    pub fn forbidden_for(placement: MemoryPlacement) -> Self {
        match placement {
            MemoryPlacement::GpuOnly => Self::empty(),
            MemoryPlacement::StageOnce | MemoryPlacement::StageEveryFrame => {
                Self::WRITE | Self::ACCELERATION_STRUCTURE
            }
            MemoryPlacement::Readback => !Self::TRANSFER_DST,
        }
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferCreateDesc {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    pub placement: MemoryPlacement,
    pub usage: BufferUsage,
}

impl BufferCreateDesc {
    pub fn new(size: u64, placement: MemoryPlacement, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            placement,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A CPU view of a mapped buffer range.
///
/// The client fills in the range, hands the mapping to
/// [`GraphicsContext::map_buffer`](crate::GraphicsContext::map_buffer) and
/// later to `unmap_buffer`, which publishes the bytes for upload placements.
/// A `size` of zero maps everything from `offset` to the end of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferMapping {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
    /// The previous contents are not read back when mapping.
    pub pure_write: bool,
    bytes: Vec<u8>,
}

impl BufferMapping {
    pub fn new(buffer: BufferHandle, offset: u64, size: u64) -> Self {
        Self {
            buffer,
            offset,
            size,
            pure_write: false,
            bytes: Vec::new(),
        }
    }

    /// Map the whole buffer.
    pub fn whole(buffer: BufferHandle) -> Self {
        Self::new(buffer, 0, 0)
    }

    pub fn with_pure_write(mut self, pure_write: bool) -> Self {
        self.pure_write = pure_write;
        self
    }

    /// Whether the mapping currently holds CPU bytes.
    pub fn is_mapped(&self) -> bool {
        !self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Copy `data` into the mapping at `offset`.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> bool {
        let Some(end) = offset.checked_add(data.len()) else {
            return false;
        };
        let Some(dst) = self.bytes.get_mut(offset..end) else {
            return false;
        };
        dst.copy_from_slice(data);
        true
    }

    pub(crate) fn fill(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
    }

    pub(crate) fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferCopyParameters {
    pub copy_size: u64,
    pub buffer_src: BufferHandle,
    pub buffer_dst: BufferHandle,
    pub offset_src: u64,
    pub offset_dst: u64,
}

impl BufferCopyParameters {
    pub fn new(buffer_src: BufferHandle, buffer_dst: BufferHandle, copy_size: u64) -> Self {
        Self {
            copy_size,
            buffer_src,
            buffer_dst,
            offset_src: 0,
            offset_dst: 0,
        }
    }

    pub fn with_offsets(mut self, offset_src: u64, offset_dst: u64) -> Self {
        self.offset_src = offset_src;
        self.offset_dst = offset_dst;
        self
    }
}

/// A buffer range used for vertex and index binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferSpan {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
    pub stride: u32,
}

impl BufferSpan {
    pub fn new(buffer: BufferHandle, size: u64) -> Self {
        Self {
            buffer,
            offset: 0,
            size,
            stride: 0,
        }
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    U16,
    #[default]
    U32,
}

impl IndexFormat {
    pub fn size(self) -> u32 {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

bitflags! {
    /// How a shader accesses a buffer view.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferViewAccess: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
        /// Constant-buffer access.
        const CONSTANT = 1 << 2;
    }
}

/// Descriptor for a typed window onto a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferViewDesc {
    pub label: Option<String>,
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
    pub stride: u32,
    pub access: BufferViewAccess,
}

impl BufferViewDesc {
    pub fn new(buffer: BufferHandle, size: u64, stride: u32, access: BufferViewAccess) -> Self {
        Self {
            label: None,
            buffer,
            offset: 0,
            size,
            stride,
            access,
        }
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

// ============================================================================
// Indirect Drawing Arguments
// ============================================================================

/// Arguments for a non-indexed indirect draw call.
///
/// Matches the GPU layout for `vkCmdDrawIndirect`, `DrawInstanced` and
/// `drawPrimitives:indirectBuffer:`. The buffer holding these arguments must
/// have [`BufferUsage::INDIRECT`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct DrawIndirectArgs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl DrawIndirectArgs {
    /// Size of the struct in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(vertex_count: u32, instance_count: u32) -> Self {
        Self {
            vertex_count,
            instance_count,
            first_vertex: 0,
            first_instance: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Arguments for an indexed indirect draw call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

impl DrawIndexedIndirectArgs {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(index_count: u32, instance_count: u32) -> Self {
        Self {
            index_count,
            instance_count,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

static_assertions::const_assert_eq!(DrawIndirectArgs::SIZE, 16);
static_assertions::const_assert_eq!(DrawIndexedIndirectArgs::SIZE, 20);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_visibility() {
        assert!(!MemoryPlacement::GpuOnly.is_cpu_visible());
        assert!(MemoryPlacement::Readback.is_cpu_visible());
        assert!(MemoryPlacement::StageEveryFrame.is_upload());
        assert!(!MemoryPlacement::Readback.is_upload());
    }

    #[test]
    fn test_forbidden_usages() {
        assert!(BufferUsage::forbidden_for(MemoryPlacement::GpuOnly).is_empty());
        assert!(
            !BufferUsage::forbidden_for(MemoryPlacement::Readback)
                .contains(BufferUsage::TRANSFER_DST)
        );
        assert!(
            BufferUsage::forbidden_for(MemoryPlacement::Readback).contains(BufferUsage::CONSTANT)
        );
        assert!(
            BufferUsage::forbidden_for(MemoryPlacement::StageEveryFrame)
                .intersects(BufferUsage::READ_WRITE)
        );
    }

    #[test]
    fn test_mapping_write_bounds() {
        let mut mapping = BufferMapping::new(BufferHandle::INVALID, 0, 4).with_pure_write(true);
        assert!(!mapping.write(0, &[1]));
        mapping.fill(vec![0; 4]);
        assert!(mapping.is_mapped());
        assert!(mapping.write(1, &[1, 2]));
        assert!(!mapping.write(3, &[1, 2]));
        assert_eq!(mapping.bytes(), &[0, 1, 2, 0]);
    }

    #[test]
    fn test_indirect_args_layout() {
        let args = DrawIndirectArgs::new(36, 100);
        assert_eq!(args.as_bytes().len(), 16);
        assert_eq!(&args.as_bytes()[0..4], &36u32.to_ne_bytes());
        assert_eq!(DrawIndexedIndirectArgs::new(3, 1).as_bytes().len(), 20);
    }
}

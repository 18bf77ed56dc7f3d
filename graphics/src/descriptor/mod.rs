//! Descriptor heaps, set layouts and set contents.

mod binding;
mod heap;
mod set;

pub use binding::{
    DescriptorBindingDesc, DescriptorBindingType, DescriptorData, DescriptorSetDesc,
    DescriptorSetLayoutInfo, DescriptorSetWriteInfo, PackedBinding, RangeKind,
    pack_binding_index, unpack_binding_index,
};
pub use heap::{DescriptorHeap, DescriptorHeaps, HeapKind};
pub use set::{DescriptorEntry, DescriptorSetStorage, DescriptorSnapshot, MultiFrameTracker};

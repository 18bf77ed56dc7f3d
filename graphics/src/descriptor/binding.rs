//! Descriptor set layouts and the packed binding-index ABI.
//!
//! Every binding of a layout lands in one of four ranges. The index handed
//! back to the client for a binding is
//!
//! ```text
//!  31             16 15              0
//! ┌─────────────────┬─────────────────┐
//! │ offset in range │   range kind    │
//! └─────────────────┴─────────────────┘
//! ```
//!
//! and is passed back unchanged in [`DescriptorSetWriteInfo::index`].

use crate::error::GraphicsError;
use crate::handles::{BufferHandle, BufferViewHandle, SamplerHandle, TextureViewHandle};
use crate::types::{ShaderVisibility, TextureLayout};

/// Descriptor range a binding is packed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum RangeKind {
    Cbv = 0,
    Srv = 1,
    Uav = 2,
    Sampler = 3,
}

impl RangeKind {
    pub const COUNT: usize = 4;
    pub const ALL: [Self; Self::COUNT] = [Self::Cbv, Self::Srv, Self::Uav, Self::Sampler];

    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Cbv),
            1 => Some(Self::Srv),
            2 => Some(Self::Uav),
            3 => Some(Self::Sampler),
            _ => None,
        }
    }

    pub fn is_sampler(self) -> bool {
        self == Self::Sampler
    }
}

/// Pack a range kind and an in-range offset into a binding index.
pub const fn pack_binding_index(kind: RangeKind, offset: u16) -> u32 {
    (kind as u32) | ((offset as u32) << 16)
}

/// Split a binding index produced by [`pack_binding_index`].
pub fn unpack_binding_index(index: u32) -> Option<(RangeKind, u16)> {
    let kind = RangeKind::from_raw((index & 0xFFFF) as u16)?;
    Some((kind, (index >> 16) as u16))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorBindingType {
    ConstantBuffer,
    SampledTexture,
    StorageReadOnlyTexture,
    StorageReadWriteTexture,
    StorageReadOnlyBuffer,
    StorageReadWriteBuffer,
    Sampler,
}

impl DescriptorBindingType {
    pub fn range_kind(self) -> RangeKind {
        match self {
            Self::ConstantBuffer => RangeKind::Cbv,
            Self::SampledTexture | Self::StorageReadOnlyTexture | Self::StorageReadOnlyBuffer => {
                RangeKind::Srv
            }
            Self::StorageReadWriteTexture | Self::StorageReadWriteBuffer => RangeKind::Uav,
            Self::Sampler => RangeKind::Sampler,
        }
    }

    pub fn is_texture(self) -> bool {
        matches!(
            self,
            Self::SampledTexture | Self::StorageReadOnlyTexture | Self::StorageReadWriteTexture
        )
    }

    pub fn is_storage_buffer(self) -> bool {
        matches!(
            self,
            Self::StorageReadOnlyBuffer | Self::StorageReadWriteBuffer
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorBindingDesc {
    pub binding_type: DescriptorBindingType,
    pub visibility: ShaderVisibility,
    pub count: u16,
    /// Pins the in-range offset of the binding instead of the running total.
    pub binding_index: Option<u16>,
}

impl DescriptorBindingDesc {
    pub fn new(binding_type: DescriptorBindingType, visibility: ShaderVisibility) -> Self {
        Self {
            binding_type,
            visibility,
            count: 1,
            binding_index: None,
        }
    }

    pub fn with_count(mut self, count: u16) -> Self {
        self.count = count;
        self
    }

    pub fn with_binding_index(mut self, binding_index: u16) -> Self {
        self.binding_index = Some(binding_index);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DescriptorSetDesc {
    pub label: Option<String>,
    pub bindings: Vec<DescriptorBindingDesc>,
}

impl DescriptorSetDesc {
    pub fn new(bindings: Vec<DescriptorBindingDesc>) -> Self {
        Self {
            label: None,
            bindings,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A binding after packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedBinding {
    pub desc: DescriptorBindingDesc,
    pub kind: RangeKind,
    pub offset: u16,
}

impl PackedBinding {
    pub fn packed_index(&self) -> u32 {
        pack_binding_index(self.kind, self.offset)
    }

    pub fn contains(&self, kind: RangeKind, offset: u16) -> bool {
        self.kind == kind
            && offset >= self.offset
            && u32::from(offset) < u32::from(self.offset) + u32::from(self.desc.count)
    }
}

/// A validated descriptor set layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorSetLayoutInfo {
    pub bindings: Vec<PackedBinding>,
    /// Slots used per range, indexed by `RangeKind as usize`.
    pub range_sizes: [u16; RangeKind::COUNT],
}

impl DescriptorSetLayoutInfo {
    /// Pack the bindings of `desc` in declaration order.
    pub fn pack(desc: &DescriptorSetDesc) -> Result<Self, GraphicsError> {
        let mut totals = [0u32; RangeKind::COUNT];
        let mut bindings = Vec::with_capacity(desc.bindings.len());

        for (i, binding) in desc.bindings.iter().enumerate() {
            if binding.count == 0 {
                return Err(GraphicsError::InvalidParameter(format!(
                    "binding {i} has a zero descriptor count"
                )));
            }

            let kind = binding.binding_type.range_kind();
            let total = &mut totals[kind as usize];
            let offset = match binding.binding_index {
                Some(pinned) if u32::from(pinned) < *total => {
                    return Err(GraphicsError::InvalidParameter(format!(
                        "binding {i} pins offset {pinned} below the {kind:?} range total {total}"
                    )));
                }
                Some(pinned) => u32::from(pinned),
                None => *total,
            };

            let end = offset + u32::from(binding.count);
            if end > u32::from(u16::MAX) {
                return Err(GraphicsError::InvalidParameter(format!(
                    "{kind:?} range of the layout exceeds {} descriptors",
                    u16::MAX
                )));
            }
            *total = end;

            bindings.push(PackedBinding {
                desc: *binding,
                kind,
                offset: offset as u16,
            });
        }

        Ok(Self {
            bindings,
            range_sizes: totals.map(|t| t as u16),
        })
    }

    pub fn binding_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.bindings.iter().map(PackedBinding::packed_index)
    }

    /// Find the binding covering `offset` in the `kind` range.
    pub fn find(&self, kind: RangeKind, offset: u16) -> Option<&PackedBinding> {
        self.bindings.iter().find(|b| b.contains(kind, offset))
    }

    /// Slots in the combined CBV/SRV/UAV heap.
    pub fn cbv_srv_uav_count(&self) -> u32 {
        self.range_sizes[..RangeKind::Sampler as usize]
            .iter()
            .map(|s| u32::from(*s))
            .sum()
    }

    pub fn sampler_count(&self) -> u32 {
        u32::from(self.range_sizes[RangeKind::Sampler as usize])
    }

    /// Position of `(kind, offset)` in the flat per-set descriptor array.
    ///
    /// The array stores the CBV, SRV, UAV and sampler ranges back to back.
    pub fn flat_index(&self, kind: RangeKind, offset: u16) -> usize {
        let base: usize = self.range_sizes[..kind as usize]
            .iter()
            .map(|s| usize::from(*s))
            .sum();
        base + usize::from(offset)
    }

    pub fn total_descriptors(&self) -> usize {
        self.range_sizes.iter().map(|s| usize::from(*s)).sum()
    }
}

/// Content written into one descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorData {
    ConstantBuffer {
        buffer: BufferHandle,
        offset: u64,
        size: u64,
    },
    Texture {
        view: TextureViewHandle,
        layout: TextureLayout,
    },
    Buffer(BufferViewHandle),
    Sampler(SamplerHandle),
}

impl DescriptorData {
    /// Whether this data may be written into a binding of `binding_type`.
    pub fn matches(&self, binding_type: DescriptorBindingType) -> bool {
        match self {
            Self::ConstantBuffer { .. } => binding_type == DescriptorBindingType::ConstantBuffer,
            Self::Texture { .. } => binding_type.is_texture(),
            Self::Buffer(_) => binding_type.is_storage_buffer(),
            Self::Sampler(_) => binding_type == DescriptorBindingType::Sampler,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSetWriteInfo {
    /// Packed binding index returned at layout creation.
    pub index: u32,
    /// Element within an arrayed binding.
    pub array_index: u16,
    pub data: DescriptorData,
}

impl DescriptorSetWriteInfo {
    pub fn new(index: u32, data: DescriptorData) -> Self {
        Self {
            index,
            array_index: 0,
            data,
        }
    }

    pub fn with_array_index(mut self, array_index: u16) -> Self {
        self.array_index = array_index;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(binding_type: DescriptorBindingType) -> DescriptorBindingDesc {
        DescriptorBindingDesc::new(binding_type, ShaderVisibility::ALL)
    }

    #[test]
    fn test_pack_unpack() {
        let packed = pack_binding_index(RangeKind::Uav, 7);
        assert_eq!(packed, 2 | (7 << 16));
        assert_eq!(unpack_binding_index(packed), Some((RangeKind::Uav, 7)));
        assert_eq!(unpack_binding_index(4), None);

        for kind in RangeKind::ALL {
            for offset in [0u16, 1, 255, u16::MAX] {
                assert_eq!(
                    unpack_binding_index(pack_binding_index(kind, offset)),
                    Some((kind, offset))
                );
            }
        }
    }

    #[test]
    fn test_layout_packing_in_declaration_order() {
        let desc = DescriptorSetDesc::new(vec![
            binding(DescriptorBindingType::ConstantBuffer),
            binding(DescriptorBindingType::SampledTexture),
            binding(DescriptorBindingType::SampledTexture),
            binding(DescriptorBindingType::Sampler),
        ]);
        let layout = DescriptorSetLayoutInfo::pack(&desc).unwrap();
        let indices: Vec<u32> = layout.binding_indices().collect();

        let kinds: Vec<u32> = indices.iter().map(|i| i & 0xFFFF).collect();
        let offsets: Vec<u32> = indices.iter().map(|i| i >> 16).collect();
        assert_eq!(kinds, vec![0, 1, 1, 3]);
        assert_eq!(offsets, vec![0, 0, 1, 0]);
        assert_eq!(layout.range_sizes, [1, 2, 0, 1]);
        assert_eq!(layout.cbv_srv_uav_count(), 3);
        assert_eq!(layout.sampler_count(), 1);
    }

    #[test]
    fn test_arrayed_and_pinned_bindings() {
        let desc = DescriptorSetDesc::new(vec![
            binding(DescriptorBindingType::StorageReadOnlyTexture).with_count(4),
            binding(DescriptorBindingType::StorageReadOnlyBuffer).with_binding_index(8),
            binding(DescriptorBindingType::StorageReadWriteBuffer),
        ]);
        let layout = DescriptorSetLayoutInfo::pack(&desc).unwrap();
        let indices: Vec<u32> = layout.binding_indices().collect();
        assert_eq!(
            indices,
            vec![
                pack_binding_index(RangeKind::Srv, 0),
                pack_binding_index(RangeKind::Srv, 8),
                pack_binding_index(RangeKind::Uav, 0),
            ]
        );
        assert_eq!(layout.range_sizes[RangeKind::Srv as usize], 9);
        assert!(layout.find(RangeKind::Srv, 3).is_some());
        assert!(layout.find(RangeKind::Srv, 5).is_none());
        assert_eq!(layout.flat_index(RangeKind::Uav, 0), 9);
    }

    #[test]
    fn test_pinned_index_below_total_fails() {
        let desc = DescriptorSetDesc::new(vec![
            binding(DescriptorBindingType::ConstantBuffer).with_count(2),
            binding(DescriptorBindingType::ConstantBuffer).with_binding_index(1),
        ]);
        assert!(matches!(
            DescriptorSetLayoutInfo::pack(&desc),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_zero_count_fails() {
        let desc = DescriptorSetDesc::new(vec![
            binding(DescriptorBindingType::Sampler).with_count(0),
        ]);
        assert!(DescriptorSetLayoutInfo::pack(&desc).is_err());
    }

    #[test]
    fn test_data_matches_binding_type() {
        let view = DescriptorData::Texture {
            view: TextureViewHandle::INVALID,
            layout: TextureLayout::ShaderResource,
        };
        assert!(view.matches(DescriptorBindingType::SampledTexture));
        assert!(view.matches(DescriptorBindingType::StorageReadWriteTexture));
        assert!(!view.matches(DescriptorBindingType::ConstantBuffer));
        assert!(
            DescriptorData::Buffer(BufferViewHandle::INVALID)
                .matches(DescriptorBindingType::StorageReadOnlyBuffer)
        );
    }
}

//! Descriptor set contents with one copy per frame context.
//!
//! A write lands in the copy of the frame being recorded right away. The
//! other copies may still be read by frames in flight, so the write is
//! remembered by a [`MultiFrameTracker`] and replayed into each of them the
//! next time that frame context reads the set.

use parking_lot::Mutex;

use super::binding::{DescriptorData, DescriptorSetLayoutInfo, DescriptorSetWriteInfo, unpack_binding_index};
use crate::error::GraphicsError;

/// A slot of a set copy.
pub type DescriptorEntry = Option<DescriptorData>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResolvedWrite {
    slot: usize,
    data: DescriptorData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingWrite {
    /// Bit `i` set: not yet applied to the copy of frame context `i`.
    remaining: u32,
    write: ResolvedWrite,
}

/// Writes still owed to other frame contexts.
#[derive(Debug, Default)]
pub struct MultiFrameTracker {
    pending: Vec<PendingWrite>,
}

impl MultiFrameTracker {
    fn track(&mut self, write: ResolvedWrite, frame_count: usize, applied_to: usize) {
        let all = if frame_count >= 32 {
            u32::MAX
        } else {
            (1u32 << frame_count) - 1
        };
        let remaining = all & !(1 << applied_to);
        if remaining != 0 {
            self.pending.push(PendingWrite { remaining, write });
        }
    }

    /// Take the writes owed to `frame_index`, oldest first.
    fn drain_for(&mut self, frame_index: usize) -> Vec<ResolvedWrite> {
        let bit = 1u32 << frame_index;
        let mut owed = Vec::new();
        self.pending.retain_mut(|pending| {
            if pending.remaining & bit != 0 {
                owed.push(pending.write);
                pending.remaining &= !bit;
            }
            pending.remaining != 0
        });
        owed
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[derive(Debug, Clone)]
struct FrameCopy {
    entries: Vec<DescriptorEntry>,
    version: u64,
}

#[derive(Debug)]
struct SetState {
    copies: Vec<FrameCopy>,
    tracker: MultiFrameTracker,
}

/// Contents of one descriptor set.
#[derive(Debug)]
pub struct DescriptorSetStorage {
    /// First slot of the set in the CBV/SRV/UAV heap.
    pub cbv_srv_uav_base: u32,
    /// First slot of the set in the sampler heap.
    pub sampler_base: u32,
    state: Mutex<SetState>,
}

/// The contents of a set as one frame context sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSnapshot {
    pub entries: Vec<DescriptorEntry>,
    /// Bumped on every change to this frame context's copy.
    pub version: u64,
}

impl DescriptorSetStorage {
    pub fn new(
        layout: &DescriptorSetLayoutInfo,
        frame_count: usize,
        cbv_srv_uav_base: u32,
        sampler_base: u32,
    ) -> Self {
        let copy = FrameCopy {
            entries: vec![None; layout.total_descriptors()],
            version: 0,
        };
        Self {
            cbv_srv_uav_base,
            sampler_base,
            state: Mutex::new(SetState {
                copies: vec![copy; frame_count],
                tracker: MultiFrameTracker::default(),
            }),
        }
    }

    /// Check `write` against the layout and find its slot.
    fn resolve(
        layout: &DescriptorSetLayoutInfo,
        write: &DescriptorSetWriteInfo,
    ) -> Result<ResolvedWrite, GraphicsError> {
        let (kind, offset) = unpack_binding_index(write.index).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!(
                "{:#x} is not a packed binding index",
                write.index
            ))
        })?;
        let element = u32::from(offset) + u32::from(write.array_index);
        let element = u16::try_from(element).map_err(|_| {
            GraphicsError::InvalidParameter(format!("array index {} overflows", write.array_index))
        })?;

        let binding = layout.find(kind, element).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!(
                "no {kind:?} binding covers offset {element} of the layout"
            ))
        })?;
        if !write.data.matches(binding.desc.binding_type) {
            return Err(GraphicsError::InvalidParameter(format!(
                "{:?} cannot be written to a {:?} binding",
                write.data, binding.desc.binding_type
            )));
        }

        Ok(ResolvedWrite {
            slot: layout.flat_index(kind, element),
            data: write.data,
        })
    }

    /// Apply `writes` to the copy of `frame_index` and queue them for the others.
    ///
    /// Nothing is applied if any write is invalid.
    pub fn update(
        &self,
        layout: &DescriptorSetLayoutInfo,
        frame_index: usize,
        writes: &[DescriptorSetWriteInfo],
    ) -> Result<(), GraphicsError> {
        let resolved = writes
            .iter()
            .map(|w| Self::resolve(layout, w))
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = self.state.lock();
        let frame_count = state.copies.len();
        let SetState { copies, tracker } = &mut *state;
        let copy = copies
            .get_mut(frame_index)
            .ok_or_else(|| GraphicsError::Internal(format!("no frame copy {frame_index}")))?;

        for write in resolved {
            copy.entries[write.slot] = Some(write.data);
            tracker.track(write, frame_count, frame_index);
        }
        copy.version += 1;
        Ok(())
    }

    /// Contents for `frame_index`, after replaying the writes it still owes.
    pub fn snapshot(&self, frame_index: usize) -> Option<DescriptorSnapshot> {
        let mut state = self.state.lock();
        let owed = state.tracker.drain_for(frame_index);
        let copy = state.copies.get_mut(frame_index)?;
        if !owed.is_empty() {
            for write in owed {
                copy.entries[write.slot] = Some(write.data);
            }
            copy.version += 1;
        }
        Some(DescriptorSnapshot {
            entries: copy.entries.clone(),
            version: copy.version,
        })
    }

    pub fn pending_writes(&self) -> usize {
        self.state.lock().tracker.pending_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::binding::{
        DescriptorBindingDesc, DescriptorBindingType, DescriptorSetDesc, RangeKind,
        pack_binding_index,
    };
    use crate::handles::{SamplerHandle, TextureViewHandle};
    use crate::types::{ShaderVisibility, TextureLayout};
    use verglas_core::GenHandle;

    fn layout() -> DescriptorSetLayoutInfo {
        DescriptorSetLayoutInfo::pack(&DescriptorSetDesc::new(vec![
            DescriptorBindingDesc::new(
                DescriptorBindingType::SampledTexture,
                ShaderVisibility::FRAGMENT,
            )
            .with_count(2),
            DescriptorBindingDesc::new(DescriptorBindingType::Sampler, ShaderVisibility::FRAGMENT),
        ]))
        .unwrap()
    }

    fn texture(index: u16) -> DescriptorData {
        DescriptorData::Texture {
            view: TextureViewHandle(GenHandle::new(index, 0)),
            layout: TextureLayout::ShaderResource,
        }
    }

    #[test]
    fn test_write_replays_into_other_frames() {
        let layout = layout();
        let set = DescriptorSetStorage::new(&layout, 3, 0, 0);
        let write = DescriptorSetWriteInfo::new(pack_binding_index(RangeKind::Srv, 0), texture(5))
            .with_array_index(1);

        set.update(&layout, 1, &[write]).unwrap();
        assert_eq!(set.pending_writes(), 1);

        let frame1 = set.snapshot(1).unwrap();
        assert_eq!(frame1.entries[1], Some(texture(5)));
        assert_eq!(frame1.version, 1);

        let frame2 = set.snapshot(2).unwrap();
        assert_eq!(frame2.entries[1], Some(texture(5)));
        assert_eq!(set.pending_writes(), 1);

        set.snapshot(0).unwrap();
        assert_eq!(set.pending_writes(), 0);
    }

    #[test]
    fn test_snapshot_without_changes_keeps_version() {
        let layout = layout();
        let set = DescriptorSetStorage::new(&layout, 2, 0, 0);
        assert_eq!(set.snapshot(0).unwrap().version, 0);
        assert_eq!(set.snapshot(0).unwrap().version, 0);
    }

    #[test]
    fn test_invalid_write_is_rejected_atomically() {
        let layout = layout();
        let set = DescriptorSetStorage::new(&layout, 2, 0, 0);
        let good = DescriptorSetWriteInfo::new(pack_binding_index(RangeKind::Srv, 0), texture(1));
        let wrong_type = DescriptorSetWriteInfo::new(
            pack_binding_index(RangeKind::Srv, 1),
            DescriptorData::Sampler(SamplerHandle(GenHandle::new(0, 0))),
        );
        let out_of_range =
            DescriptorSetWriteInfo::new(pack_binding_index(RangeKind::Sampler, 1), texture(1));

        assert!(set.update(&layout, 0, &[good, wrong_type]).is_err());
        assert!(set.update(&layout, 0, &[out_of_range]).is_err());
        assert_eq!(set.snapshot(0).unwrap().entries, vec![None; 3]);
    }

    #[test]
    fn test_sampler_lands_after_srv_range() {
        let layout = layout();
        let set = DescriptorSetStorage::new(&layout, 1, 0, 0);
        let sampler = DescriptorData::Sampler(SamplerHandle(GenHandle::new(2, 0)));
        set.update(
            &layout,
            0,
            &[DescriptorSetWriteInfo::new(
                pack_binding_index(RangeKind::Sampler, 0),
                sampler,
            )],
        )
        .unwrap();
        assert_eq!(set.snapshot(0).unwrap().entries[2], Some(sampler));
        assert_eq!(set.pending_writes(), 0);
    }
}

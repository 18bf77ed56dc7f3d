//! Typed handles for every object the registry owns.
//!
//! Each handle wraps a [`GenHandle`] and is only meaningful for the pool it
//! came from. Handles are plain values: copying one does not extend the
//! lifetime of the object, and a destroyed object's handle simply stops
//! resolving.

use std::fmt;

use verglas_core::GenHandle;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[repr(transparent)]
        pub struct $name(pub GenHandle);

        impl $name {
            pub const INVALID: Self = Self(GenHandle::INVALID);

            pub const fn raw(self) -> GenHandle {
                self.0
            }

            pub const fn is_valid(self) -> bool {
                self.0.is_valid()
            }
        }

        impl From<GenHandle> for $name {
            fn from(handle: GenHandle) -> Self {
                Self(handle)
            }
        }

        impl From<$name> for GenHandle {
            fn from(handle: $name) -> Self {
                handle.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.0.is_valid() {
                    write!(f, "{}({}v{})", stringify!($name), self.0.index, self.0.generation)
                } else {
                    write!(f, "{}(invalid)", stringify!($name))
                }
            }
        }

        static_assertions::assert_eq_size!($name, u32);
    };
}

define_handle!(
    /// A linear GPU allocation.
    BufferHandle
);
define_handle!(
    /// A texture, either owned by the registry or registered from outside.
    TextureHandle
);
define_handle!(TextureViewHandle);
define_handle!(BufferViewHandle);
define_handle!(SamplerHandle);
define_handle!(
    /// A color or depth-stencil attachment view.
    RenderTargetViewHandle
);
define_handle!(RenderPassHandle);
define_handle!(ShaderModuleHandle);
define_handle!(DescriptorSetLayoutHandle);
define_handle!(DescriptorSetHandle);
define_handle!(PipelineLayoutHandle);
define_handle!(GraphicsPipelineHandle);
define_handle!(ComputePipelineHandle);

/// A reserved timestamp slot in the ring of the frame that recorded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimestampHandle {
    pub index: u32,
    /// Low 32 bits of the recording frame id. Widened against the current
    /// frame by [`TimestampHandle::recorded_frame`].
    pub frame_id: u32,
}

impl TimestampHandle {
    pub const INVALID: Self = Self {
        index: u32::MAX,
        frame_id: 0,
    };

    pub const fn is_valid(self) -> bool {
        self.index != u32::MAX
    }

    /// Full id of the latest frame up to `current` whose low bits match.
    pub fn recorded_frame(self, current: u64) -> Option<u64> {
        let back = (current as u32).wrapping_sub(self.frame_id);
        current.checked_sub(u64::from(back))
    }
}

impl Default for TimestampHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_defaults_to_invalid() {
        assert!(!BufferHandle::default().is_valid());
        assert_eq!(BufferHandle::default(), BufferHandle::INVALID);
        assert!(!TimestampHandle::default().is_valid());
    }

    #[test]
    fn test_timestamp_frame_survives_the_u32_wrap() {
        let handle = TimestampHandle {
            index: 0,
            frame_id: u32::MAX,
        };
        let wrapped = u64::from(u32::MAX) + 3;
        assert_eq!(handle.recorded_frame(wrapped), Some(u64::from(u32::MAX)));

        let handle = TimestampHandle {
            index: 0,
            frame_id: 1,
        };
        let current = (1u64 << 32) + 4;
        assert_eq!(handle.recorded_frame(current), Some((1u64 << 32) + 1));
        assert_eq!(handle.recorded_frame(4), Some(1));
        assert_eq!(handle.recorded_frame(0), None);
    }

    #[test]
    fn test_handle_debug() {
        let handle = TextureHandle(GenHandle::new(4, 2));
        assert_eq!(format!("{handle:?}"), "TextureHandle(4v2)");
        assert_eq!(format!("{:?}", SamplerHandle::INVALID), "SamplerHandle(invalid)");
    }

    #[test]
    fn test_handle_conversion() {
        let raw = GenHandle::new(1, 0);
        let handle: BufferHandle = raw.into();
        assert_eq!(GenHandle::from(handle), raw);
        assert_eq!(handle.raw(), raw);
    }
}

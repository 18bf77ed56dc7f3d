//! Viewport, scissor and draw call parameters.

// ============================================================================
// Viewport
// ============================================================================

/// Viewport configuration for rendering.
///
/// Depth range is `[0, 1]` and the origin is the top-left corner on every
/// backend. The Vulkan lowering flips the viewport height to match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub top_left_x: i32,
    pub top_left_y: i32,
    pub width: i32,
    pub height: i32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            top_left_x: 0,
            top_left_y: 0,
            width: 0,
            height: 0,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

impl Viewport {
    /// Create a viewport from dimensions with origin at (0, 0).
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self {
            width: width as i32,
            height: height as i32,
            ..Default::default()
        }
    }

    /// Set the depth range.
    ///
    /// `min > max` is valid and gives a reverse-Z setup.
    pub fn with_depth_range(mut self, min_depth: f32, max_depth: f32) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }
}

// ============================================================================
// Scissor Rectangle
// ============================================================================

/// Scissor rectangle for clipping rendering.
///
/// Pixels outside the scissor rectangle are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl ScissorRect {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create a scissor rectangle from dimensions with origin at (0, 0).
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

// ============================================================================
// Draw calls
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawInstancedDesc {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub vertex_offset: u32,
    pub instance_offset: u32,
}

impl DrawInstancedDesc {
    pub fn new(vertex_count: u32) -> Self {
        Self {
            vertex_count,
            instance_count: 1,
            vertex_offset: 0,
            instance_offset: 0,
        }
    }

    pub fn with_instances(mut self, instance_count: u32) -> Self {
        self.instance_count = instance_count;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawIndexedInstancedDesc {
    pub element_count: u32,
    pub instance_count: u32,
    pub index_offset: u32,
    pub vertex_offset: u32,
    pub instance_offset: u32,
}

impl DrawIndexedInstancedDesc {
    pub fn new(element_count: u32) -> Self {
        Self {
            element_count,
            instance_count: 1,
            index_offset: 0,
            vertex_offset: 0,
            instance_offset: 0,
        }
    }

    pub fn with_instances(mut self, instance_count: u32) -> Self {
        self.instance_count = instance_count;
        self
    }
}

/// Workgroup counts and sizes of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl DispatchSize {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_defaults() {
        let viewport = Viewport::from_dimensions(1920, 1080);
        assert_eq!(viewport.width, 1920);
        assert_eq!(viewport.min_depth, 0.0);
        assert_eq!(viewport.max_depth, 1.0);
    }

    #[test]
    fn test_scissor_extent() {
        let rect = ScissorRect::new(10, 20, 110, 70);
        assert_eq!(rect.width(), 100);
        assert_eq!(rect.height(), 50);
        assert_eq!(ScissorRect::new(5, 5, 1, 1).width(), 0);
    }
}

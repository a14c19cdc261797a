use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec4};

/// Per-instance data streamed to the instanced passes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub world: [[f32; 4]; 4],
    /// `xy` tiling, `zw` offset.
    pub tiling_offset: [f32; 4],
    pub color: [f32; 4],
}

impl InstanceData {
    pub fn new(world: Mat4, tiling: Vec2, offset: Vec2, color: Vec4) -> Self {
        Self {
            world: world.to_cols_array_2d(),
            tiling_offset: [tiling.x, tiling.y, offset.x, offset.y],
            color: color.to_array(),
        }
    }

    pub fn world(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.world)
    }
}

/// Constants bound once per sprite before it is drawn.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteConstants {
    pub world: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub tiling_offset: [f32; 4],
    /// Destination rectangle in pixels: `x, y, width, height`.
    pub rect: [f32; 4],
    /// Source rectangle in texels, all zero when the whole image is used.
    pub source_rect: [f32; 4],
    /// `xy` pivot, `z` 1.0 when a mask is bound, `w` 1.0 when `source_rect` is set.
    pub pivot_flags: [f32; 4],
}

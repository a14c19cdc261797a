use std::sync::Arc;

use glam::{Mat4, Vec2, Vec4};

use super::instance::SpriteConstants;
use super::texture::Texture;
use crate::asset::SpriteQuad;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

#[derive(Clone)]
pub struct SpriteDrawRequest {
    /// `None` when the quad failed to load; such sprites are skipped.
    pub quad: Option<Arc<SpriteQuad>>,
    pub mask: Option<Arc<Texture>>,
    pub rect: Rect,
    pub source_rect: Option<Rect>,
    pub color: Vec4,
    pub world: Mat4,
    pub pivot: Vec2,
    /// Lower orders draw first.
    pub order: i32,
    pub tiling: Vec2,
    pub offset: Vec2,
}

impl SpriteDrawRequest {
    pub fn new(quad: Arc<SpriteQuad>, rect: Rect) -> Self {
        Self {
            quad: Some(quad),
            mask: None,
            rect,
            source_rect: None,
            color: Vec4::ONE,
            world: Mat4::IDENTITY,
            pivot: Vec2::splat(0.5),
            order: 0,
            tiling: Vec2::ONE,
            offset: Vec2::ZERO,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_world(mut self, world: Mat4) -> Self {
        self.world = world;
        self
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    pub fn with_mask(mut self, mask: Arc<Texture>) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_source_rect(mut self, source: Rect) -> Self {
        self.source_rect = Some(source);
        self
    }

    pub fn constants(&self) -> SpriteConstants {
        let flag = |set: bool| if set { 1.0 } else { 0.0 };
        SpriteConstants {
            world: self.world.to_cols_array_2d(),
            color: self.color.to_array(),
            tiling_offset: [self.tiling.x, self.tiling.y, self.offset.x, self.offset.y],
            rect: self.rect.to_array(),
            source_rect: self.source_rect.unwrap_or_default().to_array(),
            pivot_flags: [
                self.pivot.x,
                self.pivot.y,
                flag(self.mask.is_some()),
                flag(self.source_rect.is_some()),
            ],
        }
    }
}

/// Sprites waiting to be drawn, kept sorted by `order` at all times.
#[derive(Default)]
pub struct SpriteQueue {
    sprites: Vec<SpriteDrawRequest>,
}

impl SpriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts after every queued sprite of equal or lower order, so equal
    /// orders keep their submission order.
    pub fn insert(&mut self, sprite: SpriteDrawRequest) {
        let at = self
            .sprites
            .partition_point(|queued| queued.order <= sprite.order);
        self.sprites.insert(at, sprite);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpriteDrawRequest> {
        self.sprites.iter()
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn clear(&mut self) {
        self.sprites.clear();
    }
}

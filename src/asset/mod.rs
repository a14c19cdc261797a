pub mod cache;
pub mod model;

pub use cache::AssetCache;
pub use model::{MeshRef, ModelData, SpriteQuad};

use crate::renderer::Texture;

pub struct AssetManager {
    pub models: AssetCache<ModelData>,
    pub textures: AssetCache<Texture>,
    pub sprites: AssetCache<SpriteQuad>,
}

impl AssetManager {
    pub fn new() -> Self {
        Self {
            models: AssetCache::new(),
            textures: AssetCache::new(),
            sprites: AssetCache::new(),
        }
    }

    /// Evicts every asset no draw request or component still holds.
    pub fn evict_unused(&mut self) -> usize {
        let evicted =
            self.models.evict_unused() + self.textures.evict_unused() + self.sprites.evict_unused();
        if evicted > 0 {
            log::info!("Evicted {} unused assets", evicted);
        }
        evicted
    }
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new()
    }
}

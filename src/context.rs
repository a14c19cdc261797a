use std::path::Path;
use std::sync::Arc;

use crate::asset::AssetManager;
use crate::device::GraphicsDevice;
use crate::error::ResourceError;
use crate::renderer::{DepthStencil, FrameStats, Gpu, RenderPasses, Renderer, Texture};
use crate::settings::RenderSettings;

/// Everything one rendering engine instance owns, created once at startup.
pub struct EngineContext {
    gpu: Gpu,
    renderer: Renderer,
    assets: AssetManager,
    depth: DepthStencil,
    shadow_map: DepthStencil,
    settings: RenderSettings,
}

impl EngineContext {
    pub fn new(
        device: Box<dyn GraphicsDevice>,
        passes: RenderPasses,
        settings: RenderSettings,
    ) -> Result<Self, ResourceError> {
        let mut gpu = Gpu::new(device, &settings.heaps)?;

        let targets = Self::create_targets(&mut gpu, &settings);
        let (depth, shadow_map) = match targets {
            Ok(targets) => targets,
            Err(err) => {
                gpu.destroy();
                return Err(err);
            }
        };

        log::info!(
            "Engine context ready: {}x{}, shadow map {}",
            settings.resolution.width,
            settings.resolution.height,
            settings.frame.shadow_map_size
        );

        Ok(Self {
            renderer: Renderer::new(passes, settings.frame.clone()),
            gpu,
            assets: AssetManager::new(),
            depth,
            shadow_map,
            settings,
        })
    }

    fn create_targets(
        gpu: &mut Gpu,
        settings: &RenderSettings,
    ) -> Result<(DepthStencil, DepthStencil), ResourceError> {
        let depth = DepthStencil::new(
            gpu,
            "SceneDepth",
            settings.resolution.width,
            settings.resolution.height,
            true,
        )?;
        let size = settings.frame.shadow_map_size;
        let shadow_map = DepthStencil::new(gpu, "ShadowMap", size, size, true)?;
        Ok((depth, shadow_map))
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut Gpu {
        &mut self.gpu
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn assets(&self) -> &AssetManager {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut AssetManager {
        &mut self.assets
    }

    pub fn depth(&self) -> &DepthStencil {
        &self.depth
    }

    pub fn shadow_map(&self) -> &DepthStencil {
        &self.shadow_map
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Loads a scene texture through the asset cache.
    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Result<Arc<Texture>, ResourceError> {
        let path = path.as_ref();
        let gpu = &mut self.gpu;
        self.assets
            .textures
            .get_or_insert_with(&path.display().to_string(), || {
                Texture::from_path(gpu, path, false)
            })
    }

    /// Starts a frame, draws everything queued on the renderer and returns
    /// the frame's counters.
    pub fn render_frame(&mut self) -> FrameStats {
        self.gpu.begin_frame();
        self.renderer.render(&mut self.gpu)
    }

    /// Drops cached scene textures and rewinds scene-scoped views.
    ///
    /// Textures still held elsewhere keep their resource but lose their view:
    /// binding one fails with `Unregistered` until it is loaded again.
    pub fn reset_scene(&mut self) {
        let held = self.assets.textures.clear();
        if held > 0 {
            log::warn!("{} scene textures still referenced across a scene reset", held);
        }
        self.gpu.reset_scene();
    }

    pub fn evict_unused_assets(&mut self) -> usize {
        self.assets.evict_unused()
    }

    /// Releases every GPU object. Draw requests still queued are discarded.
    pub fn shutdown(self) {
        let Self {
            gpu,
            renderer,
            assets,
            depth,
            shadow_map,
            ..
        } = self;

        drop(renderer);
        drop(assets);
        drop(depth);
        drop(shadow_map);
        gpu.destroy();
    }
}

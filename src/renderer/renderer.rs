use super::batch::{ModelBatches, ModelDrawRequest};
use super::gpu::Gpu;
use super::pass::RenderPasses;
use super::sprite::{SpriteDrawRequest, SpriteQueue};
use crate::settings::FrameSettings;

/// Counters for one call to [`Renderer::render`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Instanced draws issued across the shadow and G-buffer passes.
    pub draw_calls: usize,
    pub instances: usize,
    pub sprites_drawn: usize,
    pub sprites_skipped: usize,
}

/// Collects draw requests during a frame and replays them through the
/// passes in a fixed order: shadow, G-buffer, lighting, bloom, sprites.
pub struct Renderer {
    passes: RenderPasses,
    settings: FrameSettings,
    shadow_batches: ModelBatches,
    lit_batches: ModelBatches,
    sprites: SpriteQueue,
}

impl Renderer {
    pub fn new(passes: RenderPasses, settings: FrameSettings) -> Self {
        Self {
            passes,
            settings,
            shadow_batches: ModelBatches::new(),
            lit_batches: ModelBatches::new(),
            sprites: SpriteQueue::new(),
        }
    }

    pub fn shadow_batches(&self) -> &ModelBatches {
        &self.shadow_batches
    }

    pub fn lit_batches(&self) -> &ModelBatches {
        &self.lit_batches
    }

    pub fn sprites(&self) -> &SpriteQueue {
        &self.sprites
    }

    /// Queues a model for this frame. Requests without a mesh are ignored.
    pub fn add_rendering_model_data(&mut self, request: ModelDrawRequest) {
        let Some(mesh) = request.mesh.as_ref() else {
            return;
        };
        let instance = request.instance();

        if request.render_type.is_lit() {
            self.lit_batches
                .push(mesh, instance, request.owner.clone());
        }
        if request.render_type.casts_shadow() {
            self.shadow_batches
                .push(mesh, instance, request.owner.clone());
        }
    }

    pub fn add_rendering_sprite_data(&mut self, sprite: SpriteDrawRequest) {
        self.sprites.insert(sprite);
    }

    /// Draws everything queued since the last call, then empties the queues.
    pub fn render(&mut self, gpu: &mut Gpu) -> FrameStats {
        let mut stats = FrameStats::default();

        if !self.shadow_batches.is_empty() || !self.lit_batches.is_empty() {
            self.draw_model(gpu, &mut stats);
        }

        self.passes.debug_wire.draw(gpu);

        if !self.sprites.is_empty() {
            self.draw_sprite(gpu, &mut stats);
        }

        self.shadow_batches.clear();
        self.lit_batches.clear();
        self.sprites.clear();

        log::trace!("Frame {}: {:?}", gpu.frame_index(), stats);
        stats
    }

    fn draw_model(&mut self, gpu: &mut Gpu, stats: &mut FrameStats) {
        let passes = &mut self.passes;

        for (pass, batches) in [
            (&mut passes.shadow, &self.shadow_batches),
            (&mut passes.gbuffer, &self.lit_batches),
        ] {
            if !pass.begin(gpu) {
                continue;
            }
            for (mesh, entry) in batches.iter() {
                pass.draw_model_instanced(gpu, mesh, &entry.instances, &entry.owners);
                stats.draw_calls += 1;
                stats.instances += entry.len();
            }
            pass.end(gpu);
        }

        for pass in [&mut passes.lighting, &mut passes.bloom] {
            if pass.begin(gpu) {
                pass.rendering(gpu);
                pass.end(gpu);
            }
        }
    }

    fn draw_sprite(&mut self, gpu: &mut Gpu, stats: &mut FrameStats) {
        let pass = &mut self.passes.sprite;
        if !pass.begin(gpu) {
            return;
        }

        for sprite in self.sprites.iter() {
            let Some(quad) = sprite.quad.as_deref() else {
                log::error!("Sprite at order {} has no vertex data; skipped", sprite.order);
                stats.sprites_skipped += 1;
                continue;
            };

            if let Err(err) =
                gpu.bind_attach_data(self.settings.sprite_constant_register, &sprite.constants())
            {
                log::error!("Sprite at order {} skipped: {}", sprite.order, err);
                stats.sprites_skipped += 1;
                continue;
            }

            if let Some(mask) = sprite.mask.as_deref() {
                if let Err(err) = mask.bind(gpu, self.settings.sprite_mask_register) {
                    log::warn!("Sprite mask '{}' not bound: {}", mask.label(), err);
                }
            }

            pass.draw_sprite(gpu, quad, sprite);
            stats.sprites_drawn += 1;
        }

        pass.end(gpu);
    }
}

use std::sync::Arc;

use frame_renderer::asset::{MeshRef, ModelData, SpriteQuad};
use frame_renderer::device::{
    GraphicsDevice, HeadlessDevice, MemoryLocation, ResourceDesc, ResourceId, WgpuDevice,
};
use frame_renderer::renderer::{
    DebugWire, DrawableRef, FullscreenPass, Gpu, InstanceData, InstancedPass, ModelDrawRequest,
    Rect, RenderPasses, RenderType, ShaderPass, SpriteDrawRequest, SpritePass,
};
use frame_renderer::{DeviceError, EngineContext, RenderSettings};
use glam::{Mat4, Vec3};

const FRAMES: u32 = 3;
const CUBE_VERTICES: u64 = 24;
const CUBE_INDICES: u32 = 36;

/// Stand-in for a pipeline-backed pass: reports what it would draw.
struct TracePass(&'static str);

impl ShaderPass for TracePass {
    fn begin(&mut self, _gpu: &mut Gpu) -> bool {
        true
    }
}

impl InstancedPass for TracePass {
    fn draw_model_instanced(
        &mut self,
        _gpu: &mut Gpu,
        mesh: &MeshRef,
        instances: &[InstanceData],
        _owners: &[Option<DrawableRef>],
    ) {
        log::debug!("[{}] {} x{}", self.0, mesh.name, instances.len());
    }
}

impl FullscreenPass for TracePass {
    fn rendering(&mut self, _gpu: &mut Gpu) {
        log::debug!("[{}] fullscreen", self.0);
    }
}

impl SpritePass for TracePass {
    fn draw_sprite(&mut self, _gpu: &mut Gpu, _quad: &SpriteQuad, sprite: &SpriteDrawRequest) {
        log::debug!("[{}] sprite order {}", self.0, sprite.order);
    }
}

impl DebugWire for TracePass {
    fn draw(&mut self, _gpu: &mut Gpu) {}
}

fn passes() -> RenderPasses {
    RenderPasses {
        shadow: Box::new(TracePass("shadow")),
        gbuffer: Box::new(TracePass("gbuffer")),
        lighting: Box::new(TracePass("lighting")),
        bloom: Box::new(TracePass("bloom")),
        sprite: Box::new(TracePass("sprite")),
        debug_wire: Box::new(TracePass("wire")),
    }
}

fn open_device() -> Box<dyn GraphicsDevice> {
    match WgpuDevice::request() {
        Ok(device) => Box::new(device),
        Err(err) => {
            log::warn!("No GPU available ({err}); rendering headless");
            Box::new(HeadlessDevice::new())
        }
    }
}

/// Allocates unfilled buffers sized for a cube: 24 position+normal+uv
/// vertices and 36 u16 indices.
fn cube_model(gpu: &mut Gpu) -> Result<ModelData, DeviceError> {
    let vertices = gpu.create_resource(&ResourceDesc::Buffer {
        size: CUBE_VERTICES * 32,
        memory: MemoryLocation::Default,
        label: Some("cube vertices"),
    })?;
    let indices = gpu.create_resource(&ResourceDesc::Buffer {
        size: CUBE_INDICES as u64 * 2,
        memory: MemoryLocation::Default,
        label: Some("cube indices"),
    })?;
    Ok(ModelData::new("cube").with_geometry(vertices, indices, CUBE_INDICES))
}

fn main() {
    frame_renderer::init_logging();

    let settings = RenderSettings::load();
    let mut context = match EngineContext::new(open_device(), passes(), settings) {
        Ok(context) => context,
        Err(err) => {
            eprintln!("Renderer error: {err}");
            return;
        }
    };

    let cube = match cube_model(context.gpu_mut()) {
        Ok(model) => context.assets_mut().models.insert("cube", model),
        Err(err) => {
            eprintln!("Renderer error: {err}");
            context.shutdown();
            return;
        }
    };
    let quad = context
        .assets_mut()
        .sprites
        .insert("quad", SpriteQuad::new(ResourceId(0)));

    for frame in 0..FRAMES {
        let renderer = context.renderer_mut();
        for i in 0..4 {
            let world = Mat4::from_translation(Vec3::new(i as f32 * 2.0, 0.0, frame as f32));
            renderer.add_rendering_model_data(ModelDrawRequest::new(
                Arc::clone(&cube),
                world,
                RenderType::LIT | RenderType::SHADOW,
            ));
        }
        for order in [10, -1, 5] {
            renderer.add_rendering_sprite_data(
                SpriteDrawRequest::new(Arc::clone(&quad), Rect::new(0.0, 0.0, 64.0, 64.0))
                    .with_order(order),
            );
        }

        let stats = context.render_frame();
        log::info!("Frame {}: {:?}", frame, stats);
    }

    for buffer in [cube.vertex_buffer, cube.index_buffer].into_iter().flatten() {
        context.gpu().release_queue().push(buffer);
    }
    drop((cube, quad));
    context.evict_unused_assets();
    context.shutdown();
}

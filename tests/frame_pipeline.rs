//! End-to-end frames through `EngineContext` on the recording device.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use frame_renderer::asset::{MeshRef, ModelData, SpriteQuad};
use frame_renderer::device::{DeviceCall, DeviceJournal, HeadlessDevice, ResourceId};
use frame_renderer::renderer::{
    DebugWire, Drawable, DrawableRef, FullscreenPass, Gpu, InstanceData, InstancedPass,
    ModelDrawRequest, Rect, RenderPasses, RenderType, ShaderPass, SpriteDrawRequest, SpritePass,
    Texture,
};
use frame_renderer::settings::{HeapBudget, RenderSettings};
use frame_renderer::{EngineContext, ResourceError};
use glam::{Mat4, Vec3};

type Trace = Rc<RefCell<Vec<String>>>;

struct TracePass {
    name: &'static str,
    trace: Trace,
}

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
        owners: &[Option<DrawableRef>],
    ) {
        let joints: usize = owners
            .iter()
            .flatten()
            .filter_map(|owner| owner.skinning_matrices())
            .map(<[Mat4]>::len)
            .sum();
        self.trace.borrow_mut().push(format!(
            "{}:{}x{}:joints={}",
            self.name,
            mesh.name,
            instances.len(),
            joints
        ));
    }
}

impl FullscreenPass for TracePass {
    fn rendering(&mut self, _gpu: &mut Gpu) {
        self.trace.borrow_mut().push(self.name.to_owned());
    }
}

impl SpritePass for TracePass {
    fn draw_sprite(&mut self, _gpu: &mut Gpu, _quad: &SpriteQuad, sprite: &SpriteDrawRequest) {
        self.trace
            .borrow_mut()
            .push(format!("{}:{}", self.name, sprite.order));
    }
}

impl DebugWire for TracePass {
    fn draw(&mut self, _gpu: &mut Gpu) {
        self.trace.borrow_mut().push(self.name.to_owned());
    }
}

struct Character {
    pose: Vec<Mat4>,
}

impl Drawable for Character {
    fn skinning_matrices(&self) -> Option<&[Mat4]> {
        Some(&self.pose)
    }
}

fn settings(constant: u32) -> RenderSettings {
    let mut settings = RenderSettings::default();
    settings.heaps.cbv_srv_uav = HeapBudget {
        regular: 16,
        constant,
        reserved: 1,
    };
    settings.frame.shadow_map_size = 256;
    settings
}

fn engine(constant: u32) -> (EngineContext, DeviceJournal, Trace) {
    let trace = Trace::default();
    let pass = |name| TracePass {
        name,
        trace: Rc::clone(&trace),
    };
    let passes = RenderPasses {
        shadow: Box::new(pass("shadow")),
        gbuffer: Box::new(pass("gbuffer")),
        lighting: Box::new(pass("lighting")),
        bloom: Box::new(pass("bloom")),
        sprite: Box::new(pass("sprite")),
        debug_wire: Box::new(pass("wire")),
    };

    let device = HeadlessDevice::new();
    let journal = device.journal();
    let context = EngineContext::new(Box::new(device), passes, settings(constant)).unwrap();
    (context, journal, trace)
}

fn sprite(quad: &Arc<SpriteQuad>, order: i32) -> SpriteDrawRequest {
    SpriteDrawRequest::new(Arc::clone(quad), Rect::new(0.0, 0.0, 8.0, 8.0)).with_order(order)
}

#[test]
fn a_frame_runs_every_pass_in_order() {
    let (mut engine, _journal, trace) = engine(8);
    let hero: MeshRef = engine
        .assets_mut()
        .models
        .insert("hero", ModelData::new("hero").with_joints(3));
    let quad = engine
        .assets_mut()
        .sprites
        .insert("quad", SpriteQuad::new(ResourceId(0)));
    let owner: DrawableRef = Arc::new(Character {
        pose: vec![Mat4::IDENTITY; 3],
    });

    let renderer = engine.renderer_mut();
    renderer.add_rendering_model_data(
        ModelDrawRequest::new(Arc::clone(&hero), Mat4::IDENTITY, RenderType::all())
            .with_owner(Arc::clone(&owner)),
    );
    renderer.add_rendering_model_data(ModelDrawRequest::new(
        Arc::clone(&hero),
        Mat4::from_translation(Vec3::X),
        RenderType::LIT,
    ));
    renderer.add_rendering_sprite_data(sprite(&quad, 2));
    renderer.add_rendering_sprite_data(sprite(&quad, 1));

    let stats = engine.render_frame();

    assert_eq!(
        *trace.borrow(),
        vec![
            "shadow:herox1:joints=3".to_owned(),
            "gbuffer:herox2:joints=3".to_owned(),
            "lighting".to_owned(),
            "bloom".to_owned(),
            "wire".to_owned(),
            "sprite:1".to_owned(),
            "sprite:2".to_owned(),
        ]
    );
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.instances, 3);
    assert_eq!(stats.sprites_drawn, 2);
}

#[test]
fn constant_ring_is_reused_every_frame() {
    let (mut engine, journal, _trace) = engine(4);
    let quad = Arc::new(SpriteQuad::new(ResourceId(0)));

    for _ in 0..5 {
        for order in 0..4 {
            engine
                .renderer_mut()
                .add_rendering_sprite_data(sprite(&quad, order));
        }
        let stats = engine.render_frame();
        assert_eq!(stats.sprites_drawn, 4);
        assert_eq!(stats.sprites_skipped, 0);
    }

    assert_eq!(engine.gpu().frame_index(), 5);
    assert_eq!(journal.root_bindings().len(), 20);
}

#[test]
fn mask_textures_bind_at_the_mask_register() {
    let (mut engine, journal, _trace) = engine(4);
    let quad = Arc::new(SpriteQuad::new(ResourceId(0)));
    let mask = Arc::new(
        Texture::from_rgba8(engine.gpu_mut(), "mask", 2, 1, &[255; 8], false).unwrap(),
    );
    let mask_slot = mask.registration(engine.gpu()).unwrap();

    engine
        .renderer_mut()
        .add_rendering_sprite_data(sprite(&quad, 0).with_mask(Arc::clone(&mask)));
    engine.render_frame();

    let frame = engine.settings().frame.clone();
    let expected = engine
        .gpu()
        .cbv_srv_uav()
        .resources()
        .gpu_handle(mask_slot)
        .unwrap();
    let roots = journal.root_bindings();
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0].0, frame.sprite_constant_register);
    assert_eq!(roots[1], (frame.sprite_mask_register, expected));
}

#[test]
fn textures_load_once_and_reset_with_the_scene() {
    let (mut engine, journal, _trace) = engine(4);
    let path = std::env::temp_dir().join(format!("frame-renderer-{}.png", std::process::id()));
    image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]))
        .save(&path)
        .unwrap();

    let first = engine.load_texture(&path).unwrap();
    let again = engine.load_texture(&path).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!((first.width(), first.height()), (4, 4));
    assert_eq!(
        journal.count(|call| matches!(call, DeviceCall::UploadTexture { len: 64, .. })),
        1
    );

    let resources_before = engine.gpu().cbv_srv_uav().resources().next_free_index();
    drop((first, again));
    engine.reset_scene();
    assert!(engine.assets().textures.is_empty());
    assert!(engine.gpu().cbv_srv_uav().resources().next_free_index() < resources_before);

    std::fs::remove_file(&path).ok();
}

#[test]
fn textures_held_across_a_scene_reset_no_longer_bind() {
    let (mut engine, journal, _trace) = engine(4);
    let held = Texture::from_rgba8(engine.gpu_mut(), "held", 1, 1, &[0; 4], false).unwrap();
    let old_slot = held.registration(engine.gpu()).unwrap();

    engine.reset_scene();
    let next = Texture::from_rgba8(engine.gpu_mut(), "next", 1, 1, &[9; 4], false).unwrap();
    assert_eq!(next.registration(engine.gpu()), Some(old_slot));

    let err = held.bind(engine.gpu_mut(), 1).unwrap_err();
    assert!(matches!(err, ResourceError::Unregistered { .. }));
    assert!(journal.root_bindings().is_empty());

    next.bind(engine.gpu_mut(), 1).unwrap();
    assert_eq!(journal.root_bindings().len(), 1);
}

#[test]
fn shutdown_releases_every_gpu_object() {
    let (mut engine, journal, _trace) = engine(4);
    let quad = Arc::new(SpriteQuad::new(ResourceId(0)));
    let texture = Texture::from_rgba8(engine.gpu_mut(), "t", 1, 1, &[0; 4], true).unwrap();
    engine
        .assets_mut()
        .textures
        .insert("t", texture);
    engine
        .renderer_mut()
        .add_rendering_sprite_data(sprite(&quad, 0));
    engine.render_frame();

    engine.shutdown();

    assert_eq!(journal.live_resources(), 0);
    assert_eq!(
        journal.count(|call| matches!(call, DeviceCall::CreateHeap { .. })),
        journal.count(|call| matches!(call, DeviceCall::DestroyHeap(_)))
    );
}

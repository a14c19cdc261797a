//! Interfaces of the pass objects the renderer drives.
//!
//! Pipeline state, shaders and command recording live behind these traits.
//! The renderer only decides which pass runs, in what order and with which
//! instances.

use super::batch::DrawableRef;
use super::gpu::Gpu;
use super::instance::InstanceData;
use super::sprite::SpriteDrawRequest;
use crate::asset::{MeshRef, SpriteQuad};

pub trait ShaderPass {
    /// Prepares the pass for this frame. Returning `false` skips it.
    fn begin(&mut self, gpu: &mut Gpu) -> bool;

    fn end(&mut self, _gpu: &mut Gpu) {}
}

/// A pass that draws batched meshes with one instanced call per mesh.
pub trait InstancedPass: ShaderPass {
    /// `owners[i]` submitted `instances[i]`.
    fn draw_model_instanced(
        &mut self,
        gpu: &mut Gpu,
        mesh: &MeshRef,
        instances: &[InstanceData],
        owners: &[Option<DrawableRef>],
    );
}

/// A full-screen pass over the outputs of earlier passes.
pub trait FullscreenPass: ShaderPass {
    fn rendering(&mut self, gpu: &mut Gpu);
}

pub trait SpritePass: ShaderPass {
    /// Called after the sprite's constants are bound.
    fn draw_sprite(&mut self, gpu: &mut Gpu, quad: &SpriteQuad, sprite: &SpriteDrawRequest);
}

/// Debug line overlay, drawn every frame whether or not models were queued.
pub trait DebugWire {
    fn draw(&mut self, gpu: &mut Gpu);
}

/// The fixed set of passes a [`Renderer`](super::Renderer) runs each frame.
pub struct RenderPasses {
    pub shadow: Box<dyn InstancedPass>,
    pub gbuffer: Box<dyn InstancedPass>,
    pub lighting: Box<dyn FullscreenPass>,
    pub bloom: Box<dyn FullscreenPass>,
    pub sprite: Box<dyn SpritePass>,
    pub debug_wire: Box<dyn DebugWire>,
}

pub mod batch;
pub mod depth;
pub mod flags;
pub mod gpu;
pub mod instance;
pub mod pass;
pub mod render_target;
pub mod renderer;
pub mod sprite;
pub mod texture;

pub use batch::{BatchEntry, Drawable, DrawableRef, ModelBatches, ModelDrawRequest};
pub use depth::{DepthStencil, DEPTH_FORMAT};
pub use flags::RenderType;
pub use gpu::Gpu;
pub use instance::{InstanceData, SpriteConstants};
pub use pass::{DebugWire, FullscreenPass, InstancedPass, RenderPasses, ShaderPass, SpritePass};
pub use render_target::RenderTarget;
pub use renderer::{FrameStats, Renderer};
pub use sprite::{Rect, SpriteDrawRequest, SpriteQueue};
pub use texture::Texture;

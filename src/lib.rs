pub mod asset;
pub mod context;
pub mod device;
pub mod error;
pub mod heap;
pub mod renderer;
pub mod settings;

pub use context::EngineContext;
pub use error::{DeviceError, HeapError, ResourceError};
pub use settings::RenderSettings;

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

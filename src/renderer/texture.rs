use std::path::Path;

use crate::device::{ReleaseQueue, ResourceDesc, ResourceId, TextureDesc, TextureUsage};
use crate::error::{DeviceError, ResourceError};
use crate::renderer::Gpu;

/// A sampled 2D texture with its shader-resource view.
#[derive(Debug)]
pub struct Texture {
    resource: ResourceId,
    desc: TextureDesc,
    label: String,
    registration: Registration,
    releases: ReleaseQueue,
}

/// Where the shader-resource view lives. Scene-scoped views carry the scene
/// generation they were registered under; constant views carry none.
#[derive(Debug, Clone, Copy)]
struct Registration {
    slot: u32,
    scene: Option<u64>,
}

impl Texture {
    /// Load texture from file path. `is_constant` keeps the view alive
    /// across scene resets.
    pub fn from_path(
        gpu: &mut Gpu,
        path: impl AsRef<Path>,
        is_constant: bool,
    ) -> Result<Self, ResourceError> {
        let path = path.as_ref();
        log::info!("Loading texture: {:?}", path);

        let rgba = image::open(path)
            .map_err(|err| {
                log::error!("Failed to load image {:?}: {}", path, err);
                ResourceError::Image(err)
            })?
            .to_rgba8();
        let (width, height) = rgba.dimensions();

        Self::from_rgba8(
            gpu,
            &path.display().to_string(),
            width,
            height,
            &rgba,
            is_constant,
        )
    }

    /// Create texture from tightly packed rgba8 data.
    pub fn from_rgba8(
        gpu: &mut Gpu,
        label: &str,
        width: u32,
        height: u32,
        data: &[u8],
        is_constant: bool,
    ) -> Result<Self, ResourceError> {
        let desc = TextureDesc {
            width: width.max(1),
            height: height.max(1),
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsage::SHADER_RESOURCE | TextureUsage::COPY_DST,
        };

        let resource = gpu.create_resource(&ResourceDesc::Texture2D {
            desc,
            label: Some(label),
        })?;

        match Self::register(gpu, resource, &desc, data, is_constant) {
            Ok(slot) => Ok(Self {
                resource,
                desc,
                label: label.to_owned(),
                registration: Registration {
                    slot,
                    scene: (!is_constant).then(|| gpu.scene_generation()),
                },
                releases: gpu.release_queue().clone(),
            }),
            Err(err) => {
                log::error!("Failed to create texture '{}': {}", label, err);
                gpu.device_mut().release_resource(resource);
                Err(err)
            }
        }
    }

    fn register(
        gpu: &mut Gpu,
        resource: ResourceId,
        desc: &TextureDesc,
        data: &[u8],
        is_constant: bool,
    ) -> Result<u32, ResourceError> {
        let expected = desc.width as u64 * desc.height as u64 * 4;
        if data.len() as u64 != expected {
            return Err(DeviceError::OutOfBounds {
                resource,
                offset: 0,
                len: data.len() as u64,
                size: expected,
            }
            .into());
        }

        gpu.device_mut()
            .upload_texture(resource, data, desc.width * 4)?;
        Ok(gpu.create_shader_resource_view(resource, is_constant)?)
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    /// Slot of the shader-resource view, `None` if the scene it was
    /// registered for has since been reset.
    pub fn registration(&self, gpu: &Gpu) -> Option<u32> {
        match self.registration.scene {
            Some(scene) if scene != gpu.scene_generation() => None,
            _ => Some(self.registration.slot),
        }
    }

    pub fn bind(&self, gpu: &mut Gpu, root_index: u32) -> Result<(), ResourceError> {
        let Some(slot) = self.registration(gpu) else {
            log::error!(
                "Texture '{}' bound after its scene was reset; its view slot is gone",
                self.label
            );
            return Err(ResourceError::Unregistered {
                label: self.label.clone(),
            });
        };
        Ok(gpu.bind_resource(root_index, slot)?)
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.releases.push(self.resource);
    }
}

use crate::device::{
    CpuDescriptorHandle, ReleaseQueue, ResourceDesc, ResourceId, TextureDesc, TextureUsage,
};
use crate::error::ResourceError;
use crate::renderer::Gpu;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// A depth buffer with its DSV and, when sampled later (shadow maps), an SRV.
///
/// Views are registered as constant so they outlive scene resets.
#[derive(Debug)]
pub struct DepthStencil {
    resource: ResourceId,
    desc: TextureDesc,
    dsv: u32,
    srv: Option<u32>,
    clear_depth: f32,
    releases: ReleaseQueue,
}

impl DepthStencil {
    pub fn new(
        gpu: &mut Gpu,
        label: &str,
        width: u32,
        height: u32,
        sampled: bool,
    ) -> Result<Self, ResourceError> {
        let mut usage = TextureUsage::DEPTH_STENCIL;
        if sampled {
            usage |= TextureUsage::SHADER_RESOURCE;
        }
        let desc = TextureDesc {
            width: width.max(1),
            height: height.max(1),
            format: DEPTH_FORMAT,
            usage,
        };

        let resource = gpu.create_resource(&ResourceDesc::Texture2D {
            desc,
            label: Some(label),
        })?;

        let views = gpu
            .create_depth_stencil_view(resource, true)
            .and_then(|dsv| {
                let srv = if sampled {
                    Some(gpu.create_shader_resource_view(resource, true)?)
                } else {
                    None
                };
                Ok((dsv, srv))
            });

        match views {
            Ok((dsv, srv)) => {
                log::info!("Created depth buffer '{}' {}x{}", label, desc.width, desc.height);
                Ok(Self {
                    resource,
                    desc,
                    dsv,
                    srv,
                    clear_depth: 1.0,
                    releases: gpu.release_queue().clone(),
                })
            }
            Err(err) => {
                log::error!("Failed to register views for depth buffer '{}': {}", label, err);
                gpu.device_mut().release_resource(resource);
                Err(err.into())
            }
        }
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn clear_depth(&self) -> f32 {
        self.clear_depth
    }

    pub fn dsv_slot(&self) -> u32 {
        self.dsv
    }

    pub fn srv_slot(&self) -> Option<u32> {
        self.srv
    }

    pub fn dsv_handle(&self, gpu: &Gpu) -> CpuDescriptorHandle {
        gpu.depth_stencil_handle(self.dsv)
    }

    /// Binds the depth buffer for sampling.
    pub fn bind(&self, gpu: &mut Gpu, root_index: u32) -> Result<(), ResourceError> {
        let Some(slot) = self.srv else {
            log::error!("Depth buffer {:?} is not sampled", self.resource);
            return Err(ResourceError::Unregistered {
                label: format!("depth {:?}", self.resource),
            });
        };
        Ok(gpu.bind_resource(root_index, slot)?)
    }
}

impl Drop for DepthStencil {
    fn drop(&mut self) {
        self.releases.push(self.resource);
    }
}

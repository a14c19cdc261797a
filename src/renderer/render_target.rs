use crate::device::{
    CpuDescriptorHandle, ReleaseQueue, ResourceDesc, ResourceId, TextureDesc, TextureUsage,
};
use crate::error::ResourceError;
use crate::renderer::Gpu;

/// An offscreen color target (G-buffer layer, bloom chain) that later passes
/// sample through its shader-resource view.
#[derive(Debug)]
pub struct RenderTarget {
    resource: ResourceId,
    desc: TextureDesc,
    rtv: u32,
    srv: u32,
    clear_color: [f32; 4],
    releases: ReleaseQueue,
}

impl RenderTarget {
    pub fn new(
        gpu: &mut Gpu,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Result<Self, ResourceError> {
        let desc = TextureDesc {
            width: width.max(1),
            height: height.max(1),
            format,
            usage: TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE,
        };
        let resource = gpu.create_resource(&ResourceDesc::Texture2D {
            desc,
            label: Some(label),
        })?;

        let views = gpu.create_render_target_view(resource, true).and_then(|rtv| {
            let srv = gpu.create_shader_resource_view(resource, true)?;
            Ok((rtv, srv))
        });

        match views {
            Ok((rtv, srv)) => Ok(Self {
                resource,
                desc,
                rtv,
                srv,
                clear_color: [0.0, 0.0, 0.0, 1.0],
                releases: gpu.release_queue().clone(),
            }),
            Err(err) => {
                log::error!("Failed to register views for render target '{}': {}", label, err);
                gpu.device_mut().release_resource(resource);
                Err(err.into())
            }
        }
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn rtv_handle(&self, gpu: &Gpu) -> CpuDescriptorHandle {
        gpu.render_target_handle(self.rtv)
    }

    pub fn srv_slot(&self) -> u32 {
        self.srv
    }

    pub fn bind(&self, gpu: &mut Gpu, root_index: u32) -> Result<(), ResourceError> {
        Ok(gpu.bind_resource(root_index, self.srv)?)
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        self.releases.push(self.resource);
    }
}

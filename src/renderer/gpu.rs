use bytemuck::Pod;

use crate::device::{CpuDescriptorHandle, GraphicsDevice, ReleaseQueue, ResourceDesc, ResourceId};
use crate::error::{DeviceError, HeapError};
use crate::heap::{CbvSrvUavHeap, ConstantBufferAllocator, DsvHeap, RtvHeap};
use crate::settings::HeapSettings;

/// The device together with every heap and the constant-buffer ring.
///
/// Owned by [`EngineContext`](crate::EngineContext) and lent to the renderer
/// and passes for the duration of a frame.
pub struct Gpu {
    device: Box<dyn GraphicsDevice>,
    cbv_srv_uav: CbvSrvUavHeap,
    rtv: RtvHeap,
    dsv: DsvHeap,
    constants: ConstantBufferAllocator,
    releases: ReleaseQueue,
    frame: u64,
    scene: u64,
}

impl Gpu {
    pub fn new(mut device: Box<dyn GraphicsDevice>, settings: &HeapSettings) -> Result<Self, HeapError> {
        let cbv_srv_uav = CbvSrvUavHeap::create(device.as_mut(), settings.cbv_srv_uav)?;

        let rtv = match RtvHeap::create(device.as_mut(), settings.render_targets) {
            Ok(rtv) => rtv,
            Err(err) => {
                cbv_srv_uav.destroy(device.as_mut());
                return Err(err);
            }
        };

        let dsv = match DsvHeap::create(device.as_mut(), settings.depth_stencils) {
            Ok(dsv) => dsv,
            Err(err) => {
                rtv.destroy(device.as_mut());
                cbv_srv_uav.destroy(device.as_mut());
                return Err(err);
            }
        };

        let constants = match ConstantBufferAllocator::create(device.as_mut(), &cbv_srv_uav) {
            Ok(constants) => constants,
            Err(err) => {
                dsv.destroy(device.as_mut());
                rtv.destroy(device.as_mut());
                cbv_srv_uav.destroy(device.as_mut());
                return Err(err);
            }
        };

        Ok(Self {
            device,
            cbv_srv_uav,
            rtv,
            dsv,
            constants,
            releases: ReleaseQueue::new(),
            frame: 0,
            scene: 0,
        })
    }

    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> &mut dyn GraphicsDevice {
        self.device.as_mut()
    }

    pub fn cbv_srv_uav(&self) -> &CbvSrvUavHeap {
        &self.cbv_srv_uav
    }

    pub fn rtv(&self) -> &RtvHeap {
        &self.rtv
    }

    pub fn dsv(&self) -> &DsvHeap {
        &self.dsv
    }

    pub fn constants(&self) -> &ConstantBufferAllocator {
        &self.constants
    }

    /// Queue that resource wrappers hand their resource to when dropped.
    pub fn release_queue(&self) -> &ReleaseQueue {
        &self.releases
    }

    /// Frames started since creation.
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// Bumped by every [`Gpu::reset_scene`]. Scene-scoped views registered
    /// under an older generation no longer own their slot.
    pub fn scene_generation(&self) -> u64 {
        self.scene
    }

    /// Rewinds the per-frame state: the constant region of the heap and the
    /// ring cursor. Also frees resources dropped since the last frame.
    pub fn begin_frame(&mut self) {
        self.releases.flush(self.device.as_mut());
        self.cbv_srv_uav.constants_mut().reset();
        self.constants.reset_current_use_number();
        self.frame += 1;
    }

    /// Rewinds scene-scoped views. Views registered as constant survive.
    pub fn reset_scene(&mut self) {
        self.cbv_srv_uav.resources_mut().reset();
        self.rtv.heap_mut().reset();
        self.dsv.heap_mut().reset();
        self.scene += 1;
        log::info!(
            "Scene reset: {} SRV, {} RTV, {} DSV slots still in use",
            self.cbv_srv_uav.resources().next_free_index(),
            self.rtv.heap().next_free_index(),
            self.dsv.heap().next_free_index()
        );
    }

    /// Copies `data` into this frame's constant ring and binds it at
    /// `root_index`.
    pub fn bind_attach_data<T: Pod>(&mut self, root_index: u32, data: &T) -> Result<u32, HeapError> {
        self.constants
            .bind_attach_data(self.device.as_mut(), &mut self.cbv_srv_uav, root_index, data)
    }

    pub fn create_resource(&mut self, desc: &ResourceDesc<'_>) -> Result<ResourceId, DeviceError> {
        self.device.create_committed_resource(desc)
    }

    pub fn create_shader_resource_view(
        &mut self,
        resource: ResourceId,
        is_constant: bool,
    ) -> Result<u32, HeapError> {
        self.cbv_srv_uav
            .create_shader_resource_view(self.device.as_mut(), resource, is_constant)
    }

    pub fn create_render_target_view(
        &mut self,
        resource: ResourceId,
        is_constant: bool,
    ) -> Result<u32, HeapError> {
        self.rtv.create_view(self.device.as_mut(), resource, is_constant)
    }

    pub fn create_depth_stencil_view(
        &mut self,
        resource: ResourceId,
        is_constant: bool,
    ) -> Result<u32, HeapError> {
        self.dsv.create_view(self.device.as_mut(), resource, is_constant)
    }

    pub fn render_target_handle(&self, slot: u32) -> CpuDescriptorHandle {
        self.rtv.cpu_handle(slot)
    }

    pub fn depth_stencil_handle(&self, slot: u32) -> CpuDescriptorHandle {
        self.dsv.cpu_handle(slot)
    }

    /// Binds a shader-resource slot to a root parameter.
    pub fn bind_resource(&mut self, root_index: u32, slot: u32) -> Result<(), HeapError> {
        self.cbv_srv_uav.bind_resource(self.device.as_mut(), root_index, slot)
    }

    /// Releases the ring, every heap and anything still queued for release.
    ///
    /// Resource wrappers dropped after this point only reach a dead queue.
    pub fn destroy(self) {
        let Self {
            mut device,
            cbv_srv_uav,
            rtv,
            dsv,
            constants,
            releases,
            frame,
            ..
        } = self;

        releases.flush(device.as_mut());
        constants.destroy(device.as_mut());
        dsv.destroy(device.as_mut());
        rtv.destroy(device.as_mut());
        cbv_srv_uav.destroy(device.as_mut());
        log::info!("GPU resources destroyed after {frame} frames");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, HeadlessDevice};
    use crate::settings::HeapBudget;

    fn settings() -> HeapSettings {
        HeapSettings {
            cbv_srv_uav: HeapBudget {
                regular: 4,
                constant: 4,
                reserved: 0,
            },
            render_targets: 2,
            depth_stencils: 2,
        }
    }

    #[test]
    fn begin_frame_rewinds_constants_but_not_resources() {
        let device = HeadlessDevice::new();
        let journal = device.journal();
        let mut gpu = Gpu::new(Box::new(device), &settings()).unwrap();

        let texture = gpu
            .create_resource(&ResourceDesc::Buffer {
                size: 16,
                memory: crate::device::MemoryLocation::Default,
                label: None,
            })
            .unwrap();
        gpu.create_shader_resource_view(texture, false).unwrap();
        gpu.bind_attach_data(0, &[1.0f32; 4]).unwrap();
        gpu.bind_attach_data(0, &[2.0f32; 4]).unwrap();

        gpu.begin_frame();

        assert_eq!(gpu.constants().current_use_offset(), 0);
        assert_eq!(gpu.cbv_srv_uav().constants().next_free_index(), 0);
        assert_eq!(gpu.cbv_srv_uav().resources().next_free_index(), 1);
        assert_eq!(gpu.frame_index(), 1);
        assert!(journal.live_resources() >= 2);
    }

    #[test]
    fn reset_scene_keeps_constant_registrations() {
        let mut gpu = Gpu::new(Box::new(HeadlessDevice::new()), &settings()).unwrap();
        let resource = gpu
            .create_resource(&ResourceDesc::Buffer {
                size: 16,
                memory: crate::device::MemoryLocation::Default,
                label: None,
            })
            .unwrap();

        gpu.create_shader_resource_view(resource, true).unwrap();
        gpu.create_shader_resource_view(resource, false).unwrap();
        gpu.create_shader_resource_view(resource, false).unwrap();
        gpu.reset_scene();

        assert_eq!(gpu.cbv_srv_uav().resources().next_free_index(), 1);
        assert_eq!(gpu.scene_generation(), 1);
    }

    #[test]
    fn failed_construction_releases_what_was_created() {
        let device = HeadlessDevice::new();
        let journal = device.journal();
        // CBV/SRV/UAV and RTV heaps succeed, the DSV heap fails.
        let mut settings = settings();
        settings.depth_stencils = 0;

        let err = Gpu::new(Box::new(device), &settings).err().unwrap();
        assert!(matches!(err, HeapError::EmptyHeap { heap: "DSV" }));
        assert_eq!(
            journal.count(|call| matches!(call, DeviceCall::CreateHeap { .. })),
            journal.count(|call| matches!(call, DeviceCall::DestroyHeap(_)))
        );
    }

    #[test]
    fn destroy_releases_everything() {
        let device = HeadlessDevice::new();
        let journal = device.journal();
        let gpu = Gpu::new(Box::new(device), &settings()).unwrap();
        let ring = gpu.constants().resource();

        gpu.destroy();

        assert!(!journal.is_mapped(ring));
        assert_eq!(journal.live_resources(), 0);
        assert_eq!(
            journal.count(|call| matches!(call, DeviceCall::DestroyHeap(_))),
            3
        );
    }
}

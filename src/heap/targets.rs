use crate::device::{CpuDescriptorHandle, GraphicsDevice, ResourceId};
use crate::error::HeapError;
use crate::heap::descriptor_heap::{DescriptorHeap, Dsv, Rtv};

#[derive(Debug)]
pub struct RtvHeap {
    inner: DescriptorHeap<Rtv>,
}

impl RtvHeap {
    pub fn create(device: &mut dyn GraphicsDevice, capacity: u32) -> Result<Self, HeapError> {
        Ok(Self {
            inner: DescriptorHeap::create(device, capacity, "RTV")?,
        })
    }

    pub fn create_view(
        &mut self,
        device: &mut dyn GraphicsDevice,
        resource: ResourceId,
        is_constant: bool,
    ) -> Result<u32, HeapError> {
        self.inner
            .register_with(device, is_constant, |device, dest| {
                device.create_render_target_view(resource, dest)
            })
    }

    pub fn cpu_handle(&self, slot: u32) -> CpuDescriptorHandle {
        self.inner.cpu_handle(slot)
    }

    pub fn heap(&self) -> &DescriptorHeap<Rtv> {
        &self.inner
    }

    pub fn heap_mut(&mut self) -> &mut DescriptorHeap<Rtv> {
        &mut self.inner
    }

    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        self.inner.destroy(device);
    }
}

#[derive(Debug)]
pub struct DsvHeap {
    inner: DescriptorHeap<Dsv>,
}

impl DsvHeap {
    pub fn create(device: &mut dyn GraphicsDevice, capacity: u32) -> Result<Self, HeapError> {
        Ok(Self {
            inner: DescriptorHeap::create(device, capacity, "DSV")?,
        })
    }

    pub fn create_view(
        &mut self,
        device: &mut dyn GraphicsDevice,
        resource: ResourceId,
        is_constant: bool,
    ) -> Result<u32, HeapError> {
        self.inner
            .register_with(device, is_constant, |device, dest| {
                device.create_depth_stencil_view(resource, dest)
            })
    }

    pub fn cpu_handle(&self, slot: u32) -> CpuDescriptorHandle {
        self.inner.cpu_handle(slot)
    }

    pub fn heap(&self) -> &DescriptorHeap<Dsv> {
        &self.inner
    }

    pub fn heap_mut(&mut self) -> &mut DescriptorHeap<Dsv> {
        &mut self.inner
    }

    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        self.inner.destroy(device);
    }
}

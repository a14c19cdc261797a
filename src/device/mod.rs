//! The graphics-device seam.
//!
//! Heaps, the constant-buffer allocator and the resource wrappers talk to the
//! GPU only through [`GraphicsDevice`]. Two implementations ship with the
//! crate: [`WgpuDevice`] for real hardware and [`HeadlessDevice`], which
//! records every call and is what the tests run against.

pub mod headless;
pub mod wgpu_device;

pub use headless::{DeviceCall, DeviceJournal, HeadlessDevice};
pub use wgpu_device::{Descriptor, WgpuDevice};

use std::sync::{Arc, Mutex, PoisonError};

use bitflags::bitflags;

use crate::error::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapType {
    CbvSrvUav,
    Rtv,
    Dsv,
}

impl HeapType {
    pub const fn label(self) -> &'static str {
        match self {
            HeapType::CbvSrvUav => "CBV/SRV/UAV",
            HeapType::Rtv => "RTV",
            HeapType::Dsv => "DSV",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

/// CPU-side address of a descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuDescriptorHandle(pub u64);

/// Shader-visible address of a descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuDescriptorHandle(pub u64);

impl CpuDescriptorHandle {
    pub const fn offset(self, slots: u32, stride: u32) -> Self {
        Self(self.0 + slots as u64 * stride as u64)
    }
}

impl GpuDescriptorHandle {
    pub const fn offset(self, slots: u32, stride: u32) -> Self {
        Self(self.0 + slots as u64 * stride as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorHeapDesc<'a> {
    pub kind: HeapType,
    pub count: u32,
    pub shader_visible: bool,
    pub label: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    /// CPU-writable memory used for streaming per-frame data.
    Upload,
    /// Device-local memory.
    Default,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SHADER_RESOURCE = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const DEPTH_STENCIL = 1 << 2;
        const COPY_DST = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: TextureUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceDesc<'a> {
    Buffer {
        size: u64,
        memory: MemoryLocation,
        label: Option<&'a str>,
    },
    Texture2D {
        desc: TextureDesc,
        label: Option<&'a str>,
    },
}

/// A constant-buffer view over a byte range of a buffer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBufferView {
    pub resource: ResourceId,
    pub offset: u64,
    pub size: u64,
}

pub trait GraphicsDevice {
    fn create_descriptor_heap(
        &mut self,
        desc: &DescriptorHeapDesc<'_>,
    ) -> Result<HeapId, DeviceError>;

    fn destroy_descriptor_heap(&mut self, heap: HeapId);

    /// Byte distance between two consecutive slots of a heap of `kind`.
    fn descriptor_increment_size(&self, kind: HeapType) -> u32;

    fn cpu_heap_start(&self, heap: HeapId) -> CpuDescriptorHandle;

    /// `None` for heaps that were not created shader visible.
    fn gpu_heap_start(&self, heap: HeapId) -> Option<GpuDescriptorHandle>;

    fn create_committed_resource(
        &mut self,
        desc: &ResourceDesc<'_>,
    ) -> Result<ResourceId, DeviceError>;

    fn release_resource(&mut self, resource: ResourceId);

    /// Uploads tightly packed texel rows into mip 0 of a texture.
    fn upload_texture(
        &mut self,
        resource: ResourceId,
        data: &[u8],
        bytes_per_row: u32,
    ) -> Result<(), DeviceError>;

    fn create_shader_resource_view(
        &mut self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), DeviceError>;

    fn create_constant_buffer_view(
        &mut self,
        view: &ConstantBufferView,
        dest: CpuDescriptorHandle,
    ) -> Result<(), DeviceError>;

    fn create_render_target_view(
        &mut self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), DeviceError>;

    fn create_depth_stencil_view(
        &mut self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), DeviceError>;

    /// Makes an upload buffer CPU-writable until [`GraphicsDevice::unmap`].
    fn map(&mut self, resource: ResourceId) -> Result<(), DeviceError>;

    fn write_mapped(
        &mut self,
        resource: ResourceId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError>;

    fn unmap(&mut self, resource: ResourceId);

    fn set_graphics_root_descriptor_table(&mut self, root_index: u32, handle: GpuDescriptorHandle);
}

/// Resources whose last owner has gone away, waiting for the device to free them.
///
/// Wrappers cannot reach the device from `Drop`, so they park their id here
/// and [`Gpu::begin_frame`](crate::renderer::Gpu::begin_frame) releases the
/// batch.
#[derive(Debug, Clone, Default)]
pub struct ReleaseQueue {
    pending: Arc<Mutex<Vec<ResourceId>>>,
}

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, resource: ResourceId) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(resource);
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush(&self, device: &mut dyn GraphicsDevice) -> usize {
        let drained: Vec<ResourceId> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for resource in &drained {
            device.release_resource(*resource);
        }

        if !drained.is_empty() {
            log::debug!("Released {} GPU resources", drained.len());
        }
        drained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_offset_is_slot_times_stride() {
        let base = CpuDescriptorHandle(0x1000);
        assert_eq!(base.offset(3, 32), CpuDescriptorHandle(0x1000 + 96));
        assert_eq!(GpuDescriptorHandle(8).offset(0, 64), GpuDescriptorHandle(8));
    }

    #[test]
    fn release_queue_flushes_everything_once() {
        let mut device = HeadlessDevice::new();
        let journal = device.journal();
        let queue = ReleaseQueue::new();

        queue.push(ResourceId(4));
        queue.push(ResourceId(9));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.flush(&mut device), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.flush(&mut device), 0);

        let released: Vec<_> = journal
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                DeviceCall::ReleaseResource(id) => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(released, vec![ResourceId(4), ResourceId(9)]);
    }
}

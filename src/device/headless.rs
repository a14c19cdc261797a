//! A device that allocates nothing on a GPU and writes down everything it is asked to do.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::device::{
    ConstantBufferView, CpuDescriptorHandle, DescriptorHeapDesc, GpuDescriptorHandle,
    GraphicsDevice, HeapId, HeapType, MemoryLocation, ResourceDesc, ResourceId,
};
use crate::error::DeviceError;

const HEADLESS_DESCRIPTOR_STRIDE: u32 = 32;
const GPU_ADDRESS_BIT: u64 = 1 << 48;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    CreateHeap {
        heap: HeapId,
        kind: HeapType,
        count: u32,
    },
    DestroyHeap(HeapId),
    CreateResource(ResourceId),
    ReleaseResource(ResourceId),
    UploadTexture {
        resource: ResourceId,
        len: usize,
    },
    ShaderResourceView {
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    },
    ConstantBufferView {
        view: ConstantBufferView,
        dest: CpuDescriptorHandle,
    },
    RenderTargetView {
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    },
    DepthStencilView {
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    },
    Map(ResourceId),
    WriteMapped {
        resource: ResourceId,
        offset: u64,
        len: usize,
    },
    Unmap(ResourceId),
    SetRootDescriptorTable {
        root_index: u32,
        handle: GpuDescriptorHandle,
    },
}

#[derive(Debug)]
struct HeadlessBuffer {
    bytes: Vec<u8>,
    memory: MemoryLocation,
    mapped: bool,
}

#[derive(Debug, Default)]
struct HeadlessState {
    calls: Vec<DeviceCall>,
    next_id: u32,
    heaps: HashMap<HeapId, (HeapType, bool)>,
    buffers: HashMap<ResourceId, HeadlessBuffer>,
    textures: HashMap<ResourceId, u32>,
    fail_allocations: u32,
}

/// Read access to what a [`HeadlessDevice`] has been asked to do.
#[derive(Debug, Clone)]
pub struct DeviceJournal {
    state: Arc<Mutex<HeadlessState>>,
}

impl DeviceJournal {
    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Root tables bound so far, in call order.
    pub fn root_bindings(&self) -> Vec<(u32, GpuDescriptorHandle)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::SetRootDescriptorTable { root_index, handle } => {
                    Some((*root_index, *handle))
                }
                _ => None,
            })
            .collect()
    }

    /// Current contents of a buffer resource.
    pub fn buffer_bytes(&self, resource: ResourceId) -> Option<Vec<u8>> {
        self.lock()
            .buffers
            .get(&resource)
            .map(|buffer| buffer.bytes.clone())
    }

    pub fn is_mapped(&self, resource: ResourceId) -> bool {
        self.lock()
            .buffers
            .get(&resource)
            .is_some_and(|buffer| buffer.mapped)
    }

    pub fn live_resources(&self) -> usize {
        let state = self.lock();
        state.buffers.len() + state.textures.len()
    }

    pub fn clear(&self) {
        self.lock().calls.clear();
    }
}

#[derive(Debug, Default)]
pub struct HeadlessDevice {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> DeviceJournal {
        DeviceJournal {
            state: Arc::clone(&self.state),
        }
    }

    /// Makes the next `count` heap or resource allocations fail.
    pub fn fail_next_allocations(&self, count: u32) {
        self.lock().fail_allocations = count;
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_view_target(
        state: &HeadlessState,
        resource: ResourceId,
    ) -> Result<(), DeviceError> {
        if state.buffers.contains_key(&resource) || state.textures.contains_key(&resource) {
            Ok(())
        } else {
            Err(DeviceError::UnknownResource(resource))
        }
    }
}

impl HeadlessState {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn take_failure(&mut self) -> bool {
        if self.fail_allocations > 0 {
            self.fail_allocations -= 1;
            true
        } else {
            false
        }
    }
}

fn heap_base(heap: HeapId) -> u64 {
    (heap.0 as u64 + 1) << 32
}

impl GraphicsDevice for HeadlessDevice {
    fn create_descriptor_heap(
        &mut self,
        desc: &DescriptorHeapDesc<'_>,
    ) -> Result<HeapId, DeviceError> {
        let mut state = self.lock();
        if state.take_failure() {
            return Err(DeviceError::AllocationFailed(format!(
                "{} heap of {} slots",
                desc.kind.label(),
                desc.count
            )));
        }

        let heap = HeapId(state.next_id());
        state.heaps.insert(heap, (desc.kind, desc.shader_visible));
        state.calls.push(DeviceCall::CreateHeap {
            heap,
            kind: desc.kind,
            count: desc.count,
        });
        Ok(heap)
    }

    fn destroy_descriptor_heap(&mut self, heap: HeapId) {
        let mut state = self.lock();
        state.heaps.remove(&heap);
        state.calls.push(DeviceCall::DestroyHeap(heap));
    }

    fn descriptor_increment_size(&self, _kind: HeapType) -> u32 {
        HEADLESS_DESCRIPTOR_STRIDE
    }

    fn cpu_heap_start(&self, heap: HeapId) -> CpuDescriptorHandle {
        CpuDescriptorHandle(heap_base(heap))
    }

    fn gpu_heap_start(&self, heap: HeapId) -> Option<GpuDescriptorHandle> {
        let state = self.lock();
        match state.heaps.get(&heap) {
            Some((_, true)) => Some(GpuDescriptorHandle(heap_base(heap) | GPU_ADDRESS_BIT)),
            _ => None,
        }
    }

    fn create_committed_resource(
        &mut self,
        desc: &ResourceDesc<'_>,
    ) -> Result<ResourceId, DeviceError> {
        let mut state = self.lock();
        if state.take_failure() {
            return Err(DeviceError::AllocationFailed(format!("{desc:?}")));
        }

        let resource = ResourceId(state.next_id());
        match *desc {
            ResourceDesc::Buffer { size, memory, .. } => {
                state.buffers.insert(
                    resource,
                    HeadlessBuffer {
                        bytes: vec![0; size as usize],
                        memory,
                        mapped: false,
                    },
                );
            }
            ResourceDesc::Texture2D { desc, .. } => {
                state.textures.insert(resource, desc.width * desc.height);
            }
        }
        state.calls.push(DeviceCall::CreateResource(resource));
        Ok(resource)
    }

    fn release_resource(&mut self, resource: ResourceId) {
        let mut state = self.lock();
        state.buffers.remove(&resource);
        state.textures.remove(&resource);
        state.calls.push(DeviceCall::ReleaseResource(resource));
    }

    fn upload_texture(
        &mut self,
        resource: ResourceId,
        data: &[u8],
        _bytes_per_row: u32,
    ) -> Result<(), DeviceError> {
        let mut state = self.lock();
        if !state.textures.contains_key(&resource) {
            return Err(DeviceError::UnknownResource(resource));
        }
        state.calls.push(DeviceCall::UploadTexture {
            resource,
            len: data.len(),
        });
        Ok(())
    }

    fn create_shader_resource_view(
        &mut self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), DeviceError> {
        let mut state = self.lock();
        Self::check_view_target(&state, resource)?;
        state
            .calls
            .push(DeviceCall::ShaderResourceView { resource, dest });
        Ok(())
    }

    fn create_constant_buffer_view(
        &mut self,
        view: &ConstantBufferView,
        dest: CpuDescriptorHandle,
    ) -> Result<(), DeviceError> {
        let mut state = self.lock();
        let Some(buffer) = state.buffers.get(&view.resource) else {
            return Err(DeviceError::UnknownResource(view.resource));
        };
        let size = buffer.bytes.len() as u64;
        if view.offset + view.size > size {
            return Err(DeviceError::OutOfBounds {
                resource: view.resource,
                offset: view.offset,
                len: view.size,
                size,
            });
        }
        state
            .calls
            .push(DeviceCall::ConstantBufferView { view: *view, dest });
        Ok(())
    }

    fn create_render_target_view(
        &mut self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), DeviceError> {
        let mut state = self.lock();
        Self::check_view_target(&state, resource)?;
        state.calls.push(DeviceCall::RenderTargetView { resource, dest });
        Ok(())
    }

    fn create_depth_stencil_view(
        &mut self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), DeviceError> {
        let mut state = self.lock();
        Self::check_view_target(&state, resource)?;
        state.calls.push(DeviceCall::DepthStencilView { resource, dest });
        Ok(())
    }

    fn map(&mut self, resource: ResourceId) -> Result<(), DeviceError> {
        let mut state = self.lock();
        let Some(buffer) = state.buffers.get_mut(&resource) else {
            return Err(DeviceError::UnknownResource(resource));
        };
        if buffer.memory != MemoryLocation::Upload {
            return Err(DeviceError::InvalidUsage {
                resource,
                reason: "only upload buffers can be mapped",
            });
        }
        buffer.mapped = true;
        state.calls.push(DeviceCall::Map(resource));
        Ok(())
    }

    fn write_mapped(
        &mut self,
        resource: ResourceId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let mut state = self.lock();
        let Some(buffer) = state.buffers.get_mut(&resource) else {
            return Err(DeviceError::UnknownResource(resource));
        };
        if !buffer.mapped {
            return Err(DeviceError::InvalidUsage {
                resource,
                reason: "buffer is not mapped",
            });
        }
        let size = buffer.bytes.len() as u64;
        let end = offset + data.len() as u64;
        if end > size {
            return Err(DeviceError::OutOfBounds {
                resource,
                offset,
                len: data.len() as u64,
                size,
            });
        }
        buffer.bytes[offset as usize..end as usize].copy_from_slice(data);
        state.calls.push(DeviceCall::WriteMapped {
            resource,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn unmap(&mut self, resource: ResourceId) {
        let mut state = self.lock();
        if let Some(buffer) = state.buffers.get_mut(&resource) {
            buffer.mapped = false;
        }
        state.calls.push(DeviceCall::Unmap(resource));
    }

    fn set_graphics_root_descriptor_table(&mut self, root_index: u32, handle: GpuDescriptorHandle) {
        self.lock()
            .calls
            .push(DeviceCall::SetRootDescriptorTable { root_index, handle });
    }
}

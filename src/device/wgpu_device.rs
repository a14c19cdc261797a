//! [`GraphicsDevice`] over `wgpu`.
//!
//! wgpu has no descriptor heaps, so each heap is emulated as a table of
//! [`Descriptor`]s addressed by the same handle arithmetic the heap layer
//! uses. Pass implementations resolve the tables bound through
//! `set_graphics_root_descriptor_table` into bind groups of their own.

use std::collections::{BTreeMap, HashMap};

use crate::device::{
    ConstantBufferView, CpuDescriptorHandle, DescriptorHeapDesc, GpuDescriptorHandle,
    GraphicsDevice, HeapId, HeapType, MemoryLocation, ResourceDesc, ResourceId, TextureDesc,
    TextureUsage,
};
use crate::error::DeviceError;

const DESCRIPTOR_STRIDE: u32 = 32;
const GPU_ADDRESS_BIT: u64 = 1 << 48;

/// What a populated descriptor slot refers to.
#[derive(Debug, Clone)]
pub enum Descriptor {
    ShaderResource(wgpu::TextureView),
    ConstantBuffer {
        buffer: wgpu::Buffer,
        offset: u64,
        size: u64,
    },
    RenderTarget(wgpu::TextureView),
    DepthStencil(wgpu::TextureView),
}

struct EmulatedHeap {
    kind: HeapType,
    shader_visible: bool,
    slots: Vec<Option<Descriptor>>,
}

enum WgpuResource {
    Buffer { buffer: wgpu::Buffer, mapped: bool },
    Texture { texture: wgpu::Texture, desc: TextureDesc },
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: u32,
    heaps: HashMap<HeapId, EmulatedHeap>,
    resources: HashMap<ResourceId, WgpuResource>,
    root_tables: BTreeMap<u32, GpuDescriptorHandle>,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            next_id: 0,
            heaps: HashMap::new(),
            resources: HashMap::new(),
            root_tables: BTreeMap::new(),
        }
    }

    /// Acquires a high-performance adapter without a surface.
    pub fn request() -> Result<Self, DeviceError> {
        pollster::block_on(Self::request_async())
    }

    async fn request_async() -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|err| DeviceError::Unavailable(err.to_string()))?;

        log::info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|err| DeviceError::Unavailable(err.to_string()))?;

        Ok(Self::new(device, queue))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Descriptor stored at a shader-visible address.
    pub fn descriptor(&self, handle: GpuDescriptorHandle) -> Option<&Descriptor> {
        let address = handle.0 & !GPU_ADDRESS_BIT;
        let (heap, slot) = self.locate(address)?;
        let heap = self.heaps.get(&heap)?;
        if !heap.shader_visible {
            return None;
        }
        heap.slots.get(slot)?.as_ref()
    }

    /// Descriptor currently bound at `root_index`.
    pub fn bound_descriptor(&self, root_index: u32) -> Option<&Descriptor> {
        let handle = self.root_tables.get(&root_index)?;
        self.descriptor(*handle)
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn locate(&self, address: u64) -> Option<(HeapId, usize)> {
        let heap = HeapId(((address >> 32) as u32).checked_sub(1)?);
        let offset = address - heap_base(heap);
        Some((heap, (offset / DESCRIPTOR_STRIDE as u64) as usize))
    }

    fn store(
        &mut self,
        dest: CpuDescriptorHandle,
        expected: HeapType,
        descriptor: Descriptor,
    ) -> Result<(), DeviceError> {
        let Some((heap, slot)) = self.locate(dest.0) else {
            return Err(DeviceError::InvalidHandle {
                handle: dest.0,
                reason: "does not belong to any heap",
            });
        };

        let entry = self
            .heaps
            .get_mut(&heap)
            .filter(|heap| heap.kind == expected)
            .and_then(|heap| heap.slots.get_mut(slot));

        match entry {
            Some(entry) => {
                *entry = Some(descriptor);
                Ok(())
            }
            None => Err(DeviceError::InvalidHandle {
                handle: dest.0,
                reason: "outside a heap of the expected kind",
            }),
        }
    }

    fn texture_view(
        &self,
        resource: ResourceId,
        required: TextureUsage,
    ) -> Result<wgpu::TextureView, DeviceError> {
        match self.resources.get(&resource) {
            Some(WgpuResource::Texture { texture, desc }) if desc.usage.contains(required) => {
                Ok(texture.create_view(&wgpu::TextureViewDescriptor::default()))
            }
            Some(_) => Err(DeviceError::InvalidUsage {
                resource,
                reason: "texture was not created with the usage this view needs",
            }),
            None => Err(DeviceError::UnknownResource(resource)),
        }
    }
}

fn heap_base(heap: HeapId) -> u64 {
    (heap.0 as u64 + 1) << 32
}

fn to_wgpu_usage(usage: TextureUsage) -> wgpu::TextureUsages {
    let mut out = wgpu::TextureUsages::empty();
    if usage.contains(TextureUsage::SHADER_RESOURCE) {
        out |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.intersects(TextureUsage::RENDER_TARGET | TextureUsage::DEPTH_STENCIL) {
        out |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.contains(TextureUsage::COPY_DST) {
        out |= wgpu::TextureUsages::COPY_DST;
    }
    out
}

impl GraphicsDevice for WgpuDevice {
    fn create_descriptor_heap(
        &mut self,
        desc: &DescriptorHeapDesc<'_>,
    ) -> Result<HeapId, DeviceError> {
        if desc.count as u64 * DESCRIPTOR_STRIDE as u64 >= 1 << 32 {
            return Err(DeviceError::AllocationFailed(format!(
                "{} heap of {} slots does not fit the descriptor address space",
                desc.kind.label(),
                desc.count
            )));
        }

        let heap = HeapId(self.next_id());
        self.heaps.insert(
            heap,
            EmulatedHeap {
                kind: desc.kind,
                shader_visible: desc.shader_visible,
                slots: vec![None; desc.count as usize],
            },
        );
        log::debug!(
            "Created {} heap {:?} ({} slots)",
            desc.kind.label(),
            desc.label,
            desc.count
        );
        Ok(heap)
    }

    fn destroy_descriptor_heap(&mut self, heap: HeapId) {
        self.heaps.remove(&heap);
    }

    fn descriptor_increment_size(&self, _kind: HeapType) -> u32 {
        DESCRIPTOR_STRIDE
    }

    fn cpu_heap_start(&self, heap: HeapId) -> CpuDescriptorHandle {
        CpuDescriptorHandle(heap_base(heap))
    }

    fn gpu_heap_start(&self, heap: HeapId) -> Option<GpuDescriptorHandle> {
        self.heaps
            .get(&heap)
            .filter(|heap| heap.shader_visible)
            .map(|_| GpuDescriptorHandle(heap_base(heap) | GPU_ADDRESS_BIT))
    }

    fn create_committed_resource(
        &mut self,
        desc: &ResourceDesc<'_>,
    ) -> Result<ResourceId, DeviceError> {
        let limits = self.device.limits();

        let resource = match *desc {
            ResourceDesc::Buffer {
                size,
                memory,
                label,
            } => {
                if size == 0 || size > limits.max_buffer_size {
                    return Err(DeviceError::AllocationFailed(format!(
                        "buffer of {size} bytes (limit {})",
                        limits.max_buffer_size
                    )));
                }
                let usage = match memory {
                    MemoryLocation::Upload => {
                        wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST
                    }
                    MemoryLocation::Default => {
                        wgpu::BufferUsages::VERTEX
                            | wgpu::BufferUsages::INDEX
                            | wgpu::BufferUsages::STORAGE
                            | wgpu::BufferUsages::COPY_DST
                    }
                };
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label,
                    size,
                    usage,
                    mapped_at_creation: false,
                });
                WgpuResource::Buffer {
                    buffer,
                    mapped: false,
                }
            }
            ResourceDesc::Texture2D { desc, label } => {
                let max = limits.max_texture_dimension_2d;
                if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
                    return Err(DeviceError::AllocationFailed(format!(
                        "texture of {}x{} (limit {max})",
                        desc.width, desc.height
                    )));
                }
                let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                    label,
                    size: wgpu::Extent3d {
                        width: desc.width,
                        height: desc.height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: desc.format,
                    usage: to_wgpu_usage(desc.usage),
                    view_formats: &[],
                });
                WgpuResource::Texture { texture, desc }
            }
        };

        let id = ResourceId(self.next_id());
        self.resources.insert(id, resource);
        Ok(id)
    }

    fn release_resource(&mut self, resource: ResourceId) {
        match self.resources.remove(&resource) {
            Some(WgpuResource::Buffer { buffer, .. }) => buffer.destroy(),
            Some(WgpuResource::Texture { texture, .. }) => texture.destroy(),
            None => log::warn!("Release of unknown resource {:?}", resource),
        }
    }

    fn upload_texture(
        &mut self,
        resource: ResourceId,
        data: &[u8],
        bytes_per_row: u32,
    ) -> Result<(), DeviceError> {
        let Some(WgpuResource::Texture { texture, desc }) = self.resources.get(&resource) else {
            return Err(DeviceError::UnknownResource(resource));
        };

        let expected = bytes_per_row as u64 * desc.height as u64;
        if (data.len() as u64) < expected {
            return Err(DeviceError::OutOfBounds {
                resource,
                offset: 0,
                len: data.len() as u64,
                size: expected,
            });
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(desc.height),
            },
            wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn create_shader_resource_view(
        &mut self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), DeviceError> {
        let view = self.texture_view(resource, TextureUsage::SHADER_RESOURCE)?;
        self.store(dest, HeapType::CbvSrvUav, Descriptor::ShaderResource(view))
    }

    fn create_constant_buffer_view(
        &mut self,
        view: &ConstantBufferView,
        dest: CpuDescriptorHandle,
    ) -> Result<(), DeviceError> {
        let buffer = match self.resources.get(&view.resource) {
            Some(WgpuResource::Buffer { buffer, .. }) => buffer.clone(),
            Some(_) => {
                return Err(DeviceError::InvalidUsage {
                    resource: view.resource,
                    reason: "constant-buffer views need a buffer",
                })
            }
            None => return Err(DeviceError::UnknownResource(view.resource)),
        };

        if view.offset + view.size > buffer.size() {
            return Err(DeviceError::OutOfBounds {
                resource: view.resource,
                offset: view.offset,
                len: view.size,
                size: buffer.size(),
            });
        }

        self.store(
            dest,
            HeapType::CbvSrvUav,
            Descriptor::ConstantBuffer {
                buffer,
                offset: view.offset,
                size: view.size,
            },
        )
    }

    fn create_render_target_view(
        &mut self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), DeviceError> {
        let view = self.texture_view(resource, TextureUsage::RENDER_TARGET)?;
        self.store(dest, HeapType::Rtv, Descriptor::RenderTarget(view))
    }

    fn create_depth_stencil_view(
        &mut self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), DeviceError> {
        let view = self.texture_view(resource, TextureUsage::DEPTH_STENCIL)?;
        self.store(dest, HeapType::Dsv, Descriptor::DepthStencil(view))
    }

    fn map(&mut self, resource: ResourceId) -> Result<(), DeviceError> {
        match self.resources.get_mut(&resource) {
            Some(WgpuResource::Buffer { buffer, mapped })
                if buffer.usage().contains(wgpu::BufferUsages::UNIFORM) =>
            {
                *mapped = true;
                Ok(())
            }
            Some(_) => Err(DeviceError::InvalidUsage {
                resource,
                reason: "only upload buffers can be mapped",
            }),
            None => Err(DeviceError::UnknownResource(resource)),
        }
    }

    fn write_mapped(
        &mut self,
        resource: ResourceId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let Some(WgpuResource::Buffer { buffer, mapped }) = self.resources.get(&resource) else {
            return Err(DeviceError::UnknownResource(resource));
        };
        if !*mapped {
            return Err(DeviceError::InvalidUsage {
                resource,
                reason: "buffer is not mapped",
            });
        }

        // Queue writes must be a multiple of COPY_BUFFER_ALIGNMENT.
        let padded_len = data.len().next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize);
        if offset + padded_len as u64 > buffer.size() {
            return Err(DeviceError::OutOfBounds {
                resource,
                offset,
                len: data.len() as u64,
                size: buffer.size(),
            });
        }

        if padded_len == data.len() {
            self.queue.write_buffer(buffer, offset, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(padded_len, 0);
            self.queue.write_buffer(buffer, offset, &padded);
        }
        Ok(())
    }

    fn unmap(&mut self, resource: ResourceId) {
        if let Some(WgpuResource::Buffer { mapped, .. }) = self.resources.get_mut(&resource) {
            *mapped = false;
        }
    }

    fn set_graphics_root_descriptor_table(&mut self, root_index: u32, handle: GpuDescriptorHandle) {
        self.root_tables.insert(root_index, handle);
    }
}

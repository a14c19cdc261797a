//! Fixed-capacity descriptor tables with a rewindable cursor.
//!
//! Registration numbers are handed out in increasing order and never
//! individually freed. [`DescriptorHeap::reset`] only rewinds the cursor,
//! and only down to the end of the constant region, so slots registered as
//! constant keep their address for the lifetime of the heap.

use std::fmt;
use std::marker::PhantomData;

use crate::device::{
    CpuDescriptorHandle, DescriptorHeapDesc, GpuDescriptorHandle, GraphicsDevice, HeapId, HeapType,
};
use crate::error::{DeviceError, HeapError};

/// Compile-time tag selecting the kind of descriptors a heap stores.
pub trait HeapKind {
    const TYPE: HeapType;
    const SHADER_VISIBLE: bool;
}

#[derive(Debug)]
pub enum CbvSrvUav {}

#[derive(Debug)]
pub enum Rtv {}

#[derive(Debug)]
pub enum Dsv {}

impl HeapKind for CbvSrvUav {
    const TYPE: HeapType = HeapType::CbvSrvUav;
    const SHADER_VISIBLE: bool = true;
}

impl HeapKind for Rtv {
    const TYPE: HeapType = HeapType::Rtv;
    const SHADER_VISIBLE: bool = false;
}

impl HeapKind for Dsv {
    const TYPE: HeapType = HeapType::Dsv;
    const SHADER_VISIBLE: bool = false;
}

pub struct DescriptorHeap<K: HeapKind> {
    heap: HeapId,
    label: &'static str,
    cpu_start: CpuDescriptorHandle,
    gpu_start: Option<GpuDescriptorHandle>,
    stride: u32,
    reserved_offset: u32,
    capacity: u32,
    next_free: u32,
    constant_boundary: Option<u32>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: HeapKind> DescriptorHeap<K> {
    /// Allocates a GPU heap of `capacity` slots owned by this table.
    pub fn create(
        device: &mut dyn GraphicsDevice,
        capacity: u32,
        label: &'static str,
    ) -> Result<Self, HeapError> {
        if capacity == 0 {
            log::error!("{label} heap requested with zero slots");
            return Err(HeapError::EmptyHeap { heap: label });
        }

        let heap = device
            .create_descriptor_heap(&DescriptorHeapDesc {
                kind: K::TYPE,
                count: capacity,
                shader_visible: K::SHADER_VISIBLE,
                label: Some(label),
            })
            .map_err(|err| {
                log::error!("Failed to create {label} heap ({capacity} slots): {err}");
                HeapError::Device(err)
            })?;

        log::info!(
            "Created {} heap '{}' with {} slots",
            K::TYPE.label(),
            label,
            capacity
        );
        Ok(Self::region(&*device, heap, 0, capacity, label))
    }

    /// A view over `capacity` slots of an existing heap starting at `reserved_offset`.
    pub(crate) fn region(
        device: &dyn GraphicsDevice,
        heap: HeapId,
        reserved_offset: u32,
        capacity: u32,
        label: &'static str,
    ) -> Self {
        Self {
            heap,
            label,
            cpu_start: device.cpu_heap_start(heap),
            gpu_start: device.gpu_heap_start(heap),
            stride: device.descriptor_increment_size(K::TYPE),
            reserved_offset,
            capacity,
            next_free: 0,
            constant_boundary: None,
            _kind: PhantomData,
        }
    }

    pub fn heap_id(&self) -> HeapId {
        self.heap
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn next_free_index(&self) -> u32 {
        self.next_free
    }

    pub fn is_full(&self) -> bool {
        self.next_free >= self.capacity
    }

    /// Highest slot protected from [`reset`](Self::reset), if any.
    pub fn constant_boundary(&self) -> Option<u32> {
        self.constant_boundary
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn reserved_offset(&self) -> u32 {
        self.reserved_offset
    }

    pub fn cpu_handle(&self, slot: u32) -> CpuDescriptorHandle {
        self.cpu_start
            .offset(self.reserved_offset + slot, self.stride)
    }

    /// Shader-visible address of `slot`; `None` for CPU-only heaps.
    pub fn gpu_handle(&self, slot: u32) -> Option<GpuDescriptorHandle> {
        self.gpu_start
            .map(|start| start.offset(self.reserved_offset + slot, self.stride))
    }

    /// Claims the next free slot and fills it through `create`.
    ///
    /// A full heap reports and returns [`HeapError::CapacityExceeded`]
    /// without touching any state. A device failure leaves the cursor where
    /// it was, so the slot is handed out again by the next call.
    pub fn register_with<F>(
        &mut self,
        device: &mut dyn GraphicsDevice,
        is_constant: bool,
        create: F,
    ) -> Result<u32, HeapError>
    where
        F: FnOnce(&mut dyn GraphicsDevice, CpuDescriptorHandle) -> Result<(), DeviceError>,
    {
        if self.is_full() {
            log::error!(
                "{} heap capacity exceeded ({} of {} slots in use)",
                self.label,
                self.next_free,
                self.capacity
            );
            return Err(HeapError::CapacityExceeded {
                heap: self.label,
                capacity: self.capacity,
                requested: self.next_free + 1,
            });
        }

        let slot = self.next_free;
        create(device, self.cpu_handle(slot)).map_err(|err| {
            log::error!("Failed to create view in {} slot {}: {}", self.label, slot, err);
            HeapError::Device(err)
        })?;

        self.next_free += 1;
        if is_constant {
            self.protect(slot);
        }
        Ok(slot)
    }

    /// Rewinds the cursor to just past the constant region.
    pub fn reset(&mut self) {
        self.next_free = self.constant_boundary.map_or(0, |boundary| boundary + 1);
    }

    /// Moves `index` (and every slot below it) into the constant region.
    pub fn set_constant_heap_data(&mut self, index: u32) -> Result<(), HeapError> {
        if index >= self.next_free {
            log::error!(
                "Cannot protect {} slot {}: only {} slots are registered",
                self.label,
                index,
                self.next_free
            );
            return Err(HeapError::UnregisteredSlot {
                heap: self.label,
                index,
                next_free: self.next_free,
            });
        }
        self.protect(index);
        Ok(())
    }

    /// Hands `slot` back if it is the latest, unprotected claim. Lets a
    /// caller undo a registration whose follow-up work failed.
    pub(crate) fn unclaim(&mut self, slot: u32) -> bool {
        let latest = self.next_free.checked_sub(1) == Some(slot);
        if !latest || self.constant_boundary.is_some_and(|b| b >= slot) {
            return false;
        }
        self.next_free = slot;
        true
    }

    fn protect(&mut self, index: u32) {
        self.constant_boundary = Some(self.constant_boundary.map_or(index, |b| b.max(index)));
    }

    /// Releases the GPU heap. Only call on tables created with [`create`](Self::create).
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.destroy_descriptor_heap(self.heap);
    }
}

impl<K: HeapKind> fmt::Debug for DescriptorHeap<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorHeap")
            .field("kind", &K::TYPE)
            .field("label", &self.label)
            .field("heap", &self.heap)
            .field("reserved_offset", &self.reserved_offset)
            .field("capacity", &self.capacity)
            .field("next_free", &self.next_free)
            .field("constant_boundary", &self.constant_boundary)
            .finish()
    }
}

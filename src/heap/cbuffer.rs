//! Per-frame constant-buffer ring.
//!
//! One upload buffer sized to the constant region of the CBV/SRV/UAV heap,
//! handed out front to back in 256-byte units and rewound once per frame.
//! Data bound in a previous frame is overwritten in place, so nothing may
//! hold on to a bound slot across [`ConstantBufferAllocator::reset_current_use_number`].

use bytemuck::Pod;

use crate::device::{ConstantBufferView, GraphicsDevice, MemoryLocation, ResourceDesc, ResourceId};
use crate::error::{DeviceError, HeapError};
use crate::heap::CbvSrvUavHeap;

/// Constant-buffer views must start and end on this many bytes.
pub const CBUFFER_ALIGNMENT: u64 = 256;

/// Byte size `size` occupies once rounded up to whole alignment units.
///
/// Zero-sized payloads still take one unit so every view has a body.
pub const fn aligned_size(size: usize) -> u64 {
    let size = if size == 0 { 1 } else { size as u64 };
    size.div_ceil(CBUFFER_ALIGNMENT) * CBUFFER_ALIGNMENT
}

/// The mapping of the upload buffer, held from creation until `destroy`.
#[derive(Debug)]
struct MappedUpload {
    resource: ResourceId,
    size: u64,
}

impl MappedUpload {
    fn acquire(device: &mut dyn GraphicsDevice, size: u64) -> Result<Self, DeviceError> {
        let resource = device.create_committed_resource(&ResourceDesc::Buffer {
            size,
            memory: MemoryLocation::Upload,
            label: Some("ConstantBufferRing"),
        })?;

        if let Err(err) = device.map(resource) {
            device.release_resource(resource);
            return Err(err);
        }

        Ok(Self { resource, size })
    }

    fn write(
        &self,
        device: &mut dyn GraphicsDevice,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), DeviceError> {
        device.write_mapped(self.resource, offset, bytes)
    }

    fn release(self, device: &mut dyn GraphicsDevice) {
        device.unmap(self.resource);
        device.release_resource(self.resource);
    }
}

#[derive(Debug)]
pub struct ConstantBufferAllocator {
    upload: MappedUpload,
    capacity: u32,
    current_use_offset: u32,
}

impl ConstantBufferAllocator {
    /// Creates the ring for the constant region of `heap`.
    pub fn create(
        device: &mut dyn GraphicsDevice,
        heap: &CbvSrvUavHeap,
    ) -> Result<Self, HeapError> {
        let capacity = heap.constants().capacity();
        let size = aligned_size(1) * capacity as u64;

        let upload = MappedUpload::acquire(device, size).map_err(|err| {
            log::error!("Failed to create constant-buffer ring of {size} bytes: {err}");
            HeapError::Device(err)
        })?;

        log::info!(
            "Created constant-buffer ring: {} units of {} bytes",
            capacity,
            CBUFFER_ALIGNMENT
        );

        Ok(Self {
            upload,
            capacity,
            current_use_offset: 0,
        })
    }

    pub fn resource(&self) -> ResourceId {
        self.upload.resource
    }

    /// Capacity in 256-byte units.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Units handed out since the last reset.
    pub fn current_use_offset(&self) -> u32 {
        self.current_use_offset
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.upload.size
    }

    /// Copies `data` into the ring, registers a CBV for it and binds that
    /// view at `root_index`. Returns the slot the view occupies in the
    /// constant region of `heap`.
    ///
    /// Nothing is written unless both the ring and the heap region have room
    /// and the view was created. A failed write gives the view slot back.
    pub fn bind_attach_data<T: Pod>(
        &mut self,
        device: &mut dyn GraphicsDevice,
        heap: &mut CbvSrvUavHeap,
        root_index: u32,
        data: &T,
    ) -> Result<u32, HeapError> {
        let size = aligned_size(std::mem::size_of::<T>());
        let units = (size / CBUFFER_ALIGNMENT) as u32;

        if self.current_use_offset + units > self.capacity {
            log::error!(
                "Constant buffer capacity exceeded: {} + {} of {} units",
                self.current_use_offset,
                units,
                self.capacity
            );
            return Err(HeapError::CapacityExceeded {
                heap: "constant buffer",
                capacity: self.capacity,
                requested: self.current_use_offset + units,
            });
        }

        if heap.constants().is_full() {
            log::error!(
                "CBV heap capacity exceeded ({} slots)",
                heap.constants().capacity()
            );
            return Err(HeapError::CapacityExceeded {
                heap: heap.constants().label(),
                capacity: heap.constants().capacity(),
                requested: heap.constants().next_free_index() + 1,
            });
        }

        let offset = self.current_use_offset as u64 * CBUFFER_ALIGNMENT;
        let view = ConstantBufferView {
            resource: self.upload.resource,
            offset,
            size,
        };
        let slot = heap.create_constant_buffer_view(device, &view, false)?;
        let Some(handle) = heap.constants().gpu_handle(slot) else {
            heap.constants_mut().unclaim(slot);
            return Err(HeapError::NotShaderVisible {
                heap: heap.constants().label(),
            });
        };

        if let Err(err) = self.upload.write(device, offset, bytemuck::bytes_of(data)) {
            log::error!("Failed to write constant data at offset {offset}: {err}");
            heap.constants_mut().unclaim(slot);
            return Err(HeapError::Device(err));
        }

        device.set_graphics_root_descriptor_table(root_index, handle);

        self.current_use_offset += units;
        Ok(slot)
    }

    pub fn reset_current_use_number(&mut self) {
        self.current_use_offset = 0;
    }

    /// Unmaps and releases the upload buffer.
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        self.upload.release(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, HeadlessDevice};
    use crate::settings::HeapBudget;
    use bytemuck::Zeroable;

    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    struct Small {
        value: [f32; 4],
    }

    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    struct Large {
        values: [[f32; 4]; 20],
    }

    fn setup(constant: u32) -> (HeadlessDevice, CbvSrvUavHeap, ConstantBufferAllocator) {
        let mut device = HeadlessDevice::new();
        let heap = CbvSrvUavHeap::create(
            &mut device,
            HeapBudget {
                regular: 2,
                constant,
                reserved: 0,
            },
        )
        .unwrap();
        let ring = ConstantBufferAllocator::create(&mut device, &heap).unwrap();
        (device, heap, ring)
    }

    #[test]
    fn aligned_sizes_are_whole_units_covering_the_payload() {
        for size in [0usize, 1, 16, 255, 256, 257, 320, 511, 512, 4097] {
            let aligned = aligned_size(size);
            assert_eq!(aligned % CBUFFER_ALIGNMENT, 0, "size {size}");
            assert!(aligned >= size as u64, "size {size}");
            assert!(aligned - (size as u64) < CBUFFER_ALIGNMENT || size == 0);
        }
        assert_eq!(aligned_size(std::mem::size_of::<Large>()), 512);
    }

    #[test]
    fn ring_is_sized_from_the_constant_region() {
        let (device, _heap, ring) = setup(8);
        let journal = device.journal();

        assert_eq!(ring.capacity(), 8);
        assert_eq!(ring.size_in_bytes(), 8 * 256);
        assert!(journal.is_mapped(ring.resource()));
    }

    #[test]
    fn bind_writes_data_at_the_cursor_and_binds_the_view() {
        let (mut device, mut heap, mut ring) = setup(8);
        let journal = device.journal();

        let first = Small { value: [1.0; 4] };
        let second = Large {
            values: [[2.0; 4]; 20],
        };
        let third = Small { value: [3.0; 4] };

        ring.bind_attach_data(&mut device, &mut heap, 1, &first)
            .unwrap();
        ring.bind_attach_data(&mut device, &mut heap, 2, &second)
            .unwrap();
        let slot = ring
            .bind_attach_data(&mut device, &mut heap, 3, &third)
            .unwrap();

        assert_eq!(slot, 2);
        assert_eq!(ring.current_use_offset(), 4);

        let bytes = journal.buffer_bytes(ring.resource()).unwrap();
        assert_eq!(&bytes[0..16], bytemuck::bytes_of(&first));
        assert_eq!(&bytes[256..256 + 320], bytemuck::bytes_of(&second));
        assert_eq!(&bytes[768..784], bytemuck::bytes_of(&third));

        let views: Vec<_> = journal
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                DeviceCall::ConstantBufferView { view, .. } => Some((view.offset, view.size)),
                _ => None,
            })
            .collect();
        assert_eq!(views, vec![(0, 256), (256, 512), (768, 256)]);

        let roots: Vec<u32> = journal.root_bindings().iter().map(|(r, _)| *r).collect();
        assert_eq!(roots, vec![1, 2, 3]);
    }

    #[test]
    fn overflowing_bind_is_rejected_without_side_effects() {
        let (mut device, mut heap, mut ring) = setup(3);
        let journal = device.journal();

        ring.bind_attach_data(&mut device, &mut heap, 0, &Small { value: [0.0; 4] })
            .unwrap();
        ring.bind_attach_data(&mut device, &mut heap, 0, &Small { value: [0.0; 4] })
            .unwrap();
        journal.clear();

        let err = ring
            .bind_attach_data(
                &mut device,
                &mut heap,
                0,
                &Large {
                    values: [[9.0; 4]; 20],
                },
            )
            .unwrap_err();

        assert!(matches!(
            err,
            HeapError::CapacityExceeded {
                capacity: 3,
                requested: 4,
                ..
            }
        ));
        assert_eq!(ring.current_use_offset(), 2);
        assert_eq!(heap.constants().next_free_index(), 2);
        assert!(journal.calls().is_empty());
    }

    #[test]
    fn reset_returns_the_cursor_to_zero() {
        let (mut device, mut heap, mut ring) = setup(4);

        for _ in 0..4 {
            ring.bind_attach_data(&mut device, &mut heap, 0, &Small { value: [0.0; 4] })
                .unwrap();
        }
        assert!(ring
            .bind_attach_data(&mut device, &mut heap, 0, &Small { value: [0.0; 4] })
            .is_err());

        ring.reset_current_use_number();
        heap.constants_mut().reset();
        assert_eq!(ring.current_use_offset(), 0);

        ring.bind_attach_data(&mut device, &mut heap, 0, &Small { value: [5.0; 4] })
            .unwrap();
        assert_eq!(ring.current_use_offset(), 1);
    }

    #[test]
    fn full_heap_region_blocks_the_bind_even_with_ring_space() {
        let (mut device, mut heap, mut ring) = setup(4);

        for _ in 0..4 {
            ring.bind_attach_data(&mut device, &mut heap, 0, &Small { value: [0.0; 4] })
                .unwrap();
        }
        // Ring rewound but the heap region was not.
        ring.reset_current_use_number();

        let err = ring
            .bind_attach_data(&mut device, &mut heap, 0, &Small { value: [0.0; 4] })
            .unwrap_err();
        assert!(matches!(err, HeapError::CapacityExceeded { heap: "CBV", .. }));
        assert_eq!(ring.current_use_offset(), 0);
    }

    #[test]
    fn failed_view_creation_writes_nothing() {
        let (mut device, mut heap, mut ring) = setup(4);
        let journal = device.journal();
        let resource = ring.resource();
        device.release_resource(resource);
        journal.clear();

        let err = ring
            .bind_attach_data(&mut device, &mut heap, 0, &Small { value: [7.0; 4] })
            .unwrap_err();

        assert!(matches!(err, HeapError::Device(_)));
        assert_eq!(ring.current_use_offset(), 0);
        assert_eq!(heap.constants().next_free_index(), 0);
        assert!(!journal
            .calls()
            .iter()
            .any(|call| matches!(call, DeviceCall::WriteMapped { .. })));
        assert!(journal.root_bindings().is_empty());
    }

    #[test]
    fn failed_write_gives_the_view_slot_back() {
        let (mut device, mut heap, mut ring) = setup(4);
        let journal = device.journal();
        ring.bind_attach_data(&mut device, &mut heap, 0, &Small { value: [1.0; 4] })
            .unwrap();
        device.unmap(ring.resource());
        journal.clear();

        let err = ring
            .bind_attach_data(&mut device, &mut heap, 1, &Small { value: [2.0; 4] })
            .unwrap_err();

        assert!(matches!(err, HeapError::Device(_)));
        assert_eq!(ring.current_use_offset(), 1);
        assert_eq!(heap.constants().next_free_index(), 1);
        assert!(journal.root_bindings().is_empty());
    }

    #[test]
    fn destroy_unmaps_and_releases() {
        let (mut device, heap, ring) = setup(2);
        let journal = device.journal();
        let resource = ring.resource();

        ring.destroy(&mut device);
        heap.destroy(&mut device);

        assert!(!journal.is_mapped(resource));
        assert_eq!(journal.live_resources(), 0);
    }
}

use crate::device::{ConstantBufferView, GraphicsDevice, HeapId, HeapType, ResourceId};
use crate::error::HeapError;
use crate::heap::descriptor_heap::{CbvSrvUav, DescriptorHeap};
use crate::settings::HeapBudget;

/// The shader-visible heap, split into independently checked regions.
///
/// Layout is `[reserved | resources | constants]`. Shader-resource views
/// never eat into the constant-buffer region and the constant-buffer
/// allocator never eats into the resource region.
#[derive(Debug)]
pub struct CbvSrvUavHeap {
    heap: HeapId,
    budget: HeapBudget,
    resources: DescriptorHeap<CbvSrvUav>,
    constants: DescriptorHeap<CbvSrvUav>,
}

impl CbvSrvUavHeap {
    pub fn create(device: &mut dyn GraphicsDevice, budget: HeapBudget) -> Result<Self, HeapError> {
        if budget.regular == 0 || budget.constant == 0 {
            log::error!("CBV/SRV/UAV budget needs resource and constant slots: {budget:?}");
            return Err(HeapError::EmptyHeap {
                heap: HeapType::CbvSrvUav.label(),
            });
        }

        let Some(count) = budget.total() else {
            log::error!("CBV/SRV/UAV budget overflows the slot count: {budget:?}");
            return Err(HeapError::BudgetOverflow {
                heap: HeapType::CbvSrvUav.label(),
            });
        };

        let heap = device
            .create_descriptor_heap(&crate::device::DescriptorHeapDesc {
                kind: HeapType::CbvSrvUav,
                count,
                shader_visible: true,
                label: Some("CbvSrvUavHeap"),
            })
            .map_err(|err| {
                log::error!("Failed to create CBV/SRV/UAV heap ({budget:?}): {err}");
                HeapError::Device(err)
            })?;

        let resources =
            DescriptorHeap::region(&*device, heap, budget.reserved, budget.regular, "SRV/UAV");
        let constants = DescriptorHeap::region(
            &*device,
            heap,
            budget.reserved + budget.regular,
            budget.constant,
            "CBV",
        );

        log::info!(
            "Created CBV/SRV/UAV heap: {} reserved, {} resource, {} constant slots",
            budget.reserved,
            budget.regular,
            budget.constant
        );

        Ok(Self {
            heap,
            budget,
            resources,
            constants,
        })
    }

    pub fn budget(&self) -> HeapBudget {
        self.budget
    }

    pub fn heap_id(&self) -> HeapId {
        self.heap
    }

    pub fn resources(&self) -> &DescriptorHeap<CbvSrvUav> {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut DescriptorHeap<CbvSrvUav> {
        &mut self.resources
    }

    pub fn constants(&self) -> &DescriptorHeap<CbvSrvUav> {
        &self.constants
    }

    pub fn constants_mut(&mut self) -> &mut DescriptorHeap<CbvSrvUav> {
        &mut self.constants
    }

    pub fn create_shader_resource_view(
        &mut self,
        device: &mut dyn GraphicsDevice,
        resource: ResourceId,
        is_constant: bool,
    ) -> Result<u32, HeapError> {
        self.resources
            .register_with(device, is_constant, |device, dest| {
                device.create_shader_resource_view(resource, dest)
            })
    }

    pub fn create_constant_buffer_view(
        &mut self,
        device: &mut dyn GraphicsDevice,
        view: &ConstantBufferView,
        is_constant: bool,
    ) -> Result<u32, HeapError> {
        self.constants
            .register_with(device, is_constant, |device, dest| {
                device.create_constant_buffer_view(view, dest)
            })
    }

    /// Binds a shader-resource slot to a root parameter.
    pub fn bind_resource(
        &self,
        device: &mut dyn GraphicsDevice,
        root_index: u32,
        slot: u32,
    ) -> Result<(), HeapError> {
        let handle = self
            .resources
            .gpu_handle(slot)
            .ok_or(HeapError::NotShaderVisible {
                heap: self.resources.label(),
            })?;
        device.set_graphics_root_descriptor_table(root_index, handle);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.resources.reset();
        self.constants.reset();
    }

    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.destroy_descriptor_heap(self.heap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{
        DeviceCall, HeadlessDevice, MemoryLocation, ResourceDesc, TextureDesc, TextureUsage,
    };

    fn budget() -> HeapBudget {
        HeapBudget {
            regular: 2,
            constant: 3,
            reserved: 1,
        }
    }

    fn texture(device: &mut HeadlessDevice) -> ResourceId {
        device
            .create_committed_resource(&ResourceDesc::Texture2D {
                desc: TextureDesc {
                    width: 4,
                    height: 4,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: TextureUsage::SHADER_RESOURCE,
                },
                label: None,
            })
            .unwrap()
    }

    fn buffer(device: &mut HeadlessDevice) -> ResourceId {
        device
            .create_committed_resource(&ResourceDesc::Buffer {
                size: 1024,
                memory: MemoryLocation::Upload,
                label: None,
            })
            .unwrap()
    }

    #[test]
    fn one_gpu_heap_backs_both_regions() {
        let mut device = HeadlessDevice::new();
        let journal = device.journal();
        let heap = CbvSrvUavHeap::create(&mut device, budget()).unwrap();

        assert_eq!(
            journal.count(|call| matches!(call, DeviceCall::CreateHeap { count: 6, .. })),
            1
        );
        assert_eq!(heap.resources().capacity(), 2);
        assert_eq!(heap.constants().capacity(), 3);
        assert_eq!(heap.resources().reserved_offset(), 1);
        assert_eq!(heap.constants().reserved_offset(), 3);
    }

    #[test]
    fn resource_views_do_not_consume_constant_slots() {
        let mut device = HeadlessDevice::new();
        let tex = texture(&mut device);
        let buf = buffer(&mut device);
        let mut heap = CbvSrvUavHeap::create(&mut device, budget()).unwrap();

        heap.create_shader_resource_view(&mut device, tex, true)
            .unwrap();
        heap.create_shader_resource_view(&mut device, tex, false)
            .unwrap();
        assert!(matches!(
            heap.create_shader_resource_view(&mut device, tex, false),
            Err(HeapError::CapacityExceeded { heap: "SRV/UAV", .. })
        ));

        let view = ConstantBufferView {
            resource: buf,
            offset: 0,
            size: 256,
        };
        for expected in 0..3 {
            assert_eq!(
                heap.create_constant_buffer_view(&mut device, &view, false)
                    .unwrap(),
                expected
            );
        }
        assert_eq!(heap.resources().next_free_index(), 2);
    }

    #[test]
    fn regions_never_share_an_address() {
        let mut device = HeadlessDevice::new();
        let heap = CbvSrvUavHeap::create(&mut device, budget()).unwrap();

        let last_resource = heap.resources().cpu_handle(1);
        let first_constant = heap.constants().cpu_handle(0);
        assert!(first_constant > last_resource);
        assert!(heap.resources().cpu_handle(0) > device.cpu_heap_start(heap.heap_id()));
    }

    #[test]
    fn bind_resource_publishes_the_gpu_handle() {
        let mut device = HeadlessDevice::new();
        let journal = device.journal();
        let tex = texture(&mut device);
        let mut heap = CbvSrvUavHeap::create(&mut device, budget()).unwrap();

        let slot = heap
            .create_shader_resource_view(&mut device, tex, true)
            .unwrap();
        heap.bind_resource(&mut device, 4, slot).unwrap();

        let expected = heap.resources().gpu_handle(slot).unwrap();
        assert_eq!(journal.root_bindings(), vec![(4, expected)]);
    }

    #[test]
    fn empty_partitions_are_rejected() {
        let mut device = HeadlessDevice::new();
        let err = CbvSrvUavHeap::create(
            &mut device,
            HeapBudget {
                regular: 4,
                constant: 0,
                reserved: 0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, HeapError::EmptyHeap { .. }));
    }

    #[test]
    fn overflowing_budget_is_rejected_before_allocation() {
        let mut device = HeadlessDevice::new();
        let journal = device.journal();
        let err = CbvSrvUavHeap::create(
            &mut device,
            HeapBudget {
                regular: u32::MAX,
                constant: 16,
                reserved: 1,
            },
        )
        .unwrap_err();

        assert!(matches!(err, HeapError::BudgetOverflow { .. }));
        assert!(journal.calls().is_empty());
    }
}

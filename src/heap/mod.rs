pub mod cbuffer;
pub mod cbv_srv_uav;
pub mod descriptor_heap;
pub mod targets;

pub use cbuffer::{aligned_size, ConstantBufferAllocator, CBUFFER_ALIGNMENT};
pub use cbv_srv_uav::CbvSrvUavHeap;
pub use descriptor_heap::{CbvSrvUav, DescriptorHeap, Dsv, HeapKind, Rtv};
pub use targets::{DsvHeap, RtvHeap};

//! Error types shared by the device, heap and resource layers.
//!
//! Every failure in this crate is reported where it happens (through `log`)
//! and handed back to the caller as one of these values; nothing here is
//! meant to abort a frame.

use std::fmt;

use crate::device::ResourceId;

/// A failure reported by a [`GraphicsDevice`](crate::device::GraphicsDevice) implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No adapter or device could be acquired.
    Unavailable(String),
    /// The device refused to allocate a heap or resource.
    AllocationFailed(String),
    /// The resource id is unknown to the device or was already released.
    UnknownResource(ResourceId),
    /// The resource exists but cannot be used the way it was asked to.
    InvalidUsage {
        resource: ResourceId,
        reason: &'static str,
    },
    /// A descriptor handle that does not address a slot of a suitable heap.
    InvalidHandle { handle: u64, reason: &'static str },
    /// A write would land outside of the resource.
    OutOfBounds {
        resource: ResourceId,
        offset: u64,
        len: u64,
        size: u64,
    },
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Unavailable(reason) => write!(f, "graphics device unavailable: {reason}"),
            DeviceError::AllocationFailed(reason) => write!(f, "GPU allocation failed: {reason}"),
            DeviceError::UnknownResource(id) => write!(f, "unknown GPU resource {id:?}"),
            DeviceError::InvalidUsage { resource, reason } => {
                write!(f, "invalid use of resource {resource:?}: {reason}")
            }
            DeviceError::InvalidHandle { handle, reason } => {
                write!(f, "invalid descriptor handle {handle:#x}: {reason}")
            }
            DeviceError::OutOfBounds {
                resource,
                offset,
                len,
                size,
            } => write!(
                f,
                "write of {len} bytes at offset {offset} exceeds resource {resource:?} of {size} bytes"
            ),
        }
    }
}

impl std::error::Error for DeviceError {}

/// A failure of the descriptor heap or constant-buffer bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// Every slot of the heap (or of the constant-buffer ring) is claimed.
    CapacityExceeded {
        heap: &'static str,
        capacity: u32,
        requested: u32,
    },
    /// A slot that was never registered cannot be promoted to the constant region.
    UnregisteredSlot {
        heap: &'static str,
        index: u32,
        next_free: u32,
    },
    /// A heap was requested with zero slots.
    EmptyHeap { heap: &'static str },
    /// The regions of a heap add up to more slots than can be addressed.
    BudgetOverflow { heap: &'static str },
    /// GPU handles were requested from a heap that is not shader visible.
    NotShaderVisible { heap: &'static str },
    Device(DeviceError),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::CapacityExceeded {
                heap,
                capacity,
                requested,
            } => write!(
                f,
                "{heap} heap capacity exceeded: requested up to {requested} of {capacity} slots"
            ),
            HeapError::UnregisteredSlot {
                heap,
                index,
                next_free,
            } => write!(
                f,
                "{heap} slot {index} is not registered (next free slot is {next_free})"
            ),
            HeapError::EmptyHeap { heap } => write!(f, "{heap} heap must have at least one slot"),
            HeapError::BudgetOverflow { heap } => {
                write!(f, "{heap} heap budget exceeds the addressable slot count")
            }
            HeapError::NotShaderVisible { heap } => {
                write!(f, "{heap} heap is not shader visible")
            }
            HeapError::Device(err) => write!(f, "device error: {err}"),
        }
    }
}

impl std::error::Error for HeapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeapError::Device(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DeviceError> for HeapError {
    fn from(err: DeviceError) -> Self {
        HeapError::Device(err)
    }
}

/// A failure of a texture, depth-stencil or render-target wrapper.
#[derive(Debug)]
pub enum ResourceError {
    /// The wrapper has no descriptor registration and must not be bound.
    Unregistered { label: String },
    Image(image::ImageError),
    Heap(HeapError),
    Device(DeviceError),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Unregistered { label } => {
                write!(f, "resource '{label}' has no descriptor registration")
            }
            ResourceError::Image(err) => write!(f, "failed to decode image: {err}"),
            ResourceError::Heap(err) => write!(f, "{err}"),
            ResourceError::Device(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Image(err) => Some(err),
            ResourceError::Heap(err) => Some(err),
            ResourceError::Device(err) => Some(err),
            ResourceError::Unregistered { .. } => None,
        }
    }
}

impl From<HeapError> for ResourceError {
    fn from(err: HeapError) -> Self {
        ResourceError::Heap(err)
    }
}

impl From<DeviceError> for ResourceError {
    fn from(err: DeviceError) -> Self {
        ResourceError::Device(err)
    }
}

impl From<image::ImageError> for ResourceError {
    fn from(err: image::ImageError) -> Self {
        ResourceError::Image(err)
    }
}

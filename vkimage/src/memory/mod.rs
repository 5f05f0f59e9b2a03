// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Device memory allocation, import and export.
//!
//! All device memory lives in one heap, whose size is fixed when the physical device is created.
//! The physical device counts the bytes in use; an allocation that would overflow the heap fails
//! with [`VulkanError::OutOfDeviceMemory`](crate::VulkanError::OutOfDeviceMemory) and leaves the
//! count untouched.
//!
//! Every [`DeviceMemory`] is backed by a [`BufferObject`] of the kernel driver. Memory can be
//! imported from a dma-buf file descriptor or from an Android hardware buffer; importing the same
//! buffer twice shares the buffer object, which is reference counted in the physical device's
//! handle table.

pub use self::{
    bo::BufferObject,
    device_memory::{
        DeviceMemory, DeviceMemoryError, MemoryAllocateFlags, MemoryAllocateInfo,
        MemoryImportInfo,
    },
};
use crate::{
    macros::{vulkan_bitflags, vulkan_enum},
    DeviceSize,
};

pub(crate) mod bo;
mod device_memory;

/// Memory requirements of a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryRequirements {
    /// Number of bytes of memory required.
    pub size: DeviceSize,

    /// Alignment of the offset the resource can be bound at.
    pub alignment: DeviceSize,

    /// Indicates which memory types can be used. Each bit that is set to 1 means that the memory
    /// type whose index is the same as the position of the bit can be used.
    pub memory_type_bits: u32,

    /// Whether the driver prefers a dedicated allocation for the resource.
    pub prefers_dedicated_allocation: bool,

    /// Whether the resource must have a dedicated allocation.
    pub requires_dedicated_allocation: bool,
}

vulkan_bitflags! {
    /// Properties of a memory type.
    MemoryPropertyFlags = MemoryPropertyFlags(u32);

    /// The memory is located on the device.
    DEVICE_LOCAL = DEVICE_LOCAL,

    /// The memory can be mapped into the memory space of the host and accessed as regular RAM.
    HOST_VISIBLE = HOST_VISIBLE,

    /// Host access to the memory does not require flushing or invalidating.
    HOST_COHERENT = HOST_COHERENT,

    /// The memory is cached by the host.
    HOST_CACHED = HOST_CACHED,

    /// Allocations made from the memory are lazy.
    LAZILY_ALLOCATED = LAZILY_ALLOCATED,

    /// The memory can only be accessed by the device, and allows protected queue access.
    PROTECTED = PROTECTED,
}

vulkan_bitflags! {
    /// Attributes of a memory heap.
    MemoryHeapFlags = MemoryHeapFlags(u32);

    /// The heap corresponds to device-local memory.
    DEVICE_LOCAL = DEVICE_LOCAL,

    /// Allocations are replicated across each physical device of a device group.
    MULTI_INSTANCE = MULTI_INSTANCE,
}

/// A memory heap in a physical device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryHeap {
    /// The size of the heap in bytes.
    pub size: DeviceSize,

    /// Attributes of the heap.
    pub flags: MemoryHeapFlags,
}

/// A memory type in a physical device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryType {
    /// The properties of this memory type.
    pub property_flags: MemoryPropertyFlags,

    /// The index of the memory heap that this memory type corresponds to.
    pub heap_index: u32,
}

/// Properties of the memory in a physical device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryProperties {
    /// The available memory types.
    pub memory_types: Vec<MemoryType>,

    /// The available memory heaps.
    pub memory_heaps: Vec<MemoryHeap>,
}

vulkan_enum! {
    /// A handle type for memory shared with other APIs or processes.
    ExternalMemoryHandleType = ExternalMemoryHandleTypeFlags(u32);

    /// A POSIX file descriptor whose only use is to be imported again by a Vulkan driver.
    OpaqueFd = OPAQUE_FD,

    /// A Linux dma-buf file descriptor.
    DmaBuf = DMA_BUF_EXT,

    /// An Android hardware buffer.
    AndroidHardwareBuffer = ANDROID_HARDWARE_BUFFER_ANDROID,
}

vulkan_bitflags! {
    /// A set of [`ExternalMemoryHandleType`] values.
    ExternalMemoryHandleTypes = ExternalMemoryHandleTypeFlags(u32);

    OPAQUE_FD = OPAQUE_FD,
    DMA_BUF = DMA_BUF_EXT,
    ANDROID_HARDWARE_BUFFER = ANDROID_HARDWARE_BUFFER_ANDROID,
}

impl From<ExternalMemoryHandleType> for ExternalMemoryHandleTypes {
    #[inline]
    fn from(val: ExternalMemoryHandleType) -> Self {
        Self(val as u32)
    }
}

impl ExternalMemoryHandleTypes {
    /// Returns whether `self` contains `handle_type`.
    #[inline]
    pub const fn contains_enum(self, handle_type: ExternalMemoryHandleType) -> bool {
        self.intersects(Self(handle_type as u32))
    }
}

vulkan_bitflags! {
    /// Describes the features of an external memory handle type.
    ExternalMemoryFeatures = ExternalMemoryFeatureFlags(u32);

    /// Resources of this handle type must be bound to a dedicated allocation.
    DEDICATED_ONLY = DEDICATED_ONLY,

    /// Memory of this handle type can be exported.
    EXPORTABLE = EXPORTABLE,

    /// Memory of this handle type can be imported.
    IMPORTABLE = IMPORTABLE,
}

/// The properties for exporting or importing external memory, when a resource is created
/// with a specific configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExternalMemoryProperties {
    pub external_memory_features: ExternalMemoryFeatures,

    /// The handle types that can be exported from memory that was imported with this handle
    /// type.
    pub export_from_imported_handle_types: ExternalMemoryHandleTypes,

    /// The handle types that can be used together with this handle type.
    pub compatible_handle_types: ExternalMemoryHandleTypes,
}

impl ExternalMemoryProperties {
    /// Returns the properties of `handle_type`, or `None` if the driver doesn't support it.
    pub fn of(handle_type: ExternalMemoryHandleType) -> Option<Self> {
        match handle_type {
            ExternalMemoryHandleType::OpaqueFd | ExternalMemoryHandleType::DmaBuf => {
                let prime = ExternalMemoryHandleTypes::OPAQUE_FD | ExternalMemoryHandleTypes::DMA_BUF;

                Some(ExternalMemoryProperties {
                    external_memory_features: ExternalMemoryFeatures::EXPORTABLE
                        | ExternalMemoryFeatures::IMPORTABLE,
                    export_from_imported_handle_types: prime,
                    compatible_handle_types: prime,
                })
            }
            ExternalMemoryHandleType::AndroidHardwareBuffer => Some(ExternalMemoryProperties {
                external_memory_features: ExternalMemoryFeatures::DEDICATED_ONLY
                    | ExternalMemoryFeatures::EXPORTABLE
                    | ExternalMemoryFeatures::IMPORTABLE,
                export_from_imported_handle_types:
                    ExternalMemoryHandleTypes::ANDROID_HARDWARE_BUFFER,
                compatible_handle_types: ExternalMemoryHandleTypes::ANDROID_HARDWARE_BUFFER,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ExternalMemoryFeatures, ExternalMemoryHandleType, ExternalMemoryHandleTypes,
        ExternalMemoryProperties,
    };

    #[test]
    fn handle_type_properties() {
        let dma_buf = ExternalMemoryProperties::of(ExternalMemoryHandleType::DmaBuf).unwrap();
        assert!(dma_buf
            .compatible_handle_types
            .contains_enum(ExternalMemoryHandleType::OpaqueFd));
        assert!(!dma_buf
            .external_memory_features
            .intersects(ExternalMemoryFeatures::DEDICATED_ONLY));

        let ahb =
            ExternalMemoryProperties::of(ExternalMemoryHandleType::AndroidHardwareBuffer).unwrap();
        assert!(ahb
            .external_memory_features
            .contains(ExternalMemoryFeatures::DEDICATED_ONLY | ExternalMemoryFeatures::IMPORTABLE));
        assert_eq!(
            ahb.compatible_handle_types,
            ExternalMemoryHandleTypes::ANDROID_HARDWARE_BUFFER,
        );
    }
}

// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Buffers: linear ranges of device memory without a format.
//!
//! A [`Buffer`] doesn't own any memory when it is created. Query its
//! [`memory_requirements`](Buffer::memory_requirements), allocate a
//! [`DeviceMemory`] that satisfies them and then call [`bind_memory`](Buffer::bind_memory).

use crate::{
    device::Device,
    macros::{impl_id_counter, vulkan_bitflags},
    memory::{DeviceMemory, ExternalMemoryHandleTypes, ExternalMemoryProperties, MemoryRequirements},
    DeviceOwned, DeviceSize, NonExhaustive, VulkanError,
};
use std::{
    error::Error,
    fmt,
    num::NonZero,
    sync::{Arc, OnceLock},
};

/// Uniform and storage buffers are read with a unit that prefetches the 4 bytes after every
/// read. A read of the last word of a page-sized buffer would fault in the MMU.
const PREFETCH_PAGE_SIZE: DeviceSize = 4096;

/// A buffer, with or without memory bound to it.
pub struct Buffer {
    id: NonZero<u64>,
    device: Arc<Device>,

    size: DeviceSize,
    usage: BufferUsage,
    external_memory_handle_types: ExternalMemoryHandleTypes,
    alignment: DeviceSize,

    memory: OnceLock<(Arc<DeviceMemory>, DeviceSize)>,
}

impl Buffer {
    /// Creates a new `Buffer` without memory.
    pub fn new(
        device: Arc<Device>,
        create_info: BufferCreateInfo,
    ) -> Result<Arc<Buffer>, BufferCreationError> {
        let BufferCreateInfo {
            size,
            usage,
            external_memory_handle_types,
            _ne: _,
        } = create_info;

        if size == 0 {
            return Err(BufferCreationError::ZeroSize);
        }

        if usage.is_empty() {
            return Err(BufferCreationError::NoUsage);
        }

        let alignment = device.physical_device().config().buffer_alignment;

        Ok(Arc::new(Buffer {
            id: Self::next_id(),
            device,
            size,
            usage,
            external_memory_handle_types,
            alignment,
            memory: OnceLock::new(),
        }))
    }

    /// Returns the size of the buffer in bytes.
    #[inline]
    pub fn size(&self) -> DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    #[inline]
    pub fn external_memory_handle_types(&self) -> ExternalMemoryHandleTypes {
        self.external_memory_handle_types
    }

    /// Returns the memory requirements for this buffer.
    pub fn memory_requirements(&self) -> MemoryRequirements {
        let mut size = self.size.next_multiple_of(self.alignment);

        if self
            .usage
            .intersects(BufferUsage::UNIFORM_BUFFER | BufferUsage::STORAGE_BUFFER)
            && self.size % PREFETCH_PAGE_SIZE == 0
        {
            size += self.alignment;
        }

        MemoryRequirements {
            size,
            alignment: self.alignment,
            memory_type_bits: 1,
            prefers_dedicated_allocation: false,
            requires_dedicated_allocation: false,
        }
    }

    /// Binds device memory to this buffer, starting at `offset` bytes into the memory.
    ///
    /// A buffer can only be bound once.
    pub fn bind_memory(
        &self,
        memory: Arc<DeviceMemory>,
        offset: DeviceSize,
    ) -> Result<(), BufferBindError> {
        if memory.device() != &self.device {
            return Err(BufferBindError::DeviceMismatch);
        }

        let requirements = self.memory_requirements();

        if requirements.memory_type_bits & (1 << memory.memory_type_index()) == 0 {
            return Err(BufferBindError::MemoryTypeNotAllowed {
                provided_memory_type_index: memory.memory_type_index(),
                allowed_memory_type_bits: requirements.memory_type_bits,
            });
        }

        if offset % requirements.alignment != 0 {
            return Err(BufferBindError::OffsetNotAligned {
                offset,
                required_alignment: requirements.alignment,
            });
        }

        if offset
            .checked_add(requirements.size)
            .is_none_or(|end| end > memory.allocation_size())
        {
            return Err(BufferBindError::MemoryTooSmall {
                required_size: requirements.size,
                available_size: memory.allocation_size().saturating_sub(offset),
            });
        }

        log::debug!(
            "binding buffer {} to buffer object {} at offset {offset}",
            self.id,
            memory.buffer_object().handle(),
        );

        self.memory
            .set((memory, offset))
            .map_err(|_| BufferBindError::AlreadyBound)
    }

    /// Returns the memory bound to this buffer and the offset into it, if any.
    #[inline]
    pub fn memory(&self) -> Option<(&Arc<DeviceMemory>, DeviceSize)> {
        self.memory.get().map(|(memory, offset)| (memory, *offset))
    }
}

unsafe impl DeviceOwned for Buffer {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("usage", &self.usage)
            .field("bound", &self.memory.get().is_some())
            .finish_non_exhaustive()
    }
}

impl_id_counter!(Buffer);

/// Parameters to create a new `Buffer`.
#[derive(Clone, Debug)]
pub struct BufferCreateInfo {
    /// The size in bytes of the buffer.
    ///
    /// The default value is `0`, which must be overridden.
    pub size: DeviceSize,

    /// How the buffer is going to be used.
    ///
    /// The default value is [`BufferUsage::empty()`], which must be overridden.
    pub usage: BufferUsage,

    /// The external memory handle types that are going to be used with the buffer.
    ///
    /// The default value is [`ExternalMemoryHandleTypes::empty()`].
    pub external_memory_handle_types: ExternalMemoryHandleTypes,

    pub _ne: NonExhaustive,
}

impl Default for BufferCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            size: 0,
            usage: BufferUsage::empty(),
            external_memory_handle_types: ExternalMemoryHandleTypes::empty(),
            _ne: NonExhaustive(()),
        }
    }
}

vulkan_bitflags! {
    /// Describes how a buffer is going to be used.
    BufferUsage = BufferUsageFlags(u32);

    TRANSFER_SRC = TRANSFER_SRC,
    TRANSFER_DST = TRANSFER_DST,
    UNIFORM_TEXEL_BUFFER = UNIFORM_TEXEL_BUFFER,
    STORAGE_TEXEL_BUFFER = STORAGE_TEXEL_BUFFER,
    UNIFORM_BUFFER = UNIFORM_BUFFER,
    STORAGE_BUFFER = STORAGE_BUFFER,
    INDEX_BUFFER = INDEX_BUFFER,
    VERTEX_BUFFER = VERTEX_BUFFER,
    INDIRECT_BUFFER = INDIRECT_BUFFER,
    SHADER_DEVICE_ADDRESS = SHADER_DEVICE_ADDRESS,
}

/// The external memory properties supported for buffers with a given configuration.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ExternalBufferProperties {
    /// The properties for external memory.
    pub external_memory_properties: ExternalMemoryProperties,
}

/// Error that can happen when creating a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferCreationError {
    /// The driver returned an error.
    VulkanError(VulkanError),

    /// The size of the buffer is zero.
    ZeroSize,

    /// The buffer has no usage.
    NoUsage,
}

impl Error for BufferCreationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::VulkanError(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for BufferCreationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::VulkanError(_) => write!(f, "a runtime error occurred"),
            Self::ZeroSize => write!(f, "the size of the buffer is zero"),
            Self::NoUsage => write!(f, "the buffer has no usage"),
        }
    }
}

impl From<VulkanError> for BufferCreationError {
    #[inline]
    fn from(err: VulkanError) -> Self {
        Self::VulkanError(err)
    }
}

/// Error that can happen when binding memory to a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferBindError {
    /// The driver returned an error.
    VulkanError(VulkanError),

    /// The buffer already has memory bound to it.
    AlreadyBound,

    /// The memory was allocated from a different device.
    DeviceMismatch,

    /// The memory type of the memory is not allowed by the buffer's requirements.
    MemoryTypeNotAllowed {
        provided_memory_type_index: u32,
        allowed_memory_type_bits: u32,
    },

    /// The offset is not a multiple of the required alignment.
    OffsetNotAligned {
        offset: DeviceSize,
        required_alignment: DeviceSize,
    },

    /// The memory is too small for the buffer at this offset.
    MemoryTooSmall {
        required_size: DeviceSize,
        available_size: DeviceSize,
    },
}

impl Error for BufferBindError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::VulkanError(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for BufferBindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::VulkanError(_) => write!(f, "a runtime error occurred"),
            Self::AlreadyBound => write!(f, "the buffer already has memory bound to it"),
            Self::DeviceMismatch => {
                write!(f, "the memory was allocated from a different device")
            }
            Self::MemoryTypeNotAllowed {
                provided_memory_type_index,
                allowed_memory_type_bits,
            } => write!(
                f,
                "the memory type of the memory ({}) is not one of the allowed types ({:#b})",
                provided_memory_type_index, allowed_memory_type_bits,
            ),
            Self::OffsetNotAligned {
                offset,
                required_alignment,
            } => write!(
                f,
                "the offset ({}) is not a multiple of the required alignment ({})",
                offset, required_alignment,
            ),
            Self::MemoryTooSmall {
                required_size,
                available_size,
            } => write!(
                f,
                "the buffer needs {} bytes of memory, but only {} are available after the offset",
                required_size, available_size,
            ),
        }
    }
}

impl From<VulkanError> for BufferBindError {
    #[inline]
    fn from(err: VulkanError) -> Self {
        Self::VulkanError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::{Buffer, BufferBindError, BufferCreateInfo, BufferCreationError, BufferUsage};
    use crate::{
        device::Device,
        memory::{DeviceMemory, MemoryAllocateInfo},
    };
    use std::sync::Arc;

    fn create_info(size: u64, usage: BufferUsage) -> BufferCreateInfo {
        BufferCreateInfo {
            size,
            usage,
            ..Default::default()
        }
    }

    fn allocate(device: &Arc<Device>, size: u64) -> Arc<DeviceMemory> {
        DeviceMemory::allocate(
            device.clone(),
            MemoryAllocateInfo {
                allocation_size: size,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn create() {
        let (device, _) = sim_device!();

        let buffer = Buffer::new(device.clone(), create_info(128, BufferUsage::VERTEX_BUFFER))
            .unwrap();
        assert_eq!(buffer.size(), 128);
        assert!(buffer.memory().is_none());

        assert_eq!(
            Buffer::new(device.clone(), create_info(0, BufferUsage::VERTEX_BUFFER)).unwrap_err(),
            BufferCreationError::ZeroSize,
        );
        assert_eq!(
            Buffer::new(device, create_info(16, BufferUsage::empty())).unwrap_err(),
            BufferCreationError::NoUsage,
        );
    }

    #[test]
    fn memory_requirements() {
        let (device, _) = sim_device!();

        let requirements = |size, usage| {
            Buffer::new(device.clone(), create_info(size, usage))
                .unwrap()
                .memory_requirements()
        };

        let small = requirements(100, BufferUsage::VERTEX_BUFFER);
        assert_eq!(small.size, 256);
        assert_eq!(small.alignment, 256);
        assert_eq!(small.memory_type_bits, 1);
        assert!(!small.requires_dedicated_allocation);

        // Page-sized uniform and storage buffers get room for the prefetch.
        assert_eq!(requirements(4096, BufferUsage::UNIFORM_BUFFER).size, 4096 + 256);
        assert_eq!(requirements(8192, BufferUsage::STORAGE_BUFFER).size, 8192 + 256);
        assert_eq!(requirements(4096, BufferUsage::VERTEX_BUFFER).size, 4096);
        assert_eq!(requirements(4000, BufferUsage::UNIFORM_BUFFER).size, 4096);
    }

    #[test]
    fn bind_memory() {
        let (device, _) = sim_device!();
        let memory = allocate(&device, 8192);

        let buffer = Buffer::new(device.clone(), create_info(1000, BufferUsage::UNIFORM_BUFFER))
            .unwrap();

        assert_eq!(
            buffer.bind_memory(memory.clone(), 100).unwrap_err(),
            BufferBindError::OffsetNotAligned {
                offset: 100,
                required_alignment: 256,
            },
        );
        assert_eq!(
            buffer.bind_memory(memory.clone(), 7680).unwrap_err(),
            BufferBindError::MemoryTooSmall {
                required_size: 1024,
                available_size: 512,
            },
        );

        buffer.bind_memory(memory.clone(), 4096).unwrap();
        let (bound, offset) = buffer.memory().unwrap();
        assert_eq!(bound, &memory);
        assert_eq!(offset, 4096);

        assert_eq!(
            buffer.bind_memory(memory, 0).unwrap_err(),
            BufferBindError::AlreadyBound,
        );
    }

    #[test]
    fn bind_foreign_memory() {
        let (device, _) = sim_device!();
        let (other_device, _) = sim_device!();
        let memory = allocate(&other_device, 4096);

        let buffer = Buffer::new(device, create_info(64, BufferUsage::TRANSFER_DST)).unwrap();
        assert_eq!(
            buffer.bind_memory(memory, 0).unwrap_err(),
            BufferBindError::DeviceMismatch,
        );
    }
}

// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Image layout, format capability and device memory core of a Vulkan driver for a tile-based
//! GPU.
//!
//! # Brief summary
//!
//! - A [`PhysicalDevice`](crate::device::physical::PhysicalDevice) wraps a
//!   [`Kernel`](crate::kernel::Kernel) (the DRM render node, or the in-process simulator) together
//!   with the [`HardwareConfig`](crate::device::HardwareConfig) of one GPU generation. It owns the
//!   device-memory heap accounting and the table of native buffer objects, and answers format
//!   capability queries.
//!
//! - The [`format`] module describes every Vulkan format the driver knows about: how many planes
//!   it has, which native texel encoding backs each plane, and which features the format supports
//!   for a given tiling or DRM format modifier.
//!
//! - An [`Image`](crate::image::Image) computes the byte layout of every plane, mip level and
//!   array layer for the hardware's tiling modes. Images are bound to
//!   [`DeviceMemory`](crate::memory::DeviceMemory), which is either freshly allocated, imported
//!   from a file descriptor, or imported from an Android hardware buffer.
//!
//! - The [`android`] module translates the plane layout reported by the platform buffer allocator
//!   into an explicit DRM format modifier layout.

pub use ash::vk::Format;
use std::{error::Error, fmt, sync::Arc};

#[macro_use]
mod macros;
pub mod android;
pub mod buffer;
pub mod device;
pub mod drm;
pub mod format;
pub mod image;
pub mod kernel;
pub mod memory;

/// Represents memory size and offset values on a Vulkan device.
/// Analogous to the Rust `usize` type on the host.
pub use ash::vk::DeviceSize;

/// Implemented on objects that belong to a Vulkan device.
///
/// # Safety
///
/// - `device()` must return the correct device.
pub unsafe trait DeviceOwned {
    /// Returns the device that owns `self`.
    fn device(&self) -> &Arc<device::Device>;
}

/// Result codes that the driver can report back to the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VulkanError {
    OutOfHostMemory,
    OutOfDeviceMemory,
    InitializationFailed,
    MemoryMapFailed,
    FeatureNotPresent,
    FormatNotSupported,
    InvalidExternalHandle,
    InvalidDrmFormatModifierPlaneLayout,
}

impl Error for VulkanError {}

impl fmt::Display for VulkanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VulkanError::OutOfHostMemory => write!(f, "A host memory allocation has failed."),
            VulkanError::OutOfDeviceMemory => write!(f, "A device memory allocation has failed."),
            VulkanError::InitializationFailed => {
                write!(f, "Initialization of an object could not be completed.")
            }
            VulkanError::MemoryMapFailed => write!(f, "Mapping of a memory object has failed."),
            VulkanError::FeatureNotPresent => write!(f, "A requested feature is not supported."),
            VulkanError::FormatNotSupported => {
                write!(f, "A requested format is not supported on this device.")
            }
            VulkanError::InvalidExternalHandle => write!(
                f,
                "An external handle is not a valid handle of the specified type.",
            ),
            VulkanError::InvalidDrmFormatModifierPlaneLayout => write!(
                f,
                "The requested DRM format modifier plane layout is invalid.",
            ),
        }
    }
}

impl From<VulkanError> for ash::vk::Result {
    #[inline]
    fn from(err: VulkanError) -> Self {
        match err {
            VulkanError::OutOfHostMemory => ash::vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            VulkanError::OutOfDeviceMemory => ash::vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            VulkanError::InitializationFailed => ash::vk::Result::ERROR_INITIALIZATION_FAILED,
            VulkanError::MemoryMapFailed => ash::vk::Result::ERROR_MEMORY_MAP_FAILED,
            VulkanError::FeatureNotPresent => ash::vk::Result::ERROR_FEATURE_NOT_PRESENT,
            VulkanError::FormatNotSupported => ash::vk::Result::ERROR_FORMAT_NOT_SUPPORTED,
            VulkanError::InvalidExternalHandle => ash::vk::Result::ERROR_INVALID_EXTERNAL_HANDLE,
            VulkanError::InvalidDrmFormatModifierPlaneLayout => {
                ash::vk::Result::ERROR_INVALID_DRM_FORMAT_MODIFIER_PLANE_LAYOUT_EXT
            }
        }
    }
}

/// A helper type for non-exhaustive structs.
///
/// This type cannot be constructed outside this crate. Structures with a field of this type can
/// only be constructed by calling a constructor function or `Default::default()`. The effect is
/// similar to the standard Rust `#[non_exhaustive]` attribute, except that it does not prevent
/// update syntax from being used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)] // add traits as needed
pub struct NonExhaustive(pub(crate) ());

#[cfg(test)]
mod error_tests {
    use crate::VulkanError;

    #[test]
    fn result_codes() {
        assert_eq!(
            ash::vk::Result::from(VulkanError::InvalidDrmFormatModifierPlaneLayout),
            ash::vk::Result::ERROR_INVALID_DRM_FORMAT_MODIFIER_PLANE_LAYOUT_EXT,
        );
        assert_eq!(
            ash::vk::Result::from(VulkanError::OutOfDeviceMemory),
            ash::vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
        );
    }
}

// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The physical device and the logical device.
//!
//! A [`PhysicalDevice`](physical::PhysicalDevice) stands for one GPU: its kernel driver, its
//! [`HardwareConfig`], and the state shared by every allocation made on it, which is the heap
//! usage counter and the table of native buffer objects. Having that state in an object rather
//! than in globals means that several simulated GPUs can live side by side in one process.
//!
//! A [`Device`] is created from a physical device. Images, buffers and device memory belong to a
//! device.
//!
//! ```
//! use std::sync::Arc;
//! use vkimage::{
//!     device::{
//!         physical::{PhysicalDevice, PhysicalDeviceCreateInfo},
//!         Device, DeviceCreateInfo, HardwareConfig,
//!     },
//!     kernel::{sim::SimKernel, SystemMemory},
//! };
//!
//! let kernel = Arc::new(SimKernel::new(SystemMemory {
//!     total: 2 << 30,
//!     available: 1 << 30,
//! }));
//! let physical_device = PhysicalDevice::new(
//!     kernel,
//!     PhysicalDeviceCreateInfo {
//!         config: HardwareConfig::v3d_7_1(),
//!         ..Default::default()
//!     },
//! )
//! .unwrap();
//!
//! let device = Device::new(physical_device, DeviceCreateInfo::default());
//! ```

pub use self::properties::{HardwareConfig, LinearSampling};
use self::physical::PhysicalDevice;
use crate::{android::Gralloc, memory::BufferObject, NonExhaustive};
use parking_lot::Mutex;
use std::{fmt, num::NonZero, sync::Arc};

pub mod physical;
mod properties;

/// Represents a logical device on a physical device.
pub struct Device {
    id: NonZero<u64>,
    physical_device: Arc<PhysicalDevice>,
    gralloc: Option<Arc<dyn Gralloc>>,

    // Buffer objects of memory allocated with `MemoryAllocateFlags::DEVICE_ADDRESS`. They are
    // resident in every submission, since shaders can reach them through any pointer.
    device_address_bos: Mutex<Vec<Arc<BufferObject>>>,
}

impl Device {
    /// Creates a new `Device`.
    pub fn new(physical_device: Arc<PhysicalDevice>, create_info: DeviceCreateInfo) -> Arc<Device> {
        let DeviceCreateInfo { gralloc, _ne: _ } = create_info;

        log::debug!(
            "creating device on V3D {}.{}{}",
            physical_device.config().version / 10,
            physical_device.config().version % 10,
            if gralloc.is_some() {
                " with gralloc"
            } else {
                ""
            },
        );

        Arc::new(Device {
            id: Self::next_id(),
            physical_device,
            gralloc,
            device_address_bos: Mutex::new(Vec::new()),
        })
    }

    /// Returns the physical device that was used to create this device.
    #[inline]
    pub fn physical_device(&self) -> &Arc<PhysicalDevice> {
        &self.physical_device
    }

    /// Returns the platform buffer allocator, if the device was given one.
    #[inline]
    pub fn gralloc(&self) -> Option<&Arc<dyn Gralloc>> {
        self.gralloc.as_ref()
    }

    /// Returns the GEM handles that must be resident for every submission.
    pub fn device_address_bo_handles(&self) -> Vec<u32> {
        self.device_address_bos
            .lock()
            .iter()
            .map(|bo| bo.handle())
            .collect()
    }

    pub(crate) fn add_device_address_bo(&self, bo: Arc<BufferObject>) {
        self.device_address_bos.lock().push(bo);
    }

    pub(crate) fn remove_device_address_bo(&self, bo: &Arc<BufferObject>) {
        let mut bos = self.device_address_bos.lock();

        // The same buffer object is listed once per memory that uses it.
        if let Some(index) = bos.iter().position(|other| Arc::ptr_eq(other, bo)) {
            bos.swap_remove(index);
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("physical_device", &self.physical_device)
            .field("gralloc", &self.gralloc.is_some())
            .finish_non_exhaustive()
    }
}

crate::macros::impl_id_counter!(Device);

/// Parameters to create a new `Device`.
#[derive(Clone)]
pub struct DeviceCreateInfo {
    /// The platform buffer allocator, used to find out the layout of imported hardware buffers.
    ///
    /// The default value is `None`.
    pub gralloc: Option<Arc<dyn Gralloc>>,

    pub _ne: NonExhaustive,
}

impl Default for DeviceCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            gralloc: None,
            _ne: NonExhaustive(()),
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn distinct_devices() {
        let (a, _) = sim_device!();
        let (b, _) = sim_device!();

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert!(a.gralloc().is_none());
        assert!(a.device_address_bo_handles().is_empty());
    }
}

// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Kernel buffer objects and the table that shares them between imports.

use crate::{kernel::Kernel, DeviceSize, VulkanError};
use foldhash::fast::RandomState;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    ffi::c_void,
    fs::File,
    io::{Seek, SeekFrom},
    os::fd::BorrowedFd,
    ptr::NonNull,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

/// A buffer object of the kernel driver.
///
/// The GEM handle is owned by the [`BoTable`] of the physical device and stays open for as long
/// as any device memory references the buffer object.
#[derive(Debug)]
pub struct BufferObject {
    handle: u32,
    size: DeviceSize,
    offset: u64,
    refcount: AtomicU32,
    map: Mutex<Option<Mapping>>,
}

#[derive(Debug)]
struct Mapping {
    ptr: NonNull<c_void>,
    size: DeviceSize,
}

// SAFETY: The mapping is only a record of the address range; access to the memory behind it is
// synchronized by the owner of the device memory.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl BufferObject {
    /// Returns the GEM handle, for residency lists.
    #[inline]
    pub fn handle(&self) -> u32 {
        self.handle
    }

    /// Returns the size of the buffer object, which may be larger than the memory it backs.
    #[inline]
    pub fn size(&self) -> DeviceSize {
        self.size
    }

    /// Returns the address of the buffer object in the GPU's address space.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the number of device memory objects that share this buffer object.
    #[inline]
    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }

    /// Returns whether the buffer object is mapped into the process.
    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.map.lock().is_some()
    }

    /// Maps the first `size` bytes of the buffer object.
    ///
    /// The driver maps buffer objects for its own purposes too, so an existing mapping that is
    /// large enough is returned as is.
    pub(crate) fn map(
        &self,
        kernel: &dyn Kernel,
        size: DeviceSize,
    ) -> Result<NonNull<c_void>, VulkanError> {
        let mut map = self.map.lock();

        if let Some(mapping) = map.as_ref() {
            if mapping.size >= size {
                return Ok(mapping.ptr);
            }

            let Mapping { ptr, size } = mapping;
            // SAFETY: The mapping was created by `mmap_bo` and is being replaced.
            if let Err(err) = unsafe { kernel.munmap_bo(*ptr, *size) } {
                log::warn!("failed to unmap BO {}: {err}", self.handle);
            }

            *map = None;
        }

        let ptr = kernel.mmap_bo(self.handle, size).map_err(|err| {
            log::debug!("failed to map BO {}: {err}", self.handle);
            VulkanError::MemoryMapFailed
        })?;
        *map = Some(Mapping { ptr, size });

        Ok(ptr)
    }

    /// Drops the mapping of the buffer object, if any.
    pub(crate) fn unmap(&self, kernel: &dyn Kernel) {
        if let Some(Mapping { ptr, size }) = self.map.lock().take() {
            // SAFETY: The mapping was created by `mmap_bo`, and `take` made it unreachable.
            if let Err(err) = unsafe { kernel.munmap_bo(ptr, size) } {
                log::warn!("failed to unmap BO {}: {err}", self.handle);
            }
        }
    }
}

/// The buffer objects of a physical device, keyed by GEM handle.
///
/// The kernel hands out one GEM handle per underlying buffer, however many times it is imported.
/// The table makes sure that there is also only one [`BufferObject`] per handle, with an explicit
/// reference count, and closes the handle when the count drops to zero.
#[derive(Debug, Default)]
pub(crate) struct BoTable {
    bos: Mutex<HashMap<u32, Arc<BufferObject>, RandomState>>,
}

impl BoTable {
    /// Creates a new buffer object of `size` bytes.
    pub(crate) fn create(
        &self,
        kernel: &dyn Kernel,
        size: DeviceSize,
    ) -> Result<Arc<BufferObject>, VulkanError> {
        let native = kernel.create_bo(size).map_err(|err| {
            log::debug!("failed to create a BO of {size} bytes: {err}");
            VulkanError::OutOfDeviceMemory
        })?;

        let bo = Arc::new(BufferObject {
            handle: native.handle,
            size,
            offset: native.offset,
            refcount: AtomicU32::new(1),
            map: Mutex::new(None),
        });
        self.bos.lock().insert(native.handle, bo.clone());

        log::debug!("created BO {} of {size} bytes", native.handle);

        Ok(bo)
    }

    /// Imports a dma-buf, or takes another reference to the buffer object that it already
    /// resolves to.
    pub(crate) fn import_fd(
        &self,
        kernel: &dyn Kernel,
        fd: BorrowedFd<'_>,
    ) -> Result<Arc<BufferObject>, VulkanError> {
        // Held across the import so that a concurrent release can't close the handle between
        // the kernel returning it and the reference being taken.
        let mut bos = self.bos.lock();

        let handle = kernel.prime_fd_to_handle(fd).map_err(|err| {
            log::debug!("failed to import fd: {err}");
            VulkanError::InvalidExternalHandle
        })?;

        if let Some(bo) = bos.get(&handle) {
            bo.refcount.fetch_add(1, Ordering::AcqRel);
            log::debug!("imported BO {handle} again, refcount {}", bo.refcount());

            return Ok(bo.clone());
        }

        let size = match fd_size(fd) {
            Ok(size) => size,
            Err(err) => {
                log::debug!("failed to get the size of imported BO {handle}: {err}");
                close_handle(kernel, handle);

                return Err(VulkanError::InvalidExternalHandle);
            }
        };

        let offset = match kernel.bo_offset(handle) {
            Ok(offset) => offset,
            Err(err) => {
                log::debug!("failed to get the offset of imported BO {handle}: {err}");
                close_handle(kernel, handle);

                return Err(VulkanError::InvalidExternalHandle);
            }
        };

        let bo = Arc::new(BufferObject {
            handle,
            size,
            offset,
            refcount: AtomicU32::new(1),
            map: Mutex::new(None),
        });
        bos.insert(handle, bo.clone());

        log::debug!("imported BO {handle} of {size} bytes");

        Ok(bo)
    }

    /// Drops one reference to `bo`. The last reference unmaps the buffer object and closes its
    /// handle.
    pub(crate) fn release(&self, kernel: &dyn Kernel, bo: &BufferObject) {
        let mut bos = self.bos.lock();

        if bo.refcount.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        bos.remove(&bo.handle);
        bo.unmap(kernel);
        close_handle(kernel, bo.handle);

        log::trace!("closed BO {}", bo.handle);
    }

    /// Returns the number of live buffer objects.
    pub(crate) fn len(&self) -> usize {
        self.bos.lock().len()
    }
}

fn close_handle(kernel: &dyn Kernel, handle: u32) {
    if let Err(err) = kernel.close_bo(handle) {
        log::warn!("failed to close BO {handle}: {err}");
    }
}

/// Returns the real size of the buffer behind `fd`, which for dma-bufs is only available by
/// seeking to the end.
pub(crate) fn fd_size(fd: BorrowedFd<'_>) -> std::io::Result<DeviceSize> {
    let mut file = File::from(fd.try_clone_to_owned()?);
    let size = file.seek(SeekFrom::End(0))?;
    file.rewind()?;

    Ok(size)
}

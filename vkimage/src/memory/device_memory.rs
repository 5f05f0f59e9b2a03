// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::{
    bo::{fd_size, BufferObject},
    ExternalMemoryHandleType, ExternalMemoryHandleTypes,
};
use crate::{
    android::HardwareBuffer,
    device::Device,
    macros::{impl_id_counter, vulkan_bitflags},
    DeviceOwned, DeviceSize, NonExhaustive, VulkanError,
};
use std::{
    error::Error,
    ffi::c_void,
    fmt,
    fs::File,
    num::NonZero,
    os::fd::{AsFd, OwnedFd},
    ptr::NonNull,
    sync::{atomic::Ordering, Arc},
};

/// Width in pixels of the dumb buffers that back scanout memory. At 32 bits per pixel, one row
/// is one page.
const SCANOUT_DUMB_WIDTH: u32 = 1024;

const SCANOUT_DUMB_BPP: u32 = 32;

/// Represents memory that has been allocated from the device.
///
/// The memory is freed when the `DeviceMemory` is dropped: the bytes are returned to the heap,
/// and the buffer object is released. A buffer object that was imported several times stays
/// alive until its last `DeviceMemory` is gone.
///
/// # Examples
///
/// ```
/// use vkimage::memory::{DeviceMemory, MemoryAllocateInfo};
///
/// # let device: std::sync::Arc<vkimage::device::Device> = return;
/// // Allocates 1KB of memory.
/// let memory = DeviceMemory::allocate(
///     device,
///     MemoryAllocateInfo {
///         allocation_size: 1024,
///         ..Default::default()
///     },
/// )
/// .unwrap();
/// ```
pub struct DeviceMemory {
    id: NonZero<u64>,
    device: Arc<Device>,
    bo: Arc<BufferObject>,

    allocation_size: DeviceSize,
    accounted_size: DeviceSize,
    memory_type_index: u32,
    export_handle_types: ExternalMemoryHandleTypes,
    imported_handle_type: Option<ExternalMemoryHandleType>,
    flags: MemoryAllocateFlags,

    dumb_handle: Option<u32>,
    hardware_buffer: Option<Arc<dyn HardwareBuffer>>,

    // Whether the buffer object was added to the device's residency list.
    device_address_tracked: bool,
}

impl DeviceMemory {
    /// Allocates a new block of memory.
    pub fn allocate(
        device: Arc<Device>,
        allocate_info: MemoryAllocateInfo,
    ) -> Result<Arc<Self>, DeviceMemoryError> {
        Self::new(device, allocate_info, None)
    }

    /// Imports a block of memory from an external source.
    ///
    /// The file descriptor of a [`MemoryImportInfo::Fd`] is consumed, whether the import succeeds
    /// or not.
    pub fn import(
        device: Arc<Device>,
        allocate_info: MemoryAllocateInfo,
        import_info: MemoryImportInfo,
    ) -> Result<Arc<Self>, DeviceMemoryError> {
        Self::new(device, allocate_info, Some(import_info))
    }

    fn new(
        device: Arc<Device>,
        allocate_info: MemoryAllocateInfo,
        import_info: Option<MemoryImportInfo>,
    ) -> Result<Arc<Self>, DeviceMemoryError> {
        allocate_info.validate(&device, import_info.as_ref())?;

        let MemoryAllocateInfo {
            allocation_size,
            memory_type_index,
            export_handle_types,
            flags,
            for_scanout,
            _ne: _,
        } = allocate_info;

        let physical_device = device.physical_device();
        let config = physical_device.config();
        let kernel = physical_device.kernel();
        let heap_size = physical_device.heap_size();

        let (allocation_size, imported_handle_type) = match &import_info {
            Some(MemoryImportInfo::HardwareBuffer { buffer }) => {
                // The size of a hardware buffer import is that of the buffer itself.
                let fd = buffer
                    .native_handle()
                    .fds
                    .first()
                    .ok_or(VulkanError::InvalidExternalHandle)?;
                let real_size =
                    fd_size(fd.as_fd()).map_err(|_| VulkanError::InvalidExternalHandle)?;

                if allocation_size > real_size {
                    return Err(VulkanError::InvalidExternalHandle.into());
                }

                (
                    real_size,
                    Some(ExternalMemoryHandleType::AndroidHardwareBuffer),
                )
            }
            Some(MemoryImportInfo::Fd { handle_type, .. }) => (allocation_size, Some(*handle_type)),
            None => (allocation_size, None),
        };

        let size = allocation_size
            .checked_next_multiple_of(config.allocation_granularity)
            .filter(|&size| size <= config.max_allocation_size)
            .ok_or(VulkanError::OutOfDeviceMemory)?;

        // Fail fast before going to the kernel; the check is done again once the memory is
        // accounted for.
        if physical_device.heap_used() + size > heap_size {
            log::debug!(
                "allocation of {size} bytes doesn't fit in the heap ({} of {heap_size} used)",
                physical_device.heap_used(),
            );

            return Err(VulkanError::OutOfDeviceMemory.into());
        }

        let mut dumb_handle = None;
        let mut hardware_buffer = None;

        let bo = match import_info {
            Some(MemoryImportInfo::Fd { file, .. }) => {
                let real_size =
                    fd_size(file.as_fd()).map_err(|_| VulkanError::InvalidExternalHandle)?;

                if real_size < allocation_size {
                    log::debug!(
                        "imported fd has {real_size} bytes, {allocation_size} were requested",
                    );

                    return Err(VulkanError::InvalidExternalHandle.into());
                }

                physical_device
                    .bo_table()
                    .import_fd(kernel.as_ref(), file.as_fd())?
            }
            Some(MemoryImportInfo::HardwareBuffer { buffer }) => {
                let bo = {
                    let fd = buffer
                        .native_handle()
                        .fds
                        .first()
                        .ok_or(VulkanError::InvalidExternalHandle)?;

                    physical_device
                        .bo_table()
                        .import_fd(kernel.as_ref(), fd.as_fd())?
                };
                hardware_buffer = Some(buffer);

                bo
            }
            None if for_scanout => {
                let (bo, dumb) = allocate_scanout(&device, size)?;
                dumb_handle = Some(dumb);

                bo
            }
            None => physical_device.bo_table().create(kernel.as_ref(), size)?,
        };

        let heap_counter = physical_device.heap_counter();
        let heap_used = heap_counter.fetch_add(size, Ordering::AcqRel) + size;

        let mut memory = DeviceMemory {
            id: Self::next_id(),
            device: device.clone(),
            bo,
            allocation_size,
            accounted_size: size,
            memory_type_index,
            export_handle_types,
            imported_handle_type,
            flags,
            dumb_handle,
            hardware_buffer,
            device_address_tracked: false,
        };

        // Another thread may have allocated in the meantime.
        if heap_used > heap_size {
            log::debug!("heap overflowed by a concurrent allocation, rolling back");
            drop(memory);

            return Err(VulkanError::OutOfDeviceMemory.into());
        }

        if flags.intersects(MemoryAllocateFlags::DEVICE_ADDRESS) {
            device.add_device_address_bo(memory.bo.clone());
            memory.device_address_tracked = true;
        }

        log::debug!(
            "allocated {size} bytes of device memory on BO {}, heap {heap_used}/{heap_size}",
            memory.bo.handle(),
        );

        Ok(Arc::new(memory))
    }

    /// Returns the index of the memory type that this memory was allocated from.
    #[inline]
    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    /// Returns the size in bytes of the memory allocation.
    #[inline]
    pub fn allocation_size(&self) -> DeviceSize {
        self.allocation_size
    }

    /// Returns the handle types that can be exported from the memory.
    #[inline]
    pub fn export_handle_types(&self) -> ExternalMemoryHandleTypes {
        self.export_handle_types
    }

    /// Returns the handle type that the memory was imported from, if any.
    #[inline]
    pub fn imported_handle_type(&self) -> Option<ExternalMemoryHandleType> {
        self.imported_handle_type
    }

    #[inline]
    pub fn flags(&self) -> MemoryAllocateFlags {
        self.flags
    }

    /// Returns the buffer object backing the memory, for submission-time residency lists.
    #[inline]
    pub fn buffer_object(&self) -> &Arc<BufferObject> {
        &self.bo
    }

    /// Returns the hardware buffer that the memory was imported from, if any.
    #[inline]
    pub fn hardware_buffer(&self) -> Option<&Arc<dyn HardwareBuffer>> {
        self.hardware_buffer.as_ref()
    }

    /// Returns whether the memory was allocated through the display controller.
    #[inline]
    pub fn is_scanout(&self) -> bool {
        self.dumb_handle.is_some()
    }

    /// Maps the memory and returns a pointer to the byte at `offset`.
    ///
    /// The whole buffer object is mapped, and mapping memory that is already mapped returns the
    /// existing mapping.
    pub fn map(&self, offset: DeviceSize) -> Result<NonNull<c_void>, DeviceMemoryError> {
        if offset >= self.allocation_size {
            return Err(DeviceMemoryError::OffsetOutOfRange {
                offset,
                allocation_size: self.allocation_size,
            });
        }

        let kernel = self.device.physical_device().kernel();
        let ptr = self.bo.map(kernel.as_ref(), self.bo.size())?;

        // SAFETY: `offset` is less than the allocation size, which is no more than the size of
        // the buffer object, so it stays within the mapping.
        Ok(unsafe { ptr.byte_add(offset as usize) })
    }

    /// Unmaps the memory.
    ///
    /// Pointers returned by `map` become dangling, including for other `DeviceMemory` objects
    /// that share the buffer object.
    pub fn unmap(&self) {
        self.bo.unmap(self.device.physical_device().kernel().as_ref());
    }

    /// Exports the memory into a Unix file descriptor. The caller owns the returned file.
    pub fn export_fd(
        &self,
        handle_type: ExternalMemoryHandleType,
    ) -> Result<File, DeviceMemoryError> {
        if !matches!(
            handle_type,
            ExternalMemoryHandleType::OpaqueFd | ExternalMemoryHandleType::DmaBuf
        ) {
            return Err(DeviceMemoryError::HandleTypeNotSupported { handle_type });
        }

        let exportable = self.export_handle_types.contains_enum(handle_type)
            || self.imported_handle_type.is_some_and(|imported| {
                matches!(
                    imported,
                    ExternalMemoryHandleType::OpaqueFd | ExternalMemoryHandleType::DmaBuf
                )
            });

        if !exportable {
            return Err(DeviceMemoryError::HandleTypeNotExportable { handle_type });
        }

        let fd = self
            .device
            .physical_device()
            .kernel()
            .prime_handle_to_fd(self.bo.handle())
            .map_err(|err| {
                log::debug!("failed to export BO {}: {err}", self.bo.handle());
                VulkanError::OutOfDeviceMemory
            })?;

        Ok(File::from(fd))
    }
}

/// Allocates memory that the display controller can scan out: a dumb buffer, exported from the
/// display node and imported into the render node.
fn allocate_scanout(
    device: &Device,
    size: DeviceSize,
) -> Result<(Arc<BufferObject>, u32), VulkanError> {
    let physical_device = device.physical_device();
    let kernel = physical_device.kernel();

    let Some(display) = kernel.display() else {
        log::debug!("scanout memory requested without a display controller");
        return Err(VulkanError::OutOfDeviceMemory);
    };

    let pages = size.div_ceil(physical_device.config().allocation_granularity);
    let height = u32::try_from(pages).map_err(|_| VulkanError::OutOfDeviceMemory)?;

    let dumb = display
        .create_dumb(SCANOUT_DUMB_WIDTH, height, SCANOUT_DUMB_BPP)
        .map_err(|err| {
            log::debug!("failed to create a dumb buffer: {err}");
            VulkanError::OutOfDeviceMemory
        })?;

    let imported = display
        .dumb_handle_to_fd(dumb)
        .map_err(|err| log::debug!("failed to export dumb buffer {dumb}: {err}"))
        .and_then(|fd| {
            physical_device
                .bo_table()
                .import_fd(kernel.as_ref(), fd.as_fd())
                .map_err(|err| log::debug!("failed to import dumb buffer {dumb}: {err}"))
        });

    match imported {
        Ok(bo) => Ok((bo, dumb)),
        Err(()) => {
            if let Err(err) = display.destroy_dumb(dumb) {
                log::warn!("failed to destroy dumb buffer {dumb}: {err}");
            }

            Err(VulkanError::OutOfDeviceMemory)
        }
    }
}

impl Drop for DeviceMemory {
    fn drop(&mut self) {
        let physical_device = self.device.physical_device();
        let kernel = physical_device.kernel();

        log::trace!(
            "freeing {} bytes of device memory on BO {}",
            self.accounted_size,
            self.bo.handle(),
        );

        if self.device_address_tracked {
            self.device.remove_device_address_bo(&self.bo);
        }

        // The dumb buffer goes first, while the render node handle still references it.
        if let Some(dumb) = self.dumb_handle {
            if let Some(display) = kernel.display() {
                if let Err(err) = display.destroy_dumb(dumb) {
                    log::warn!("failed to destroy dumb buffer {dumb}: {err}");
                }
            }
        }

        physical_device
            .bo_table()
            .release(kernel.as_ref(), &self.bo);

        physical_device
            .heap_counter()
            .fetch_sub(self.accounted_size, Ordering::AcqRel);
    }
}

unsafe impl DeviceOwned for DeviceMemory {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl fmt::Debug for DeviceMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceMemory")
            .field("id", &self.id)
            .field("bo", &self.bo.handle())
            .field("allocation_size", &self.allocation_size)
            .field("memory_type_index", &self.memory_type_index)
            .field("export_handle_types", &self.export_handle_types)
            .field("imported_handle_type", &self.imported_handle_type)
            .field("flags", &self.flags)
            .field("dumb_handle", &self.dumb_handle)
            .field("hardware_buffer", &self.hardware_buffer.is_some())
            .finish_non_exhaustive()
    }
}

impl_id_counter!(DeviceMemory);

/// Parameters to allocate a new `DeviceMemory`.
#[derive(Clone, Debug)]
pub struct MemoryAllocateInfo {
    /// The number of bytes to allocate. Rounded up to the allocation granularity.
    ///
    /// Must not be zero, except when importing a hardware buffer, whose size is then used.
    ///
    /// The default value is `0`, which must be overridden.
    pub allocation_size: DeviceSize,

    /// The index of the memory type that should be allocated.
    ///
    /// The default value is `0`.
    pub memory_type_index: u32,

    /// The handle types that can be exported from the allocated memory.
    ///
    /// The default value is [`ExternalMemoryHandleTypes::empty()`].
    pub export_handle_types: ExternalMemoryHandleTypes,

    /// Additional flags for the memory allocation.
    ///
    /// The default value is [`MemoryAllocateFlags::empty()`].
    pub flags: MemoryAllocateFlags,

    /// Allocate the memory through the display controller, so that it can be scanned out. Only
    /// the window system integration sets this.
    ///
    /// The default value is `false`.
    pub for_scanout: bool,

    pub _ne: NonExhaustive,
}

impl Default for MemoryAllocateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            allocation_size: 0,
            memory_type_index: 0,
            export_handle_types: ExternalMemoryHandleTypes::empty(),
            flags: MemoryAllocateFlags::empty(),
            for_scanout: false,
            _ne: NonExhaustive(()),
        }
    }
}

impl MemoryAllocateInfo {
    fn validate(
        &self,
        device: &Device,
        import_info: Option<&MemoryImportInfo>,
    ) -> Result<(), DeviceMemoryError> {
        let memory_type_count = device
            .physical_device()
            .memory_properties()
            .memory_types
            .len() as u32;

        if self.memory_type_index >= memory_type_count {
            return Err(DeviceMemoryError::MemoryTypeIndexOutOfRange {
                memory_type_index: self.memory_type_index,
                memory_type_count,
            });
        }

        let imports_hardware_buffer =
            matches!(import_info, Some(MemoryImportInfo::HardwareBuffer { .. }));

        if self.allocation_size == 0 && !imports_hardware_buffer {
            return Err(DeviceMemoryError::ZeroSize);
        }

        // Hardware buffers can only come from the platform allocator.
        if self
            .export_handle_types
            .intersects(ExternalMemoryHandleTypes::ANDROID_HARDWARE_BUFFER)
            && !imports_hardware_buffer
        {
            return Err(DeviceMemoryError::HandleTypeNotSupported {
                handle_type: ExternalMemoryHandleType::AndroidHardwareBuffer,
            });
        }

        if let Some(MemoryImportInfo::Fd { handle_type, .. }) = import_info {
            if !matches!(
                handle_type,
                ExternalMemoryHandleType::OpaqueFd | ExternalMemoryHandleType::DmaBuf
            ) {
                return Err(DeviceMemoryError::HandleTypeNotSupported {
                    handle_type: *handle_type,
                });
            }
        }

        if self.for_scanout && import_info.is_some() {
            return Err(DeviceMemoryError::ScanoutImport);
        }

        Ok(())
    }
}

/// Parameters to import memory from an external source.
#[derive(Debug)]
pub enum MemoryImportInfo {
    /// Import memory from a Unix file descriptor.
    Fd {
        /// Must be `OpaqueFd` or `DmaBuf`.
        handle_type: ExternalMemoryHandleType,
        file: OwnedFd,
    },

    /// Import memory from a hardware buffer. A reference to the buffer is kept until the memory
    /// is freed.
    HardwareBuffer { buffer: Arc<dyn HardwareBuffer> },
}

vulkan_bitflags! {
    /// Flags specifying additional properties of a device memory allocation.
    MemoryAllocateFlags = MemoryAllocateFlags(u32);

    /// The buffer object is made resident for every submission, so that its GPU address can be
    /// used from shaders.
    DEVICE_ADDRESS = DEVICE_ADDRESS,
}

/// Error that can happen when allocating, importing, mapping or exporting device memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceMemoryError {
    /// The driver returned an error.
    VulkanError(VulkanError),

    /// The memory type index is not less than the number of memory types.
    MemoryTypeIndexOutOfRange {
        memory_type_index: u32,
        memory_type_count: u32,
    },

    /// The allocation size is zero.
    ZeroSize,

    /// The handle type can't be used for this operation.
    HandleTypeNotSupported {
        handle_type: ExternalMemoryHandleType,
    },

    /// The memory was not created exportable to the handle type.
    HandleTypeNotExportable {
        handle_type: ExternalMemoryHandleType,
    },

    /// The offset to map at is not less than the allocation size.
    OffsetOutOfRange {
        offset: DeviceSize,
        allocation_size: DeviceSize,
    },

    /// Scanout memory can't be imported.
    ScanoutImport,
}

impl Error for DeviceMemoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::VulkanError(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceMemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::VulkanError(_) => write!(f, "a runtime error occurred"),
            Self::MemoryTypeIndexOutOfRange {
                memory_type_index,
                memory_type_count,
            } => write!(
                f,
                "the memory type index ({}) is not less than the number of memory types ({})",
                memory_type_index, memory_type_count,
            ),
            Self::ZeroSize => write!(f, "the allocation size is zero"),
            Self::HandleTypeNotSupported { handle_type } => write!(
                f,
                "the handle type {:?} is not supported for this operation",
                handle_type,
            ),
            Self::HandleTypeNotExportable { handle_type } => write!(
                f,
                "the memory was not created exportable to the handle type {:?}",
                handle_type,
            ),
            Self::OffsetOutOfRange {
                offset,
                allocation_size,
            } => write!(
                f,
                "the offset ({}) is not less than the allocation size ({})",
                offset, allocation_size,
            ),
            Self::ScanoutImport => write!(f, "scanout memory can't be imported"),
        }
    }
}

impl From<VulkanError> for DeviceMemoryError {
    #[inline]
    fn from(err: VulkanError) -> Self {
        Self::VulkanError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::{DeviceMemory, DeviceMemoryError, MemoryAllocateFlags, MemoryAllocateInfo};
    use crate::{
        device::{
            physical::{PhysicalDevice, PhysicalDeviceCreateInfo},
            Device, DeviceCreateInfo,
        },
        kernel::{sim::SimKernel, DisplayNode, Kernel, NativeBo, SystemMemory},
        memory::{ExternalMemoryHandleType, ExternalMemoryHandleTypes, MemoryImportInfo},
        DeviceSize, VulkanError,
    };
    use parking_lot::Mutex;
    use std::{
        ffi::c_void,
        io,
        os::fd::{BorrowedFd, OwnedFd},
        ptr::NonNull,
        sync::{atomic::Ordering, Arc},
    };

    type Events = Arc<Mutex<Vec<&'static str>>>;

    /// Forwards to a `SimKernel`, recording the teardown calls and optionally running a hook
    /// when an fd is imported.
    struct RecordingKernel {
        inner: Arc<SimKernel>,
        display: RecordingDisplay,
        events: Events,
        on_import: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    struct RecordingDisplay {
        inner: Arc<SimKernel>,
        events: Events,
    }

    impl RecordingKernel {
        fn new() -> Arc<Self> {
            let inner = Arc::new(SimKernel::with_display(SystemMemory {
                total: 2 << 30,
                available: 1 << 30,
            }));
            let events = Events::default();

            Arc::new(RecordingKernel {
                inner: inner.clone(),
                display: RecordingDisplay {
                    inner,
                    events: events.clone(),
                },
                events,
                on_import: Mutex::new(None),
            })
        }

        fn device(self: &Arc<Self>, heap_size: DeviceSize) -> Arc<Device> {
            let physical_device = PhysicalDevice::new(
                self.clone(),
                PhysicalDeviceCreateInfo {
                    heap_size: Some(heap_size),
                    ..Default::default()
                },
            )
            .unwrap();

            Device::new(physical_device, DeviceCreateInfo::default())
        }
    }

    impl Kernel for RecordingKernel {
        fn create_bo(&self, size: DeviceSize) -> io::Result<NativeBo> {
            self.inner.create_bo(size)
        }

        fn prime_fd_to_handle(&self, fd: BorrowedFd<'_>) -> io::Result<u32> {
            if let Some(hook) = self.on_import.lock().take() {
                hook();
            }

            self.inner.prime_fd_to_handle(fd)
        }

        fn prime_handle_to_fd(&self, handle: u32) -> io::Result<OwnedFd> {
            self.inner.prime_handle_to_fd(handle)
        }

        fn bo_offset(&self, handle: u32) -> io::Result<u64> {
            self.inner.bo_offset(handle)
        }

        fn mmap_bo(&self, handle: u32, size: DeviceSize) -> io::Result<NonNull<c_void>> {
            self.inner.mmap_bo(handle, size)
        }

        unsafe fn munmap_bo(&self, ptr: NonNull<c_void>, size: DeviceSize) -> io::Result<()> {
            unsafe { self.inner.munmap_bo(ptr, size) }
        }

        fn close_bo(&self, handle: u32) -> io::Result<()> {
            self.events.lock().push("close_bo");
            self.inner.close_bo(handle)
        }

        fn display(&self) -> Option<&dyn DisplayNode> {
            Some(&self.display)
        }

        fn system_memory(&self) -> io::Result<SystemMemory> {
            self.inner.system_memory()
        }
    }

    impl DisplayNode for RecordingDisplay {
        fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> io::Result<u32> {
            self.inner.display().unwrap().create_dumb(width, height, bpp)
        }

        fn dumb_handle_to_fd(&self, handle: u32) -> io::Result<OwnedFd> {
            self.inner.display().unwrap().dumb_handle_to_fd(handle)
        }

        fn destroy_dumb(&self, handle: u32) -> io::Result<()> {
            self.events.lock().push("destroy_dumb");
            self.inner.display().unwrap().destroy_dumb(handle)
        }
    }

    fn allocate_info(allocation_size: u64) -> MemoryAllocateInfo {
        MemoryAllocateInfo {
            allocation_size,
            ..Default::default()
        }
    }

    #[test]
    fn basic_create() {
        let (device, _) = sim_device!();
        let memory = DeviceMemory::allocate(device, allocate_info(256)).unwrap();

        assert_eq!(memory.allocation_size(), 256);
        assert_eq!(memory.buffer_object().size(), 4096);
    }

    #[test]
    fn zero_size() {
        let (device, _) = sim_device!();

        assert_eq!(
            DeviceMemory::allocate(device, allocate_info(0)).unwrap_err(),
            DeviceMemoryError::ZeroSize,
        );
    }

    #[test]
    fn memory_type_out_of_range() {
        let (device, _) = sim_device!();
        let info = MemoryAllocateInfo {
            memory_type_index: 1,
            ..allocate_info(4096)
        };

        assert!(matches!(
            DeviceMemory::allocate(device, info),
            Err(DeviceMemoryError::MemoryTypeIndexOutOfRange { .. }),
        ));
    }

    #[test]
    fn oversized_allocation() {
        let (device, _) = sim_device!(heap_size: 1 << 40);
        let max = device.physical_device().config().max_allocation_size;

        assert_eq!(
            DeviceMemory::allocate(device, allocate_info(max + 1)).unwrap_err(),
            DeviceMemoryError::VulkanError(VulkanError::OutOfDeviceMemory),
        );
    }

    #[test]
    fn heap_conservation() {
        let (device, kernel) = sim_device!(heap_size: 64 * 4096);
        let physical_device = device.physical_device().clone();

        let mut live = Vec::new();

        loop {
            let before = physical_device.heap_used();

            match DeviceMemory::allocate(device.clone(), allocate_info(3 * 4096 + 1)) {
                Ok(memory) => live.push(memory),
                Err(err) => {
                    assert_eq!(
                        err,
                        DeviceMemoryError::VulkanError(VulkanError::OutOfDeviceMemory),
                    );
                    assert_eq!(physical_device.heap_used(), before);
                    break;
                }
            }
        }

        assert_eq!(live.len(), 16);
        assert_eq!(physical_device.heap_used(), 64 * 4096);
        assert_eq!(kernel.bo_count(), 16);

        live.truncate(5);
        assert_eq!(physical_device.heap_used(), 5 * 4 * 4096);

        live.clear();
        assert_eq!(physical_device.heap_used(), 0);
        assert_eq!(kernel.bo_count(), 0);
    }

    #[test]
    fn import_aliasing() {
        let (device, kernel) = sim_device!();

        let info = MemoryAllocateInfo {
            export_handle_types: ExternalMemoryHandleTypes::DMA_BUF,
            ..allocate_info(4096)
        };
        let exported = DeviceMemory::allocate(device.clone(), info).unwrap();

        let fd1 = exported.export_fd(ExternalMemoryHandleType::DmaBuf).unwrap();
        let fd2 = exported.export_fd(ExternalMemoryHandleType::DmaBuf).unwrap();
        drop(exported);
        assert_eq!(kernel.bo_count(), 0);

        let import = |file: std::fs::File| {
            DeviceMemory::import(
                device.clone(),
                allocate_info(4096),
                MemoryImportInfo::Fd {
                    handle_type: ExternalMemoryHandleType::DmaBuf,
                    file: file.into(),
                },
            )
            .unwrap()
        };
        let a = import(fd1);
        let b = import(fd2);

        assert_eq!(a.buffer_object().handle(), b.buffer_object().handle());
        assert!(Arc::ptr_eq(a.buffer_object(), b.buffer_object()));
        assert_eq!(a.buffer_object().refcount(), 2);
        assert_eq!(kernel.bo_count(), 1);

        unsafe {
            a.map(64).unwrap().cast::<u32>().write(0x7a67_7a67);
            assert_eq!(b.map(64).unwrap().cast::<u32>().read(), 0x7a67_7a67);
        }

        drop(a);
        assert_eq!(b.buffer_object().refcount(), 1);
        assert_eq!(kernel.bo_count(), 1);

        drop(b);
        assert_eq!(kernel.bo_count(), 0);
        assert_eq!(device.physical_device().heap_used(), 0);
    }

    #[test]
    fn undersized_import() {
        let (device, kernel) = sim_device!();

        let file = crate::kernel::sim::create_memfd(c"small", 4096).unwrap();
        let result = DeviceMemory::import(
            device.clone(),
            allocate_info(8192),
            MemoryImportInfo::Fd {
                handle_type: ExternalMemoryHandleType::DmaBuf,
                file: file.into(),
            },
        );

        assert_eq!(
            result.unwrap_err(),
            DeviceMemoryError::VulkanError(VulkanError::InvalidExternalHandle),
        );
        assert_eq!(kernel.bo_count(), 0);
        assert_eq!(device.physical_device().heap_used(), 0);
    }

    #[test]
    fn map_idempotence() {
        let (device, _) = sim_device!();
        let memory = DeviceMemory::allocate(device, allocate_info(8192)).unwrap();

        let a = memory.map(0).unwrap();
        let b = memory.map(0).unwrap();
        assert_eq!(a, b);
        assert_eq!(memory.map(4096).unwrap().as_ptr() as usize, a.as_ptr() as usize + 4096);
        assert!(memory.buffer_object().is_mapped());

        assert!(matches!(
            memory.map(8192),
            Err(DeviceMemoryError::OffsetOutOfRange { .. }),
        ));

        memory.unmap();
        assert!(!memory.buffer_object().is_mapped());
        memory.unmap();
    }

    #[test]
    fn export_requires_handle_type() {
        let (device, _) = sim_device!();
        let memory = DeviceMemory::allocate(device, allocate_info(4096)).unwrap();

        assert_eq!(
            memory
                .export_fd(ExternalMemoryHandleType::OpaqueFd)
                .unwrap_err(),
            DeviceMemoryError::HandleTypeNotExportable {
                handle_type: ExternalMemoryHandleType::OpaqueFd,
            },
        );
        assert_eq!(
            memory
                .export_fd(ExternalMemoryHandleType::AndroidHardwareBuffer)
                .unwrap_err(),
            DeviceMemoryError::HandleTypeNotSupported {
                handle_type: ExternalMemoryHandleType::AndroidHardwareBuffer,
            },
        );
    }

    #[test]
    fn scanout_teardown() {
        let (device, kernel) = sim_device!(display: true);
        let info = MemoryAllocateInfo {
            for_scanout: true,
            ..allocate_info(3 * 4096)
        };

        let memory = DeviceMemory::allocate(device.clone(), info.clone()).unwrap();
        let display = kernel.sim_display().unwrap();
        assert!(memory.is_scanout());
        assert_eq!(display.dumb_count(), 1);
        assert_eq!(memory.buffer_object().size(), 3 * 4096);

        drop(memory);
        assert_eq!(display.dumb_count(), 0);
        assert_eq!(kernel.bo_count(), 0);

        let (device, _) = sim_device!();
        assert_eq!(
            DeviceMemory::allocate(device, info).unwrap_err(),
            DeviceMemoryError::VulkanError(VulkanError::OutOfDeviceMemory),
        );
    }

    #[test]
    fn scanout_teardown_order() {
        let kernel = RecordingKernel::new();
        let device = kernel.device(64 << 20);
        let info = MemoryAllocateInfo {
            for_scanout: true,
            ..allocate_info(4096)
        };

        let memory = DeviceMemory::allocate(device, info).unwrap();
        kernel.events.lock().clear();

        drop(memory);
        assert_eq!(*kernel.events.lock(), ["destroy_dumb", "close_bo"]);
        assert_eq!(kernel.inner.sim_display().unwrap().dumb_count(), 0);
        assert_eq!(kernel.inner.bo_count(), 0);
    }

    #[test]
    fn device_address_residency() {
        let (device, _) = sim_device!();
        let info = MemoryAllocateInfo {
            flags: MemoryAllocateFlags::DEVICE_ADDRESS,
            ..allocate_info(4096)
        };

        let a = DeviceMemory::allocate(device.clone(), info.clone()).unwrap();
        let b = DeviceMemory::allocate(device.clone(), info).unwrap();
        let _c = DeviceMemory::allocate(device.clone(), allocate_info(4096)).unwrap();

        let handles = device.device_address_bo_handles();
        assert_eq!(handles.len(), 2);
        assert!(handles.contains(&a.buffer_object().handle()));

        drop(a);
        assert_eq!(
            device.device_address_bo_handles(),
            [b.buffer_object().handle()],
        );
    }

    #[test]
    fn device_address_rollback() {
        let kernel = RecordingKernel::new();
        let device = kernel.device(4 * 4096);
        let physical_device = device.physical_device().clone();

        let info = MemoryAllocateInfo {
            export_handle_types: ExternalMemoryHandleTypes::DMA_BUF,
            flags: MemoryAllocateFlags::DEVICE_ADDRESS,
            ..allocate_info(4096)
        };
        let live = DeviceMemory::allocate(device.clone(), info.clone()).unwrap();
        let file = live.export_fd(ExternalMemoryHandleType::DmaBuf).unwrap();

        // Fills the heap between the up-front check and the accounting of the import.
        let heap = physical_device.clone();
        *kernel.on_import.lock() = Some(Box::new(move || {
            heap.heap_counter().fetch_add(4 * 4096, Ordering::AcqRel);
        }));

        let result = DeviceMemory::import(
            device.clone(),
            info,
            MemoryImportInfo::Fd {
                handle_type: ExternalMemoryHandleType::DmaBuf,
                file: file.into(),
            },
        );
        assert_eq!(
            result.unwrap_err(),
            DeviceMemoryError::VulkanError(VulkanError::OutOfDeviceMemory),
        );

        physical_device
            .heap_counter()
            .fetch_sub(4 * 4096, Ordering::AcqRel);
        assert_eq!(physical_device.heap_used(), 4096);
        assert_eq!(live.buffer_object().refcount(), 1);
        assert_eq!(
            device.device_address_bo_handles(),
            [live.buffer_object().handle()],
        );

        drop(live);
        assert!(device.device_address_bo_handles().is_empty());
        assert_eq!(kernel.inner.bo_count(), 0);
    }
}

// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! An in-process kernel driver.
//!
//! Every buffer object is a memfd, so exported buffers are real file descriptors that can be
//! passed around, mapped and imported again. Like a real render node, importing the same memfd
//! twice yields the same handle: objects are keyed by the device and inode of the file.

use super::{DisplayNode, Kernel, NativeBo, SystemMemory};
use crate::DeviceSize;
use foldhash::fast::RandomState;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    ffi::{c_void, CStr},
    fs::File,
    io,
    os::{
        fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd},
        unix::fs::MetadataExt,
    },
    ptr::{self, NonNull},
};

/// GPU addresses start above the null page.
const FIRST_OFFSET: u64 = 4096;

const PAGE_SIZE: u64 = 4096;

/// A simulated render node.
pub struct SimKernel {
    state: Mutex<SimState>,
    system_memory: SystemMemory,
    display: Option<SimDisplay>,
}

#[derive(Default)]
struct SimState {
    next_handle: u32,
    next_offset: u64,
    objects: HashMap<u32, SimObject, RandomState>,
    handles_by_inode: HashMap<(u64, u64), u32, RandomState>,
}

struct SimObject {
    file: File,
    offset: u64,
    inode: (u64, u64),
}

impl SimKernel {
    /// Creates a render node on a system with `system_memory`, without a display controller.
    pub fn new(system_memory: SystemMemory) -> Self {
        SimKernel {
            state: Mutex::new(SimState {
                next_handle: 1,
                next_offset: FIRST_OFFSET,
                ..Default::default()
            }),
            system_memory,
            display: None,
        }
    }

    /// Creates a render node with a display controller.
    pub fn with_display(system_memory: SystemMemory) -> Self {
        SimKernel {
            display: Some(SimDisplay::new()),
            ..Self::new(system_memory)
        }
    }

    /// Returns the number of open GEM handles.
    pub fn bo_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Returns the simulated display controller.
    pub fn sim_display(&self) -> Option<&SimDisplay> {
        self.display.as_ref()
    }
}

impl Kernel for SimKernel {
    fn create_bo(&self, size: DeviceSize) -> io::Result<NativeBo> {
        if size == 0 {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }

        let file = create_memfd(c"vkimage-bo", size)?;
        let inode = inode_of(&file)?;

        let mut state = self.state.lock();
        let handle = state.insert(file, inode, size);

        Ok(NativeBo {
            handle,
            offset: state.objects[&handle].offset,
        })
    }

    fn prime_fd_to_handle(&self, fd: BorrowedFd<'_>) -> io::Result<u32> {
        let file = File::from(fd.try_clone_to_owned()?);
        let inode = inode_of(&file)?;

        let mut state = self.state.lock();

        if let Some(&handle) = state.handles_by_inode.get(&inode) {
            return Ok(handle);
        }

        let size = file.metadata()?.len();

        Ok(state.insert(file, inode, size))
    }

    fn prime_handle_to_fd(&self, handle: u32) -> io::Result<OwnedFd> {
        let state = self.state.lock();
        let object = state.get(handle)?;

        object.file.as_fd().try_clone_to_owned()
    }

    fn bo_offset(&self, handle: u32) -> io::Result<u64> {
        Ok(self.state.lock().get(handle)?.offset)
    }

    fn mmap_bo(&self, handle: u32, size: DeviceSize) -> io::Result<NonNull<c_void>> {
        let state = self.state.lock();
        let object = state.get(handle)?;
        let len = usize::try_from(size).map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;

        // SAFETY: A fresh shared mapping of a file we own doesn't alias any Rust object.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                object.file.as_raw_fd(),
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        NonNull::new(ptr).ok_or_else(|| io::Error::from_raw_os_error(libc::ENOMEM))
    }

    unsafe fn munmap_bo(&self, ptr: NonNull<c_void>, size: DeviceSize) -> io::Result<()> {
        // SAFETY: The caller guarantees that the mapping came from `mmap_bo`.
        if unsafe { libc::munmap(ptr.as_ptr(), size as usize) } != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    fn close_bo(&self, handle: u32) -> io::Result<()> {
        let mut state = self.state.lock();
        let object = state
            .objects
            .remove(&handle)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))?;
        state.handles_by_inode.remove(&object.inode);

        Ok(())
    }

    fn display(&self) -> Option<&dyn DisplayNode> {
        self.display.as_ref().map(|display| display as &dyn DisplayNode)
    }

    fn system_memory(&self) -> io::Result<SystemMemory> {
        Ok(self.system_memory)
    }
}

impl SimState {
    fn insert(&mut self, file: File, inode: (u64, u64), size: DeviceSize) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;

        let offset = self.next_offset;
        self.next_offset += size.next_multiple_of(PAGE_SIZE);

        self.objects.insert(
            handle,
            SimObject {
                file,
                offset,
                inode,
            },
        );
        self.handles_by_inode.insert(inode, handle);

        handle
    }

    fn get(&self, handle: u32) -> io::Result<&SimObject> {
        self.objects
            .get(&handle)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
    }
}

/// A simulated display controller.
pub struct SimDisplay {
    dumb_buffers: Mutex<HashMap<u32, File, RandomState>>,
    next_handle: Mutex<u32>,
}

impl SimDisplay {
    fn new() -> Self {
        SimDisplay {
            dumb_buffers: Mutex::new(HashMap::default()),
            next_handle: Mutex::new(1),
        }
    }

    /// Returns the number of dumb buffers that haven't been destroyed.
    pub fn dumb_count(&self) -> usize {
        self.dumb_buffers.lock().len()
    }
}

impl DisplayNode for SimDisplay {
    fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> io::Result<u32> {
        let size = width as u64 * height as u64 * bpp.div_ceil(8) as u64;

        if size == 0 {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }

        let file = create_memfd(c"vkimage-dumb", size)?;

        let handle = {
            let mut next_handle = self.next_handle.lock();
            let handle = *next_handle;
            *next_handle += 1;
            handle
        };
        self.dumb_buffers.lock().insert(handle, file);

        Ok(handle)
    }

    fn dumb_handle_to_fd(&self, handle: u32) -> io::Result<OwnedFd> {
        let dumb_buffers = self.dumb_buffers.lock();
        let file = dumb_buffers
            .get(&handle)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))?;

        file.as_fd().try_clone_to_owned()
    }

    fn destroy_dumb(&self, handle: u32) -> io::Result<()> {
        self.dumb_buffers
            .lock()
            .remove(&handle)
            .map(drop)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
    }
}

/// Creates an anonymous shared memory file of `size` bytes.
pub fn create_memfd(name: &CStr, size: u64) -> io::Result<File> {
    // SAFETY: `name` is a valid C string.
    let fd = unsafe { libc::memfd_create(name.as_ptr(), libc::MFD_CLOEXEC) };

    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: `memfd_create` returned a new file descriptor that nothing else owns.
    let file = File::from(unsafe { OwnedFd::from_raw_fd(fd) });
    file.set_len(size)?;

    Ok(file)
}

fn inode_of(file: &File) -> io::Result<(u64, u64)> {
    let metadata = file.metadata()?;

    Ok((metadata.dev(), metadata.ino()))
}

#[cfg(test)]
mod tests {
    use super::{create_memfd, SimKernel};
    use crate::kernel::{Kernel, SystemMemory};
    use std::os::fd::AsFd;

    const MEMORY: SystemMemory = SystemMemory {
        total: 1 << 30,
        available: 1 << 29,
    };

    #[test]
    fn create_and_close() {
        let kernel = SimKernel::new(MEMORY);
        let a = kernel.create_bo(100).unwrap();
        let b = kernel.create_bo(4096).unwrap();

        assert_ne!(a.handle, b.handle);
        assert_eq!(a.offset, 4096);
        assert_eq!(b.offset, 8192);
        assert_eq!(kernel.bo_offset(b.handle).unwrap(), 8192);
        assert_eq!(kernel.bo_count(), 2);

        kernel.close_bo(a.handle).unwrap();
        assert!(kernel.close_bo(a.handle).is_err());
        assert!(kernel.bo_offset(a.handle).is_err());
        assert_eq!(kernel.bo_count(), 1);
    }

    #[test]
    fn prime_aliasing() {
        let kernel = SimKernel::new(MEMORY);
        let bo = kernel.create_bo(4096).unwrap();

        let fd1 = kernel.prime_handle_to_fd(bo.handle).unwrap();
        let fd2 = kernel.prime_handle_to_fd(bo.handle).unwrap();
        assert_eq!(kernel.prime_fd_to_handle(fd1.as_fd()).unwrap(), bo.handle);
        assert_eq!(kernel.prime_fd_to_handle(fd2.as_fd()).unwrap(), bo.handle);

        let foreign = create_memfd(c"foreign", 8192).unwrap();
        let handle = kernel.prime_fd_to_handle(foreign.as_fd()).unwrap();
        assert_ne!(handle, bo.handle);
        assert_eq!(kernel.prime_fd_to_handle(foreign.as_fd()).unwrap(), handle);
        assert_eq!(kernel.bo_count(), 2);
    }

    #[test]
    fn shared_mappings() {
        let kernel = SimKernel::new(MEMORY);
        let bo = kernel.create_bo(4096).unwrap();
        let a = kernel.mmap_bo(bo.handle, 4096).unwrap();
        let b = kernel.mmap_bo(bo.handle, 4096).unwrap();

        unsafe {
            a.cast::<u32>().write(0xdead_beef);
            assert_eq!(b.cast::<u32>().read(), 0xdead_beef);
            kernel.munmap_bo(a, 4096).unwrap();
            kernel.munmap_bo(b, 4096).unwrap();
        }
    }

    #[test]
    fn dumb_buffers() {
        let kernel = SimKernel::with_display(MEMORY);
        let display = kernel.display().unwrap();

        let dumb = display.create_dumb(1024, 4, 32).unwrap();
        let fd = display.dumb_handle_to_fd(dumb).unwrap();
        let handle = kernel.prime_fd_to_handle(fd.as_fd()).unwrap();
        let ptr = kernel.mmap_bo(handle, 16384).unwrap();
        unsafe { kernel.munmap_bo(ptr, 16384) }.unwrap();

        assert_eq!(kernel.sim_display().unwrap().dumb_count(), 1);
        display.destroy_dumb(dumb).unwrap();
        assert!(display.destroy_dumb(dumb).is_err());
        assert_eq!(kernel.sim_display().unwrap().dumb_count(), 0);

        assert!(SimKernel::new(MEMORY).display().is_none());
    }
}

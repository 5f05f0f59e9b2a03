// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The interface to the kernel driver.
//!
//! All native allocations go through a [`Kernel`], which stands for the GPU's DRM render node.
//! Scanout buffers are allocated through the [`DisplayNode`] of the display controller, which is
//! a separate device. Errors are reported as [`io::Error`]s carrying the errno of the failing
//! call.
//!
//! The [`sim`] module implements both on top of memfds, so that everything above this layer can
//! run without the hardware.

use crate::DeviceSize;
use std::{
    ffi::c_void,
    io,
    os::fd::{BorrowedFd, OwnedFd},
    ptr::NonNull,
};

pub mod sim;

/// A buffer object freshly created by the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeBo {
    /// The GEM handle, unique per render node file description.
    pub handle: u32,

    /// The address of the buffer in the GPU's address space.
    pub offset: u64,
}

/// The amount of system RAM, in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemMemory {
    pub total: u64,
    pub available: u64,
}

/// The GPU's render node.
pub trait Kernel: Send + Sync {
    /// Creates a buffer object of `size` bytes.
    fn create_bo(&self, size: DeviceSize) -> io::Result<NativeBo>;

    /// Imports a dma-buf. Importing the same underlying buffer again, through any file
    /// descriptor, returns the same handle.
    fn prime_fd_to_handle(&self, fd: BorrowedFd<'_>) -> io::Result<u32>;

    /// Exports a buffer object as a dma-buf.
    fn prime_handle_to_fd(&self, handle: u32) -> io::Result<OwnedFd>;

    /// Returns the GPU address of a buffer object.
    fn bo_offset(&self, handle: u32) -> io::Result<u64>;

    /// Maps the first `size` bytes of a buffer object into the address space of the process.
    fn mmap_bo(&self, handle: u32, size: DeviceSize) -> io::Result<NonNull<c_void>>;

    /// Unmaps a mapping returned by `mmap_bo`.
    ///
    /// # Safety
    ///
    /// - `ptr` and `size` must come from a single successful call to `mmap_bo`, and nothing may
    ///   access the mapping afterwards.
    unsafe fn munmap_bo(&self, ptr: NonNull<c_void>, size: DeviceSize) -> io::Result<()>;

    /// Closes a GEM handle.
    fn close_bo(&self, handle: u32) -> io::Result<()>;

    /// Returns the display controller, if there is one.
    fn display(&self) -> Option<&dyn DisplayNode>;

    /// Returns the amount of system RAM.
    fn system_memory(&self) -> io::Result<SystemMemory>;
}

/// The display controller's primary node. Only it can allocate memory that can be scanned out.
pub trait DisplayNode: Send + Sync {
    /// Creates a dumb buffer of `width` x `height` pixels of `bpp` bits.
    fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> io::Result<u32>;

    /// Exports a dumb buffer as a dma-buf.
    fn dumb_handle_to_fd(&self, handle: u32) -> io::Result<OwnedFd>;

    /// Destroys a dumb buffer.
    fn destroy_dumb(&self, handle: u32) -> io::Result<()>;
}

// Copyright (c) 2021 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::HardwareConfig;
use crate::{
    buffer::ExternalBufferProperties,
    format::{
        self, buffer_format_features, image_format_features, DrmFormatModifierProperties,
        FormatFeatures, FormatProperties,
    },
    image::{
        max_mip_levels, ImageAspects, ImageCreateFlags, ImageFormatInfo, ImageFormatProperties,
        ImageTiling, ImageType, ImageUsage, SampleCounts,
    },
    kernel::{Kernel, SystemMemory},
    memory::{
        bo::{fd_size, BoTable},
        ExternalMemoryHandleType, ExternalMemoryProperties, MemoryHeap, MemoryHeapFlags,
        MemoryProperties, MemoryPropertyFlags, MemoryType,
    },
    DeviceSize, Format, NonExhaustive, VulkanError,
};
use std::{
    fmt,
    num::NonZero,
    os::fd::BorrowedFd,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

const GIB: u64 = 1 << 30;

/// Represents one GPU and the kernel driver that runs it.
///
/// The physical device owns the state that every allocation on the GPU shares: how many bytes of
/// the heap are in use, and which buffer objects are open.
pub struct PhysicalDevice {
    id: NonZero<u64>,
    kernel: Arc<dyn Kernel>,
    config: HardwareConfig,
    memory_properties: MemoryProperties,

    heap_used: AtomicU64,
    bo_table: BoTable,
}

impl PhysicalDevice {
    /// Creates a physical device on top of `kernel`.
    ///
    /// If `create_info.heap_size` is `None`, the heap size is derived from the amount of system
    /// RAM, which fails with [`VulkanError::InitializationFailed`] if the kernel can't report it.
    pub fn new(
        kernel: Arc<dyn Kernel>,
        create_info: PhysicalDeviceCreateInfo,
    ) -> Result<Arc<PhysicalDevice>, VulkanError> {
        let PhysicalDeviceCreateInfo {
            config,
            heap_size,
            _ne: _,
        } = create_info;

        let heap_size = match heap_size {
            Some(heap_size) => heap_size,
            None => {
                let system_memory = kernel.system_memory().map_err(|err| {
                    log::debug!("failed to query the amount of system memory: {err}");
                    VulkanError::InitializationFailed
                })?;

                compute_heap_size(system_memory)
            }
        };

        log::debug!("physical device heap: {heap_size} bytes");

        let memory_properties = MemoryProperties {
            memory_types: vec![MemoryType {
                property_flags: MemoryPropertyFlags::DEVICE_LOCAL
                    | MemoryPropertyFlags::HOST_VISIBLE
                    | MemoryPropertyFlags::HOST_COHERENT
                    | MemoryPropertyFlags::HOST_CACHED,
                heap_index: 0,
            }],
            memory_heaps: vec![MemoryHeap {
                size: heap_size,
                flags: MemoryHeapFlags::DEVICE_LOCAL,
            }],
        };

        Ok(Arc::new(PhysicalDevice {
            id: Self::next_id(),
            kernel,
            config,
            memory_properties,
            heap_used: AtomicU64::new(0),
            bo_table: BoTable::default(),
        }))
    }

    /// Returns the kernel driver of the GPU.
    #[inline]
    pub fn kernel(&self) -> &Arc<dyn Kernel> {
        &self.kernel
    }

    /// Returns the hardware configuration of the GPU.
    #[inline]
    pub fn config(&self) -> &HardwareConfig {
        &self.config
    }

    #[inline]
    pub fn memory_properties(&self) -> &MemoryProperties {
        &self.memory_properties
    }

    /// Returns the size of the only memory heap.
    #[inline]
    pub fn heap_size(&self) -> DeviceSize {
        self.memory_properties.memory_heaps[0].size
    }

    /// Returns the number of heap bytes currently allocated.
    #[inline]
    pub fn heap_used(&self) -> DeviceSize {
        self.heap_used.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn heap_counter(&self) -> &AtomicU64 {
        &self.heap_used
    }

    #[inline]
    pub(crate) fn bo_table(&self) -> &BoTable {
        &self.bo_table
    }

    /// Returns the number of buffer objects that are open.
    #[inline]
    pub fn buffer_object_count(&self) -> usize {
        self.bo_table.len()
    }

    /// Returns how many bytes of the heap the application can expect to use in total, including
    /// what is already allocated.
    ///
    /// The budget doesn't promise more than 90% of the system memory that is still available, so
    /// that the application doesn't starve the rest of the system.
    pub fn memory_budget(&self) -> DeviceSize {
        let heap_size = self.heap_size();

        match self.kernel.system_memory() {
            Ok(SystemMemory { available, .. }) => {
                heap_size.min(self.heap_used() + available / 10 * 9)
            }
            Err(err) => {
                log::debug!("failed to query the available system memory: {err}");
                heap_size
            }
        }
    }

    /// Retrieves the properties of a format when used by this physical device.
    pub fn format_properties(&self, format: Format) -> FormatProperties {
        let config = &self.config;
        let plane_count = format::plane_count(format);

        let drm_format_modifier_properties = config
            .modifiers
            .iter()
            .filter_map(|info| {
                let features = image_format_features(
                    config,
                    format,
                    ImageTiling::DrmFormatModifier,
                    Some(info.modifier),
                );

                (!features.is_empty()).then(|| DrmFormatModifierProperties {
                    drm_format_modifier: info.modifier,
                    drm_format_modifier_plane_count: info.memory_plane_count(plane_count),
                    drm_format_modifier_tiling_features: features,
                })
            })
            .collect();

        FormatProperties {
            linear_tiling_features: image_format_features(
                config,
                format,
                ImageTiling::Linear,
                None,
            ),
            optimal_tiling_features: image_format_features(
                config,
                format,
                ImageTiling::Optimal,
                None,
            ),
            buffer_features: buffer_format_features(config, format),
            drm_format_modifier_properties,
            _ne: NonExhaustive(()),
        }
    }

    /// Returns the properties supported for images with a given image configuration.
    ///
    /// Fails with [`VulkanError::FormatNotSupported`] if the configuration is not supported.
    pub fn image_format_properties(
        &self,
        image_format_info: ImageFormatInfo,
    ) -> Result<ImageFormatProperties, VulkanError> {
        let ImageFormatInfo {
            flags,
            format,
            image_type,
            tiling,
            usage,
            drm_format_modifier,
            external_memory_handle_type,
            _ne: _,
        } = image_format_info;

        let config = &self.config;
        let unsupported = |reason: &str| {
            log::debug!("{format:?} with {tiling:?} tiling is not supported: {reason}");
            Err(VulkanError::FormatNotSupported)
        };

        let Some(desc) = format::descriptor(format) else {
            return unsupported("unknown format");
        };

        let features = image_format_features(config, format, tiling, drm_format_modifier);

        if features.is_empty() {
            return unsupported("no features");
        }

        // Uncompressed views of compressed images need the driver to lie to the texture unit.
        if flags.intersects(ImageCreateFlags::BLOCK_TEXEL_VIEW_COMPATIBLE) {
            return unsupported("block texel view compatibility");
        }

        if flags.intersects(ImageCreateFlags::DISJOINT)
            && !features.intersects(FormatFeatures::DISJOINT)
        {
            return unsupported("disjoint planes");
        }

        let is_depth_stencil = desc
            .aspects()
            .intersects(ImageAspects::DEPTH | ImageAspects::STENCIL);

        if !usage.is_supported_by(features) {
            return unsupported("usage without the matching feature");
        }

        // 1D images are always raster, and raster depth/stencil can't be sampled or blitted from.
        if image_type == ImageType::Dim1d
            && is_depth_stencil
            && usage.intersects(ImageUsage::TRANSFER_SRC | ImageUsage::SAMPLED)
        {
            return unsupported("sampling a 1D depth/stencil image");
        }

        if usage.intersects(ImageUsage::STORAGE)
            && !desc.planes()[0].encoding.is_power_of_two_sized()
        {
            return unsupported("storage of a texel size that isn't a power of two");
        }

        let base_encoding = desc.planes()[0].encoding;

        if image_type == ImageType::Dim1d && base_encoding.is_compressed() {
            return unsupported("1D compressed image");
        }

        let (max_extent, mut max_array_layers) = match image_type {
            ImageType::Dim1d => (
                [config.max_image_dimension_1d, 1, 1],
                config.max_image_array_layers,
            ),
            ImageType::Dim2d => (
                [config.max_image_dimension_2d, config.max_image_dimension_2d, 1],
                config.max_image_array_layers,
            ),
            ImageType::Dim3d => (
                [
                    config.max_image_dimension_3d,
                    config.max_image_dimension_3d,
                    config.max_image_dimension_3d,
                ],
                1,
            ),
        };
        let mut max_mip_levels = max_mip_levels(max_extent);
        let mut sample_counts = SampleCounts::SAMPLE_1;

        let attachment = FormatFeatures::COLOR_ATTACHMENT | FormatFeatures::DEPTH_STENCIL_ATTACHMENT;

        if config.multisample
            && tiling == ImageTiling::Optimal
            && image_type == ImageType::Dim2d
            && !flags.intersects(ImageCreateFlags::CUBE_COMPATIBLE)
            && !usage.intersects(ImageUsage::STORAGE)
            && features.intersects(attachment)
            && (is_depth_stencil || base_encoding.supports_multisampling(config.version))
        {
            sample_counts |= SampleCounts::SAMPLE_4;
        }

        match tiling {
            ImageTiling::Linear => max_mip_levels = 1,
            ImageTiling::DrmFormatModifier => {
                if image_type != ImageType::Dim2d {
                    return unsupported("a DRM format modifier on an image that isn't 2D");
                }

                max_mip_levels = 1;
                max_array_layers = 1;
                sample_counts = SampleCounts::SAMPLE_1;
            }
            ImageTiling::Optimal => (),
        }

        if desc.is_ycbcr() {
            max_mip_levels = 1;
            max_array_layers = 1;
            sample_counts = SampleCounts::SAMPLE_1;
        }

        let external_memory_properties = match external_memory_handle_type {
            Some(handle_type) => match ExternalMemoryProperties::of(handle_type) {
                Some(properties) => properties,
                None => return unsupported("external memory handle type"),
            },
            None => ExternalMemoryProperties::default(),
        };

        Ok(ImageFormatProperties {
            max_extent,
            max_mip_levels,
            max_array_layers,
            sample_counts,
            max_resource_size: config.max_resource_size,
            external_memory_properties,
            combined_image_sampler_descriptor_count: desc.plane_count(),
        })
    }

    /// Retrieves the external handle properties supported for buffers with a given handle type.
    pub fn external_buffer_properties(
        &self,
        handle_type: ExternalMemoryHandleType,
    ) -> ExternalBufferProperties {
        ExternalBufferProperties {
            external_memory_properties: ExternalMemoryProperties::of(handle_type)
                .unwrap_or_default(),
        }
    }

    /// Returns the memory types that a file descriptor of `handle_type` can be imported into.
    pub fn memory_fd_properties(
        &self,
        handle_type: ExternalMemoryHandleType,
        fd: BorrowedFd<'_>,
    ) -> Result<u32, VulkanError> {
        if handle_type != ExternalMemoryHandleType::DmaBuf {
            return Err(VulkanError::InvalidExternalHandle);
        }

        fd_size(fd).map_err(|_| VulkanError::InvalidExternalHandle)?;

        Ok((1u32 << self.memory_properties.memory_types.len()) - 1)
    }
}

/// Returns the heap size for a system with `system_memory`: half of the RAM on systems with up
/// to 4 GiB, three quarters of it above that, but never more than the 4 GiB that the GPU can
/// address.
fn compute_heap_size(system_memory: SystemMemory) -> DeviceSize {
    let total = system_memory.total;

    if total <= 4 * GIB {
        total / 2
    } else {
        (total / 4 * 3).min(4 * GIB)
    }
}

impl fmt::Debug for PhysicalDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("PhysicalDevice")
            .field("id", &self.id)
            .field("version", &self.config.version)
            .field("heap_size", &self.heap_size())
            .field("heap_used", &self.heap_used())
            .finish_non_exhaustive()
    }
}

crate::macros::impl_id_counter!(PhysicalDevice);

/// Parameters to create a new `PhysicalDevice`.
#[derive(Clone, Debug)]
pub struct PhysicalDeviceCreateInfo {
    /// The hardware configuration of the GPU.
    ///
    /// The default value is [`HardwareConfig::v3d_4_2()`].
    pub config: HardwareConfig,

    /// The size of the device memory heap.
    ///
    /// The default value is `None`, which derives the size from the amount of system RAM.
    pub heap_size: Option<DeviceSize>,

    pub _ne: NonExhaustive,
}

impl Default for PhysicalDeviceCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            config: HardwareConfig::v3d_4_2(),
            heap_size: None,
            _ne: NonExhaustive(()),
        }
    }
}

// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Interop with Android hardware buffers.
//!
//! A hardware buffer is allocated by the platform's buffer allocator (gralloc), which is the only
//! one that knows how the planes of the buffer are laid out. Before an image can be bound to
//! memory imported from a hardware buffer, the layout reported by gralloc is translated into an
//! [`ExplicitLayout`]: a DRM format modifier with one offset and row pitch per plane, which the
//! image layout planner then validates like any application-provided layout.

use crate::{
    device::Device,
    drm::DRM_FORMAT_YVU420,
    format::{ChromaLocation, FormatFeatures, SamplerYcbcrModelConversion, SamplerYcbcrRange},
    image::SubresourceLayout,
    memory::bo::fd_size,
    DeviceSize, Format, VulkanError,
};
use smallvec::SmallVec;
use std::{
    fmt, io,
    os::fd::{AsFd, OwnedFd},
};

/// Maximum number of planes gralloc reports for a buffer.
pub const MAX_GRALLOC_PLANES: usize = 4;

/// A platform buffer handle: file descriptors followed by integers, as in `native_handle_t`.
#[derive(Debug, Default)]
pub struct NativeHandle {
    pub fds: Vec<OwnedFd>,
    pub ints: Vec<i32>,
}

/// A buffer as gralloc needs it to answer queries.
#[derive(Clone, Copy, Debug)]
pub struct GrallocBufferHandle<'a> {
    pub handle: &'a NativeHandle,
    pub hal_format: u32,
    pub pixel_stride: u32,
}

/// The memory layout of a buffer, as reported by gralloc.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferBasicInfo {
    pub drm_fourcc: u32,
    pub modifier: u64,
    pub num_planes: u32,
    pub offsets: [u32; MAX_GRALLOC_PLANES],
    pub strides: [u32; MAX_GRALLOC_PLANES],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum YuvColorSpace {
    Itu601,
    Itu709,
    Itu2020,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleRange {
    Narrow,
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChromaSiting {
    CositedEven,
    Midpoint,
}

/// The color interpretation of a YUV buffer, as reported by gralloc.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferColorInfo {
    pub yuv_color_space: YuvColorSpace,
    pub sample_range: SampleRange,
    pub horizontal_siting: ChromaSiting,
    pub vertical_siting: ChromaSiting,
}

/// The platform's buffer allocator.
pub trait Gralloc: Send + Sync {
    fn buffer_basic_info(&self, buffer: &GrallocBufferHandle<'_>) -> io::Result<BufferBasicInfo>;

    fn buffer_color_info(&self, buffer: &GrallocBufferHandle<'_>) -> io::Result<BufferColorInfo>;
}

/// Description of a hardware buffer, as returned by `AHardwareBuffer_describe`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HardwareBufferDesc {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    /// One of the `AHARDWAREBUFFER_FORMAT_*` values.
    pub format: u32,
    /// `AHARDWAREBUFFER_USAGE_*` flags.
    pub usage: u64,
    /// Row stride in pixels.
    pub stride: u32,
}

/// An Android hardware buffer.
///
/// Memory imported from a hardware buffer keeps a reference to it, which stands for
/// `AHardwareBuffer_acquire`; dropping the reference releases the buffer.
pub trait HardwareBuffer: Send + Sync + fmt::Debug {
    fn describe(&self) -> HardwareBufferDesc;

    fn native_handle(&self) -> &NativeHandle;

    /// Returns the handle to pass to gralloc for this buffer.
    #[inline]
    fn gralloc_handle(&self) -> GrallocBufferHandle<'_> {
        let desc = self.describe();

        GrallocBufferHandle {
            handle: self.native_handle(),
            hal_format: desc.format,
            pixel_stride: desc.stride,
        }
    }
}

pub const AHARDWAREBUFFER_FORMAT_R8G8B8A8_UNORM: u32 = 0x01;
pub const AHARDWAREBUFFER_FORMAT_R8G8B8X8_UNORM: u32 = 0x02;
pub const AHARDWAREBUFFER_FORMAT_R8G8B8_UNORM: u32 = 0x03;
pub const AHARDWAREBUFFER_FORMAT_R5G6B5_UNORM: u32 = 0x04;
pub const AHARDWAREBUFFER_FORMAT_R16G16B16A16_FLOAT: u32 = 0x16;
pub const AHARDWAREBUFFER_FORMAT_BLOB: u32 = 0x21;
pub const AHARDWAREBUFFER_FORMAT_IMPLEMENTATION_DEFINED: u32 = 0x22;
pub const AHARDWAREBUFFER_FORMAT_Y8CB8CR8_420: u32 = 0x23;
pub const AHARDWAREBUFFER_FORMAT_R10G10B10A2_UNORM: u32 = 0x2b;
pub const AHARDWAREBUFFER_FORMAT_D16_UNORM: u32 = 0x30;
pub const AHARDWAREBUFFER_FORMAT_D24_UNORM: u32 = 0x31;
pub const AHARDWAREBUFFER_FORMAT_D24_UNORM_S8_UINT: u32 = 0x32;
pub const AHARDWAREBUFFER_FORMAT_D32_FLOAT: u32 = 0x33;
pub const AHARDWAREBUFFER_FORMAT_D32_FLOAT_S8_UINT: u32 = 0x34;
pub const AHARDWAREBUFFER_FORMAT_S8_UINT: u32 = 0x35;
pub const AHARDWAREBUFFER_FORMAT_R8_UNORM: u32 = 0x38;
/// `HAL_PIXEL_FORMAT_YV12`.
pub const AHARDWAREBUFFER_FORMAT_YV12: u32 = 0x3231_5659;

pub const AHARDWAREBUFFER_USAGE_GPU_SAMPLED_IMAGE: u64 = 1 << 8;
pub const AHARDWAREBUFFER_USAGE_GPU_COLOR_OUTPUT: u64 = 1 << 9;
pub const AHARDWAREBUFFER_USAGE_GPU_DATA_BUFFER: u64 = 1 << 24;

/// Returns the Vulkan format of a hardware buffer format, or `Format::UNDEFINED` for formats that
/// don't have one.
pub fn hardware_buffer_format(ahb_format: u32) -> Format {
    match ahb_format {
        AHARDWAREBUFFER_FORMAT_R8G8B8A8_UNORM | AHARDWAREBUFFER_FORMAT_R8G8B8X8_UNORM => {
            Format::R8G8B8A8_UNORM
        }
        AHARDWAREBUFFER_FORMAT_R8G8B8_UNORM => Format::R8G8B8_UNORM,
        AHARDWAREBUFFER_FORMAT_R5G6B5_UNORM => Format::R5G6B5_UNORM_PACK16,
        AHARDWAREBUFFER_FORMAT_R16G16B16A16_FLOAT => Format::R16G16B16A16_SFLOAT,
        AHARDWAREBUFFER_FORMAT_R10G10B10A2_UNORM => Format::A2B10G10R10_UNORM_PACK32,
        AHARDWAREBUFFER_FORMAT_D16_UNORM => Format::D16_UNORM,
        AHARDWAREBUFFER_FORMAT_D24_UNORM => Format::X8_D24_UNORM_PACK32,
        AHARDWAREBUFFER_FORMAT_D24_UNORM_S8_UINT => Format::D24_UNORM_S8_UINT,
        AHARDWAREBUFFER_FORMAT_D32_FLOAT => Format::D32_SFLOAT,
        AHARDWAREBUFFER_FORMAT_D32_FLOAT_S8_UINT => Format::D32_SFLOAT_S8_UINT,
        AHARDWAREBUFFER_FORMAT_S8_UINT => Format::S8_UINT,
        AHARDWAREBUFFER_FORMAT_R8_UNORM => Format::R8_UNORM,
        AHARDWAREBUFFER_FORMAT_Y8CB8CR8_420 | AHARDWAREBUFFER_FORMAT_IMPLEMENTATION_DEFINED => {
            Format::G8_B8R8_2PLANE_420_UNORM
        }
        AHARDWAREBUFFER_FORMAT_YV12 => Format::G8_B8_R8_3PLANE_420_UNORM,
        _ => Format::UNDEFINED,
    }
}

/// A DRM format modifier together with the layout of each memory plane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplicitLayout {
    pub drm_format_modifier: u64,

    /// Only `offset` and `row_pitch` are filled in.
    pub plane_layouts: SmallVec<[SubresourceLayout; MAX_GRALLOC_PLANES]>,
}

/// Asks gralloc for the layout of `buffer` and translates it to an explicit DRM format modifier
/// layout.
///
/// Buffers whose planes live in separate allocations are not supported. Gralloc doesn't say so
/// explicitly; they are recognized by a plane after the first starting at offset 0.
pub fn gralloc_to_explicit_layout(
    gralloc: &dyn Gralloc,
    buffer: &GrallocBufferHandle<'_>,
    max_planes: usize,
) -> Result<ExplicitLayout, VulkanError> {
    let info = gralloc.buffer_basic_info(buffer).map_err(|err| {
        log::debug!("gralloc failed to describe the buffer: {err}");
        VulkanError::InvalidExternalHandle
    })?;

    let num_planes = info.num_planes as usize;

    if num_planes > max_planes || num_planes > MAX_GRALLOC_PLANES {
        log::debug!("gralloc buffer has {num_planes} planes, at most {max_planes} are allowed");
        return Err(VulkanError::InvalidExternalHandle);
    }

    if info.offsets[1..num_planes.max(1)].contains(&0) {
        log::debug!("multi-planar gralloc buffers with a plane at offset 0 are not supported");
        return Err(VulkanError::InvalidExternalHandle);
    }

    let mut plane_layouts: SmallVec<[SubresourceLayout; MAX_GRALLOC_PLANES]> = (0..num_planes)
        .map(|plane| SubresourceLayout {
            offset: info.offsets[plane].into(),
            row_pitch: info.strides[plane].into(),
            ..Default::default()
        })
        .collect();

    // YVU420 has V before U; the Vulkan 3-plane format has U (Cb) as plane 1.
    if info.drm_fourcc == DRM_FORMAT_YVU420 && num_planes >= 3 {
        plane_layouts.swap(1, 2);
    }

    Ok(ExplicitLayout {
        drm_format_modifier: info.modifier,
        plane_layouts,
    })
}

/// Properties of a hardware buffer, for importing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HardwareBufferProperties {
    pub allocation_size: DeviceSize,
    pub memory_type_bits: u32,
    pub format: Format,
    pub format_features: FormatFeatures,
    pub suggested_ycbcr_model: SamplerYcbcrModelConversion,
    pub suggested_ycbcr_range: SamplerYcbcrRange,
    pub suggested_x_chroma_offset: ChromaLocation,
    pub suggested_y_chroma_offset: ChromaLocation,
}

/// Returns the properties of `buffer` on `device`.
pub fn hardware_buffer_properties(
    device: &Device,
    buffer: &dyn HardwareBuffer,
) -> Result<HardwareBufferProperties, VulkanError> {
    let desc = buffer.describe();

    const GPU_USAGE: u64 = AHARDWAREBUFFER_USAGE_GPU_SAMPLED_IMAGE
        | AHARDWAREBUFFER_USAGE_GPU_COLOR_OUTPUT
        | AHARDWAREBUFFER_USAGE_GPU_DATA_BUFFER;

    if desc.usage & GPU_USAGE == 0 {
        return Err(VulkanError::InvalidExternalHandle);
    }

    let fd = buffer
        .native_handle()
        .fds
        .first()
        .ok_or(VulkanError::InvalidExternalHandle)?;
    let allocation_size = fd_size(fd.as_fd()).map_err(|_| VulkanError::InvalidExternalHandle)?;

    let physical_device = device.physical_device();
    let format = hardware_buffer_format(desc.format);
    let format_features = if format == Format::UNDEFINED {
        FormatFeatures::empty()
    } else {
        physical_device
            .format_properties(format)
            .optimal_tiling_features
    };

    let mut properties = HardwareBufferProperties {
        allocation_size,
        memory_type_bits: (1u32 << physical_device.memory_properties().memory_types.len()) - 1,
        format,
        format_features,
        suggested_ycbcr_model: SamplerYcbcrModelConversion::Ycbcr601,
        suggested_ycbcr_range: SamplerYcbcrRange::ItuFull,
        suggested_x_chroma_offset: ChromaLocation::Midpoint,
        suggested_y_chroma_offset: ChromaLocation::Midpoint,
    };

    let color_info = device.gralloc().and_then(|gralloc| {
        gralloc
            .buffer_color_info(&buffer.gralloc_handle())
            .map_err(|err| log::debug!("gralloc has no color info for the buffer: {err}"))
            .ok()
    });

    if let Some(color_info) = color_info {
        properties.suggested_ycbcr_model = match color_info.yuv_color_space {
            YuvColorSpace::Itu601 => SamplerYcbcrModelConversion::Ycbcr601,
            YuvColorSpace::Itu709 => SamplerYcbcrModelConversion::Ycbcr709,
            YuvColorSpace::Itu2020 => SamplerYcbcrModelConversion::Ycbcr2020,
        };
        properties.suggested_ycbcr_range = match color_info.sample_range {
            SampleRange::Narrow => SamplerYcbcrRange::ItuNarrow,
            SampleRange::Full => SamplerYcbcrRange::ItuFull,
        };
        properties.suggested_x_chroma_offset = chroma_location(color_info.horizontal_siting);
        properties.suggested_y_chroma_offset = chroma_location(color_info.vertical_siting);
    }

    Ok(properties)
}

fn chroma_location(siting: ChromaSiting) -> ChromaLocation {
    match siting {
        ChromaSiting::CositedEven => ChromaLocation::CositedEven,
        ChromaSiting::Midpoint => ChromaLocation::Midpoint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        drm::{DRM_FORMAT_MOD_BROADCOM_UIF, DRM_FORMAT_MOD_LINEAR, DRM_FORMAT_NV12},
        tests::{TestGralloc, TestHardwareBuffer},
    };
    use std::sync::Arc;

    fn nv12_info() -> BufferBasicInfo {
        BufferBasicInfo {
            drm_fourcc: DRM_FORMAT_NV12,
            modifier: DRM_FORMAT_MOD_BROADCOM_UIF,
            num_planes: 2,
            offsets: [0, 8192, 0, 0],
            strides: [128, 128, 0, 0],
        }
    }

    #[test]
    fn explicit_layout() {
        let gralloc = TestGralloc::new(nv12_info());
        let buffer = TestHardwareBuffer::new(64, 64, AHARDWAREBUFFER_FORMAT_Y8CB8CR8_420, 16384);

        let layout = gralloc_to_explicit_layout(&gralloc, &buffer.gralloc_handle(), 3).unwrap();
        assert_eq!(layout.drm_format_modifier, DRM_FORMAT_MOD_BROADCOM_UIF);
        assert_eq!(layout.plane_layouts.len(), 2);
        assert_eq!(layout.plane_layouts[1].offset, 8192);
        assert_eq!(layout.plane_layouts[1].row_pitch, 128);
        assert_eq!(layout.plane_layouts[1].size, 0);
    }

    #[test]
    fn disjoint_buffers_rejected() {
        let gralloc = TestGralloc::new(BufferBasicInfo {
            offsets: [0, 0, 0, 0],
            ..nv12_info()
        });
        let buffer = TestHardwareBuffer::new(64, 64, AHARDWAREBUFFER_FORMAT_Y8CB8CR8_420, 16384);

        assert_eq!(
            gralloc_to_explicit_layout(&gralloc, &buffer.gralloc_handle(), 3).unwrap_err(),
            VulkanError::InvalidExternalHandle,
        );
    }

    #[test]
    fn too_many_planes() {
        let gralloc = TestGralloc::new(nv12_info());
        let buffer = TestHardwareBuffer::new(64, 64, AHARDWAREBUFFER_FORMAT_Y8CB8CR8_420, 16384);

        assert_eq!(
            gralloc_to_explicit_layout(&gralloc, &buffer.gralloc_handle(), 1).unwrap_err(),
            VulkanError::InvalidExternalHandle,
        );
    }

    #[test]
    fn gralloc_failure() {
        let gralloc = TestGralloc::failing();
        let buffer = TestHardwareBuffer::new(64, 64, AHARDWAREBUFFER_FORMAT_R8G8B8A8_UNORM, 16384);

        assert_eq!(
            gralloc_to_explicit_layout(&gralloc, &buffer.gralloc_handle(), 1).unwrap_err(),
            VulkanError::InvalidExternalHandle,
        );
    }

    #[test]
    fn yvu420_plane_swap() {
        let gralloc = TestGralloc::new(BufferBasicInfo {
            drm_fourcc: DRM_FORMAT_YVU420,
            modifier: DRM_FORMAT_MOD_LINEAR,
            num_planes: 3,
            offsets: [0, 4096, 5120, 0],
            strides: [64, 32, 32, 0],
        });
        let buffer = TestHardwareBuffer::new(64, 64, AHARDWAREBUFFER_FORMAT_YV12, 8192);

        let layout = gralloc_to_explicit_layout(&gralloc, &buffer.gralloc_handle(), 3).unwrap();
        assert_eq!(layout.plane_layouts[1].offset, 5120);
        assert_eq!(layout.plane_layouts[2].offset, 4096);
    }

    #[test]
    fn formats() {
        assert_eq!(
            hardware_buffer_format(AHARDWAREBUFFER_FORMAT_R8G8B8X8_UNORM),
            Format::R8G8B8A8_UNORM,
        );
        assert_eq!(
            hardware_buffer_format(AHARDWAREBUFFER_FORMAT_YV12),
            Format::G8_B8_R8_3PLANE_420_UNORM,
        );
        assert_eq!(
            hardware_buffer_format(AHARDWAREBUFFER_FORMAT_BLOB),
            Format::UNDEFINED,
        );
    }

    #[test]
    fn properties() {
        let gralloc = Arc::new(TestGralloc::new(nv12_info()));
        let (device, _) = sim_device!(gralloc: Some(gralloc.clone()));
        let buffer = TestHardwareBuffer::new(64, 64, AHARDWAREBUFFER_FORMAT_Y8CB8CR8_420, 12288);

        let properties = hardware_buffer_properties(&device, &buffer).unwrap();
        assert_eq!(properties.allocation_size, 12288);
        assert_eq!(properties.memory_type_bits, 1);
        assert_eq!(properties.format, Format::G8_B8R8_2PLANE_420_UNORM);
        assert!(properties
            .format_features
            .intersects(FormatFeatures::SAMPLED_IMAGE));
        assert_eq!(
            properties.suggested_ycbcr_model,
            SamplerYcbcrModelConversion::Ycbcr601,
        );
        assert_eq!(properties.suggested_x_chroma_offset, ChromaLocation::Midpoint);

        gralloc.set_color_info(BufferColorInfo {
            yuv_color_space: YuvColorSpace::Itu709,
            sample_range: SampleRange::Narrow,
            horizontal_siting: ChromaSiting::CositedEven,
            vertical_siting: ChromaSiting::Midpoint,
        });

        let properties = hardware_buffer_properties(&device, &buffer).unwrap();
        assert_eq!(
            properties.suggested_ycbcr_model,
            SamplerYcbcrModelConversion::Ycbcr709,
        );
        assert_eq!(properties.suggested_ycbcr_range, SamplerYcbcrRange::ItuNarrow);
        assert_eq!(
            properties.suggested_x_chroma_offset,
            ChromaLocation::CositedEven,
        );
        assert_eq!(properties.suggested_y_chroma_offset, ChromaLocation::Midpoint);
    }

    #[test]
    fn cpu_only_buffer() {
        let (device, _) = sim_device!();
        let buffer = TestHardwareBuffer {
            usage: 0,
            ..TestHardwareBuffer::new(64, 64, AHARDWAREBUFFER_FORMAT_R8G8B8A8_UNORM, 16384)
        };

        assert_eq!(
            hardware_buffer_properties(&device, &buffer).unwrap_err(),
            VulkanError::InvalidExternalHandle,
        );
    }
}

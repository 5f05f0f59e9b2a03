// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Image storage: creation, memory layout and binding.
//!
//! An [`Image`] is created from an [`ImageCreateInfo`]. Creation validates the parameters against
//! the format features and the hardware limits, chooses a DRM format modifier and then runs the
//! layout planner, which fills in one [`PlaneLayout`] per format plane. Every plane layout holds
//! one [`Slice`] per mip level, with the tiling mode the hardware uses for that level.
//!
//! # Tiling
//!
//! Linear images store each mip level in raster order. Tiled images use one of the hardware's
//! block layouts, chosen per level from the size of the level:
//!
//! - Micro-tiles of 64 bytes, laid out in raster order (*linear tile*), for levels that are
//!   narrower or shorter than a micro-tile.
//! - UIF blocks of 2x2 micro-tiles, in one or two columns (*UB-linear*), for narrow levels.
//! - Columns of four UIF blocks (*UIF*), for everything else. Each column is padded so that
//!   pages in the same DRAM bank don't collide across columns, and when the padded height lands
//!   on a page cache boundary the hardware flips the bank on every odd column (*UIF XOR*).
//!
//! Mip levels are stored back-to-front: the smallest level comes first in memory and level 0
//! last.

pub use self::{
    layout::{LayoutParams, PlaneLayout, Slice, SliceTiling},
    sys::{BindImageMemoryInfo, Image, ImageBindError, ImageCreateInfo, ImageCreationError},
};
use crate::{
    format::FormatFeatures,
    macros::{vulkan_bitflags, vulkan_enum},
    memory::{ExternalMemoryHandleType, ExternalMemoryProperties},
    DeviceSize, Format, NonExhaustive,
};
use bytemuck::{Pod, Zeroable};

mod layout;
mod sys;

vulkan_bitflags! {
    /// Describes how an image is going to be used. This is **not** just an optimization.
    ///
    /// Every usage must be backed by the matching feature of the image's format.
    ImageUsage = ImageUsageFlags(u32);

    /// The image can be used as a source for transfer, blit, resolve and clear commands.
    TRANSFER_SRC = TRANSFER_SRC,

    /// The image can be used as a destination for transfer, blit, resolve and clear commands.
    TRANSFER_DST = TRANSFER_DST,

    /// The image can be used as a sampled image in a shader.
    SAMPLED = SAMPLED,

    /// The image can be used as a storage image in a shader.
    STORAGE = STORAGE,

    /// The image can be used as a color attachment in a render pass/framebuffer.
    COLOR_ATTACHMENT = COLOR_ATTACHMENT,

    /// The image can be used as a depth/stencil attachment in a render pass/framebuffer.
    DEPTH_STENCIL_ATTACHMENT = DEPTH_STENCIL_ATTACHMENT,

    /// The image will be used as an attachment, and will only ever be used temporarily.
    /// As soon as you leave a render pass, the content of transient images becomes undefined.
    TRANSIENT_ATTACHMENT = TRANSIENT_ATTACHMENT,

    /// The image can be used as an input attachment in a render pass/framebuffer.
    INPUT_ATTACHMENT = INPUT_ATTACHMENT,
}

impl ImageUsage {
    /// Returns whether `features` back every usage in `self`.
    pub fn is_supported_by(self, features: FormatFeatures) -> bool {
        let required = [
            (Self::TRANSFER_SRC, FormatFeatures::TRANSFER_SRC),
            (Self::TRANSFER_DST, FormatFeatures::TRANSFER_DST),
            (Self::SAMPLED, FormatFeatures::SAMPLED_IMAGE),
            (Self::STORAGE, FormatFeatures::STORAGE_IMAGE),
            (Self::COLOR_ATTACHMENT, FormatFeatures::COLOR_ATTACHMENT),
            (
                Self::DEPTH_STENCIL_ATTACHMENT,
                FormatFeatures::DEPTH_STENCIL_ATTACHMENT,
            ),
            (
                Self::INPUT_ATTACHMENT,
                FormatFeatures::COLOR_ATTACHMENT.union(FormatFeatures::DEPTH_STENCIL_ATTACHMENT),
            ),
        ];

        required
            .into_iter()
            .all(|(usage, any_of)| !self.intersects(usage) || features.intersects(any_of))
    }
}

vulkan_bitflags! {
    /// Flags specifying additional properties of an image.
    ImageCreateFlags = ImageCreateFlags(u32);

    /// Views of the image can have a different format than the image itself.
    MUTABLE_FORMAT = MUTABLE_FORMAT,

    /// The image can be viewed as a cube map. The image must be 2D and square, with at least six
    /// array layers.
    CUBE_COMPATIBLE = CUBE_COMPATIBLE,

    /// The image can alias memory with other images.
    ALIAS = ALIAS,

    /// Views of the image can have usages that the image's format doesn't support.
    EXTENDED_USAGE = EXTENDED_USAGE,

    /// Every plane of a multi-planar format is bound to memory separately.
    DISJOINT = DISJOINT,

    /// Views of a compressed image can use an uncompressed format with the same block size.
    BLOCK_TEXEL_VIEW_COMPATIBLE = BLOCK_TEXEL_VIEW_COMPATIBLE,
}

vulkan_bitflags! {
    /// A mask specifying one or more [`ImageAspect`]s.
    ImageAspects = ImageAspectFlags(u32);

    /// The single aspect of images with a color format, or the combined aspect of multi-planar
    /// formats.
    COLOR = COLOR,

    /// The depth component of a depth or depth/stencil format.
    DEPTH = DEPTH,

    /// The stencil component of a stencil or depth/stencil format.
    STENCIL = STENCIL,

    /// The first plane of a multi-planar format.
    PLANE_0 = PLANE_0,

    /// The second plane of a multi-planar format.
    PLANE_1 = PLANE_1,

    /// The third plane of a multi-planar format.
    PLANE_2 = PLANE_2,

    /// The first memory plane of an image with a DRM format modifier.
    MEMORY_PLANE_0 = MEMORY_PLANE_0_EXT,

    /// The second memory plane of an image with a DRM format modifier.
    MEMORY_PLANE_1 = MEMORY_PLANE_1_EXT,

    /// The third memory plane of an image with a DRM format modifier.
    MEMORY_PLANE_2 = MEMORY_PLANE_2_EXT,
}

vulkan_enum! {
    /// An individual data type within an image.
    ImageAspect = ImageAspectFlags(u32);

    Color = COLOR,
    Depth = DEPTH,
    Stencil = STENCIL,
    Plane0 = PLANE_0,
    Plane1 = PLANE_1,
    Plane2 = PLANE_2,
    MemoryPlane0 = MEMORY_PLANE_0_EXT,
    MemoryPlane1 = MEMORY_PLANE_1_EXT,
    MemoryPlane2 = MEMORY_PLANE_2_EXT,
}

impl From<ImageAspect> for ImageAspects {
    #[inline]
    fn from(val: ImageAspect) -> Self {
        Self(val as u32)
    }
}

vulkan_enum! {
    /// The basic dimensionality of an image.
    ImageType = ImageType(i32);

    /// A one-dimensional image, consisting of only a width, with a height and depth of 1.
    Dim1d = TYPE_1D,

    /// A two-dimensional image, consisting of a width and height, with a depth of 1.
    Dim2d = TYPE_2D,

    /// A three-dimensional image, consisting of a width, height and depth.
    Dim3d = TYPE_3D,
}

vulkan_enum! {
    /// The arrangement of texels or texel blocks in an image.
    ImageTiling = ImageTiling(i32);

    /// The arrangement is the hardware's own tiled layout.
    Optimal = OPTIMAL,

    /// The texels are laid out in row-major order.
    ///
    /// You can query the layout by calling [`Image::subresource_layout`].
    Linear = LINEAR,

    /// The tiling is defined by a Linux DRM format modifier associated with the image.
    ///
    /// You can query the layout by calling [`Image::subresource_layout`].
    DrmFormatModifier = DRM_FORMAT_MODIFIER_EXT,
}

vulkan_enum! {
    /// The number of samples per texel of an image.
    SampleCount = SampleCountFlags(u32);

    /// 1 sample per texel.
    Sample1 = TYPE_1,

    /// 2 samples per texel.
    Sample2 = TYPE_2,

    /// 4 samples per texel.
    Sample4 = TYPE_4,

    /// 8 samples per texel.
    Sample8 = TYPE_8,

    /// 16 samples per texel.
    Sample16 = TYPE_16,

    /// 32 samples per texel.
    Sample32 = TYPE_32,

    /// 64 samples per texel.
    Sample64 = TYPE_64,
}

impl From<SampleCount> for u32 {
    #[inline]
    fn from(value: SampleCount) -> Self {
        value as u32
    }
}

impl TryFrom<u32> for SampleCount {
    type Error = ();

    #[inline]
    fn try_from(val: u32) -> Result<Self, Self::Error> {
        match val {
            1 => Ok(Self::Sample1),
            2 => Ok(Self::Sample2),
            4 => Ok(Self::Sample4),
            8 => Ok(Self::Sample8),
            16 => Ok(Self::Sample16),
            32 => Ok(Self::Sample32),
            64 => Ok(Self::Sample64),
            _ => Err(()),
        }
    }
}

vulkan_bitflags! {
    /// A set of [`SampleCount`] values.
    SampleCounts = SampleCountFlags(u32);

    SAMPLE_1 = TYPE_1,
    SAMPLE_2 = TYPE_2,
    SAMPLE_4 = TYPE_4,
    SAMPLE_8 = TYPE_8,
    SAMPLE_16 = TYPE_16,
    SAMPLE_32 = TYPE_32,
    SAMPLE_64 = TYPE_64,
}

impl SampleCounts {
    /// Returns whether `self` contains `sample_count`.
    #[inline]
    pub const fn contains_enum(self, sample_count: SampleCount) -> bool {
        self.intersects(Self(sample_count as u32))
    }
}

/// The image configuration to query in
/// [`PhysicalDevice::image_format_properties`](crate::device::physical::PhysicalDevice::image_format_properties).
#[derive(Clone, Debug)]
pub struct ImageFormatInfo {
    /// The `flags` that the image will have.
    ///
    /// The default value is [`ImageCreateFlags::empty()`].
    pub flags: ImageCreateFlags,

    /// The `format` that the image will have.
    ///
    /// The default value is `Format::UNDEFINED`.
    pub format: Format,

    /// The dimension type that the image will have.
    ///
    /// The default value is [`ImageType::Dim2d`].
    pub image_type: ImageType,

    /// The `tiling` that the image will have.
    ///
    /// The default value is [`ImageTiling::Optimal`].
    pub tiling: ImageTiling,

    /// The `usage` that the image will have.
    ///
    /// The default value is [`ImageUsage::empty()`].
    pub usage: ImageUsage,

    /// The DRM format modifier the image will have, if `tiling` is
    /// [`ImageTiling::DrmFormatModifier`].
    ///
    /// The default value is `None`.
    pub drm_format_modifier: Option<u64>,

    /// An external memory handle type that will be imported to or exported from the image.
    ///
    /// The default value is `None`.
    pub external_memory_handle_type: Option<ExternalMemoryHandleType>,

    pub _ne: NonExhaustive,
}

impl Default for ImageFormatInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: ImageCreateFlags::empty(),
            format: Format::UNDEFINED,
            image_type: ImageType::Dim2d,
            tiling: ImageTiling::Optimal,
            usage: ImageUsage::empty(),
            drm_format_modifier: None,
            external_memory_handle_type: None,
            _ne: NonExhaustive(()),
        }
    }
}

/// The properties that are supported by a physical device for images of a certain type.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ImageFormatProperties {
    /// The maximum dimensions.
    pub max_extent: [u32; 3],

    /// The maximum number of mipmap levels.
    pub max_mip_levels: u32,

    /// The maximum number of array layers.
    pub max_array_layers: u32,

    /// The supported sample counts.
    pub sample_counts: SampleCounts,

    /// The maximum total size of an image, in bytes.
    pub max_resource_size: DeviceSize,

    /// The properties for external memory, if an external memory handle type was queried.
    pub external_memory_properties: ExternalMemoryProperties,

    /// The number of combined image sampler descriptors that an image of this format needs.
    pub combined_image_sampler_descriptor_count: u32,
}

/// Returns the maximum number of mipmap levels for the given image extent.
///
/// The returned value is always at least 1.
#[inline]
pub fn max_mip_levels(extent: [u32; 3]) -> u32 {
    32 - (extent[0] | extent[1] | extent[2]).max(1).leading_zeros()
}

/// Returns the extent of mip level `level`, given the extent of level 0.
#[inline]
pub fn mip_level_extent(extent: [u32; 3], level: u32) -> [u32; 3] {
    extent.map(|dim| minify(dim, level))
}

#[inline]
pub(crate) fn minify(dim: u32, level: u32) -> u32 {
    dim.checked_shr(level).unwrap_or(0).max(1)
}

/// Describes the memory layout of a single subresource of an image.
///
/// The byte layout is that of `VkSubresourceLayout`, so this can be handed out verbatim to
/// consumers that parse it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Zeroable, Pod)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct SubresourceLayout {
    /// The number of bytes from the start of the memory to the start of the queried subresource.
    pub offset: u64,

    /// The total number of bytes occupied by the subresource.
    pub size: u64,

    /// The number of bytes between adjacent rows of texels.
    pub row_pitch: u64,

    /// The number of bytes between adjacent array layers.
    pub array_pitch: u64,

    /// The number of bytes between adjacent depth slices.
    pub depth_pitch: u64,
}

impl From<SubresourceLayout> for ash::vk::SubresourceLayout {
    #[inline]
    fn from(val: SubresourceLayout) -> Self {
        let SubresourceLayout {
            offset,
            size,
            row_pitch,
            array_pitch,
            depth_pitch,
        } = val;

        ash::vk::SubresourceLayout {
            offset,
            size,
            row_pitch,
            array_pitch,
            depth_pitch,
        }
    }
}

impl From<ash::vk::SubresourceLayout> for SubresourceLayout {
    #[inline]
    fn from(val: ash::vk::SubresourceLayout) -> Self {
        SubresourceLayout {
            offset: val.offset,
            size: val.size,
            row_pitch: val.row_pitch,
            array_pitch: val.array_pitch,
            depth_pitch: val.depth_pitch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{max_mip_levels, mip_level_extent, ImageAspect, ImageAspects, SubresourceLayout};

    #[test]
    fn max_mip_levels_test() {
        assert_eq!(max_mip_levels([32, 50, 1]), 6);
        assert_eq!(max_mip_levels([1, 1, 1]), 1);
        assert_eq!(max_mip_levels([4096, 1, 1]), 13);
    }

    #[test]
    fn mip_extent() {
        assert_eq!(mip_level_extent([100, 50, 1], 1), [50, 25, 1]);
        assert_eq!(mip_level_extent([100, 50, 1], 7), [1, 1, 1]);
        assert_eq!(mip_level_extent([100, 50, 1], 40), [1, 1, 1]);
    }

    #[test]
    fn aspects() {
        let aspects = ImageAspects::from(ImageAspect::Plane1);
        assert_eq!(aspects, ImageAspects::PLANE_1);
        assert!((ImageAspects::COLOR | ImageAspects::PLANE_0).contains(ImageAspects::PLANE_0));
    }

    #[test]
    fn subresource_layout_bytes() {
        let layout = SubresourceLayout {
            offset: 4096,
            size: 1024,
            row_pitch: 256,
            array_pitch: 0,
            depth_pitch: 0,
        };
        let words: &[u64] = bytemuck::cast_slice(bytemuck::bytes_of(&layout));
        assert_eq!(words, &[4096, 1024, 256, 0, 0]);
        assert_eq!(
            std::mem::size_of::<SubresourceLayout>(),
            std::mem::size_of::<ash::vk::SubresourceLayout>(),
        );
    }
}

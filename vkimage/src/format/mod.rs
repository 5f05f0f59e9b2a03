// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Vulkan formats and what the hardware can do with them.
//!
//! Every Vulkan format that the driver knows about has a static [`FormatDescriptor`]: one to three
//! planes, each backed by a native [`TexelEncoding`] with a swizzle and chroma subsampling
//! denominators. The descriptors are stored in one table per Vulkan enum segment (core, and one
//! per extension that adds formats), and [`descriptor`] finds the right table from the enum value
//! alone.
//!
//! The features that a format supports depend on the tiling, the DRM format modifier and the
//! hardware generation. They are computed by the functions in [`features`] and exposed through
//! [`PhysicalDevice::format_properties`](crate::device::physical::PhysicalDevice::format_properties).

pub use self::{
    encoding::{ChannelType, Colorspace, EncodingCaps, EncodingLayout, TexelEncoding},
    features::{buffer_format_features, image_format_features},
};
use crate::{
    device::HardwareConfig,
    image::{ImageAspects, ImageTiling},
    macros::{vulkan_bitflags, vulkan_enum},
    NonExhaustive,
};
pub use ash::vk::Format;

mod encoding;
pub mod features;
mod table;

/// Maximum number of planes of a format.
pub const MAX_PLANES: usize = 3;

vulkan_bitflags! {
    /// The features supported by a device for an image or buffer with a particular format.
    FormatFeatures = FormatFeatureFlags2(u64);

    /// Can be used with a sampled image descriptor.
    SAMPLED_IMAGE = SAMPLED_IMAGE,

    /// Can be used with a storage image descriptor.
    STORAGE_IMAGE = STORAGE_IMAGE,

    /// Can be used with a storage image descriptor with atomic operations in a shader.
    STORAGE_IMAGE_ATOMIC = STORAGE_IMAGE_ATOMIC,

    /// Can be used with a uniform texel buffer descriptor.
    UNIFORM_TEXEL_BUFFER = UNIFORM_TEXEL_BUFFER,

    /// Can be used with a storage texel buffer descriptor.
    STORAGE_TEXEL_BUFFER = STORAGE_TEXEL_BUFFER,

    /// Can be used with a storage texel buffer descriptor with atomic operations in a shader.
    STORAGE_TEXEL_BUFFER_ATOMIC = STORAGE_TEXEL_BUFFER_ATOMIC,

    /// Can be used as the format of a vertex attribute.
    VERTEX_BUFFER = VERTEX_BUFFER,

    /// Can be used with a framebuffer color attachment.
    COLOR_ATTACHMENT = COLOR_ATTACHMENT,

    /// Can be used with a framebuffer color attachment with blending.
    COLOR_ATTACHMENT_BLEND = COLOR_ATTACHMENT_BLEND,

    /// Can be used with a framebuffer depth/stencil attachment.
    DEPTH_STENCIL_ATTACHMENT = DEPTH_STENCIL_ATTACHMENT,

    /// Can be used as the source of a blit.
    BLIT_SRC = BLIT_SRC,

    /// Can be used as the destination of a blit.
    BLIT_DST = BLIT_DST,

    /// Can be sampled with a linear filter.
    SAMPLED_IMAGE_FILTER_LINEAR = SAMPLED_IMAGE_FILTER_LINEAR,

    /// Can be used as the source of a transfer command.
    TRANSFER_SRC = TRANSFER_SRC,

    /// Can be used as the destination of a transfer command.
    TRANSFER_DST = TRANSFER_DST,

    /// Can be sampled with a min or max reduction mode.
    SAMPLED_IMAGE_FILTER_MINMAX = SAMPLED_IMAGE_FILTER_MINMAX,

    /// Chroma samples can be located at the midpoint between luma samples.
    MIDPOINT_CHROMA_SAMPLES = MIDPOINT_CHROMA_SAMPLES,

    /// A sampler YCbCr conversion can use a linear chroma filter.
    SAMPLED_IMAGE_YCBCR_CONVERSION_LINEAR_FILTER = SAMPLED_IMAGE_YCBCR_CONVERSION_LINEAR_FILTER,

    /// A sampler YCbCr conversion can use a chroma filter that differs from the sampler's
    /// filter.
    SAMPLED_IMAGE_YCBCR_CONVERSION_SEPARATE_RECONSTRUCTION_FILTER = SAMPLED_IMAGE_YCBCR_CONVERSION_SEPARATE_RECONSTRUCTION_FILTER,

    /// The planes of the format can be bound to separate memory.
    DISJOINT = DISJOINT,

    /// Chroma samples can be co-sited with even luma samples.
    COSITED_CHROMA_SAMPLES = COSITED_CHROMA_SAMPLES,

    /// Can be read from a storage image without specifying the format in the shader.
    STORAGE_READ_WITHOUT_FORMAT = STORAGE_READ_WITHOUT_FORMAT,

    /// Can be written to a storage image without specifying the format in the shader.
    STORAGE_WRITE_WITHOUT_FORMAT = STORAGE_WRITE_WITHOUT_FORMAT,

    /// Depth comparison can be performed when sampling.
    SAMPLED_IMAGE_DEPTH_COMPARISON = SAMPLED_IMAGE_DEPTH_COMPARISON,

    /// Can be the output of a video decode operation.
    VIDEO_DECODE_OUTPUT = VIDEO_DECODE_OUTPUT_KHR,

    /// Can be a decoded picture buffer of a video decode operation.
    VIDEO_DECODE_DPB = VIDEO_DECODE_DPB_KHR,
}

vulkan_enum! {
    /// Where a color component of a view reads its value from.
    ComponentSwizzle = ComponentSwizzle(i32);

    /// The value of the same component.
    Identity = IDENTITY,

    /// Always zero.
    Zero = ZERO,

    /// Always one.
    One = ONE,

    /// The red component.
    Red = R,

    /// The green component.
    Green = G,

    /// The blue component.
    Blue = B,

    /// The alpha component.
    Alpha = A,
}

/// Component mapping from a native encoding to the channels of a Vulkan format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Swizzle {
    pub r: ComponentSwizzle,
    pub g: ComponentSwizzle,
    pub b: ComponentSwizzle,
    pub a: ComponentSwizzle,
}

impl Swizzle {
    pub const RGBA: Self = Self::new(
        ComponentSwizzle::Red,
        ComponentSwizzle::Green,
        ComponentSwizzle::Blue,
        ComponentSwizzle::Alpha,
    );
    pub const BGRA: Self = Self::new(
        ComponentSwizzle::Blue,
        ComponentSwizzle::Green,
        ComponentSwizzle::Red,
        ComponentSwizzle::Alpha,
    );
    pub const RGB1: Self = Self::new(
        ComponentSwizzle::Red,
        ComponentSwizzle::Green,
        ComponentSwizzle::Blue,
        ComponentSwizzle::One,
    );

    #[inline]
    pub const fn new(
        r: ComponentSwizzle,
        g: ComponentSwizzle,
        b: ComponentSwizzle,
        a: ComponentSwizzle,
    ) -> Self {
        Swizzle { r, g, b, a }
    }

    /// Returns whether every channel reads from itself.
    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::RGBA
    }
}

/// One plane of a format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlaneDescriptor {
    /// The native encoding of the plane.
    pub encoding: TexelEncoding,

    /// How the channels of `encoding` map onto the format's channels.
    pub swizzle: Swizzle,

    /// Horizontal and vertical subsampling of the plane relative to the image extent.
    pub denominator_scales: [u32; 2],

    /// The aspect that selects this plane.
    pub aspect: ImageAspects,
}

impl PlaneDescriptor {
    pub(crate) const UNSUPPORTED: Self = PlaneDescriptor {
        encoding: TexelEncoding::UNSUPPORTED,
        swizzle: Swizzle::RGBA,
        denominator_scales: [1, 1],
        aspect: ImageAspects::empty(),
    };
}

/// Static description of a Vulkan format.
#[derive(Clone, Copy, Debug)]
pub struct FormatDescriptor {
    pub(crate) planes: [PlaneDescriptor; MAX_PLANES],
    pub(crate) plane_count: u32,
    pub(crate) aspects: ImageAspects,
    pub(crate) can_ycbcr: bool,
    pub(crate) can_video: bool,
}

impl FormatDescriptor {
    /// Returns the planes of the format.
    #[inline]
    pub fn planes(&self) -> &[PlaneDescriptor] {
        &self.planes[..self.plane_count as usize]
    }

    #[inline]
    pub fn plane_count(&self) -> u32 {
        self.plane_count
    }

    /// Returns the aspects of the format as a whole.
    #[inline]
    pub fn aspects(&self) -> ImageAspects {
        self.aspects
    }

    /// Returns whether the format is a YCbCr format that needs a sampler conversion.
    #[inline]
    pub fn is_ycbcr(&self) -> bool {
        self.can_ycbcr
    }

    /// Returns whether the format can be used with the video decode engine.
    #[inline]
    pub fn is_video(&self) -> bool {
        self.can_video
    }

    /// Returns whether any plane is subsampled.
    #[inline]
    pub fn is_subsampled(&self) -> bool {
        self.planes()
            .iter()
            .any(|plane| plane.denominator_scales[0] > 1 || plane.denominator_scales[1] > 1)
    }

    /// Returns plane `index` as it is laid out in memory with `tiling`.
    ///
    /// With optimal tiling, an encoding whose texel size isn't a power of two is replaced by a
    /// four-channel encoding: the variant with a padding channel if the hardware can render to
    /// it, otherwise the variant with alpha, read through a swizzle that forces alpha to one.
    pub(crate) fn plane(
        &self,
        index: usize,
        tiling: ImageTiling,
        config: &HardwareConfig,
    ) -> PlaneDescriptor {
        let mut plane = self.planes()[index];

        if tiling == ImageTiling::Optimal && !plane.encoding.is_power_of_two_sized() {
            match plane.encoding.rgb_to_rgbx() {
                Some(rgbx) if rgbx.supports_rendering(config.version) => {
                    plane.encoding = rgbx;
                }
                _ => {
                    plane.encoding = plane
                        .encoding
                        .rgb_to_rgba()
                        .unwrap_or(TexelEncoding::UNSUPPORTED);
                    plane.swizzle = Swizzle::RGB1;
                }
            }
        }

        plane
    }

    /// Returns the index of the plane selected by `aspect`.
    ///
    /// Color, depth and stencil aspects select plane 0.
    pub fn plane_index(&self, aspect: ImageAspects) -> Option<usize> {
        if aspect.intersects(ImageAspects::PLANE_0 | ImageAspects::MEMORY_PLANE_0) {
            Some(0)
        } else if aspect.intersects(ImageAspects::PLANE_1 | ImageAspects::MEMORY_PLANE_1) {
            (self.plane_count > 1).then_some(1)
        } else if aspect.intersects(ImageAspects::PLANE_2 | ImageAspects::MEMORY_PLANE_2) {
            (self.plane_count > 2).then_some(2)
        } else if aspect.intersects(self.aspects) {
            Some(0)
        } else {
            None
        }
    }
}

/// Vulkan enum extension number of the first extension-defined value of a segment.
const EXTENSION_BASE: i32 = 1_000_000_000;

/// Returns the extension number that defined `raw`, or 0 for core values.
#[inline]
pub(crate) const fn extension_number(raw: i32) -> i32 {
    if raw >= EXTENSION_BASE {
        (raw - EXTENSION_BASE) / 1000 + 1
    } else {
        0
    }
}

/// Returns the offset of `raw` within its segment.
#[inline]
pub(crate) const fn extension_offset(raw: i32) -> usize {
    if raw >= EXTENSION_BASE {
        (raw % 1000) as usize
    } else {
        raw as usize
    }
}

/// Returns the descriptor of `format`, or `None` if the driver doesn't know the format.
pub fn descriptor(format: Format) -> Option<&'static FormatDescriptor> {
    let raw = format.as_raw();

    if raw < 0 {
        return None;
    }

    let segment: &'static [FormatDescriptor] = match extension_number(raw) {
        0 => &table::CORE_FORMATS,
        table::SAMPLER_YCBCR_CONVERSION_EXTENSION => &table::YCBCR_FORMATS,
        table::FORMATS_4444_EXTENSION => &table::FORMATS_4444,
        table::MAINTENANCE5_EXTENSION => &table::MAINTENANCE5_FORMATS,
        _ => return None,
    };

    segment
        .get(extension_offset(raw))
        .filter(|desc| desc.planes[0].encoding != TexelEncoding::UNSUPPORTED)
}

/// Returns the number of planes of `format`, or 0 if the format is unknown.
#[inline]
pub fn plane_count(format: Format) -> u32 {
    descriptor(format).map_or(0, FormatDescriptor::plane_count)
}

/// Returns whether `format` is a known YCbCr format.
#[inline]
pub fn is_ycbcr(format: Format) -> bool {
    descriptor(format).is_some_and(FormatDescriptor::is_ycbcr)
}

/// Returns whether `format` is a known video format.
#[inline]
pub fn is_video(format: Format) -> bool {
    descriptor(format).is_some_and(FormatDescriptor::is_video)
}

vulkan_enum! {
    /// The color model a YCbCr image is encoded with.
    SamplerYcbcrModelConversion = SamplerYcbcrModelConversion(i32);

    RgbIdentity = RGB_IDENTITY,
    YcbcrIdentity = YCBCR_IDENTITY,
    Ycbcr709 = YCBCR_709,
    Ycbcr601 = YCBCR_601,
    Ycbcr2020 = YCBCR_2020,
}

vulkan_enum! {
    /// The numeric range of the channels of a YCbCr image.
    SamplerYcbcrRange = SamplerYcbcrRange(i32);

    ItuFull = ITU_FULL,
    ItuNarrow = ITU_NARROW,
}

vulkan_enum! {
    /// Where chroma samples are located relative to luma samples.
    ChromaLocation = ChromaLocation(i32);

    CositedEven = COSITED_EVEN,
    Midpoint = MIDPOINT,
}

/// The properties of a format that are supported by a physical device.
#[derive(Clone, Debug)]
pub struct FormatProperties {
    /// Features available for images with linear tiling.
    pub linear_tiling_features: FormatFeatures,

    /// Features available for images with optimal tiling.
    pub optimal_tiling_features: FormatFeatures,

    /// Features available for buffers.
    pub buffer_features: FormatFeatures,

    /// One entry for every DRM format modifier that supports the format.
    pub drm_format_modifier_properties: Vec<DrmFormatModifierProperties>,

    pub _ne: NonExhaustive,
}

impl Default for FormatProperties {
    #[inline]
    fn default() -> Self {
        Self {
            linear_tiling_features: FormatFeatures::empty(),
            optimal_tiling_features: FormatFeatures::empty(),
            buffer_features: FormatFeatures::empty(),
            drm_format_modifier_properties: Vec::new(),
            _ne: NonExhaustive(()),
        }
    }
}

/// The properties of a format when laid out with a DRM format modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrmFormatModifierProperties {
    pub drm_format_modifier: u64,

    /// The number of memory planes an image of this format has with the modifier.
    pub drm_format_modifier_plane_count: u32,

    pub drm_format_modifier_tiling_features: FormatFeatures,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments() {
        assert_eq!(extension_number(Format::R8G8B8A8_UNORM.as_raw()), 0);
        assert_eq!(
            extension_number(Format::G8_B8R8_2PLANE_420_UNORM.as_raw()),
            table::SAMPLER_YCBCR_CONVERSION_EXTENSION,
        );
        assert_eq!(extension_offset(Format::G8_B8R8_2PLANE_420_UNORM.as_raw()), 3);
        assert_eq!(
            extension_number(Format::A4B4G4R4_UNORM_PACK16.as_raw()),
            table::FORMATS_4444_EXTENSION,
        );
    }

    #[test]
    fn lookup() {
        let rgba = descriptor(Format::R8G8B8A8_UNORM).unwrap();
        assert_eq!(rgba.plane_count(), 1);
        assert_eq!(rgba.planes()[0].encoding, TexelEncoding::R8G8B8A8_UNORM);
        assert_eq!(rgba.aspects(), ImageAspects::COLOR);
        assert!(!rgba.is_ycbcr());

        let nv12 = descriptor(Format::G8_B8R8_2PLANE_420_UNORM).unwrap();
        assert_eq!(nv12.plane_count(), 2);
        assert!(nv12.is_ycbcr());
        assert!(nv12.is_video());
        assert_eq!(nv12.planes()[1].denominator_scales, [2, 2]);
        assert!(nv12.is_subsampled());

        assert_eq!(plane_count(Format::G8_B8_R8_3PLANE_420_UNORM), 3);
        assert!(is_ycbcr(Format::G8B8G8R8_422_UNORM));
        assert!(!is_video(Format::G8B8G8R8_422_UNORM));
    }

    #[test]
    fn lookup_failures() {
        // No native encoding.
        assert!(descriptor(Format::R64_UINT).is_none());
        assert!(descriptor(Format::UNDEFINED).is_none());
        // Segment from an extension the driver doesn't know.
        assert!(descriptor(Format::PVRTC1_2BPP_UNORM_BLOCK_IMG).is_none());
        // Past the end of a known segment.
        assert!(descriptor(Format::from_raw(1_000_156_900)).is_none());
        assert_eq!(plane_count(Format::R64_UINT), 0);
    }

    #[test]
    fn optimal_substitution() {
        let config = HardwareConfig::v3d_4_2();

        let rgb8 = descriptor(Format::R8G8B8_UNORM).unwrap();
        let plane = rgb8.plane(0, ImageTiling::Optimal, &config);
        assert_eq!(plane.encoding, TexelEncoding::R8G8B8X8_UNORM);
        assert_eq!(plane.swizzle, Swizzle::RGBA);
        assert_eq!(
            rgb8.plane(0, ImageTiling::Linear, &config).encoding,
            TexelEncoding::R8G8B8_UNORM,
        );

        let rgb32f = descriptor(Format::R32G32B32_SFLOAT).unwrap();
        let plane = rgb32f.plane(0, ImageTiling::Optimal, &config);
        assert_eq!(plane.encoding, TexelEncoding::R32G32B32A32_FLOAT);
        assert_eq!(plane.swizzle, Swizzle::RGB1);
    }

    #[test]
    fn plane_index() {
        let nv12 = descriptor(Format::G8_B8R8_2PLANE_420_UNORM).unwrap();
        assert_eq!(nv12.plane_index(ImageAspects::PLANE_1), Some(1));
        assert_eq!(nv12.plane_index(ImageAspects::MEMORY_PLANE_0), Some(0));
        assert_eq!(nv12.plane_index(ImageAspects::PLANE_2), None);

        let depth = descriptor(Format::D24_UNORM_S8_UINT).unwrap();
        assert_eq!(depth.plane_index(ImageAspects::STENCIL), Some(0));
        assert_eq!(depth.plane_index(ImageAspects::COLOR), None);
    }
}

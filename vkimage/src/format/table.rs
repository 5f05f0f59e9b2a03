// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::{
    extension_offset, ComponentSwizzle as C, FormatDescriptor, PlaneDescriptor, Swizzle,
    TexelEncoding as E, MAX_PLANES,
};
use crate::image::ImageAspects;
use ash::vk::Format;

pub(super) const SAMPLER_YCBCR_CONVERSION_EXTENSION: i32 = 157;
pub(super) const FORMATS_4444_EXTENSION: i32 = 341;
pub(super) const MAINTENANCE5_EXTENSION: i32 = 471;

const A1B5G5R5_UNORM_PACK16: Format = Format::from_raw(1_000_470_000);
const A8_UNORM: Format = Format::from_raw(1_000_470_001);

const Y_SWIZZLE: Swizzle = Swizzle::new(C::Green, C::Zero, C::Zero, C::Zero);
const CB_SWIZZLE: Swizzle = Swizzle::new(C::Blue, C::Zero, C::Zero, C::Zero);
const CR_SWIZZLE: Swizzle = Swizzle::new(C::Red, C::Zero, C::Zero, C::Zero);
const CBCR_SWIZZLE: Swizzle = Swizzle::new(C::Blue, C::Red, C::Zero, C::Zero);
const A_SWIZZLE: Swizzle = Swizzle::new(C::Zero, C::Zero, C::Zero, C::Alpha);

impl FormatDescriptor {
    const UNSUPPORTED: Self = FormatDescriptor {
        planes: [PlaneDescriptor::UNSUPPORTED; MAX_PLANES],
        plane_count: 1,
        aspects: ImageAspects::empty(),
        can_ycbcr: false,
        can_video: false,
    };
}

const fn fmt(encoding: E) -> FormatDescriptor {
    swiz_fmt(encoding, Swizzle::RGBA)
}

const fn swiz_fmt(encoding: E, swizzle: Swizzle) -> FormatDescriptor {
    aspect_fmt(encoding, swizzle, ImageAspects::COLOR)
}

const fn depth_fmt(encoding: E, aspects: ImageAspects) -> FormatDescriptor {
    aspect_fmt(encoding, Swizzle::RGBA, aspects)
}

const fn aspect_fmt(encoding: E, swizzle: Swizzle, aspects: ImageAspects) -> FormatDescriptor {
    let mut planes = [PlaneDescriptor::UNSUPPORTED; MAX_PLANES];
    planes[0] = PlaneDescriptor {
        encoding,
        swizzle,
        denominator_scales: [1, 1],
        aspect: aspects,
    };

    FormatDescriptor {
        planes,
        plane_count: 1,
        aspects,
        can_ycbcr: false,
        can_video: false,
    }
}

const fn plane(index: u32, encoding: E, swizzle: Swizzle, scales: [u32; 2]) -> PlaneDescriptor {
    PlaneDescriptor {
        encoding,
        swizzle,
        denominator_scales: scales,
        aspect: match index {
            0 => ImageAspects::PLANE_0,
            1 => ImageAspects::PLANE_1,
            _ => ImageAspects::PLANE_2,
        },
    }
}

const fn ycbcr_fmt(source: &[PlaneDescriptor], can_video: bool) -> FormatDescriptor {
    let mut planes = [PlaneDescriptor::UNSUPPORTED; MAX_PLANES];
    let mut aspects = ImageAspects::COLOR;
    let mut index = 0;

    while index < source.len() {
        planes[index] = source[index];
        if source.len() > 1 {
            aspects = aspects.union(source[index].aspect);
        }
        index += 1;
    }

    FormatDescriptor {
        planes,
        plane_count: source.len() as u32,
        aspects,
        can_ycbcr: true,
        can_video,
    }
}

macro_rules! format_table {
    ($name:ident[$len:literal] { $($format:path => $desc:expr,)+ }) => {
        pub(super) static $name: [FormatDescriptor; $len] = {
            let mut table = [FormatDescriptor::UNSUPPORTED; $len];
            $(
                table[extension_offset($format.as_raw())] = $desc;
            )+
            table
        };
    };
}

format_table! {
    CORE_FORMATS[185] {
        Format::R4G4B4A4_UNORM_PACK16 => swiz_fmt(E::B4G4R4A4_UNORM, Swizzle::BGRA),
        Format::B4G4R4A4_UNORM_PACK16 => fmt(E::B4G4R4A4_UNORM),
        Format::R5G6B5_UNORM_PACK16 => fmt(E::B5G6R5_UNORM),
        Format::B5G6R5_UNORM_PACK16 => swiz_fmt(E::B5G6R5_UNORM, Swizzle::BGRA),
        Format::A1R5G5B5_UNORM_PACK16 => fmt(E::B5G5R5A1_UNORM),
        Format::R8_UNORM => fmt(E::R8_UNORM),
        Format::R8_SNORM => fmt(E::R8_SNORM),
        Format::R8_UINT => fmt(E::R8_UINT),
        Format::R8_SINT => fmt(E::R8_SINT),
        Format::R8G8_UNORM => fmt(E::R8G8_UNORM),
        Format::R8G8_SNORM => fmt(E::R8G8_SNORM),
        Format::R8G8_UINT => fmt(E::R8G8_UINT),
        Format::R8G8_SINT => fmt(E::R8G8_SINT),
        Format::R8G8B8_UNORM => fmt(E::R8G8B8_UNORM),
        Format::R8G8B8_SRGB => fmt(E::R8G8B8_UNORM_SRGB),
        Format::R8G8B8A8_UNORM => fmt(E::R8G8B8A8_UNORM),
        Format::R8G8B8A8_SNORM => fmt(E::R8G8B8A8_SNORM),
        Format::R8G8B8A8_UINT => fmt(E::R8G8B8A8_UINT),
        Format::R8G8B8A8_SINT => fmt(E::R8G8B8A8_SINT),
        Format::R8G8B8A8_SRGB => fmt(E::R8G8B8A8_UNORM_SRGB),
        Format::B8G8R8A8_UNORM => fmt(E::B8G8R8A8_UNORM),
        Format::B8G8R8A8_SRGB => fmt(E::B8G8R8A8_UNORM_SRGB),
        Format::A8B8G8R8_UNORM_PACK32 => fmt(E::R8G8B8A8_UNORM),
        Format::A8B8G8R8_SNORM_PACK32 => fmt(E::R8G8B8A8_SNORM),
        Format::A8B8G8R8_UINT_PACK32 => fmt(E::R8G8B8A8_UINT),
        Format::A8B8G8R8_SINT_PACK32 => fmt(E::R8G8B8A8_SINT),
        Format::A8B8G8R8_SRGB_PACK32 => fmt(E::R8G8B8A8_UNORM_SRGB),
        Format::A2R10G10B10_UNORM_PACK32 => fmt(E::B10G10R10A2_UNORM),
        Format::A2B10G10R10_UNORM_PACK32 => fmt(E::R10G10B10A2_UNORM),
        Format::A2B10G10R10_UINT_PACK32 => fmt(E::R10G10B10A2_UINT),
        Format::R16_UNORM => fmt(E::R16_UNORM),
        Format::R16_SNORM => fmt(E::R16_SNORM),
        Format::R16_UINT => fmt(E::R16_UINT),
        Format::R16_SINT => fmt(E::R16_SINT),
        Format::R16_SFLOAT => fmt(E::R16_FLOAT),
        Format::R16G16_UNORM => fmt(E::R16G16_UNORM),
        Format::R16G16_SNORM => fmt(E::R16G16_SNORM),
        Format::R16G16_UINT => fmt(E::R16G16_UINT),
        Format::R16G16_SINT => fmt(E::R16G16_SINT),
        Format::R16G16_SFLOAT => fmt(E::R16G16_FLOAT),
        Format::R16G16B16_SFLOAT => fmt(E::R16G16B16_FLOAT),
        Format::R16G16B16A16_UNORM => fmt(E::R16G16B16A16_UNORM),
        Format::R16G16B16A16_SNORM => fmt(E::R16G16B16A16_SNORM),
        Format::R16G16B16A16_UINT => fmt(E::R16G16B16A16_UINT),
        Format::R16G16B16A16_SINT => fmt(E::R16G16B16A16_SINT),
        Format::R16G16B16A16_SFLOAT => fmt(E::R16G16B16A16_FLOAT),
        Format::R32_UINT => fmt(E::R32_UINT),
        Format::R32_SINT => fmt(E::R32_SINT),
        Format::R32_SFLOAT => fmt(E::R32_FLOAT),
        Format::R32G32_UINT => fmt(E::R32G32_UINT),
        Format::R32G32_SINT => fmt(E::R32G32_SINT),
        Format::R32G32_SFLOAT => fmt(E::R32G32_FLOAT),
        Format::R32G32B32_UINT => fmt(E::R32G32B32_UINT),
        Format::R32G32B32_SINT => fmt(E::R32G32B32_SINT),
        Format::R32G32B32_SFLOAT => fmt(E::R32G32B32_FLOAT),
        Format::R32G32B32A32_UINT => fmt(E::R32G32B32A32_UINT),
        Format::R32G32B32A32_SINT => fmt(E::R32G32B32A32_SINT),
        Format::R32G32B32A32_SFLOAT => fmt(E::R32G32B32A32_FLOAT),
        Format::B10G11R11_UFLOAT_PACK32 => fmt(E::R11G11B10_FLOAT),
        Format::E5B9G9R9_UFLOAT_PACK32 => fmt(E::R9G9B9E5_SHAREDEXP),
        Format::D16_UNORM => depth_fmt(E::D16_UNORM, ImageAspects::DEPTH),
        Format::X8_D24_UNORM_PACK32 => depth_fmt(E::X8D24_UNORM, ImageAspects::DEPTH),
        Format::D32_SFLOAT => depth_fmt(E::D32_FLOAT, ImageAspects::DEPTH),
        Format::D24_UNORM_S8_UINT => depth_fmt(
            E::D24_UNORM_S8_UINT,
            ImageAspects::DEPTH.union(ImageAspects::STENCIL),
        ),
        Format::BC1_RGB_UNORM_BLOCK => swiz_fmt(E::BC1_UNORM, Swizzle::RGB1),
        Format::BC1_RGB_SRGB_BLOCK => swiz_fmt(E::BC1_UNORM_SRGB, Swizzle::RGB1),
        Format::BC1_RGBA_UNORM_BLOCK => fmt(E::BC1_UNORM),
        Format::BC1_RGBA_SRGB_BLOCK => fmt(E::BC1_UNORM_SRGB),
        Format::BC3_UNORM_BLOCK => fmt(E::BC3_UNORM),
        Format::BC3_SRGB_BLOCK => fmt(E::BC3_UNORM_SRGB),
        Format::ETC2_R8G8B8_UNORM_BLOCK => fmt(E::ETC2_RGB8),
        Format::ETC2_R8G8B8_SRGB_BLOCK => fmt(E::ETC2_SRGB8),
        Format::ETC2_R8G8B8A1_UNORM_BLOCK => fmt(E::ETC2_RGB8_PTA),
        Format::ETC2_R8G8B8A1_SRGB_BLOCK => fmt(E::ETC2_SRGB8_PTA),
        Format::ETC2_R8G8B8A8_UNORM_BLOCK => fmt(E::ETC2_EAC_RGBA8),
        Format::ETC2_R8G8B8A8_SRGB_BLOCK => fmt(E::ETC2_EAC_SRGB8_A8),
        Format::EAC_R11_UNORM_BLOCK => fmt(E::EAC_R11),
        Format::EAC_R11_SNORM_BLOCK => fmt(E::EAC_SIGNED_R11),
        Format::EAC_R11G11_UNORM_BLOCK => fmt(E::EAC_RG11),
        Format::EAC_R11G11_SNORM_BLOCK => fmt(E::EAC_SIGNED_RG11),
        Format::ASTC_4X4_UNORM_BLOCK => fmt(E::ASTC_4X4_UNORM),
        Format::ASTC_4X4_SRGB_BLOCK => fmt(E::ASTC_4X4_SRGB),
        Format::ASTC_8X8_UNORM_BLOCK => fmt(E::ASTC_8X8_UNORM),
        Format::ASTC_8X8_SRGB_BLOCK => fmt(E::ASTC_8X8_SRGB),
    }
}

format_table! {
    YCBCR_FORMATS[33] {
        Format::G8B8G8R8_422_UNORM => ycbcr_fmt(
            &[plane(0, E::YCRCB_NORMAL, Swizzle::RGBA, [1, 1])],
            false,
        ),
        Format::B8G8R8G8_422_UNORM => ycbcr_fmt(
            &[plane(0, E::YCRCB_SWAPY, Swizzle::RGBA, [1, 1])],
            false,
        ),
        Format::G8_B8_R8_3PLANE_420_UNORM => ycbcr_fmt(
            &[
                plane(0, E::R8_UNORM, Y_SWIZZLE, [1, 1]),
                plane(1, E::R8_UNORM, CB_SWIZZLE, [2, 2]),
                plane(2, E::R8_UNORM, CR_SWIZZLE, [2, 2]),
            ],
            false,
        ),
        Format::G8_B8R8_2PLANE_420_UNORM => ycbcr_fmt(
            &[
                plane(0, E::R8_UNORM, Y_SWIZZLE, [1, 1]),
                plane(1, E::R8G8_UNORM, CBCR_SWIZZLE, [2, 2]),
            ],
            true,
        ),
        Format::G8_B8_R8_3PLANE_422_UNORM => ycbcr_fmt(
            &[
                plane(0, E::R8_UNORM, Y_SWIZZLE, [1, 1]),
                plane(1, E::R8_UNORM, CB_SWIZZLE, [2, 1]),
                plane(2, E::R8_UNORM, CR_SWIZZLE, [2, 1]),
            ],
            false,
        ),
        Format::G8_B8R8_2PLANE_422_UNORM => ycbcr_fmt(
            &[
                plane(0, E::R8_UNORM, Y_SWIZZLE, [1, 1]),
                plane(1, E::R8G8_UNORM, CBCR_SWIZZLE, [2, 1]),
            ],
            false,
        ),
        Format::G8_B8_R8_3PLANE_444_UNORM => ycbcr_fmt(
            &[
                plane(0, E::R8_UNORM, Y_SWIZZLE, [1, 1]),
                plane(1, E::R8_UNORM, CB_SWIZZLE, [1, 1]),
                plane(2, E::R8_UNORM, CR_SWIZZLE, [1, 1]),
            ],
            false,
        ),
        Format::G10X6_B10X6R10X6_2PLANE_420_UNORM_3PACK16 => ycbcr_fmt(
            &[
                plane(0, E::R16_UNORM, Y_SWIZZLE, [1, 1]),
                plane(1, E::R16G16_UNORM, CBCR_SWIZZLE, [2, 2]),
            ],
            true,
        ),
        Format::G16_B16R16_2PLANE_420_UNORM => ycbcr_fmt(
            &[
                plane(0, E::R16_UNORM, Y_SWIZZLE, [1, 1]),
                plane(1, E::R16G16_UNORM, CBCR_SWIZZLE, [2, 2]),
            ],
            false,
        ),
    }
}

format_table! {
    FORMATS_4444[2] {
        Format::A4R4G4B4_UNORM_PACK16 => swiz_fmt(E::B4G4R4A4_UNORM, Swizzle::BGRA),
        Format::A4B4G4R4_UNORM_PACK16 => fmt(E::A4B4G4R4_UNORM),
    }
}

format_table! {
    MAINTENANCE5_FORMATS[2] {
        A1B5G5R5_UNORM_PACK16 => fmt(E::A1B5G5R5_UNORM),
        A8_UNORM => swiz_fmt(E::A8_UNORM, A_SWIZZLE),
    }
}

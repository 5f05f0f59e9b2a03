// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Native texel encodings of the hardware.
//!
//! Every plane of a Vulkan format is backed by one of these. Each encoding has a fixed memory
//! layout and a row of capabilities, where each capability is the minimum hardware version that
//! supports it.

/// Supported on every hardware version.
const Y: u8 = 0;
/// Not supported on any hardware version.
const N: u8 = u8::MAX;

/// How the channels of an encoding are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Unorm,
    Snorm,
    Uint,
    Sint,
    Ufloat,
    Sfloat,
    /// Channels of different types, or a shared exponent.
    Mixed,
}

/// The color space the channels of an encoding are in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Colorspace {
    Linear,
    Srgb,
    Yuv,
}

/// Memory layout of a texel encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EncodingLayout {
    /// Bits per block. For uncompressed encodings a block is one texel.
    pub bits_per_block: u32,
    pub block_width: u32,
    pub block_height: u32,
    /// Number of channels stored, including alpha and padding channels.
    pub channels: u32,
    pub has_alpha: bool,
    pub channel_type: ChannelType,
    pub colorspace: Colorspace,
    pub compressed: bool,
}

/// Minimum hardware version for each capability of a texel encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EncodingCaps {
    pub sampling: u8,
    pub filtering: u8,
    pub rendering: u8,
    pub alpha_blending: u8,
    pub typed_reads: u8,
    pub typed_writes: u8,
    pub multisampling: u8,
    /// Compatibility with auxiliary compression metadata.
    pub aux_compression: u8,
}

macro_rules! texel_encodings {
    {
        $(
            $(#[doc = $doc:literal])*
            $name:ident => (
                $bpb:literal, $bw:literal x $bh:literal, $channels:literal,
                $alpha:literal, $ty:ident, $space:ident, $compressed:literal
            ) [$s:tt, $f:tt, $r:tt, $b:tt, $tr:tt, $tw:tt, $ms:tt, $aux:tt];
        )+
    } => {
        /// A native texel encoding.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[allow(non_camel_case_types)]
        pub enum TexelEncoding {
            $(
                $(#[doc = $doc])*
                $name,
            )+
        }

        impl TexelEncoding {
            /// Returns the memory layout of the encoding.
            pub const fn layout(self) -> EncodingLayout {
                match self {
                    $(
                        Self::$name => EncodingLayout {
                            bits_per_block: $bpb,
                            block_width: $bw,
                            block_height: $bh,
                            channels: $channels,
                            has_alpha: $alpha,
                            channel_type: ChannelType::$ty,
                            colorspace: Colorspace::$space,
                            compressed: $compressed,
                        },
                    )+
                }
            }

            /// Returns the capability row of the encoding.
            pub const fn caps(self) -> EncodingCaps {
                match self {
                    $(
                        Self::$name => EncodingCaps {
                            sampling: $s,
                            filtering: $f,
                            rendering: $r,
                            alpha_blending: $b,
                            typed_reads: $tr,
                            typed_writes: $tw,
                            multisampling: $ms,
                            aux_compression: $aux,
                        },
                    )+
                }
            }
        }
    };
}

texel_encodings! {
    /// Placeholder for formats without a native encoding.
    UNSUPPORTED => (0, 1 x 1, 0, false, Unorm, Linear, false) [N, N, N, N, N, N, N, N];

    R8_UNORM => (8, 1 x 1, 1, false, Unorm, Linear, false) [Y, Y, Y, Y, N, Y, Y, Y];
    R8_SNORM => (8, 1 x 1, 1, false, Snorm, Linear, false) [Y, Y, N, N, N, Y, N, N];
    R8_UINT => (8, 1 x 1, 1, false, Uint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R8_SINT => (8, 1 x 1, 1, false, Sint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    /// Alpha-only.
    A8_UNORM => (8, 1 x 1, 1, true, Unorm, Linear, false) [Y, Y, Y, Y, N, N, Y, N];

    R8G8_UNORM => (16, 1 x 1, 2, false, Unorm, Linear, false) [Y, Y, Y, Y, N, Y, Y, Y];
    R8G8_SNORM => (16, 1 x 1, 2, false, Snorm, Linear, false) [Y, Y, N, N, N, Y, N, N];
    R8G8_UINT => (16, 1 x 1, 2, false, Uint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R8G8_SINT => (16, 1 x 1, 2, false, Sint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];

    R8G8B8_UNORM => (24, 1 x 1, 3, false, Unorm, Linear, false) [Y, Y, N, N, N, N, N, N];
    R8G8B8_UNORM_SRGB => (24, 1 x 1, 3, false, Unorm, Srgb, false) [Y, Y, N, N, N, N, N, N];
    R8G8B8X8_UNORM => (32, 1 x 1, 4, false, Unorm, Linear, false) [Y, Y, Y, N, N, N, Y, Y];
    R8G8B8X8_UNORM_SRGB => (32, 1 x 1, 4, false, Unorm, Srgb, false) [Y, Y, Y, N, N, N, Y, N];

    R8G8B8A8_UNORM => (32, 1 x 1, 4, true, Unorm, Linear, false) [Y, Y, Y, Y, Y, Y, Y, Y];
    R8G8B8A8_SNORM => (32, 1 x 1, 4, true, Snorm, Linear, false) [Y, Y, N, N, N, Y, N, N];
    R8G8B8A8_UINT => (32, 1 x 1, 4, true, Uint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R8G8B8A8_SINT => (32, 1 x 1, 4, true, Sint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R8G8B8A8_UNORM_SRGB => (32, 1 x 1, 4, true, Unorm, Srgb, false) [Y, Y, Y, Y, N, N, Y, Y];
    B8G8R8A8_UNORM => (32, 1 x 1, 4, true, Unorm, Linear, false) [Y, Y, Y, Y, N, N, Y, Y];
    B8G8R8A8_UNORM_SRGB => (32, 1 x 1, 4, true, Unorm, Srgb, false) [Y, Y, Y, Y, N, N, Y, N];

    R10G10B10A2_UNORM => (32, 1 x 1, 4, true, Unorm, Linear, false) [Y, Y, Y, Y, N, Y, Y, N];
    R10G10B10A2_UINT => (32, 1 x 1, 4, true, Uint, Linear, false) [Y, N, Y, N, N, Y, Y, N];
    B10G10R10A2_UNORM => (32, 1 x 1, 4, true, Unorm, Linear, false) [Y, Y, Y, Y, N, N, Y, N];
    R11G11B10_FLOAT => (32, 1 x 1, 3, false, Ufloat, Linear, false) [Y, Y, Y, N, N, Y, Y, N];
    R9G9B9E5_SHAREDEXP => (32, 1 x 1, 3, false, Mixed, Linear, false) [Y, Y, N, N, N, N, N, N];

    B5G6R5_UNORM => (16, 1 x 1, 3, false, Unorm, Linear, false) [Y, Y, Y, N, N, N, Y, N];
    B5G5R5A1_UNORM => (16, 1 x 1, 4, true, Unorm, Linear, false) [Y, Y, Y, Y, N, N, Y, N];
    /// Only newer hardware can render to it.
    A1B5G5R5_UNORM => (16, 1 x 1, 4, true, Unorm, Linear, false) [Y, Y, 71, 71, N, N, 71, N];
    B4G4R4A4_UNORM => (16, 1 x 1, 4, true, Unorm, Linear, false) [Y, Y, Y, Y, N, N, Y, N];
    A4B4G4R4_UNORM => (16, 1 x 1, 4, true, Unorm, Linear, false) [Y, Y, Y, Y, N, N, Y, N];

    R16_UNORM => (16, 1 x 1, 1, false, Unorm, Linear, false) [Y, Y, Y, Y, N, Y, Y, N];
    R16_SNORM => (16, 1 x 1, 1, false, Snorm, Linear, false) [Y, Y, N, N, N, Y, N, N];
    R16_UINT => (16, 1 x 1, 1, false, Uint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R16_SINT => (16, 1 x 1, 1, false, Sint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R16_FLOAT => (16, 1 x 1, 1, false, Sfloat, Linear, false) [Y, Y, Y, Y, Y, Y, Y, N];
    R16G16_UNORM => (32, 1 x 1, 2, false, Unorm, Linear, false) [Y, Y, Y, Y, N, Y, Y, N];
    R16G16_SNORM => (32, 1 x 1, 2, false, Snorm, Linear, false) [Y, Y, N, N, N, Y, N, N];
    R16G16_UINT => (32, 1 x 1, 2, false, Uint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R16G16_SINT => (32, 1 x 1, 2, false, Sint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R16G16_FLOAT => (32, 1 x 1, 2, false, Sfloat, Linear, false) [Y, Y, Y, Y, Y, Y, Y, N];
    R16G16B16_FLOAT => (48, 1 x 1, 3, false, Sfloat, Linear, false) [Y, Y, N, N, N, N, N, N];
    R16G16B16X16_FLOAT => (64, 1 x 1, 4, false, Sfloat, Linear, false) [Y, Y, Y, N, N, N, Y, N];
    R16G16B16A16_UNORM => (64, 1 x 1, 4, true, Unorm, Linear, false) [Y, Y, Y, Y, N, Y, Y, N];
    R16G16B16A16_SNORM => (64, 1 x 1, 4, true, Snorm, Linear, false) [Y, Y, N, N, N, Y, N, N];
    R16G16B16A16_UINT => (64, 1 x 1, 4, true, Uint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R16G16B16A16_SINT => (64, 1 x 1, 4, true, Sint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R16G16B16A16_FLOAT => (64, 1 x 1, 4, true, Sfloat, Linear, false) [Y, Y, Y, Y, Y, Y, Y, N];

    R32_UINT => (32, 1 x 1, 1, false, Uint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R32_SINT => (32, 1 x 1, 1, false, Sint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R32_FLOAT => (32, 1 x 1, 1, false, Sfloat, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R32G32_UINT => (64, 1 x 1, 2, false, Uint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R32G32_SINT => (64, 1 x 1, 2, false, Sint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R32G32_FLOAT => (64, 1 x 1, 2, false, Sfloat, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R32G32B32_UINT => (96, 1 x 1, 3, false, Uint, Linear, false) [Y, N, N, N, N, N, N, N];
    R32G32B32_SINT => (96, 1 x 1, 3, false, Sint, Linear, false) [Y, N, N, N, N, N, N, N];
    R32G32B32_FLOAT => (96, 1 x 1, 3, false, Sfloat, Linear, false) [Y, N, N, N, N, N, N, N];
    R32G32B32X32_FLOAT => (128, 1 x 1, 4, false, Sfloat, Linear, false) [Y, N, N, N, N, N, N, N];
    R32G32B32A32_UINT => (128, 1 x 1, 4, true, Uint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R32G32B32A32_SINT => (128, 1 x 1, 4, true, Sint, Linear, false) [Y, N, Y, N, Y, Y, Y, N];
    R32G32B32A32_FLOAT => (128, 1 x 1, 4, true, Sfloat, Linear, false) [Y, N, Y, N, Y, Y, Y, N];

    D16_UNORM => (16, 1 x 1, 1, false, Unorm, Linear, false) [Y, Y, Y, N, N, N, Y, N];
    X8D24_UNORM => (32, 1 x 1, 2, false, Unorm, Linear, false) [Y, Y, Y, N, N, N, Y, N];
    D24_UNORM_S8_UINT => (32, 1 x 1, 2, false, Mixed, Linear, false) [Y, Y, Y, N, N, N, Y, N];
    D32_FLOAT => (32, 1 x 1, 1, false, Sfloat, Linear, false) [Y, N, Y, N, N, N, Y, N];

    ETC2_RGB8 => (64, 4 x 4, 3, false, Unorm, Linear, true) [Y, Y, N, N, N, N, N, N];
    ETC2_SRGB8 => (64, 4 x 4, 3, false, Unorm, Srgb, true) [Y, Y, N, N, N, N, N, N];
    ETC2_RGB8_PTA => (64, 4 x 4, 4, true, Unorm, Linear, true) [Y, Y, N, N, N, N, N, N];
    ETC2_SRGB8_PTA => (64, 4 x 4, 4, true, Unorm, Srgb, true) [Y, Y, N, N, N, N, N, N];
    ETC2_EAC_RGBA8 => (128, 4 x 4, 4, true, Unorm, Linear, true) [Y, Y, N, N, N, N, N, N];
    ETC2_EAC_SRGB8_A8 => (128, 4 x 4, 4, true, Unorm, Srgb, true) [Y, Y, N, N, N, N, N, N];
    EAC_R11 => (64, 4 x 4, 1, false, Unorm, Linear, true) [Y, Y, N, N, N, N, N, N];
    EAC_SIGNED_R11 => (64, 4 x 4, 1, false, Snorm, Linear, true) [Y, Y, N, N, N, N, N, N];
    EAC_RG11 => (128, 4 x 4, 2, false, Unorm, Linear, true) [Y, Y, N, N, N, N, N, N];
    EAC_SIGNED_RG11 => (128, 4 x 4, 2, false, Snorm, Linear, true) [Y, Y, N, N, N, N, N, N];
    /// The texture unit has no BC decoder; listed so that the formats resolve to no features.
    BC1_UNORM => (64, 4 x 4, 4, true, Unorm, Linear, true) [N, N, N, N, N, N, N, N];
    BC1_UNORM_SRGB => (64, 4 x 4, 4, true, Unorm, Srgb, true) [N, N, N, N, N, N, N, N];
    BC3_UNORM => (128, 4 x 4, 4, true, Unorm, Linear, true) [N, N, N, N, N, N, N, N];
    BC3_UNORM_SRGB => (128, 4 x 4, 4, true, Unorm, Srgb, true) [N, N, N, N, N, N, N, N];
    ASTC_4X4_UNORM => (128, 4 x 4, 4, true, Unorm, Linear, true) [Y, Y, N, N, N, N, N, N];
    ASTC_4X4_SRGB => (128, 4 x 4, 4, true, Unorm, Srgb, true) [Y, Y, N, N, N, N, N, N];
    ASTC_8X8_UNORM => (128, 8 x 8, 4, true, Unorm, Linear, true) [Y, Y, N, N, N, N, N, N];
    ASTC_8X8_SRGB => (128, 8 x 8, 4, true, Unorm, Srgb, true) [Y, Y, N, N, N, N, N, N];

    /// Packed 4:2:2, two texels per block in Y0 Cb Y1 Cr order.
    YCRCB_NORMAL => (32, 2 x 1, 3, false, Unorm, Yuv, false) [Y, Y, N, N, N, N, N, N];
    /// Packed 4:2:2, two texels per block in Cb Y0 Cr Y1 order.
    YCRCB_SWAPY => (32, 2 x 1, 3, false, Unorm, Yuv, false) [Y, Y, N, N, N, N, N, N];
}

impl TexelEncoding {
    /// Returns the number of bytes per block. For encodings whose block is one texel, this is the
    /// bytes per texel.
    #[inline]
    pub const fn bytes_per_block(self) -> u32 {
        self.layout().bits_per_block / 8
    }

    #[inline]
    pub const fn is_compressed(self) -> bool {
        self.layout().compressed
    }

    #[inline]
    pub fn is_yuv(self) -> bool {
        self.layout().colorspace == Colorspace::Yuv
    }

    /// Returns whether the size of a block is a power of two.
    #[inline]
    pub const fn is_power_of_two_sized(self) -> bool {
        self.layout().bits_per_block.is_power_of_two()
    }

    #[inline]
    pub fn supports_sampling(self, version: u8) -> bool {
        self.caps().sampling <= version
    }

    #[inline]
    pub fn supports_filtering(self, version: u8) -> bool {
        self.caps().filtering <= version
    }

    #[inline]
    pub fn supports_rendering(self, version: u8) -> bool {
        self.caps().rendering <= version
    }

    #[inline]
    pub fn supports_alpha_blending(self, version: u8) -> bool {
        self.caps().alpha_blending <= version
    }

    #[inline]
    pub fn supports_typed_reads(self, version: u8) -> bool {
        self.caps().typed_reads <= version
    }

    #[inline]
    pub fn supports_typed_writes(self, version: u8) -> bool {
        self.caps().typed_writes <= version
    }

    #[inline]
    pub fn supports_multisampling(self, version: u8) -> bool {
        self.caps().multisampling <= version
    }

    #[inline]
    pub fn supports_aux_compression(self, version: u8) -> bool {
        self.caps().aux_compression <= version
    }

    /// Returns whether vertex fetch can read the encoding.
    #[inline]
    pub fn supports_vertex_fetch(self) -> bool {
        let layout = self.layout();

        self != Self::UNSUPPORTED && !layout.compressed && layout.colorspace != Colorspace::Yuv
    }

    /// Returns the four-channel encoding with an unused fourth channel that stores the same data
    /// as this three-channel encoding.
    pub const fn rgb_to_rgbx(self) -> Option<Self> {
        match self {
            Self::R8G8B8_UNORM => Some(Self::R8G8B8X8_UNORM),
            Self::R8G8B8_UNORM_SRGB => Some(Self::R8G8B8X8_UNORM_SRGB),
            Self::R16G16B16_FLOAT => Some(Self::R16G16B16X16_FLOAT),
            Self::R32G32B32_FLOAT => Some(Self::R32G32B32X32_FLOAT),
            _ => None,
        }
    }

    /// Returns the four-channel encoding with an alpha channel that stores the same data as this
    /// three-channel encoding.
    pub const fn rgb_to_rgba(self) -> Option<Self> {
        match self {
            Self::R8G8B8_UNORM => Some(Self::R8G8B8A8_UNORM),
            Self::R8G8B8_UNORM_SRGB => Some(Self::R8G8B8A8_UNORM_SRGB),
            Self::R16G16B16_FLOAT => Some(Self::R16G16B16A16_FLOAT),
            Self::R32G32B32_UINT => Some(Self::R32G32B32A32_UINT),
            Self::R32G32B32_SINT => Some(Self::R32G32B32A32_SINT),
            Self::R32G32B32_FLOAT => Some(Self::R32G32B32A32_FLOAT),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TexelEncoding;

    #[test]
    fn version_gated_capabilities() {
        assert!(TexelEncoding::A1B5G5R5_UNORM.supports_sampling(42));
        assert!(!TexelEncoding::A1B5G5R5_UNORM.supports_rendering(42));
        assert!(TexelEncoding::A1B5G5R5_UNORM.supports_rendering(71));
        assert!(!TexelEncoding::BC1_UNORM.supports_sampling(u8::MAX - 1));
        assert!(!TexelEncoding::UNSUPPORTED.supports_sampling(71));
    }

    #[test]
    fn rgb_substitutes() {
        for encoding in [
            TexelEncoding::R8G8B8_UNORM,
            TexelEncoding::R16G16B16_FLOAT,
            TexelEncoding::R32G32B32_FLOAT,
        ] {
            assert!(!encoding.is_power_of_two_sized());

            let rgba = encoding.rgb_to_rgba().unwrap();
            assert!(rgba.is_power_of_two_sized());
            assert!(rgba.layout().has_alpha);

            if let Some(rgbx) = encoding.rgb_to_rgbx() {
                assert_eq!(rgbx.bytes_per_block(), rgba.bytes_per_block());
                assert!(!rgbx.layout().has_alpha);
            }
        }

        assert_eq!(TexelEncoding::R8G8B8A8_UNORM.rgb_to_rgbx(), None);
    }

    #[test]
    fn block_layout() {
        let astc = TexelEncoding::ASTC_8X8_UNORM.layout();
        assert_eq!((astc.block_width, astc.block_height), (8, 8));
        assert_eq!(TexelEncoding::ASTC_8X8_UNORM.bytes_per_block(), 16);
        assert!(TexelEncoding::YCRCB_NORMAL.is_yuv());
        assert_eq!(TexelEncoding::R8G8B8_UNORM.bytes_per_block(), 3);
    }
}

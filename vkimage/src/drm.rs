// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! DRM format modifiers and fourcc codes.
//!
//! A format modifier is a 64-bit token agreed between drivers and the kernel that names the byte
//! layout of a buffer: the top 8 bits identify the vendor, the remaining 56 bits are vendor
//! specific.

pub const DRM_FORMAT_MOD_VENDOR_NONE: u8 = 0x00;
pub const DRM_FORMAT_MOD_VENDOR_INTEL: u8 = 0x01;
pub const DRM_FORMAT_MOD_VENDOR_BROADCOM: u8 = 0x07;

/// Builds a modifier value from a vendor and a vendor-specific code.
#[inline]
pub const fn fourcc_mod_code(vendor: u8, value: u64) -> u64 {
    ((vendor as u64) << 56) | (value & 0x00ff_ffff_ffff_ffff)
}

/// Returns the vendor part of a modifier.
#[inline]
pub const fn modifier_vendor(modifier: u64) -> u8 {
    (modifier >> 56) as u8
}

/// Plain row-major layout.
pub const DRM_FORMAT_MOD_LINEAR: u64 = 0;

/// Reserved value meaning "no modifier".
pub const DRM_FORMAT_MOD_INVALID: u64 = fourcc_mod_code(DRM_FORMAT_MOD_VENDOR_NONE, (1 << 56) - 1);

pub const DRM_FORMAT_MOD_BROADCOM_VC4_T_TILED: u64 = fourcc_mod_code(DRM_FORMAT_MOD_VENDOR_BROADCOM, 1);

/// Broadcom UIF tiling, the native layout of tiled images on V3D.
pub const DRM_FORMAT_MOD_BROADCOM_UIF: u64 = fourcc_mod_code(DRM_FORMAT_MOD_VENDOR_BROADCOM, 6);

pub const I915_FORMAT_MOD_Y_TILED: u64 = fourcc_mod_code(DRM_FORMAT_MOD_VENDOR_INTEL, 2);

/// Y tiling with a compression control surface carried as a second memory plane.
pub const I915_FORMAT_MOD_Y_TILED_CCS: u64 = fourcc_mod_code(DRM_FORMAT_MOD_VENDOR_INTEL, 4);

/// Builds a fourcc code from its four characters.
#[inline]
pub const fn fourcc_code(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

pub const DRM_FORMAT_ABGR8888: u32 = fourcc_code(b'A', b'B', b'2', b'4');
pub const DRM_FORMAT_XBGR8888: u32 = fourcc_code(b'X', b'B', b'2', b'4');
pub const DRM_FORMAT_RGB565: u32 = fourcc_code(b'R', b'G', b'1', b'6');
pub const DRM_FORMAT_NV12: u32 = fourcc_code(b'N', b'V', b'1', b'2');
pub const DRM_FORMAT_YUV420: u32 = fourcc_code(b'Y', b'U', b'1', b'2');
/// 3-plane 4:2:0 with the V plane before the U plane.
pub const DRM_FORMAT_YVU420: u32 = fourcc_code(b'Y', b'V', b'1', b'2');

/// Describes how the driver handles one DRM format modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DrmModifierInfo {
    /// The modifier value.
    pub modifier: u64,

    /// Whether the modifier describes a tiled layout. Only `DRM_FORMAT_MOD_LINEAR` is untiled.
    pub tiled: bool,

    /// Whether the modifier carries auxiliary compression metadata in additional memory planes.
    pub has_aux: bool,
}

impl DrmModifierInfo {
    pub const LINEAR: Self = Self {
        modifier: DRM_FORMAT_MOD_LINEAR,
        tiled: false,
        has_aux: false,
    };

    pub const BROADCOM_UIF: Self = Self {
        modifier: DRM_FORMAT_MOD_BROADCOM_UIF,
        tiled: true,
        has_aux: false,
    };

    /// Returns the number of memory planes an image of `format_planes` format planes has when
    /// laid out with this modifier.
    #[inline]
    pub const fn memory_plane_count(&self, format_planes: u32) -> u32 {
        if self.has_aux {
            format_planes * 2
        } else {
            format_planes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        assert_eq!(DRM_FORMAT_MOD_INVALID, 0x00ff_ffff_ffff_ffff);
        assert_eq!(DRM_FORMAT_MOD_BROADCOM_UIF, 0x0700_0000_0000_0006);
        assert_eq!(modifier_vendor(DRM_FORMAT_MOD_BROADCOM_UIF), DRM_FORMAT_MOD_VENDOR_BROADCOM);
        assert_eq!(DRM_FORMAT_YVU420, 0x3231_5659);
        assert_eq!(DRM_FORMAT_NV12, 0x3231_564e);
    }

    #[test]
    fn aux_planes() {
        let ccs = DrmModifierInfo {
            modifier: I915_FORMAT_MOD_Y_TILED_CCS,
            tiled: true,
            has_aux: true,
        };
        assert_eq!(ccs.memory_plane_count(1), 2);
        assert_eq!(DrmModifierInfo::BROADCOM_UIF.memory_plane_count(2), 2);
    }
}

// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use crate::{
    drm::{DrmModifierInfo, DRM_FORMAT_MOD_BROADCOM_UIF},
    DeviceSize,
};

/// How the hardware samples from images that use a linear (raster) layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinearSampling {
    /// The texture unit reads linear images directly.
    Native,

    /// The texture unit can't read linear images; sampled linear images get a tiled shadow copy
    /// that the driver keeps up to date.
    ShadowCopy,

    /// Linear images can't be sampled at all.
    Unsupported,
}

/// Geometry constants, limits and capabilities of one GPU generation.
///
/// Everything the layout planner, the format resolver and the memory binder need to know about
/// the hardware is in here; none of it is hard-coded elsewhere.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HardwareConfig {
    /// Hardware version as `major * 10 + minor`, e.g. `42` for V3D 4.2. The native texel
    /// encoding capability table is keyed on this.
    pub version: u8,

    /// Size in bytes of a micro-tile. The micro-tile width and height in texels are derived from
    /// this and the bytes per texel.
    pub utile_size: u32,

    /// Size in bytes of a UIF page.
    pub uif_page_size: u32,

    /// Number of DRAM banks the UIF pages are spread over.
    pub uif_banks: u32,

    /// Alignment of the base of every tiled plane.
    pub tiled_alignment: DeviceSize,

    /// Minimum alignment of the base of linear planes. The effective alignment is the larger of
    /// this and the bytes per texel.
    pub linear_min_alignment: DeviceSize,

    /// Device memory is allocated in multiples of this.
    pub allocation_granularity: DeviceSize,

    /// Largest single device memory allocation.
    pub max_allocation_size: DeviceSize,

    /// Largest total size of an image.
    pub max_resource_size: DeviceSize,

    /// Alignment of buffers.
    pub buffer_alignment: DeviceSize,

    pub max_image_dimension_1d: u32,
    pub max_image_dimension_2d: u32,
    pub max_image_dimension_3d: u32,
    pub max_image_array_layers: u32,

    /// Whether 4x multisampling is available.
    pub multisample: bool,

    /// Whether the hardware can render to linear images.
    pub linear_rendering: bool,

    /// How linear images are sampled.
    pub linear_sampling: LinearSampling,

    /// Whether the video decode engine is present.
    pub video_decode: bool,

    /// The modifier used for tiled images when the application doesn't ask for one.
    pub optimal_modifier: u64,

    /// DRM format modifiers the driver can lay images out with, in order of preference.
    pub modifiers: Vec<DrmModifierInfo>,
}

impl HardwareConfig {
    /// Configuration of the V3D 4.2 GPU.
    pub fn v3d_4_2() -> Self {
        HardwareConfig {
            version: 42,
            utile_size: 64,
            uif_page_size: 4096,
            uif_banks: 8,
            tiled_alignment: 4096,
            linear_min_alignment: 1,
            allocation_granularity: 4096,
            max_allocation_size: 1 << 30,
            max_resource_size: 0xffff_ffff,
            buffer_alignment: 256,
            max_image_dimension_1d: 4096,
            max_image_dimension_2d: 4096,
            max_image_dimension_3d: 4096,
            max_image_array_layers: 2048,
            multisample: true,
            linear_rendering: true,
            linear_sampling: LinearSampling::ShadowCopy,
            video_decode: false,
            optimal_modifier: DRM_FORMAT_MOD_BROADCOM_UIF,
            modifiers: vec![DrmModifierInfo::BROADCOM_UIF, DrmModifierInfo::LINEAR],
        }
    }

    /// Configuration of the V3D 7.1 GPU.
    pub fn v3d_7_1() -> Self {
        HardwareConfig {
            version: 71,
            max_image_dimension_1d: 7680,
            max_image_dimension_2d: 7680,
            max_image_dimension_3d: 7680,
            ..Self::v3d_4_2()
        }
    }

    /// Returns the handling of `modifier`, or `None` if the driver doesn't support it.
    #[inline]
    pub fn modifier_info(&self, modifier: u64) -> Option<&DrmModifierInfo> {
        self.modifiers.iter().find(|info| info.modifier == modifier)
    }

    /// Returns the width and height in texels of a micro-tile for texels of `cpp` bytes.
    ///
    /// A micro-tile holds `utile_size / cpp` texels, laid out as close to square as possible
    /// with the width being the larger side.
    #[inline]
    pub fn utile_dimensions(&self, cpp: u32) -> (u32, u32) {
        let texels = (self.utile_size / cpp.max(1)).max(1);
        let log2 = texels.ilog2();
        let width = 1 << log2.div_ceil(2);

        (width, (texels / width).max(1))
    }

    /// Returns the width and height in texels of a UIF block, which is 2x2 micro-tiles.
    #[inline]
    pub fn uif_block_dimensions(&self, cpp: u32) -> (u32, u32) {
        let (utile_width, utile_height) = self.utile_dimensions(cpp);

        (utile_width * 2, utile_height * 2)
    }

    /// Size in bytes of a UIF block.
    #[inline]
    pub fn uif_block_size(&self) -> u32 {
        4 * self.utile_size
    }

    /// Size in bytes of a row of four UIF blocks.
    #[inline]
    pub fn uif_block_row_size(&self) -> u32 {
        4 * self.uif_block_size()
    }

    /// Size in bytes of the page cache: one page per bank.
    #[inline]
    pub fn page_cache_size(&self) -> u32 {
        self.uif_page_size * self.uif_banks
    }

    /// Number of UIF block rows in a page.
    #[inline]
    pub fn page_ub_rows(&self) -> u32 {
        self.uif_page_size / self.uif_block_row_size()
    }

    /// One and a half pages worth of UIF block rows.
    #[inline]
    pub fn page_ub_rows_times_1_5(&self) -> u32 {
        (self.page_ub_rows() * 3) >> 1
    }

    /// Number of UIF block rows in the page cache.
    #[inline]
    pub fn page_cache_ub_rows(&self) -> u32 {
        self.page_cache_size() / self.uif_block_row_size()
    }

    /// The page cache minus one and a half pages, in UIF block rows.
    #[inline]
    pub fn page_cache_minus_1_5_ub_rows(&self) -> u32 {
        self.page_cache_ub_rows() - self.page_ub_rows_times_1_5()
    }
}

impl Default for HardwareConfig {
    #[inline]
    fn default() -> Self {
        Self::v3d_4_2()
    }
}

#[cfg(test)]
mod tests {
    use super::HardwareConfig;

    #[test]
    fn utile_dimensions() {
        let config = HardwareConfig::v3d_4_2();
        assert_eq!(config.utile_dimensions(1), (8, 8));
        assert_eq!(config.utile_dimensions(2), (8, 4));
        assert_eq!(config.utile_dimensions(4), (4, 4));
        assert_eq!(config.utile_dimensions(8), (4, 2));
        assert_eq!(config.utile_dimensions(16), (2, 2));
        assert_eq!(config.uif_block_dimensions(4), (8, 8));
    }

    #[test]
    fn page_cache_rows() {
        let config = HardwareConfig::v3d_4_2();
        assert_eq!(config.uif_block_row_size(), 1024);
        assert_eq!(config.page_cache_size(), 32768);
        assert_eq!(config.page_ub_rows(), 4);
        assert_eq!(config.page_ub_rows_times_1_5(), 6);
        assert_eq!(config.page_cache_ub_rows(), 32);
        assert_eq!(config.page_cache_minus_1_5_ub_rows(), 26);
    }

    #[test]
    fn modifier_lookup() {
        let config = HardwareConfig::v3d_7_1();
        assert!(config.modifier_info(crate::drm::DRM_FORMAT_MOD_BROADCOM_UIF).is_some());
        assert!(config.modifier_info(crate::drm::I915_FORMAT_MOD_Y_TILED).is_none());
        assert_eq!(config.max_image_dimension_2d, 7680);
    }
}

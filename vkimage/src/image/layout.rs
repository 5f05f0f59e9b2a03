// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The image layout planner.

use super::{minify, ImageType, SampleCount, SubresourceLayout};
use crate::{
    device::HardwareConfig,
    format::{PlaneDescriptor, TexelEncoding},
    memory::DeviceMemory,
    DeviceSize, VulkanError,
};
use smallvec::SmallVec;
use std::sync::{Arc, Weak};

/// Maximum number of mip levels of an image.
pub(crate) const MAX_MIP_LEVELS: usize = 15;

/// Base addresses of textures and of the planes of a non-disjoint image are 64-byte aligned.
const BASE_ALIGNMENT: DeviceSize = 64;

/// The memory layout of one mip level of a plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SliceTiling {
    /// Row-major texels.
    Raster,

    /// Micro-tiles in row-major order.
    LinearTile,

    /// A single column of UIF blocks.
    UbLinear1Column,

    /// Two columns of UIF blocks.
    UbLinear2Column,

    /// Columns of four UIF blocks.
    UifNoXor,

    /// Columns of four UIF blocks, with the bank address flipped on odd columns.
    UifXor,
}

impl SliceTiling {
    /// Returns whether the slice uses a UIF layout.
    #[inline]
    pub fn is_uif(self) -> bool {
        matches!(self, SliceTiling::UifNoXor | SliceTiling::UifXor)
    }
}

/// One mip level of a plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slice {
    /// Offset of the level from the start of the image's memory binding.
    pub offset: DeviceSize,

    /// Bytes between two rows of blocks.
    pub stride: DeviceSize,

    /// Bytes of one array layer or depth slice of the level.
    pub size: DeviceSize,

    /// Height in blocks, including tiling padding.
    pub padded_height: u32,

    pub tiling: SliceTiling,

    /// Extra UIF block rows added to avoid bank conflicts between columns.
    pub ub_pad: u32,

    /// Padded height in UIF blocks. Only meaningful for UIF slices.
    pub padded_height_of_output_image_in_uif_blocks: u32,
}

impl Default for Slice {
    #[inline]
    fn default() -> Self {
        Slice {
            offset: 0,
            stride: 0,
            size: 0,
            padded_height: 0,
            tiling: SliceTiling::Raster,
            ub_pad: 0,
            padded_height_of_output_image_in_uif_blocks: 0,
        }
    }
}

/// The layout of one plane of an image.
#[derive(Clone, Debug)]
pub struct PlaneLayout {
    encoding: TexelEncoding,
    cpp: u32,
    block_width: u32,
    block_height: u32,
    width: u32,
    height: u32,

    slices: SmallVec<[Slice; MAX_MIP_LEVELS]>,
    size: DeviceSize,
    cube_map_stride: DeviceSize,
    alignment: DeviceSize,

    memory: Option<Weak<DeviceMemory>>,
    memory_offset: DeviceSize,
}

impl PlaneLayout {
    /// Returns an empty layout for `plane` of an image with `extent`.
    pub(crate) fn new(plane: &PlaneDescriptor, extent: [u32; 3]) -> Self {
        let layout = plane.encoding.layout();
        let [width_scale, height_scale] = plane.denominator_scales;

        PlaneLayout {
            encoding: plane.encoding,
            cpp: plane.encoding.bytes_per_block(),
            block_width: layout.block_width,
            block_height: layout.block_height,
            width: extent[0].div_ceil(width_scale),
            height: extent[1].div_ceil(height_scale),
            slices: SmallVec::new(),
            size: 0,
            cube_map_stride: 0,
            alignment: 1,
            memory: None,
            memory_offset: 0,
        }
    }

    /// Returns the native encoding of the plane.
    #[inline]
    pub fn encoding(&self) -> TexelEncoding {
        self.encoding
    }

    /// Returns the bytes per texel block.
    #[inline]
    pub fn cpp(&self) -> u32 {
        self.cpp
    }

    /// Returns the width and height of the plane at mip level 0, in texels.
    #[inline]
    pub fn extent(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    /// Returns one slice per mip level.
    #[inline]
    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    /// Returns the total size in bytes of the plane, all levels and layers included.
    #[inline]
    pub fn size(&self) -> DeviceSize {
        self.size
    }

    /// Returns the distance between two array layers, or between two depth slices of level 0 for
    /// 3D images.
    #[inline]
    pub fn cube_map_stride(&self) -> DeviceSize {
        self.cube_map_stride
    }

    #[inline]
    pub fn alignment(&self) -> DeviceSize {
        self.alignment
    }

    /// Returns the memory the plane is bound to, if it is bound and the memory is still alive.
    #[inline]
    pub fn memory(&self) -> Option<Arc<DeviceMemory>> {
        self.memory.as_ref().and_then(Weak::upgrade)
    }

    /// Returns the offset of the binding into the memory.
    #[inline]
    pub fn memory_offset(&self) -> DeviceSize {
        self.memory_offset
    }

    #[inline]
    pub(crate) fn is_bound(&self) -> bool {
        self.memory.is_some()
    }

    pub(crate) fn bind(&mut self, memory: &Arc<DeviceMemory>, offset: DeviceSize) {
        self.memory = Some(Arc::downgrade(memory));
        self.memory_offset = offset;
    }

    /// Returns the offset of `layer` of mip `level`, from the start of the memory.
    ///
    /// Returns `None` if the level doesn't exist. The layer is not range-checked, as the plane
    /// doesn't know the layer count.
    pub fn layer_offset(
        &self,
        image_type: ImageType,
        level: u32,
        layer: u32,
    ) -> Option<DeviceSize> {
        let slice = self.slices.get(level as usize)?;
        let layer_stride = match image_type {
            ImageType::Dim3d => slice.size,
            ImageType::Dim1d | ImageType::Dim2d => self.cube_map_stride,
        };

        (layer as DeviceSize)
            .checked_mul(layer_stride)?
            .checked_add(slice.offset)?
            .checked_add(self.memory_offset)
    }

    /// Returns the externally visible layout of one subresource, or `None` if the level doesn't
    /// exist.
    pub fn subresource_layout(
        &self,
        image_type: ImageType,
        depth: u32,
        level: u32,
        layer: u32,
    ) -> Option<SubresourceLayout> {
        let offset = self.layer_offset(image_type, level, layer)? - self.memory_offset;
        let slice = &self.slices[level as usize];

        let size = if image_type == ImageType::Dim3d {
            if level == 0 {
                slice.size * depth as DeviceSize
            } else {
                // The level ends where the next bigger one starts.
                self.slices[level as usize - 1].offset - slice.offset
            }
        } else {
            slice.size
        };

        Some(SubresourceLayout {
            offset,
            size,
            row_pitch: slice.stride,
            array_pitch: self.cube_map_stride,
            depth_pitch: self.cube_map_stride,
        })
    }
}

/// The image parameters that the layout depends on.
#[derive(Clone, Copy, Debug)]
pub struct LayoutParams<'a> {
    pub config: &'a HardwareConfig,
    pub image_type: ImageType,
    pub extent: [u32; 3],
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: SampleCount,
    pub tiled: bool,
}

/// Computes the slices of every plane.
///
/// Each plane starts at its own offset 0 if `disjoint`; otherwise the planes follow each other in
/// one allocation. `explicit` is the per-plane layout supplied with a DRM format modifier, which
/// is validated against the computed minimum.
///
/// Returns the size of the whole image when it isn't disjoint, and 0 when it is.
pub(crate) fn setup_slices(
    params: &LayoutParams<'_>,
    planes: &mut [PlaneLayout],
    mut disjoint: bool,
    explicit: Option<&[SubresourceLayout]>,
) -> Result<DeviceSize, VulkanError> {
    if disjoint && planes.len() == 1 {
        disjoint = false;
    }

    if let Some(explicit) = explicit {
        if explicit.len() != planes.len() {
            return Err(VulkanError::InvalidDrmFormatModifierPlaneLayout);
        }
    }

    let mut offset: DeviceSize = 0;

    for (index, plane) in planes.iter_mut().enumerate() {
        if disjoint {
            offset = 0;
        }

        let explicit = explicit.map(|layouts| &layouts[index]);
        let start = match explicit {
            Some(layout) => {
                if layout.offset % BASE_ALIGNMENT != 0 {
                    return Err(VulkanError::InvalidDrmFormatModifierPlaneLayout);
                }

                layout.offset
            }
            None => offset,
        };

        setup_plane_slices(params, plane, start, explicit)?;

        if plane.size > params.config.max_resource_size {
            return Err(VulkanError::OutOfDeviceMemory);
        }

        offset = start + plane.size.next_multiple_of(BASE_ALIGNMENT);
    }

    if offset > params.config.max_resource_size {
        return Err(VulkanError::OutOfDeviceMemory);
    }

    Ok(if disjoint { 0 } else { offset })
}

fn setup_plane_slices(
    params: &LayoutParams<'_>,
    plane: &mut PlaneLayout,
    plane_offset: DeviceSize,
    explicit: Option<&SubresourceLayout>,
) -> Result<(), VulkanError> {
    let config = params.config;
    let cpp = plane.cpp;

    assert!(cpp > 0);
    assert!(params.mip_levels >= 1 && params.mip_levels as usize <= MAX_MIP_LEVELS);
    assert!(params.array_layers >= 1);

    let (utile_w, utile_h) = config.utile_dimensions(cpp);
    let (uif_block_w, uif_block_h) = config.uif_block_dimensions(cpp);
    let depth = params.extent[2];

    // Padding of levels 2 and up comes from level 1 rounded up to a power of two, so that the
    // whole chain below level 1 is self-similar.
    let pot_width = 2 * minify(plane.width, 1).next_power_of_two();
    let pot_height = 2 * minify(plane.height, 1).next_power_of_two();
    let pot_depth = 2 * minify(depth, 1).next_power_of_two();

    let msaa = params.samples != SampleCount::Sample1;
    let uif_top = msaa;

    plane.slices.clear();
    plane
        .slices
        .resize(params.mip_levels as usize, Slice::default());

    let mut offset = plane_offset;

    for level in (0..params.mip_levels).rev() {
        let mut level_width;
        let mut level_height;

        if level < 2 {
            level_width = minify(plane.width, level);
            level_height = minify(plane.height, level);
        } else {
            level_width = minify(pot_width, level);
            level_height = minify(pot_height, level);
        }

        let level_depth = if level < 1 {
            minify(depth, level)
        } else {
            minify(pot_depth, level)
        };

        if msaa {
            level_width *= 2;
            level_height *= 2;
        }

        level_width = level_width.div_ceil(plane.block_width);
        level_height = level_height.div_ceil(plane.block_height);

        let mut slice = Slice::default();
        // The top level of a multisampled image is always UIF.
        let may_shrink = level != 0 || !uif_top;

        if !params.tiled {
            slice.tiling = SliceTiling::Raster;

            if params.image_type == ImageType::Dim1d {
                level_width = level_width.next_multiple_of((64 / cpp).max(1));
            }
        } else if may_shrink && (level_width <= utile_w || level_height <= utile_h) {
            slice.tiling = SliceTiling::LinearTile;
            level_width = level_width.next_multiple_of(utile_w);
            level_height = level_height.next_multiple_of(utile_h);
        } else if may_shrink && level_width <= uif_block_w {
            slice.tiling = SliceTiling::UbLinear1Column;
            level_width = level_width.next_multiple_of(uif_block_w);
            level_height = level_height.next_multiple_of(uif_block_h);
        } else if may_shrink && level_width <= 2 * uif_block_w {
            slice.tiling = SliceTiling::UbLinear2Column;
            level_width = level_width.next_multiple_of(2 * uif_block_w);
            level_height = level_height.next_multiple_of(uif_block_h);
        } else {
            // Width is aligned to a column of four UIF blocks, height only to UIF blocks.
            level_width = level_width.next_multiple_of(4 * uif_block_w);
            level_height = level_height.next_multiple_of(uif_block_h);

            slice.ub_pad = ub_pad(config, cpp, level_height);
            level_height += slice.ub_pad * uif_block_h;

            // When the padding lands on the page cache size, the hardware flips the bank on odd
            // columns, which misaligns them perfectly.
            slice.tiling = if (level_height / uif_block_h) % config.page_cache_ub_rows() == 0 {
                SliceTiling::UifXor
            } else {
                SliceTiling::UifNoXor
            };
        }

        slice.offset = offset;
        slice.stride = level_width as DeviceSize * cpp as DeviceSize;

        // The explicit row pitch is that of level 0.
        if let (Some(layout), 0) = (explicit, level) {
            let macro_block_pitch = 4 * uif_block_w as DeviceSize * cpp as DeviceSize;

            if layout.row_pitch < slice.stride
                || layout.row_pitch % cpp as DeviceSize != 0
                || (params.tiled && layout.row_pitch % macro_block_pitch != 0)
            {
                return Err(VulkanError::InvalidDrmFormatModifierPlaneLayout);
            }

            slice.stride = layout.row_pitch;
        }

        slice.padded_height = level_height;

        if slice.tiling.is_uif() {
            slice.padded_height_of_output_image_in_uif_blocks =
                slice.padded_height / (2 * utile_h);
        }

        slice.size = level_height as DeviceSize * slice.stride;
        let mut slice_total_size = slice.size * level_depth as DeviceSize;

        // Level 1 starts on a page if it or anything below it could be UIF XOR. The lower levels
        // inherit that alignment through their power-of-two padding.
        if level == 1
            && level_width > 4 * uif_block_w
            && level_height > config.page_cache_minus_1_5_ub_rows() * uif_block_h
        {
            slice_total_size =
                slice_total_size.next_multiple_of(config.uif_page_size as DeviceSize);
        }

        offset += slice_total_size;
        plane.slices[level as usize] = slice;
    }

    plane.size = offset - plane_offset;

    // Levels are laid out small to big, so level 0 may follow a level that is only aligned to
    // micro-tiles. Shifting the whole chain puts level 0 on the plane alignment.
    plane.alignment = if params.tiled {
        config.tiled_alignment
    } else {
        (cpp as DeviceSize).max(config.linear_min_alignment)
    };

    let level0_offset = plane.slices[0].offset;
    let align_offset = level0_offset.next_multiple_of(plane.alignment) - level0_offset;

    if align_offset != 0 {
        plane.size += align_offset;

        for slice in &mut plane.slices {
            slice.offset += align_offset;
        }
    }

    if params.image_type != ImageType::Dim3d {
        // Distance from one full mip chain to the next.
        let level0 = &plane.slices[0];
        plane.cube_map_stride =
            (level0.offset - plane_offset + level0.size).next_multiple_of(BASE_ALIGNMENT);

        if let Some(layout) = explicit {
            if params.array_layers > 1 {
                if layout.array_pitch % BASE_ALIGNMENT != 0
                    || layout.array_pitch < plane.cube_map_stride
                {
                    return Err(VulkanError::InvalidDrmFormatModifierPlaneLayout);
                }

                plane.cube_map_stride = layout.array_pitch;
            }
        }

        plane.size += plane.cube_map_stride * (params.array_layers as DeviceSize - 1);
    } else {
        plane.cube_map_stride = plane.slices[0].size;

        if let Some(layout) = explicit {
            if layout.depth_pitch < plane.cube_map_stride {
                return Err(VulkanError::InvalidDrmFormatModifierPlaneLayout);
            }

            plane.cube_map_stride = layout.depth_pitch;
        }
    }

    Ok(())
}

/// Returns the number of UIF block rows to pad a UIF level of `height` rows with, so that the
/// same bank in neighboring columns is at least half a page apart.
fn ub_pad(config: &HardwareConfig, cpp: u32, height: u32) -> u32 {
    let (_, uif_block_h) = config.uif_block_dimensions(cpp);
    let height_ub = height / uif_block_h;
    let page_cache_ub_rows = config.page_cache_ub_rows();
    let page_ub_rows_times_1_5 = config.page_ub_rows_times_1_5();

    let height_offset_in_pc = height_ub % page_cache_ub_rows;

    // Already aligned for UIF XOR.
    if height_offset_in_pc == 0 {
        return 0;
    }

    if height_offset_in_pc < page_ub_rows_times_1_5 {
        // Fits in the page cache entirely.
        if height_ub < page_cache_ub_rows {
            return 0;
        }

        return page_ub_rows_times_1_5 - height_offset_in_pc;
    }

    // Close to the page cache size, so round up and rely on XOR.
    if height_offset_in_pc > config.page_cache_minus_1_5_ub_rows() {
        return page_cache_ub_rows - height_offset_in_pc;
    }

    0
}

#[cfg(test)]
mod tests {
    use super::{setup_slices, ub_pad, LayoutParams, PlaneLayout, SliceTiling};
    use crate::{
        device::HardwareConfig,
        format::{descriptor, Format},
        image::{ImageTiling, ImageType, SampleCount, SubresourceLayout},
        VulkanError,
    };

    fn params(config: &HardwareConfig, extent: [u32; 3], tiled: bool) -> LayoutParams<'_> {
        LayoutParams {
            config,
            image_type: if extent[2] > 1 {
                ImageType::Dim3d
            } else {
                ImageType::Dim2d
            },
            extent,
            mip_levels: 1,
            array_layers: 1,
            samples: SampleCount::Sample1,
            tiled,
        }
    }

    fn plane_layouts(
        config: &HardwareConfig,
        format: Format,
        tiling: ImageTiling,
        extent: [u32; 3],
    ) -> Vec<PlaneLayout> {
        let desc = descriptor(format).unwrap();

        (0..desc.plane_count() as usize)
            .map(|index| PlaneLayout::new(&desc.plane(index, tiling, config), extent))
            .collect()
    }

    #[test]
    fn linear_single_level() {
        let config = HardwareConfig::v3d_4_2();
        let params = params(&config, [100, 50, 1], false);
        let mut planes = plane_layouts(
            &config,
            Format::R8G8B8A8_UNORM,
            ImageTiling::Linear,
            [100, 50, 1],
        );

        let size = setup_slices(&params, &mut planes, false, None).unwrap();
        let plane = &planes[0];

        assert_eq!(plane.slices()[0].tiling, SliceTiling::Raster);
        assert_eq!(plane.slices()[0].stride, 400);
        assert_eq!(plane.size(), 50 * 400);
        assert_eq!(plane.alignment(), 4);
        assert_eq!(size, (50 * 400u64).next_multiple_of(64));
    }

    #[test]
    fn mip_chain_back_to_front() {
        let config = HardwareConfig::v3d_4_2();

        for tiled in [false, true] {
            let params = LayoutParams {
                mip_levels: 9,
                array_layers: 3,
                ..params(&config, [256, 200, 1], tiled)
            };
            let mut planes = plane_layouts(
                &config,
                Format::R8G8B8A8_UNORM,
                ImageTiling::Optimal,
                [256, 200, 1],
            );
            setup_slices(&params, &mut planes, false, None).unwrap();
            let plane = &planes[0];

            for level in 1..9 {
                assert!(plane.slices()[level - 1].offset > plane.slices()[level].offset);
            }

            assert_eq!(plane.slices()[0].offset % plane.alignment(), 0);
            assert_eq!(plane.cube_map_stride() % 64, 0);
            assert!(plane.size() > plane.cube_map_stride() * 2);
        }
    }

    #[test]
    fn uif_xor() {
        let config = HardwareConfig::v3d_4_2();
        let params = params(&config, [256, 256, 1], true);
        let mut planes = plane_layouts(
            &config,
            Format::R8G8B8A8_UNORM,
            ImageTiling::Optimal,
            [256, 256, 1],
        );
        setup_slices(&params, &mut planes, false, None).unwrap();
        let plane = &planes[0];

        let slice = &plane.slices()[0];
        assert_eq!(slice.tiling, SliceTiling::UifXor);
        assert_eq!(slice.stride, 1024);
        assert_eq!(slice.size, 262_144);
        assert_eq!(slice.padded_height_of_output_image_in_uif_blocks, 32);
        assert_eq!(plane.alignment(), 4096);
        assert_eq!(plane.size(), 262_144);
    }

    #[test]
    fn small_level_tilings() {
        let config = HardwareConfig::v3d_4_2();

        let check = |width, height, expected| {
            let params = params(&config, [width, height, 1], true);
            let mut planes = plane_layouts(
                &config,
                Format::R8G8B8A8_UNORM,
                ImageTiling::Optimal,
                [width, height, 1],
            );
            setup_slices(&params, &mut planes, false, None).unwrap();
            assert_eq!(planes[0].slices()[0].tiling, expected);
        };

        check(4, 64, SliceTiling::LinearTile);
        check(64, 3, SliceTiling::LinearTile);
        check(8, 64, SliceTiling::UbLinear1Column);
        check(16, 64, SliceTiling::UbLinear2Column);
        check(33, 64, SliceTiling::UifNoXor);
    }

    #[test]
    fn msaa_top_level_is_uif() {
        let config = HardwareConfig::v3d_4_2();
        let params = LayoutParams {
            samples: SampleCount::Sample4,
            ..params(&config, [4, 4, 1], true)
        };
        let mut planes = plane_layouts(
            &config,
            Format::R8G8B8A8_UNORM,
            ImageTiling::Optimal,
            [4, 4, 1],
        );
        setup_slices(&params, &mut planes, false, None).unwrap();

        let slice = &planes[0].slices()[0];
        assert!(slice.tiling.is_uif());
        // 4x4 doubled to 8x8, then padded to a column of four UIF blocks.
        assert_eq!(slice.stride, 32 * 4);
    }

    #[test]
    fn ub_padding() {
        let config = HardwareConfig::v3d_4_2();

        assert_eq!(ub_pad(&config, 4, 256), 0);
        assert_eq!(ub_pad(&config, 4, 64), 0);
        assert_eq!(ub_pad(&config, 4, 264), 5);
        assert_eq!(ub_pad(&config, 4, 248), 1);

        let check = |height, padded, tiling| {
            let params = params(&config, [256, height, 1], true);
            let mut planes = plane_layouts(
                &config,
                Format::R8G8B8A8_UNORM,
                ImageTiling::Optimal,
                [256, height, 1],
            );
            setup_slices(&params, &mut planes, false, None).unwrap();
            let slice = &planes[0].slices()[0];
            assert_eq!(slice.padded_height, padded);
            assert_eq!(slice.tiling, tiling);
        };

        check(264, 304, SliceTiling::UifNoXor);
        check(248, 256, SliceTiling::UifXor);
    }

    #[test]
    fn explicit_layout() {
        let config = HardwareConfig::v3d_4_2();
        let params = params(&config, [64, 64, 1], false);

        let mut planes = plane_layouts(
            &config,
            Format::R8G8B8A8_UNORM,
            ImageTiling::Linear,
            [64, 64, 1],
        );
        let layout = SubresourceLayout {
            offset: 0,
            row_pitch: 512,
            ..Default::default()
        };
        setup_slices(&params, &mut planes, false, Some(&[layout])).unwrap();
        assert_eq!(planes[0].slices()[0].stride, 512);
        assert_eq!(planes[0].size(), 64 * 512);

        let reject = |layout: SubresourceLayout, tiled| {
            let params = LayoutParams { tiled, ..params };
            let mut planes = plane_layouts(
                &config,
                Format::R8G8B8A8_UNORM,
                ImageTiling::Linear,
                [64, 64, 1],
            );
            assert_eq!(
                setup_slices(&params, &mut planes, false, Some(&[layout])),
                Err(VulkanError::InvalidDrmFormatModifierPlaneLayout),
            );
        };

        // Below the minimum.
        reject(SubresourceLayout { row_pitch: 128, ..layout }, false);
        // Not a multiple of the texel size.
        reject(SubresourceLayout { row_pitch: 258, ..layout }, false);
        // Not a multiple of the macro-block width.
        reject(SubresourceLayout { row_pitch: 320, ..layout }, true);
        // Misaligned offset.
        reject(SubresourceLayout { offset: 32, ..layout }, false);

        // Wrong number of planes.
        let mut planes = plane_layouts(
            &config,
            Format::R8G8B8A8_UNORM,
            ImageTiling::Linear,
            [64, 64, 1],
        );
        assert_eq!(
            setup_slices(&params, &mut planes, false, Some(&[layout, layout])),
            Err(VulkanError::InvalidDrmFormatModifierPlaneLayout),
        );
    }

    #[test]
    fn explicit_array_pitch() {
        let config = HardwareConfig::v3d_4_2();
        let params = LayoutParams {
            array_layers: 2,
            ..params(&config, [64, 64, 1], false)
        };
        let layout = SubresourceLayout {
            row_pitch: 256,
            array_pitch: 64 * 256 + 64,
            ..Default::default()
        };

        let mut planes = plane_layouts(
            &config,
            Format::R8G8B8A8_UNORM,
            ImageTiling::Linear,
            [64, 64, 1],
        );
        setup_slices(&params, &mut planes, false, Some(&[layout])).unwrap();
        assert_eq!(planes[0].cube_map_stride(), 64 * 256 + 64);
        assert_eq!(planes[0].size(), 64 * 256 + 64 * 256 + 64);

        let layout = SubresourceLayout {
            array_pitch: 64 * 256 - 64,
            ..layout
        };
        assert_eq!(
            setup_slices(&params, &mut planes, false, Some(&[layout])),
            Err(VulkanError::InvalidDrmFormatModifierPlaneLayout),
        );
    }

    #[test]
    fn two_plane_ycbcr() {
        let config = HardwareConfig::v3d_4_2();
        let params = params(&config, [64, 64, 1], false);
        let format = Format::G8_B8R8_2PLANE_420_UNORM;

        let mut planes = plane_layouts(&config, format, ImageTiling::Linear, [64, 64, 1]);
        let size = setup_slices(&params, &mut planes, false, None).unwrap();
        assert_eq!(planes[1].extent(), [32, 32]);
        assert_eq!(planes[0].slices()[0].offset, 0);
        assert_eq!(planes[1].slices()[0].offset, 4096);
        assert_eq!(planes[1].slices()[0].stride, 64);
        assert_eq!(size, 4096 + 2048);

        let mut planes = plane_layouts(&config, format, ImageTiling::Linear, [64, 64, 1]);
        let size = setup_slices(&params, &mut planes, true, None).unwrap();
        assert_eq!(size, 0);
        assert_eq!(planes[1].slices()[0].offset, 0);
    }

    #[test]
    fn three_dimensional() {
        let config = HardwareConfig::v3d_4_2();
        let params = params(&config, [16, 16, 4], false);
        let mut planes = plane_layouts(
            &config,
            Format::R8G8B8A8_UNORM,
            ImageTiling::Linear,
            [16, 16, 4],
        );
        setup_slices(&params, &mut planes, false, None).unwrap();

        let plane = &planes[0];
        assert_eq!(plane.cube_map_stride(), 16 * 64);
        assert_eq!(plane.size(), 4 * 16 * 64);

        let layout = plane.subresource_layout(ImageType::Dim3d, 4, 0, 0).unwrap();
        assert_eq!(layout.size, 4 * 16 * 64);
        assert_eq!(layout.depth_pitch, 16 * 64);

        assert_eq!(plane.layer_offset(ImageType::Dim3d, 0, 3), Some(3 * 16 * 64));
        assert_eq!(plane.layer_offset(ImageType::Dim3d, 1, 0), None);
        assert_eq!(plane.layer_offset(ImageType::Dim2d, u32::MAX, 0), None);
        assert_eq!(plane.subresource_layout(ImageType::Dim3d, 4, 1, 0), None);
    }

    #[test]
    fn resource_size_limit() {
        let config = HardwareConfig {
            max_resource_size: 1 << 16,
            ..HardwareConfig::v3d_4_2()
        };
        let params = params(&config, [256, 256, 1], false);
        let mut planes = plane_layouts(
            &config,
            Format::R8G8B8A8_UNORM,
            ImageTiling::Linear,
            [256, 256, 1],
        );

        assert_eq!(
            setup_slices(&params, &mut planes, false, None),
            Err(VulkanError::OutOfDeviceMemory),
        );
    }
}

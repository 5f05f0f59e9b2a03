// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Computes the features a format supports on a given hardware generation.
//!
//! The result only depends on the format, the tiling, the DRM format modifier and the
//! [`HardwareConfig`], so it is recomputed on every query rather than cached.

use super::{
    descriptor, ChannelType, Colorspace, ComponentSwizzle, Format, FormatFeatures, TexelEncoding,
};
use crate::{
    device::{HardwareConfig, LinearSampling},
    image::{ImageAspects, ImageTiling},
};

/// Features that images of YCbCr and video formats never have.
const DISALLOWED_YCBCR_IMAGE_FEATURES: FormatFeatures = FormatFeatures::BLIT_SRC
    .union(FormatFeatures::BLIT_DST)
    .union(FormatFeatures::COLOR_ATTACHMENT)
    .union(FormatFeatures::COLOR_ATTACHMENT_BLEND)
    .union(FormatFeatures::STORAGE_IMAGE)
    .union(FormatFeatures::STORAGE_IMAGE_ATOMIC)
    .union(FormatFeatures::STORAGE_READ_WITHOUT_FORMAT)
    .union(FormatFeatures::STORAGE_WRITE_WITHOUT_FORMAT);

/// Storage features, which bypass auxiliary compression metadata.
const STORAGE_FEATURES: FormatFeatures = FormatFeatures::STORAGE_IMAGE
    .union(FormatFeatures::STORAGE_IMAGE_ATOMIC)
    .union(FormatFeatures::STORAGE_READ_WITHOUT_FORMAT)
    .union(FormatFeatures::STORAGE_WRITE_WITHOUT_FORMAT);

/// Returns the features supported by images of `format` with `tiling`.
///
/// `drm_format_modifier` is only looked at when `tiling` is
/// [`ImageTiling::DrmFormatModifier`]; a modifier that the hardware doesn't support yields no
/// features.
pub fn image_format_features(
    config: &HardwareConfig,
    format: Format,
    tiling: ImageTiling,
    drm_format_modifier: Option<u64>,
) -> FormatFeatures {
    let Some(desc) = descriptor(format) else {
        return FormatFeatures::empty();
    };

    let modifier = match tiling {
        ImageTiling::DrmFormatModifier => {
            match drm_format_modifier.and_then(|modifier| config.modifier_info(modifier)) {
                Some(info) => Some(*info),
                None => return FormatFeatures::empty(),
            }
        }
        ImageTiling::Optimal | ImageTiling::Linear => None,
    };

    let aspects = desc.aspects();

    if aspects.intersects(ImageAspects::DEPTH | ImageAspects::STENCIL) {
        // Depth/stencil images only exist in the hardware's own tiled layout.
        if tiling != ImageTiling::Optimal {
            return FormatFeatures::empty();
        }

        let mut features = FormatFeatures::SAMPLED_IMAGE
            | FormatFeatures::DEPTH_STENCIL_ATTACHMENT
            | FormatFeatures::BLIT_SRC
            | FormatFeatures::BLIT_DST
            | FormatFeatures::TRANSFER_SRC
            | FormatFeatures::TRANSFER_DST;

        if aspects.intersects(ImageAspects::DEPTH) {
            features |= FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR
                | FormatFeatures::SAMPLED_IMAGE_FILTER_MINMAX
                | FormatFeatures::SAMPLED_IMAGE_DEPTH_COMPARISON;
        }

        return features;
    }

    let version = config.version;
    let plane = desc.plane(0, tiling, config);
    let base = desc.planes()[0].encoding;

    if plane.encoding == TexelEncoding::UNSUPPORTED {
        return FormatFeatures::empty();
    }

    // The texture unit only decodes compressed blocks from tiled memory.
    if plane.encoding.is_compressed() && tiling != ImageTiling::Optimal {
        return FormatFeatures::empty();
    }

    let linear_layout = match tiling {
        ImageTiling::Optimal => false,
        ImageTiling::Linear => true,
        ImageTiling::DrmFormatModifier => modifier.is_some_and(|info| !info.tiled),
    };
    let can_sample = !(linear_layout && config.linear_sampling == LinearSampling::Unsupported);
    let can_render = !(linear_layout && !config.linear_rendering)
        && plane.encoding.supports_rendering(version);

    let mut features = FormatFeatures::empty();

    if can_sample && plane.encoding.supports_sampling(version) {
        features |= FormatFeatures::SAMPLED_IMAGE | FormatFeatures::SAMPLED_IMAGE_FILTER_MINMAX;

        if plane.encoding.supports_filtering(version) {
            features |= FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR;
        }
    }

    // Rendering through a swizzle that moves alpha would break blending.
    if can_render && plane.swizzle.a == ComponentSwizzle::Alpha {
        features |= FormatFeatures::COLOR_ATTACHMENT;

        // Blend constants are not swizzled, so only identity swizzles blend correctly.
        if plane.encoding.supports_alpha_blending(version) && plane.swizzle.is_identity() {
            features |= FormatFeatures::COLOR_ATTACHMENT_BLEND;
        }
    }

    // Storage access uses the unsubstituted encoding, so three-channel formats never qualify.
    if base.supports_typed_reads(version) {
        features |= FormatFeatures::STORAGE_READ_WITHOUT_FORMAT;
    }

    if base.supports_typed_writes(version) {
        features |= FormatFeatures::STORAGE_WRITE_WITHOUT_FORMAT | FormatFeatures::STORAGE_IMAGE;
    }

    if matches!(
        base,
        TexelEncoding::R32_UINT | TexelEncoding::R32_SINT | TexelEncoding::R32_FLOAT
    ) {
        features |= FormatFeatures::STORAGE_IMAGE_ATOMIC;
    }

    if !features.is_empty() {
        features |=
            FormatFeatures::BLIT_SRC | FormatFeatures::TRANSFER_SRC | FormatFeatures::TRANSFER_DST;

        if can_render {
            features |= FormatFeatures::BLIT_DST;
        }
    }

    if tiling == ImageTiling::Optimal
        && !base.is_power_of_two_sized()
        && base.rgb_to_rgbx().is_none()
    {
        features -= FormatFeatures::COLOR_ATTACHMENT | FormatFeatures::BLIT_DST;
    }

    if desc.is_ycbcr() {
        if plane.encoding.is_yuv() {
            // Packed YUV is converted by the sampler itself, which only does midpoint chroma.
            features |= FormatFeatures::MIDPOINT_CHROMA_SAMPLES;
        } else {
            features |= FormatFeatures::SAMPLED_IMAGE_YCBCR_CONVERSION_LINEAR_FILTER
                | FormatFeatures::MIDPOINT_CHROMA_SAMPLES
                | FormatFeatures::SAMPLED_IMAGE_YCBCR_CONVERSION_SEPARATE_RECONSTRUCTION_FILTER;
        }

        if desc.is_subsampled() {
            features |= FormatFeatures::COSITED_CHROMA_SAMPLES;
        }

        if desc.plane_count() > 1 {
            features |= FormatFeatures::DISJOINT;
        }

        features -= DISALLOWED_YCBCR_IMAGE_FEATURES;
    } else if desc.is_video() {
        features -= DISALLOWED_YCBCR_IMAGE_FEATURES;
    }

    if config.video_decode && desc.is_video() {
        features |= FormatFeatures::VIDEO_DECODE_OUTPUT | FormatFeatures::VIDEO_DECODE_DPB;
    }

    if let Some(info) = modifier {
        let layout = plane.encoding.layout();

        if layout.colorspace == Colorspace::Yuv
            || layout.compressed
            || !matches!(layout.channel_type, ChannelType::Unorm | ChannelType::Sfloat)
        {
            return FormatFeatures::empty();
        }

        if info.tiled && !plane.encoding.is_power_of_two_sized() {
            return FormatFeatures::empty();
        }

        if desc.plane_count() > 1 {
            features -= FormatFeatures::DISJOINT;

            // Only the layouts that platform buffer allocators hand out for camera and video
            // buffers.
            if !matches!(
                format,
                Format::G8_B8R8_2PLANE_420_UNORM | Format::G8_B8_R8_3PLANE_420_UNORM
            ) {
                return FormatFeatures::empty();
            }

            if info.has_aux {
                return FormatFeatures::empty();
            }
        }

        if info.has_aux {
            if !plane.encoding.supports_aux_compression(version) {
                return FormatFeatures::empty();
            }

            features -= FormatFeatures::DISJOINT | STORAGE_FEATURES;
        }
    }

    features
}

/// Returns the features supported by texel buffers and vertex buffers of `format`.
pub fn buffer_format_features(config: &HardwareConfig, format: Format) -> FormatFeatures {
    let Some(desc) = descriptor(format) else {
        return FormatFeatures::empty();
    };

    if desc.is_ycbcr()
        || desc
            .aspects()
            .intersects(ImageAspects::DEPTH | ImageAspects::STENCIL)
    {
        return FormatFeatures::empty();
    }

    let version = config.version;
    let encoding = desc.planes()[0].encoding;
    let mut features = FormatFeatures::empty();

    if encoding.supports_sampling(version) && !encoding.is_compressed() {
        features |= FormatFeatures::UNIFORM_TEXEL_BUFFER;
    }

    if encoding.supports_typed_writes(version) {
        features |= FormatFeatures::STORAGE_TEXEL_BUFFER;
    }

    if matches!(
        encoding,
        TexelEncoding::R32_UINT | TexelEncoding::R32_SINT | TexelEncoding::R32_FLOAT
    ) {
        features |= FormatFeatures::STORAGE_TEXEL_BUFFER_ATOMIC;
    }

    if encoding.supports_vertex_fetch() {
        features |= FormatFeatures::VERTEX_BUFFER;
    }

    features
}

#[cfg(test)]
mod tests {
    use super::{buffer_format_features, image_format_features};
    use crate::{
        device::{HardwareConfig, LinearSampling},
        drm::{
            DrmModifierInfo, DRM_FORMAT_MOD_BROADCOM_UIF, DRM_FORMAT_MOD_LINEAR,
            I915_FORMAT_MOD_Y_TILED, I915_FORMAT_MOD_Y_TILED_CCS,
        },
        format::{Format, FormatFeatures},
        image::ImageTiling,
    };

    fn no_linear_rendering() -> HardwareConfig {
        HardwareConfig {
            linear_rendering: false,
            ..HardwareConfig::v3d_4_2()
        }
    }

    #[test]
    fn rgba8_linear_vs_optimal() {
        let config = no_linear_rendering();

        let optimal =
            image_format_features(&config, Format::R8G8B8A8_UNORM, ImageTiling::Optimal, None);
        assert!(optimal.contains(
            FormatFeatures::SAMPLED_IMAGE
                | FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR
                | FormatFeatures::COLOR_ATTACHMENT
                | FormatFeatures::COLOR_ATTACHMENT_BLEND
                | FormatFeatures::BLIT_SRC
                | FormatFeatures::BLIT_DST
                | FormatFeatures::TRANSFER_SRC
                | FormatFeatures::TRANSFER_DST
                | FormatFeatures::STORAGE_IMAGE
        ));

        let linear =
            image_format_features(&config, Format::R8G8B8A8_UNORM, ImageTiling::Linear, None);
        assert!(linear.contains(FormatFeatures::SAMPLED_IMAGE | FormatFeatures::BLIT_SRC));
        assert!(!linear.intersects(
            FormatFeatures::COLOR_ATTACHMENT
                | FormatFeatures::COLOR_ATTACHMENT_BLEND
                | FormatFeatures::BLIT_DST
        ));

        let config = HardwareConfig::v3d_4_2();
        let linear =
            image_format_features(&config, Format::R8G8B8A8_UNORM, ImageTiling::Linear, None);
        assert!(linear.contains(FormatFeatures::COLOR_ATTACHMENT | FormatFeatures::BLIT_DST));
    }

    #[test]
    fn linear_sampling_unsupported() {
        let config = HardwareConfig {
            linear_sampling: LinearSampling::Unsupported,
            ..HardwareConfig::v3d_4_2()
        };

        let linear =
            image_format_features(&config, Format::R8G8B8A8_UNORM, ImageTiling::Linear, None);
        assert!(!linear.intersects(
            FormatFeatures::SAMPLED_IMAGE
                | FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR
                | FormatFeatures::SAMPLED_IMAGE_FILTER_MINMAX
        ));
        assert!(linear.contains(FormatFeatures::COLOR_ATTACHMENT));
    }

    #[test]
    fn minmax_filtering() {
        let config = HardwareConfig::v3d_4_2();

        let rgba8 =
            image_format_features(&config, Format::R8G8B8A8_UNORM, ImageTiling::Optimal, None);
        assert!(rgba8.contains(
            FormatFeatures::SAMPLED_IMAGE
                | FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR
                | FormatFeatures::SAMPLED_IMAGE_FILTER_MINMAX
        ));

        // Integer formats can't be filtered linearly, but min/max reduction still applies.
        let r32 = image_format_features(&config, Format::R32_UINT, ImageTiling::Optimal, None);
        assert!(r32.contains(
            FormatFeatures::SAMPLED_IMAGE | FormatFeatures::SAMPLED_IMAGE_FILTER_MINMAX
        ));
        assert!(!r32.intersects(FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR));
    }

    #[test]
    fn depth_stencil() {
        let config = HardwareConfig::v3d_4_2();

        let optimal = image_format_features(
            &config,
            Format::D24_UNORM_S8_UINT,
            ImageTiling::Optimal,
            None,
        );
        assert!(optimal.contains(
            FormatFeatures::DEPTH_STENCIL_ATTACHMENT
                | FormatFeatures::SAMPLED_IMAGE_DEPTH_COMPARISON
                | FormatFeatures::SAMPLED_IMAGE_FILTER_MINMAX
        ));
        assert!(!optimal.intersects(FormatFeatures::COLOR_ATTACHMENT));

        assert!(
            image_format_features(&config, Format::D16_UNORM, ImageTiling::Linear, None)
                .is_empty()
        );
        assert!(image_format_features(
            &config,
            Format::D16_UNORM,
            ImageTiling::DrmFormatModifier,
            Some(DRM_FORMAT_MOD_LINEAR),
        )
        .is_empty());
    }

    #[test]
    fn rgb_substitution() {
        let config = HardwareConfig::v3d_4_2();

        // RGBX is renderable, so the substituted format can be a color attachment.
        let rgb8 = image_format_features(&config, Format::R8G8B8_UNORM, ImageTiling::Optimal, None);
        assert!(rgb8.contains(FormatFeatures::SAMPLED_IMAGE | FormatFeatures::COLOR_ATTACHMENT));
        assert!(!rgb8.intersects(FormatFeatures::STORAGE_IMAGE));

        // The RGBA substitute forces alpha to one through the swizzle.
        let rgb32f =
            image_format_features(&config, Format::R32G32B32_SFLOAT, ImageTiling::Optimal, None);
        assert!(rgb32f.contains(FormatFeatures::SAMPLED_IMAGE));
        assert!(!rgb32f.intersects(FormatFeatures::COLOR_ATTACHMENT));

        // Without RGBX substitute, neither rendering nor blitting into it is possible.
        let rgb32ui =
            image_format_features(&config, Format::R32G32B32_UINT, ImageTiling::Optimal, None);
        assert!(rgb32ui.contains(FormatFeatures::SAMPLED_IMAGE));
        assert!(!rgb32ui.intersects(FormatFeatures::COLOR_ATTACHMENT | FormatFeatures::BLIT_DST));
    }

    #[test]
    fn ycbcr() {
        let config = HardwareConfig::v3d_4_2();

        let nv12 = image_format_features(
            &config,
            Format::G8_B8R8_2PLANE_420_UNORM,
            ImageTiling::Optimal,
            None,
        );
        assert!(nv12.contains(
            FormatFeatures::SAMPLED_IMAGE
                | FormatFeatures::MIDPOINT_CHROMA_SAMPLES
                | FormatFeatures::COSITED_CHROMA_SAMPLES
                | FormatFeatures::SAMPLED_IMAGE_YCBCR_CONVERSION_LINEAR_FILTER
                | FormatFeatures::SAMPLED_IMAGE_YCBCR_CONVERSION_SEPARATE_RECONSTRUCTION_FILTER
                | FormatFeatures::DISJOINT
        ));
        assert!(!nv12.intersects(
            FormatFeatures::COLOR_ATTACHMENT
                | FormatFeatures::BLIT_SRC
                | FormatFeatures::STORAGE_IMAGE
                | FormatFeatures::VIDEO_DECODE_OUTPUT
        ));

        let packed =
            image_format_features(&config, Format::G8B8G8R8_422_UNORM, ImageTiling::Optimal, None);
        assert!(packed.contains(FormatFeatures::MIDPOINT_CHROMA_SAMPLES));
        assert!(!packed.intersects(
            FormatFeatures::SAMPLED_IMAGE_YCBCR_CONVERSION_SEPARATE_RECONSTRUCTION_FILTER
                | FormatFeatures::COSITED_CHROMA_SAMPLES
                | FormatFeatures::DISJOINT
        ));

        let video_config = HardwareConfig {
            video_decode: true,
            ..HardwareConfig::v3d_4_2()
        };
        let nv12 = image_format_features(
            &video_config,
            Format::G8_B8R8_2PLANE_420_UNORM,
            ImageTiling::Optimal,
            None,
        );
        assert!(nv12
            .contains(FormatFeatures::VIDEO_DECODE_OUTPUT | FormatFeatures::VIDEO_DECODE_DPB));
    }

    #[test]
    fn modifiers() {
        let config = HardwareConfig::v3d_4_2();
        let features = |format, modifier| {
            image_format_features(
                &config,
                format,
                ImageTiling::DrmFormatModifier,
                Some(modifier),
            )
        };

        assert!(features(Format::R8G8B8A8_UNORM, DRM_FORMAT_MOD_BROADCOM_UIF)
            .contains(FormatFeatures::SAMPLED_IMAGE | FormatFeatures::COLOR_ATTACHMENT));
        assert!(features(Format::R8G8B8A8_UNORM, I915_FORMAT_MOD_Y_TILED).is_empty());
        assert!(image_format_features(
            &config,
            Format::R8G8B8A8_UNORM,
            ImageTiling::DrmFormatModifier,
            None,
        )
        .is_empty());

        // Non-power-of-two texels only work with the linear modifier.
        assert!(features(Format::R8G8B8_UNORM, DRM_FORMAT_MOD_BROADCOM_UIF).is_empty());
        assert!(features(Format::R8G8B8_UNORM, DRM_FORMAT_MOD_LINEAR)
            .contains(FormatFeatures::SAMPLED_IMAGE));

        // Integer and compressed formats are never shared.
        assert!(features(Format::R8G8B8A8_UINT, DRM_FORMAT_MOD_LINEAR).is_empty());
        assert!(features(Format::ETC2_R8G8B8_UNORM_BLOCK, DRM_FORMAT_MOD_BROADCOM_UIF).is_empty());

        let nv12 = features(Format::G8_B8R8_2PLANE_420_UNORM, DRM_FORMAT_MOD_BROADCOM_UIF);
        assert!(nv12.contains(FormatFeatures::SAMPLED_IMAGE));
        assert!(!nv12.intersects(FormatFeatures::DISJOINT));
        assert!(features(Format::G8_B8_R8_3PLANE_420_UNORM, DRM_FORMAT_MOD_LINEAR)
            .contains(FormatFeatures::SAMPLED_IMAGE));
        assert!(features(Format::G8_B8_R8_3PLANE_422_UNORM, DRM_FORMAT_MOD_LINEAR).is_empty());
        assert!(features(Format::G8B8G8R8_422_UNORM, DRM_FORMAT_MOD_LINEAR).is_empty());
    }

    #[test]
    fn aux_modifier() {
        let mut config = HardwareConfig::v3d_4_2();
        config.modifiers.push(DrmModifierInfo {
            modifier: I915_FORMAT_MOD_Y_TILED_CCS,
            tiled: true,
            has_aux: true,
        });
        let features = |format| {
            image_format_features(
                &config,
                format,
                ImageTiling::DrmFormatModifier,
                Some(I915_FORMAT_MOD_Y_TILED_CCS),
            )
        };

        let rgba8 = features(Format::R8G8B8A8_UNORM);
        assert!(rgba8.contains(FormatFeatures::SAMPLED_IMAGE | FormatFeatures::COLOR_ATTACHMENT));
        assert!(!rgba8.intersects(
            FormatFeatures::STORAGE_IMAGE | FormatFeatures::STORAGE_WRITE_WITHOUT_FORMAT
        ));

        assert!(features(Format::B8G8R8A8_SRGB).is_empty());
        assert!(features(Format::G8_B8R8_2PLANE_420_UNORM).is_empty());
    }

    #[test]
    fn compressed() {
        let config = HardwareConfig::v3d_4_2();

        let etc2 = image_format_features(
            &config,
            Format::ETC2_R8G8B8A8_UNORM_BLOCK,
            ImageTiling::Optimal,
            None,
        );
        assert!(etc2.contains(FormatFeatures::SAMPLED_IMAGE | FormatFeatures::TRANSFER_DST));
        assert!(!etc2.intersects(FormatFeatures::COLOR_ATTACHMENT | FormatFeatures::BLIT_DST));

        assert!(image_format_features(
            &config,
            Format::ETC2_R8G8B8A8_UNORM_BLOCK,
            ImageTiling::Linear,
            None,
        )
        .is_empty());
        assert!(
            image_format_features(&config, Format::BC3_UNORM_BLOCK, ImageTiling::Optimal, None)
                .is_empty()
        );
    }

    #[test]
    fn version_gating() {
        let a1 = Format::from_raw(1_000_470_000);

        let old = image_format_features(&HardwareConfig::v3d_4_2(), a1, ImageTiling::Optimal, None);
        assert!(old.contains(FormatFeatures::SAMPLED_IMAGE));
        assert!(!old.intersects(FormatFeatures::COLOR_ATTACHMENT));

        let new = image_format_features(&HardwareConfig::v3d_7_1(), a1, ImageTiling::Optimal, None);
        assert!(new.contains(FormatFeatures::COLOR_ATTACHMENT));
    }

    #[test]
    fn unknown_format() {
        let config = HardwareConfig::v3d_4_2();
        assert!(
            image_format_features(&config, Format::R64_SFLOAT, ImageTiling::Optimal, None)
                .is_empty()
        );
        assert!(buffer_format_features(&config, Format::UNDEFINED).is_empty());
    }

    #[test]
    fn buffers() {
        let config = HardwareConfig::v3d_4_2();

        let r32 = buffer_format_features(&config, Format::R32_UINT);
        assert!(r32.contains(
            FormatFeatures::UNIFORM_TEXEL_BUFFER
                | FormatFeatures::STORAGE_TEXEL_BUFFER
                | FormatFeatures::STORAGE_TEXEL_BUFFER_ATOMIC
                | FormatFeatures::VERTEX_BUFFER
        ));

        let rgb32f = buffer_format_features(&config, Format::R32G32B32_SFLOAT);
        assert!(rgb32f
            .contains(FormatFeatures::VERTEX_BUFFER | FormatFeatures::UNIFORM_TEXEL_BUFFER));
        assert!(!rgb32f.intersects(FormatFeatures::STORAGE_TEXEL_BUFFER));

        assert!(buffer_format_features(&config, Format::G8_B8R8_2PLANE_420_UNORM).is_empty());
        assert!(buffer_format_features(&config, Format::D16_UNORM).is_empty());
        assert!(buffer_format_features(&config, Format::ETC2_R8G8B8_UNORM_BLOCK)
            .intersection(FormatFeatures::UNIFORM_TEXEL_BUFFER | FormatFeatures::VERTEX_BUFFER)
            .is_empty());
    }
}

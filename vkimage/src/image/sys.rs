// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Low-level implementation of images.
//!
//! An [`Image`] owns the layout of its planes from the moment it is created. Memory is bound
//! afterwards with [`Image::bind_memory`], once per image, or once per plane for disjoint images.

use super::{
    layout::{setup_slices, LayoutParams, PlaneLayout},
    max_mip_levels, ImageAspect, ImageAspects, ImageCreateFlags, ImageTiling, ImageType,
    ImageUsage, SampleCount, SubresourceLayout,
};
use crate::{
    android::{gralloc_to_explicit_layout, HardwareBuffer, MAX_GRALLOC_PLANES},
    device::{Device, HardwareConfig, LinearSampling},
    drm::DRM_FORMAT_MOD_LINEAR,
    format::{self, image_format_features, FormatDescriptor, FormatFeatures},
    macros::impl_id_counter,
    memory::{
        DeviceMemory, DeviceMemoryError, ExternalMemoryHandleTypes, MemoryAllocateInfo,
        MemoryRequirements,
    },
    DeviceOwned, DeviceSize, Format, NonExhaustive, VulkanError,
};
use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use smallvec::SmallVec;
use std::{error::Error, fmt, num::NonZero, sync::Arc};

/// A storage for pixels or arbitrary data.
pub struct Image {
    id: NonZero<u64>,
    device: Arc<Device>,
    desc: &'static FormatDescriptor,

    flags: ImageCreateFlags,
    image_type: ImageType,
    format: Format,
    extent: [u32; 3],
    mip_levels: u32,
    array_layers: u32,
    samples: SampleCount,
    tiling: ImageTiling,
    usage: ImageUsage,
    external_memory_handle_types: ExternalMemoryHandleTypes,

    layout: RwLock<ImageLayout>,

    // Tiled copy of a linear image, which the texture unit samples instead of the image itself.
    shadow: Option<Box<Image>>,
    shadow_memory: Mutex<Option<Arc<DeviceMemory>>>,
}

/// The part of an image that binding memory can change.
#[derive(Clone, Debug)]
struct ImageLayout {
    drm_format_modifier: u64,
    tiled: bool,
    disjoint: bool,
    non_disjoint_size: DeviceSize,
    planes: SmallVec<[PlaneLayout; 3]>,
}

impl Image {
    /// Creates a new `Image`, without memory.
    pub fn new(
        device: Arc<Device>,
        create_info: ImageCreateInfo,
    ) -> Result<Arc<Image>, ImageCreationError> {
        Self::new_inner(device, create_info).map(Arc::new)
    }

    fn new_inner(
        device: Arc<Device>,
        create_info: ImageCreateInfo,
    ) -> Result<Image, ImageCreationError> {
        let config = device.physical_device().config();
        let desc = create_info.validate(config)?;
        let (layout_tiling, drm_format_modifier) = create_info.choose_drm_format_modifier(config)?;

        let ImageCreateInfo {
            flags,
            image_type,
            format,
            extent,
            mip_levels,
            array_layers,
            samples,
            tiling,
            usage,
            drm_format_modifiers: _,
            ref drm_format_modifier_plane_layouts,
            external_memory_handle_types,
            wsi_legacy_scanout: _,
            _ne: _,
        } = create_info;

        let features = image_format_features(
            config,
            format,
            tiling,
            (tiling == ImageTiling::DrmFormatModifier).then_some(drm_format_modifier),
        );

        if features.is_empty() {
            return Err(VulkanError::FormatNotSupported.into());
        }

        if flags.intersects(ImageCreateFlags::DISJOINT)
            && !features.intersects(FormatFeatures::DISJOINT)
        {
            return Err(ImageCreationError::DisjointNotSupported);
        }

        if !usage.is_supported_by(features) {
            return Err(ImageCreationError::UsageNotSupported { usage });
        }

        let tiled = match layout_tiling {
            ImageTiling::Optimal => true,
            ImageTiling::Linear => false,
            ImageTiling::DrmFormatModifier => config
                .modifier_info(drm_format_modifier)
                .is_some_and(|info| info.tiled),
        };

        let plane_count = desc.plane_count() as usize;
        let mut planes: SmallVec<[PlaneLayout; 3]> = (0..plane_count)
            .map(|index| PlaneLayout::new(&desc.plane(index, layout_tiling, config), extent))
            .collect();
        let disjoint = flags.intersects(ImageCreateFlags::DISJOINT) && plane_count > 1;

        let params = LayoutParams {
            config,
            image_type,
            extent,
            mip_levels,
            array_layers,
            samples,
            tiled,
        };
        let explicit = (!drm_format_modifier_plane_layouts.is_empty())
            .then_some(drm_format_modifier_plane_layouts.as_slice());
        let non_disjoint_size = setup_slices(&params, &mut planes, disjoint, explicit)?;

        let shadow = if !tiled
            && image_type != ImageType::Dim1d
            && usage.intersects(ImageUsage::SAMPLED)
            && config.linear_sampling == LinearSampling::ShadowCopy
        {
            let shadow = Self::new_inner(
                device.clone(),
                ImageCreateInfo {
                    flags: flags - ImageCreateFlags::DISJOINT,
                    image_type,
                    format,
                    extent,
                    mip_levels,
                    array_layers,
                    samples,
                    tiling: ImageTiling::Optimal,
                    usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
                    ..Default::default()
                },
            )?;

            Some(Box::new(shadow))
        } else {
            None
        };

        let image = Image {
            id: Self::next_id(),
            device,
            desc,
            flags,
            image_type,
            format,
            extent,
            mip_levels,
            array_layers,
            samples,
            tiling,
            usage,
            external_memory_handle_types,
            layout: RwLock::new(ImageLayout {
                drm_format_modifier,
                tiled,
                disjoint,
                non_disjoint_size,
                planes,
            }),
            shadow,
            shadow_memory: Mutex::new(None),
        };

        log::debug!(
            "created {format:?} image {:?} with modifier {drm_format_modifier:#x}: {} planes, \
            {non_disjoint_size} bytes{}",
            extent,
            plane_count,
            if image.shadow.is_some() {
                ", with a tiled shadow"
            } else {
                ""
            },
        );

        Ok(image)
    }

    /// Returns the memory requirements of an image created with `create_info`, without keeping
    /// the image.
    ///
    /// `plane_aspect` is ignored unless the image is disjoint or uses DRM format modifier tiling.
    pub fn requirements_for(
        device: &Arc<Device>,
        create_info: ImageCreateInfo,
        plane_aspect: Option<ImageAspect>,
    ) -> Result<MemoryRequirements, ImageCreationError> {
        let per_plane = create_info.tiling == ImageTiling::DrmFormatModifier
            || create_info.flags.intersects(ImageCreateFlags::DISJOINT);
        let plane_aspect = plane_aspect.filter(|_| per_plane);

        let image = Self::new_inner(device.clone(), create_info)?;

        image
            .memory_requirements(plane_aspect)
            .ok_or_else(|| ImageCreationError::InvalidPlaneAspect {
                aspect: plane_aspect.unwrap_or(ImageAspect::Color),
            })
    }

    #[inline]
    pub fn flags(&self) -> ImageCreateFlags {
        self.flags
    }

    #[inline]
    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> [u32; 3] {
        self.extent
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    #[inline]
    pub fn samples(&self) -> SampleCount {
        self.samples
    }

    /// Returns the tiling the image was created with.
    ///
    /// 1D images and legacy scanout images are always laid out linearly, whatever their tiling.
    #[inline]
    pub fn tiling(&self) -> ImageTiling {
        self.tiling
    }

    #[inline]
    pub fn usage(&self) -> ImageUsage {
        self.usage
    }

    #[inline]
    pub fn external_memory_handle_types(&self) -> ExternalMemoryHandleTypes {
        self.external_memory_handle_types
    }

    /// Returns the DRM format modifier that describes the layout of the image.
    #[inline]
    pub fn drm_format_modifier(&self) -> u64 {
        self.layout.read().drm_format_modifier
    }

    /// Returns whether the image uses one of the hardware's tiled layouts.
    #[inline]
    pub fn is_tiled(&self) -> bool {
        self.layout.read().tiled
    }

    /// Returns whether every plane is bound to memory separately.
    #[inline]
    pub fn is_disjoint(&self) -> bool {
        self.layout.read().disjoint
    }

    /// Returns the size of the whole image when its planes share one binding, or 0 if the image
    /// is disjoint.
    #[inline]
    pub fn non_disjoint_size(&self) -> DeviceSize {
        self.layout.read().non_disjoint_size
    }

    #[inline]
    pub fn plane_count(&self) -> usize {
        self.desc.plane_count() as usize
    }

    /// Returns the layouts of the planes.
    ///
    /// The layouts stay locked for reading while the guard is alive, which blocks binding memory.
    pub fn planes(&self) -> MappedRwLockReadGuard<'_, [PlaneLayout]> {
        RwLockReadGuard::map(self.layout.read(), |layout| layout.planes.as_slice())
    }

    /// Returns the tiled shadow of a linear image, if the hardware samples it through one.
    #[inline]
    pub fn shadow(&self) -> Option<&Image> {
        self.shadow.as_deref()
    }

    fn plane_of(&self, aspect: ImageAspect) -> Option<usize> {
        self.desc.plane_index(aspect.into())
    }

    /// Returns the memory requirements of the image, or of one plane if `plane_aspect` is given.
    ///
    /// Returns `None` if `plane_aspect` doesn't select a plane of the image.
    pub fn memory_requirements(
        &self,
        plane_aspect: Option<ImageAspect>,
    ) -> Option<MemoryRequirements> {
        let plane = match plane_aspect {
            Some(aspect) => Some(self.plane_of(aspect)?),
            None => None,
        };

        Some(self.requirements(plane))
    }

    fn requirements(&self, plane: Option<usize>) -> MemoryRequirements {
        let layout = self.layout.read();
        let (alignment, size) = match plane {
            Some(plane) => (layout.planes[plane].alignment(), layout.planes[plane].size()),
            None => (layout.planes[0].alignment(), layout.non_disjoint_size),
        };
        let dedicated = !self.external_memory_handle_types.is_empty();

        MemoryRequirements {
            size,
            alignment,
            memory_type_bits: 1,
            prefers_dedicated_allocation: dedicated,
            requires_dedicated_allocation: dedicated,
        }
    }

    /// Returns the layout of one subresource, relative to the memory binding of its plane.
    ///
    /// Returns `None` if `aspect` doesn't select a plane, or if the mip level or the array layer
    /// is out of range.
    pub fn subresource_layout(
        &self,
        aspect: ImageAspect,
        mip_level: u32,
        array_layer: u32,
    ) -> Option<SubresourceLayout> {
        if mip_level >= self.mip_levels || array_layer >= self.array_layers {
            return None;
        }

        let plane = self.plane_of(aspect)?;

        self.layout.read().planes[plane].subresource_layout(
            self.image_type,
            self.extent[2],
            mip_level,
            array_layer,
        )
    }

    /// Returns the offset into the bound memory of one array layer, or one depth slice for 3D
    /// images, of a mip level of a plane.
    pub fn layer_offset(&self, mip_level: u32, layer: u32, plane: usize) -> Option<DeviceSize> {
        let layer_count = match self.image_type {
            ImageType::Dim3d => self.extent[2],
            ImageType::Dim1d | ImageType::Dim2d => self.array_layers,
        };

        if mip_level >= self.mip_levels || layer >= layer_count || plane >= self.plane_count() {
            return None;
        }

        self.layout.read().planes[plane].layer_offset(self.image_type, mip_level, layer)
    }

    /// Binds memory to the image, or to one plane of a disjoint image.
    ///
    /// If the memory was imported from a hardware buffer, the layout of the image is first
    /// replaced by the one gralloc reports for the buffer. When anything fails, the image is left
    /// as it was.
    pub fn bind_memory(&self, bind_info: BindImageMemoryInfo) -> Result<(), ImageBindError> {
        let BindImageMemoryInfo {
            memory,
            offset,
            plane_aspect,
            _ne: _,
        } = bind_info;

        if memory.device() != &self.device {
            return Err(ImageBindError::DeviceMismatch);
        }

        if offset >= memory.allocation_size() {
            return Err(ImageBindError::OffsetOutOfRange {
                offset,
                allocation_size: memory.allocation_size(),
            });
        }

        let mut layout = self.layout.write();

        let derived = match memory.hardware_buffer() {
            Some(buffer) => Some(self.hardware_buffer_layout(&layout, buffer.as_ref())?),
            None => None,
        };

        let plane = {
            let new_layout = derived.as_ref().unwrap_or(&*layout);

            let plane = if new_layout.disjoint {
                let aspect = plane_aspect.ok_or(ImageBindError::PlaneAspectRequired)?;

                self.plane_of(aspect)
                    .ok_or(ImageBindError::InvalidPlaneAspect { aspect })?
            } else {
                0
            };

            if new_layout.planes[plane].is_bound() {
                return Err(ImageBindError::AlreadyBound);
            }

            let (alignment, size) = if new_layout.disjoint {
                (
                    new_layout.planes[plane].alignment(),
                    new_layout.planes[plane].size(),
                )
            } else {
                (new_layout.planes[0].alignment(), new_layout.non_disjoint_size)
            };

            if offset % alignment != 0 {
                return Err(ImageBindError::OffsetNotAligned {
                    offset,
                    required_alignment: alignment,
                });
            }

            if offset + size > memory.allocation_size() {
                return Err(ImageBindError::MemoryTooSmall {
                    required_size: size,
                    available_size: memory.allocation_size() - offset,
                });
            }

            plane
        };

        self.bind_shadow()?;

        if let Some(derived) = derived {
            *layout = derived;
        }

        if layout.disjoint {
            layout.planes[plane].bind(&memory, offset);
        } else {
            for plane in &mut layout.planes {
                plane.bind(&memory, offset);
            }
        }

        log::debug!(
            "bound image {} plane {plane} to buffer object {} at offset {offset}",
            self.id,
            memory.buffer_object().handle(),
        );

        Ok(())
    }

    /// Computes the layout that gralloc reports for `buffer`, without touching the image.
    fn hardware_buffer_layout(
        &self,
        current: &ImageLayout,
        buffer: &dyn HardwareBuffer,
    ) -> Result<ImageLayout, ImageBindError> {
        let config = self.device.physical_device().config();

        let Some(gralloc) = self.device.gralloc() else {
            log::debug!("memory comes from a hardware buffer, but the device has no gralloc");
            return Err(VulkanError::InvalidExternalHandle.into());
        };

        let explicit = gralloc_to_explicit_layout(
            gralloc.as_ref(),
            &buffer.gralloc_handle(),
            MAX_GRALLOC_PLANES,
        )?;

        let Some(info) = config.modifier_info(explicit.drm_format_modifier) else {
            log::debug!(
                "gralloc buffer uses unsupported modifier {:#x}",
                explicit.drm_format_modifier,
            );
            return Err(VulkanError::InvalidExternalHandle.into());
        };

        if explicit.plane_layouts.len() != current.planes.len() {
            log::debug!(
                "gralloc buffer has {} planes, the image has {}",
                explicit.plane_layouts.len(),
                current.planes.len(),
            );
            return Err(VulkanError::InvalidExternalHandle.into());
        }

        let mut layout = current.clone();
        layout.drm_format_modifier = info.modifier;
        layout.tiled = info.tiled;
        layout.disjoint = false;

        let params = self.layout_params(config, layout.tiled);
        layout.non_disjoint_size = setup_slices(
            &params,
            &mut layout.planes,
            false,
            Some(explicit.plane_layouts.as_slice()),
        )?;

        Ok(layout)
    }

    fn layout_params<'a>(&self, config: &'a HardwareConfig, tiled: bool) -> LayoutParams<'a> {
        LayoutParams {
            config,
            image_type: self.image_type,
            extent: self.extent,
            mip_levels: self.mip_levels,
            array_layers: self.array_layers,
            samples: self.samples,
            tiled,
        }
    }

    /// Allocates and binds the memory of the shadow image, the first time the image is bound.
    fn bind_shadow(&self) -> Result<(), ImageBindError> {
        let Some(shadow) = &self.shadow else {
            return Ok(());
        };

        let mut shadow_memory = self.shadow_memory.lock();

        if shadow_memory.is_some() {
            return Ok(());
        }

        let requirements = shadow.requirements(None);
        let memory = DeviceMemory::allocate(
            self.device.clone(),
            MemoryAllocateInfo {
                allocation_size: requirements.size,
                ..Default::default()
            },
        )
        .map_err(|err| match err {
            DeviceMemoryError::VulkanError(err) => err,
            _ => VulkanError::OutOfDeviceMemory,
        })?;

        shadow.bind_memory(BindImageMemoryInfo::new(memory.clone()))?;
        *shadow_memory = Some(memory);

        Ok(())
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        log::trace!("destroying image {}", self.id);
    }
}

unsafe impl DeviceOwned for Image {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let layout = self.layout.read();

        f.debug_struct("Image")
            .field("id", &self.id)
            .field("format", &self.format)
            .field("extent", &self.extent)
            .field("tiling", &self.tiling)
            .field("drm_format_modifier", &layout.drm_format_modifier)
            .field("planes", &layout.planes)
            .field("shadow", &self.shadow)
            .finish_non_exhaustive()
    }
}

impl_id_counter!(Image);

/// Parameters to create a new `Image`.
#[derive(Clone, Debug)]
pub struct ImageCreateInfo {
    /// Additional properties of the image.
    ///
    /// The default value is [`ImageCreateFlags::empty()`].
    pub flags: ImageCreateFlags,

    /// The basic image dimensionality to create the image with.
    ///
    /// The default value is [`ImageType::Dim2d`].
    pub image_type: ImageType,

    /// The format used to store the image data.
    ///
    /// The default value is `Format::UNDEFINED`, which must be overridden.
    pub format: Format,

    /// The width, height and depth of the image.
    ///
    /// The default value is `[0, 0, 1]`, which must be overridden.
    pub extent: [u32; 3],

    /// The number of mip levels to create the image with.
    ///
    /// The default value is `1`.
    pub mip_levels: u32,

    /// The number of array layers to create the image with. Must be 1 for 3D images.
    ///
    /// The default value is `1`.
    pub array_layers: u32,

    /// The number of samples per texel. Only 1 and 4 are supported.
    ///
    /// The default value is [`SampleCount::Sample1`].
    pub samples: SampleCount,

    /// The memory arrangement of the texel blocks.
    ///
    /// The default value is [`ImageTiling::Optimal`].
    pub tiling: ImageTiling,

    /// How the image is going to be used.
    ///
    /// The default value is [`ImageUsage::empty()`], which must be overridden.
    pub usage: ImageUsage,

    /// The DRM format modifiers that the image may use, if `tiling` is
    /// [`ImageTiling::DrmFormatModifier`]. The driver picks one: a tiled modifier if the list
    /// has one that the hardware supports, otherwise `DRM_FORMAT_MOD_LINEAR`.
    ///
    /// If `drm_format_modifier_plane_layouts` is not empty, this must hold exactly one modifier.
    ///
    /// The default value is empty.
    pub drm_format_modifiers: SmallVec<[u64; 1]>,

    /// The layout of each memory plane, if the image is created with an explicit DRM format
    /// modifier layout. Only `offset`, `row_pitch`, `array_pitch` and `depth_pitch` are looked
    /// at.
    ///
    /// The default value is empty.
    pub drm_format_modifier_plane_layouts: SmallVec<[SubresourceLayout; 4]>,

    /// The external memory handle types that are going to be used with the image.
    ///
    /// The default value is [`ExternalMemoryHandleTypes::empty()`].
    pub external_memory_handle_types: ExternalMemoryHandleTypes,

    /// The image is a swapchain image for a display that can only scan out linear images. Only
    /// the window system integration sets this.
    ///
    /// The default value is `false`.
    pub wsi_legacy_scanout: bool,

    pub _ne: NonExhaustive,
}

impl Default for ImageCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: ImageCreateFlags::empty(),
            image_type: ImageType::Dim2d,
            format: Format::UNDEFINED,
            extent: [0, 0, 1],
            mip_levels: 1,
            array_layers: 1,
            samples: SampleCount::Sample1,
            tiling: ImageTiling::Optimal,
            usage: ImageUsage::empty(),
            drm_format_modifiers: SmallVec::new(),
            drm_format_modifier_plane_layouts: SmallVec::new(),
            external_memory_handle_types: ExternalMemoryHandleTypes::empty(),
            wsi_legacy_scanout: false,
            _ne: NonExhaustive(()),
        }
    }
}

impl ImageCreateInfo {
    fn validate(
        &self,
        config: &HardwareConfig,
    ) -> Result<&'static FormatDescriptor, ImageCreationError> {
        let &Self {
            flags,
            image_type,
            format,
            extent,
            mip_levels,
            array_layers,
            samples,
            tiling,
            usage,
            ref drm_format_modifiers,
            ref drm_format_modifier_plane_layouts,
            ..
        } = self;

        let Some(desc) = format::descriptor(format) else {
            return Err(VulkanError::FormatNotSupported.into());
        };

        if usage.is_empty() {
            return Err(ImageCreationError::UsageEmpty);
        }

        let max_extent = match image_type {
            ImageType::Dim1d => [config.max_image_dimension_1d, 1, 1],
            ImageType::Dim2d => [
                config.max_image_dimension_2d,
                config.max_image_dimension_2d,
                1,
            ],
            ImageType::Dim3d => [
                config.max_image_dimension_3d,
                config.max_image_dimension_3d,
                config.max_image_dimension_3d,
            ],
        };

        if extent
            .iter()
            .zip(max_extent)
            .any(|(&dim, max)| dim == 0 || dim > max)
        {
            return Err(ImageCreationError::ExtentNotSupported { extent, max_extent });
        }

        let max = max_mip_levels(extent);

        if mip_levels == 0 || mip_levels > max {
            return Err(ImageCreationError::MipLevelsOutOfRange { mip_levels, max });
        }

        let max = match image_type {
            ImageType::Dim3d => 1,
            ImageType::Dim1d | ImageType::Dim2d => config.max_image_array_layers,
        };

        if array_layers == 0 || array_layers > max {
            return Err(ImageCreationError::ArrayLayersOutOfRange { array_layers, max });
        }

        match samples {
            SampleCount::Sample1 => (),
            SampleCount::Sample4 => {
                let is_depth_stencil = desc
                    .aspects()
                    .intersects(ImageAspects::DEPTH | ImageAspects::STENCIL);
                let encoding = desc.plane(0, ImageTiling::Optimal, config).encoding;

                if !config.multisample
                    || image_type != ImageType::Dim2d
                    || mip_levels != 1
                    || tiling != ImageTiling::Optimal
                    || !(is_depth_stencil || encoding.supports_multisampling(config.version))
                {
                    return Err(ImageCreationError::SampleCountNotSupported { samples });
                }
            }
            _ => return Err(ImageCreationError::SampleCountNotSupported { samples }),
        }

        if desc.is_ycbcr() {
            if image_type != ImageType::Dim2d
                || mip_levels != 1
                || array_layers != 1
                || samples != SampleCount::Sample1
            {
                return Err(ImageCreationError::YcbcrFormatRestriction);
            }

            if desc.planes().iter().any(|plane| {
                let [width_scale, height_scale] = plane.denominator_scales;

                extent[0] % width_scale != 0 || extent[1] % height_scale != 0
            }) {
                return Err(ImageCreationError::YcbcrExtentNotDivisible { extent });
            }
        }

        if flags.intersects(ImageCreateFlags::CUBE_COMPATIBLE)
            && (image_type != ImageType::Dim2d || extent[0] != extent[1] || array_layers < 6)
        {
            return Err(ImageCreationError::CubeCompatibleRestriction);
        }

        if tiling == ImageTiling::DrmFormatModifier {
            if drm_format_modifiers.is_empty() {
                return Err(ImageCreationError::DrmFormatModifiersMissing);
            }

            if !drm_format_modifier_plane_layouts.is_empty() {
                if drm_format_modifiers.len() != 1 {
                    return Err(ImageCreationError::ExplicitDrmFormatModifierCount {
                        provided: drm_format_modifiers.len() as u32,
                    });
                }

                if drm_format_modifier_plane_layouts.len() != desc.plane_count() as usize {
                    return Err(ImageCreationError::DrmFormatModifierPlaneCountMismatch {
                        provided: drm_format_modifier_plane_layouts.len() as u32,
                        required: desc.plane_count(),
                    });
                }
            }
        }

        Ok(desc)
    }

    /// Returns the tiling to lay the image out with, and the DRM format modifier describing it.
    fn choose_drm_format_modifier(
        &self,
        config: &HardwareConfig,
    ) -> Result<(ImageTiling, u64), ImageCreationError> {
        match self.tiling {
            ImageTiling::DrmFormatModifier => {
                let supported = |modifier: u64| {
                    config.modifier_info(modifier).filter(|_| {
                        !image_format_features(
                            config,
                            self.format,
                            ImageTiling::DrmFormatModifier,
                            Some(modifier),
                        )
                        .is_empty()
                    })
                };

                let mut chosen = None;

                for &modifier in &self.drm_format_modifiers {
                    let Some(info) = supported(modifier) else {
                        continue;
                    };

                    if info.tiled {
                        chosen = Some(modifier);
                        break;
                    }

                    chosen.get_or_insert(modifier);
                }

                chosen
                    .map(|modifier| (ImageTiling::DrmFormatModifier, modifier))
                    .ok_or(ImageCreationError::DrmFormatModifierNotSupported)
            }
            ImageTiling::Optimal
                if self.image_type == ImageType::Dim1d || self.wsi_legacy_scanout =>
            {
                Ok((ImageTiling::Linear, DRM_FORMAT_MOD_LINEAR))
            }
            ImageTiling::Optimal => Ok((ImageTiling::Optimal, config.optimal_modifier)),
            ImageTiling::Linear => Ok((ImageTiling::Linear, DRM_FORMAT_MOD_LINEAR)),
        }
    }
}

/// Parameters to bind memory to an image.
#[derive(Clone, Debug)]
pub struct BindImageMemoryInfo {
    /// The memory to bind.
    ///
    /// There is no default value.
    pub memory: Arc<DeviceMemory>,

    /// The offset into the memory to bind at.
    ///
    /// The default value is `0`.
    pub offset: DeviceSize,

    /// The plane to bind, for disjoint images.
    ///
    /// The default value is `None`.
    pub plane_aspect: Option<ImageAspect>,

    pub _ne: NonExhaustive,
}

impl BindImageMemoryInfo {
    /// Returns a `BindImageMemoryInfo` with the specified `memory`.
    #[inline]
    pub fn new(memory: Arc<DeviceMemory>) -> Self {
        Self {
            memory,
            offset: 0,
            plane_aspect: None,
            _ne: NonExhaustive(()),
        }
    }
}

/// Error that can happen when creating an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageCreationError {
    /// The driver returned an error.
    VulkanError(VulkanError),

    /// The usage of the image is empty.
    UsageEmpty,

    /// An extent component is zero, or bigger than the hardware supports for the image type.
    ExtentNotSupported {
        extent: [u32; 3],
        max_extent: [u32; 3],
    },

    /// The number of mip levels is zero, or more than the full mip chain.
    MipLevelsOutOfRange { mip_levels: u32, max: u32 },

    /// The number of array layers is zero, or more than the image type supports.
    ArrayLayersOutOfRange { array_layers: u32, max: u32 },

    /// The sample count is not supported for this image.
    SampleCountNotSupported { samples: SampleCount },

    /// YCbCr images must be 2D, with one mip level, one array layer and one sample.
    YcbcrFormatRestriction,

    /// The extent of a YCbCr image is not a multiple of its chroma subsampling.
    YcbcrExtentNotDivisible { extent: [u32; 3] },

    /// Cube-compatible images must be 2D and square, with at least six array layers.
    CubeCompatibleRestriction,

    /// The image has the `DISJOINT` flag, but its format can't have disjoint planes.
    DisjointNotSupported,

    /// Some of the usages are not supported by the format features.
    UsageNotSupported { usage: ImageUsage },

    /// DRM format modifier tiling was requested without modifiers.
    DrmFormatModifiersMissing,

    /// An explicit plane layout was given with a number of modifiers other than one.
    ExplicitDrmFormatModifierCount { provided: u32 },

    /// None of the DRM format modifiers is supported for the format.
    DrmFormatModifierNotSupported,

    /// The number of explicit plane layouts doesn't match the number of planes of the format.
    DrmFormatModifierPlaneCountMismatch { provided: u32, required: u32 },

    /// The aspect doesn't select a plane of the image.
    InvalidPlaneAspect { aspect: ImageAspect },
}

impl Error for ImageCreationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::VulkanError(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ImageCreationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::VulkanError(_) => write!(f, "a runtime error occurred"),
            Self::UsageEmpty => write!(f, "the usage of the image is empty"),
            Self::ExtentNotSupported { extent, max_extent } => write!(
                f,
                "the extent {:?} is zero or exceeds the maximum {:?}",
                extent, max_extent,
            ),
            Self::MipLevelsOutOfRange { mip_levels, max } => write!(
                f,
                "the number of mip levels ({}) is zero or exceeds the maximum ({})",
                mip_levels, max,
            ),
            Self::ArrayLayersOutOfRange { array_layers, max } => write!(
                f,
                "the number of array layers ({}) is zero or exceeds the maximum ({})",
                array_layers, max,
            ),
            Self::SampleCountNotSupported { samples } => write!(
                f,
                "the sample count {:?} is not supported for this image",
                samples,
            ),
            Self::YcbcrFormatRestriction => write!(
                f,
                "a YCbCr image must be 2D, with one mip level, one array layer and one sample",
            ),
            Self::YcbcrExtentNotDivisible { extent } => write!(
                f,
                "the extent {:?} is not a multiple of the chroma subsampling of the format",
                extent,
            ),
            Self::CubeCompatibleRestriction => write!(
                f,
                "a cube-compatible image must be 2D and square, with at least six array layers",
            ),
            Self::DisjointNotSupported => {
                write!(f, "the format of the image can't have disjoint planes")
            }
            Self::UsageNotSupported { usage } => write!(
                f,
                "the usage {:?} is not supported by the format features",
                usage,
            ),
            Self::DrmFormatModifiersMissing => write!(
                f,
                "DRM format modifier tiling was requested without any modifier",
            ),
            Self::ExplicitDrmFormatModifierCount { provided } => write!(
                f,
                "an explicit plane layout needs exactly one modifier, but {} were provided",
                provided,
            ),
            Self::DrmFormatModifierNotSupported => {
                write!(f, "none of the DRM format modifiers is supported")
            }
            Self::DrmFormatModifierPlaneCountMismatch { provided, required } => write!(
                f,
                "{} plane layouts were provided, but the format has {} planes",
                provided, required,
            ),
            Self::InvalidPlaneAspect { aspect } => write!(
                f,
                "the aspect {:?} doesn't select a plane of the image",
                aspect,
            ),
        }
    }
}

impl From<VulkanError> for ImageCreationError {
    #[inline]
    fn from(err: VulkanError) -> Self {
        Self::VulkanError(err)
    }
}

/// Error that can happen when binding memory to an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageBindError {
    /// The driver returned an error.
    VulkanError(VulkanError),

    /// The memory was allocated from a different device.
    DeviceMismatch,

    /// The image, or the plane, already has memory bound to it.
    AlreadyBound,

    /// The offset is not less than the allocation size.
    OffsetOutOfRange {
        offset: DeviceSize,
        allocation_size: DeviceSize,
    },

    /// The offset is not a multiple of the required alignment.
    OffsetNotAligned {
        offset: DeviceSize,
        required_alignment: DeviceSize,
    },

    /// The memory is too small for the image at this offset.
    MemoryTooSmall {
        required_size: DeviceSize,
        available_size: DeviceSize,
    },

    /// The image is disjoint, but no plane aspect was given.
    PlaneAspectRequired,

    /// The aspect doesn't select a plane of the image.
    InvalidPlaneAspect { aspect: ImageAspect },
}

impl Error for ImageBindError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::VulkanError(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ImageBindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::VulkanError(_) => write!(f, "a runtime error occurred"),
            Self::DeviceMismatch => {
                write!(f, "the memory was allocated from a different device")
            }
            Self::AlreadyBound => write!(f, "the image already has memory bound to it"),
            Self::OffsetOutOfRange {
                offset,
                allocation_size,
            } => write!(
                f,
                "the offset ({}) is not less than the allocation size ({})",
                offset, allocation_size,
            ),
            Self::OffsetNotAligned {
                offset,
                required_alignment,
            } => write!(
                f,
                "the offset ({}) is not a multiple of the required alignment ({})",
                offset, required_alignment,
            ),
            Self::MemoryTooSmall {
                required_size,
                available_size,
            } => write!(
                f,
                "the image needs {} bytes of memory, but only {} are available after the offset",
                required_size, available_size,
            ),
            Self::PlaneAspectRequired => {
                write!(f, "the image is disjoint, but no plane aspect was given")
            }
            Self::InvalidPlaneAspect { aspect } => write!(
                f,
                "the aspect {:?} doesn't select a plane of the image",
                aspect,
            ),
        }
    }
}

impl From<VulkanError> for ImageBindError {
    #[inline]
    fn from(err: VulkanError) -> Self {
        Self::VulkanError(err)
    }
}

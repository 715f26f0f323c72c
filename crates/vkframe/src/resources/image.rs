use std::{
    hash::{Hash, Hasher},
    sync::{Arc, Mutex},
};

use ash::vk;
use smallvec::SmallVec;

use super::SharingMode;
use crate::{
    allocator::{
        Allocation, Allocator, AnonymAllocation, ManagedAllocation, MemoryUsage,
        UnmanagedAllocation, into_memory_error,
    },
    context::Device,
    error::MemoryError,
    state::ImageState,
    util::aspect_for_format,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageType {
    Tex1d,
    Tex1dArray(u32),
    Tex2d,
    ///Array of 2d textures, u32 is number of layers
    Tex2dArray(u32),
    Tex3d,
    Cube,
    ///Array of cube maps, u32 is the number of cubes
    CubeArray(u32),
}

impl ImageType {
    ///Modifies `extent` based on `self` to be valid. For instance sets height and depth to 1 for a 1d image
    pub fn valid_extent(&self, extent: vk::Extent3D) -> vk::Extent3D {
        match self {
            ImageType::Tex1d | ImageType::Tex1dArray(_) => vk::Extent3D {
                width: extent.width,
                height: 1,
                depth: 1,
            },
            ImageType::Tex2d
            | ImageType::Tex2dArray(_)
            | ImageType::Cube
            | ImageType::CubeArray(_) => vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
            ImageType::Tex3d => extent,
        }
    }

    ///Returns the correct number of layers for this image type
    pub fn layer_count(&self) -> u32 {
        match self {
            ImageType::Tex1d | ImageType::Tex2d | ImageType::Tex3d => 1,
            ImageType::Tex1dArray(i) | ImageType::Tex2dArray(i) => *i,
            ImageType::Cube => 6,
            ImageType::CubeArray(i) => 6 * i,
        }
    }

    pub fn is_cube(&self) -> bool {
        matches!(self, ImageType::Cube | ImageType::CubeArray(_))
    }

    pub fn view_type(&self) -> vk::ImageViewType {
        match self {
            ImageType::Tex1d => vk::ImageViewType::TYPE_1D,
            ImageType::Tex1dArray(_) => vk::ImageViewType::TYPE_1D_ARRAY,
            ImageType::Tex2d => vk::ImageViewType::TYPE_2D,
            ImageType::Tex2dArray(_) => vk::ImageViewType::TYPE_2D_ARRAY,
            ImageType::Tex3d => vk::ImageViewType::TYPE_3D,
            ImageType::Cube => vk::ImageViewType::CUBE,
            ImageType::CubeArray(_) => vk::ImageViewType::CUBE_ARRAY,
        }
    }
}

impl From<ImageType> for vk::ImageType {
    fn from(ty: ImageType) -> vk::ImageType {
        match ty {
            ImageType::Tex1d | ImageType::Tex1dArray(_) => vk::ImageType::TYPE_1D,
            ImageType::Tex3d => vk::ImageType::TYPE_3D,
            ImageType::Tex2d
            | ImageType::Tex2dArray(_)
            | ImageType::Cube
            | ImageType::CubeArray(_) => vk::ImageType::TYPE_2D,
        }
    }
}

///Image description. Collects all meta data related to an [Image](Image).
#[derive(Clone, Debug)]
pub struct ImgDesc {
    pub img_type: ImageType,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub mip_levels: u32,
    pub samples: vk::SampleCountFlags,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
    pub sharing_mode: SharingMode,
}

impl Default for ImgDesc {
    ///Creates a conservative image description for a 2d 8bit 4-channel image without mipmapping or multisampling,
    /// with an extent of 512x512
    fn default() -> Self {
        ImgDesc {
            img_type: ImageType::Tex2d,
            format: vk::Format::R8G8B8A8_UNORM,
            extent: vk::Extent3D {
                width: 512,
                height: 512,
                depth: 1,
            },
            mip_levels: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            sharing_mode: SharingMode::Exclusive,
        }
    }
}

impl ImgDesc {
    ///Describes an image by its dimensions. The type is chosen from the extent: a height and depth of 1 yields a 1d image,
    /// a depth of 1 a 2d image and anything else a 3d image. More than one layer makes 1d and 2d images arrays,
    /// and six layers with `cube` set make a cube map. Zero layers, depth or mip levels are treated as one.
    #[allow(clippy::too_many_arguments)]
    pub fn from_dims(
        width: u32,
        height: u32,
        depth: u32,
        mip_levels: u32,
        array_layers: u32,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        cube: bool,
    ) -> Self {
        let array_layers = array_layers.max(1);
        let img_type = match (height, depth, array_layers) {
            (_, _, 6) if cube && depth <= 1 => ImageType::Cube,
            (_, d, l) if cube && d <= 1 && l % 6 == 0 => ImageType::CubeArray(l / 6),
            (1, 1, 1) => ImageType::Tex1d,
            (1, 1, l) => ImageType::Tex1dArray(l),
            (_, 1, 1) | (_, 0, 1) => ImageType::Tex2d,
            (_, 1, l) | (_, 0, l) => ImageType::Tex2dArray(l),
            _ => ImageType::Tex3d,
        };

        ImgDesc {
            img_type,
            format,
            extent: vk::Extent3D {
                width,
                height,
                depth: depth.max(1),
            },
            mip_levels: mip_levels.max(1),
            usage,
            ..Default::default()
        }
    }

    ///Creates a simple 2d image description meant as color attachment.
    pub fn color_attachment_2d(width: u32, height: u32, format: vk::Format) -> Self {
        ImgDesc {
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            format,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            ..Default::default()
        }
    }

    ///Creates a simple 2d image description meant as depth attachment.
    pub fn depth_attachment_2d(width: u32, height: u32, format: vk::Format) -> Self {
        ImgDesc {
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            format,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        }
    }

    ///Appends the additional usage
    pub fn add_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage |= usage;
        self
    }

    pub fn as_create_info(&self) -> vk::ImageCreateInfo<'_> {
        let mut flags = vk::ImageCreateFlags::empty();
        if self.img_type.is_cube() {
            flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        }

        let info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(self.img_type.into())
            .format(self.format)
            .extent(self.img_type.valid_extent(self.extent))
            .mip_levels(self.mip_levels)
            .array_layers(self.img_type.layer_count())
            .samples(self.samples)
            .tiling(self.tiling)
            .usage(self.usage)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        match &self.sharing_mode {
            SharingMode::Exclusive => info.sharing_mode(vk::SharingMode::EXCLUSIVE),
            SharingMode::Concurrent {
                queue_family_indices,
            } => info
                .sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(queue_family_indices),
        }
    }
}

///Self managing image that is bound to exactly one memory block.
///
/// The image also carries its current [ImageState] per mip level. That state is only ever changed by the
/// [StateTracker](crate::state::StateTracker) when it records a transition.
pub struct Image {
    ///vulkan image handle
    pub inner: vk::Image,
    ///associated allocation that is freed when the image is dropped
    pub allocation: Box<dyn AnonymAllocation + Send + Sync + 'static>,
    pub desc: ImgDesc,
    pub usage: MemoryUsage,
    pub device: Arc<Device>,
    ///True if the image should not be destroyed on [Drop](Drop) of `Self`.
    /// This should usually be false, except for swapchain images.
    pub do_not_destroy: bool,
    pub(crate) states: SmallVec<[ImageState; 16]>,
}

///The hash implementation is based on [Image](ash::vk::Image)'s hash.
impl Hash for Image {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        self.inner.hash(hasher)
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        if !self.do_not_destroy {
            unsafe { self.device.inner.destroy_image(self.inner, None) }
        }
    }
}

impl Image {
    ///Creates the image based on the description. The image starts out [Undefined](ImageState::Undefined).
    pub fn new<A: Allocator + Send + Sync + 'static>(
        device: &Arc<Device>,
        allocator: &Arc<Mutex<A>>,
        description: ImgDesc,
        memory_usage: MemoryUsage,
        name: Option<&str>,
    ) -> Result<Self, MemoryError> {
        let image = unsafe {
            device
                .inner
                .create_image(&description.as_create_info(), None)?
        };

        let allocation = {
            let mut lck = allocator
                .lock()
                .map_err(|_| MemoryError::Allocator("allocator lock is poisoned".into()))?;
            lck.allocate_image(
                &device.inner,
                name,
                &image,
                memory_usage,
                description.tiling == vk::ImageTiling::LINEAR,
            )
        };
        let allocation = match allocation {
            Ok(a) => a,
            Err(e) => {
                unsafe { device.inner.destroy_image(image, None) };
                return Err(into_memory_error(e));
            }
        };
        let allocation = ManagedAllocation {
            allocator: allocator.clone(),
            allocation: Some(allocation),
        };

        if let Err(e) = unsafe {
            device
                .inner
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        } {
            unsafe { device.inner.destroy_image(image, None) };
            return Err(e.into());
        }

        Ok(Image {
            states: SmallVec::from_elem(ImageState::Undefined, description.mip_levels as usize),
            allocation: Box::new(allocation),
            desc: description,
            inner: image,
            device: device.clone(),
            usage: memory_usage,
            do_not_destroy: false,
        })
    }

    ///Wraps an image whose memory is owned elsewhere, like a swapchain image. The handle is not destroyed on drop.
    pub(crate) fn new_unmanaged(device: &Arc<Device>, inner: vk::Image, desc: ImgDesc) -> Self {
        Image {
            states: SmallVec::from_elem(ImageState::Undefined, desc.mip_levels as usize),
            allocation: Box::new(UnmanagedAllocation::new()),
            desc,
            inner,
            device: device.clone(),
            usage: MemoryUsage::GpuOnly,
            do_not_destroy: true,
        }
    }

    pub fn extent_3d(&self) -> vk::Extent3D {
        self.desc.img_type.valid_extent(self.desc.extent)
    }

    ///In case of 3d image formats the depth is ignored.
    pub fn extent_2d(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.desc.extent.width,
            height: self.desc.extent.height,
        }
    }

    pub fn mip_levels(&self) -> u32 {
        self.desc.mip_levels
    }

    pub fn layer_count(&self) -> u32 {
        self.desc.img_type.layer_count()
    }

    ///Aspect of the image, derived from its format.
    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        aspect_for_format(self.desc.format)
    }

    ///The state shared by all mip levels, or `None` while levels differ (for instance during mipmap generation).
    pub fn state(&self) -> Option<ImageState> {
        let first = *self.states.first()?;
        self.states.iter().all(|s| *s == first).then_some(first)
    }

    pub fn level_state(&self, level: u32) -> Option<ImageState> {
        self.states.get(level as usize).copied()
    }

    ///Returns a sub resource range that encloses the whole image.
    pub fn subresource_all(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect_mask(),
            base_mip_level: 0,
            level_count: self.desc.mip_levels,
            base_array_layer: 0,
            layer_count: self.layer_count(),
        }
    }

    ///Sub resource range of all layers of a single mip `level`.
    pub fn subresource_level(&self, level: u32) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            base_mip_level: level,
            level_count: 1,
            ..self.subresource_all()
        }
    }

    ///Subresource layers of all layers of mip `level`, as used by copies and blits.
    pub fn subresource_layers(&self, level: u32) -> vk::ImageSubresourceLayers {
        vk::ImageSubresourceLayers {
            aspect_mask: self.aspect_mask(),
            mip_level: level,
            base_array_layer: 0,
            layer_count: self.layer_count(),
        }
    }

    ///Creates an [ImgViewDesc](ImgViewDesc) that encloses the whole image.
    pub fn view_all(&self) -> ImgViewDesc {
        ImgViewDesc {
            view_type: self.desc.img_type.view_type(),
            format: self.desc.format,
            component_mapping: vk::ComponentMapping::default(),
            range: self.subresource_all(),
        }
    }
}

///Describes all static parameters of an image view.
#[derive(Clone, Debug)]
pub struct ImgViewDesc {
    pub view_type: vk::ImageViewType,
    pub format: vk::Format,
    pub component_mapping: vk::ComponentMapping,
    pub range: vk::ImageSubresourceRange,
}

///[vk::ImageView](ash::vk::ImageView) wrapper that keeps its source image alive and destroys itself when dropped.
pub struct ImageView {
    pub desc: ImgViewDesc,
    pub device: Arc<Device>,
    pub view: vk::ImageView,
    pub src_img: Arc<Image>,
}

impl ImageView {
    pub fn new(image: &Arc<Image>, desc: ImgViewDesc) -> Result<Self, vk::Result> {
        let info = vk::ImageViewCreateInfo::default()
            .image(image.inner)
            .view_type(desc.view_type)
            .format(desc.format)
            .components(desc.component_mapping)
            .subresource_range(desc.range);
        let view = unsafe { image.device.inner.create_image_view(&info, None)? };

        Ok(ImageView {
            desc,
            device: image.device.clone(),
            view,
            src_img: image.clone(),
        })
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_image_view(self.view, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(width: u32, height: u32, depth: u32, layers: u32, cube: bool) -> ImageType {
        ImgDesc::from_dims(
            width,
            height,
            depth,
            1,
            layers,
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::SAMPLED,
            cube,
        )
        .img_type
    }

    #[test]
    fn type_from_dimensions() {
        assert_eq!(ty(256, 1, 1, 1, false), ImageType::Tex1d);
        assert_eq!(ty(256, 1, 1, 4, false), ImageType::Tex1dArray(4));
        assert_eq!(ty(256, 256, 1, 1, false), ImageType::Tex2d);
        assert_eq!(ty(256, 256, 1, 3, false), ImageType::Tex2dArray(3));
        assert_eq!(ty(64, 64, 64, 1, false), ImageType::Tex3d);
        assert_eq!(ty(64, 64, 1, 6, true), ImageType::Cube);
        assert_eq!(ty(64, 64, 1, 12, true), ImageType::CubeArray(2));
        //without the cube flag, six layers are a plain array.
        assert_eq!(ty(64, 64, 1, 6, false), ImageType::Tex2dArray(6));
    }

    #[test]
    fn zero_layers_count_as_one() {
        assert_eq!(ty(256, 1, 1, 0, false), ImageType::Tex1d);
        assert_eq!(ty(64, 64, 1, 0, false), ImageType::Tex2d);
        assert_eq!(ty(64, 64, 1, 0, true), ImageType::Tex2d);
        assert_eq!(ty(64, 64, 1, 0, false).layer_count(), 1);
    }

    #[test]
    fn layer_counts() {
        assert_eq!(ImageType::Cube.layer_count(), 6);
        assert_eq!(ImageType::CubeArray(3).layer_count(), 18);
        assert_eq!(ImageType::Tex2dArray(5).layer_count(), 5);
        assert_eq!(ImageType::Tex3d.layer_count(), 1);
    }

    #[test]
    fn cube_sets_compatible_flag() {
        let desc = ImgDesc::from_dims(
            32,
            32,
            1,
            1,
            6,
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::SAMPLED,
            true,
        );
        let info = desc.as_create_info();
        assert!(info.flags.contains(vk::ImageCreateFlags::CUBE_COMPATIBLE));
        assert_eq!(info.array_layers, 6);
        assert_eq!(info.image_type, vk::ImageType::TYPE_2D);
    }
}

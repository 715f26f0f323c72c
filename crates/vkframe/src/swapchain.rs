use std::sync::Arc;

use ash::vk;

use crate::{
    context::Device,
    resources::{Image, ImageType, ImageView, ImgDesc, SharingMode},
    surface::Surface,
    sync::Semaphore,
};

///Settings the swapchain is created with. Kept by the [Swapchain] so it can be recreated with the same settings.
#[derive(Clone, Debug)]
pub struct SwapchainConfig {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub image_count: u32,
    pub usage: vk::ImageUsageFlags,
    pub sharing_mode: SharingMode,
    pub transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub is_clipped: bool,
}

pub struct SwapchainBuilder {
    ///Surface based on which the swapchain will be build.
    pub surface: Arc<Surface>,
    ///Device for which the swapchain will be build.
    pub device: Arc<Device>,

    ///Ordered preferred image formats. If none of them is available, the first supported format is taken.
    pub format_preference: Vec<vk::SurfaceFormatKHR>,
    ///Ordered list of preferred present modes. FIFO is used if none of them is supported, since every implementation has to
    /// support it.
    pub present_mode_preference: Vec<vk::PresentModeKHR>,

    pub image_count: u32,

    pub extent: vk::Extent2D,
    pub usage: vk::ImageUsageFlags,
    pub sharing_mode: SharingMode,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub is_clipped: bool,
}

impl SwapchainBuilder {
    pub fn build(self) -> Result<Swapchain, anyhow::Error> {
        if self.extent.width == 0 || self.extent.height == 0 {
            anyhow::bail!("Could not create swapchain, chosen extent {:?} had a zero-axis", self.extent);
        }

        let capabilities = self.surface.get_capabilities(self.device.physical_device)?;
        let config = SwapchainConfig {
            format: self.first_supported_format()?,
            present_mode: self.first_supported_present_mode()?,
            image_count: self.image_count,
            usage: self.usage & capabilities.supported_usage_flags,
            sharing_mode: self.sharing_mode.clone(),
            transform: if capabilities
                .supported_transforms
                .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
            {
                vk::SurfaceTransformFlagsKHR::IDENTITY
            } else {
                capabilities.current_transform
            },
            composite_alpha: self.composite_alpha,
            is_clipped: self.is_clipped,
        };

        let loader = ash::khr::swapchain::Device::new(&self.device.instance.inner, &self.device.inner);
        let extent = supported_extent(&capabilities, self.extent);
        let (swapchain, images, views) = create_swapchain(
            &self.device,
            &self.surface,
            &loader,
            &config,
            extent,
            vk::SwapchainKHR::null(),
        )?;

        #[cfg(feature = "logging")]
        log::info!(
            "Created swapchain with {} images of {:?}, format {:?}, present mode {:?}",
            images.len(),
            extent,
            config.format,
            config.present_mode
        );

        Ok(Swapchain {
            loader,
            swapchain,
            surface: self.surface,
            device: self.device,
            images,
            views,
            extent,
            config,
        })
    }

    pub fn first_supported_format(&self) -> Result<vk::SurfaceFormatKHR, anyhow::Error> {
        let supported = self.surface.get_formats(self.device.physical_device)?;
        if let Some(preferred) = self
            .format_preference
            .iter()
            .find(|preferred| supported.contains(preferred))
        {
            return Ok(*preferred);
        }

        supported
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Surface reports no supported format"))
    }

    pub fn first_supported_present_mode(&self) -> Result<vk::PresentModeKHR, anyhow::Error> {
        let supported = self.surface.get_present_modes(self.device.physical_device)?;
        Ok(self
            .present_mode_preference
            .iter()
            .find(|preferred| supported.contains(preferred))
            .copied()
            .unwrap_or(vk::PresentModeKHR::FIFO))
    }

    ///Prefers FIFO presentation, which is vsynced on all platforms.
    pub fn with_vsync(mut self) -> Self {
        self.present_mode_preference.retain(|m| *m != vk::PresentModeKHR::FIFO);
        self.present_mode_preference.insert(0, vk::PresentModeKHR::FIFO);
        self
    }

    ///enables you to chain multiple assignments to a constructed builder.
    pub fn with(mut self, mapping: impl FnOnce(&mut Self)) -> Self {
        mapping(&mut self);
        self
    }
}

///Clamps `wanted` to the surface limits. Uses the surface's own extent if it dictates one.
fn supported_extent(capabilities: &vk::SurfaceCapabilitiesKHR, wanted: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: wanted.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: wanted.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

///One image more than the minimum, so the application does not wait on the presentation engine. A `max_image_count` of 0
/// means there is no upper limit.
fn default_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count == 0 {
        count
    } else {
        count.min(capabilities.max_image_count)
    }
}

type SwapchainParts = (vk::SwapchainKHR, Vec<Arc<Image>>, Vec<ImageView>);

fn create_swapchain(
    device: &Arc<Device>,
    surface: &Surface,
    loader: &ash::khr::swapchain::Device,
    config: &SwapchainConfig,
    extent: vk::Extent2D,
    old_swapchain: vk::SwapchainKHR,
) -> Result<SwapchainParts, anyhow::Error> {
    let mut create_info = vk::SwapchainCreateInfoKHR::default()
        .surface(surface.surface)
        .min_image_count(config.image_count)
        .image_format(config.format.format)
        .image_color_space(config.format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(config.usage)
        .pre_transform(config.transform)
        .composite_alpha(config.composite_alpha)
        .present_mode(config.present_mode)
        .clipped(config.is_clipped)
        .old_swapchain(old_swapchain);

    create_info = match &config.sharing_mode {
        SharingMode::Exclusive => create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE),
        SharingMode::Concurrent {
            queue_family_indices,
        } => create_info
            .image_sharing_mode(vk::SharingMode::CONCURRENT)
            .queue_family_indices(queue_family_indices),
    };

    let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };

    //The swapchain owns the image memory, so images are wrapped without an allocation.
    let raw_images = match unsafe { loader.get_swapchain_images(swapchain) } {
        Ok(images) => images,
        Err(e) => {
            unsafe { loader.destroy_swapchain(swapchain, None) };
            return Err(e.into());
        }
    };

    let images = raw_images
        .into_iter()
        .map(|raw| {
            let desc = ImgDesc {
                img_type: ImageType::Tex2d,
                format: config.format.format,
                extent: vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                },
                usage: config.usage,
                sharing_mode: config.sharing_mode.clone(),
                ..Default::default()
            };
            Arc::new(Image::new_unmanaged(device, raw, desc))
        })
        .collect::<Vec<_>>();

    let mut views = Vec::with_capacity(images.len());
    for image in &images {
        match ImageView::new(image, image.view_all()) {
            Ok(view) => views.push(view),
            Err(e) => {
                //views must go before the swapchain that owns their images
                drop(views);
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(e.into());
            }
        }
    }

    Ok((swapchain, images, views))
}

pub struct Swapchain {
    pub loader: ash::khr::swapchain::Device,
    pub swapchain: vk::SwapchainKHR,
    ///associated surface. Needed to keep the surface alive until the swapchain is dropped.
    pub surface: Arc<Surface>,
    pub device: Arc<Device>,
    ///All images of the swapchain, in the order the presentation engine indexes them.
    pub images: Vec<Arc<Image>>,
    ///One view per image.
    pub views: Vec<ImageView>,
    pub extent: vk::Extent2D,
    ///Settings used for recreation.
    pub config: SwapchainConfig,
}

impl Swapchain {
    ///Creates a new swapchain builder.
    ///
    /// Prefers `B8G8R8A8_UNORM` with a non-linear sRGB color space, and MAILBOX over FIFO presentation.
    /// Requests one image more than the surface minimum.
    ///
    /// # Note on Wayland
    /// The surface does not dictate an extent there. `extent` is clamped to the surface limits in that case.
    pub fn builder(
        device: &Arc<Device>,
        surface: &Arc<Surface>,
        extent: vk::Extent2D,
    ) -> Result<SwapchainBuilder, anyhow::Error> {
        let capabilities = surface.get_capabilities(device.physical_device)?;

        Ok(SwapchainBuilder {
            surface: surface.clone(),
            device: device.clone(),
            format_preference: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_mode_preference: vec![vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO],
            image_count: default_image_count(&capabilities),
            extent,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
            sharing_mode: device.families.swapchain_sharing(),
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            is_clipped: true,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn format(&self) -> vk::Format {
        self.config.format.format
    }

    ///Requests the next image. On success returns its index and whether the swapchain is suboptimal for the surface.
    /// `semaphore` is signaled once the presentation engine released the image.
    pub fn acquire_next_image(&self, semaphore: &Semaphore, timeout: u64) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader
                .acquire_next_image(self.swapchain, timeout, semaphore.inner, vk::Fence::null())
        }
    }

    ///Queues the presentation of image `index` once `wait` is signaled. Returns true if the swapchain is suboptimal.
    pub fn present(&self, queue: vk::Queue, index: u32, wait: &Semaphore) -> Result<bool, vk::Result> {
        let present_info = vk::PresentInfoKHR::default()
            .swapchains(core::slice::from_ref(&self.swapchain))
            .image_indices(core::slice::from_ref(&index))
            .wait_semaphores(core::slice::from_ref(&wait.inner));

        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    ///Recreates the swapchain with the same settings for `extent`. `self` is only changed if recreation succeeded.
    ///
    /// The caller must make sure no submitted work still uses the old images.
    pub fn recreate(&mut self, extent: vk::Extent2D) -> Result<(), anyhow::Error> {
        let capabilities = self.surface.get_capabilities(self.device.physical_device)?;
        let extent = supported_extent(&capabilities, extent);
        if extent.width == 0 || extent.height == 0 {
            anyhow::bail!("Could not recreate swapchain, extent {:?} had a zero-axis", extent);
        }

        let (swapchain, images, views) = create_swapchain(
            &self.device,
            &self.surface,
            &self.loader,
            &self.config,
            extent,
            self.swapchain,
        )?;

        //Old views reference images of the old swapchain, so drop them first.
        self.views = views;
        self.images = images;
        unsafe { self.loader.destroy_swapchain(self.swapchain, None) };
        self.swapchain = swapchain;
        self.extent = extent;

        #[cfg(feature = "logging")]
        log::info!("Recreated swapchain for {:?}", extent);

        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.views.clear();
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: vk::Extent2D, min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: current,
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            min_image_count: min_count,
            max_image_count: max_count,
            ..Default::default()
        }
    }

    #[test]
    fn surface_extent_wins() {
        let current = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let wanted = vk::Extent2D {
            width: 1024,
            height: 768,
        };
        assert_eq!(supported_extent(&caps(current, 2, 3), wanted), current);
    }

    #[test]
    fn undefined_surface_extent_is_clamped() {
        let undefined = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        let wanted = vk::Extent2D {
            width: 10_000,
            height: 300,
        };
        assert_eq!(
            supported_extent(&caps(undefined, 2, 3), wanted),
            vk::Extent2D {
                width: 4096,
                height: 300
            }
        );
    }

    #[test]
    fn image_count_is_min_plus_one() {
        let e = vk::Extent2D::default();
        assert_eq!(default_image_count(&caps(e, 2, 8)), 3);
        assert_eq!(default_image_count(&caps(e, 3, 3)), 3);
        assert_eq!(default_image_count(&caps(e, 2, 0)), 3);
    }
}

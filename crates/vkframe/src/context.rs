//! ## Context
//!
//! When working with Vulkan the [Device](ash::Device) is entry point for most of the operations.
//! It therefore is needed in most structures and functions calls that somehow transform state related to Vulkan.
//! The device is created from an [Instance](ash::Instance) which represents a runtime instance of Vulkan.
//!
//! Each device exposes queues for three roles: graphics, present and compute (see [QueueRole]). Roles share a queue if
//! they share a family. For each distinct family the context also keeps one [CommandPool].
//!
//! When working with buffers (and images) another structure, the allocator is relevant. It decides which memory
//! a resource is bound to.
//!
//! Since those structures closely work together they are collected in [Ctx], or "Context". Everything created from a
//! context holds an `Arc<Device>`. The device is therefore destroyed last, once every buffer, image, pool and
//! semaphore is gone.
//!
//! The `Instance` and `Device` are always created by ash, the allocator however can be defined by the
//! application. Have a look at the [allocator](crate::allocator) module for its definition and default implementation.
use std::sync::{Arc, Mutex};

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

mod instance;
pub use instance::{GetDeviceFilter, Instance, InstanceBuilder, vulkan_debug_callback};

mod device;
pub use device::{Device, DeviceBuilder};

mod queue;
pub use queue::{Queue, QueueBuilder, QueueRole};

mod physical_device;
pub use physical_device::{PhyDeviceProperties, PhysicalDeviceFilter, QueueFamilies};

use crate::{
    allocator::{Allocator, DedicatedAllocator, MemoryUsage},
    error::{CommandBufferError, DeviceError, MemoryError, VkFrameError},
    resources::{BufDesc, Buffer, CommandPool, Image, ImgDesc},
    surface::Surface,
};

///vkframe's Vulkan context. Can either be constructed from parts, or via the `new_*` helpers.
pub struct Ctx<A: Allocator + Send + Sync + 'static> {
    ///Allocator instance used for all buffer and image allocation in this context.
    pub allocator: Arc<Mutex<A>>,
    ///Vulkan device including associated queues.
    pub device: Arc<Device>,
    ///The initial vulkan instance used for the context.
    pub instance: Arc<Instance>,
    pools: Vec<Arc<CommandPool>>,
}

impl<A: Allocator + Send + Sync + 'static> Ctx<A> {
    ///Creates the context from its elements, and one command pool per queue family of `device`.
    ///
    /// Assumes that the allocator was created for the device, which is in turn created for the instance.
    pub fn from_parts(
        allocator: A,
        device: Arc<Device>,
        instance: Arc<Instance>,
    ) -> Result<Self, CommandBufferError> {
        let pools = device
            .families
            .unique()
            .into_iter()
            .map(|family| {
                CommandPool::new(
                    &device,
                    family,
                    vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
                )
                .map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Ctx {
            allocator: Arc::new(Mutex::new(allocator)),
            device,
            instance,
            pools,
        })
    }

    pub fn queue(&self, role: QueueRole) -> &Queue {
        self.device.queue(role)
    }

    ///Command pool of the family that serves `role`.
    pub fn pool(&self, role: QueueRole) -> Result<&Arc<CommandPool>, CommandBufferError> {
        let family = self.device.family(role);
        self.pools
            .iter()
            .find(|p| p.queue_family == family)
            .ok_or(CommandBufferError::NoPool(family))
    }

    ///Creates a buffer of `size` bytes.
    pub fn create_buffer(
        &self,
        size: u64,
        usage: vk::BufferUsageFlags,
        memory_usage: MemoryUsage,
        name: Option<&str>,
    ) -> Result<Buffer, MemoryError> {
        Buffer::new(
            &self.device,
            &self.allocator,
            BufDesc::new(size, usage),
            memory_usage,
            name,
        )
    }

    ///Creates a device local image. See [ImgDesc::from_dims] for how the image type is chosen.
    #[allow(clippy::too_many_arguments)]
    pub fn create_image(
        &self,
        width: u32,
        height: u32,
        depth: u32,
        mip_levels: u32,
        array_layers: u32,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        name: Option<&str>,
    ) -> Result<Image, MemoryError> {
        let desc = ImgDesc::from_dims(
            width,
            height,
            depth,
            mip_levels,
            array_layers,
            format,
            usage,
            false,
        );
        Image::new(&self.device, &self.allocator, desc, MemoryUsage::GpuOnly, name)
    }

    ///Creates an image from a full description.
    pub fn create_image_from_desc(
        &self,
        desc: ImgDesc,
        memory_usage: MemoryUsage,
        name: Option<&str>,
    ) -> Result<Image, MemoryError> {
        Image::new(&self.device, &self.allocator, desc, memory_usage, name)
    }
}

impl Ctx<DedicatedAllocator> {
    ///Creates a context without any surface support. Compute and graphics queues are created as usual.
    pub fn new_headless(use_validation: bool) -> Result<Self, VkFrameError> {
        let mut builder = Instance::load()?;
        if use_validation {
            builder = builder.enable_validation();
        }
        let instance = builder.build()?;
        Self::new_from_instance(instance, None)
    }

    ///Creates a context whose device can present to `window_handle`. Returns the created surface alongside.
    pub fn new_with_surface<T>(
        window_handle: &T,
        use_validation: bool,
    ) -> Result<(Self, Arc<Surface>), VkFrameError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let mut builder = Instance::load()?.for_surface(window_handle)?;
        if use_validation {
            builder = builder.enable_validation();
        }
        let instance = builder.build()?;
        let surface = Arc::new(Surface::new(&instance, window_handle)?);
        let ctx = Self::new_from_instance(instance, Some(&surface))?;
        Ok((ctx, surface))
    }

    ///Selects a physical device, creates the device with one queue per family and a [DedicatedAllocator].
    ///
    /// Devices need Vulkan 1.3 with timeline semaphores and synchronization2, and a graphics and compute family.
    /// If `surface` is set, a present family as well. Discrete GPUs are preferred over integrated ones.
    pub fn new_from_instance(
        instance: Arc<Instance>,
        surface: Option<&Surface>,
    ) -> Result<Self, VkFrameError> {
        let can_present = |phy: vk::PhysicalDevice, family: u32| match surface {
            Some(s) => s.supports_family(phy, family),
            None => true,
        };

        let mut candidates = instance
            .create_physical_device_filter()?
            .filter(|p| {
                p.properties.api_version >= vk::API_VERSION_1_3
                    && instance.supports_sync_features(p.phydev)
                    && QueueFamilies::select(&p.queue_properties, |f| can_present(p.phydev, f))
                        .is_ok()
            })
            .sort_by_type()
            .release();

        if candidates.is_empty() {
            return Err(DeviceError::NoPhysicalDevice.into());
        }
        let selected = candidates.remove(0);

        #[cfg(feature = "logging")]
        log::info!(
            "Selected physical device {:?} ({:?})",
            selected.properties.device_name_as_c_str().unwrap_or(c"unknown"),
            selected.properties.device_type
        );

        let families =
            QueueFamilies::select(&selected.queue_properties, |f| can_present(selected.phydev, f))?;

        let mut device_builder = selected.into_device_builder(instance.clone(), families);
        if surface.is_some() {
            device_builder = device_builder.with_extension(ash::khr::swapchain::NAME);
        }
        let device = device_builder.build()?;

        let allocator = DedicatedAllocator::new(&device);
        Ok(Self::from_parts(allocator, device, instance)?)
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    #[test]
    fn impl_send_sync() {
        assert_impl_all!(Ctx<DedicatedAllocator>: Send, Sync);
        assert_impl_all!(Device: Send, Sync);
        assert_impl_all!(Instance: Send, Sync);
    }
}

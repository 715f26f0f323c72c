use std::{ffi::CStr, sync::Arc};

use ash::vk;

use super::{Queue, QueueBuilder, QueueFamilies, QueueRole};
use crate::error::DeviceError;

///Helper that lets you setup device properties and possibly needed extensions before creating the actual
/// device.
///
/// Timeline semaphores and synchronization2 are always enabled, since every submission and barrier vkframe records
/// depends on them.
pub struct DeviceBuilder {
    ///Instance based on which the device is creates
    pub instance: Arc<crate::context::Instance>,
    ///The physical device from which this will be an abstraction
    pub physical_device: vk::PhysicalDevice,
    ///Family used for each queue role.
    pub families: QueueFamilies,
    ///One entry per distinct queue family that gets created.
    pub queues: Vec<QueueBuilder>,
    pub features: vk::PhysicalDeviceFeatures,
    ///List of device extensions that are enabled.
    pub device_extensions: Vec<&'static CStr>,
}

impl DeviceBuilder {
    pub fn new(
        instance: Arc<crate::context::Instance>,
        physical_device: vk::PhysicalDevice,
        families: QueueFamilies,
        queues: Vec<QueueBuilder>,
    ) -> Self {
        DeviceBuilder {
            instance,
            physical_device,
            families,
            queues,
            features: vk::PhysicalDeviceFeatures::default(),
            device_extensions: Vec::new(),
        }
    }

    ///Checks that all device extensions are supported.
    fn check_extensions(&self) -> Result<(), anyhow::Error> {
        let all_supported = unsafe {
            self.instance
                .inner
                .enumerate_device_extension_properties(self.physical_device)
        }?;

        for ext in self.device_extensions.iter() {
            let supported = all_supported
                .iter()
                .any(|prop| prop.extension_name_as_c_str().map(|n| n == *ext).unwrap_or(false));
            if !supported {
                return Err(DeviceError::UnsupportedExtension(ext.to_string_lossy().into_owned()).into());
            }
        }

        Ok(())
    }

    ///Allows changing `self` builder style
    pub fn with(mut self, mapping: impl FnOnce(&mut DeviceBuilder)) -> Self {
        mapping(&mut self);
        self
    }

    ///Pushes the new extension, if it was not pushed yet. The name is usually obtained from the extension's module, like `ash::khr::swapchain::NAME`.
    pub fn with_extension(mut self, ext_name: &'static CStr) -> Self {
        if !self.device_extensions.contains(&ext_name) {
            self.device_extensions.push(ext_name);
        }
        self
    }

    pub fn build(self) -> Result<Arc<Device>, anyhow::Error> {
        self.check_extensions()?;
        if !self.instance.supports_sync_features(self.physical_device) {
            return Err(DeviceError::UnsupportedFeature(
                "timelineSemaphore and synchronization2".to_owned(),
            )
            .into());
        }

        let DeviceBuilder {
            instance,
            physical_device,
            families,
            queues,
            features,
            device_extensions,
        } = self;

        let queue_create_infos = queues
            .iter()
            .map(|q| q.as_create_info())
            .collect::<Vec<_>>();
        let extension_ptrs = device_extensions
            .iter()
            .map(|e| e.as_ptr())
            .collect::<Vec<_>>();

        let mut features12 = vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);
        let mut features13 = vk::PhysicalDeviceVulkan13Features::default().synchronization2(true);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&features)
            .push_next(&mut features12)
            .push_next(&mut features13);

        unsafe { Device::new_from_info(instance, physical_device, &create_info, families, &queues) }
    }
}

///Thin device abstraction that keeps the underlying instance (and therefore entry point) alive,
/// and takes care of device destruction once its dropped.
pub struct Device {
    ///The raw ash device
    pub inner: ash::Device,
    pub instance: Arc<crate::context::Instance>,
    pub physical_device: vk::PhysicalDevice,
    pub families: QueueFamilies,
    queues: Vec<Queue>,
}

impl Device {
    ///Creates the device from an already created instance and physical device, using
    /// the supplied create info. Fetches the first queue of each family in `queue_builder`.
    ///
    /// # Safety
    /// The queue families of `queue_builder` must match the ones in `device_create_info`, and `families` may only
    /// reference those.
    pub unsafe fn new_from_info(
        instance: Arc<crate::context::Instance>,
        physical_device: vk::PhysicalDevice,
        device_create_info: &vk::DeviceCreateInfo<'_>,
        families: QueueFamilies,
        queue_builder: &[QueueBuilder],
    ) -> Result<Arc<Self>, anyhow::Error> {
        for family in families.unique() {
            if !queue_builder.iter().any(|q| q.family_index == family) {
                anyhow::bail!("Queue family {} is used by a role but not created", family);
            }
        }

        let device = unsafe {
            instance
                .inner
                .create_device(physical_device, device_create_info, None)?
        };

        let queues = queue_builder
            .iter()
            .map(|family| Queue {
                family_index: family.family_index,
                properties: family.properties,
                inner: unsafe { device.get_device_queue(family.family_index, 0) },
            })
            .collect();

        #[cfg(feature = "logging")]
        log::info!(
            "Created device with graphics family {}, present family {}, compute family {}",
            families.graphics,
            families.present,
            families.compute
        );

        Ok(Arc::new(Device {
            inner: device,
            instance,
            physical_device,
            families,
            queues,
        }))
    }

    pub fn family(&self, role: QueueRole) -> u32 {
        match role {
            QueueRole::Graphics => self.families.graphics,
            QueueRole::Present => self.families.present,
            QueueRole::Compute => self.families.compute,
        }
    }

    ///Returns the queue serving `role`.
    pub fn queue(&self, role: QueueRole) -> &Queue {
        let family = self.family(role);
        //Construction guarantees a queue for every role family.
        self.queues
            .iter()
            .find(|q| q.family_index == family)
            .unwrap_or(&self.queues[0])
    }

    pub fn queues(&self) -> &[Queue] {
        &self.queues
    }

    ///Returns the first queue for the given family, if there is any.
    pub fn get_first_queue_for_family(&self, family: u32) -> Option<&Queue> {
        self.queues.iter().find(|q| q.family_index == family)
    }

    pub fn wait_idle(&self) -> Result<(), vk::Result> {
        unsafe { self.inner.device_wait_idle() }
    }

    ///Returns the format properties of `format` on this device.
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .inner
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(_e) = self.inner.device_wait_idle() {
                #[cfg(feature = "logging")]
                log::error!("Waiting for device idle before destruction failed: {}", _e);
            }
            self.inner.destroy_device(None)
        };
    }
}

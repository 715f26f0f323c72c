use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::InstanceError;

///Window surface created through [ash-window](https://crates.io/crates/ash-window). Keeps the instance alive long
/// enough to destroy the surface in time.
pub struct Surface {
    pub instance: Arc<crate::context::Instance>,
    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    pub fn new<T>(instance: &Arc<crate::context::Instance>, window_handle: &T) -> Result<Self, InstanceError>
    where
        T: HasWindowHandle + HasDisplayHandle,
    {
        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.inner,
                window_handle.display_handle()?.as_raw(),
                window_handle.window_handle()?.as_raw(),
                None,
            )?
        };
        let surface_loader = ash::khr::surface::Instance::new(&instance.entry, &instance.inner);

        Ok(Surface {
            instance: instance.clone(),
            surface,
            surface_loader,
        })
    }

    ///True if queues of `family` on `physical_device` can present to this surface.
    pub fn supports_family(&self, physical_device: vk::PhysicalDevice, family: u32) -> bool {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(physical_device, family, self.surface)
        }
        .unwrap_or(false)
    }

    pub fn get_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<vk::SurfaceCapabilitiesKHR, InstanceError> {
        Ok(unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)?
        })
    }

    pub fn get_formats(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::SurfaceFormatKHR>, InstanceError> {
        Ok(unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(physical_device, self.surface)?
        })
    }

    pub fn get_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::PresentModeKHR>, InstanceError> {
        Ok(unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)?
        })
    }

    ///Tries to read the current surface extent. Returns `None` if the platform leaves the extent to the swapchain
    /// (like Wayland), or if the window is minimized.
    pub fn get_current_extent(&self, physical_device: vk::PhysicalDevice) -> Option<vk::Extent2D> {
        let extent = self.get_capabilities(physical_device).ok()?.current_extent;
        match extent {
            vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            } => None,
            vk::Extent2D { width: 0, .. } | vk::Extent2D { height: 0, .. } => None,
            extent => Some(extent),
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.surface_loader.destroy_surface(self.surface, None) };
    }
}
